use crate::{
    args::Region,
    io::MapFailedReadExt,
    utils::{IdMap, new_id_map},
};
use std::{
    fs::File,
    io::{BufRead, BufReader, ErrorKind},
    path::Path,
};
use zoe::data::err::ResultWithErrorContext;

/// The fewest whitespace separated columns in a domain table data line.
const DOMTABLE_MIN_FIELDS: usize = 19;

/// The best scoring hit of one flanking domain on one sequence. Alignment
/// coordinates are 1-based and inclusive, as reported by HMMER.
#[derive(Debug, Clone, Copy, PartialEq)]
struct DomainHit {
    score:    f64,
    ali_from: usize,
    ali_to:   usize,
}

#[derive(Debug, Default)]
struct Flanks {
    left:  Option<DomainHit>,
    right: Option<DomainHit>,
}

fn keep_best(slot: &mut Option<DomainHit>, hit: DomainHit) {
    if slot.is_none_or(|best| hit.score > best.score) {
        *slot = Some(hit);
    }
}

/// Trim coordinates for every representative sequence with both flanking
/// domains, parsed from an `hmmsearch --domtblout` table.
#[derive(Debug)]
pub struct ItsPosition {
    region: Region,
    flanks: IdMap<Flanks>,
}

impl ItsPosition {
    /// Parses a domain table. Comment lines start with `#`. Hits on profiles
    /// other than the two flanking `region` are ignored.
    ///
    /// ## Errors
    ///
    /// Truncated lines or non-numeric scores and coordinates are reported
    /// with their line number.
    pub fn parse<R: BufRead>(reader: R, region: Region) -> std::io::Result<Self> {
        let (left_prefix, right_prefix) = region.flanking_prefixes();
        let mut flanks: IdMap<Flanks> = new_id_map();

        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            if line.starts_with('#') || line.trim().is_empty() {
                continue;
            }

            let fields: Vec<&str> = line.split_ascii_whitespace().collect();
            if fields.len() < DOMTABLE_MIN_FIELDS {
                return Err(std::io::Error::new(
                    ErrorKind::InvalidData,
                    format!(
                        "Domain table line {n} has {found} columns, expected at least {DOMTABLE_MIN_FIELDS}",
                        n = i + 1,
                        found = fields.len()
                    ),
                ));
            }

            let Some((_, domain)) = fields[3].split_once('.') else {
                continue;
            };

            let is_left = domain.starts_with(left_prefix);
            let is_right = domain.starts_with(right_prefix);
            if !is_left && !is_right {
                continue;
            }

            let invalid = |what: &str| {
                std::io::Error::new(
                    ErrorKind::InvalidData,
                    format!("Domain table line {n} has an invalid {what}", n = i + 1),
                )
            };
            let hit = DomainHit {
                score:    fields[13].parse().map_err(|_| invalid("domain score"))?,
                ali_from: fields[17].parse().map_err(|_| invalid("alignment start"))?,
                ali_to:   fields[18].parse().map_err(|_| invalid("alignment end"))?,
            };

            let entry = flanks.entry(fields[0].to_string()).or_default();
            if is_left {
                keep_best(&mut entry.left, hit);
            }
            if is_right {
                keep_best(&mut entry.right, hit);
            }
        }

        Ok(Self { region, flanks })
    }

    /// Reads the domain table written by `hmmsearch`.
    pub fn from_domtable(path: impl AsRef<Path>, region: Region) -> std::io::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_failed_read(path)?;
        Ok(Self::parse(BufReader::new(file), region).with_file_context("Failed to parse the domain table", path)?)
    }

    /// The 0-based, half-open `(start, stop)` of the region within sequence
    /// `id`. The region starts after the last base of the left domain and
    /// stops at the first base of the right one.
    ///
    /// Returns [`None`] if either flanking domain is missing or the domains
    /// leave no room for a region.
    pub fn get(&self, id: &str) -> Option<(usize, usize)> {
        let Flanks {
            left: Some(left),
            right: Some(right),
        } = self.flanks.get(id)?
        else {
            return None;
        };

        let start = left.ali_to;
        let stop = right.ali_from.checked_sub(1)?;
        (start < stop).then_some((start, stop))
    }

    /// The region these positions delimit.
    #[inline]
    pub fn region(&self) -> Region {
        self.region
    }

    /// The number of sequences with at least one flanking hit.
    #[inline]
    pub fn len(&self) -> usize {
        self.flanks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.flanks.is_empty()
    }
}
