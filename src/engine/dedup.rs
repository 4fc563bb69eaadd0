use crate::{
    engine::ItsPosition,
    io::{MapFailedReadExt, WriteFileZip, open_fastq_full},
    utils::{IdMap, new_id_map},
};
use std::{
    fs::File,
    io::{BufRead, BufReader, ErrorKind, Write},
    path::Path,
};
use zoe::data::err::ResultWithErrorContext;

const UC_MIN_FIELDS: usize = 10;

/// Counts of reads kept and dropped while trimming one sample.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TrimStats {
    pub written: usize,
    pub dropped: usize,
}

/// The label of a read as the deduplication tool reports it: the header
/// without `@`, cut at the first whitespace.
fn read_label(header: &str) -> &str {
    let header = header.strip_prefix('@').unwrap_or(header);
    header.split_ascii_whitespace().next().unwrap_or_default()
}

/// Maps every read to the representative sequence it was collapsed into.
#[derive(Debug)]
pub struct Dedup {
    representatives: IdMap<String>,
}

impl Dedup {
    /// Parses a UC table. Centroid (`S`) records map a read to itself, hit
    /// (`H`) records map a read to its centroid, and cluster (`C`) records
    /// are skipped.
    ///
    /// ## Errors
    ///
    /// Truncated lines and unknown record types are reported with their line
    /// number.
    pub fn parse<R: BufRead>(reader: R) -> std::io::Result<Self> {
        let mut representatives: IdMap<String> = new_id_map();

        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            if line.is_empty() {
                continue;
            }

            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < UC_MIN_FIELDS {
                return Err(std::io::Error::new(
                    ErrorKind::InvalidData,
                    format!(
                        "UC line {n} has {found} columns, expected {UC_MIN_FIELDS}",
                        n = i + 1,
                        found = fields.len()
                    ),
                ));
            }

            let query = read_label(fields[8]);
            match fields[0] {
                "S" => {
                    representatives.insert(query.to_string(), query.to_string());
                }
                "H" => {
                    representatives.insert(query.to_string(), read_label(fields[9]).to_string());
                }
                "C" => {}
                other => {
                    return Err(std::io::Error::new(
                        ErrorKind::InvalidData,
                        format!("UC line {n} has the unknown record type '{other}'", n = i + 1),
                    ));
                }
            }
        }

        Ok(Self { representatives })
    }

    /// Reads the UC table written by the deduplication step.
    pub fn from_uc(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_failed_read(path)?;
        Ok(Self::parse(BufReader::new(file)).with_file_context("Failed to parse the UC table", path)?)
    }

    /// The representative of the read labelled `read_id`.
    #[inline]
    pub fn representative(&self, read_id: &str) -> Option<&str> {
        self.representatives.get(read_id).map(String::as_str)
    }

    /// Writes each read of `seq_file` trimmed to the region found on its
    /// representative. Reads whose representative has no region, or whose
    /// region runs past the end of the read, are dropped.
    ///
    /// ## Errors
    ///
    /// IO errors from either file and FASTQ parsing errors are propagated.
    pub fn create_trimmed_seqs(
        &self, seq_file: impl AsRef<Path>, out_path: impl AsRef<Path>, gzipped: bool, positions: &ItsPosition,
    ) -> std::io::Result<TrimStats> {
        let seq_file = seq_file.as_ref();
        let out_path = out_path.as_ref();

        let reader = open_fastq_full(seq_file)?;
        let mut writer = WriteFileZip::create(out_path, gzipped)?;
        let mut stats = TrimStats::default();

        for record in reader {
            let mut record = record.with_file_context("Failed to read FASTQ records from file", seq_file)?;

            let region = self
                .representative(read_label(&record.header))
                .and_then(|rep| positions.get(rep))
                .filter(|&(_, stop)| stop <= record.sequence.len());

            let Some((start, stop)) = region else {
                stats.dropped += 1;
                continue;
            };

            record.sequence.shorten_to(stop);
            record.quality.shorten_to(stop);
            record.sequence.cut_to_start(start);
            record.quality.cut_to_start(start);

            write!(writer, "{record}").with_file_context("Failed to write trimmed reads to file", out_path)?;
            stats.written += 1;
        }

        writer
            .finish()
            .with_file_context("Failed to write trimmed reads to file", out_path)?;
        Ok(stats)
    }
}
