use crate::{
    artifact::SampleGroup,
    engine::{SampleKind, SeqSample, ToolPaths},
    io::open_fastq_head,
    utils::paired_reads::{check_paired_headers, looks_interleaved},
};
use log::info;
use std::{io::ErrorKind, path::Path};
use zoe::data::err::ResultWithErrorContext;

/// The number of leading records validated in each input file.
pub const CHECK_RECORDS: usize = 1000;
/// The number of leading records inspected when looking for interleaving.
const INTERLEAVE_CHECK_RECORDS: usize = 100;

/// Reads the headers of up to `n` leading records, checking each record's
/// sequence and quality lengths agree.
fn read_head_headers(path: &Path, n: usize) -> std::io::Result<Vec<String>> {
    let reader = open_fastq_head(path)?;
    let mut headers = Vec::with_capacity(n.min(CHECK_RECORDS));

    for record in reader.take(n) {
        let record = record.with_file_context("Failed to read FASTQ records from file", path)?;
        if record.sequence.len() != record.quality.len() {
            return Err(std::io::Error::new(
                ErrorKind::InvalidData,
                format!(
                    "The record '{header}' in {path} has {s} bases but {q} quality scores",
                    header = record.header,
                    path = path.display(),
                    s = record.sequence.len(),
                    q = record.quality.len()
                ),
            ));
        }
        headers.push(record.header);
    }

    Ok(headers)
}

fn validate_fastqs(fastq: &Path, fastq2: Option<&Path>) -> std::io::Result<()> {
    let headers = read_head_headers(fastq, CHECK_RECORDS)?;
    if headers.is_empty() {
        return Err(std::io::Error::new(
            ErrorKind::InvalidData,
            format!("{path} contains no FASTQ records", path = fastq.display()),
        ));
    }

    if let Some(fastq2) = fastq2 {
        let headers2 = read_head_headers(fastq2, CHECK_RECORDS)?;
        if headers.len() != headers2.len() {
            return Err(std::io::Error::new(
                ErrorKind::InvalidData,
                format!(
                    "The paired files have different numbers of records ({n1} and {n2} within the first {CHECK_RECORDS})",
                    n1 = headers.len(),
                    n2 = headers2.len()
                ),
            ));
        }

        for (h1, h2) in headers.iter().zip(&headers2) {
            check_paired_headers(h1, h2)?;
        }
    }

    Ok(())
}

/// Checks that the leading records of the input files are well-formed FASTQ.
/// With two files, the records must also pair up one to one.
///
/// ## Errors
///
/// Any problem is reported as a problem with the FASTQ file(s), naming them.
pub fn check_fastqs(fastq: impl AsRef<Path>, fastq2: Option<&Path>) -> std::io::Result<()> {
    let fastq = fastq.as_ref();

    validate_fastqs(fastq, fastq2).map_err(|e| {
        let files = match fastq2 {
            Some(fastq2) => format!("{} and {}", fastq.display(), fastq2.display()),
            None => fastq.display().to_string(),
        };
        std::io::Error::new(
            e.kind(),
            format!("There is a problem with the fastq file(s) {files}:\n{e}"),
        )
    })
}

/// Determines whether a sample is paired and, if so, whether its mates are
/// interleaved in a single file. Returns `(paired, interleaved)`.
///
/// Two files are always paired. Single-end artifacts are never paired.
/// Otherwise, the leading records decide.
pub fn is_paired(fastq: impl AsRef<Path>, fastq2: Option<&Path>, single_end: bool) -> std::io::Result<(bool, bool)> {
    if fastq2.is_some() {
        return Ok((true, false));
    }
    if single_end {
        return Ok((false, false));
    }

    let headers = read_head_headers(fastq.as_ref(), INTERLEAVE_CHECK_RECORDS)?;
    let even = headers.len() - headers.len() % 2;
    let interleaved = looks_interleaved(&headers[..even]);

    Ok((interleaved, interleaved))
}

fn require_file(path: &Path) -> std::io::Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(std::io::Error::new(
            ErrorKind::NotFound,
            format!(
                "There is a problem with the fastq file(s): {path} does not exist",
                path = path.display()
            ),
        ))
    }
}

/// Validates the files of one sample and prepares it for trimming. Paired
/// samples are merged before returning.
///
/// ## Errors
///
/// Missing or malformed FASTQ files, a missing merge tool, and a failed merge
/// are all propagated with distinct messages.
pub fn stage_sample(
    group: &SampleGroup, single_end: bool, threads: usize, tools: &ToolPaths, tempdir: Option<&Path>,
) -> std::io::Result<(String, SeqSample)> {
    let fastq = group.forward.as_path();
    let fastq2 = group.reverse.as_deref();

    require_file(fastq)?;
    if let Some(fastq2) = fastq2 {
        require_file(fastq2)?;
    }

    check_fastqs(fastq, fastq2)?;
    let (paired, interleaved) = is_paired(fastq, fastq2, single_end)?;

    let kind = match (paired, interleaved, fastq2) {
        (true, false, Some(fastq2)) => SampleKind::PairedSeparate {
            fastq:  fastq.to_path_buf(),
            fastq2: fastq2.to_path_buf(),
        },
        (true, true, None) => SampleKind::PairedInterleaved {
            fastq: fastq.to_path_buf(),
        },
        _ => SampleKind::Unpaired {
            fastq: fastq.to_path_buf(),
        },
    };

    info!("Sample '{id}' has {kind} reads", id = group.sample_id);

    let sample = SeqSample::new(kind, tempdir)?;
    if sample.kind().is_paired() {
        sample.merge(threads, tools)?;
    }

    Ok((group.sample_id.clone(), sample))
}
