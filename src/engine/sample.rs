use crate::{
    args::Region,
    engine::{Dedup, ItsPosition, ToolError, ToolPaths, TrimStats, run_tool},
};
use log::{debug, warn};
use std::{
    ffi::OsString,
    fmt,
    path::{Path, PathBuf},
    process::Command,
};
use tempfile::TempDir;
use zoe::data::err::ResultWithErrorContext;

const MERGED_FILE: &str = "seq.fq.gz";
const REP_FILE: &str = "rep.fa";
const UC_FILE: &str = "uc.txt";
const DOM_FILE: &str = "dom.tab";
/// Minimum bit score for `hmmsearch` to report a domain.
const HMM_SCORE_THRESHOLD: &str = "10";

/// How reads are collapsed into representatives before the profile search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DedupMode {
    /// Exact full-length dereplication.
    Dereplicate,
    /// Clustering at the given identity.
    Cluster { id: f64 },
}

/// The layout of a sample's reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SampleKind {
    /// Mates alternate within one file.
    PairedInterleaved { fastq: PathBuf },
    /// Mates are in two files.
    PairedSeparate { fastq: PathBuf, fastq2: PathBuf },
    /// Single-end or already merged reads.
    Unpaired { fastq: PathBuf },
}

impl SampleKind {
    #[inline]
    pub fn is_paired(&self) -> bool {
        !matches!(self, SampleKind::Unpaired { .. })
    }
}

impl fmt::Display for SampleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleKind::PairedInterleaved { .. } => f.write_str("interleaved paired-end"),
            SampleKind::PairedSeparate { .. } => f.write_str("paired-end"),
            SampleKind::Unpaired { .. } => f.write_str("single-end"),
        }
    }
}

/// One sample being trimmed, together with the scratch directory holding its
/// intermediate files. The directory is removed when the sample is closed or
/// dropped.
#[derive(Debug)]
pub struct SeqSample {
    kind:     SampleKind,
    tempdir:  TempDir,
    seq_file: PathBuf,
}

fn key_value(key: &str, path: &Path) -> OsString {
    let mut arg = OsString::from(key);
    arg.push("=");
    arg.push(path);
    arg
}

impl SeqSample {
    /// Creates the scratch directory for a sample, inside `parent` if given or
    /// the system temporary directory otherwise.
    ///
    /// ## Errors
    ///
    /// Failing to create the directory is propagated with context.
    pub fn new(kind: SampleKind, parent: Option<&Path>) -> std::io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("itsxpress-");

        let tempdir = match parent {
            Some(parent) => builder
                .tempdir_in(parent)
                .with_file_context("Failed to create a working directory in", parent)?,
            None => builder.tempdir().with_context("Failed to create a working directory")?,
        };

        let seq_file = match &kind {
            SampleKind::Unpaired { fastq } => fastq.clone(),
            _ => tempdir.path().join(MERGED_FILE),
        };

        Ok(Self {
            kind,
            tempdir,
            seq_file,
        })
    }

    #[inline]
    pub fn kind(&self) -> &SampleKind {
        &self.kind
    }

    /// The reads that are deduplicated and trimmed. For paired samples this is
    /// the merged output, which only exists after [`SeqSample::merge`].
    #[inline]
    pub fn seq_file(&self) -> &Path {
        &self.seq_file
    }

    #[inline]
    pub fn rep_file(&self) -> PathBuf {
        self.tempdir.path().join(REP_FILE)
    }

    #[inline]
    pub fn uc_file(&self) -> PathBuf {
        self.tempdir.path().join(UC_FILE)
    }

    #[inline]
    pub fn dom_file(&self) -> PathBuf {
        self.tempdir.path().join(DOM_FILE)
    }

    /// Merges paired reads with BBMerge into [`SeqSample::seq_file`]. Unpaired
    /// samples are left untouched.
    pub fn merge(&self, threads: usize, tools: &ToolPaths) -> Result<(), ToolError> {
        let mut command = Command::new(&tools.bbmerge);

        match &self.kind {
            SampleKind::Unpaired { .. } => return Ok(()),
            SampleKind::PairedInterleaved { fastq } => {
                command.arg(key_value("in", fastq)).arg("interleaved=t");
            }
            SampleKind::PairedSeparate { fastq, fastq2 } => {
                command.arg(key_value("in", fastq)).arg(key_value("in2", fastq2));
            }
        }

        command.arg(key_value("out", &self.seq_file)).arg(format!("t={threads}"));
        run_tool("bbmerge.sh", &mut command)
    }

    /// Collapses the reads into representatives with VSEARCH, writing the
    /// representative FASTA and the UC mapping of every read.
    pub fn deduplicate(&self, threads: usize, mode: DedupMode, tools: &ToolPaths) -> Result<(), ToolError> {
        let mut command = Command::new(&tools.vsearch);

        match mode {
            DedupMode::Dereplicate => {
                command
                    .arg("--derep_fulllength")
                    .arg(&self.seq_file)
                    .arg("--output")
                    .arg(self.rep_file());
            }
            DedupMode::Cluster { id } => {
                command
                    .arg("--cluster_size")
                    .arg(&self.seq_file)
                    .arg("--id")
                    .arg(id.to_string())
                    .arg("--centroids")
                    .arg(self.rep_file());
            }
        }

        command
            .arg("--uc")
            .arg(self.uc_file())
            .args(["--strand", "plus", "--threads"])
            .arg(threads.to_string());
        run_tool("vsearch", &mut command)
    }

    /// Searches the representatives against the HMM profile, writing the
    /// domain table.
    pub fn search(&self, hmm_file: &Path, threads: usize, tools: &ToolPaths) -> Result<(), ToolError> {
        if !hmm_file.is_file() {
            return Err(ToolError::ProfileNotFound {
                path: hmm_file.to_path_buf(),
            });
        }

        let mut command = Command::new(&tools.hmmsearch);
        command
            .arg("--domtblout")
            .arg(self.dom_file())
            .args(["-T", HMM_SCORE_THRESHOLD, "--cpu"])
            .arg(threads.to_string())
            .arg(hmm_file)
            .arg(self.rep_file());
        run_tool("hmmsearch", &mut command)
    }

    /// Writes every read trimmed to `region` into `out_path` as gzip FASTQ.
    pub fn trim(&self, region: Region, out_path: impl AsRef<Path>) -> std::io::Result<TrimStats> {
        let positions = ItsPosition::from_domtable(self.dom_file(), region)?;
        if positions.is_empty() {
            warn!("hmmsearch reported no domains flanking {region}");
        } else {
            debug!(
                "{n} representative sequences have at least one domain flanking {region}",
                n = positions.len(),
                region = positions.region()
            );
        }

        let dedup = Dedup::from_uc(self.uc_file())?;
        debug!("Trimming reads from {path}", path = self.seq_file().display());
        dedup.create_trimmed_seqs(self.seq_file(), out_path, true, &positions)
    }

    /// Removes the scratch directory.
    pub fn close(self) -> std::io::Result<()> {
        let path = self.tempdir.path().to_path_buf();
        Ok(self
            .tempdir
            .close()
            .with_file_context("Failed to remove the working directory", &path)?)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_seq_file_by_kind() {
        let scratch = tempfile::tempdir().unwrap();

        let unpaired = SeqSample::new(
            SampleKind::Unpaired {
                fastq: PathBuf::from("reads.fastq.gz"),
            },
            Some(scratch.path()),
        )
        .unwrap();
        assert_eq!(unpaired.seq_file(), Path::new("reads.fastq.gz"));
        assert!(!unpaired.kind().is_paired());

        let paired = SeqSample::new(
            SampleKind::PairedSeparate {
                fastq:  PathBuf::from("r1.fastq.gz"),
                fastq2: PathBuf::from("r2.fastq.gz"),
            },
            Some(scratch.path()),
        )
        .unwrap();
        assert!(paired.seq_file().starts_with(scratch.path()));
        assert!(paired.kind().is_paired());
        assert_eq!(paired.kind().to_string(), "paired-end");
    }

    #[test]
    fn test_close_removes_tempdir() {
        let scratch = tempfile::tempdir().unwrap();
        let sample = SeqSample::new(
            SampleKind::Unpaired {
                fastq: PathBuf::from("reads.fastq"),
            },
            Some(scratch.path()),
        )
        .unwrap();

        let workdir = sample.uc_file().parent().unwrap().to_path_buf();
        assert!(workdir.is_dir());
        sample.close().unwrap();
        assert!(!workdir.exists());
    }

    #[test]
    fn test_missing_profile() {
        let scratch = tempfile::tempdir().unwrap();
        let sample = SeqSample::new(
            SampleKind::Unpaired {
                fastq: PathBuf::from("reads.fastq"),
            },
            Some(scratch.path()),
        )
        .unwrap();
        let tools = ToolPaths {
            bbmerge:   PathBuf::from("bbmerge.sh"),
            vsearch:   PathBuf::from("vsearch"),
            hmmsearch: PathBuf::from("hmmsearch"),
        };

        let err = sample.search(&scratch.path().join("F.hmm"), 1, &tools).unwrap_err();
        assert!(matches!(err, ToolError::ProfileNotFound { .. }));
    }

    #[test]
    fn test_unpaired_merge_is_noop() {
        let sample = SeqSample::new(
            SampleKind::Unpaired {
                fastq: PathBuf::from("reads.fastq"),
            },
            None,
        )
        .unwrap();
        let tools = ToolPaths {
            bbmerge:   PathBuf::from("/nonexistent/bbmerge.sh"),
            vsearch:   PathBuf::from("vsearch"),
            hmmsearch: PathBuf::from("hmmsearch"),
        };
        assert!(sample.merge(1, &tools).is_ok());
    }
}
