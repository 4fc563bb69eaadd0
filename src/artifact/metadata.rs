use serde::{Deserialize, Serialize};
use std::{
    fmt,
    io::ErrorKind,
    path::{Path, PathBuf},
};
use zoe::data::err::ResultWithErrorContext;

/// Name of the artifact-level metadata file, a sibling of the data directory.
pub const ARTIFACT_METADATA_FILE: &str = "metadata.yaml";
/// Name of the format-level metadata file written into the data directory.
pub const FORMAT_METADATA_FILE: &str = "metadata.yml";
/// Every output is Sanger / Illumina 1.8+ encoded.
pub const PHRED_OFFSET: u8 = 33;

/// The semantic type of a per-sample FASTQ artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactType {
    /// `SampleData[SequencesWithQuality]`
    SingleEnd,
    /// `SampleData[PairedEndSequencesWithQuality]`
    PairedEnd,
    /// `SampleData[JoinedSequencesWithQuality]`
    Joined,
}

impl ArtifactType {
    pub fn type_str(self) -> &'static str {
        match self {
            ArtifactType::SingleEnd => "SampleData[SequencesWithQuality]",
            ArtifactType::PairedEnd => "SampleData[PairedEndSequencesWithQuality]",
            ArtifactType::Joined => "SampleData[JoinedSequencesWithQuality]",
        }
    }

    pub fn from_type_str(s: &str) -> Option<Self> {
        [ArtifactType::SingleEnd, ArtifactType::PairedEnd, ArtifactType::Joined]
            .into_iter()
            .find(|t| t.type_str() == s.trim())
    }

    #[inline]
    pub fn is_paired(self) -> bool {
        self == ArtifactType::PairedEnd
    }
}

impl fmt::Display for ArtifactType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_str())
    }
}

#[derive(Deserialize)]
struct ArtifactMetadata {
    #[serde(rename = "type")]
    artifact_type: Option<String>,
}

#[derive(Serialize)]
struct FormatMetadata {
    #[serde(rename = "phred-offset")]
    phred_offset: u8,
}

fn invalid_metadata(path: &Path, detail: impl fmt::Display) -> std::io::Error {
    std::io::Error::new(
        ErrorKind::InvalidData,
        format!(
            "Invalid artifact metadata in {path}: {detail}",
            path = path.display()
        ),
    )
}

/// The location of `metadata.yaml` for the artifact whose data directory is
/// `data_dir`.
pub fn artifact_metadata_path(data_dir: impl AsRef<Path>) -> PathBuf {
    let data_dir = data_dir.as_ref();
    match data_dir.parent() {
        Some(parent) => parent.join(ARTIFACT_METADATA_FILE),
        None => data_dir.join("..").join(ARTIFACT_METADATA_FILE),
    }
}

/// Reads the artifact type from the `metadata.yaml` next to `data_dir`.
///
/// ## Errors
///
/// A missing file, malformed YAML, a missing `type` field, or a type other
/// than single-end, paired-end, or joined sequences with quality all produce
/// an "invalid artifact metadata" error. No default type is assumed.
pub fn view_artifact_type(data_dir: impl AsRef<Path>) -> std::io::Result<ArtifactType> {
    let path = artifact_metadata_path(data_dir);

    let contents = std::fs::read_to_string(&path).map_err(|e| invalid_metadata(&path, e))?;
    let metadata: ArtifactMetadata = serde_yaml::from_str(&contents).map_err(|e| invalid_metadata(&path, e))?;

    let Some(type_str) = metadata.artifact_type else {
        return Err(invalid_metadata(&path, "the 'type:' field is missing"));
    };

    ArtifactType::from_type_str(&type_str)
        .ok_or_else(|| invalid_metadata(&path, format!("unsupported artifact type '{type_str}'")))
}

/// Writes the fixed quality encoding declaration into `out_dir`.
pub fn write_metadata(out_dir: impl AsRef<Path>) -> std::io::Result<PathBuf> {
    let path = out_dir.as_ref().join(FORMAT_METADATA_FILE);
    let yaml = serde_yaml::to_string(&FormatMetadata {
        phred_offset: PHRED_OFFSET,
    })
    .map_err(std::io::Error::other)?;

    std::fs::write(&path, yaml).with_file_context("Failed to write the output metadata", &path)?;
    Ok(path)
}
