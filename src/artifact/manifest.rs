use crate::{
    artifact::ArtifactType,
    io::{MapFailedReadExt, MapFailedWriteExt},
    utils::{IdMap, new_id_map},
};
use std::{
    fmt,
    fs::File,
    io::{ErrorKind, Read},
    path::{Path, PathBuf},
    str::FromStr,
};

/// Name of the manifest inside an artifact data directory.
pub const MANIFEST_FILE: &str = "MANIFEST";
const MANIFEST_HEADER: [&str; 3] = ["sample-id", "filename", "direction"];

/// The read direction column of a manifest row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("forward") {
            Ok(Direction::Forward)
        } else if s.eq_ignore_ascii_case("reverse") {
            Ok(Direction::Reverse)
        } else {
            Err(format!("'{s}' is not a read direction, expected 'forward' or 'reverse'"))
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Forward => f.write_str("forward"),
            Direction::Reverse => f.write_str("reverse"),
        }
    }
}

/// One data row of a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub sample_id: String,
    pub filename:  String,
    pub direction: Direction,
}

/// The files making up one sample. `reverse` is only present for paired-end
/// artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleGroup {
    pub sample_id: String,
    pub forward:   PathBuf,
    pub reverse:   Option<PathBuf>,
}

/// All samples of an input artifact.
///
/// The groups follow the order in which sample ids first appear, but callers
/// should treat them as a set.
#[derive(Debug)]
pub struct SampleGroups {
    pub groups:     Vec<SampleGroup>,
    pub single_end: bool,
}

fn invalid_manifest(detail: impl fmt::Display) -> std::io::Error {
    std::io::Error::new(ErrorKind::InvalidData, format!("Invalid MANIFEST: {detail}"))
}

/// Parses manifest rows, skipping the header line and `#` comments, which may
/// be indented.
///
/// ## Errors
///
/// Rows without exactly three columns, unknown directions, and CSV syntax
/// errors are reported with their position.
pub fn parse_manifest_entries<R: Read>(reader: R) -> std::io::Result<Vec<ManifestEntry>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let mut entries = Vec::new();

    for result in csv_reader.records() {
        let record = result.map_err(invalid_manifest)?;
        let line = record.position().map_or(0, csv::Position::line);

        if record.iter().all(str::is_empty)
            || record.get(0).is_some_and(|field| field.starts_with('#'))
            || record.iter().eq(MANIFEST_HEADER)
        {
            continue;
        }

        if record.len() != 3 {
            return Err(invalid_manifest(format!(
                "line {line} has {n} columns, expected sample-id,filename,direction",
                n = record.len()
            )));
        }
        let (sample_id, filename, direction) = (&record[0], &record[1], &record[2]);

        let direction = direction
            .parse::<Direction>()
            .map_err(|e| invalid_manifest(format!("line {line}: {e}")))?;

        entries.push(ManifestEntry {
            sample_id: sample_id.to_string(),
            filename: filename.to_string(),
            direction,
        });
    }

    Ok(entries)
}

/// Groups manifest rows by sample.
///
/// Paired-end artifacts need exactly one forward and one reverse file per
/// sample. For single-end and joined artifacts every row is its own sample
/// with no reverse mate, whatever its direction column says.
pub fn group_entries(
    entries: Vec<ManifestEntry>, data_dir: &Path, artifact_type: ArtifactType,
) -> std::io::Result<Vec<SampleGroup>> {
    if artifact_type.is_paired() {
        group_paired_entries(entries, data_dir)
    } else {
        group_unpaired_entries(entries, data_dir)
    }
}

fn group_paired_entries(entries: Vec<ManifestEntry>, data_dir: &Path) -> std::io::Result<Vec<SampleGroup>> {
    let mut index_by_id: IdMap<usize> = new_id_map();
    let mut files: Vec<(String, Vec<String>, Vec<String>)> = Vec::new();

    for ManifestEntry {
        sample_id,
        filename,
        direction,
    } in entries
    {
        let index = *index_by_id.entry(sample_id.clone()).or_insert_with(|| {
            files.push((sample_id, Vec::new(), Vec::new()));
            files.len() - 1
        });

        let (_, forward, reverse) = &mut files[index];
        match direction {
            Direction::Forward => forward.push(filename),
            Direction::Reverse => reverse.push(filename),
        }
    }

    files
        .into_iter()
        .map(|(sample_id, mut forward, mut reverse)| match (forward.pop(), reverse.pop()) {
            (Some(f), Some(r)) if forward.is_empty() && reverse.is_empty() => Ok(SampleGroup {
                sample_id,
                forward: data_dir.join(f),
                reverse: Some(data_dir.join(r)),
            }),
            (f, r) => Err(std::io::Error::new(
                ErrorKind::InvalidData,
                format!(
                    "The number of forward and reverse samples do not match for sample '{sample_id}': \
                     {nf} forward, {nr} reverse.",
                    nf = forward.len() + usize::from(f.is_some()),
                    nr = reverse.len() + usize::from(r.is_some()),
                ),
            )),
        })
        .collect()
}

fn group_unpaired_entries(entries: Vec<ManifestEntry>, data_dir: &Path) -> std::io::Result<Vec<SampleGroup>> {
    let mut seen: IdMap<()> = new_id_map();
    let mut groups = Vec::with_capacity(entries.len());

    for entry in entries {
        if seen.insert(entry.sample_id.clone(), ()).is_some() {
            return Err(invalid_manifest(format!(
                "sample '{id}' is listed more than once in a single-end artifact",
                id = entry.sample_id
            )));
        }

        groups.push(SampleGroup {
            forward:   data_dir.join(&entry.filename),
            sample_id: entry.sample_id,
            reverse:   None,
        });
    }

    Ok(groups)
}

/// Reads and groups the `MANIFEST` of the artifact data directory.
///
/// ## Errors
///
/// A missing or malformed manifest, a manifest without samples, or a
/// forward/reverse count mismatch for paired-end data are all fatal.
pub fn read_manifest(data_dir: impl AsRef<Path>, artifact_type: ArtifactType) -> std::io::Result<SampleGroups> {
    let data_dir = data_dir.as_ref();
    let path = data_dir.join(MANIFEST_FILE);
    let file = File::open(&path).map_failed_read(&path)?;

    let entries = parse_manifest_entries(file)?;
    let groups = group_entries(entries, data_dir, artifact_type)?;

    if groups.is_empty() {
        return Err(invalid_manifest(format!("{path} lists no samples", path = path.display())));
    }

    Ok(SampleGroups {
        groups,
        single_end: artifact_type == ArtifactType::SingleEnd,
    })
}

/// Incrementally writes the manifest of the output artifact. Every row is
/// flushed as soon as it is appended, so the manifest always reflects the
/// samples already written.
pub struct ManifestWriter {
    writer: csv::Writer<File>,
    path:   PathBuf,
}

impl ManifestWriter {
    /// Creates `MANIFEST` in `out_dir` and writes the header.
    pub fn create(out_dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = out_dir.as_ref().join(MANIFEST_FILE);
        let mut writer = csv::Writer::from_path(&path).map_err(std::io::Error::from).map_failed_write(&path)?;
        writer.write_record(MANIFEST_HEADER)?;
        writer.flush()?;
        Ok(Self { writer, path })
    }

    /// Appends a forward read file for `sample_id`.
    pub fn append(&mut self, sample_id: &str, filename: &str) -> std::io::Result<()> {
        let direction = Direction::Forward.to_string();
        self.writer.write_record([sample_id, filename, direction.as_str()])?;
        self.writer.flush()
    }

    /// Flushes and closes the manifest, returning its path.
    pub fn finish(mut self) -> std::io::Result<PathBuf> {
        self.writer.flush()?;
        Ok(self.path)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    static PAIRED_MANIFEST: &str = "sample-id,filename,direction\n\
        # direction is not meaningful in this file for single\n\
        # end reads, but we are supporting it for consistency\n\
        4774-1-MSITS3,4774-1-MSITS3_0_L001_R1_001.fastq.gz,forward\n\
        4774-1-MSITS3,4774-1-MSITS3_1_L001_R2_001.fastq.gz,reverse\n";

    static ALL_FORWARD_MANIFEST: &str = "sample-id,filename,direction\n\
        4774-1-MSITS3,4774-1-MSITS3_0_L001_R1_001.fastq.gz,forward\n\
        4774-1-MSITS3,4774-1-MSITS3_1_L001_R2_001.fastq.gz,forward\n";

    fn groups_from(manifest: &str, artifact_type: ArtifactType) -> std::io::Result<Vec<SampleGroup>> {
        let entries = parse_manifest_entries(manifest.as_bytes())?;
        group_entries(entries, Path::new("data"), artifact_type)
    }

    fn file_name(path: &Path) -> &str {
        path.file_name().and_then(|f| f.to_str()).unwrap()
    }

    #[test]
    fn test_fastq_id_maker() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(MANIFEST_FILE), PAIRED_MANIFEST).unwrap();

        let SampleGroups { groups, single_end } = read_manifest(dir.path(), ArtifactType::PairedEnd).unwrap();
        assert!(!single_end);
        assert_eq!(groups.len(), 1);

        let group = &groups[0];
        assert_eq!(group.sample_id, "4774-1-MSITS3");
        assert_eq!(file_name(&group.forward), "4774-1-MSITS3_0_L001_R1_001.fastq.gz");
        assert_eq!(
            group.reverse.as_deref().map(file_name),
            Some("4774-1-MSITS3_1_L001_R2_001.fastq.gz")
        );
        assert_eq!(group.forward.parent(), Some(dir.path()));
    }

    #[test]
    fn test_paired_count_mismatch() {
        let err = groups_from(ALL_FORWARD_MANIFEST, ArtifactType::PairedEnd).unwrap_err();
        assert!(err.to_string().contains("do not match"), "{err}");

        let missing_reverse = "sample-id,filename,direction\na,a_R1.fastq.gz,forward\n";
        assert!(groups_from(missing_reverse, ArtifactType::PairedEnd).is_err());
    }

    #[test]
    fn test_paired_groups_per_sample() {
        let manifest = "sample-id,filename,direction\n\
            s2,s2_R2.fastq.gz,reverse\n\
            s1,s1_R1.fastq.gz,forward\n\
            s2,s2_R1.fastq.gz,forward\n\
            s1,s1_R2.fastq.gz,reverse\n";
        let groups = groups_from(manifest, ArtifactType::PairedEnd).unwrap();

        assert_eq!(groups.len(), 2);
        for group in &groups {
            let forward = file_name(&group.forward);
            let reverse = group.reverse.as_deref().map(file_name).unwrap();
            assert_eq!(forward, format!("{}_R1.fastq.gz", group.sample_id));
            assert_eq!(reverse, format!("{}_R2.fastq.gz", group.sample_id));
        }
    }

    #[test]
    fn test_single_end_groups() {
        // The same sample listed twice is not a valid single-end artifact
        assert!(groups_from(PAIRED_MANIFEST, ArtifactType::SingleEnd).is_err());

        let manifest = "sample-id,filename,direction\n\
            a,a.fastq.gz,forward\n\
            b,b.fastq.gz,reverse\n";
        let groups = groups_from(manifest, ArtifactType::Joined).unwrap();
        assert_eq!(groups.len(), 2);
        assert!(groups.iter().all(|g| g.reverse.is_none()));
        assert_eq!(file_name(&groups[1].forward), "b.fastq.gz");
    }

    #[test]
    fn test_quoted_filename() {
        let manifest = "sample-id,filename,direction\ns1,\"s1,lane1.fastq.gz\",forward\n";
        let groups = groups_from(manifest, ArtifactType::SingleEnd).unwrap();
        assert_eq!(file_name(&groups[0].forward), "s1,lane1.fastq.gz");
    }

    #[test]
    fn test_malformed_rows() {
        assert!(parse_manifest_entries("s1,s1.fastq.gz\n".as_bytes()).is_err());
        assert!(parse_manifest_entries("s1,s1.fastq.gz,sideways\n".as_bytes()).is_err());
        assert!(parse_manifest_entries("# only a comment\n".as_bytes()).unwrap().is_empty());
    }

    #[test]
    fn test_indented_comments() {
        let manifest = "sample-id,filename,direction\n\
            \t# sequenced on lane 1\n\
            s1,s1_R1.fastq.gz,forward\n\
            \x20  # retired, kept for reference\n\
            s2,s2_R1.fastq.gz,forward\n";
        let entries = parse_manifest_entries(manifest.as_bytes()).unwrap();
        let ids: Vec<_> = entries.iter().map(|e| e.sample_id.as_str()).collect();
        assert_eq!(ids, ["s1", "s2"]);
    }

    #[test]
    fn test_manifest_writer() {
        let out = tempfile::tempdir().unwrap();
        let mut writer = ManifestWriter::create(out.path()).unwrap();
        writer.append("s1", "s1_0_L001_R1_001.fastq.gz").unwrap();
        writer.append("s2", "s2_1_L001_R1_001.fastq.gz").unwrap();
        let path = writer.finish().unwrap();

        assert_eq!(
            std::fs::read_to_string(path).unwrap(),
            "sample-id,filename,direction\n\
             s1,s1_0_L001_R1_001.fastq.gz,forward\n\
             s2,s2_1_L001_R1_001.fastq.gz,forward\n"
        );
    }
}
