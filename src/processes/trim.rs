use crate::{
    args::{ItsArgs, ParsedItsArgs, parse_its_args},
    artifact::{ArtifactType, ManifestWriter, SampleGroups, read_manifest, view_artifact_type, write_metadata},
    engine::TrimStats,
    io::check_distinct_dirs,
    processes::stage::stage_sample,
};
use clap::Args;
use log::{info, warn};
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};
use zoe::data::err::ResultWithErrorContext;

#[derive(Args, Debug)]
pub struct TrimSingleArgs {
    /// Data directory of a single-end or joined artifact, holding its MANIFEST
    pub data_dir: PathBuf,

    /// Directory receiving the trimmed single-end artifact
    pub out_dir: PathBuf,

    #[command(flatten)]
    pub its: ItsArgs,
}

#[derive(Args, Debug)]
pub struct TrimPairArgs {
    /// Data directory of a paired-end artifact, holding its MANIFEST
    pub data_dir: PathBuf,

    /// Directory receiving the trimmed single-end artifact
    pub out_dir: PathBuf,

    #[command(flatten)]
    pub its: ItsArgs,
}

pub fn trim_single_process(args: TrimSingleArgs) -> Result<(), std::io::Error> {
    let artifact_type = view_artifact_type(&args.data_dir)?;
    if artifact_type.is_paired() {
        return Err(std::io::Error::new(
            ErrorKind::InvalidInput,
            format!("trim-single does not accept {artifact_type} artifacts, use trim-pair instead."),
        ));
    }

    trim_artifact(&args.data_dir, &args.out_dir, artifact_type, &parse_its_args(args.its))?;
    Ok(())
}

pub fn trim_pair_process(args: TrimPairArgs) -> Result<(), std::io::Error> {
    let artifact_type = view_artifact_type(&args.data_dir)?;
    if !artifact_type.is_paired() {
        return Err(std::io::Error::new(
            ErrorKind::InvalidInput,
            format!(
                "trim-pair only accepts {paired} artifacts, but found {artifact_type}. Use trim-single instead.",
                paired = ArtifactType::PairedEnd
            ),
        ));
    }

    trim_artifact(&args.data_dir, &args.out_dir, artifact_type, &parse_its_args(args.its))?;
    Ok(())
}

/// The name of the trimmed output for the `barcode`-th sample.
fn output_file_name(sample_id: &str, barcode: usize) -> String {
    format!("{sample_id}_{barcode}_L001_R1_001.fastq.gz")
}

/// Trims every sample of the artifact in `data_dir`, writing a single-end
/// artifact to `out_dir`. Samples are processed one at a time and the first
/// failure stops the run. Outputs already written are left in place.
///
/// Returns the read counts summed over all samples.
pub fn trim_artifact(
    data_dir: &Path, out_dir: &Path, artifact_type: ArtifactType, args: &ParsedItsArgs,
) -> std::io::Result<TrimStats> {
    let SampleGroups { groups, single_end } = read_manifest(data_dir, artifact_type)?;

    std::fs::create_dir_all(out_dir).with_file_context("Failed to create the output directory", out_dir)?;
    check_distinct_dirs(data_dir, out_dir)?;

    info!(
        "Trimming {region} from {n} sample(s) of {artifact_type} using the {taxon} profiles",
        region = args.region,
        n = groups.len(),
        taxon = args.taxon.name()
    );

    let mut manifest = ManifestWriter::create(out_dir)?;
    let mut totals = TrimStats::default();

    for (barcode, group) in groups.iter().enumerate() {
        let (sample_id, sample) = stage_sample(group, single_end, args.threads, &args.tools, args.tempdir.as_deref())?;

        sample.deduplicate(args.threads, args.dedup, &args.tools)?;
        sample.search(&args.hmm_file, args.threads, &args.tools)?;

        let filename = output_file_name(&sample_id, barcode);
        let stats = sample.trim(args.region, out_dir.join(&filename))?;

        if stats.written == 0 {
            warn!("No {region} sequences were found in sample '{sample_id}'", region = args.region);
        }
        info!(
            "Sample '{sample_id}': wrote {written} trimmed reads to {filename}, dropped {dropped}",
            written = stats.written,
            dropped = stats.dropped
        );

        manifest.append(&sample_id, &filename)?;
        sample.close()?;

        totals.written += stats.written;
        totals.dropped += stats.dropped;
    }

    manifest.finish()?;
    write_metadata(out_dir)?;

    Ok(totals)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::args::Taxon;
    use clap::Parser;
    use flate2::{Compression, read::MultiGzDecoder, write::GzEncoder};
    use std::{
        fs::{self, File},
        io::{Read, Write},
    };

    const SEQ: &str = "AAAAAAAAAACCCCCCCCCCGGGGGGGGGGTTTTTTTTTT";
    const QUAL: &str = "!!!!!!!!!!IIIIIIIIII##########JJJJJJJJJJ";

    static FAKE_BBMERGE: &str = r#"#!/bin/sh
for arg in "$@"; do
    case "$arg" in
        in=*) input="${arg#in=}" ;;
        out=*) output="${arg#out=}" ;;
    esac
done
cp "$input" "$output"
"#;

    // Rejects output flags that do not belong to the chosen mode
    static FAKE_VSEARCH: &str = r#"#!/bin/sh
echo "$@" > "$(dirname "$0")/vsearch.argv"
while [ $# -gt 0 ]; do
    case "$1" in
        --derep_fulllength) mode=derep; shift ;;
        --cluster_size) mode=cluster; shift ;;
        --uc) uc="$2"; shift ;;
        --output) output="$2"; shift ;;
        --centroids) centroids="$2"; shift ;;
    esac
    shift
done
case "$mode" in
    derep) [ -n "$output" ] && [ -z "$centroids" ] || exit 2; rep="$output" ;;
    cluster) [ -n "$centroids" ] && [ -z "$output" ] || exit 2; rep="$centroids" ;;
    *) exit 2 ;;
esac
printf 'S\t0\t40\t*\t*\t*\t*\t*\tr1\t*\nH\t0\t40\t100.0\t+\t0\t0\t40M\tr2\tr1\nC\t0\t2\t*\t*\t*\t*\t*\tr1\t*\n' > "$uc"
printf '>r1\nACGT\n' > "$rep"
"#;

    static FAKE_HMMSEARCH: &str = r#"#!/bin/sh
while [ $# -gt 0 ]; do
    case "$1" in
        --domtblout) dom="$2"; shift ;;
    esac
    shift
done
printf '%s\n' \
    "r1 - 40 A.1_SSU - 103 1e-12 45.1 0.1 1 1 1e-14 1e-12 44.3 0.1 50 103 1 10 1 10 0.97 -" \
    "r1 - 40 A.2_5.8S - 85 1e-10 38.0 0.0 1 1 1e-12 1e-10 37.2 0.0 1 48 31 40 31 40 0.96 -" > "$dom"
"#;

    struct Fixture {
        root:     tempfile::TempDir,
        data_dir: PathBuf,
        out_dir:  PathBuf,
        hmm_dir:  PathBuf,
        scratch:  PathBuf,
    }

    fn write_gz(path: &Path, text: &str) {
        let mut encoder = GzEncoder::new(File::create(path).unwrap(), Compression::default());
        encoder.write_all(text.as_bytes()).unwrap();
        encoder.finish().unwrap();
    }

    fn read_gz(path: &Path) -> String {
        let mut text = String::new();
        MultiGzDecoder::new(File::open(path).unwrap())
            .read_to_string(&mut text)
            .unwrap();
        text
    }

    fn reads(side: char) -> String {
        ["r1", "r2", "r3"]
            .iter()
            .map(|id| format!("@{id} {side}:N:0:1\n{SEQ}\n+\n{QUAL}\n"))
            .collect()
    }

    #[cfg(unix)]
    fn write_script(path: &Path, contents: &str) {
        use std::os::unix::fs::PermissionsExt;
        fs::write(path, contents).unwrap();
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    fn fixture(artifact_type: ArtifactType, samples: &[&str]) -> Fixture {
        let root = tempfile::tempdir().unwrap();
        let artifact = root.path().join("artifact");
        let data_dir = artifact.join("data");
        let hmm_dir = root.path().join("hmms");
        let scratch = root.path().join("scratch");
        for dir in [&data_dir, &hmm_dir, &scratch] {
            fs::create_dir_all(dir).unwrap();
        }

        fs::write(
            artifact.join("metadata.yaml"),
            format!("uuid: 445cf54a-bf06-4852-8010-13a60fa1598c\ntype: {artifact_type}\nformat: DirFmt\n"),
        )
        .unwrap();
        fs::write(hmm_dir.join(Taxon::A.profile_file_name()), "HMMER3/f\n").unwrap();

        let mut manifest = String::from("sample-id,filename,direction\n");
        for (i, sample) in samples.iter().enumerate() {
            let r1 = format!("{sample}_{n}_L001_R1_001.fastq.gz", n = 2 * i);
            write_gz(&data_dir.join(&r1), &reads('1'));
            manifest.push_str(&format!("{sample},{r1},forward\n"));

            if artifact_type.is_paired() {
                let r2 = format!("{sample}_{n}_L001_R2_001.fastq.gz", n = 2 * i + 1);
                write_gz(&data_dir.join(&r2), &reads('2'));
                manifest.push_str(&format!("{sample},{r2},reverse\n"));
            }
        }
        fs::write(data_dir.join("MANIFEST"), manifest).unwrap();

        Fixture {
            out_dir: root.path().join("out"),
            root,
            data_dir,
            hmm_dir,
            scratch,
        }
    }

    #[cfg(unix)]
    fn tool_args(fixture: &Fixture) -> Vec<String> {
        let tools = fixture.root.path();
        write_script(&tools.join("bbmerge.sh"), FAKE_BBMERGE);
        write_script(&tools.join("vsearch"), FAKE_VSEARCH);
        write_script(&tools.join("hmmsearch"), FAKE_HMMSEARCH);

        let path = |p: &Path| p.to_str().unwrap().to_string();
        vec![
            path(&fixture.data_dir),
            path(&fixture.out_dir),
            "--region".to_string(),
            "ITS1".to_string(),
            "--taxa".to_string(),
            "A".to_string(),
            "--hmm-dir".to_string(),
            path(&fixture.hmm_dir),
            "--tempdir".to_string(),
            path(&fixture.scratch),
            "--bbmerge".to_string(),
            path(&tools.join("bbmerge.sh")),
            "--vsearch".to_string(),
            path(&tools.join("vsearch")),
            "--hmmsearch".to_string(),
            path(&tools.join("hmmsearch")),
        ]
    }

    #[derive(Parser)]
    struct SingleCli {
        #[command(flatten)]
        args: TrimSingleArgs,
    }

    #[derive(Parser)]
    struct PairCli {
        #[command(flatten)]
        args: TrimPairArgs,
    }

    fn expected_reads() -> String {
        format!(
            "@r1 1:N:0:1\n{s}\n+\n{q}\n@r2 1:N:0:1\n{s}\n+\n{q}\n",
            s = &SEQ[10..30],
            q = &QUAL[10..30]
        )
    }

    #[cfg(unix)]
    #[test]
    fn test_trim_pair_end_to_end() {
        let fixture = fixture(ArtifactType::PairedEnd, &["4774-1-MSITS3", "4774-2-MSITS3"]);
        let args = PairCli::parse_from(std::iter::once("trim-pair".to_string()).chain(tool_args(&fixture))).args;

        trim_pair_process(args).unwrap();

        let out = &fixture.out_dir;
        assert_eq!(
            fs::read_to_string(out.join("MANIFEST")).unwrap(),
            "sample-id,filename,direction\n\
             4774-1-MSITS3,4774-1-MSITS3_0_L001_R1_001.fastq.gz,forward\n\
             4774-2-MSITS3,4774-2-MSITS3_1_L001_R1_001.fastq.gz,forward\n"
        );
        assert_eq!(
            fs::read_to_string(out.join("metadata.yml")).unwrap().trim(),
            "phred-offset: 33"
        );
        assert_eq!(read_gz(&out.join("4774-1-MSITS3_0_L001_R1_001.fastq.gz")), expected_reads());
        assert_eq!(read_gz(&out.join("4774-2-MSITS3_1_L001_R1_001.fastq.gz")), expected_reads());

        // Working directories are removed
        assert_eq!(fs::read_dir(&fixture.scratch).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_trim_single_end_to_end() {
        let fixture = fixture(ArtifactType::SingleEnd, &["s1"]);
        let args = SingleCli::parse_from(std::iter::once("trim-single".to_string()).chain(tool_args(&fixture))).args;
        let artifact_type = view_artifact_type(&args.data_dir).unwrap();
        let parsed = parse_its_args(args.its);

        let totals = trim_artifact(&fixture.data_dir, &fixture.out_dir, artifact_type, &parsed).unwrap();

        assert_eq!(totals, TrimStats { written: 2, dropped: 1 });
        assert_eq!(read_gz(&fixture.out_dir.join("s1_0_L001_R1_001.fastq.gz")), expected_reads());

        let argv = fs::read_to_string(fixture.root.path().join("vsearch.argv")).unwrap();
        assert!(argv.contains("--cluster_size"), "{argv}");
        assert!(argv.contains("--id 0.995 --centroids"), "{argv}");
        assert!(!argv.contains("--derep_fulllength"), "{argv}");
    }

    #[cfg(unix)]
    #[test]
    fn test_trim_single_dereplicate() {
        let fixture = fixture(ArtifactType::SingleEnd, &["s1"]);
        let argv = std::iter::once("trim-single".to_string())
            .chain(tool_args(&fixture))
            .chain(std::iter::once("--slow".to_string()));
        let args = SingleCli::parse_from(argv).args;

        trim_single_process(args).unwrap();

        let argv = fs::read_to_string(fixture.root.path().join("vsearch.argv")).unwrap();
        assert!(argv.contains("--derep_fulllength"), "{argv}");
        assert!(argv.contains("--output"), "{argv}");
        assert!(!argv.contains("--cluster_size"), "{argv}");
        assert!(!argv.contains("--centroids"), "{argv}");
        assert_eq!(read_gz(&fixture.out_dir.join("s1_0_L001_R1_001.fastq.gz")), expected_reads());
        assert_eq!(fs::read_dir(&fixture.scratch).unwrap().count(), 0);
    }

    #[test]
    fn test_artifact_type_mismatch() {
        let paired = fixture(ArtifactType::PairedEnd, &["s1"]);
        let single = fixture(ArtifactType::Joined, &["s1"]);
        let argv = |f: &Fixture| {
            vec![
                "trim".to_string(),
                f.data_dir.to_str().unwrap().to_string(),
                f.out_dir.to_str().unwrap().to_string(),
                "--region".to_string(),
                "ITS2".to_string(),
                "--hmm-dir".to_string(),
                f.hmm_dir.to_str().unwrap().to_string(),
            ]
        };

        let err = trim_single_process(SingleCli::parse_from(argv(&paired)).args).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        let err = trim_pair_process(PairCli::parse_from(argv(&single)).args).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        // Nothing is written when the artifact type is rejected
        assert!(!paired.out_dir.exists());
        assert!(!single.out_dir.exists());
    }

    #[test]
    fn test_output_file_name() {
        assert_eq!(output_file_name("4774-1-MSITS3", 0), "4774-1-MSITS3_0_L001_R1_001.fastq.gz");
        assert_eq!(output_file_name("s2", 11), "s2_11_L001_R1_001.fastq.gz");
    }
}
