use crate::engine::{DedupMode, ToolPaths};
use clap::{Args, ValueEnum, builder::PossibleValue};
use std::{env, fmt, path::PathBuf, str::FromStr};

pub const DEFAULT_CLUSTER_ID: f64 = 0.995;
const MIN_CLUSTER_ID: f64 = 0.97;

#[derive(Args, Debug)]
pub struct ItsArgs {
    #[arg(short = 'r', long, value_enum)]
    /// The region to keep: ITS1, ITS2, or ALL (ITS1, the 5.8S gene, and ITS2)
    pub region: Region,

    #[arg(short = 'x', long = "taxa", value_enum, default_value = "F")]
    /// The taxonomic group that was sequenced, selecting the HMM profile. See
    /// the possible values for the code of each group
    pub taxa: Taxon,

    #[arg(short = 't', long, default_value_t = 1)]
    /// Number of threads handed to bbmerge, vsearch, and hmmsearch. Use 0 for
    /// all logical cores (capped by NSLOTS when it is set)
    pub threads: usize,

    #[arg(long)]
    /// Dereplicate identical reads instead of clustering at high identity
    pub slow: bool,

    #[arg(long, value_parser = validate_cluster_id, default_value_t = DEFAULT_CLUSTER_ID)]
    /// Identity used when clustering reads, between 0.97 and 1.0. Ignored with
    /// --slow
    pub cluster_id: f64,

    #[arg(long, env = "ITSXPRESS_HMM_DIR", default_value = "ITSx_db/HMMs")]
    /// Directory holding the ITSx HMM profiles, one `<code>.hmm` per taxon
    pub hmm_dir: PathBuf,

    #[arg(long)]
    /// Parent directory for per-sample working directories. Defaults to the
    /// system temporary directory
    pub tempdir: Option<PathBuf>,

    #[command(flatten)]
    pub tools: ToolArgs,
}

/// Executables for the external tools, found on `PATH` unless overridden.
#[derive(Args, Debug)]
pub struct ToolArgs {
    #[arg(long, env = "ITSXPRESS_BBMERGE", default_value = "bbmerge.sh")]
    /// BBMerge executable used to merge paired reads
    pub bbmerge: PathBuf,

    #[arg(long, env = "ITSXPRESS_VSEARCH", default_value = "vsearch")]
    /// VSEARCH executable used for dereplication and clustering
    pub vsearch: PathBuf,

    #[arg(long, env = "ITSXPRESS_HMMSEARCH", default_value = "hmmsearch")]
    /// HMMER hmmsearch executable
    pub hmmsearch: PathBuf,
}

/// The ITS sub-region retained after trimming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Its1,
    Its2,
    All,
}

impl Region {
    /// The HMM name prefixes of the conserved domains bounding the region on
    /// the left and on the right.
    ///
    /// ITSx numbers its models `1_` (end of SSU), `2_` (start of 5.8S), `3_`
    /// (end of 5.8S), and `4_` (start of LSU).
    #[inline]
    pub fn flanking_prefixes(self) -> (&'static str, &'static str) {
        match self {
            Region::Its1 => ("1_", "2_"),
            Region::Its2 => ("3_", "4_"),
            Region::All => ("1_", "4_"),
        }
    }
}

impl ValueEnum for Region {
    #[inline]
    fn value_variants<'a>() -> &'a [Self] {
        &[Self::Its1, Self::Its2, Self::All]
    }

    #[inline]
    fn to_possible_value(&self) -> Option<PossibleValue> {
        match self {
            Region::Its1 => Some(PossibleValue::new("ITS1").alias("its1")),
            Region::Its2 => Some(PossibleValue::new("ITS2").alias("its2")),
            Region::All => Some(PossibleValue::new("ALL").alias("all")),
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Region::Its1 => f.write_str("ITS1"),
            Region::Its2 => f.write_str("ITS2"),
            Region::All => f.write_str("ALL"),
        }
    }
}

/// Taxonomic groups with an ITSx profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Taxon {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
    L,
    M,
    N,
    O,
    P,
    Q,
    R,
    S,
    T,
    U,
    X,
    Y,
    All,
}

impl Taxon {
    const ALL_TAXA: [Taxon; 22] = [
        Taxon::A,
        Taxon::B,
        Taxon::C,
        Taxon::D,
        Taxon::E,
        Taxon::F,
        Taxon::G,
        Taxon::H,
        Taxon::I,
        Taxon::L,
        Taxon::M,
        Taxon::N,
        Taxon::O,
        Taxon::P,
        Taxon::Q,
        Taxon::R,
        Taxon::S,
        Taxon::T,
        Taxon::U,
        Taxon::X,
        Taxon::Y,
        Taxon::All,
    ];

    /// The code used on the command line and in the profile file name.
    pub fn code(self) -> &'static str {
        match self {
            Taxon::A => "A",
            Taxon::B => "B",
            Taxon::C => "C",
            Taxon::D => "D",
            Taxon::E => "E",
            Taxon::F => "F",
            Taxon::G => "G",
            Taxon::H => "H",
            Taxon::I => "I",
            Taxon::L => "L",
            Taxon::M => "M",
            Taxon::N => "N",
            Taxon::O => "O",
            Taxon::P => "P",
            Taxon::Q => "Q",
            Taxon::R => "R",
            Taxon::S => "S",
            Taxon::T => "T",
            Taxon::U => "U",
            Taxon::X => "X",
            Taxon::Y => "Y",
            Taxon::All => "ALL",
        }
    }

    /// The name of the taxonomic group.
    pub fn name(self) -> &'static str {
        match self {
            Taxon::A => "Alveolata",
            Taxon::B => "Bryophyta",
            Taxon::C => "Bacillariophyta",
            Taxon::D => "Amoebozoa",
            Taxon::E => "Euglenozoa",
            Taxon::F => "Fungi",
            Taxon::G => "Chlorophyta",
            Taxon::H => "Rhodophyta",
            Taxon::I => "Phaeophyceae",
            Taxon::L => "Marchantiophyta",
            Taxon::M => "Metazoa",
            Taxon::N => "Microsporidia",
            Taxon::O => "Oomycota",
            Taxon::P => "Haptophyceae",
            Taxon::Q => "Raphidophyceae",
            Taxon::R => "Rhizaria",
            Taxon::S => "Synurophyceae",
            Taxon::T => "Tracheophyta",
            Taxon::U => "Eustigmatophyceae",
            Taxon::X => "Apusozoa",
            Taxon::Y => "Parabasalia",
            Taxon::All => "All",
        }
    }

    /// The profile file inside the HMM directory, e.g. `F.hmm`.
    #[inline]
    pub fn profile_file_name(self) -> String {
        format!("{code}.hmm", code = self.code())
    }
}

impl FromStr for Taxon {
    type Err = String;

    fn from_str(prefix: &str) -> Result<Self, Self::Err> {
        Taxon::ALL_TAXA
            .into_iter()
            .find(|t| t.code().eq_ignore_ascii_case(prefix.trim()))
            .ok_or_else(|| format!("`{prefix}` is not a known taxon code."))
    }
}

impl ValueEnum for Taxon {
    #[inline]
    fn value_variants<'a>() -> &'a [Self] {
        &Self::ALL_TAXA
    }

    #[inline]
    fn to_possible_value(&self) -> Option<PossibleValue> {
        Some(PossibleValue::new(self.code()).help(self.name()))
    }
}

/// Validates the clustering identity to be between 0.97 and 1.0
fn validate_cluster_id(value: &str) -> Result<f64, String> {
    let parsed = value
        .parse::<f64>()
        .map_err(|_| format!("`{value}` is not a valid number between {MIN_CLUSTER_ID} and 1.0."))?;
    if (MIN_CLUSTER_ID..=1.0).contains(&parsed) {
        Ok(parsed)
    } else {
        Err(format!(
            "cluster-id must be between {MIN_CLUSTER_ID} and 1.0, but `{parsed}` was provided."
        ))
    }
}

/// Resolves the thread count handed to the external tools. Zero requests all
/// logical cores, capped by `NSLOTS` on cluster schedulers.
pub fn resolve_threads(requested: usize) -> usize {
    if requested > 0 {
        return requested;
    }

    let mut cores = num_cpus::get();

    if let Ok(s) = env::var("NSLOTS")
        && let Ok(n) = s.parse::<usize>()
    {
        if n > 0 {
            cores = cores.min(n);
        } else {
            log::warn!("The requested core cap 'NSLOTS={s}' is not valid, ignoring and using {cores} cores.");
        }
    }

    cores.max(1)
}

/// Arguments for one trimming run after resolving defaults
#[derive(Debug)]
pub struct ParsedItsArgs {
    pub region:   Region,
    pub taxon:    Taxon,
    pub threads:  usize,
    pub dedup:    DedupMode,
    pub hmm_file: PathBuf,
    pub tempdir:  Option<PathBuf>,
    pub tools:    ToolPaths,
}

/// Parses the options shared by both trimming subcommands.
pub fn parse_its_args(args: ItsArgs) -> ParsedItsArgs {
    let ItsArgs {
        region,
        taxa,
        threads,
        slow,
        cluster_id,
        hmm_dir,
        tempdir,
        tools,
    } = args;

    let dedup = if slow {
        DedupMode::Dereplicate
    } else {
        DedupMode::Cluster { id: cluster_id }
    };

    ParsedItsArgs {
        region,
        taxon: taxa,
        threads: resolve_threads(threads),
        dedup,
        hmm_file: hmm_dir.join(taxa.profile_file_name()),
        tempdir,
        tools: ToolPaths {
            bbmerge:   tools.bbmerge,
            vsearch:   tools.vsearch,
            hmmsearch: tools.hmmsearch,
        },
    }
}
