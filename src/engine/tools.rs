use log::debug;
use std::{
    error::Error,
    fmt,
    io::ErrorKind,
    path::PathBuf,
    process::{Command, ExitStatus, Stdio},
};

/// Executables of the external tools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    pub bbmerge:   PathBuf,
    pub vsearch:   PathBuf,
    pub hmmsearch: PathBuf,
}

/// Failures from running an external tool. A missing executable or profile is
/// kept apart from a run that went wrong, so the two get distinct messages.
#[derive(Debug)]
pub enum ToolError {
    /// The executable could not be found.
    NotFound { tool: &'static str, program: PathBuf },
    /// The HMM profile handed to the search tool does not exist.
    ProfileNotFound { path: PathBuf },
    /// The tool ran and exited unsuccessfully.
    Failed {
        tool:   &'static str,
        status: ExitStatus,
        stderr: String,
    },
    /// The tool could not be started for a reason other than being missing.
    Spawn { tool: &'static str, source: std::io::Error },
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolError::NotFound { tool, program } => write!(
                f,
                "{tool} was not found (tried {program}). Make sure it is installed and on the PATH, or pass its location.",
                program = program.display()
            ),
            ToolError::ProfileNotFound { path } => write!(
                f,
                "The HMM profile {path} used by hmmsearch was not found. Check --hmm-dir and --taxa.",
                path = path.display()
            ),
            ToolError::Failed { tool, status, stderr } => {
                write!(f, "{tool} exited unsuccessfully ({status})")?;
                if stderr.is_empty() {
                    Ok(())
                } else {
                    write!(f, ":\n{stderr}")
                }
            }
            ToolError::Spawn { tool, source } => write!(f, "Failed to start {tool}: {source}"),
        }
    }
}

impl Error for ToolError {
    #[inline]
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ToolError::Spawn { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ToolError> for std::io::Error {
    #[inline]
    fn from(e: ToolError) -> Self {
        let kind = match e {
            ToolError::NotFound { .. } | ToolError::ProfileNotFound { .. } => ErrorKind::NotFound,
            _ => ErrorKind::Other,
        };
        std::io::Error::new(kind, e)
    }
}

/// Runs `command` to completion with no stdin and stdout discarded. Stderr is
/// captured so it can be reported if the tool fails.
pub fn run_tool(tool: &'static str, command: &mut Command) -> Result<(), ToolError> {
    debug!("Running {tool}: {command:?}");

    let output = command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .map_err(|source| {
            if source.kind() == ErrorKind::NotFound {
                ToolError::NotFound {
                    tool,
                    program: PathBuf::from(command.get_program()),
                }
            } else {
                ToolError::Spawn { tool, source }
            }
        })?;

    if output.status.success() {
        Ok(())
    } else {
        Err(ToolError::Failed {
            tool,
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim_end().to_string(),
        })
    }
}
