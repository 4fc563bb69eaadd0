use std::path::Path;

mod readers;
mod writers;

pub(crate) use readers::*;
pub(crate) use writers::*;

/// Checks that the input artifact directory and the output directory are
/// distinct, since the output `MANIFEST` would otherwise replace the input
/// one.
///
/// ## Errors
///
/// If the directories resolve to the same location, an appropriate error
/// message is provided.
pub(crate) fn check_distinct_dirs(input: impl AsRef<Path>, output: impl AsRef<Path>) -> std::io::Result<()> {
    let input = input.as_ref();
    let output = output.as_ref();

    let same = match (input.canonicalize(), output.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => input == output,
    };

    if same {
        Err(std::io::Error::other(format!(
            "The output directory {output:#?} is the same as the input artifact directory"
        )))
    } else {
        Ok(())
    }
}

/// Checks whether a file is a [gzip
/// file](https://www.rfc-editor.org/rfc/rfc1952#page-5).
///
/// This is currently done naively by seeing if it ends with a `gz` extension.
#[inline]
pub(crate) fn is_gz<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref().extension().is_some_and(|ext| ext == "gz")
}

pub trait MapFailedWriteExt<T> {
    fn map_failed_write<P: AsRef<Path>>(self, path: P) -> std::io::Result<T>;
}

impl<T> MapFailedWriteExt<T> for std::io::Result<T> {
    fn map_failed_write<P: AsRef<Path>>(self, path: P) -> std::io::Result<T> {
        self.map_err(|e| {
            std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to open {path} for writing due to the error:\n{e}",
                    path = path.as_ref().display()
                ),
            )
        })
    }
}

pub trait MapFailedReadExt<T> {
    fn map_failed_read<P: AsRef<Path>>(self, path: P) -> std::io::Result<T>;
}

impl<T> MapFailedReadExt<T> for std::io::Result<T> {
    fn map_failed_read<P: AsRef<Path>>(self, path: P) -> std::io::Result<T> {
        self.map_err(|e| {
            std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to open {path} for reading due to the error:\n{e}",
                    path = path.as_ref().display()
                ),
            )
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_is_gz() {
        assert!(is_gz("reads.fastq.gz"));
        assert!(!is_gz("reads.fastq"));
        assert!(!is_gz("MANIFEST"));
    }

    #[test]
    fn test_check_distinct_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let other = tempfile::tempdir().unwrap();
        assert!(check_distinct_dirs(dir.path(), other.path()).is_ok());
        assert!(check_distinct_dirs(dir.path(), dir.path().join(".")).is_err());
    }
}
