use crate::io::MapFailedWriteExt;
use flate2::{Compression, write::GzEncoder};
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};
use zoe::define_whichever;

define_whichever! {
    /// An enum for the acceptable output types. A [`BufWriter`] is used for all variants.
    #[derive(Debug)]
    pub(crate) enum WriteFileZip {
        /// A writer for a regular uncompressed file.
        File(BufWriter<File>),
        /// A writer for a gzip compressed file.
        Zipped(GzEncoder<BufWriter<File>>),
    }

    impl Write for WriteFileZip {}
}

impl WriteFileZip {
    /// Creates the output file, compressing with gzip when `gzipped` is set.
    ///
    /// ## Errors
    ///
    /// Failing to create the file is propagated with the path attached.
    pub fn create(path: impl AsRef<Path>, gzipped: bool) -> std::io::Result<Self> {
        let file = File::create(&path).map_failed_write(&path)?;
        let bufwriter = BufWriter::new(file);

        let writer = if gzipped {
            Self::Zipped(GzEncoder::new(bufwriter, Compression::default()))
        } else {
            Self::File(bufwriter)
        };

        Ok(writer)
    }

    /// Writes the gzip trailer if needed and flushes everything to disk.
    /// Dropping the writer instead would swallow these errors.
    pub fn finish(self) -> std::io::Result<()> {
        match self {
            Self::File(mut writer) => writer.flush(),
            Self::Zipped(encoder) => encoder.finish()?.flush(),
        }
    }
}
