use crate::io::{MapFailedReadExt, is_gz};
use flate2::read::MultiGzDecoder;
use std::{
    fs::File,
    io::{PipeReader, Read},
    path::Path,
    thread::{self, JoinHandle},
};
use zoe::{data::err::ResultWithErrorContext, define_whichever, prelude::FastQReader};

/// A reader for a multi-member [gzip
/// file](https://www.rfc-editor.org/rfc/rfc1952#page-5) that decodes on a
/// separate thread and hands the plain bytes over an anonymous pipe.
///
/// ## Limitations
///
/// Decoding errors surface only once EOF is reached, so this is meant for
/// files that are read in their entirety, such as the full pass made when
/// writing trimmed reads.
pub struct GzipReaderPiped {
    reader: PipeReader,
    thread: Option<JoinHandle<std::io::Result<()>>>,
}

impl GzipReaderPiped {
    /// Creates a new [`GzipReaderPiped`] from gzip encoded data.
    ///
    /// ## Errors
    ///
    /// Failing to create the pipe is propagated with context. Errors during
    /// decoding appear when reading.
    pub fn from_readable<R>(readable: R) -> std::io::Result<Self>
    where
        R: Read + Send + 'static, {
        let (reader, mut writer) =
            std::io::pipe().with_context("Failed to initialize the pipe for decoding the gzip data")?;

        let mut decoder = MultiGzDecoder::new(readable);

        let thread = thread::spawn(move || -> std::io::Result<_> {
            // A broken pipe here means the reader was dropped early, in which
            // case the thread is never joined
            std::io::copy(&mut decoder, &mut writer)?;
            Ok(())
        });

        Ok(Self {
            reader,
            thread: Some(thread),
        })
    }
}

impl Read for GzipReaderPiped {
    #[inline]
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let bytes_read = self.reader.read(buf)?;

        if bytes_read == 0
            && !buf.is_empty()
            && let Some(thread) = self.thread.take()
        {
            thread
                .join()
                .map_err(|_| std::io::Error::other("The gzip decoding thread panicked"))??;
        }

        Ok(bytes_read)
    }
}

define_whichever! {
    /// A plain or gzip compressed input file, decoded lazily on the calling
    /// thread. Suited to reading only the head of a file, as done when
    /// validating inputs.
    pub(crate) enum ReadFileZip {
        /// A regular uncompressed file.
        File(File),
        /// A gzip compressed file, using lazy decoding.
        Zipped(MultiGzDecoder<File>),
    }

    impl Read for ReadFileZip {}
}

impl ReadFileZip {
    /// Opens a [`ReadFileZip`], treating files ending in `.gz` as compressed.
    ///
    /// ## Errors
    ///
    /// Any IO errors when opening the file are propagated.
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = File::open(&path).map_failed_read(&path)?;

        if is_gz(&path) {
            Ok(Self::Zipped(MultiGzDecoder::new(file)))
        } else {
            Ok(Self::File(file))
        }
    }
}

define_whichever! {
    /// A plain or gzip compressed input file, decoded eagerly on a separate
    /// thread via [`GzipReaderPiped`].
    pub(crate) enum ReadFileZipPipe {
        /// A regular uncompressed file.
        File(File),
        /// A gzip compressed file, using eager decoding on a separate thread.
        Zipped(GzipReaderPiped),
    }

    impl Read for ReadFileZipPipe {}
}

impl ReadFileZipPipe {
    /// Opens a [`ReadFileZipPipe`], treating files ending in `.gz` as
    /// compressed.
    ///
    /// ## Errors
    ///
    /// Any IO errors when opening the file or forming the pipe are propagated.
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = File::open(&path).map_failed_read(&path)?;

        if is_gz(&path) {
            Ok(ReadFileZipPipe::Zipped(GzipReaderPiped::from_readable(file)?))
        } else {
            Ok(ReadFileZipPipe::File(file))
        }
    }
}

/// Opens a FASTQ file for a partial read, e.g. validation.
pub(crate) fn open_fastq_head(path: impl AsRef<Path>) -> std::io::Result<FastQReader<ReadFileZip>> {
    FastQReader::from_readable(ReadFileZip::open(path)?)
}

/// Opens a FASTQ file that will be read to the end.
pub(crate) fn open_fastq_full(path: impl AsRef<Path>) -> std::io::Result<FastQReader<ReadFileZipPipe>> {
    FastQReader::from_readable(ReadFileZipPipe::open(path)?)
}
