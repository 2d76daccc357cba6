//! Document source handling.
//!
//! A [`DocumentSource`] normalizes a path-based or in-memory PDF into a
//! form that can be acquired repeatedly during one extraction run. Every
//! acquisition yields a fresh, seekable stream positioned at the start, so
//! per-page workers never observe each other's read position. File handles
//! are released when the acquired stream is dropped.

use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::PathBuf;
use std::sync::Arc;

use crate::detect;
use crate::error::{Error, Result};

/// A PDF document source: a file path or an in-memory buffer.
///
/// Cloning is cheap; in-memory content is reference counted so the same
/// source can be shared across parallel page workers.
#[derive(Debug, Clone)]
pub enum DocumentSource {
    /// A PDF on the filesystem.
    Path(PathBuf),
    /// A PDF held fully in memory.
    Bytes(Arc<[u8]>),
}

impl DocumentSource {
    /// Build a source from optional path and buffer inputs.
    ///
    /// Fails with [`Error::InvalidArguments`] when neither is supplied.
    /// When both are supplied, the path wins.
    pub fn new(path: Option<PathBuf>, bytes: Option<Vec<u8>>) -> Result<Self> {
        match (path, bytes) {
            (Some(p), _) => Self::from_path(p),
            (None, Some(b)) => Self::from_bytes(b),
            (None, None) => Err(Error::InvalidArguments(
                "no document source provided: supply a file path or a byte buffer".to_string(),
            )),
        }
    }

    /// Build a source from a file path, validating its extension.
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        detect::ensure_pdf_extension(&path)?;
        Ok(DocumentSource::Path(path))
    }

    /// Build a source from an in-memory buffer, validating the PDF header.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        detect::ensure_pdf_bytes(&bytes)?;
        Ok(DocumentSource::Bytes(bytes.into()))
    }

    /// Acquire a readable, seekable stream over the document, positioned
    /// at the start.
    pub fn open(&self) -> Result<SourceStream> {
        match self {
            DocumentSource::Path(path) => {
                let file = File::open(path)?;
                let mut reader = BufReader::new(file);
                reader.seek(SeekFrom::Start(0))?;
                Ok(SourceStream::File(reader))
            }
            DocumentSource::Bytes(bytes) => Ok(SourceStream::Memory(Cursor::new(bytes.clone()))),
        }
    }

    /// Load the document through lopdf.
    ///
    /// Each call re-reads the source from the beginning, so repeated loads
    /// within one extraction run are independent of each other.
    pub fn load(&self) -> Result<lopdf::Document> {
        let stream = self.open()?;
        lopdf::Document::load_from(stream).map_err(Error::from)
    }
}

/// An acquired view of a [`DocumentSource`].
///
/// Dropping the stream releases any underlying file handle.
pub enum SourceStream {
    /// Stream backed by an open file.
    File(BufReader<File>),
    /// Stream backed by shared memory.
    Memory(Cursor<Arc<[u8]>>),
}

impl Read for SourceStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            SourceStream::File(r) => r.read(buf),
            SourceStream::Memory(r) => r.read(buf),
        }
    }
}

impl Seek for SourceStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            SourceStream::File(r) => r.seek(pos),
            SourceStream::Memory(r) => r.seek(pos),
        }
    }
}
