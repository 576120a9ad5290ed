use std::path::PathBuf;

use thiserror::Error;

/// An archive entry name whose legacy bytes could not be transcoded to UTF-8.
#[derive(Debug, Error)]
#[error("entry name is not valid Shift_JIS: {name:?}")]
pub struct EncodingError {
    pub name: Vec<u8>,
}

/// Extraction failures. All of them are fatal for the current document; the
/// batch driver logs the document and moves on to the next one.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("failed to open archive: {0}")]
    Open(#[source] zip::result::ZipError),
    #[error("failed to read archive entry: {0}")]
    Read(#[source] zip::result::ZipError),
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    #[error("illegal entry path escapes extraction dir: {0}")]
    PathEscape(PathBuf),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A markup file that cannot be walked. Fatal for the whole document: the
/// structuring context is shared across files, so skipping one would
/// desynchronize every later section.
#[derive(Debug, Error)]
pub enum MarkupError {
    #[error("markup parse error: {0}")]
    Parse(#[from] quick_xml::Error),
    #[error("markup file is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("markup file read error: {0}")]
    Io(#[from] std::io::Error),
}

/// Typed failure of one document's structuring run.
#[derive(Debug, Error)]
pub enum StructureError {
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error(transparent)]
    Markup(#[from] MarkupError),
}
