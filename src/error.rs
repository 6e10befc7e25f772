//! Error types for WebBook conversion.

use thiserror::Error;

use crate::xml::ParseError;

/// Errors that can occur while extracting or rewriting a package.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Cannot parse XML file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: ParseError,
    },

    #[error("The version of EPUB ({0}) is incompatible with this tool")]
    IncompatibleVersion(String),

    #[error("Missing required element: {0}")]
    MissingElement(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid EPUB: {0}")]
    InvalidEpub(String),
}

impl Error {
    /// Attach the package path of the document that failed to parse.
    pub fn parse(path: impl Into<String>, source: ParseError) -> Self {
        Error::Parse {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
