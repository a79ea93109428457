use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MergeError {
    #[error("unknown {kind} code: {code}")]
    UnknownToken { kind: &'static str, code: String },

    #[error("unsupported mode: {0}")]
    UnsupportedMode(String),

    #[error("{kind} {id} used before it was defined")]
    UndefinedReference { kind: &'static str, id: String },

    #[error("invalid character {ch:?} in coordinate {token}")]
    InvalidCharacter { ch: char, token: String },

    #[error("{document}: missing required parameter(s): {missing}")]
    MissingParameter { document: String, missing: String },

    #[error("malformed {what}: {text}")]
    Malformed { what: &'static str, text: String },

    #[error("coordinate {0} appears before any layer was opened")]
    NoOpenLayer(String),

    #[error("{}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: Box<MergeError>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MergeError {
    pub(crate) fn malformed(what: &'static str, text: impl Into<String>) -> Self {
        Self::Malformed {
            what,
            text: text.into(),
        }
    }

    pub(crate) fn unknown(kind: &'static str, code: impl Into<String>) -> Self {
        Self::UnknownToken {
            kind,
            code: code.into(),
        }
    }

    /// Attach the source file to an error raised while handling it.
    pub fn in_file(self, path: impl Into<PathBuf>) -> Self {
        Self::File {
            path: path.into(),
            source: Box::new(self),
        }
    }
}
