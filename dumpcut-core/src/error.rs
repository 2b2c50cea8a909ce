//! Error type for dump stream surgery
//!
//! Every failure is fatal for the run: a half-written dump stream is not
//! safe to feed to a loader, so nothing here is recovered locally.

/// Result type for dump stream operations
pub type Result<T> = std::result::Result<T, CutterError>;

/// Errors that can occur while reading or rewriting a dump stream
#[derive(Debug, thiserror::Error)]
pub enum CutterError {
    #[error("required prefix '{prefix}' not seen after line {line}")]
    MissingPrefix { prefix: String, line: u64 },

    #[error("parse error at line {line}: {message}")]
    Grammar { line: u64, message: String },

    #[error("unexpected end of input at line {line} while reading {context}")]
    UnexpectedEof { line: u64, context: &'static str },

    #[error("ill-formed selection '{spec}': {reason}")]
    Selection { spec: String, reason: String },

    #[error("invalid argument '{0}'")]
    Argument(String),

    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("input is not seekable; {0} needs to read it twice")]
    NotSeekable(&'static str),

    #[error("log patch line {line}: {message}")]
    LogPatch { line: u64, message: String },

    #[error("author of revision {revision} doesn't look right (patch has '{expected}', stream has '{found}')")]
    AuthorMismatch {
        revision: u64,
        expected: String,
        found: String,
    },

    #[error("ill-formed date '{value}' in revision {revision}")]
    Date { revision: u64, value: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CutterError {
    pub(crate) fn grammar(line: u64, message: impl Into<String>) -> Self {
        CutterError::Grammar {
            line,
            message: message.into(),
        }
    }
}
