use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A builder method was handed a value outside its domain.
    #[error("invalid `{field}`: {reason}")]
    Configuration { field: &'static str, reason: String },

    /// A request references an upload key the plan does not know.
    #[error("unknown uploadable file `{0}`")]
    UnknownUploadableFile(String),

    /// A role list names an entity that is not in the loaded dataset.
    /// Reported and skipped, never fatal.
    #[error("{entity} references unknown {reference}")]
    MalformedDataset { entity: String, reference: String },

    #[error("failed to parse {what}: {message}")]
    Parse { what: String, message: String },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {} at line {line}: {source}", path.display())]
    Json {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl Error {
    pub(crate) fn configuration(field: &'static str, reason: impl Into<String>) -> Error {
        Error::Configuration {
            field,
            reason: reason.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Error {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
