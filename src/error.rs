use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;
pub type ConfigError = Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to open store: {0}")]
    EngineOpen(String),

    #[error("Transaction failed: {0}")]
    Transaction(String),

    #[error("Corrupt cache record: {0}")]
    CorruptRecord(String),

    #[error("Store worker stopped before completing the operation")]
    WorkerStopped,

    #[error("Feed store operation '{0}' panicked")]
    OperationPanicked(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid: {0}")]
    Invalid(String),
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl Error {
    pub fn is_temporary(&self) -> bool {
        matches!(
            self,
            Error::Transaction(_) | Error::Io(_) | Error::WorkerStopped
        )
    }

    pub fn is_user_error(&self) -> bool {
        matches!(self, Error::Config(_) | Error::Invalid(_))
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Error::EngineOpen(_) => "ENGINE_OPEN",
            Error::Transaction(_) => "TRANSACTION",
            Error::CorruptRecord(_) => "CORRUPT_RECORD",
            Error::WorkerStopped => "WORKER_STOPPED",
            Error::OperationPanicked(_) => "OPERATION_PANICKED",
            Error::Io(_) => "IO_ERROR",
            Error::Serialization(_) => "SERIALIZATION",
            Error::Config(_) => "CONFIG",
            Error::NotFound(_) => "NOT_FOUND",
            Error::Invalid(_) => "INVALID",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(Error::Transaction("disk full".into()).is_temporary());
        assert!(!Error::CorruptRecord("bad id".into()).is_temporary());
        assert!(Error::Config("missing".into()).is_user_error());
        assert!(!Error::EngineOpen("bad path".into()).is_user_error());
        assert!(!Error::CorruptRecord("bad url".into()).is_user_error());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::EngineOpen(String::new()).error_code(), "ENGINE_OPEN");
        assert_eq!(Error::WorkerStopped.error_code(), "WORKER_STOPPED");
        assert_eq!(
            Error::CorruptRecord(String::new()).error_code(),
            "CORRUPT_RECORD"
        );
    }

    #[test]
    fn test_toml_error_maps_to_config() {
        let err: Error = toml::from_str::<toml::Value>("not = [valid")
            .unwrap_err()
            .into();
        assert!(matches!(err, Error::Config(_)));
    }
}
