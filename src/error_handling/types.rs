use std::fmt;

#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    TomlError(String),
    BadIPFormatting(String),
    NotInRange(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::TomlError(e) => write!(f, "TOML parsing error: {}", e),
            ConfigError::BadIPFormatting(e) => write!(f, "IP formatting error: {}", e),
            ConfigError::NotInRange(e) => write!(f, "Value out of range: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StorageError {
    ConnectionFailed,
    WriteFailed,
    ReadFailed,
    NotFound,
    /// A unique key, such as a wall slug, is already taken.
    AlreadyExists,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::ConnectionFailed => write!(f, "Storage connection failed"),
            StorageError::WriteFailed => write!(f, "Storage write failed"),
            StorageError::ReadFailed => write!(f, "Storage read failed"),
            StorageError::NotFound => write!(f, "Storage record not found"),
            StorageError::AlreadyExists => write!(f, "Storage record already exists"),
        }
    }
}

impl std::error::Error for StorageError {}

/// Failures surfaced by the segmenter and the scene tracker.
///
/// Finalize failures never show up here: they are logged and dropped.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    SessionCreate(StorageError),
    NodeCreate(StorageError),
    NodeUpdate(StorageError),
    Precondition(String),
    WorkerUnavailable,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::SessionCreate(e) => write!(f, "Session creation failed: {}", e),
            SessionError::NodeCreate(e) => write!(f, "Node creation failed: {}", e),
            SessionError::NodeUpdate(e) => write!(f, "Node update failed: {}", e),
            SessionError::Precondition(e) => write!(f, "Precondition failed: {}", e),
            SessionError::WorkerUnavailable => write!(f, "Session worker is not running"),
        }
    }
}

impl std::error::Error for SessionError {}

#[derive(Debug)]
pub enum ControllerError {
    ConfigurationError(ConfigError),
    StorageError(StorageError),
    InitializationFailed(String),
}

impl fmt::Display for ControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerError::ConfigurationError(e) => write!(f, "Configuration error: {}", e),
            ControllerError::StorageError(e) => write!(f, "Storage error: {}", e),
            ControllerError::InitializationFailed(e) => write!(f, "Initialization failed: {}", e),
        }
    }
}

impl std::error::Error for ControllerError {}

impl From<ConfigError> for ControllerError {
    fn from(err: ConfigError) -> Self {
        ControllerError::ConfigurationError(err)
    }
}

impl From<StorageError> for ControllerError {
    fn from(err: StorageError) -> Self {
        ControllerError::StorageError(err)
    }
}
