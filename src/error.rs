use std::fmt;

#[derive(Debug, Clone)]
pub enum NodeError {
    CryptographyError(String),
    SerializationError(String),
    MiningError(String),
    InvalidArgument(String),
}

impl fmt::Display for NodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeError::CryptographyError(msg) => write!(f, "Cryptography error: {msg}"),
            NodeError::SerializationError(msg) => write!(f, "Serialization error: {msg}"),
            NodeError::MiningError(msg) => write!(f, "Mining error: {msg}"),
            NodeError::InvalidArgument(msg) => write!(f, "Invalid argument: {msg}"),
        }
    }
}

impl From<bincode::Error> for NodeError {
    fn from(err: bincode::Error) -> Self {
        NodeError::SerializationError(err.to_string())
    }
}

impl std::error::Error for NodeError {}
