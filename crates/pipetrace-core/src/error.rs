use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Unexpected trace schema: {0}")]
    Schema(String),

    #[error("Disassembler error: {0}")]
    Disassembler(String),

    #[error("{records} instruction records do not line up with {vectors} timing vectors")]
    Alignment { records: usize, vectors: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
