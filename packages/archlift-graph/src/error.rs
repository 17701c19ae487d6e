use thiserror::Error;

pub type Result<T> = std::result::Result<T, GraphError>;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Duplicate node id: {0}")]
    DuplicateId(String),

    #[error("Unknown node id: {0}")]
    UnknownNode(String),

    #[error("Edge endpoint does not exist: {edge_type} {source_id} -> {target}")]
    UnknownEdgeEndpoint {
        source_id: String,
        target: String,
        edge_type: String,
    },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Export error: {0}")]
    Export(String),
}

impl GraphError {
    pub fn parse<E: std::fmt::Display>(e: E) -> Self {
        Self::Parse(e.to_string())
    }
}

impl From<csv::Error> for GraphError {
    fn from(e: csv::Error) -> Self {
        GraphError::Export(e.to_string())
    }
}
