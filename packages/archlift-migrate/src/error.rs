use thiserror::Error;

pub type Result<T> = std::result::Result<T, MigrateError>;

#[derive(Error, Debug)]
pub enum MigrateError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Graph error: {0}")]
    Graph(#[from] archlift_graph::GraphError),

    #[error("Block '{block}' failed ({kind}): {message}")]
    BlockFailure {
        block: String,
        kind: String,
        message: String,
    },

    #[error("Cancelled by operator")]
    Cancelled,

    #[error("Aborted by listener: {0}")]
    ListenerAbort(String),

    #[error("State file error: {0}")]
    State(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MigrateError {
    pub fn config<E: std::fmt::Display>(e: E) -> Self {
        Self::Config(e.to_string())
    }

    pub fn template<E: std::fmt::Display>(e: E) -> Self {
        Self::Template(e.to_string())
    }

    pub fn state<E: std::fmt::Display>(e: E) -> Self {
        Self::State(e.to_string())
    }
}
