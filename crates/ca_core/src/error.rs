use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Upstream model API failure. The response body text is embedded in the
    /// message so the retry layer can classify it by substring.
    #[error("Model error: {0}")]
    Model(String),

    /// The model's response could not be parsed as the requested JSON shape.
    /// Never retried: a parse failure will not self-correct on resend.
    #[error("Malformed model output: {0}")]
    MalformedOutput(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("External error: {0}")]
    External(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
