use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArchivistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("no value found for `{key}' in section `{section}' (searched: {searched})")]
    MissingCredential {
        section: String,
        key: String,
        searched: String,
    },

    #[error("cannot parse configuration at {location}: {message}")]
    ConfigParse { location: String, message: String },

    #[error("filename guessing error: {0}")]
    Guess(String),

    #[error("unknown language: {0}")]
    Language(String),

    #[error("metadata error: {0}")]
    Metadata(String),

    #[error("tagging error: {0}")]
    Tag(String),

    #[error("subtitle error: {0}")]
    Subtitle(String),

    #[error("media processing error: {0}")]
    Media(String),
}

pub type Result<T> = std::result::Result<T, ArchivistError>;
