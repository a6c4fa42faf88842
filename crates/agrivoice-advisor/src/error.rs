use thiserror::Error;

#[derive(Error, Debug)]
pub enum AdvisorError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API error: {0}")]
    Api(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Translation error: {0}")]
    Translation(String),
}
