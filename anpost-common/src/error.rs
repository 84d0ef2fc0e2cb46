/// Failures shared by the HTTPS side of the returns service.
#[derive(thiserror::Error, Debug)]
pub enum ReturnsError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("{message}")]
    Api { status: Option<u16>, message: String },
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to parse URL: {0}")]
    UrlParse(#[from] url::ParseError),
    #[error("deserialization failed: {0}")]
    DeserializeJson(#[from] serde_json::Error),
}

impl ReturnsError {
    pub fn api<S: Into<String>>(status: Option<u16>, message: S) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }
}
