/// Errors raised while fetching and decoding pages from the stats site.
#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    /// HTTP request failed (network, DNS, TLS, timeout, etc.).
    #[error("http request failed for {url}: {source}")]
    Http {
        url: String,
        source: reqwest::Error,
    },

    /// The page does not exist.
    #[error("not found: {url}")]
    NotFound { url: String },

    /// Server returned a non-success HTTP status code.
    #[error("unexpected status {status} for {url}")]
    UnexpectedStatus {
        url: String,
        status: reqwest::StatusCode,
    },

    /// Failed to read the response body as text.
    #[error("failed to read response body from {url}: {source}")]
    ResponseBody {
        url: String,
        source: reqwest::Error,
    },

    /// A CSS selector string could not be parsed.
    #[error("invalid CSS selector: {0}")]
    Selector(String),

    /// None of the embedded JSON blocks carried the expected payload.
    #[error("no embedded json block contains {context}")]
    MissingPayload { context: &'static str },

    /// The payload was located but did not decode into the expected shape.
    #[error("failed to decode {context}: {source}")]
    Json {
        context: &'static str,
        source: serde_json::Error,
    },
}

impl FetchError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchError::NotFound { .. })
    }

    /// Whether the failure happened on the wire rather than while parsing.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            FetchError::Http { .. }
                | FetchError::UnexpectedStatus { .. }
                | FetchError::ResponseBody { .. }
        )
    }
}

impl<'a> From<scraper::error::SelectorErrorKind<'a>> for FetchError {
    fn from(err: scraper::error::SelectorErrorKind<'a>) -> Self {
        FetchError::Selector(err.to_string())
    }
}

pub type FetchResult<T> = std::result::Result<T, FetchError>;
