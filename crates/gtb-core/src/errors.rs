/// Core error type for the bot.
///
/// Adapter crates map their specific errors into this type so the front ends
/// can render failures consistently (chat reply or HTTP error page).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("GitHub account is not linked")]
    Unauthenticated,

    #[error("authorization exchange failed: {0}")]
    AuthExchange(String),

    #[error("GitHub API error{}: {message}", status_suffix(.status))]
    Upstream {
        status: Option<u16>,
        message: String,
    },

    #[error("store read failed: {0}")]
    StoreRead(String),

    #[error("store write failed: {0}")]
    StoreWrite(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("external error: {0}")]
    External(String),
}

impl Error {
    pub fn upstream(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Upstream {
            status,
            message: message.into(),
        }
    }

    /// Errors caused by the caller's input rather than by a dependency.
    pub fn is_user_error(&self) -> bool {
        matches!(self, Self::MissingParameter(_) | Self::Unauthenticated)
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Self::Upstream {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({s})")).unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, Error>;
