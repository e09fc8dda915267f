use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("malformed command: {0}")]
    MalformedCommand(String),

    #[error("asset fetch failed for {url}: {reason}")]
    AssetFetch { url: String, reason: String },

    /// The search result anchor never appeared. Either the name is unknown or
    /// the window was not in the expected state; the two are indistinguishable.
    #[error("navigation failed: no search result for '{0}' (unknown name or unexpected UI state)")]
    Navigation(String),

    #[error("target conversation does not exist: '{0}'")]
    ConversationMissing(String),

    #[error("application not reachable or not logged in: {0}")]
    AutomationFatal(String),

    #[error("perception error: {0}")]
    Perception(String),

    #[error("input error: {0}")]
    Input(String),

    #[error("clipboard error: {0}")]
    Clipboard(String),

    #[error("command carries neither messages nor image urls")]
    EmptyCommand,

    #[error("dispatch queue is closed")]
    QueueClosed,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("toml deserialize error: {0}")]
    TomlDe(#[from] toml::de::Error),
}

pub type RelayResult<T> = Result<T, RelayError>;
