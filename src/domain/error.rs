use thiserror::Error;

/// Failure of the underlying key-value store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error on key {key}: {message}")]
    Io { key: String, message: String },
    #[error("store lock poisoned")]
    Poisoned,
}

/// Failure talking to the REST backend.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("{code} {body}")]
    Status { code: u16, body: String },
    #[error("invalid json: {0}")]
    Decode(String),
}

/// Outcome contract shared by every backend operation.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("validation failed: {0}")]
    ValidationFailed(String),
    #[error("persistence failed: {0}")]
    PersistenceFailed(String),
}

impl BackendError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::ValidationFailed(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<StoreError> for BackendError {
    fn from(error: StoreError) -> Self {
        Self::PersistenceFailed(error.to_string())
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(error: serde_json::Error) -> Self {
        Self::PersistenceFailed(format!("corrupt document: {error}"))
    }
}

// The command line reports every failure as text.
impl From<BackendError> for String {
    fn from(error: BackendError) -> Self {
        error.to_string()
    }
}

impl From<ApiError> for String {
    fn from(error: ApiError) -> Self {
        error.to_string()
    }
}

impl From<StoreError> for String {
    fn from(error: StoreError) -> Self {
        error.to_string()
    }
}
