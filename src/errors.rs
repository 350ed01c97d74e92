use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

/// The collaborator call a dependency failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    GetVirtualMachine,
    CreateVirtualMachine,
    UpdateVirtualMachine,
    DeleteVirtualMachine,
    GetDataVolume,
    UpdateDataVolume,
    DeleteDataVolume,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Operation::GetVirtualMachine => "get virtualmachine",
            Operation::CreateVirtualMachine => "create virtualmachine",
            Operation::UpdateVirtualMachine => "update virtualmachine",
            Operation::DeleteVirtualMachine => "delete virtualmachine",
            Operation::GetDataVolume => "get datavolume",
            Operation::UpdateDataVolume => "update datavolume",
            Operation::DeleteDataVolume => "delete datavolume",
        };
        f.write_str(s)
    }
}

/// Error surface of the store collaborators.
///
/// `NotFound` is a distinct variant so the tolerated-absence paths (detach of
/// an already-gone volume, delete of an already-gone volume) can match on it
/// instead of inspecting message text.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: &'static str,
        namespace: String,
        name: String,
    },

    #[error("failed to {operation} {namespace}/{name}: {source}")]
    Dependency {
        operation: Operation,
        namespace: String,
        name: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl StoreError {
    pub fn not_found(
        kind: &'static str,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self::NotFound {
            kind,
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn dependency(
        operation: Operation,
        namespace: impl Into<String>,
        name: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Dependency {
            operation,
            namespace: namespace.into(),
            name: name.into(),
            source: source.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal server error: {0}")]
    InternalServerError(String),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match &err {
            StoreError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            StoreError::Dependency { .. } => {
                ApiError::InternalServerError(err.to_string())
            }
        }
    }
}

impl axum::response::IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        use axum::{Json, http::StatusCode};
        use serde_json::json;

        let (status, error_message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::InternalServerError(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
