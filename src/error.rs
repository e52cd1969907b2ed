use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClubError {
    // Configuration errors
    #[error("Failed to load config file '{path}': {source}")]
    ConfigLoad {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid config: {message}")]
    ConfigValidation { message: String },

    // Store errors
    #[error("Failed to save state to '{path}': {source}")]
    StateSave {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to load state from '{path}': {source}")]
    StateLoad {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse state file '{path}': {source}")]
    StateParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Member not found: {member_id}")]
    MemberNotFound { member_id: String },

    // Access errors
    #[error("Permission denied: {message}")]
    PermissionDenied { message: String },

    /// Rejected locally before any store call
    #[error("{message}")]
    Validation { message: String },

    // Identity provider errors
    #[error("Sign-in failed: {message}")]
    Identity { message: String },

    // Generic errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ClubError {
    pub fn validation(message: impl Into<String>) -> Self {
        ClubError::Validation {
            message: message.into(),
        }
    }

    /// Whether the error came from local input checks rather than a collaborator
    pub fn is_validation(&self) -> bool {
        matches!(self, ClubError::Validation { .. })
    }
}

impl From<reqwest::Error> for ClubError {
    fn from(err: reqwest::Error) -> Self {
        ClubError::Identity {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for ClubError {
    fn from(err: std::io::Error) -> Self {
        ClubError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for ClubError {
    fn from(err: serde_json::Error) -> Self {
        ClubError::Internal {
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClubError>;
