use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Provider {provider} authentication failed: {reason}")]
    AuthenticationFailed { provider: String, reason: String },

    #[error("Provider {provider} rejected the session")]
    SessionRejected { provider: String },

    #[error("Operation timed out: {operation}")]
    Timeout { operation: String },
}

pub type Result<T> = std::result::Result<T, AuthError>;
