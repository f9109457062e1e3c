use push_client::PushError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("not initialized: run 'aq init'")]
    NotInitialized,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("program not found: {0}")]
    ProgramNotFound(String),

    #[error("program id already used: {0}")]
    ProgramExists(String),

    #[error("program is busy: {0}")]
    ProgramBusy(String),

    #[error("program is still running: {0} (cancel it first)")]
    ProgramActive(String),

    #[error("unsupported effect type '{0}' in conversion to push trigger")]
    UnsupportedEffect(String),

    #[error("unsupported action type '{0}' for push event params")]
    UnsupportedAction(String),

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    #[error("program store error: {0}")]
    Store(String),

    #[error(transparent)]
    Push(#[from] PushError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl QueueError {
    /// The client and the action/effect algebra disagree. Never retried.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            QueueError::UnsupportedEffect(_) | QueueError::UnsupportedAction(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, QueueError>;

/// Failure reported by an external collaborator (wallet engine, borrow or
/// swap plugin, exchange, rate source).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollaboratorError {
    #[error("wallet not found: {0}")]
    WalletNotFound(String),

    #[error("plugin not found: {0}")]
    PluginNotFound(String),

    #[error("invalid request: {0}")]
    Invalid(String),

    #[error("{0}")]
    Failed(String),

    #[error("temporarily unavailable: {0}")]
    Unavailable(String),
}

impl CollaboratorError {
    /// The program references something the account no longer has, or
    /// carries parameters that can never succeed.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CollaboratorError::WalletNotFound(_)
                | CollaboratorError::PluginNotFound(_)
                | CollaboratorError::Invalid(_)
        )
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, CollaboratorError::Unavailable(_))
    }
}
