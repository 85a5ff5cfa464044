//! Error types for the rebalancer.

use sunward_placement::ParameterError;
use thiserror::Error;

/// Invalid policy configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment value could not be parsed.
    #[error("invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },

    /// The periodic timer must tick.
    #[error("periodic interval must be greater than zero")]
    ZeroPeriodicInterval,

    /// The mailbox must hold at least one message.
    #[error("mailbox size must be greater than zero")]
    ZeroMailbox,

    /// Significance margin is out of range.
    #[error(transparent)]
    Parameters(#[from] ParameterError),
}

/// A relocation that could not be carried out.
#[derive(Debug, Error)]
pub enum MoveError {
    /// The item refused to move.
    #[error("move rejected: {0}")]
    Rejected(String),

    /// Any other substrate failure.
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

/// Errors surfaced by the policy handle.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// The mailbox is at capacity.
    #[error("mailbox full")]
    MailboxFull,

    /// The policy task has exited.
    #[error("policy stopped")]
    Stopped,
}

impl PolicyError {
    /// Returns true if retrying later could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::MailboxFull)
    }
}
