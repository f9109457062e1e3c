//! Effects: what a program is waiting on.
//!
//! The effect tree mirrors the shape of the [`ActionOp`](crate::action::ActionOp)
//! tree but only along the path that is currently in progress. `seq` carries
//! the index of the running child, `par` carries one effect per child.

use serde::{Deserialize, Serialize};

use crate::error::CollaboratorError;

// ---------------------------------------------------------------------------
// EffectError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EffectErrorKind {
    /// The program refers to a wallet, plugin or amount that cannot work.
    Validation,
    /// A collaborator refused or failed the operation.
    Execution,
    /// The persisted effect does not fit the program's action tree.
    InvalidState,
    /// The user cancelled the program.
    Cancelled,
}

/// Why a program (or one branch of it) stopped without completing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectError {
    pub kind: EffectErrorKind,
    pub message: String,
}

impl EffectError {
    pub fn new(kind: EffectErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for EffectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl From<&CollaboratorError> for EffectError {
    fn from(err: &CollaboratorError) -> Self {
        let kind = if err.is_validation() {
            EffectErrorKind::Validation
        } else {
            EffectErrorKind::Execution
        };
        EffectError::new(kind, err.to_string())
    }
}

// ---------------------------------------------------------------------------
// ActionEffect
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ActionEffect {
    #[serde(rename_all = "camelCase")]
    Seq {
        op_index: usize,
        child_effect: Box<ActionEffect>,
    },
    #[serde(rename_all = "camelCase")]
    Par { child_effects: Vec<ActionEffect> },
    #[serde(rename_all = "camelCase")]
    AddressBalance {
        address: String,
        wallet_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        above_amount: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        below_amount: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    TxConfs {
        tx_id: String,
        wallet_id: String,
        confirmations: u32,
    },
    #[serde(rename_all = "camelCase")]
    PriceLevel {
        currency_pair: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        above_rate: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        below_rate: Option<f64>,
    },
    /// Wall-clock deadline in unix milliseconds. Checked locally only.
    Unixtime { timestamp: i64 },
    /// Not started yet.
    Init,
    /// Terminal. `childEffects` is a snapshot of a `par` that failed.
    #[serde(rename_all = "camelCase")]
    Done {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<EffectError>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        child_effects: Option<Vec<ActionEffect>>,
    },
}

impl ActionEffect {
    pub fn done() -> Self {
        ActionEffect::Done {
            error: None,
            child_effects: None,
        }
    }

    pub fn failed(error: EffectError) -> Self {
        ActionEffect::Done {
            error: Some(error),
            child_effects: None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ActionEffect::Seq { .. } => "seq",
            ActionEffect::Par { .. } => "par",
            ActionEffect::AddressBalance { .. } => "address-balance",
            ActionEffect::TxConfs { .. } => "tx-confs",
            ActionEffect::PriceLevel { .. } => "price-level",
            ActionEffect::Unixtime { .. } => "unixtime",
            ActionEffect::Init => "init",
            ActionEffect::Done { .. } => "done",
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, ActionEffect::Done { .. })
    }

    /// The error of a terminal effect, `None` while pending or on success.
    pub fn error(&self) -> Option<&EffectError> {
        match self {
            ActionEffect::Done { error, .. } => error.as_ref(),
            _ => None,
        }
    }

    /// A condition the interpreter can check directly.
    pub fn is_leaf(&self) -> bool {
        matches!(
            self,
            ActionEffect::AddressBalance { .. }
                | ActionEffect::TxConfs { .. }
                | ActionEffect::PriceLevel { .. }
                | ActionEffect::Unixtime { .. }
        )
    }

    /// A condition the push server knows how to watch.
    pub fn is_triggerable(&self) -> bool {
        matches!(
            self,
            ActionEffect::AddressBalance { .. }
                | ActionEffect::TxConfs { .. }
                | ActionEffect::PriceLevel { .. }
        )
    }
}
