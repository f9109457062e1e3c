//! The closed set of executable steps.
//!
//! An [`ActionOp`] tree is the immutable definition of a program: composite
//! `seq` / `par` nodes hold children, leaves describe one financial operation
//! carried out by an external collaborator.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ActionStatus
// ---------------------------------------------------------------------------

/// Informational execution status a program author may attach to a node.
/// Progress itself lives in the program state, never here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    Pending,
    Active,
    Done,
    Error,
}

// ---------------------------------------------------------------------------
// ActionOp
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ActionOp {
    Seq(NodeActionOp),
    Par(NodeActionOp),
    ExchangeBuy(ExchangeActionOp),
    ExchangeSell(ExchangeActionOp),
    LoanBorrow(LoanActionOp),
    LoanDeposit(LoanActionOp),
    LoanRepay(LoanActionOp),
    LoanWithdraw(LoanActionOp),
    Swap(SwapActionOp),
    BroadcastTx(BroadcastTxActionOp),
    Toast(ToastActionOp),
    Delay(DelayActionOp),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeActionOp {
    pub actions: Vec<ActionOp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ActionStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeActionOp {
    pub exchange_plugin_id: String,
    pub wallet_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_id: Option<String>,
    pub native_amount: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ActionStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanActionOp {
    pub borrow_plugin_id: String,
    pub wallet_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_id: Option<String>,
    pub native_amount: String,
    /// Repay only: pay the debt with a different token (collateral swap).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_token_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ActionStatus>,
}

/// Whether `nativeAmount` of a swap is what is sent or what is received.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AmountFor {
    From,
    To,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapActionOp {
    pub from_wallet_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_token_id: Option<String>,
    pub to_wallet_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_token_id: Option<String>,
    pub native_amount: String,
    pub amount_for: AmountFor,
    /// Overrides the quoted payout when deciding the balance to wait for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_payout_native_amount: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ActionStatus>,
}

/// A pre-signed transaction. The only step the push server can perform by
/// itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastTxActionOp {
    pub wallet_id: String,
    pub plugin_id: String,
    #[serde(with = "hex::serde")]
    pub raw_tx: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ActionStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToastActionOp {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ActionStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelayActionOp {
    pub ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ActionStatus>,
}

/// Which borrow-engine operation a `loan-*` step performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoanKind {
    Borrow,
    Deposit,
    Repay,
    Withdraw,
}

impl ActionOp {
    pub fn type_name(&self) -> &'static str {
        match self {
            ActionOp::Seq(_) => "seq",
            ActionOp::Par(_) => "par",
            ActionOp::ExchangeBuy(_) => "exchange-buy",
            ActionOp::ExchangeSell(_) => "exchange-sell",
            ActionOp::LoanBorrow(_) => "loan-borrow",
            ActionOp::LoanDeposit(_) => "loan-deposit",
            ActionOp::LoanRepay(_) => "loan-repay",
            ActionOp::LoanWithdraw(_) => "loan-withdraw",
            ActionOp::Swap(_) => "swap",
            ActionOp::BroadcastTx(_) => "broadcast-tx",
            ActionOp::Toast(_) => "toast",
            ActionOp::Delay(_) => "delay",
        }
    }

    pub fn seq(actions: Vec<ActionOp>) -> Self {
        ActionOp::Seq(NodeActionOp {
            actions,
            status: None,
        })
    }

    pub fn par(actions: Vec<ActionOp>) -> Self {
        ActionOp::Par(NodeActionOp {
            actions,
            status: None,
        })
    }

    /// Children of a composite node, `None` for leaves.
    pub fn children(&self) -> Option<&[ActionOp]> {
        match self {
            ActionOp::Seq(node) | ActionOp::Par(node) => Some(&node.actions),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<ActionStatus> {
        match self {
            ActionOp::Seq(op) | ActionOp::Par(op) => op.status,
            ActionOp::ExchangeBuy(op) | ActionOp::ExchangeSell(op) => op.status,
            ActionOp::LoanBorrow(op)
            | ActionOp::LoanDeposit(op)
            | ActionOp::LoanRepay(op)
            | ActionOp::LoanWithdraw(op) => op.status,
            ActionOp::Swap(op) => op.status,
            ActionOp::BroadcastTx(op) => op.status,
            ActionOp::Toast(op) => op.status,
            ActionOp::Delay(op) => op.status,
        }
    }

    /// Whether the push server can carry this step out when a trigger fires.
    pub fn has_push_payload(&self) -> bool {
        matches!(self, ActionOp::BroadcastTx(_))
    }

    /// The leaf that runs first when this node starts, if there is exactly
    /// one. A `par` starts several leaves at once and yields `None`.
    pub fn first_leaf(&self) -> Option<&ActionOp> {
        match self {
            ActionOp::Seq(node) => node.actions.first().and_then(ActionOp::first_leaf),
            ActionOp::Par(_) => None,
            leaf => Some(leaf),
        }
    }
}
