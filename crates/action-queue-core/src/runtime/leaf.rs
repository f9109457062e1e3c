//! Starting leaf steps and checking the conditions they leave behind.

use std::cmp::Ordering;
use std::time::Duration;

use crate::action::{
    ActionOp, AmountFor, ExchangeActionOp, LoanActionOp, LoanKind, SwapActionOp,
};
use crate::effect::ActionEffect;
use crate::error::CollaboratorError;

use super::amount;
use super::context::{
    CollabResult, ExchangeOrder, ExecutionContext, LoanRequest, SwapRequest, TxConfirmations,
};

/// Share of a quoted swap payout we wait for when the sent amount is fixed.
const SWAP_PAYOUT_PERCENT: u128 = 90;

/// Outcome of checking one awaited condition.
#[derive(Debug, Clone, PartialEq)]
pub enum EffectCheck {
    Pending,
    Satisfied,
    Failed(String),
}

/// Start `op` and return the condition that marks it complete.
pub async fn execute(
    ctx: &ExecutionContext,
    op: &ActionOp,
    max_inline_delay: Duration,
) -> CollabResult<ActionEffect> {
    match op {
        ActionOp::ExchangeSell(order) => exchange_sell(ctx, order).await,
        ActionOp::ExchangeBuy(order) => exchange_buy(ctx, order).await,
        ActionOp::LoanBorrow(loan) => approve_loan(ctx, LoanKind::Borrow, loan).await,
        ActionOp::LoanDeposit(loan) => approve_loan(ctx, LoanKind::Deposit, loan).await,
        ActionOp::LoanRepay(loan) => approve_loan(ctx, LoanKind::Repay, loan).await,
        ActionOp::LoanWithdraw(loan) => approve_loan(ctx, LoanKind::Withdraw, loan).await,
        ActionOp::Swap(swap) => approve_swap(ctx, swap).await,
        ActionOp::BroadcastTx(op) => {
            let sent = ctx.wallets.broadcast(&op.wallet_id, &op.raw_tx).await?;
            Ok(ActionEffect::TxConfs {
                tx_id: sent.tx_id,
                wallet_id: op.wallet_id.clone(),
                confirmations: 1,
            })
        }
        ActionOp::Toast(op) => {
            ctx.notifier.toast(&op.message).await?;
            Ok(ActionEffect::done())
        }
        ActionOp::Delay(op) => {
            let wait = Duration::from_millis(op.ms);
            if wait <= max_inline_delay {
                tokio::time::sleep(wait).await;
                return Ok(ActionEffect::done());
            }
            // Longer waits become a deadline the foreground loop checks.
            let ms = i64::try_from(op.ms).unwrap_or(i64::MAX);
            Ok(ActionEffect::Unixtime {
                timestamp: ctx.now_ms().saturating_add(ms),
            })
        }
        ActionOp::Seq(_) | ActionOp::Par(_) => Err(CollaboratorError::Invalid(format!(
            "'{}' is not a leaf step",
            op.type_name()
        ))),
    }
}

async fn exchange_sell(ctx: &ExecutionContext, op: &ExchangeActionOp) -> CollabResult<ActionEffect> {
    let order = exchange_order(op);
    let deposit = ctx.exchanges.deposit_address(&order).await?;
    let sent = ctx
        .wallets
        .send(&op.wallet_id, op.token_id.as_deref(), &op.native_amount, &deposit)
        .await?;
    Ok(ActionEffect::TxConfs {
        tx_id: sent.tx_id,
        wallet_id: op.wallet_id.clone(),
        confirmations: 1,
    })
}

async fn exchange_buy(ctx: &ExecutionContext, op: &ExchangeActionOp) -> CollabResult<ActionEffect> {
    let token_id = op.token_id.as_deref();
    let balance = ctx.wallets.balance(&op.wallet_id, token_id).await?;
    let address = ctx.wallets.receive_address(&op.wallet_id, token_id).await?;
    let above = amount::add(&balance, &op.native_amount)?;
    ctx.exchanges.place_buy(&exchange_order(op), &address).await?;
    Ok(ActionEffect::AddressBalance {
        address,
        wallet_id: op.wallet_id.clone(),
        token_id: op.token_id.clone(),
        above_amount: Some(above),
        below_amount: None,
    })
}

fn exchange_order(op: &ExchangeActionOp) -> ExchangeOrder {
    ExchangeOrder {
        exchange_plugin_id: op.exchange_plugin_id.clone(),
        wallet_id: op.wallet_id.clone(),
        token_id: op.token_id.clone(),
        native_amount: op.native_amount.clone(),
    }
}

async fn approve_loan(
    ctx: &ExecutionContext,
    kind: LoanKind,
    op: &LoanActionOp,
) -> CollabResult<ActionEffect> {
    ctx.wallets.wallet_info(&op.wallet_id).await?;
    amount::parse(&op.native_amount)?;
    let request = LoanRequest {
        kind,
        borrow_plugin_id: op.borrow_plugin_id.clone(),
        wallet_id: op.wallet_id.clone(),
        token_id: op.token_id.clone(),
        native_amount: op.native_amount.clone(),
        from_token_id: op.from_token_id.clone(),
    };
    let txs = ctx.borrow.approve(&request).await?;
    // Only the last transaction completes the operation.
    let last = txs.into_iter().last().ok_or_else(|| {
        CollaboratorError::Failed(format!(
            "{} approved without broadcasting a transaction",
            op.borrow_plugin_id
        ))
    })?;
    Ok(ActionEffect::TxConfs {
        tx_id: last.tx_id,
        wallet_id: last.wallet_id,
        confirmations: 1,
    })
}

async fn approve_swap(ctx: &ExecutionContext, op: &SwapActionOp) -> CollabResult<ActionEffect> {
    ctx.wallets.wallet_info(&op.from_wallet_id).await?;
    ctx.wallets.wallet_info(&op.to_wallet_id).await?;
    let to_token = op.to_token_id.as_deref();
    let balance = ctx.wallets.balance(&op.to_wallet_id, to_token).await?;

    let request = SwapRequest {
        from_wallet_id: op.from_wallet_id.clone(),
        from_token_id: op.from_token_id.clone(),
        to_wallet_id: op.to_wallet_id.clone(),
        to_token_id: op.to_token_id.clone(),
        native_amount: op.native_amount.clone(),
        amount_for: op.amount_for,
    };
    let receipt = ctx.swaps.approve_swap(&request).await?;

    let payout = match (&op.expected_payout_native_amount, op.amount_for) {
        (Some(expected), _) => expected.clone(),
        (None, AmountFor::From) => {
            amount::percent_of(&receipt.payout_native_amount, SWAP_PAYOUT_PERCENT)?
        }
        (None, AmountFor::To) => receipt.payout_native_amount.clone(),
    };
    Ok(ActionEffect::AddressBalance {
        address: receipt.payout_address,
        wallet_id: op.to_wallet_id.clone(),
        token_id: op.to_token_id.clone(),
        above_amount: Some(amount::add(&balance, &payout)?),
        below_amount: None,
    })
}

/// Check whether a leaf condition holds now.
pub async fn check(ctx: &ExecutionContext, effect: &ActionEffect) -> CollabResult<EffectCheck> {
    match effect {
        ActionEffect::AddressBalance {
            wallet_id,
            token_id,
            above_amount,
            below_amount,
            ..
        } => {
            if above_amount.is_none() && below_amount.is_none() {
                return Ok(EffectCheck::Failed(
                    "address-balance effect has no bound".into(),
                ));
            }
            let balance = ctx.wallets.balance(wallet_id, token_id.as_deref()).await?;
            let above = match above_amount {
                Some(above) => amount::compare(&balance, above)? != Ordering::Less,
                None => false,
            };
            let below = match below_amount {
                Some(below) => amount::compare(&balance, below)? != Ordering::Greater,
                None => false,
            };
            Ok(satisfied_if(above || below))
        }
        ActionEffect::TxConfs {
            tx_id,
            wallet_id,
            confirmations,
        } => match ctx.wallets.tx_confirmations(wallet_id, tx_id).await? {
            TxConfirmations::Unknown => Ok(EffectCheck::Pending),
            TxConfirmations::Dropped => Ok(EffectCheck::Failed(format!(
                "transaction {tx_id} was dropped"
            ))),
            TxConfirmations::Confirmed => Ok(EffectCheck::Satisfied),
            TxConfirmations::Confirmations(n) => Ok(satisfied_if(n >= *confirmations)),
        },
        ActionEffect::PriceLevel {
            currency_pair,
            above_rate,
            below_rate,
        } => {
            let rate = ctx.rates.rate(currency_pair).await?;
            let above = above_rate.is_some_and(|a| rate >= a);
            let below = below_rate.is_some_and(|b| rate <= b);
            Ok(satisfied_if(above || below))
        }
        ActionEffect::Unixtime { timestamp } => Ok(satisfied_if(ctx.now_ms() >= *timestamp)),
        other => Ok(EffectCheck::Failed(format!(
            "'{}' is not a checkable effect",
            other.type_name()
        ))),
    }
}

fn satisfied_if(condition: bool) -> EffectCheck {
    if condition {
        EffectCheck::Satisfied
    } else {
        EffectCheck::Pending
    }
}
