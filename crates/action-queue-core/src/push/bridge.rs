//! Translate awaited effects into push server events.

use push_client::{BroadcastTx, PushEvent, PushTrigger};
use serde_json::json;

use crate::action::ActionOp;
use crate::effect::ActionEffect;
use crate::error::{QueueError, Result};
use crate::flatten::{join_path, pending_leaf_paths};
use crate::program::ExecutionResult;
use crate::runtime::context::WalletLookup;

/// What the push server should do once an event fires, besides waking us.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushEventParams {
    pub broadcast_txs: Vec<BroadcastTx>,
}

/// Event ids are `<programId>:<callStackId>`; a root leaf uses `root`.
pub fn event_id(program_id: &str, call_stack_id: &str) -> String {
    if call_stack_id.is_empty() {
        format!("{program_id}:root")
    } else {
        format!("{program_id}:{call_stack_id}")
    }
}

/// The program an event id belongs to.
pub fn program_id_of(event_id: &str) -> Option<&str> {
    event_id.rsplit_once(':').map(|(program_id, _)| program_id)
}

/// Map one leaf effect to the server trigger watching the same condition.
///
/// Fails for anything but `address-balance`, `tx-confs` and `price-level`:
/// composite effects must be flattened first and the rest cannot be watched
/// remotely.
pub async fn effect_to_trigger<L>(lookup: &L, effect: &ActionEffect) -> Result<PushTrigger>
where
    L: WalletLookup + ?Sized,
{
    match effect {
        ActionEffect::AddressBalance {
            address,
            wallet_id,
            token_id,
            above_amount,
            below_amount,
        } => {
            let wallet = lookup.wallet_info(wallet_id).await?;
            Ok(PushTrigger::AddressBalance {
                plugin_id: wallet.plugin_id,
                token_id: token_id.clone(),
                address: address.clone(),
                above_amount: above_amount.clone(),
                below_amount: below_amount.clone(),
            })
        }
        ActionEffect::TxConfs {
            tx_id,
            wallet_id,
            confirmations,
        } => {
            let wallet = lookup.wallet_info(wallet_id).await?;
            Ok(PushTrigger::TxConfirm {
                plugin_id: wallet.plugin_id,
                confirmations: *confirmations,
                txid: tx_id.clone(),
            })
        }
        ActionEffect::PriceLevel {
            currency_pair,
            above_rate,
            below_rate,
        } => Ok(PushTrigger::PriceLevel {
            currency_pair: currency_pair.clone(),
            above_rate: *above_rate,
            below_rate: *below_rate,
        }),
        other => Err(QueueError::UnsupportedEffect(other.type_name().to_string())),
    }
}

/// Side effects the push server performs for `action`. Only pre-signed
/// broadcasts can be delegated.
pub fn push_event_params(action: &ActionOp) -> Result<PushEventParams> {
    match action {
        ActionOp::BroadcastTx(op) => Ok(PushEventParams {
            broadcast_txs: vec![BroadcastTx {
                plugin_id: op.plugin_id.clone(),
                raw_tx: op.raw_tx.clone(),
            }],
        }),
        other => Err(QueueError::UnsupportedAction(other.type_name().to_string())),
    }
}

/// One untriggered [`PushEvent`] per outstanding leaf of every result.
///
/// Fails fast: a single unsupported effect or action aborts the whole batch
/// so nothing partial is registered.
pub async fn prepare_push_events<L>(
    lookup: &L,
    program_id: &str,
    results: &[ExecutionResult],
) -> Result<Vec<PushEvent>>
where
    L: WalletLookup + ?Sized,
{
    let mut events = Vec::new();
    for result in results {
        let params = match &result.action {
            Some(action) => push_event_params(action)?,
            None => PushEventParams::default(),
        };
        for (path, leaf) in pending_leaf_paths(&result.effect) {
            let trigger = effect_to_trigger(lookup, leaf).await?;
            let id = event_id(program_id, &join_path(&result.call_stack_id, &path));
            let mut event = PushEvent::new(id.clone(), trigger);
            event.broadcast_txs = params.broadcast_txs.clone();
            event.push_payload = Some(json!({ "programId": program_id, "eventId": id }));
            events.push(event);
        }
    }
    Ok(events)
}
