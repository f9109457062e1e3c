use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use push_client::{BroadcastTx, PushEventState, PushEventStatus, PushTrigger};
use serde_json::json;
use tempfile::TempDir;

use super::*;
use crate::action::{ActionOp, BroadcastTxActionOp, ToastActionOp};
use crate::program::CompleteMessage;
use crate::runtime::context::TxConfirmations;
use crate::testing::{FakePush, Fakes};

struct Harness {
    _dir: TempDir,
    fakes: Fakes,
    push: Arc<FakePush>,
    queue: ActionQueue,
}

fn harness() -> Harness {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(ProgramStore::open(&dir.path().join("queue.db")).unwrap());
    let fakes = Fakes::new();
    let push = Arc::new(FakePush::default());
    let interpreter =
        Interpreter::new(fakes.context()).with_max_inline_delay(Duration::from_millis(1));
    let options = QueueOptions {
        push_message: Some("Action needed".into()),
        ..QueueOptions::default()
    };
    let queue = ActionQueue::new(store, interpreter, push.clone(), options);
    Harness {
        _dir: dir,
        fakes,
        push,
        queue,
    }
}

fn broadcast(raw: u8) -> ActionOp {
    ActionOp::BroadcastTx(BroadcastTxActionOp {
        wallet_id: "w1".into(),
        plugin_id: "bitcoin".into(),
        raw_tx: vec![raw],
        status: None,
    })
}

fn toast(message: &str) -> ActionOp {
    ActionOp::Toast(ToastActionOp {
        message: message.into(),
        status: None,
    })
}

fn tx(id: &str) -> ActionEffect {
    ActionEffect::TxConfs {
        tx_id: id.into(),
        wallet_id: "w1".into(),
        confirmations: 1,
    }
}

fn two_broadcasts(id: &str, first: u8, second: u8) -> ActionProgram {
    ActionProgram::with_id(id, ActionOp::seq(vec![broadcast(first), broadcast(second)]))
}

fn triggered(event_id: &str, errors: Option<Vec<Option<String>>>) -> PushEventStatus {
    PushEventStatus {
        event_id: event_id.into(),
        trigger: json!({"type": "tx-confirm"}),
        state: PushEventState::Triggered,
        broadcast_tx_errors: errors,
    }
}

// ─── scheduling and registration ──────────────────────────────────────────

#[tokio::test]
async fn schedule_registers_trigger_with_next_broadcast() {
    let h = harness();
    let state = h.queue.schedule(two_broadcasts("p1", 0x0a, 0x0b)).await.unwrap();

    assert_eq!(
        state.effect,
        Some(ActionEffect::Seq {
            op_index: 0,
            child_effect: Box::new(tx("0a")),
        })
    );
    assert_eq!(state.push_event_ids, vec!["p1:seq_0".to_string()]);
    assert_eq!(state.next_execution_time, NEVER);
    assert_eq!(state.last_execution_time, 1_000_000);

    let updates = h.push.login_updates();
    assert_eq!(updates.len(), 1);
    assert!(updates[0].remove_events.is_empty());
    let event = &updates[0].events[0];
    assert_eq!(event.event_id, "p1:seq_0");
    assert_eq!(
        event.trigger,
        PushTrigger::TxConfirm {
            plugin_id: "bitcoin".into(),
            confirmations: 1,
            txid: "0a".into(),
        }
    );
    assert_eq!(
        event.broadcast_txs,
        vec![BroadcastTx {
            plugin_id: "bitcoin".into(),
            raw_tx: vec![0x0b],
        }]
    );
    assert_eq!(event.push_message.as_deref(), Some("Action needed"));

    let stored = h.queue.store().get("p1").unwrap().unwrap();
    assert_eq!(stored.state, state);
}

#[tokio::test]
async fn rerun_without_change_is_side_effect_free() {
    let h = harness();
    let first = h.queue.schedule(two_broadcasts("p1", 0x0a, 0x0b)).await.unwrap();
    let second = h.queue.run("p1").await.unwrap();

    assert_eq!(first.effect, second.effect);
    assert_eq!(h.fakes.wallets.broadcasts(), vec!["0a"]);
    assert_eq!(h.push.login_updates().len(), 1);
}

#[tokio::test]
async fn fired_trigger_advances_and_registers_next_leaf() {
    let h = harness();
    h.queue.schedule(two_broadcasts("p1", 0x0a, 0x0b)).await.unwrap();

    h.fakes.wallets.set_confirmations("0a", TxConfirmations::Confirmed);
    let state = h.queue.on_trigger_fired("p1:seq_0").await.unwrap().unwrap();

    assert_eq!(
        state.effect,
        Some(ActionEffect::Seq {
            op_index: 1,
            child_effect: Box::new(tx("0b")),
        })
    );
    assert_eq!(state.push_event_ids, vec!["p1:seq_1".to_string()]);
    let updates = h.push.login_updates();
    assert_eq!(updates.len(), 2);
    assert_eq!(updates[1].events[0].event_id, "p1:seq_1");
    assert!(updates[1].events[0].broadcast_txs.is_empty());
}

#[tokio::test]
async fn registration_failure_falls_back_to_foreground() {
    let h = harness();
    h.push.set_failing(true);
    let state = h.queue.schedule(two_broadcasts("p1", 0x0a, 0x0b)).await.unwrap();
    assert!(state.push_event_ids.is_empty());
    assert_eq!(state.next_execution_time, 1_000_000);

    h.push.set_failing(false);
    let resumed = h.queue.resume_due().await.unwrap();
    assert_eq!(resumed.len(), 1);
    assert_eq!(resumed[0].push_event_ids, vec!["p1:seq_0".to_string()]);
    assert_eq!(resumed[0].next_execution_time, NEVER);
    assert_eq!(h.fakes.wallets.broadcasts(), vec!["0a"]);
}

#[tokio::test]
async fn unixtime_effect_waits_for_foreground_clock() {
    let h = harness();
    let program = ActionProgram::with_id("p1", ActionOp::seq(vec![broadcast(0x0a), toast("later")]));
    h.queue.store().insert(&program).unwrap();
    h.queue
        .store()
        .update_state("p1", |s| {
            s.effect = Some(ActionEffect::Seq {
                op_index: 0,
                child_effect: Box::new(ActionEffect::Unixtime {
                    timestamp: 2_000_000,
                }),
            })
        })
        .unwrap();

    let state = h.queue.run("p1").await.unwrap();
    assert_eq!(state.next_execution_time, 2_000_000);
    assert!(h.push.login_updates().is_empty());
    assert!(h.queue.resume_due().await.unwrap().is_empty());

    h.fakes.clock.set(2_000_000);
    let resumed = h.queue.resume_due().await.unwrap();
    assert!(resumed[0].is_done());
    assert_eq!(h.fakes.notifier.messages(), vec!["later"]);
}

// ─── completion and cancellation ──────────────────────────────────────────

#[tokio::test]
async fn completion_retires_events_and_shows_message() {
    let h = harness();
    let mut program = ActionProgram::with_id("p1", ActionOp::seq(vec![broadcast(0x0a), toast("sent")]));
    program.complete_message = Some(CompleteMessage {
        title: "Done".into(),
        message: "All set".into(),
    });
    h.queue.schedule(program).await.unwrap();

    h.fakes.wallets.set_confirmations("0a", TxConfirmations::Confirmed);
    let state = h.queue.run("p1").await.unwrap();

    assert!(state.is_done());
    assert!(state.push_event_ids.is_empty());
    assert_eq!(h.fakes.notifier.messages(), vec!["sent", "Done: All set"]);
    let last = h.push.login_updates().pop().unwrap();
    assert_eq!(last.remove_events, vec!["p1:seq_0".to_string()]);
}

#[tokio::test]
async fn cancel_withdraws_events_and_ignores_late_triggers() {
    let h = harness();
    h.queue.schedule(two_broadcasts("p1", 0x0a, 0x0b)).await.unwrap();

    let state = h.queue.cancel("p1").await.unwrap();
    assert_eq!(
        state.current_effect().error().map(|e| e.kind),
        Some(EffectErrorKind::Cancelled)
    );
    assert!(state.push_event_ids.is_empty());
    let updates = h.push.login_updates();
    assert_eq!(updates.last().unwrap().remove_events, vec!["p1:seq_0".to_string()]);

    h.fakes.wallets.set_confirmations("0a", TxConfirmations::Confirmed);
    assert!(h.queue.on_trigger_fired("p1:seq_0").await.unwrap().is_none());
    assert_eq!(h.fakes.wallets.broadcasts(), vec!["0a"]);

    let again = h.queue.cancel("p1").await.unwrap();
    assert_eq!(again, state);
    assert_eq!(h.push.login_updates().len(), updates.len());
}

#[tokio::test]
async fn unknown_or_malformed_triggers_are_ignored() {
    let h = harness();
    assert!(h.queue.on_trigger_fired("ghost:seq_0").await.unwrap().is_none());
    assert!(h.queue.on_trigger_fired("no-separator").await.unwrap().is_none());
}

// ─── polling ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn poll_resumes_fired_programs_and_fails_broadcast_errors() {
    let h = harness();
    h.queue.schedule(two_broadcasts("p1", 0x0a, 0x0b)).await.unwrap();
    h.queue.schedule(two_broadcasts("p2", 0x0c, 0x0d)).await.unwrap();
    h.fakes.wallets.set_confirmations("0a", TxConfirmations::Confirmed);

    h.push.set_statuses(vec![
        triggered("p1:seq_0", None),
        triggered("p2:seq_0", Some(vec![Some("nonce too low".into())])),
        PushEventStatus {
            state: PushEventState::Waiting,
            ..triggered("p3:seq_0", None)
        },
    ]);
    let resumed = h.queue.poll_push_events().await.unwrap();
    assert_eq!(resumed.len(), 2);

    let p1 = h.queue.store().get("p1").unwrap().unwrap().state;
    assert_eq!(p1.push_event_ids, vec!["p1:seq_1".to_string()]);

    let p2 = h.queue.store().get("p2").unwrap().unwrap().state;
    let error = p2.current_effect().error().cloned().unwrap();
    assert_eq!(error.kind, EffectErrorKind::Execution);
    assert!(error.message.contains("nonce too low"));
    assert!(!h.fakes.wallets.broadcasts().contains(&"0d".to_string()));

    // Already handled events are skipped on the next poll.
    let again = h.queue.poll_push_events().await.unwrap();
    assert!(again.is_empty());
}

#[tokio::test]
async fn poll_skips_busy_program_and_resumes_the_rest() {
    let h = harness();
    h.queue.schedule(two_broadcasts("p1", 0x0a, 0x0b)).await.unwrap();
    h.queue.schedule(two_broadcasts("p2", 0x0c, 0x0d)).await.unwrap();
    h.queue
        .store()
        .try_claim("p1", "other-runner", Utc::now(), Duration::from_secs(300))
        .unwrap();
    h.fakes.wallets.set_confirmations("0c", TxConfirmations::Confirmed);

    h.push.set_statuses(vec![
        triggered("p1:seq_0", Some(vec![Some("nonce too low".into())])),
        triggered("p2:seq_0", None),
    ]);
    let resumed = h.queue.poll_push_events().await.unwrap();
    assert_eq!(resumed.len(), 1);
    assert_eq!(resumed[0].program_id, "p2");

    let p1 = h.queue.store().get("p1").unwrap().unwrap().state;
    assert!(!p1.is_done());
    let p2 = h.queue.store().get("p2").unwrap().unwrap().state;
    assert_eq!(p2.push_event_ids, vec!["p2:seq_1".to_string()]);
}

// ─── claims ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn program_claimed_elsewhere_is_busy() {
    let h = harness();
    let program = two_broadcasts("p1", 0x0a, 0x0b);
    h.queue.store().insert(&program).unwrap();
    h.queue
        .store()
        .try_claim("p1", "other-runner", Utc::now(), Duration::from_secs(300))
        .unwrap();

    let err = h.queue.run("p1").await.unwrap_err();
    assert!(matches!(err, QueueError::ProgramBusy(_)));
    assert!(h.queue.on_trigger_fired("p1:seq_0").await.unwrap().is_none());
    assert!(h.fakes.wallets.broadcasts().is_empty());
}

#[tokio::test]
async fn recover_drops_dead_runner_claims() {
    let h = harness();
    h.queue
        .store()
        .try_claim(
            "p1",
            "dead-runner",
            Utc::now() - chrono::Duration::hours(1),
            Duration::from_secs(300),
        )
        .unwrap();
    assert_eq!(h.queue.recover().unwrap(), 1);
    assert!(h.queue.store().claim("p1").unwrap().is_none());
}

// ─── removal ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn only_finished_programs_are_removed() {
    let h = harness();
    h.queue.schedule(two_broadcasts("p1", 0x0a, 0x0b)).await.unwrap();
    let done = h
        .queue
        .schedule(ActionProgram::with_id("p2", toast("hello")))
        .await
        .unwrap();
    assert!(done.is_done());

    let err = h.queue.remove("p1").await.unwrap_err();
    assert!(matches!(err, QueueError::ProgramActive(_)));

    assert_eq!(h.queue.prune().await.unwrap(), vec!["p2".to_string()]);
    assert!(h.queue.store().get("p2").unwrap().is_none());

    h.queue.cancel("p1").await.unwrap();
    h.queue.remove("p1").await.unwrap();
    assert!(h.queue.store().list().unwrap().is_empty());
}

// ─── device registration ──────────────────────────────────────────────────

#[tokio::test]
async fn register_device_sends_every_pending_event() {
    let h = harness();
    h.queue.schedule(two_broadcasts("p1", 0x0a, 0x0b)).await.unwrap();
    h.queue
        .schedule(ActionProgram::with_id("p2", toast("hello")))
        .await
        .unwrap();

    let identity = DeviceIdentity {
        device_token: "token-1".into(),
        root_login_ids: vec![vec![1, 2, 3]],
    };
    h.queue.register_device(&identity).await.unwrap();

    let updates = h.push.device_updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].root_login_ids, vec!["AQID".to_string()]);
    assert_eq!(updates[0].device_token, "token-1");
    let ids: Vec<&str> = updates[0].events.iter().map(|e| e.event_id.as_str()).collect();
    assert_eq!(ids, vec!["p1:seq_0"]);
}
