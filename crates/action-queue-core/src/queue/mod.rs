//! Coordinator between the program store, the interpreter and the push
//! server.
//!
//! ```text
//! schedule / trigger fired / foreground tick
//!        │
//!        ▼
//!  claim program ──▶ drive interpreter ──▶ persist state
//!        │                                     │
//!        │                 done ◀──────────────┤
//!        │        retire events                ▼ pending
//!        │                         register push events for the new leaves
//!        ▼
//!  release claim
//! ```
//!
//! State is persisted before any push registration so a crash in between
//! only costs a re-registration on the next run.

mod locks;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use push_client::{
    DevicePayload, DeviceUpdatePayload, LoginUpdatePayload, PushApi, PushEvent, PushEventState,
};

use crate::effect::{ActionEffect, EffectError, EffectErrorKind};
use crate::error::{QueueError, Result};
use crate::program::{ActionProgram, ActionProgramState, ActionQueueItem, NEVER};
use crate::push::{prepare_push_events, program_id_of};
use crate::runtime::Interpreter;
use crate::store::ProgramStore;

use locks::{ProgramGuard, ProgramLocks};

#[derive(Debug, Clone)]
pub struct QueueOptions {
    /// Upper bound on advances per run.
    pub max_steps: usize,
    /// Age after which another runner's claim counts as abandoned.
    pub lock_ttl: Duration,
    /// Text of the push notification sent when a trigger fires.
    pub push_message: Option<String>,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            max_steps: 64,
            lock_ttl: Duration::from_secs(300),
            push_message: None,
        }
    }
}

/// Identity sent with a full device registration.
#[derive(Debug, Clone)]
pub struct DeviceIdentity {
    pub device_token: String,
    pub root_login_ids: Vec<Vec<u8>>,
}

pub struct ActionQueue {
    store: Arc<ProgramStore>,
    interpreter: Interpreter,
    push: Arc<dyn PushApi>,
    locks: ProgramLocks,
    owner: String,
    options: QueueOptions,
}

impl ActionQueue {
    pub fn new(
        store: Arc<ProgramStore>,
        interpreter: Interpreter,
        push: Arc<dyn PushApi>,
        options: QueueOptions,
    ) -> Self {
        Self {
            store,
            interpreter,
            push,
            locks: ProgramLocks::default(),
            owner: format!("{}-{}", std::process::id(), uuid::Uuid::new_v4()),
            options,
        }
    }

    pub fn store(&self) -> &ProgramStore {
        &self.store
    }

    fn now_ms(&self) -> i64 {
        self.interpreter.context().now_ms()
    }

    // ─── Entry points ─────────────────────────────────────────────────────

    /// Store a new program and run it as far as it goes.
    pub async fn schedule(&self, program: ActionProgram) -> Result<ActionProgramState> {
        self.store.insert(&program)?;
        tracing::info!(
            program_id = %program.program_id,
            action = program.action_op.type_name(),
            "scheduled program"
        );
        self.run(&program.program_id).await
    }

    /// Advance `program_id` from its persisted effect. Re-running a program
    /// whose conditions have not changed performs no side effects.
    pub async fn run(&self, program_id: &str) -> Result<ActionProgramState> {
        let _guard = self.acquire(program_id).await?;
        let result = self.step(program_id, None).await;
        self.release(program_id);
        result
    }

    /// A push event fired. Returns `None` when the program is unknown,
    /// finished, cancelled or being run by someone else.
    pub async fn on_trigger_fired(&self, event_id: &str) -> Result<Option<ActionProgramState>> {
        let Some(program_id) = program_id_of(event_id) else {
            tracing::warn!(event_id, "ignoring malformed event id");
            return Ok(None);
        };
        match self.store.get(program_id)? {
            None => {
                tracing::info!(event_id, "trigger fired for unknown program, ignoring");
                return Ok(None);
            }
            Some(item) if item.state.is_done() => {
                tracing::debug!(event_id, "trigger fired for finished program, ignoring");
                return Ok(None);
            }
            Some(_) => {}
        }

        let guard = match self.acquire(program_id).await {
            Ok(guard) => guard,
            Err(QueueError::ProgramBusy(_)) => {
                tracing::debug!(event_id, "program busy, the running step will pick this up");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        let result = self.step(program_id, Some(event_id)).await;
        self.release(program_id);
        drop(guard);

        match result {
            Ok(state) => Ok(Some(state)),
            Err(QueueError::ProgramNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Ask the push server which events fired while we were away and resume
    /// their programs. Failures of one program do not stop the others.
    pub async fn poll_push_events(&self) -> Result<Vec<ActionProgramState>> {
        let payload = self.push.login_events().await?;
        let mut resumed = Vec::new();
        for status in payload.events {
            if status.state != PushEventState::Triggered {
                continue;
            }
            let Some(program_id) = program_id_of(&status.event_id) else {
                continue;
            };
            let Some(item) = self.store.get(program_id)? else {
                continue;
            };
            if item.state.is_done() || !item.state.push_event_ids.contains(&status.event_id) {
                continue;
            }

            let errors = status.broadcast_errors();
            if !errors.is_empty() {
                let message = format!(
                    "push server failed to broadcast for {}: {}",
                    status.event_id,
                    errors.join("; ")
                );
                let error = EffectError::new(EffectErrorKind::Execution, message);
                match self.terminate(program_id, error).await {
                    Ok(state) => resumed.push(state),
                    Err(QueueError::ProgramBusy(_)) | Err(QueueError::ProgramNotFound(_)) => {
                        tracing::debug!(event_id = %status.event_id, "program busy or gone, skipping");
                    }
                    Err(e) => {
                        tracing::warn!(event_id = %status.event_id, error = %e, "failed to stop program");
                    }
                }
                continue;
            }
            match self.on_trigger_fired(&status.event_id).await {
                Ok(Some(state)) => resumed.push(state),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(event_id = %status.event_id, error = %e, "failed to resume program");
                }
            }
        }
        Ok(resumed)
    }

    /// Foreground tick: run every program that is due, or was stored but
    /// never started. Failures of one program do not stop the others.
    pub async fn resume_due(&self) -> Result<Vec<ActionProgramState>> {
        let now = self.now_ms();
        let mut due: Vec<String> = self
            .store
            .list()?
            .into_values()
            .filter(|item| item.state.is_due(now) || item.state.effect.is_none())
            .map(|item| item.program.program_id)
            .collect();
        due.sort();

        let mut states = Vec::new();
        for program_id in due {
            match self.run(&program_id).await {
                Ok(state) => states.push(state),
                Err(QueueError::ProgramBusy(_)) => {
                    tracing::debug!(program_id = %program_id, "skipping busy program");
                }
                Err(e) => {
                    tracing::warn!(program_id = %program_id, error = %e, "foreground run failed");
                }
            }
        }
        Ok(states)
    }

    /// Stop a program. Its registered events are withdrawn; a trigger that
    /// still fires afterwards is ignored.
    pub async fn cancel(&self, program_id: &str) -> Result<ActionProgramState> {
        let error = EffectError::new(EffectErrorKind::Cancelled, "cancelled by user");
        self.terminate(program_id, error).await
    }

    /// Delete a finished program. Running programs must be cancelled first.
    pub async fn remove(&self, program_id: &str) -> Result<ActionQueueItem> {
        let _guard = self.locks.lock(program_id).await;
        let item = self
            .store
            .get(program_id)?
            .ok_or_else(|| QueueError::ProgramNotFound(program_id.to_string()))?;
        if !item.state.is_done() {
            return Err(QueueError::ProgramActive(program_id.to_string()));
        }
        self.store.remove(program_id)
    }

    /// Remove every finished program. Returns the removed ids.
    pub async fn prune(&self) -> Result<Vec<String>> {
        let mut done: Vec<String> = self
            .store
            .list()?
            .into_values()
            .filter(|item| item.state.is_done())
            .map(|item| item.program.program_id)
            .collect();
        done.sort();
        for program_id in &done {
            self.remove(program_id).await?;
        }
        Ok(done)
    }

    /// Drop claims left behind by runners that died mid-step.
    pub fn recover(&self) -> Result<u32> {
        let recovered = self.store.recover_stale_claims(self.options.lock_ttl)?;
        if recovered > 0 {
            tracing::warn!(recovered, "recovered stale program claims");
        }
        Ok(recovered)
    }

    /// Send the device identity together with the full interest set of
    /// every unfinished program.
    pub async fn register_device(&self, identity: &DeviceIdentity) -> Result<DevicePayload> {
        let mut by_program: BTreeMap<String, Vec<PushEvent>> = BTreeMap::new();
        for item in self.store.list()?.into_values() {
            if item.state.is_done() {
                continue;
            }
            match self.plan_events(&item.program, &item.state.current_effect()).await {
                Ok(events) => {
                    by_program.insert(item.program.program_id, events);
                }
                Err(e) => {
                    tracing::warn!(program_id = %item.program.program_id, error = %e, "cannot plan events, skipping program");
                }
            }
        }

        let events: Vec<PushEvent> = by_program.values().flatten().cloned().collect();
        let payload =
            DeviceUpdatePayload::new(&identity.root_login_ids, events, &identity.device_token);
        let response = self.push.update_device(&payload).await?;
        tracing::info!(
            programs = by_program.len(),
            events = payload.events.len(),
            "registered device"
        );

        for (program_id, events) in by_program {
            let ids: Vec<String> = events.into_iter().map(|e| e.event_id).collect();
            self.store
                .update_state(&program_id, |state| state.push_event_ids = ids)?;
        }
        Ok(response)
    }

    // ─── Claims ───────────────────────────────────────────────────────────

    async fn acquire(&self, program_id: &str) -> Result<ProgramGuard<'_>> {
        let guard = self.locks.lock(program_id).await;
        if !self
            .store
            .try_claim(program_id, &self.owner, Utc::now(), self.options.lock_ttl)?
        {
            return Err(QueueError::ProgramBusy(program_id.to_string()));
        }
        Ok(guard)
    }

    fn release(&self, program_id: &str) {
        if let Err(e) = self.store.release(program_id, &self.owner) {
            tracing::warn!(program_id, error = %e, "failed to release program claim");
        }
    }

    // ─── Steps ────────────────────────────────────────────────────────────

    /// One run of a claimed program.
    async fn step(&self, program_id: &str, fired: Option<&str>) -> Result<ActionProgramState> {
        let item = self
            .store
            .get(program_id)?
            .ok_or_else(|| QueueError::ProgramNotFound(program_id.to_string()))?;
        if item.state.is_done() {
            return Ok(item.state);
        }

        let mut state = item.state;
        if let Some(event_id) = fired {
            // Fired events are spent on the server.
            state.push_event_ids.retain(|id| id != event_id);
        }
        let mut state = self
            .interpreter
            .drive(&item.program, state, self.options.max_steps)
            .await;
        state.last_execution_time = self.now_ms();
        self.store.save_state(&state)?;

        if state.is_done() {
            self.finish(&item.program, &mut state).await;
        } else {
            self.register_triggers(&item.program, &mut state).await?;
        }
        self.store.save_state(&state)?;
        Ok(state)
    }

    async fn terminate(&self, program_id: &str, error: EffectError) -> Result<ActionProgramState> {
        let _guard = self.acquire(program_id).await?;
        let result: Result<ActionProgramState> = async {
            let item = self
                .store
                .get(program_id)?
                .ok_or_else(|| QueueError::ProgramNotFound(program_id.to_string()))?;
            if item.state.is_done() {
                return Ok(item.state);
            }
            tracing::info!(program_id, error = %error, "terminating program");
            let mut state = item.state;
            state.effect = Some(ActionEffect::failed(error));
            state.next_execution_time = NEVER;
            self.store.save_state(&state)?;
            self.retire_events(&mut state).await;
            self.store.save_state(&state)?;
            Ok(state)
        }
        .await;
        self.release(program_id);
        result
    }

    async fn finish(&self, program: &ActionProgram, state: &mut ActionProgramState) {
        state.next_execution_time = NEVER;
        self.retire_events(state).await;
        match state.current_effect().error() {
            Some(error) => {
                tracing::warn!(program_id = %program.program_id, error = %error, "program failed");
            }
            None => {
                tracing::info!(program_id = %program.program_id, "program complete");
                if let Some(complete) = &program.complete_message {
                    let text = format!("{}: {}", complete.title, complete.message);
                    if let Err(e) = self.interpreter.context().notifier.toast(&text).await {
                        tracing::warn!(program_id = %program.program_id, error = %e, "completion toast failed");
                    }
                }
            }
        }
    }

    /// Withdraw every registered event. Best effort.
    async fn retire_events(&self, state: &mut ActionProgramState) {
        if state.push_event_ids.is_empty() {
            return;
        }
        let update = LoginUpdatePayload {
            events: Vec::new(),
            remove_events: std::mem::take(&mut state.push_event_ids),
        };
        if let Err(e) = self.push.update_login(&update).await {
            tracing::warn!(
                program_id = %state.program_id,
                events = update.remove_events.len(),
                error = %e,
                "failed to withdraw push events"
            );
        }
    }

    async fn plan_events(
        &self,
        program: &ActionProgram,
        effect: &ActionEffect,
    ) -> Result<Vec<PushEvent>> {
        let remote: Vec<_> = Interpreter::planned_results(program, effect)
            .into_iter()
            .filter(|r| r.effect.is_triggerable())
            .collect();
        let wallets = &*self.interpreter.context().wallets;
        let mut events = prepare_push_events(wallets, &program.program_id, &remote).await?;
        for event in &mut events {
            event.push_message = self.options.push_message.clone();
        }
        Ok(events)
    }

    /// Bring the server's events for this program in line with what it now
    /// waits on, and decide when the foreground loop should look again.
    async fn register_triggers(
        &self,
        program: &ActionProgram,
        state: &mut ActionProgramState,
    ) -> Result<()> {
        let now = self.now_ms();
        let effect = state.current_effect();
        let planned = Interpreter::planned_results(program, &effect);

        // Conditions the server cannot watch are re-checked locally.
        let next_local = planned
            .iter()
            .filter(|r| !r.effect.is_triggerable())
            .map(|r| match r.effect {
                ActionEffect::Unixtime { timestamp } => timestamp,
                _ => now,
            })
            .min();
        let watched = planned.iter().any(|r| r.effect.is_triggerable());
        let next_execution_time = match next_local {
            Some(at) => at,
            None if watched => NEVER,
            // Nothing awaited yet (step budget ran out): keep going soon.
            None => now,
        };

        let events = match self.plan_events(program, &effect).await {
            Ok(events) => events,
            Err(e) if e.is_configuration() => {
                tracing::error!(program_id = %program.program_id, error = %e, "cannot express program as push events");
                return Err(e);
            }
            Err(e) => {
                tracing::warn!(program_id = %program.program_id, error = %e, "cannot build push events, resuming on foreground");
                state.next_execution_time = now;
                return Ok(());
            }
        };

        let wanted: Vec<String> = events.iter().map(|e| e.event_id.clone()).collect();
        let update = LoginUpdatePayload {
            events: events
                .into_iter()
                .filter(|e| !state.push_event_ids.contains(&e.event_id))
                .collect(),
            remove_events: state
                .push_event_ids
                .iter()
                .filter(|id| !wanted.contains(id))
                .cloned()
                .collect(),
        };

        if !update.is_empty() {
            if let Err(e) = self.push.update_login(&update).await {
                tracing::warn!(
                    program_id = %program.program_id,
                    error = %e,
                    "trigger registration failed, resuming on foreground"
                );
                state.next_execution_time = now;
                return Ok(());
            }
            tracing::info!(
                program_id = %program.program_id,
                created = update.events.len(),
                removed = update.remove_events.len(),
                "registered push events"
            );
        }
        state.push_event_ids = wanted;
        state.next_execution_time = next_execution_time;
        Ok(())
    }
}

#[cfg(test)]
mod tests;
