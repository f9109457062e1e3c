//! Tree interpreter.
//!
//! ```text
//! ActionProgram ──┐
//!                 ├─▶ Interpreter::advance ──▶ next ActionEffect
//! ActionEffect  ──┘        │
//!                          ├─ seq: advance child at opIndex, step on success
//!                          ├─ par: advance every unfinished child concurrently
//!                          └─ leaf: init → execute, pending → check
//! ```
//!
//! `advance` is a pure function of (program, effect, collaborator state):
//! resuming from a persisted effect re-checks conditions and never re-runs a
//! step whose effect is already recorded.

pub mod amount;
pub mod context;
pub mod leaf;

use std::time::Duration;

use futures::future::{join_all, BoxFuture, FutureExt};

use crate::action::{ActionOp, NodeActionOp};
use crate::effect::{ActionEffect, EffectError, EffectErrorKind};
use crate::flatten::join_path;
use crate::program::{ActionProgram, ActionProgramState, ExecutionResult};

use context::ExecutionContext;
use leaf::EffectCheck;

pub const DEFAULT_MAX_INLINE_DELAY: Duration = Duration::from_secs(5);

pub struct Interpreter {
    ctx: ExecutionContext,
    max_inline_delay: Duration,
}

impl Interpreter {
    pub fn new(ctx: ExecutionContext) -> Self {
        Self {
            ctx,
            max_inline_delay: DEFAULT_MAX_INLINE_DELAY,
        }
    }

    /// Cap on how long a `delay` step sleeps inside one advance.
    pub fn with_max_inline_delay(mut self, max_inline_delay: Duration) -> Self {
        self.max_inline_delay = max_inline_delay;
        self
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.ctx
    }

    /// Run one step of `program` from `state` and return the next effect.
    /// A `done` effect is returned unchanged without touching collaborators.
    pub async fn advance(
        &self,
        program: &ActionProgram,
        state: &ActionProgramState,
    ) -> ExecutionResult {
        let effect = state.current_effect();
        if effect.is_done() {
            return ExecutionResult::new(effect);
        }
        let next = self
            .advance_op(&program.action_op, effect, String::new())
            .await;
        ExecutionResult::new(next)
    }

    /// Advance until the effect stops changing, reaches `done`, or
    /// `max_steps` advances have run.
    pub async fn drive(
        &self,
        program: &ActionProgram,
        mut state: ActionProgramState,
        max_steps: usize,
    ) -> ActionProgramState {
        for step in 0..max_steps {
            let current = state.current_effect();
            if current.is_done() {
                break;
            }
            let next = self.advance(program, &state).await.effect;
            let changed = next != current;
            tracing::debug!(
                program_id = %program.program_id,
                step,
                effect = next.type_name(),
                changed,
                "advanced program"
            );
            state.effect = Some(next);
            if !changed {
                break;
            }
        }
        state
    }

    fn advance_op<'a>(
        &'a self,
        op: &'a ActionOp,
        effect: ActionEffect,
        path: String,
    ) -> BoxFuture<'a, ActionEffect> {
        async move {
            if effect.is_done() {
                return effect;
            }
            match op {
                ActionOp::Seq(node) => self.advance_seq(node, effect, path).await,
                ActionOp::Par(node) => self.advance_par(node, effect, path).await,
                leaf => self.advance_leaf(leaf, effect, path).await,
            }
        }
        .boxed()
    }

    async fn advance_seq(&self, node: &NodeActionOp, effect: ActionEffect, path: String) -> ActionEffect {
        let (op_index, child_effect) = match effect {
            ActionEffect::Init => (0, ActionEffect::Init),
            ActionEffect::Seq {
                op_index,
                child_effect,
            } => (op_index, *child_effect),
            other => return mismatch(&path, "seq", &other),
        };
        if node.actions.is_empty() {
            return ActionEffect::done();
        }
        let Some(child) = node.actions.get(op_index) else {
            return invalid_state(
                &path,
                format!("opIndex {op_index} out of range for {} actions", node.actions.len()),
            );
        };

        let child_path = join_path(&path, &format!("seq_{op_index}"));
        match self.advance_op(child, child_effect, child_path).await {
            // Keep a failed par's sibling snapshot.
            failed @ ActionEffect::Done { error: Some(_), .. } => failed,
            ActionEffect::Done { error: None, .. } if op_index + 1 >= node.actions.len() => {
                ActionEffect::done()
            }
            ActionEffect::Done { error: None, .. } => ActionEffect::Seq {
                op_index: op_index + 1,
                child_effect: Box::new(ActionEffect::Init),
            },
            pending => ActionEffect::Seq {
                op_index,
                child_effect: Box::new(pending),
            },
        }
    }

    async fn advance_par(&self, node: &NodeActionOp, effect: ActionEffect, path: String) -> ActionEffect {
        let n = node.actions.len();
        let child_effects = match effect {
            ActionEffect::Init => vec![ActionEffect::Init; n],
            ActionEffect::Par { child_effects } if child_effects.len() == n => child_effects,
            ActionEffect::Par { child_effects } => {
                return invalid_state(
                    &path,
                    format!("par has {} child effects for {n} actions", child_effects.len()),
                )
            }
            other => return mismatch(&path, "par", &other),
        };
        if n == 0 {
            return ActionEffect::done();
        }

        let next: Vec<ActionEffect> = join_all(
            node.actions
                .iter()
                .zip(child_effects)
                .enumerate()
                .map(|(i, (child, effect))| {
                    self.advance_op(child, effect, join_path(&path, &format!("par_{i}")))
                }),
        )
        .await;

        // First failure by position wins; siblings are abandoned as they stand.
        if let Some(error) = next.iter().find_map(|e| e.error().cloned()) {
            tracing::warn!(path = %path, error = %error, "par branch failed, abandoning siblings");
            return ActionEffect::Done {
                error: Some(error),
                child_effects: Some(next),
            };
        }
        if next.iter().all(ActionEffect::is_done) {
            return ActionEffect::done();
        }
        ActionEffect::Par {
            child_effects: next,
        }
    }

    async fn advance_leaf(&self, op: &ActionOp, effect: ActionEffect, path: String) -> ActionEffect {
        match effect {
            ActionEffect::Init => {
                match leaf::execute(&self.ctx, op, self.max_inline_delay).await {
                    Ok(next) => {
                        tracing::info!(path = %path, action = op.type_name(), awaiting = next.type_name(), "executed step");
                        next
                    }
                    Err(e) => {
                        tracing::warn!(path = %path, action = op.type_name(), error = %e, "step failed");
                        ActionEffect::failed(EffectError::from(&e))
                    }
                }
            }
            pending if pending.is_leaf() => match leaf::check(&self.ctx, &pending).await {
                Ok(EffectCheck::Satisfied) => ActionEffect::done(),
                Ok(EffectCheck::Pending) => pending,
                Ok(EffectCheck::Failed(message)) => {
                    tracing::warn!(path = %path, %message, "awaited condition failed");
                    ActionEffect::failed(EffectError::new(EffectErrorKind::Execution, message))
                }
                Err(e) if e.is_transient() => {
                    tracing::warn!(path = %path, error = %e, "check unavailable, staying pending");
                    pending
                }
                Err(e) => ActionEffect::failed(EffectError::from(&e)),
            },
            other => mismatch(&path, op.type_name(), &other),
        }
    }

    /// Results to register with the push server for the effect a program is
    /// waiting on: one per outstanding leaf, each paired with the next step
    /// when the server can perform it (a pre-signed broadcast).
    ///
    /// Pure: reads only the program and effect.
    pub fn planned_results(program: &ActionProgram, effect: &ActionEffect) -> Vec<ExecutionResult> {
        let mut out = Vec::new();
        plan(&program.action_op, effect, String::new(), None, &mut out);
        out
    }
}

fn plan<'a>(
    op: &'a ActionOp,
    effect: &ActionEffect,
    path: String,
    next: Option<&'a ActionOp>,
    out: &mut Vec<ExecutionResult>,
) {
    match (op, effect) {
        (
            ActionOp::Seq(node),
            ActionEffect::Seq {
                op_index,
                child_effect,
            },
        ) => {
            let Some(child) = node.actions.get(*op_index) else {
                return;
            };
            let following = match node.actions.get(op_index + 1) {
                Some(sibling) => sibling.first_leaf(),
                None => next,
            };
            let child_path = join_path(&path, &format!("seq_{op_index}"));
            plan(child, child_effect, child_path, following, out);
        }
        (ActionOp::Par(node), ActionEffect::Par { child_effects }) => {
            // The step after a par waits for every branch, so no single
            // branch may carry it.
            for (i, (child, effect)) in node.actions.iter().zip(child_effects).enumerate() {
                plan(child, effect, join_path(&path, &format!("par_{i}")), None, out);
            }
        }
        (_, leaf) if leaf.is_leaf() => out.push(ExecutionResult {
            effect: leaf.clone(),
            action: next.filter(|a| a.has_push_payload()).cloned(),
            call_stack_id: path,
        }),
        _ => {}
    }
}

fn invalid_state(path: &str, message: String) -> ActionEffect {
    tracing::error!(path, %message, "effect does not fit program");
    ActionEffect::failed(EffectError::new(EffectErrorKind::InvalidState, message))
}

fn mismatch(path: &str, op_type: &str, effect: &ActionEffect) -> ActionEffect {
    invalid_state(
        path,
        format!("'{}' effect cannot drive '{op_type}' action", effect.type_name()),
    )
}
