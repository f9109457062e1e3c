use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::action::ActionOp;
use crate::effect::ActionEffect;

/// `lastExecutionTime` / `nextExecutionTime` value meaning "never".
pub const NEVER: i64 = -1;

/// Notification shown once a program finishes successfully.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteMessage {
    pub title: String,
    pub message: String,
}

/// A named, immutable action tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionProgram {
    pub program_id: String,
    pub action_op: ActionOp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complete_message: Option<CompleteMessage>,
}

impl ActionProgram {
    /// A program with a fresh random id.
    pub fn new(action_op: ActionOp) -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string(), action_op)
    }

    pub fn with_id(program_id: impl Into<String>, action_op: ActionOp) -> Self {
        Self {
            program_id: program_id.into(),
            action_op,
            complete_message: None,
        }
    }
}

/// Mutable progress of one program. The only thing the interpreter writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionProgramState {
    pub program_id: String,
    /// `None` until the first step runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<ActionEffect>,
    /// Push events currently registered on behalf of this program.
    #[serde(default)]
    pub push_event_ids: Vec<String>,
    #[serde(default = "never")]
    pub last_execution_time: i64,
    /// When the foreground loop should run this program again.
    #[serde(default = "never")]
    pub next_execution_time: i64,
}

fn never() -> i64 {
    NEVER
}

impl ActionProgramState {
    pub fn new(program_id: impl Into<String>) -> Self {
        Self {
            program_id: program_id.into(),
            effect: None,
            push_event_ids: Vec::new(),
            last_execution_time: NEVER,
            next_execution_time: NEVER,
        }
    }

    /// The effect to advance from. An absent effect is `init`.
    pub fn current_effect(&self) -> ActionEffect {
        self.effect.clone().unwrap_or(ActionEffect::Init)
    }

    pub fn is_done(&self) -> bool {
        self.effect.as_ref().is_some_and(ActionEffect::is_done)
    }

    /// `true` once the foreground loop is due to run this program.
    pub fn is_due(&self, now_ms: i64) -> bool {
        !self.is_done() && self.next_execution_time != NEVER && self.next_execution_time <= now_ms
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionQueueItem {
    pub program: ActionProgram,
    pub state: ActionProgramState,
}

impl ActionQueueItem {
    pub fn new(program: ActionProgram) -> Self {
        let state = ActionProgramState::new(program.program_id.clone());
        Self { program, state }
    }
}

/// All programs of one account, keyed by `programId`.
pub type ActionQueueMap = HashMap<String, ActionQueueItem>;

/// The output of one step: the effect to wait on and, when planning push
/// events, the step the push server should perform once that effect is met.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub effect: ActionEffect,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<ActionOp>,
    /// Position of `effect` inside the program's effect tree. Empty for the
    /// root.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub call_stack_id: String,
}

impl ExecutionResult {
    pub fn new(effect: ActionEffect) -> Self {
        Self {
            effect,
            action: None,
            call_stack_id: String::new(),
        }
    }
}
