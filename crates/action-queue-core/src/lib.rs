//! `action-queue-core`: durable multi-step financial programs.
//!
//! A program is a tree of steps (swap, deposit, borrow, broadcast…) composed
//! with `seq` and `par`. Each step, once started, leaves an *effect*: the
//! on-chain or market condition that marks it complete. Progress is persisted
//! after every step so a program survives restarts, and outstanding effects
//! are registered with the push server so a fired condition wakes the device
//! (or, for pre-signed transactions, lets the server continue on its own).
//!
//! # Architecture
//!
//! ```text
//! ActionQueue::schedule / on_trigger_fired / resume_due
//!     │
//!     ├─▶ ProgramStore (redb)      programs, claims, retired ids
//!     │
//!     ├─▶ Interpreter              advance(program, effect) → effect
//!     │       └─ ExecutionContext  wallets, borrow, swap, exchange, rates
//!     │
//!     └─▶ push::prepare_push_events ─▶ PushApi (push-client)
//! ```

pub mod action;
pub mod config;
pub mod effect;
pub mod error;
pub mod flatten;
pub mod io;
pub mod paths;
pub mod program;
pub mod push;
pub mod queue;
pub mod runtime;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use action::{ActionOp, ActionStatus};
pub use effect::{ActionEffect, EffectError, EffectErrorKind};
pub use error::{CollaboratorError, QueueError, Result};
pub use flatten::pending_leaf_effects;
pub use program::{ActionProgram, ActionProgramState, ActionQueueItem, ActionQueueMap, ExecutionResult};
pub use queue::{ActionQueue, DeviceIdentity, QueueOptions};
pub use runtime::context::ExecutionContext;
pub use runtime::Interpreter;
pub use store::ProgramStore;
