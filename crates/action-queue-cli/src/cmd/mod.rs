pub mod cancel;
pub mod config;
pub mod init;
pub mod list;
pub mod prune;
pub mod recover;
pub mod remove;
pub mod show;
pub mod sync;

use std::path::Path;
use std::sync::Arc;

use action_queue_core::config::Config;
use action_queue_core::{ActionProgramState, ActionQueue, Interpreter, ProgramStore};
use anyhow::Context;
use push_client::PushClient;

use crate::offline;

/// Load the config and open the queue it describes.
pub fn open_queue(root: &Path) -> anyhow::Result<(Config, ActionQueue)> {
    let config = Config::load(root).context("failed to load config")?;
    let store_path = config.store_path(root);
    let store = ProgramStore::open(&store_path)
        .with_context(|| format!("failed to open {}", store_path.display()))?;
    let push = PushClient::new(config.push_client_config()).context("failed to build push client")?;
    let interpreter = Interpreter::new(offline::context(config.wallets.clone()))
        .with_max_inline_delay(config.max_inline_delay());
    let queue = ActionQueue::new(
        Arc::new(store),
        interpreter,
        Arc::new(push),
        config.queue_options(),
    );
    Ok((config, queue))
}

/// Short human status of a program.
pub fn status_label(state: &ActionProgramState) -> String {
    let effect = state.current_effect();
    match effect.error() {
        Some(error) => format!("failed ({error})"),
        None if effect.is_done() => "done".to_string(),
        None => "running".to_string(),
    }
}

/// Type of the leaf a program is waiting on, `-` once done.
pub fn waiting_on(state: &ActionProgramState) -> String {
    let effect = state.current_effect();
    if effect.is_done() {
        return "-".to_string();
    }
    let leaves = action_queue_core::pending_leaf_effects(&effect);
    if leaves.is_empty() {
        return effect.type_name().to_string();
    }
    let mut names: Vec<&str> = leaves.iter().map(|e| e.type_name()).collect();
    names.dedup();
    names.join(",")
}
