use crate::cmd::open_queue;
use crate::output::print_json;
use anyhow::Context;
use push_client::PushEventState;
use std::path::Path;

/// Re-send the device registration with every unfinished program's events.
pub async fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let (config, queue) = open_queue(root)?;
    let identity = config
        .device_identity()
        .context("invalid device config")?
        .context("device.device_token is not configured")?;

    let response = queue.register_device(&identity).await?;
    if json {
        return print_json(&response);
    }
    let triggered = response.events.iter().filter(|e| e.state == PushEventState::Triggered).count();
    println!(
        "Registered device: {} event(s) known to the server, {triggered} already triggered.",
        response.events.len()
    );
    Ok(())
}
