use crate::cmd::{open_queue, status_label, waiting_on};
use crate::output::{format_time, print_json};
use action_queue_core::QueueError;
use std::path::Path;

pub fn run(root: &Path, program_id: &str, json: bool) -> anyhow::Result<()> {
    let (_, queue) = open_queue(root)?;
    let item = queue
        .store()
        .get(program_id)?
        .ok_or_else(|| QueueError::ProgramNotFound(program_id.to_string()))?;

    if json {
        return print_json(&item);
    }

    let state = &item.state;
    println!("Program:    {}", item.program.program_id);
    println!("Status:     {}", status_label(state));
    println!("Waiting on: {}", waiting_on(state));
    println!("Last run:   {}", format_time(state.last_execution_time));
    println!("Next run:   {}", format_time(state.next_execution_time));
    if let Some(claim) = queue.store().claim(program_id)? {
        println!("Claimed by: {} since {}", claim.owner, claim.claimed_at.to_rfc3339());
    }
    if !state.push_event_ids.is_empty() {
        println!("Push events:");
        for id in &state.push_event_ids {
            println!("  {id}");
        }
    }
    println!();
    println!("Actions:");
    println!("{}", serde_json::to_string_pretty(&item.program.action_op)?);
    println!("Effect:");
    println!("{}", serde_json::to_string_pretty(&state.current_effect())?);
    Ok(())
}
