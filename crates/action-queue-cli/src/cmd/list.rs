use crate::cmd::{open_queue, status_label, waiting_on};
use crate::output::{format_time, print_json, print_table};
use action_queue_core::ActionQueueItem;
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProgramSummary<'a> {
    program_id: &'a str,
    action: &'static str,
    status: String,
    waiting_on: String,
    push_event_count: usize,
    next_execution_time: i64,
}

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let (_, queue) = open_queue(root)?;
    let mut items: Vec<ActionQueueItem> = queue.store().list()?.into_values().collect();
    items.sort_by(|a, b| a.program.program_id.cmp(&b.program.program_id));

    let summaries: Vec<ProgramSummary> = items
        .iter()
        .map(|item| ProgramSummary {
            program_id: &item.program.program_id,
            action: item.program.action_op.type_name(),
            status: status_label(&item.state),
            waiting_on: waiting_on(&item.state),
            push_event_count: item.state.push_event_ids.len(),
            next_execution_time: item.state.next_execution_time,
        })
        .collect();

    if json {
        return print_json(&summaries);
    }
    if summaries.is_empty() {
        println!("No programs.");
        return Ok(());
    }
    let rows = summaries
        .iter()
        .map(|s| {
            vec![
                s.program_id.to_string(),
                s.action.to_string(),
                s.status.clone(),
                s.waiting_on.clone(),
                s.push_event_count.to_string(),
                format_time(s.next_execution_time),
            ]
        })
        .collect();
    print_table(&["PROGRAM", "ACTION", "STATUS", "WAITING ON", "EVENTS", "NEXT RUN"], rows);
    Ok(())
}
