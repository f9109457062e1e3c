use crate::cmd::{open_queue, status_label};
use crate::output::print_json;
use std::path::Path;

pub async fn run(root: &Path, program_id: &str, json: bool) -> anyhow::Result<()> {
    let (_, queue) = open_queue(root)?;
    let state = queue.cancel(program_id).await?;
    if json {
        return print_json(&state);
    }
    println!("{program_id}: {}", status_label(&state));
    Ok(())
}
