use crate::cmd::open_queue;
use crate::output::print_json;
use std::path::Path;

pub async fn run(root: &Path, program_id: &str, json: bool) -> anyhow::Result<()> {
    let (_, queue) = open_queue(root)?;
    let item = queue.remove(program_id).await?;
    if json {
        return print_json(&item);
    }
    println!("removed: {}", item.program.program_id);
    Ok(())
}
