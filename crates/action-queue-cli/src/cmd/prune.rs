use crate::cmd::open_queue;
use crate::output::print_json;
use std::path::Path;

pub async fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let (_, queue) = open_queue(root)?;
    let removed = queue.prune().await?;
    if json {
        return print_json(&serde_json::json!({ "removed": removed }));
    }
    if removed.is_empty() {
        println!("Nothing to prune.");
    }
    for id in &removed {
        println!("removed: {id}");
    }
    Ok(())
}
