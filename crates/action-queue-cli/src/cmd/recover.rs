use crate::cmd::open_queue;
use crate::output::print_json;
use std::path::Path;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let (_, queue) = open_queue(root)?;
    let recovered = queue.recover()?;
    if json {
        return print_json(&serde_json::json!({ "recovered": recovered }));
    }
    println!("Recovered {recovered} stale claim(s).");
    Ok(())
}
