use super::{json_pretty, with_spinner, CmdResult, EXIT_SUCCESS};
use kupak_core::Manager;

pub fn run(manager: &Manager, json: bool) -> CmdResult {
    let index = with_spinner(json, "fetching repository index...", "index fetched", || {
        manager.index()
    })?;
    if json {
        println!("{}", json_pretty(&index)?);
        return Ok(EXIT_SUCCESS);
    }
    if index.paks.is_empty() {
        println!("no paks in repository");
        return Ok(EXIT_SUCCESS);
    }
    for entry in &index.paks {
        println!("- Name:    {}", entry.name);
        println!("  Version: {}", entry.version);
        println!("  URL:     {}", entry.url);
        if !entry.tags.is_empty() {
            println!("  Tags:    {}", entry.tags.join(", "));
        }
        if !entry.description.is_empty() {
            println!("  {}", entry.description.trim());
        }
    }
    Ok(EXIT_SUCCESS)
}
