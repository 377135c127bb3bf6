use super::{json_pretty, with_spinner, CmdResult, EXIT_SUCCESS};
use kupak_core::Manager;

pub fn run(manager: &Manager, namespace: &str, group: &str, json: bool) -> CmdResult {
    let deleted = with_spinner(
        json,
        &format!("deleting group {group}..."),
        &format!("deleted group {group}"),
        || manager.delete_instance(namespace, group),
    )?;
    if json {
        println!("{}", json_pretty(&deleted)?);
    } else {
        for object in &deleted.objects {
            println!("deleted ({}) {}", object.kind, object.name);
        }
    }
    Ok(EXIT_SUCCESS)
}
