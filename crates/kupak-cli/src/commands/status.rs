use super::{json_pretty, print_installed, CmdResult, EXIT_SUCCESS};
use kupak_core::Manager;

pub fn run(manager: &Manager, namespace: &str, group: &str, json: bool) -> CmdResult {
    let installed = manager.status(namespace, group)?;
    if json {
        println!("{}", json_pretty(&installed)?);
    } else {
        print_installed(&installed);
    }
    Ok(EXIT_SUCCESS)
}
