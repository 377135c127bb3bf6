use super::{json_pretty, print_installed, CmdResult, EXIT_SUCCESS};
use kupak_core::Manager;

pub fn run(manager: &Manager, namespace: &str, pak: Option<&str>, json: bool) -> CmdResult {
    let installed = match pak {
        Some(reference) => {
            let pak = manager.load(reference)?;
            manager.instances(namespace, &pak)
        }
        None => manager.installed(namespace),
    }?;

    if json {
        println!("{}", json_pretty(&installed)?);
    } else if installed.is_empty() {
        println!("no paks installed in namespace '{namespace}'");
    } else {
        for (i, group) in installed.iter().enumerate() {
            if i > 0 {
                println!();
            }
            print_installed(group);
        }
    }
    Ok(EXIT_SUCCESS)
}
