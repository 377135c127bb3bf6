use super::{json_pretty, with_spinner, CmdResult, EXIT_SUCCESS};
use kupak_core::{Manager, Pak};
use kupak_schema::{PakDescriptor, PakId};
use serde::Serialize;

#[derive(Serialize)]
struct SpecView<'a> {
    source_url: &'a str,
    pak_id: PakId,
    #[serde(flatten)]
    descriptor: &'a PakDescriptor,
}

pub fn run(manager: &Manager, reference: &str, json: bool) -> CmdResult {
    let pak = with_spinner(json, &format!("loading {reference}..."), "pak loaded", || {
        manager.load(reference)
    })?;
    if json {
        let view = SpecView {
            source_url: &pak.source_url,
            pak_id: pak.identity().pak_id,
            descriptor: &pak.descriptor,
        };
        println!("{}", json_pretty(&view)?);
    } else {
        print_spec(&pak);
    }
    Ok(EXIT_SUCCESS)
}

fn print_spec(pak: &Pak) {
    let d = &pak.descriptor;
    println!("name:        {}", d.name);
    println!("version:     {}", d.version);
    println!("source:      {}", pak.source_url);
    println!("id:          {}", pak.identity().short_id);
    if !d.tags.is_empty() {
        println!("tags:        {}", d.tags.join(", "));
    }
    if !d.description.is_empty() {
        println!();
        println!("{}", d.description.trim());
    }

    println!();
    if d.properties.is_empty() {
        println!("no properties");
    } else {
        println!("{:<20} {:<8} {:<16} DESCRIPTION", "PROPERTY", "TYPE", "DEFAULT");
        for p in &d.properties {
            let default = if p.default.is_absent() {
                "-".to_owned()
            } else {
                p.default.as_text().into_owned()
            };
            println!(
                "{:<20} {:<8} {:<16} {}",
                p.name,
                p.kind,
                default,
                p.description.trim()
            );
        }
    }

    println!();
    println!("resources:");
    for resource in pak.resources() {
        println!("  {}", resource.address);
    }
}
