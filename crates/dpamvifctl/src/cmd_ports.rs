use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::Serialize;
use tracing::info;

use crate::common;

#[derive(Serialize)]
struct PortEntry<'a> {
    index: usize,
    label: &'a str,
}

pub async fn run(input: Option<PathBuf>, store_path: &Path, json: bool) -> Result<()> {
    let mut persisted = common::open_store(store_path)?;
    let input = common::resolve_path(input, &persisted.paths.input, "input")?;
    let ports = common::read_ports(&input)?;
    info!(input = %input.display(), count = ports.len(), "enumerated ports");
    persisted.paths.input = Some(input);
    persisted.save(store_path)?;

    if json {
        let entries: Vec<PortEntry> = ports
            .iter()
            .enumerate()
            .map(|(index, label)| PortEntry { index, label })
            .collect();
        return common::print_json(&entries);
    }

    if ports.is_empty() {
        println!("No ports found.");
        return Ok(());
    }
    println!("{:<6} {}", "INDEX", "Port_Label");
    for (index, label) in ports.iter().enumerate() {
        println!("{index:<6} {label}");
    }
    Ok(())
}
