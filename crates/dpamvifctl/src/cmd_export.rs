use std::path::{Path, PathBuf};

use anyhow::Result;
use dpam_caps::Schema;
use dpam_vif::{export_settings, AppInfo};
use serde::Serialize;

use crate::common;

#[derive(Serialize)]
struct ExportOutcome<'a> {
    settings: &'a Path,
    ports: &'a [String],
}

pub async fn run(
    input: Option<PathBuf>,
    settings: Option<PathBuf>,
    store_path: &Path,
    json: bool,
) -> Result<()> {
    let mut persisted = common::open_store(store_path)?;
    let input = common::resolve_path(input, &persisted.paths.input, "input")?;
    let settings = common::resolve_path(settings, &persisted.paths.settings, "settings")?;

    let ports = common::read_ports(&input)?;
    let store = persisted.to_capability_store();
    export_settings(&store, &ports, &Schema::dpam(), &AppInfo::default(), &settings)?;

    if json {
        common::print_json(&ExportOutcome {
            settings: &settings,
            ports: &ports,
        })?;
    } else {
        println!("Exported settings for {} ports to {}", ports.len(), settings.display());
    }

    persisted.paths.input = Some(input);
    persisted.paths.settings = Some(settings);
    persisted.save(store_path)
}
