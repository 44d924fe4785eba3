use std::path::{Path, PathBuf};

use anyhow::Result;
use dpam_caps::Schema;
use dpam_vif::{decode_settings, import_settings, load_settings_document, ImportReport};
use tracing::info;

use crate::common;

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
    let document = load_settings_document(&settings)?;
    let decoded = decode_settings(&document).map_err(|err| err.with_path(&settings))?;

    let schema = Schema::dpam();
    let mut store = persisted.to_capability_store();
    let report = import_settings(&decoded, &ports, &schema, &mut store);
    info!(
        settings = %settings.display(),
        ports = report.ports,
        fields = report.fields,
        "imported settings into store"
    );

    persisted.absorb(&store);
    persisted.paths.input = Some(input);
    persisted.paths.settings = Some(settings);
    persisted.save(store_path)?;
    print_report(&report, json)
}

fn print_report(report: &ImportReport, json: bool) -> Result<()> {
    if json {
        let skipped: Vec<serde_json::Value> = report
            .skipped
            .iter()
            .map(|skip| {
                serde_json::json!({
                    "port": skip.port,
                    "field": skip.field,
                    "reason": skip.reason,
                })
            })
            .collect();
        return common::print_json(&serde_json::json!({
            "ports": report.ports,
            "fields": report.fields,
            "skipped": skipped,
        }));
    }
    println!(
        "Imported {} fields for {} ports ({} skipped)",
        report.fields,
        report.ports,
        report.skipped.len()
    );
    for skip in &report.skipped {
        println!("  {} / {}: {}", skip.port, skip.field, skip.reason);
    }
    Ok(())
}
