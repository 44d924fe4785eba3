use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use dpam_caps::FieldKind;
use dpam_vif::pipeline::{
    PROGRESS_DONE, PROGRESS_INPUT_LOADED, PROGRESS_MERGED, PROGRESS_SETTINGS_DECODED,
    PROGRESS_SETTINGS_READY,
};
use dpam_vif::{list_ports, load_input_vif, MergeReport, MissingPortPolicy};
use serde::Serialize;

use crate::persist::PersistedStore;

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("serialise JSON output")?;
    println!("{text}");
    Ok(())
}

/// Explicit path, else the one remembered from the last run.
pub fn resolve_path(
    explicit: Option<PathBuf>,
    remembered: &Option<PathBuf>,
    flag: &str,
) -> Result<PathBuf> {
    explicit
        .or_else(|| remembered.clone())
        .ok_or_else(|| anyhow!("no {flag} path given and none remembered; pass --{flag}"))
}

pub fn open_store(path: &Path) -> Result<PersistedStore> {
    PersistedStore::load(path).context("open persisted store")
}

/// Port labels of a VIF in document order.
pub fn read_ports(input: &Path) -> Result<Vec<String>> {
    let document = load_input_vif(input)?;
    let ports = list_ports(&document).map_err(|err| err.with_path(input))?;
    Ok(ports)
}

pub fn missing_port_policy(skip_missing_ports: bool) -> MissingPortPolicy {
    if skip_missing_ports {
        MissingPortPolicy::Skip
    } else {
        MissingPortPolicy::Fail
    }
}

/// Human-readable name of the stage that a progress value completes.
pub fn stage_label(percent: u8) -> &'static str {
    match percent {
        PROGRESS_DONE => "output written",
        PROGRESS_MERGED.. => "settings merged",
        PROGRESS_SETTINGS_DECODED.. => "settings decoded",
        PROGRESS_SETTINGS_READY.. => "settings ready",
        PROGRESS_INPUT_LOADED.. => "input VIF loaded",
        _ => "started",
    }
}

pub fn kind_name(kind: &FieldKind) -> &'static str {
    match kind {
        FieldKind::Select { .. } => "select",
        FieldKind::Boolean => "boolean",
        FieldKind::BitGroup { .. } => "bit-group",
    }
}

/// Accepts the spellings people type for checkboxes.
pub fn parse_bool(text: &str) -> Result<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" | "checked" => Ok(true),
        "false" | "0" | "no" | "off" | "unchecked" => Ok(false),
        other => bail!("'{other}' is not a boolean (true/false)"),
    }
}

#[derive(Serialize)]
struct MergeOutcome<'a> {
    output: &'a Path,
    ports: &'a [String],
    merged: usize,
    appended: usize,
    skipped: &'a [String],
}

pub fn print_merge_report(report: &MergeReport, json: bool) -> Result<()> {
    if json {
        return print_json(&MergeOutcome {
            output: &report.output,
            ports: &report.ports,
            merged: report.summary.merged,
            appended: report.summary.appended,
            skipped: &report.summary.skipped,
        });
    }
    println!(
        "Wrote {} ({} ports: {} appended, {} merged into existing content)",
        report.output.display(),
        report.ports.len(),
        report.summary.appended,
        report.summary.merged,
    );
    for port in &report.summary.skipped {
        println!("  skipped port without settings: {port}");
    }
    Ok(())
}
