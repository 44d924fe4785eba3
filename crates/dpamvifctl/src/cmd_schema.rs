use anyhow::Result;
use dpam_caps::{FieldKind, Schema};
use serde::Serialize;

use crate::common;

#[derive(Serialize)]
struct FieldEntry<'a> {
    tab: &'a str,
    field: &'a str,
    declared: &'a str,
    kind: &'static str,
    #[serde(skip_serializing_if = "is_empty")]
    options: &'a [String],
    #[serde(skip_serializing_if = "is_empty")]
    members: &'a [String],
}

const NONE: &[String] = &[];

fn is_empty(values: &&[String]) -> bool {
    values.is_empty()
}

pub fn run(json: bool) -> Result<()> {
    let schema = Schema::dpam();
    let entries: Vec<FieldEntry> = schema
        .tabs()
        .iter()
        .flat_map(|tab| {
            tab.fields().iter().map(move |field| {
                let (options, members) = match field.kind() {
                    FieldKind::Select { options } => (options.as_slice(), NONE),
                    FieldKind::Boolean => (NONE, NONE),
                    FieldKind::BitGroup { members } => (NONE, members.as_slice()),
                };
                FieldEntry {
                    tab: tab.stable_name(),
                    field: field.stable_name(),
                    declared: field.declared_name(),
                    kind: common::kind_name(field.kind()),
                    options,
                    members,
                }
            })
        })
        .collect();

    if json {
        return common::print_json(&entries);
    }

    println!("{:<32} {:<28} {:<10} {}", "TAB", "FIELD", "KIND", "VALUES");
    for entry in &entries {
        let values = if entry.options.is_empty() {
            entry.members.join(", ")
        } else {
            entry
                .options
                .iter()
                .enumerate()
                .map(|(index, option)| format!("{index}={option}"))
                .collect::<Vec<_>>()
                .join(", ")
        };
        println!(
            "{:<32} {:<28} {:<10} {}",
            entry.tab, entry.field, entry.kind, values
        );
    }
    Ok(())
}
