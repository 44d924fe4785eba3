use std::path::Path;

use anyhow::{anyhow, Result};
use dpam_caps::bitgroup;
use dpam_caps::{CapabilityStore, FieldKind, Schema, SchemaEntry};
use serde::Serialize;

use crate::common;

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct FieldReading {
    pub field: String,
    pub port: usize,
    /// Value as written to the settings `value` attribute.
    pub value: String,
    /// Option label or checked member names, if any.
    pub text: String,
}

/// Read one field or bit-group member, applying defaults like the encoder.
pub fn read_entry(store: &CapabilityStore, entry: SchemaEntry<'_>, port: usize) -> FieldReading {
    let checked = |name: &str| {
        store
            .get(name, port)
            .and_then(|value| value.as_checked().ok())
            .unwrap_or(false)
    };
    let (field, value, text) = match entry {
        SchemaEntry::Field(field) => {
            let name = field.stable_name();
            match field.kind() {
                FieldKind::Select { options } => {
                    let index = store
                        .get(name, port)
                        .and_then(|value| value.as_index().ok())
                        .unwrap_or(0);
                    let label = options.get(index).cloned().unwrap_or_default();
                    (name.to_string(), index.to_string(), label)
                }
                FieldKind::Boolean => (name.to_string(), checked(name).to_string(), String::new()),
                FieldKind::BitGroup { members } => {
                    let states: Vec<bool> =
                        members.iter().map(|member| checked(member.as_str())).collect();
                    let packed = bitgroup::pack(&states).unwrap_or(0);
                    let names =
                        bitgroup::checked_names(members.iter().map(String::as_str), &states);
                    (name.to_string(), packed.to_string(), names)
                }
            }
        }
        SchemaEntry::Member { group, bit } => {
            let name = match group.kind() {
                FieldKind::BitGroup { members } => members.get(bit).cloned().unwrap_or_default(),
                _ => String::new(),
            };
            let value = checked(name.as_str()).to_string();
            (name, value, group.stable_name().to_string())
        }
    };
    FieldReading {
        field,
        port,
        value,
        text,
    }
}

pub async fn run(field: String, port: usize, store_path: &Path, json: bool) -> Result<()> {
    let schema = Schema::dpam();
    let entry = schema
        .entry(&field)
        .ok_or_else(|| anyhow!("unknown capability field '{field}' (see `dpamvifctl schema`)"))?;
    let store = common::open_store(store_path)?.to_capability_store();
    let reading = read_entry(&store, entry, port);

    if json {
        common::print_json(&reading)?;
    } else if reading.text.is_empty() {
        println!("{}", reading.value);
    } else {
        println!("{} ({})", reading.value, reading.text);
    }
    Ok(())
}
