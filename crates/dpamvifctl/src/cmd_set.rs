use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use dpam_caps::bitgroup;
use dpam_caps::{CapabilityStore, FieldKind, Schema, SchemaEntry};
use tracing::info;

use crate::cmd_get::read_entry;
use crate::common;

/// Parse `value` for `entry` and write it into the store.
///
/// Selects accept an option index or an option label; bit groups accept the
/// packed value and update every member.
pub fn apply(
    store: &mut CapabilityStore,
    entry: SchemaEntry<'_>,
    port: usize,
    value: &str,
) -> Result<()> {
    match entry {
        SchemaEntry::Field(field) => match field.kind() {
            FieldKind::Select { options } => {
                let value = value.trim();
                let index = match value.parse::<usize>() {
                    Ok(index) => index,
                    Err(_) => options
                        .iter()
                        .position(|option| option.eq_ignore_ascii_case(value))
                        .ok_or_else(|| {
                            anyhow!("'{value}' is not an option of {}", field.stable_name())
                        })?,
                };
                if index >= options.len() {
                    bail!(
                        "option index {index} out of range for {} ({} options)",
                        field.stable_name(),
                        options.len()
                    );
                }
                store.set(field.stable_name(), port, index);
            }
            FieldKind::Boolean => {
                store.set(field.stable_name(), port, common::parse_bool(value)?);
            }
            FieldKind::BitGroup { members } => {
                let packed: u64 = value
                    .trim()
                    .parse()
                    .with_context(|| format!("'{value}' is not a bit-group value"))?;
                let states = bitgroup::unpack(packed, members.len())?;
                for (member, checked) in members.iter().zip(states) {
                    store.set(member, port, checked);
                }
            }
        },
        SchemaEntry::Member { group, bit } => {
            let FieldKind::BitGroup { members } = group.kind() else {
                bail!("{} is not a bit group", group.stable_name());
            };
            let member = members
                .get(bit)
                .ok_or_else(|| anyhow!("bit {bit} out of range for {}", group.stable_name()))?;
            store.set(member, port, common::parse_bool(value)?);
        }
    }
    Ok(())
}

pub async fn run(
    field: String,
    port: usize,
    value: String,
    store_path: &Path,
    json: bool,
) -> Result<()> {
    let schema = Schema::dpam();
    let entry = schema
        .entry(&field)
        .ok_or_else(|| anyhow!("unknown capability field '{field}' (see `dpamvifctl schema`)"))?;
    let mut persisted = common::open_store(store_path)?;
    let mut store = persisted.to_capability_store();
    apply(&mut store, entry, port, &value)?;
    persisted.absorb(&store);
    persisted.save(store_path)?;

    let reading = read_entry(&store, entry, port);
    info!(field = %reading.field, port, value = %reading.value, "stored capability value");
    if json {
        common::print_json(&reading)?;
    } else {
        println!("{} [{}] = {}", reading.field, port, reading.value);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dpam_caps::StoreValue;

    #[test]
    fn select_accepts_index_or_label() {
        let schema = Schema::dpam();
        let entry = schema.entry("port_capability").expect("entry");
        let mut store = CapabilityStore::new();
        apply(&mut store, entry, 0, "dfp_d-capable").expect("label");
        assert_eq!(store.get("port_capability", 0), Some(&StoreValue::Int(2)));
        apply(&mut store, entry, 1, "3").expect("index");
        assert_eq!(store.get("port_capability", 1), Some(&StoreValue::Int(3)));
        assert!(apply(&mut store, entry, 0, "9").is_err());
        assert!(apply(&mut store, entry, 0, "Sometimes").is_err());
    }

    #[test]
    fn packed_value_sets_every_member() {
        let schema = Schema::dpam();
        let entry = schema.entry("signaling_support").expect("entry");
        let mut store = CapabilityStore::new();
        apply(&mut store, entry, 0, "5").expect("packed");
        assert_eq!(store.get("dp_v1p3_signaling", 0), Some(&StoreValue::Bool(true)));
        assert_eq!(store.get("usb_gen2_signaling", 0), Some(&StoreValue::Bool(false)));
        assert_eq!(store.get("uhbr10_uhbr20_signaling", 0), Some(&StoreValue::Bool(true)));
        assert!(apply(&mut store, entry, 0, "8").is_err());
    }

    #[test]
    fn member_takes_a_boolean() {
        let schema = Schema::dpam();
        let entry = schema.entry("usb_gen2_signaling_checkbox").expect("entry");
        let mut store = CapabilityStore::new();
        apply(&mut store, entry, 2, "yes").expect("member");
        assert_eq!(store.get("usb_gen2_signaling", 2), Some(&StoreValue::Bool(true)));
    }
}
