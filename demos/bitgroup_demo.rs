use std::error::Error;

use dpam_vif_generator::caps::bitgroup;
use dpam_vif_generator::caps::{CapabilityStore, FieldKind, Schema};
use dpam_vif_generator::encode_settings;

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();
    let schema = Schema::dpam();

    println!("-- bit groups of the DPAM schema --");
    for field in schema.fields() {
        if let FieldKind::BitGroup { members } = field.kind() {
            println!("{} ({} members)", field.stable_name(), members.len());
            for (bit, member) in members.iter().enumerate() {
                println!("  bit {bit}: {member}");
            }
        }
    }

    let states = [true, false, true, false, true, false];
    let packed = bitgroup::pack(&states)?;
    println!("pin assignments A, C, E -> value {packed} (0b{packed:06b})");
    let restored = bitgroup::unpack(packed, states.len())?;
    assert_eq!(restored, states);

    let mut store = CapabilityStore::new();
    for member in ["dfp_d_pin_assignment_a", "dfp_d_pin_assignment_c", "dfp_d_pin_assignment_e"] {
        store.set(member, 0, true);
    }
    let document = encode_settings(&store, &["Port 0".to_string()], &schema);
    let xml = dpam_vif_generator::xml::write_document(&document)?;
    for line in xml.lines().filter(|line| line.contains("pin_assignments")) {
        println!("{}", line.trim());
    }
    Ok(())
}
