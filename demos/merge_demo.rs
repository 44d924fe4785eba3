use std::env;
use std::error::Error;
use std::path::PathBuf;

use dpam_vif_generator::caps::{schema, CapabilityStore, Schema};
use dpam_vif_generator::{MergeRequest, MissingPortPolicy};
use tracing::info;

const SAMPLE_VIF: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<!-- sample product with two DisplayPort-capable ports -->
<vif:VIF xmlns:vif="http://usb.org/VendorInfoFile.xsd">
  <vif:VIF_Specification>3.25</vif:VIF_Specification>
  <vif:Component>
    <vif:Port_Label>Port 0</vif:Port_Label>
  </vif:Component>
  <vif:Component>
    <vif:Port_Label>Port 1</vif:Port_Label>
  </vif:Component>
</vif:VIF>
"#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    // Usage: merge_demo [INPUT_VIF] [OUTPUT_VIF]
    let mut args = env::args().skip(1);
    let scratch = env::temp_dir().join("dpam-merge-demo");
    std::fs::create_dir_all(&scratch)?;
    let input = match args.next() {
        Some(path) => PathBuf::from(path),
        None => {
            let path = scratch.join("sample.xml");
            std::fs::write(&path, SAMPLE_VIF)?;
            path
        }
    };
    let output = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| scratch.join("sample-dpam.xml"));

    let mut store = CapabilityStore::new();
    store.set(schema::PORT_CAPABILITY, 0, 2usize);
    store.set(schema::PORT_CAPABILITY, 1, 1usize);
    store.set("dp_v1p3_signaling", 0, true);
    store.set("dfp_d_pin_assignment_c", 0, true);
    store.set("ufp_d_pin_assignment_d", 1, true);

    let task = MergeRequest::new()
        .input(&input)
        .output(&output)
        .settings_from_store(store, Schema::dpam())
        .missing_ports(MissingPortPolicy::Skip)
        .spawn(|percent| println!("[{percent:>3}%]"));
    let report = task.wait().await?;

    info!(output = %report.output.display(), "demo finished");
    println!(
        "Merged {} ports into {}",
        report.ports.len(),
        report.output.display()
    );
    Ok(())
}
