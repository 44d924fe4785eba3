use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use dpam_caps::Schema;
use dpam_vif::MergeRequest;
use tokio::sync::watch;
use tracing::info;

use crate::common;

pub struct GenerateArgs {
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub skip_missing_ports: bool,
}

/// Merge the persisted store into the input VIF, showing progress while the
/// background task runs.
pub async fn run(args: GenerateArgs, store_path: &Path, json: bool) -> Result<()> {
    let mut persisted = common::open_store(store_path)?;
    let input = common::resolve_path(args.input, &persisted.paths.input, "input")?;
    let output = common::resolve_path(args.output, &persisted.paths.output, "output")?;

    let (progress_tx, mut progress_rx) = watch::channel(0u8);
    let task = MergeRequest::new()
        .input(&input)
        .output(&output)
        .settings_from_store(persisted.to_capability_store(), Schema::dpam())
        .missing_ports(common::missing_port_policy(args.skip_missing_ports))
        .spawn(move |percent| {
            // Fails only once the receiver is gone.
            let _ = progress_tx.send(percent);
        });

    while progress_rx.changed().await.is_ok() {
        let percent = *progress_rx.borrow_and_update();
        info!(percent, stage = common::stage_label(percent), "generation progress");
        if !json {
            eprintln!("[{percent:>3}%] {}", common::stage_label(percent));
        }
    }

    let report = match task.wait().await {
        Ok(report) => report,
        Err(err) => {
            let kind = err.kind();
            return Err(err).context(format!("generation failed ({kind})"));
        }
    };

    persisted.paths.input = Some(input);
    persisted.paths.output = Some(output);
    persisted.save(store_path)?;
    common::print_merge_report(&report, json)
}
