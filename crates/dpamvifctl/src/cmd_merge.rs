use std::path::PathBuf;

use anyhow::{Context, Result};
use dpam_vif::MergeRequest;
use tracing::{debug, error};

use crate::common;

pub struct MergeArgs {
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub settings: Option<PathBuf>,
    pub skip_missing_ports: bool,
}

pub async fn run(args: MergeArgs, json: bool) -> Result<()> {
    let mut request =
        MergeRequest::new().missing_ports(common::missing_port_policy(args.skip_missing_ports));
    if let Some(input) = args.input {
        request = request.input(input);
    }
    if let Some(output) = args.output {
        request = request.output(output);
    }
    if let Some(settings) = args.settings {
        request = request.settings_file(settings);
    }

    let task = request.spawn(|percent| debug!(percent, "merge progress"));
    let report = match task.wait().await {
        Ok(report) => report,
        Err(err) => {
            let kind = err.kind();
            error!(kind, "merge failed");
            return Err(err).context(format!("merge failed ({kind})"));
        }
    };
    common::print_merge_report(&report, json)
}
