//! End-to-end generation: load the VIF, obtain settings, merge, save.
//!
//! [`MergeRequest::run`] executes the pipeline on the calling thread;
//! [`MergeRequest::spawn`] moves it to the blocking pool and returns a
//! [`MergeTask`] handle. Progress is reported as a percentage through a
//! caller-supplied callback at fixed stage boundaries.

use std::io::Write as _;
use std::path::{Path, PathBuf};

use dpam_caps::{CapabilityStore, Schema};
use tempfile::NamedTempFile;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use vif_xml::{Document, XmlError};

use crate::merge::{list_ports, merge_settings, MergeSummary, MissingPortPolicy};
use crate::settings::{decode_settings, encode_settings_with, AppInfo};
use crate::VifError;

/// Arguments validated, nothing read yet.
pub const PROGRESS_STARTED: u8 = 0;
/// Input VIF parsed and its ports enumerated.
pub const PROGRESS_INPUT_LOADED: u8 = 10;
/// Settings document available on disk.
pub const PROGRESS_SETTINGS_READY: u8 = 30;
/// Settings document parsed and indexed by port.
pub const PROGRESS_SETTINGS_DECODED: u8 = 50;
/// Settings merged into the in-memory VIF.
pub const PROGRESS_MERGED: u8 = 80;
/// Output written.
pub const PROGRESS_DONE: u8 = 100;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOptions {
    pub missing_ports: MissingPortPolicy,
    /// Producer block used when settings are generated from a store.
    pub app: AppInfo,
}

/// Where the settings document comes from.
#[derive(Debug, Clone)]
pub enum SettingsSource {
    /// An existing settings file.
    File(PathBuf),
    /// Generated from the store for the ports of the input VIF. The document
    /// is written to a scratch file that is removed once the run ends.
    Store {
        store: CapabilityStore,
        schema: Schema,
    },
}

/// Builder for one generation run.
#[derive(Debug, Clone, Default)]
pub struct MergeRequest {
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    settings: Option<SettingsSource>,
    scratch_dir: Option<PathBuf>,
    options: MergeOptions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeReport {
    pub output: PathBuf,
    /// Port labels of the input VIF in document order.
    pub ports: Vec<String>,
    pub summary: MergeSummary,
}

impl MergeRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input(mut self, path: impl Into<PathBuf>) -> Self {
        self.input = Some(path.into());
        self
    }

    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    pub fn settings_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings = Some(SettingsSource::File(path.into()));
        self
    }

    pub fn settings_from_store(mut self, store: CapabilityStore, schema: Schema) -> Self {
        self.settings = Some(SettingsSource::Store { store, schema });
        self
    }

    /// Directory for the scratch settings file; the system temp dir otherwise.
    pub fn scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    pub fn missing_ports(mut self, policy: MissingPortPolicy) -> Self {
        self.options.missing_ports = policy;
        self
    }

    pub fn app_info(mut self, app: AppInfo) -> Self {
        self.options.app = app;
        self
    }

    pub fn options(mut self, options: MergeOptions) -> Self {
        self.options = options;
        self
    }

    /// Run the pipeline on the current thread.
    ///
    /// The output file is only written once the merge has succeeded; on any
    /// error nothing is written and the scratch settings file, if any, is
    /// removed.
    pub fn run(self, mut progress: impl FnMut(u8)) -> Result<MergeReport, VifError> {
        let input = self.input.ok_or(VifError::MissingArgument("input"))?;
        let output = self.output.ok_or(VifError::MissingArgument("output"))?;
        let settings = self.settings.ok_or(VifError::MissingArgument("settings"))?;
        progress(PROGRESS_STARTED);
        info!(input = %input.display(), output = %output.display(), "generating VIF");

        let mut document = load_input_vif(&input)?;
        let ports = list_ports(&document).map_err(|err| err.with_path(&input))?;
        progress(PROGRESS_INPUT_LOADED);

        let scratch;
        let settings_path: &Path = match &settings {
            SettingsSource::File(path) => path,
            SettingsSource::Store { store, schema } => {
                let generated = encode_settings_with(store, &ports, schema, &self.options.app);
                scratch = write_scratch(&generated, self.scratch_dir.as_deref())?;
                scratch.path()
            }
        };
        progress(PROGRESS_SETTINGS_READY);

        let settings_document = load_settings_document(settings_path)?;
        let settings_map =
            decode_settings(&settings_document).map_err(|err| err.with_path(settings_path))?;
        progress(PROGRESS_SETTINGS_DECODED);

        let summary = merge_settings(&mut document, &settings_map, self.options.missing_ports)?;
        progress(PROGRESS_MERGED);

        vif_xml::save_document(&document, &output).map_err(|source| VifError::Output {
            path: output.clone(),
            source,
        })?;
        progress(PROGRESS_DONE);
        info!(output = %output.display(), ports = ports.len(), "VIF written");

        Ok(MergeReport {
            output,
            ports,
            summary,
        })
    }

    /// Run the pipeline on tokio's blocking pool.
    ///
    /// Must be called from within a tokio runtime. `progress` is invoked on
    /// the worker thread.
    pub fn spawn<F>(self, progress: F) -> MergeTask
    where
        F: FnMut(u8) + Send + 'static,
    {
        let handle = tokio::task::spawn_blocking(move || self.run(progress));
        MergeTask { handle }
    }
}

/// Handle to a generation run started with [`MergeRequest::spawn`].
#[derive(Debug)]
pub struct MergeTask {
    handle: JoinHandle<Result<MergeReport, VifError>>,
}

impl MergeTask {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the run to end and return its outcome.
    pub async fn wait(self) -> Result<MergeReport, VifError> {
        self.handle
            .await
            .map_err(|err| VifError::Worker(err.to_string()))?
    }
}

/// Load the VIF to merge into; every failure is `InvalidInputVif`.
pub fn load_input_vif(path: &Path) -> Result<Document, VifError> {
    vif_xml::load_document(path).map_err(|err| VifError::InvalidInputVif {
        path: Some(path.to_path_buf()),
        reason: err.to_string(),
    })
}

/// Load a settings document; every failure is `InvalidSettingsXml`.
pub fn load_settings_document(path: &Path) -> Result<Document, VifError> {
    vif_xml::load_document(path).map_err(|err| VifError::InvalidSettingsXml {
        path: Some(path.to_path_buf()),
        reason: err.to_string(),
    })
}

/// Encode the store for `ports` and save it as a settings file.
pub fn export_settings(
    store: &CapabilityStore,
    ports: &[String],
    schema: &Schema,
    app: &AppInfo,
    path: &Path,
) -> Result<(), VifError> {
    let document = encode_settings_with(store, ports, schema, app);
    vif_xml::save_document(&document, path).map_err(|source| VifError::Output {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), ports = ports.len(), "settings exported");
    Ok(())
}

fn write_scratch(document: &Document, dir: Option<&Path>) -> Result<NamedTempFile, VifError> {
    let dir = dir.map(Path::to_path_buf).unwrap_or_else(std::env::temp_dir);
    let failed = |source: XmlError| VifError::Output {
        path: dir.clone(),
        source,
    };
    let xml = vif_xml::write_document(document).map_err(failed)?;
    let mut file = tempfile::Builder::new()
        .prefix("dpam-settings-")
        .suffix(".xml")
        .tempfile_in(&dir)
        .map_err(|err| failed(err.into()))?;
    file.write_all(xml.as_bytes())
        .and_then(|()| file.flush())
        .map_err(|err| failed(err.into()))?;
    debug!(path = %file.path().display(), "wrote scratch settings");
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dpam_caps::schema::PORT_CAPABILITY;
    use std::fs;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;
    use vif_xml::{OPT_NS, VIF_NS};

    const ALL_STAGES: [u8; 6] = [
        PROGRESS_STARTED,
        PROGRESS_INPUT_LOADED,
        PROGRESS_SETTINGS_READY,
        PROGRESS_SETTINGS_DECODED,
        PROGRESS_MERGED,
        PROGRESS_DONE,
    ];

    fn write_vif(dir: &TempDir, labels: &[&str]) -> PathBuf {
        let components: String = labels
            .iter()
            .map(|label| {
                format!(
                    "  <vif:Component><vif:Port_Label>{label}</vif:Port_Label></vif:Component>\n"
                )
            })
            .collect();
        let path = dir.path().join("input.xml");
        fs::write(
            &path,
            format!(
                "<?xml version=\"1.0\"?>\n<!-- vendor header -->\n<vif:VIF xmlns:vif=\"{VIF_NS}\">\n{components}</vif:VIF>\n"
            ),
        )
        .expect("write input");
        path
    }

    fn sample_store() -> CapabilityStore {
        let mut store = CapabilityStore::new();
        store.set(PORT_CAPABILITY, 0, 1usize);
        store.set(PORT_CAPABILITY, 1, 2usize);
        store
    }

    fn export(dir: &TempDir, labels: &[&str]) -> PathBuf {
        let labels: Vec<String> = labels.iter().map(|label| label.to_string()).collect();
        let path = dir.path().join("settings.xml");
        export_settings(
            &sample_store(),
            &labels,
            &Schema::dpam(),
            &AppInfo::default(),
            &path,
        )
        .expect("export");
        path
    }

    #[test]
    fn merges_settings_file_with_progress() {
        let dir = TempDir::new().expect("tempdir");
        let input = write_vif(&dir, &["P0", "P1"]);
        let settings = export(&dir, &["P0", "P1"]);
        let output = dir.path().join("out.xml");

        let mut stages = Vec::new();
        let report = MergeRequest::new()
            .input(&input)
            .output(&output)
            .settings_file(&settings)
            .run(|percent| stages.push(percent))
            .expect("run");

        assert_eq!(stages, ALL_STAGES);
        assert_eq!(report.ports, ["P0", "P1"]);
        assert_eq!(report.summary.appended, 2);
        let xml = fs::read_to_string(&output).expect("read output");
        assert!(xml.starts_with(
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<!-- vendor header -->\n"
        ));
        assert!(xml.contains(&format!("xmlns:opt=\"{OPT_NS}\"")));
        assert!(xml.contains(
            r#"<opt:port_capability value="2">DFP_D-capable</opt:port_capability>"#
        ));
    }

    #[test]
    fn missing_arguments_are_reported_before_any_progress() {
        let mut stages = Vec::new();
        let err = MergeRequest::new()
            .input("in.xml")
            .output("out.xml")
            .run(|percent| stages.push(percent))
            .unwrap_err();
        assert!(matches!(err, VifError::MissingArgument("settings")));
        assert!(stages.is_empty());

        let err = MergeRequest::new().run(|_| {}).unwrap_err();
        assert!(matches!(err, VifError::MissingArgument("input")));
    }

    #[test]
    fn unreadable_input_is_invalid_input_vif() {
        let dir = TempDir::new().expect("tempdir");
        let input = dir.path().join("input.xml");
        fs::write(&input, "<vif:VIF").expect("write");
        let output = dir.path().join("out.xml");
        let err = MergeRequest::new()
            .input(&input)
            .output(&output)
            .settings_file(dir.path().join("settings.xml"))
            .run(|_| {})
            .unwrap_err();
        match err {
            VifError::InvalidInputVif { path, .. } => {
                assert_eq!(path.as_deref(), Some(input.as_path()))
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!output.exists());
    }

    #[test]
    fn missing_port_writes_nothing() {
        let dir = TempDir::new().expect("tempdir");
        let input = write_vif(&dir, &["P0", "P1"]);
        let settings = export(&dir, &["P0"]);
        let output = dir.path().join("out.xml");

        let mut stages = Vec::new();
        let err = MergeRequest::new()
            .input(&input)
            .output(&output)
            .settings_file(&settings)
            .run(|percent| stages.push(percent))
            .unwrap_err();

        assert!(matches!(err, VifError::InvalidSettingsXml { .. }));
        assert_eq!(stages, ALL_STAGES[..4]);
        assert!(!output.exists());
    }

    #[test]
    fn skip_policy_still_writes_output() {
        let dir = TempDir::new().expect("tempdir");
        let input = write_vif(&dir, &["P0", "P1"]);
        let settings = export(&dir, &["P0"]);
        let output = dir.path().join("out.xml");
        let report = MergeRequest::new()
            .input(&input)
            .output(&output)
            .settings_file(&settings)
            .missing_ports(MissingPortPolicy::Skip)
            .run(|_| {})
            .expect("run");
        assert_eq!(report.summary.skipped, ["P1"]);
        assert!(output.exists());
    }

    #[test]
    fn options_replace_policy_and_producer() {
        let app = AppInfo {
            vendor: "Acme".to_string(),
            name: "Port Tool".to_string(),
            version: "9.1".to_string(),
        };
        let request = MergeRequest::new()
            .missing_ports(MissingPortPolicy::Skip)
            .app_info(app.clone());
        assert_eq!(request.options.missing_ports, MissingPortPolicy::Skip);
        assert_eq!(request.options.app, app);

        let dir = TempDir::new().expect("tempdir");
        let input = write_vif(&dir, &["P0", "P1"]);
        let settings = export(&dir, &["P1"]);
        let output = dir.path().join("out.xml");
        let report = request
            .options(MergeOptions {
                missing_ports: MissingPortPolicy::Skip,
                ..MergeOptions::default()
            })
            .input(&input)
            .output(&output)
            .settings_file(&settings)
            .run(|_| {})
            .expect("run");
        assert_eq!(report.summary.skipped, ["P0"]);
        assert_eq!(report.summary.appended, 1);
    }

    #[test]
    fn store_source_removes_scratch_file() {
        let dir = TempDir::new().expect("tempdir");
        let scratch = TempDir::new().expect("scratch");
        let input = write_vif(&dir, &["P0", "P1"]);
        let output = dir.path().join("out.xml");

        let report = MergeRequest::new()
            .input(&input)
            .output(&output)
            .settings_from_store(sample_store(), Schema::dpam())
            .scratch_dir(scratch.path())
            .run(|_| {})
            .expect("run");
        assert_eq!(report.summary.appended, 2);
        assert_eq!(fs::read_dir(scratch.path()).expect("read dir").count(), 0);
        let xml = fs::read_to_string(&output).expect("read output");
        assert!(xml.contains(
            r#"<opt:port_capability value="1">UFP_D-capable</opt:port_capability>"#
        ));
    }

    #[test]
    fn store_source_removes_scratch_file_on_failure() {
        let dir = TempDir::new().expect("tempdir");
        let scratch = TempDir::new().expect("scratch");
        let input = write_vif(&dir, &["P0"]);
        let output = dir.path().join("missing-dir").join("out.xml");

        let err = MergeRequest::new()
            .input(&input)
            .output(&output)
            .settings_from_store(sample_store(), Schema::dpam())
            .scratch_dir(scratch.path())
            .run(|_| {})
            .unwrap_err();
        assert!(matches!(err, VifError::Output { .. }));
        assert_eq!(fs::read_dir(scratch.path()).expect("read dir").count(), 0);
    }

    #[tokio::test]
    async fn spawned_task_reports_progress() {
        let dir = TempDir::new().expect("tempdir");
        let input = write_vif(&dir, &["P0", "P1"]);
        let settings = export(&dir, &["P0", "P1"]);
        let output = dir.path().join("out.xml");

        let stages = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&stages);
        let task = MergeRequest::new()
            .input(&input)
            .output(&output)
            .settings_file(&settings)
            .spawn(move |percent| sink.lock().expect("lock").push(percent));
        while !task.is_finished() {
            tokio::task::yield_now().await;
        }
        assert_eq!(stages.lock().expect("lock").last(), Some(&PROGRESS_DONE));
        let report = task.wait().await.expect("merge task");

        assert_eq!(report.output, output);
        assert_eq!(*stages.lock().expect("lock"), ALL_STAGES);
        assert!(output.exists());
    }

    #[tokio::test]
    async fn spawned_task_surfaces_errors() {
        let task = MergeRequest::new().output("out.xml").spawn(|_| {});
        let err = task.wait().await.unwrap_err();
        assert!(matches!(err, VifError::MissingArgument("input")));
    }
}
