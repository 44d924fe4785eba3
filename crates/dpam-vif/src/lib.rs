#![cfg_attr(docsrs, feature(doc_cfg))]
//! Merge DisplayPort Alt Mode (DPAM) capability settings into USB VIF
//! documents.
//!
//! The crate re-exports the capability model ([`caps`]) and the XML tree
//! ([`xml`]) and adds the settings document codec, the per-port merge engine
//! and the end-to-end generation pipeline.
//!
//! ```rust
//! use dpam_vif::caps::{CapabilityStore, Schema};
//! use dpam_vif::{decode_settings, encode_settings, list_ports, merge_settings, MissingPortPolicy};
//!
//! let mut vif = dpam_vif::xml::parse_document(
//!     r#"<vif:VIF xmlns:vif="http://usb.org/VendorInfoFile.xsd">
//!          <!-- ports -->
//!          <vif:Component><vif:Port_Label>P0</vif:Port_Label></vif:Component>
//!        </vif:VIF>"#,
//! )?;
//! let ports = list_ports(&vif)?;
//!
//! let mut store = CapabilityStore::new();
//! store.set("port_capability", 0, 2usize);
//! let settings = encode_settings(&store, &ports, &Schema::dpam());
//!
//! let summary = merge_settings(&mut vif, &decode_settings(&settings)?, MissingPortPolicy::Fail)?;
//! assert_eq!(summary.appended, 1);
//! let xml = dpam_vif::xml::write_document(&vif)?;
//! assert!(xml.contains("<!-- ports -->"));
//! assert!(xml.contains(r#"<opt:port_capability value="2">DFP_D-capable</opt:port_capability>"#));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub use dpam_caps as caps;
pub use vif_xml as xml;

pub mod merge;
pub mod pipeline;
pub mod settings;

use std::path::{Path, PathBuf};

use thiserror::Error;
use vif_xml::XmlError;

pub use merge::{list_ports, merge_settings, MergeSummary, MissingPortPolicy};
pub use pipeline::{
    export_settings, load_input_vif, load_settings_document, MergeOptions, MergeReport,
    MergeRequest, MergeTask, SettingsSource,
};
pub use settings::{
    decode_settings, encode_settings, encode_settings_with, import_settings, port_label,
    AppInfo, ImportReport, SettingsMap, SkippedField,
};

/// Value of the `identifier` attribute on DPAM optional content.
pub const DPAM_IDENTIFIER: &str = "DPAM";

/// Document-level failures of the generation pipeline.
///
/// Field-level problems never surface here; the settings codec absorbs them.
#[derive(Debug, Error)]
pub enum VifError {
    /// One of the input, output or settings paths was not supplied.
    #[error("missing generator argument: {0}")]
    MissingArgument(&'static str),
    /// The input VIF is unreadable, malformed, or has a port without a label.
    #[error("invalid input VIF XML{}: {reason}", at_path(.path))]
    InvalidInputVif {
        path: Option<PathBuf>,
        reason: String,
    },
    /// The settings document is unreadable, malformed, or incomplete.
    #[error("invalid DPAM settings XML{}: {reason}", at_path(.path))]
    InvalidSettingsXml {
        path: Option<PathBuf>,
        reason: String,
    },
    /// Writing a generated document failed.
    #[error("failed to write {}: {source}", .path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: XmlError,
    },
    /// The background generation task panicked or was cancelled.
    #[error("generation worker failed: {0}")]
    Worker(String),
}

fn at_path(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|path| format!(" file at {}", path.display()))
        .unwrap_or_default()
}

impl VifError {
    pub(crate) fn input<S: Into<String>>(reason: S) -> Self {
        VifError::InvalidInputVif {
            path: None,
            reason: reason.into(),
        }
    }

    pub(crate) fn settings<S: Into<String>>(reason: S) -> Self {
        VifError::InvalidSettingsXml {
            path: None,
            reason: reason.into(),
        }
    }

    /// Attach the offending file to a document error that has none yet.
    pub fn with_path(self, file: &Path) -> Self {
        match self {
            VifError::InvalidInputVif { path: None, reason } => VifError::InvalidInputVif {
                path: Some(file.to_path_buf()),
                reason,
            },
            VifError::InvalidSettingsXml { path: None, reason } => VifError::InvalidSettingsXml {
                path: Some(file.to_path_buf()),
                reason,
            },
            other => other,
        }
    }

    /// Short name of the error kind, as reported by the batch command.
    pub fn kind(&self) -> &'static str {
        match self {
            VifError::MissingArgument(_) => "MissingArgument",
            VifError::InvalidInputVif { .. } => "InvalidInputVIF",
            VifError::InvalidSettingsXml { .. } => "InvalidSettingsXML",
            VifError::Output { .. } => "OutputError",
            VifError::Worker(_) => "WorkerError",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_is_attached_once() {
        let err = VifError::settings("no port").with_path(Path::new("a.xml"));
        let err = err.with_path(Path::new("b.xml"));
        assert_eq!(
            err.to_string(),
            "invalid DPAM settings XML file at a.xml: no port"
        );
        assert_eq!(err.kind(), "InvalidSettingsXML");
    }

    #[test]
    fn messages_without_path() {
        assert_eq!(
            VifError::input("component #0 has no vif:Port_Label").to_string(),
            "invalid input VIF XML: component #0 has no vif:Port_Label"
        );
        assert_eq!(
            VifError::MissingArgument("output").to_string(),
            "missing generator argument: output"
        );
    }
}
