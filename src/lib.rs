//! Aggregator for the DPAM VIF generator workspace.
//!
//! Re-exports the library crates so demos and downstream tools can depend on
//! a single package. The command-line tool lives in `crates/dpamvifctl`.

pub use dpam_caps as caps;
pub use dpam_vif::*;
pub use vif_xml as xml;
