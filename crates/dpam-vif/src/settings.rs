//! Settings document codec.
//!
//! A settings document carries one `vif:Component` per port. Each component
//! holds the port label and an `opt:OptionalContent` subtree with one element
//! per tab and, below it, one element per field:
//!
//! ```xml
//! <vif:Component>
//!   <vif:Port_Label>Port 0</vif:Port_Label>
//!   <opt:OptionalContent identifier="DPAM" space="preserve">
//!     <opt:sop_displayport_capabilities>
//!       <opt:port_capability value="2">DFP_D-capable</opt:port_capability>
//!       <opt:signaling_support value="5">dp_v1p3_signaling, uhbr10_uhbr20_signaling</opt:signaling_support>
//!     </opt:sop_displayport_capabilities>
//!   </opt:OptionalContent>
//! </vif:Component>
//! ```
//!
//! The `value` attribute is authoritative on import; element text is for
//! human readers only.

use std::collections::HashMap;

use dpam_caps::bitgroup;
use dpam_caps::{CapabilityStore, FieldDecl, FieldKind, Schema, StoreValue, ValueError};
use tracing::{debug, warn};
use vif_xml::{Document, Element, QName};

use crate::{VifError, DPAM_IDENTIFIER};

/// VIF specification revision written into settings documents.
pub const VIF_SPECIFICATION: &str = "3.25";

const VALUE_ATTR: &str = "value";

/// Producer identification written into the `vif:VIF_App` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppInfo {
    pub vendor: String,
    pub name: String,
    pub version: String,
}

impl Default for AppInfo {
    fn default() -> Self {
        Self {
            vendor: "VESA DPAM WG".to_string(),
            name: "DPAM VIF Generator".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Empty `opt:OptionalContent` element tagged as DPAM content.
pub fn optional_content() -> Element {
    Element::new(QName::opt("OptionalContent"))
        .with_attribute(QName::unqualified("identifier"), DPAM_IDENTIFIER)
        .with_attribute(QName::unqualified("space"), "preserve")
}

/// Encode the store as a settings document with the default producer block.
pub fn encode_settings(store: &CapabilityStore, ports: &[String], schema: &Schema) -> Document {
    encode_settings_with(store, ports, schema, &AppInfo::default())
}

/// Encode the store as a settings document.
///
/// Every port gets every field of every tab. Missing or unreadable values
/// fall back to the field default (first option, unchecked).
pub fn encode_settings_with(
    store: &CapabilityStore,
    ports: &[String],
    schema: &Schema,
    app: &AppInfo,
) -> Document {
    let mut root = Element::new(QName::vif("VIF"))
        .with_child(Element::new(QName::vif("VIF_Specification")).with_text(VIF_SPECIFICATION))
        .with_child(
            Element::new(QName::vif("VIF_App"))
                .with_child(Element::new(QName::vif("Vendor")).with_text(&app.vendor))
                .with_child(Element::new(QName::vif("Name")).with_text(&app.name))
                .with_child(Element::new(QName::vif("Version")).with_text(&app.version)),
        );
    for (port, label) in ports.iter().enumerate() {
        root.push(encode_port(store, schema, port, label));
    }
    debug!(
        ports = ports.len(),
        fields = schema.fields().count(),
        "encoded settings document"
    );
    Document::new(root)
}

fn encode_port(store: &CapabilityStore, schema: &Schema, port: usize, label: &str) -> Element {
    let mut content = optional_content();
    for tab in schema.tabs() {
        let mut tab_element = Element::new(QName::opt(tab.stable_name()));
        for field in tab.fields() {
            tab_element.push(encode_field(store, field, port));
        }
        content.push(tab_element);
    }
    Element::new(QName::vif("Component"))
        .with_child(Element::new(QName::vif("Port_Label")).with_text(label))
        .with_child(content)
}

fn encode_field(store: &CapabilityStore, field: &FieldDecl, port: usize) -> Element {
    let element = Element::new(QName::opt(field.stable_name()));
    let value = QName::unqualified(VALUE_ATTR);
    match field.kind() {
        FieldKind::Select { options } => {
            let index = stored(store, field.stable_name(), port, StoreValue::as_index).unwrap_or(0);
            let label = options.get(index).map(String::as_str).unwrap_or("");
            element
                .with_attribute(value, index.to_string())
                .with_text(label)
        }
        FieldKind::Boolean => {
            let checked =
                stored(store, field.stable_name(), port, StoreValue::as_checked).unwrap_or(false);
            element.with_attribute(value, checked.to_string())
        }
        FieldKind::BitGroup { members } => {
            let states: Vec<bool> = members
                .iter()
                .map(|member| stored(store, member, port, StoreValue::as_checked).unwrap_or(false))
                .collect();
            let (packed, names) = match bitgroup::pack(&states) {
                Ok(packed) => (
                    packed,
                    bitgroup::checked_names(members.iter().map(String::as_str), &states),
                ),
                Err(err) => {
                    warn!(
                        field = field.stable_name(),
                        port,
                        %err,
                        "cannot pack bit group, writing 0"
                    );
                    (0, String::new())
                }
            };
            element
                .with_attribute(value, packed.to_string())
                .with_text(names)
        }
    }
}

fn stored<T>(
    store: &CapabilityStore,
    field: &str,
    port: usize,
    read: impl Fn(&StoreValue) -> Result<T, ValueError>,
) -> Option<T> {
    let value = store.get(field, port)?;
    match read(value) {
        Ok(parsed) => Some(parsed),
        Err(err) => {
            warn!(field, port, %err, "malformed stored value, using default");
            None
        }
    }
}

/// Port label of a `vif:Component`, trimmed; `None` when absent or blank.
pub fn port_label(component: &Element) -> Option<String> {
    component
        .child(&QName::vif("Port_Label"))
        .map(|label| label.text().trim().to_string())
        .filter(|label| !label.is_empty())
}

/// `opt:OptionalContent` subtrees of a settings document keyed by port label.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsMap {
    ports: HashMap<String, Element>,
}

impl SettingsMap {
    pub fn get(&self, label: &str) -> Option<&Element> {
        self.ports.get(label)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.ports.contains_key(label)
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    /// Labels in unspecified order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.ports.keys().map(String::as_str)
    }
}

/// Index the optional content of every `vif:Component` by its port label.
///
/// Components are found at any depth. A later component with the same label
/// replaces an earlier one.
pub fn decode_settings(document: &Document) -> Result<SettingsMap, VifError> {
    let optional_content = QName::opt("OptionalContent");
    let mut ports = HashMap::new();
    for (index, component) in document
        .root
        .descendants(&QName::vif("Component"))
        .into_iter()
        .enumerate()
    {
        let label = port_label(component).ok_or_else(|| {
            VifError::settings(format!("component #{index} has no vif:Port_Label"))
        })?;
        let content = component.descendant(&optional_content).ok_or_else(|| {
            VifError::settings(format!("port '{label}' has no opt:OptionalContent"))
        })?;
        if ports.insert(label.clone(), content.clone()).is_some() {
            warn!(port = %label, "duplicate port label in settings, keeping the last one");
        }
    }
    debug!(ports = ports.len(), "decoded settings document");
    Ok(SettingsMap { ports })
}

/// A field that could not be imported and was left untouched in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedField {
    pub port: String,
    pub field: String,
    pub reason: String,
}

/// Outcome of [`import_settings`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Enumerated ports that had settings.
    pub ports: usize,
    /// Fields written to the store.
    pub fields: usize,
    pub skipped: Vec<SkippedField>,
}

/// Load decoded settings into the store for the currently enumerated ports.
///
/// Ports without settings and settings for unknown ports are ignored. A field
/// whose element or value is missing or malformed is skipped and reported;
/// the rest of the import carries on.
pub fn import_settings(
    settings: &SettingsMap,
    ports: &[String],
    schema: &Schema,
    store: &mut CapabilityStore,
) -> ImportReport {
    let mut report = ImportReport::default();
    for (port, label) in ports.iter().enumerate() {
        let Some(content) = settings.get(label) else {
            debug!(port = %label, "no settings for port");
            continue;
        };
        report.ports += 1;
        for tab in schema.tabs() {
            let tab_element = content.child(&QName::opt(tab.stable_name()));
            for field in tab.fields() {
                let outcome = tab_element
                    .ok_or_else(|| format!("missing tab element opt:{}", tab.stable_name()))
                    .and_then(|tab_element| import_field(tab_element, field, port, store));
                match outcome {
                    Ok(()) => report.fields += 1,
                    Err(reason) => {
                        warn!(
                            port = %label,
                            field = field.stable_name(),
                            %reason,
                            "skipping settings field"
                        );
                        report.skipped.push(SkippedField {
                            port: label.clone(),
                            field: field.stable_name().to_string(),
                            reason,
                        });
                    }
                }
            }
        }
    }
    debug!(
        ports = report.ports,
        fields = report.fields,
        skipped = report.skipped.len(),
        "imported settings"
    );
    report
}

fn import_field(
    tab: &Element,
    field: &FieldDecl,
    port: usize,
    store: &mut CapabilityStore,
) -> Result<(), String> {
    let element = tab
        .child(&QName::opt(field.stable_name()))
        .ok_or_else(|| "element missing".to_string())?;
    let raw = element
        .attribute(&QName::unqualified(VALUE_ATTR))
        .ok_or_else(|| "value attribute missing".to_string())?
        .trim();
    match field.kind() {
        FieldKind::Select { options } => {
            let index: usize = raw
                .parse()
                .map_err(|_| format!("'{raw}' is not an option index"))?;
            if index >= options.len() {
                return Err(format!(
                    "option index {index} out of range for {} options",
                    options.len()
                ));
            }
            store.set(field.stable_name(), port, index);
        }
        FieldKind::Boolean => {
            let checked = match raw {
                "true" => true,
                "false" => false,
                _ => return Err(format!("'{raw}' is not true or false")),
            };
            store.set(field.stable_name(), port, checked);
        }
        FieldKind::BitGroup { members } => {
            let packed: u64 = raw
                .parse()
                .map_err(|_| format!("'{raw}' is not a bit-group value"))?;
            let states = bitgroup::unpack(packed, members.len()).map_err(|err| err.to_string())?;
            for (member, checked) in members.iter().zip(states) {
                store.set(member, port, checked);
            }
        }
    }
    Ok(())
}
