//! Merge engine: graft decoded settings into the ports of a VIF document.

use tracing::{debug, info, warn};
use vif_xml::{Document, Element, QName};

use crate::settings::{port_label, SettingsMap};
use crate::VifError;

/// What to do with a VIF port that has no entry in the settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MissingPortPolicy {
    /// Abort the merge with `InvalidSettingsXml`.
    #[default]
    Fail,
    /// Leave the port unchanged and report it.
    Skip,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// Ports whose existing `opt:OptionalContent` received the settings.
    pub merged: usize,
    /// Ports that received a new `opt:OptionalContent` element.
    pub appended: usize,
    /// Ports left unchanged under [`MissingPortPolicy::Skip`].
    pub skipped: Vec<String>,
}

/// Labels of all `vif:Component` elements, at any depth, in document order.
pub fn list_ports(document: &Document) -> Result<Vec<String>, VifError> {
    document
        .root
        .descendants(&QName::vif("Component"))
        .into_iter()
        .enumerate()
        .map(|(index, component)| {
            port_label(component)
                .ok_or_else(|| VifError::input(format!("component #{index} has no vif:Port_Label")))
        })
        .collect()
}

/// Merge the settings into every port of `document`.
///
/// All ports are resolved before the document is touched, so an error leaves
/// it exactly as it was. A port that already carries `opt:OptionalContent`
/// gets the settings children appended to it; any other port gets a copy of
/// the whole settings element. Ports sharing a label each get their own copy.
pub fn merge_settings(
    document: &mut Document,
    settings: &SettingsMap,
    policy: MissingPortPolicy,
) -> Result<MergeSummary, VifError> {
    let labels = list_ports(document)?;
    let mut summary = MergeSummary::default();
    let mut plan: Vec<Option<&Element>> = Vec::with_capacity(labels.len());
    for label in &labels {
        match (settings.get(label), policy) {
            (Some(content), _) => plan.push(Some(content)),
            (None, MissingPortPolicy::Fail) => {
                return Err(VifError::settings(format!("no settings for port '{label}'")))
            }
            (None, MissingPortPolicy::Skip) => {
                warn!(port = %label, "no settings for port, leaving it unchanged");
                summary.skipped.push(label.clone());
                plan.push(None);
            }
        }
    }

    // Resolved up front: grafted settings may carry their own vif:Component.
    let paths = document.root.descendant_paths(&QName::vif("Component"));
    let optional_content = QName::opt("OptionalContent");
    for (index, (path, planned)) in paths.iter().zip(&plan).enumerate() {
        let Some(content) = planned else {
            continue;
        };
        let port = document
            .root
            .element_at_mut(path)
            .ok_or_else(|| VifError::input(format!("component #{index} moved during merge")))?;
        match port.child_mut(&optional_content) {
            Some(existing) => {
                existing.children.extend(content.children.iter().cloned());
                summary.merged += 1;
            }
            None => {
                port.push((*content).clone());
                summary.appended += 1;
            }
        }
        debug!(port = index, "merged port settings");
    }

    info!(
        ports = labels.len(),
        merged = summary.merged,
        appended = summary.appended,
        skipped = summary.skipped.len(),
        "merged DPAM settings"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{decode_settings, encode_settings};
    use dpam_caps::{CapabilityStore, Schema};
    use vif_xml::{parse_document, write_document, Node, OPT_NS, VIF_NS};

    fn vif(body: &str) -> Document {
        parse_document(&format!(
            r#"<vif:VIF xmlns:vif="{VIF_NS}" xmlns:opt="{OPT_NS}">{body}</vif:VIF>"#
        ))
        .expect("parse VIF")
    }

    fn settings_for(labels: &[&str]) -> SettingsMap {
        let labels: Vec<String> = labels.iter().map(|label| label.to_string()).collect();
        let mut store = CapabilityStore::new();
        store.set("port_capability", 0, 2usize);
        decode_settings(&encode_settings(&store, &labels, &Schema::dpam())).expect("decode")
    }

    fn component(label: &str) -> String {
        format!("<vif:Component><vif:Port_Label>{label}</vif:Port_Label></vif:Component>")
    }

    #[test]
    fn list_ports_in_document_order() {
        let document = vif(&format!(
            "{}<vif:Nested>{}</vif:Nested>",
            component(" P0 "),
            component("P1")
        ));
        assert_eq!(list_ports(&document).expect("ports"), ["P0", "P1"]);
    }

    #[test]
    fn unlabelled_component_is_invalid_input() {
        let document = vif(&format!("{}<vif:Component/>", component("P0")));
        let err = list_ports(&document).unwrap_err();
        assert!(matches!(err, VifError::InvalidInputVif { .. }));
        assert!(err.to_string().contains("component #1"));
    }

    #[test]
    fn appends_optional_content_to_every_port() {
        let mut document = vif(&format!("{}{}", component("P0"), component("P1")));
        let settings = settings_for(&["P0", "P1"]);
        let summary =
            merge_settings(&mut document, &settings, MissingPortPolicy::Fail).expect("merge");
        assert_eq!(summary.appended, 2);
        assert_eq!(summary.merged, 0);

        for port in document.root.descendants(&QName::vif("Component")) {
            let label = port_label(port).expect("label");
            let content = port
                .child(&QName::opt("OptionalContent"))
                .expect("optional content");
            assert_eq!(Some(content), settings.get(&label));
        }
    }

    #[test]
    fn duplicate_labels_each_receive_a_copy() {
        let mut document = vif(&format!("{}{}", component("P0"), component("P0")));
        let summary = merge_settings(&mut document, &settings_for(&["P0"]), MissingPortPolicy::Fail)
            .expect("merge");
        assert_eq!(summary.appended, 2);
        let contents: Vec<&Element> = document.root.descendants(&QName::opt("OptionalContent"));
        assert_eq!(contents.len(), 2);
        assert_eq!(contents[0], contents[1]);
    }

    #[test]
    fn merging_twice_duplicates_tabs() {
        let mut document = vif(&component("P0"));
        let settings = settings_for(&["P0"]);
        merge_settings(&mut document, &settings, MissingPortPolicy::Fail).expect("first merge");
        let summary = merge_settings(&mut document, &settings, MissingPortPolicy::Fail)
            .expect("second merge");
        assert_eq!(summary.merged, 1);
        let content = document
            .root
            .descendant(&QName::opt("OptionalContent"))
            .expect("optional content");
        assert_eq!(content.elements().count(), 4);
        assert_eq!(
            content
                .descendants(&QName::opt("sop_displayport_capabilities"))
                .len(),
            2
        );
    }

    #[test]
    fn settings_carrying_a_component_do_not_shift_later_ports() {
        let settings_xml = format!(
            r#"<vif:VIF xmlns:vif="{VIF_NS}" xmlns:opt="{OPT_NS}">
                 <vif:Component>
                   <vif:Port_Label>P0</vif:Port_Label>
                   <opt:OptionalContent identifier="DPAM">
                     <vif:Component>
                       <vif:Port_Label>inner</vif:Port_Label>
                       <opt:OptionalContent identifier="Inner"/>
                     </vif:Component>
                   </opt:OptionalContent>
                 </vif:Component>
                 <vif:Component>
                   <vif:Port_Label>P1</vif:Port_Label>
                   <opt:OptionalContent identifier="DPAM">
                     <opt:flag>1</opt:flag>
                   </opt:OptionalContent>
                 </vif:Component>
               </vif:VIF>"#
        );
        let settings =
            decode_settings(&parse_document(&settings_xml).expect("parse")).expect("decode");
        let mut document = vif(&format!("{}{}", component("P0"), component("P1")));
        let summary =
            merge_settings(&mut document, &settings, MissingPortPolicy::Fail).expect("merge");
        assert_eq!(summary.appended, 2);
        assert!(summary.skipped.is_empty());

        let ports: Vec<&Element> = document.root.elements().collect();
        assert_eq!(ports.len(), 2);
        for port in ports {
            let label = port_label(port).expect("label");
            let content = port
                .child(&QName::opt("OptionalContent"))
                .expect("optional content");
            assert_eq!(Some(content), settings.get(&label), "port {label}");
        }
        assert_eq!(document.root.descendants(&QName::vif("Component")).len(), 3);
    }

    #[test]
    fn missing_port_fails_without_touching_the_document() {
        let mut document = vif(&format!("{}{}", component("P0"), component("P1")));
        let before = document.clone();
        let err = merge_settings(&mut document, &settings_for(&["P0"]), MissingPortPolicy::Fail)
            .unwrap_err();
        assert!(matches!(err, VifError::InvalidSettingsXml { .. }));
        assert!(err.to_string().contains("'P1'"));
        assert_eq!(document, before);
    }

    #[test]
    fn skip_policy_leaves_missing_ports_alone() {
        let mut document = vif(&format!("{}{}", component("P0"), component("P1")));
        let summary = merge_settings(&mut document, &settings_for(&["P1"]), MissingPortPolicy::Skip)
            .expect("merge");
        assert_eq!(summary.skipped, ["P0"]);
        assert_eq!(summary.appended, 1);
        let ports = document.root.descendants(&QName::vif("Component"));
        assert!(ports[0].child(&QName::opt("OptionalContent")).is_none());
        assert!(ports[1].child(&QName::opt("OptionalContent")).is_some());
    }

    #[test]
    fn existing_optional_content_keeps_vendor_children() {
        let mut document = vif(
            r#"<vif:Component>
                 <vif:Port_Label>P0</vif:Port_Label>
                 <opt:OptionalContent identifier="Vendor">
                   <opt:vendor_flag>1</opt:vendor_flag>
                 </opt:OptionalContent>
               </vif:Component>"#,
        );
        let settings = settings_for(&["P0"]);
        let summary =
            merge_settings(&mut document, &settings, MissingPortPolicy::Fail).expect("merge");
        assert_eq!(summary.merged, 1);

        let contents = document.root.descendants(&QName::opt("OptionalContent"));
        assert_eq!(contents.len(), 1);
        let content = contents[0];
        assert_eq!(
            content.attribute(&QName::unqualified("identifier")),
            Some("Vendor")
        );
        let names: Vec<&str> = content
            .elements()
            .map(|element| element.name.local.as_str())
            .collect();
        assert_eq!(
            names,
            [
                "vendor_flag",
                "sop_displayport_capabilities",
                "sopp_displayport_capabilities"
            ]
        );
    }

    #[test]
    fn comments_survive_merge_and_save() {
        let mut document = parse_document(&format!(
            r#"<?xml version="1.0"?>
<!-- generated by vendor tool -->
<vif:VIF xmlns:vif="{VIF_NS}">
  <!-- port list -->
  {}
</vif:VIF>"#,
            component("P0")
        ))
        .expect("parse");
        merge_settings(&mut document, &settings_for(&["P0"]), MissingPortPolicy::Fail)
            .expect("merge");
        assert_eq!(
            document.prolog,
            [Node::Comment(" generated by vendor tool ".to_string())]
        );
        let xml = write_document(&document).expect("write");
        assert!(xml.contains("<!-- generated by vendor tool -->"));
        assert!(xml.contains("<!-- port list -->"));
        assert!(xml.contains(r#"<opt:OptionalContent identifier="DPAM" space="preserve">"#));
    }
}
