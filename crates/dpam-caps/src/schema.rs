//! Capability schema: which fields exist per tab, their kind and order.

use std::collections::HashSet;

use thiserror::Error;

use crate::bitgroup::{BitGroupError, MAX_MEMBERS};

/// Suffix of declared tab names.
pub const TAB_SUFFIX: &str = "_tab";
/// Suffix of declared select (combo box) field names.
pub const SELECT_SUFFIX: &str = "_cbb";
/// Suffix of declared boolean (checkbox) field names.
pub const CHECKBOX_SUFFIX: &str = "_checkbox";
/// Suffix of declared bit-group (group box) field names.
pub const GROUPBOX_SUFFIX: &str = "_groupbox";

const STRUCTURAL_SUFFIXES: &[&str] = &[TAB_SUFFIX, SELECT_SUFFIX, CHECKBOX_SUFFIX, GROUPBOX_SUFFIX];

/// SOP tab: DisplayPort capabilities of the port itself (`sop_displayport_capabilities`).
pub const SOP_TAB: &str = "sop_displayport_capabilities";
/// SOP' tab: DisplayPort capabilities of the cable plug (`sopp_displayport_capabilities`).
pub const SOPP_TAB: &str = "sopp_displayport_capabilities";
/// Port capability select field (`port_capability`).
pub const PORT_CAPABILITY: &str = "port_capability";
/// Signaling support bit group (`signaling_support`).
pub const SIGNALING_SUPPORT: &str = "signaling_support";
/// DFP_D pin assignment bit group (`dfp_d_pin_assignments`).
pub const DFP_D_PIN_ASSIGNMENTS: &str = "dfp_d_pin_assignments";
/// UFP_D pin assignment bit group (`ufp_d_pin_assignments`).
pub const UFP_D_PIN_ASSIGNMENTS: &str = "ufp_d_pin_assignments";
/// USB 2.0 signaling not used boolean field (`usb_r2_signaling_not_used`).
pub const USB_R2_SIGNALING_NOT_USED: &str = "usb_r2_signaling_not_used";
/// UHBR13.5 support boolean field (`uhbr13p5_support`).
pub const UHBR13P5_SUPPORT: &str = "uhbr13p5_support";

/// Strip the structural suffix from a declared name.
///
/// Spaces become underscores so the result is usable as an XML local name.
pub fn stable_name(declared: &str) -> String {
    let normalized = declared.trim().replace(' ', "_");
    for suffix in STRUCTURAL_SUFFIXES {
        if let Some(stripped) = normalized.strip_suffix(suffix) {
            return stripped.to_string();
        }
    }
    normalized
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    /// One of a fixed list of options, stored as the option index.
    Select { options: Vec<String> },
    /// Checked or unchecked.
    Boolean,
    /// Named boolean members packed into one value; `members` holds their
    /// stable names in bit order.
    BitGroup { members: Vec<String> },
}

/// One capability field as declared by the editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDecl {
    declared: String,
    stable: String,
    kind: FieldKind,
}

impl FieldDecl {
    pub fn select(declared: &str, options: &[&str]) -> Self {
        Self::with_kind(
            declared,
            FieldKind::Select {
                options: options.iter().map(|option| option.to_string()).collect(),
            },
        )
    }

    pub fn boolean(declared: &str) -> Self {
        Self::with_kind(declared, FieldKind::Boolean)
    }

    /// `members` are declared checkbox names; their stable names are kept.
    pub fn bit_group(declared: &str, members: &[&str]) -> Self {
        Self::with_kind(
            declared,
            FieldKind::BitGroup {
                members: members.iter().map(|member| stable_name(member)).collect(),
            },
        )
    }

    fn with_kind(declared: &str, kind: FieldKind) -> Self {
        Self {
            declared: declared.to_string(),
            stable: stable_name(declared),
            kind,
        }
    }

    pub fn declared_name(&self) -> &str {
        &self.declared
    }

    /// Name used as the XML element name and as the store key.
    pub fn stable_name(&self) -> &str {
        &self.stable
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }
}

/// A capability group, serialized as one element under the optional content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabDecl {
    declared: String,
    stable: String,
    fields: Vec<FieldDecl>,
}

impl TabDecl {
    pub fn new(declared: &str, fields: Vec<FieldDecl>) -> Self {
        Self {
            declared: declared.to_string(),
            stable: stable_name(declared),
            fields,
        }
    }

    pub fn declared_name(&self) -> &str {
        &self.declared
    }

    pub fn stable_name(&self) -> &str {
        &self.stable
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[FieldDecl] {
        &self.fields
    }
}

/// Result of looking a name up in the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaEntry<'a> {
    /// A top-level field of a tab.
    Field(&'a FieldDecl),
    /// A member checkbox of a bit group.
    Member { group: &'a FieldDecl, bit: usize },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("empty name in capability schema")]
    EmptyName,
    /// Tabs, fields and bit-group members share one store namespace.
    #[error("duplicate capability name: {0}")]
    Duplicate(String),
    #[error(transparent)]
    BitGroup(#[from] BitGroupError),
}

/// Fixed set of tabs and fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    tabs: Vec<TabDecl>,
}

impl Schema {
    /// Build a schema from editor-supplied declarations.
    pub fn new(tabs: Vec<TabDecl>) -> Result<Self, SchemaError> {
        let mut seen = HashSet::new();
        let mut claim = |name: &str| {
            if name.is_empty() {
                return Err(SchemaError::EmptyName);
            }
            if !seen.insert(name.to_string()) {
                return Err(SchemaError::Duplicate(name.to_string()));
            }
            Ok(())
        };
        for tab in &tabs {
            claim(tab.stable_name())?;
            for field in tab.fields() {
                claim(field.stable_name())?;
                if let FieldKind::BitGroup { members } = field.kind() {
                    if members.len() > MAX_MEMBERS {
                        return Err(BitGroupError::TooWide {
                            members: members.len(),
                        }
                        .into());
                    }
                    for member in members {
                        claim(member.as_str())?;
                    }
                }
            }
        }
        Ok(Self { tabs })
    }

    /// The compiled-in DisplayPort Alt Mode schema.
    pub fn dpam() -> Self {
        let tabs = DPAM_TABS
            .iter()
            .map(|tab| {
                let fields = tab.fields.iter().map(StaticField::to_decl).collect();
                TabDecl::new(tab.declared, fields)
            })
            .collect();
        Self { tabs }
    }

    pub fn tabs(&self) -> &[TabDecl] {
        &self.tabs
    }

    /// Look a tab up by declared or stable name.
    pub fn tab(&self, name: &str) -> Option<&TabDecl> {
        self.tabs
            .iter()
            .find(|tab| tab.declared_name() == name || tab.stable_name() == name)
    }

    /// All fields, tab by tab, in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = &FieldDecl> {
        self.tabs.iter().flat_map(|tab| tab.fields().iter())
    }

    /// Look a field up by declared or stable name.
    pub fn field(&self, name: &str) -> Option<&FieldDecl> {
        self.fields()
            .find(|field| field.declared_name() == name || field.stable_name() == name)
    }

    /// Look up a field or a bit-group member by declared or stable name.
    pub fn entry(&self, name: &str) -> Option<SchemaEntry<'_>> {
        if let Some(field) = self.field(name) {
            return Some(SchemaEntry::Field(field));
        }
        let wanted = stable_name(name);
        self.fields().find_map(|group| match group.kind() {
            FieldKind::BitGroup { members } => members
                .iter()
                .position(|member| *member == wanted)
                .map(|bit| SchemaEntry::Member { group, bit }),
            _ => None,
        })
    }
}

enum StaticKind {
    Select(&'static [&'static str]),
    Boolean,
    BitGroup(&'static [&'static str]),
}

struct StaticField {
    declared: &'static str,
    kind: StaticKind,
}

impl StaticField {
    fn to_decl(&self) -> FieldDecl {
        match self.kind {
            StaticKind::Select(options) => FieldDecl::select(self.declared, options),
            StaticKind::Boolean => FieldDecl::boolean(self.declared),
            StaticKind::BitGroup(members) => FieldDecl::bit_group(self.declared, members),
        }
    }
}

struct StaticTab {
    declared: &'static str,
    fields: &'static [StaticField],
}

const ACTIVE_COMPONENT_OPTIONS: &[&str] =
    &["Passive", "Active re-timer", "Active re-driver", "Optical"];
const DPAM_VERSION_OPTIONS: &[&str] = &["DPAM v2.0 or earlier", "DPAM v2.1 or later"];

const SOP_FIELDS: &[StaticField] = &[
    StaticField {
        declared: "port_capability_cbb",
        kind: StaticKind::Select(&[
            "Reserved",
            "UFP_D-capable",
            "DFP_D-capable",
            "Both DFP_D and UFP_D-capable",
        ]),
    },
    StaticField {
        declared: "signaling_support_groupbox",
        kind: StaticKind::BitGroup(&[
            "dp_v1p3_signaling_checkbox",
            "usb_gen2_signaling_checkbox",
            "uhbr10_uhbr20_signaling_checkbox",
        ]),
    },
    StaticField {
        declared: "receptacle_indication_cbb",
        kind: StaticKind::Select(&[
            "DisplayPort interface presented on a plug",
            "DisplayPort interface presented on a receptacle",
        ]),
    },
    StaticField {
        declared: "usb_r2_signaling_not_used_checkbox",
        kind: StaticKind::Boolean,
    },
    StaticField {
        declared: "dfp_d_pin_assignments_groupbox",
        kind: StaticKind::BitGroup(&[
            "dfp_d_pin_assignment_a_checkbox",
            "dfp_d_pin_assignment_b_checkbox",
            "dfp_d_pin_assignment_c_checkbox",
            "dfp_d_pin_assignment_d_checkbox",
            "dfp_d_pin_assignment_e_checkbox",
            "dfp_d_pin_assignment_f_checkbox",
        ]),
    },
    StaticField {
        declared: "ufp_d_pin_assignments_groupbox",
        kind: StaticKind::BitGroup(&[
            "ufp_d_pin_assignment_a_checkbox",
            "ufp_d_pin_assignment_b_checkbox",
            "ufp_d_pin_assignment_c_checkbox",
            "ufp_d_pin_assignment_d_checkbox",
            "ufp_d_pin_assignment_e_checkbox",
        ]),
    },
    StaticField {
        declared: "uhbr13p5_support_checkbox",
        kind: StaticKind::Boolean,
    },
    StaticField {
        declared: "active_component_cbb",
        kind: StaticKind::Select(ACTIVE_COMPONENT_OPTIONS),
    },
    StaticField {
        declared: "dpam_version_cbb",
        kind: StaticKind::Select(DPAM_VERSION_OPTIONS),
    },
];

const SOPP_FIELDS: &[StaticField] = &[
    StaticField {
        declared: "cable_signaling_cbb",
        kind: StaticKind::Select(&["HBR3 and below", "UHBR10", "UHBR10 and UHBR20"]),
    },
    StaticField {
        declared: "cable_active_component_cbb",
        kind: StaticKind::Select(ACTIVE_COMPONENT_OPTIONS),
    },
    StaticField {
        declared: "cable_uhbr13p5_support_cbb",
        kind: StaticKind::Select(&["Not supported", "Supported"]),
    },
    StaticField {
        declared: "cable_dpam_version_cbb",
        kind: StaticKind::Select(DPAM_VERSION_OPTIONS),
    },
];

const DPAM_TABS: &[StaticTab] = &[
    StaticTab {
        declared: "sop_displayport_capabilities_tab",
        fields: SOP_FIELDS,
    },
    StaticTab {
        declared: "sopp_displayport_capabilities_tab",
        fields: SOPP_FIELDS,
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_names_drop_structural_suffixes() {
        assert_eq!(stable_name("sop_displayport_capabilities_tab"), SOP_TAB);
        assert_eq!(stable_name("port_capability_cbb"), PORT_CAPABILITY);
        assert_eq!(stable_name("uhbr13p5_support_checkbox"), UHBR13P5_SUPPORT);
        assert_eq!(stable_name("signaling_support_groupbox"), SIGNALING_SUPPORT);
        assert_eq!(stable_name("SOP Tab Name_tab"), "SOP_Tab_Name");
        assert_eq!(stable_name("already_stable"), "already_stable");
    }

    #[test]
    fn compiled_in_schema_is_valid() {
        let dpam = Schema::dpam();
        let rebuilt = Schema::new(dpam.tabs().to_vec()).expect("valid schema");
        assert_eq!(rebuilt, dpam);
        let tabs: Vec<&str> = dpam.tabs().iter().map(TabDecl::stable_name).collect();
        assert_eq!(tabs, [SOP_TAB, SOPP_TAB]);
    }

    #[test]
    fn lookup_by_declared_or_stable_name() {
        let schema = Schema::dpam();
        let by_declared = schema.field("usb_r2_signaling_not_used_checkbox").expect("field");
        let by_stable = schema.field(USB_R2_SIGNALING_NOT_USED).expect("field");
        assert_eq!(by_declared, by_stable);
        assert_eq!(by_stable.kind(), &FieldKind::Boolean);
        assert!(schema.tab("sopp_displayport_capabilities_tab").is_some());
        assert!(schema.field("no_such_field").is_none());
    }

    #[test]
    fn members_resolve_to_group_and_bit() {
        let schema = Schema::dpam();
        match schema.entry("dfp_d_pin_assignment_c_checkbox") {
            Some(SchemaEntry::Member { group, bit }) => {
                assert_eq!(group.stable_name(), DFP_D_PIN_ASSIGNMENTS);
                assert_eq!(bit, 2);
            }
            other => panic!("unexpected entry: {other:?}"),
        }
        assert!(matches!(
            schema.entry(UFP_D_PIN_ASSIGNMENTS),
            Some(SchemaEntry::Field(_))
        ));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let tab = TabDecl::new(
            "caps_tab",
            vec![
                FieldDecl::boolean("flag_checkbox"),
                FieldDecl::bit_group("group_groupbox", &["flag_checkbox"]),
            ],
        );
        assert_eq!(
            Schema::new(vec![tab]).unwrap_err(),
            SchemaError::Duplicate("flag".into())
        );
    }

    #[test]
    fn oversized_groups_are_rejected() {
        let names: Vec<String> = (0..=MAX_MEMBERS).map(|i| format!("m{i}_checkbox")).collect();
        let members: Vec<&str> = names.iter().map(String::as_str).collect();
        let tab = TabDecl::new("caps_tab", vec![FieldDecl::bit_group("wide_groupbox", &members)]);
        assert!(matches!(
            Schema::new(vec![tab]).unwrap_err(),
            SchemaError::BitGroup(BitGroupError::TooWide { .. })
        ));
    }
}
