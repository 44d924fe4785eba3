//! DisplayPort Alt Mode capability model: the compiled-in field schema, the
//! per-port capability store and bit-group packing helpers.
//!
//! ```rust
//! use dpam_caps::{CapabilityStore, FieldKind, Schema};
//!
//! let schema = Schema::dpam();
//! let field = schema.field("port_capability_cbb").expect("declared field");
//! assert!(matches!(field.kind(), FieldKind::Select { .. }));
//!
//! let mut store = CapabilityStore::new();
//! store.set(field.stable_name(), 0, 2usize);
//! assert_eq!(store.get("port_capability", 0).and_then(|v| v.as_index().ok()), Some(2));
//! assert!(store.get("port_capability", 1).is_none());
//! ```

pub mod bitgroup;
pub mod schema;
pub mod store;

pub use bitgroup::BitGroupError;
pub use schema::{stable_name, FieldDecl, FieldKind, Schema, SchemaEntry, SchemaError, TabDecl};
pub use store::{CapabilityStore, StoreValue, ValueError};
