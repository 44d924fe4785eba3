pub mod cmd_export;
pub mod cmd_generate;
pub mod cmd_get;
pub mod cmd_import;
pub mod cmd_merge;
pub mod cmd_ports;
pub mod cmd_schema;
pub mod cmd_set;
pub mod common;
pub mod persist;
