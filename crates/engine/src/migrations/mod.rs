//! Migration System
//!
//! Discovery and parsing live in `source`/`parser`, file management in
//! `manager`, and execution against a store in `runner`/`rollback`.

pub mod definitions;
pub mod manager;
pub mod parser;
pub mod rollback;
pub mod runner;
pub mod source;

pub use definitions::*;
pub use manager::MigrationManager;
pub use parser::{next_version, parse_definition, parse_filename, parse_sections, sanitize_name};
pub use runner::MigrationRunner;
pub use source::{DirectorySource, EmbeddedSource, MigrationSource, RawMigration};
