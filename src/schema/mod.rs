//! Schema inspector subsystem
//!
//! Answers the compiler's questions about a collection:
//!
//! - Is field F an array, and what are its items?
//! - What leaf type is declared for a path?
//! - Which paths have a plain or lowercase expression index?
//!
//! Schemas are immutable per version. A migration registers a new version.

mod errors;
mod loader;
mod types;

pub use errors::{SchemaError, SchemaResult};
pub use loader::SchemaLoader;
pub use types::{is_index_segment, FieldDef, FieldType, IndexDef, IndexKind, SchemaInfo};
