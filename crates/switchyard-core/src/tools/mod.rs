//! Tool declarations: discovery, the catalog and schema sanitizing

pub mod discovery;
pub mod registry;
pub mod sanitize;

pub use discovery::{discover_tools, parse_declarations};
pub use registry::{ToolCatalog, ToolSource};
pub use sanitize::sanitize_parameters;
