//! papershelf: find academic papers, download their PDFs and read them back
//! as page-ranged or context-sized text, exposed as MCP tools.

pub mod error;
pub mod mcp;
pub mod papers;
pub mod settings;
pub mod shelf;
pub mod storage;
pub mod utils;

pub use error::{PaperError, Result};
pub use settings::Settings;
pub use shelf::Shelf;
pub use storage::Storage;
