//! Rendering of query results for humans, diagram tools and prompts.

pub mod compact;
pub mod graphml;
pub mod mermaid;

pub use compact::compact;
pub use graphml::render_graphml;
pub use mermaid::render_mermaid;
