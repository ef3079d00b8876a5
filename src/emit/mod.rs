pub mod dot;
pub mod mermaid;
pub mod report;
pub(crate) mod util;
pub mod yaml;
