pub mod analyzer;
pub mod heuristics;
pub mod language;
pub mod prompts;
pub mod report;
pub mod requirements;
pub mod segmentation;

pub use analyzer::analyze;
pub use report::{assemble_report, ReportInput};
pub use requirements::{generate_requirements, resolve_requirements};
