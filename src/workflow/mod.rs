pub mod critique_flow;
pub mod run_ctx;

pub use critique_flow::CritiqueFlow;
pub use run_ctx::{Halt, RunCtx};
