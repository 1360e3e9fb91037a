// Library exports for reuse by the CLI and other front ends
pub mod cli;
pub mod config_file;
pub mod conversion;
pub mod error;
pub mod json_output;
pub mod report;
pub mod utils;

// Re-export commonly used types
pub use conversion::{
    BatchEvent, BatchHandle, BatchOrchestrator, BatchResult, BatchSummary, ConversionOutcome,
    OutcomeKind, RunConfig, SystemExecutor, TextureClass,
};
pub use error::BatchError;
pub use json_output::JsonMessage;
