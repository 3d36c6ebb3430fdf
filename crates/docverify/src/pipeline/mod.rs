pub mod config;
pub mod context;
pub mod error;
pub mod progress;
pub mod runner;

pub use config::PipelineConfig;
pub use context::{DocumentJob, LabelingContext, LabelingOutcome};
pub use error::PipelineError;
pub use progress::{LabelingPhase, NoopProgress, ProgressEvent, ProgressReporter, TracingProgress};
pub use runner::LabelingPipeline;
