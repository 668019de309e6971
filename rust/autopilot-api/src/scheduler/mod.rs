//! Autopilot scheduling.
//!
//! - [`next_run`]: when a schedule fires next
//! - [`executor`]: claims due schedules and works through their batches
//! - [`pipeline`]: the generate/publish calls the executor makes
//! - [`ticker`]: optional in-process trigger

pub mod executor;
pub mod next_run;
pub mod pipeline;
pub mod ticker;

pub use executor::{CronSummary, RunExecutor, ScheduleRunResult};
pub use next_run::compute_next_run;
pub use pipeline::{
    ContentPipeline, HttpContentPipeline, InternalGenerateRequest, InternalGenerateResponse,
    InternalPublishRequest,
};
pub use ticker::spawn_ticker;
