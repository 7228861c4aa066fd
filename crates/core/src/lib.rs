//! Situational-impairment inference.
//!
//! Perception pipelines write into [`signals::SharedSignals`]; the
//! [`scheduler::TickScheduler`] periodically asks the
//! [`orchestrator::Orchestrator`] to snapshot those signals, run the three
//! completions through an [`gateway::InferenceGateway`], and append the
//! parsed [`assessment::SituationalAssessment`] to the [`log::SessionLog`].

pub mod assessment;
pub mod clock;
pub mod gate;
pub mod gateway;
pub mod log;
pub mod orchestrator;
pub mod prompts;
pub mod scheduler;
pub mod signals;
pub mod snapshot;
pub mod volume;

pub use assessment::{Availability, Channel, ParseError, SituationalAssessment, parse_assessment};
pub use gateway::{ChatGateway, InferenceGateway};
pub use log::{LogEntry, SessionLog};
pub use orchestrator::{Orchestrator, Stage, TickError, TickOutcome};
pub use prompts::{PromptSet, SituationVariant};
pub use scheduler::{PeriodControl, TickScheduler, TickTiming};
pub use signals::{SharedSignals, SignalReading, SignalSource, VideoSource};
pub use snapshot::Snapshot;
pub use volume::VolumeMeter;
