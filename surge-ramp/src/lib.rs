//! Run planning and ramp orchestration
//!
//! The planner is the control-plane half of a run: it validates the
//! target, enforces tenant-tier ceilings, and signs the capability
//! token. The orchestrator is the untrusted driving half: it walks the
//! ramp ladder, streams batch calls through a dispatcher, applies
//! smart-stop, and assembles the final report.

pub mod client;
pub mod error;
pub mod ladder;
pub mod orchestrator;
pub mod planner;
pub mod sink;

pub use client::{BatchDispatcher, HttpBatchDispatcher};
pub use error::{DispatchError, PlanError};
pub use ladder::{build_ladder, plan_steps, CONCURRENCY_MILESTONES};
pub use orchestrator::{step_parallelism, OrchestratorConfig, RampOrchestrator};
pub use planner::{PlannerConfig, RunPlanner};
pub use sink::{save_detached, HttpReportSink, ReportSink, SinkError};
