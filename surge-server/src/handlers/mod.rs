//! Request handlers

pub mod batch;
pub mod health;
pub mod runs;

pub use batch::{cancel_run, execute_batch};
pub use health::health_check;
pub use runs::{get_report, save_report, start_run};
