pub mod shutdown;
pub mod startup;

pub use startup::{StartupContext, WorkerContext, prepare_startup};
