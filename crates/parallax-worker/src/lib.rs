//! Parallax orchestration runtime
//!
//! Long-running units of the core, each an explicit tokio task: the
//! single-flight processing worker, the model lifecycle manager with its
//! idle-unload timer, and the broadcast event bus that fans state out to
//! interactive subscribers.

pub mod bus;
pub mod model_manager;
pub mod worker;

pub use bus::EventBus;
pub use model_manager::{IdleTimeouts, ModelManager};
pub use worker::{ProcessingWorker, WorkerConfig, WorkerStatus};
