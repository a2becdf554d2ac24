//! Batchflow - resumable, distributed-aware data feeding for training pipelines
//!
//! A pipeline stage ("capsule") owns a dataset, wraps it in a batch loader and,
//! on every pipeline step, either produces the next batch into a shared
//! execution context or signals end-of-epoch to the inner loop.
//!
//! # Architecture
//!
//! - **Capsule lifecycle**: `setup` builds the loader once, `set` opens an
//!   epoch (resuming mid-epoch after a checkpoint when training), `launch`
//!   produces one batch per step, `reset` closes the epoch, `destroy` tears
//!   the stage down.
//! - **Accelerator**: device placement, rank-based batch sharding and
//!   skip-based mid-epoch resume for distributed runs.
//! - **Data**: dataset sources, the batch loader and its non-restartable
//!   epoch cursor.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use batchflow::{Accelerator, Capsule, Context, DatasetCapsule, LoaderConfig, Mode};
//!
//! let accel = Arc::new(Accelerator::new(candle_core::Device::Cpu));
//! let mut capsule = DatasetCapsule::new(dataset, accel, LoaderConfig::default());
//! let mut ctx = Context::with_looper(Mode::Train);
//!
//! capsule.setup(Some(&mut ctx))?;
//! capsule.set(Some(&mut ctx))?;
//! capsule.launch(Some(&mut ctx))?;
//! ```

pub mod accel;
pub mod config;
pub mod data;
pub mod pipeline;
pub mod utils;

// Re-export commonly used items
pub use accel::Accelerator;
pub use config::LoaderConfig;
pub use data::{Batch, Dataset, MemoryDataset, Sample};
pub use pipeline::{BatchSlot, Capsule, Context, DatasetCapsule, Looper, Mode};

/// Library error types
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Candle error: {0}")]
    Candle(#[from] candle_core::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Lifecycle error: {0}")]
    Lifecycle(String),

    #[error("State error: {0}")]
    State(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
