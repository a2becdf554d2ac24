/// Dataset capsule: resumable, distributed-aware batch feeding
use std::sync::Arc;

use super::capsule::Capsule;
use super::context::{BatchSlot, Context, Mode};
use crate::accel::Accelerator;
use crate::config::LoaderConfig;
use crate::data::{BatchCursor, BatchLoader, Dataset, LoaderView, PreparedLoader};
use crate::utils::ToDevice;
use crate::PipelineError;

/// Pipeline stage feeding batches from a dataset.
///
/// Owns the raw dataset handle, builds the wrapped loader once in `setup`,
/// and on every step either writes the next batch into the execution
/// context or marks the epoch exhausted. The batch index survives
/// checkpoints: when a training epoch opens with a nonzero index the
/// capsule resumes from a skip-adjusted loader view instead of batch 0.
pub struct DatasetCapsule {
    source: Arc<dyn Dataset>,
    accel: Arc<Accelerator>,
    config: LoaderConfig,
    loader: Option<PreparedLoader>,
    active: Option<LoaderView>,
    cursor: Option<BatchCursor>,
    batch_index: usize,
    total: usize,
    priority: i32,
    stateful: bool,
}

impl DatasetCapsule {
    /// Create a capsule over a dataset source
    pub fn new(source: Arc<dyn Dataset>, accel: Arc<Accelerator>, config: LoaderConfig) -> Self {
        Self {
            source,
            accel,
            config,
            loader: None,
            active: None,
            cursor: None,
            batch_index: 0,
            total: 0,
            priority: 1000,
            stateful: true,
        }
    }

    /// Override the dispatch priority
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Opt out of checkpoint registration
    pub fn without_state(mut self) -> Self {
        self.stateful = false;
        self
    }

    /// Batches already produced in the current epoch
    pub fn batch_index(&self) -> usize {
        self.batch_index
    }

    /// Batches remaining in the active view when the epoch opened
    pub fn total(&self) -> usize {
        self.total
    }
}

impl Capsule for DatasetCapsule {
    fn priority(&self) -> i32 {
        self.priority
    }

    fn stateful(&self) -> bool {
        self.stateful
    }

    fn setup(&mut self, _ctx: Option<&mut Context>) -> crate::Result<()> {
        if self.loader.is_some() {
            return Err(PipelineError::Lifecycle(
                "setup called twice on dataset capsule".to_string(),
            ));
        }

        let loader = BatchLoader::new(self.source.clone(), self.config.clone())?;
        let prepared = self.accel.prepare(loader);

        log::info!(
            "dataset capsule ready: {} batches per epoch on rank {}/{}",
            prepared.batch_count(),
            self.accel.rank(),
            self.accel.world_size()
        );

        self.loader = Some(prepared);
        Ok(())
    }

    fn set(&mut self, ctx: Option<&mut Context>) -> crate::Result<()> {
        log::debug!("dataset capsule set");

        let loader = self.loader.as_ref().ok_or_else(|| {
            PipelineError::Lifecycle("set called before setup".to_string())
        })?;

        // Resume is a training-only concern; eval epochs always restart
        // from batch 0 even when a saved batch index is present.
        let mode = ctx.as_deref().map(|c| c.mode).unwrap_or(Mode::Eval);
        let active = if mode == Mode::Train && self.batch_index > 0 {
            self.accel.skip_first_batches(loader, self.batch_index)
        } else {
            loader.view()
        };

        self.total = active.batch_count();
        self.cursor = Some(active.cursor());
        self.active = Some(active);
        Ok(())
    }

    fn launch(&mut self, ctx: Option<&mut Context>) -> crate::Result<()> {
        log::debug!("dataset capsule launch");

        // Capsules may share one context per step; whoever filled the
        // slot first wins and later launches are no-ops.
        let Some(ctx) = ctx else {
            return Ok(());
        };
        if !ctx.batch.is_empty() {
            return Ok(());
        }

        let cursor = self.cursor.as_mut().ok_or_else(|| {
            PipelineError::Lifecycle("launch called before set".to_string())
        })?;

        match cursor.next() {
            None => {
                ctx.batch = BatchSlot::Exhausted;
                if let Some(looper) = ctx.looper.as_mut() {
                    looper.terminate = true;
                }
            }
            Some(batch) => {
                let batch = batch?.to_device(self.accel.device())?;
                ctx.batch = BatchSlot::Loaded(batch);
                if let Some(looper) = ctx.looper.as_mut() {
                    looper.terminate = false;
                }
                self.batch_index += 1;
            }
        }

        Ok(())
    }

    fn reset(&mut self, _ctx: Option<&mut Context>) -> crate::Result<()> {
        log::debug!("dataset capsule reset");

        self.batch_index = 0;
        self.total = 0;
        self.cursor = None;
        Ok(())
    }

    fn destroy(&mut self, _ctx: Option<&mut Context>) -> crate::Result<()> {
        log::info!("dataset capsule destroyed");

        let loader = self.loader.take().ok_or_else(|| {
            PipelineError::Lifecycle("destroy called without a prepared loader".to_string())
        })?;

        self.active = None;
        self.cursor = None;
        self.accel.release(loader)
    }

    fn state_dict(&self) -> crate::Result<serde_json::Value> {
        Ok(serde_json::json!({ "batch_index": self.batch_index }))
    }

    fn load_state_dict(&mut self, state: serde_json::Value) -> crate::Result<()> {
        let batch_index = state
            .get("batch_index")
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| {
                PipelineError::State(format!("missing or invalid batch_index in {state}"))
            })?;

        self.batch_index = batch_index as usize;
        Ok(())
    }
}
