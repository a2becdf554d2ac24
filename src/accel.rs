/// Distributed backend handle: device placement, batch sharding, resume views
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use candle_core::Device;

use crate::data::{BatchLoader, LoaderView, PreparedLoader};

/// Handle to the distributed training backend.
///
/// Owns the target device, the rank/world placement of this process and an
/// explicit registration stack of prepared loaders. Loaders are pushed by
/// [`prepare`](Accelerator::prepare) and must be released in reverse order
/// by [`release`](Accelerator::release); violating that order is a usage
/// error, not a recoverable condition.
///
/// The stack sits behind a `Mutex` so one handle can be shared between
/// capsules, but lifecycle calls themselves are driven sequentially by the
/// controller.
pub struct Accelerator {
    device: Device,
    rank: usize,
    world_size: usize,
    stack: Mutex<Vec<u64>>,
    next_ticket: AtomicU64,
}

impl Accelerator {
    /// Single-process handle
    pub fn new(device: Device) -> Self {
        Self {
            device,
            rank: 0,
            world_size: 1,
            stack: Mutex::new(Vec::new()),
            next_ticket: AtomicU64::new(0),
        }
    }

    /// Handle for one process of a distributed run
    pub fn distributed(device: Device, rank: usize, world_size: usize) -> crate::Result<Self> {
        if world_size == 0 {
            return Err(crate::PipelineError::Config(
                "world_size must be > 0".to_string(),
            ));
        }
        if rank >= world_size {
            return Err(crate::PipelineError::Config(format!(
                "rank {} out of range for world_size {}",
                rank, world_size
            )));
        }

        Ok(Self {
            device,
            rank,
            world_size,
            stack: Mutex::new(Vec::new()),
            next_ticket: AtomicU64::new(0),
        })
    }

    /// Device batches are moved to at launch time
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Rank of this process
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Number of processes in the run
    pub fn world_size(&self) -> usize {
        self.world_size
    }

    /// Number of loaders currently registered
    pub fn registered_loaders(&self) -> usize {
        self.stack.lock().unwrap().len()
    }

    /// Wrap a loader for this process: shard batches across ranks and push
    /// the loader onto the registration stack.
    pub fn prepare(&self, loader: BatchLoader) -> PreparedLoader {
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        self.stack.lock().unwrap().push(ticket);

        log::debug!(
            "prepared loader {} (rank {}/{})",
            ticket,
            self.rank,
            self.world_size
        );

        PreparedLoader::new(loader, self.rank, self.world_size, ticket)
    }

    /// View over a prepared loader that omits its first `n` batches
    pub fn skip_first_batches(&self, loader: &PreparedLoader, n: usize) -> LoaderView {
        loader.view_skipping(n)
    }

    /// Pop a loader from the registration stack.
    ///
    /// Fails loudly on an empty stack (double teardown) and on an
    /// out-of-registration-order pop.
    pub fn release(&self, loader: PreparedLoader) -> crate::Result<()> {
        let mut stack = self.stack.lock().unwrap();

        match stack.last() {
            None => Err(crate::PipelineError::Lifecycle(
                "release called with an empty loader stack".to_string(),
            )),
            Some(&top) if top != loader.ticket() => Err(crate::PipelineError::Lifecycle(format!(
                "loader {} released out of order (top of stack is {})",
                loader.ticket(),
                top
            ))),
            Some(_) => {
                stack.pop();
                log::debug!("released loader {}", loader.ticket());
                Ok(())
            }
        }
    }
}
