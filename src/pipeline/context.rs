/// Shared execution context passed through every lifecycle call
use crate::data::Batch;

/// Whether the current phase is a training or an evaluation pass.
///
/// Mid-epoch resume is a training-only concern: evaluation epochs always
/// restart from batch 0 regardless of a saved batch index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Train,
    Eval,
}

/// The batch slot of the execution context for the current step.
///
/// A dedicated `Exhausted` marker keeps end-of-epoch distinct from any
/// legitimately produced batch, including an empty one.
#[derive(Debug, Clone, Default)]
pub enum BatchSlot {
    /// Nothing produced yet this step
    #[default]
    Empty,
    /// The payload for the current step
    Loaded(Batch),
    /// End-of-epoch marker
    Exhausted,
}

impl BatchSlot {
    /// True when no capsule has filled the slot this step
    pub fn is_empty(&self) -> bool {
        matches!(self, BatchSlot::Empty)
    }

    /// True once the epoch's batches ran out
    pub fn is_exhausted(&self) -> bool {
        matches!(self, BatchSlot::Exhausted)
    }

    /// The loaded payload, if any
    pub fn as_batch(&self) -> Option<&Batch> {
        match self {
            BatchSlot::Loaded(batch) => Some(batch),
            _ => None,
        }
    }
}

/// Inner-loop driver surface: the capsule requests loop exit through the
/// cooperative `terminate` flag, polled by the loop after each step.
#[derive(Debug, Default)]
pub struct Looper {
    pub terminate: bool,
}

/// Mutable state shared by all capsules of one pipeline step.
///
/// Each capsule reads and writes its own field group; the context itself is
/// owned by the controller and threaded through every lifecycle call.
#[derive(Debug)]
pub struct Context {
    /// Train/eval switch consulted by `set`
    pub mode: Mode,
    /// Current step's payload or exhaustion marker
    pub batch: BatchSlot,
    /// Inner-loop driver, when one is attached
    pub looper: Option<Looper>,
}

impl Context {
    /// Context without an inner-loop driver
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            batch: BatchSlot::Empty,
            looper: None,
        }
    }

    /// Context with an attached looper
    pub fn with_looper(mode: Mode) -> Self {
        Self {
            mode,
            batch: BatchSlot::Empty,
            looper: Some(Looper::default()),
        }
    }

    /// Take the current step's slot, leaving it empty for the next step
    pub fn take_batch(&mut self) -> BatchSlot {
        std::mem::take(&mut self.batch)
    }

    /// True when an attached looper has requested loop exit
    pub fn should_terminate(&self) -> bool {
        self.looper.as_ref().is_some_and(|looper| looper.terminate)
    }
}
