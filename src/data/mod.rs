/// Dataset sources and batch loading
pub mod loader;
pub mod memory;
pub mod numpy;

pub use loader::{BatchCursor, BatchLoader, LoaderView, PreparedLoader};
pub use memory::MemoryDataset;
pub use numpy::{DatasetMetadata, NumpyDataset};

use candle_core::Tensor;

/// A randomly addressable source of samples.
///
/// Sources hand out CPU tensors; device placement happens at launch time,
/// after collation.
pub trait Dataset: Send + Sync {
    /// Number of samples in the source
    fn len(&self) -> usize;

    /// Check if empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the sample at `index`
    fn get(&self, index: usize) -> crate::Result<Sample>;
}

/// A single (input, target) example
#[derive(Debug, Clone)]
pub struct Sample {
    pub input: Tensor,
    pub target: Tensor,
}

/// A collated batch of samples, stacked along a leading batch dimension
#[derive(Debug, Clone)]
pub struct Batch {
    /// Inputs, shape `[batch, ...]`
    pub inputs: Tensor,
    /// Targets, shape `[batch, ...]`
    pub targets: Tensor,
}

impl Batch {
    /// Number of samples in the batch
    pub fn len(&self) -> crate::Result<usize> {
        Ok(self.inputs.dim(0)?)
    }
}
