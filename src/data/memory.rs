/// In-memory dataset source
use candle_core::{Device, Tensor};

use super::{Dataset, Sample};

/// Dataset backed by in-memory token rows.
///
/// Mostly useful for demos and tests; real runs load from disk sources
/// such as [`NumpyDataset`](super::NumpyDataset).
pub struct MemoryDataset {
    inputs: Vec<Vec<u32>>,
    targets: Vec<Vec<u32>>,
}

impl MemoryDataset {
    /// Create from parallel input/target rows
    pub fn new(inputs: Vec<Vec<u32>>, targets: Vec<Vec<u32>>) -> crate::Result<Self> {
        if inputs.len() != targets.len() {
            return Err(crate::PipelineError::Config(format!(
                "input/target length mismatch: {} != {}",
                inputs.len(),
                targets.len()
            )));
        }

        Ok(Self { inputs, targets })
    }
}

impl Dataset for MemoryDataset {
    fn len(&self) -> usize {
        self.inputs.len()
    }

    fn get(&self, index: usize) -> crate::Result<Sample> {
        let input = &self.inputs[index];
        let target = &self.targets[index];
        let device = Device::Cpu;

        Ok(Sample {
            input: Tensor::from_vec(input.clone(), input.len(), &device)?,
            target: Tensor::from_vec(target.clone(), target.len(), &device)?,
        })
    }
}
