/// NumPy dataset source (.npy arrays plus a dataset.json metadata file)
use candle_core::{Device, Tensor};
use ndarray::Array2;
use ndarray_npy::ReadNpyExt;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use super::{Dataset, Sample};

/// Metadata from dataset.json
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatasetMetadata {
    pub vocab_size: usize,
    pub seq_len: usize,
    #[serde(default)]
    pub num_examples: usize,
    #[serde(default)]
    pub description: String,
}

/// Dataset loaded from NumPy .npy files
pub struct NumpyDataset {
    inputs: Array2<u32>,
    targets: Array2<u32>,
    metadata: DatasetMetadata,
}

fn read_i64_matrix(path: &Path) -> crate::Result<Array2<u32>> {
    // Python exporters save token ids as i64; narrow to u32 for candle
    let raw = <Array2<i64> as ReadNpyExt>::read_npy(File::open(path)?).map_err(|e| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Failed to read {}: {}", path.display(), e),
        )
    })?;

    Ok(raw.mapv(|x| x as u32))
}

impl NumpyDataset {
    /// Load from a directory containing `inputs.npy`, `targets.npy` and
    /// `dataset.json`
    pub fn from_directory<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let dir = path.as_ref();

        log::info!("Loading NumPy dataset from: {:?}", dir);

        let metadata_path = dir.join("dataset.json");
        let metadata: DatasetMetadata = if metadata_path.exists() {
            let file = File::open(&metadata_path)?;
            let reader = BufReader::new(file);
            serde_json::from_reader(reader)?
        } else {
            log::warn!("dataset.json not found, using defaults");
            DatasetMetadata {
                vocab_size: 256,
                seq_len: 64,
                num_examples: 0,
                description: "Unknown".to_string(),
            }
        };

        let inputs = read_i64_matrix(&dir.join("inputs.npy"))?;
        let targets = read_i64_matrix(&dir.join("targets.npy"))?;

        if inputs.shape() != targets.shape() {
            return Err(crate::PipelineError::Config(format!(
                "Shape mismatch: inputs {:?} != targets {:?}",
                inputs.shape(),
                targets.shape()
            )));
        }

        log::info!(
            "Dataset loaded: {} examples, seq_len={}, vocab_size={}",
            inputs.nrows(),
            inputs.ncols(),
            metadata.vocab_size
        );

        Ok(Self {
            inputs,
            targets,
            metadata,
        })
    }

    /// Sequence length of every example
    pub fn seq_len(&self) -> usize {
        self.inputs.ncols()
    }

    /// Get metadata
    pub fn metadata(&self) -> &DatasetMetadata {
        &self.metadata
    }
}

impl Dataset for NumpyDataset {
    fn len(&self) -> usize {
        self.inputs.nrows()
    }

    fn get(&self, index: usize) -> crate::Result<Sample> {
        let device = Device::Cpu;
        let seq_len = self.seq_len();

        let input = self.inputs.row(index).to_vec();
        let target = self.targets.row(index).to_vec();

        Ok(Sample {
            input: Tensor::from_vec(input, seq_len, &device)?,
            target: Tensor::from_vec(target, seq_len, &device)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray_npy::WriteNpyExt;

    #[test]
    fn test_metadata_deserialization() {
        let json = r#"{
            "vocab_size": 11,
            "seq_len": 81,
            "num_examples": 1000000,
            "description": "Sudoku-Extreme"
        }"#;

        let metadata: DatasetMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(metadata.vocab_size, 11);
        assert_eq!(metadata.seq_len, 81);
        assert_eq!(metadata.num_examples, 1000000);
    }

    #[test]
    fn test_from_directory_round_trip() {
        let dir = std::env::temp_dir().join("batchflow_numpy_test");
        std::fs::create_dir_all(&dir).unwrap();

        let inputs = ndarray::arr2(&[[1i64, 2, 3], [4, 5, 6]]);
        let targets = ndarray::arr2(&[[7i64, 8, 9], [10, 11, 12]]);
        inputs
            .write_npy(File::create(dir.join("inputs.npy")).unwrap())
            .unwrap();
        targets
            .write_npy(File::create(dir.join("targets.npy")).unwrap())
            .unwrap();
        std::fs::write(
            dir.join("dataset.json"),
            r#"{"vocab_size": 16, "seq_len": 3}"#,
        )
        .unwrap();

        let dataset = NumpyDataset::from_directory(&dir).unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.seq_len(), 3);
        assert_eq!(dataset.metadata().vocab_size, 16);

        let sample = dataset.get(1).unwrap();
        assert_eq!(sample.input.to_vec1::<u32>().unwrap(), vec![4, 5, 6]);
        assert_eq!(sample.target.to_vec1::<u32>().unwrap(), vec![10, 11, 12]);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let dir = std::env::temp_dir().join("batchflow_numpy_mismatch_test");
        std::fs::create_dir_all(&dir).unwrap();

        let inputs = ndarray::arr2(&[[1i64, 2, 3], [4, 5, 6]]);
        let targets = ndarray::arr2(&[[7i64, 8]]);
        inputs
            .write_npy(File::create(dir.join("inputs.npy")).unwrap())
            .unwrap();
        targets
            .write_npy(File::create(dir.join("targets.npy")).unwrap())
            .unwrap();

        assert!(NumpyDataset::from_directory(&dir).is_err());

        std::fs::remove_dir_all(&dir).ok();
    }
}
