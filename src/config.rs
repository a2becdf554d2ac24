/// Configuration for the batch loader
///
/// These options are forwarded verbatim to the loader built in `setup`.
/// The collation function is fixed by the dataset capsule and is not part
/// of the configuration surface.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LoaderConfig {
    /// Number of samples per batch
    pub batch_size: usize,

    /// Shuffle sample order each epoch (seeded, deterministic)
    pub shuffle: bool,

    /// Seed for the shuffling permutation
    pub seed: u64,

    /// Drop the trailing partial batch instead of emitting it
    pub drop_last: bool,

    /// Number of background workers; 0 collates on the calling thread
    pub num_workers: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            batch_size: 32,
            shuffle: true,
            seed: 42,
            drop_last: false,
            num_workers: 0,
        }
    }
}

impl LoaderConfig {
    /// Validate configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.batch_size == 0 {
            return Err(crate::PipelineError::Config(
                "batch_size must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}
