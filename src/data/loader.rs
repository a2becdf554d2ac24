/// Batch loader, shard/skip views and the epoch cursor
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use candle_core::Tensor;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use super::{Batch, Dataset, Sample};
use crate::config::LoaderConfig;

/// Batches buffered ahead of the consumer when a prefetch worker is active
const PREFETCH_DEPTH: usize = 2;

/// Fixed collation: stack samples along a new leading batch dimension.
pub(crate) fn collate(samples: &[Sample]) -> crate::Result<Batch> {
    let inputs: Vec<&Tensor> = samples.iter().map(|s| &s.input).collect();
    let targets: Vec<&Tensor> = samples.iter().map(|s| &s.target).collect();

    Ok(Batch {
        inputs: Tensor::stack(&inputs, 0)?,
        targets: Tensor::stack(&targets, 0)?,
    })
}

fn load_batch(dataset: &dyn Dataset, indices: &[usize]) -> crate::Result<Batch> {
    let mut samples = Vec::with_capacity(indices.len());
    for &idx in indices {
        samples.push(dataset.get(idx)?);
    }
    collate(&samples)
}

/// Batch loader over a dataset source.
///
/// Built once per capsule in `setup`; epochs iterate over views of it.
/// The sample permutation is derived from the configured seed, so batch
/// order is stable across view rebuilds within a run. That stability is
/// what makes skip-based mid-epoch resume line up with the saved batch
/// index.
pub struct BatchLoader {
    dataset: Arc<dyn Dataset>,
    config: LoaderConfig,
}

impl BatchLoader {
    /// Create a loader from a source and configuration
    pub fn new(dataset: Arc<dyn Dataset>, config: LoaderConfig) -> crate::Result<Self> {
        config.validate()?;

        Ok(Self { dataset, config })
    }

    /// Total number of batches per epoch, before sharding
    pub fn batch_count(&self) -> usize {
        let n = self.dataset.len();
        let b = self.config.batch_size;

        if self.config.drop_last {
            n / b
        } else {
            (n + b - 1) / b
        }
    }

    /// Loader configuration
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Sample index groups for one epoch, in batch order
    fn batch_indices(&self) -> Vec<Vec<usize>> {
        let mut indices: Vec<usize> = (0..self.dataset.len()).collect();

        if self.config.shuffle {
            let mut rng = StdRng::seed_from_u64(self.config.seed);
            indices.shuffle(&mut rng);
        }

        let mut groups: Vec<Vec<usize>> = indices
            .chunks(self.config.batch_size)
            .map(<[usize]>::to_vec)
            .collect();

        if self.config.drop_last {
            if let Some(last) = groups.last() {
                if last.len() < self.config.batch_size {
                    groups.pop();
                }
            }
        }

        groups
    }
}

/// A loader registered with an [`Accelerator`](crate::Accelerator).
///
/// Holds the rank/world placement assigned at `prepare` time plus the
/// registration ticket used to enforce teardown order.
pub struct PreparedLoader {
    inner: Arc<BatchLoader>,
    rank: usize,
    world_size: usize,
    ticket: u64,
}

impl PreparedLoader {
    pub(crate) fn new(loader: BatchLoader, rank: usize, world_size: usize, ticket: u64) -> Self {
        Self {
            inner: Arc::new(loader),
            rank,
            world_size,
            ticket,
        }
    }

    pub(crate) fn ticket(&self) -> u64 {
        self.ticket
    }

    /// Number of batches this rank sees per epoch
    pub fn batch_count(&self) -> usize {
        self.view().batch_count()
    }

    /// Full-epoch view for this rank
    pub fn view(&self) -> LoaderView {
        self.view_skipping(0)
    }

    /// View omitting the first `skip` of this rank's batches
    pub(crate) fn view_skipping(&self, skip: usize) -> LoaderView {
        LoaderView {
            inner: self.inner.clone(),
            rank: self.rank,
            world_size: self.world_size,
            skip,
        }
    }
}

/// A shard- and skip-adjusted window over a prepared loader.
///
/// Batch `i` of the underlying loader belongs to rank `i % world_size`;
/// the view then drops its first `skip` batches. Views are cheap to build
/// and are rebuilt on every `set`.
pub struct LoaderView {
    inner: Arc<BatchLoader>,
    rank: usize,
    world_size: usize,
    skip: usize,
}

impl LoaderView {
    /// Number of batches remaining in the view
    pub fn batch_count(&self) -> usize {
        let total = self.inner.batch_count();
        let sharded = (total + self.world_size - 1 - self.rank) / self.world_size;
        sharded.saturating_sub(self.skip)
    }

    /// Open a fresh cursor over the view.
    ///
    /// Each call recomputes the epoch permutation, so a cursor always
    /// starts at the view's first batch regardless of previous cursors.
    pub fn cursor(&self) -> BatchCursor {
        let batches: Vec<Vec<usize>> = self
            .inner
            .batch_indices()
            .into_iter()
            .enumerate()
            .filter(|(i, _)| i % self.world_size == self.rank)
            .map(|(_, group)| group)
            .skip(self.skip)
            .collect();

        let dataset = self.inner.dataset.clone();

        if self.inner.config.num_workers > 0 {
            BatchCursor::prefetching(dataset, batches)
        } else {
            BatchCursor::foreground(dataset, batches)
        }
    }
}

/// A lazy, finite, non-restartable cursor over one epoch's batches.
///
/// Once exhausted it stays exhausted; a new epoch needs a new cursor from
/// [`LoaderView::cursor`]. With `num_workers > 0` collation runs on a
/// single background thread feeding a bounded channel, which preserves
/// batch order.
pub struct BatchCursor {
    inner: CursorInner,
}

enum CursorInner {
    Foreground {
        dataset: Arc<dyn Dataset>,
        batches: std::vec::IntoIter<Vec<usize>>,
    },
    Prefetching {
        receiver: mpsc::Receiver<crate::Result<Batch>>,
    },
}

impl BatchCursor {
    fn foreground(dataset: Arc<dyn Dataset>, batches: Vec<Vec<usize>>) -> Self {
        Self {
            inner: CursorInner::Foreground {
                dataset,
                batches: batches.into_iter(),
            },
        }
    }

    fn prefetching(dataset: Arc<dyn Dataset>, batches: Vec<Vec<usize>>) -> Self {
        let (sender, receiver) = mpsc::sync_channel(PREFETCH_DEPTH);

        thread::spawn(move || {
            for group in batches {
                let batch = load_batch(dataset.as_ref(), &group);
                let failed = batch.is_err();

                // A closed channel means the cursor was dropped early.
                if sender.send(batch).is_err() || failed {
                    break;
                }
            }
        });

        Self {
            inner: CursorInner::Prefetching { receiver },
        }
    }
}

impl Iterator for BatchCursor {
    type Item = crate::Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            CursorInner::Foreground { dataset, batches } => batches
                .next()
                .map(|group| load_batch(dataset.as_ref(), &group)),
            CursorInner::Prefetching { receiver } => receiver.recv().ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MemoryDataset;

    fn ramp_dataset(len: usize) -> Arc<dyn Dataset> {
        // sample i is ([i], [i]) so batch contents identify batch order
        let rows: Vec<Vec<u32>> = (0..len as u32).map(|i| vec![i]).collect();
        Arc::new(MemoryDataset::new(rows.clone(), rows).unwrap())
    }

    fn plain_config(batch_size: usize) -> LoaderConfig {
        LoaderConfig {
            batch_size,
            shuffle: false,
            seed: 0,
            drop_last: false,
            num_workers: 0,
        }
    }

    fn first_inputs(cursor: BatchCursor) -> Vec<u32> {
        cursor
            .map(|batch| batch.unwrap().inputs.to_vec2::<u32>().unwrap()[0][0])
            .collect()
    }

    #[test]
    fn test_batch_count_rounds_up() {
        let loader = BatchLoader::new(ramp_dataset(10), plain_config(3)).unwrap();
        assert_eq!(loader.batch_count(), 4);
    }

    #[test]
    fn test_batch_count_drop_last() {
        let config = LoaderConfig {
            drop_last: true,
            ..plain_config(3)
        };
        let loader = BatchLoader::new(ramp_dataset(10), config).unwrap();
        assert_eq!(loader.batch_count(), 3);
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(BatchLoader::new(ramp_dataset(4), plain_config(0)).is_err());
    }

    #[test]
    fn test_cursor_yields_batches_in_order() {
        let loader = BatchLoader::new(ramp_dataset(10), plain_config(2)).unwrap();
        let prepared = PreparedLoader::new(loader, 0, 1, 0);

        assert_eq!(first_inputs(prepared.view().cursor()), vec![0, 2, 4, 6, 8]);
    }

    #[test]
    fn test_cursor_is_not_restartable() {
        let loader = BatchLoader::new(ramp_dataset(4), plain_config(2)).unwrap();
        let prepared = PreparedLoader::new(loader, 0, 1, 0);
        let mut cursor = prepared.view().cursor();

        assert!(cursor.next().is_some());
        assert!(cursor.next().is_some());
        assert!(cursor.next().is_none());
        assert!(cursor.next().is_none());
    }

    #[test]
    fn test_shuffle_is_deterministic_per_seed() {
        let config = LoaderConfig {
            shuffle: true,
            seed: 7,
            ..plain_config(2)
        };
        let first = PreparedLoader::new(
            BatchLoader::new(ramp_dataset(10), config.clone()).unwrap(),
            0,
            1,
            0,
        );
        let second = PreparedLoader::new(
            BatchLoader::new(ramp_dataset(10), config).unwrap(),
            0,
            1,
            1,
        );

        let a = first_inputs(first.view().cursor());
        let b = first_inputs(second.view().cursor());
        assert_eq!(a, b);
        assert_ne!(a, vec![0, 2, 4, 6, 8]);
    }

    #[test]
    fn test_sharded_view_interleaves_batches() {
        let build = |rank| {
            PreparedLoader::new(
                BatchLoader::new(ramp_dataset(10), plain_config(2)).unwrap(),
                rank,
                2,
                rank as u64,
            )
        };

        let rank0 = build(0);
        let rank1 = build(1);

        assert_eq!(rank0.batch_count(), 3);
        assert_eq!(rank1.batch_count(), 2);
        assert_eq!(first_inputs(rank0.view().cursor()), vec![0, 4, 8]);
        assert_eq!(first_inputs(rank1.view().cursor()), vec![2, 6]);
    }

    #[test]
    fn test_skip_view_omits_prefix() {
        let loader = BatchLoader::new(ramp_dataset(10), plain_config(2)).unwrap();
        let prepared = PreparedLoader::new(loader, 0, 1, 0);
        let view = prepared.view_skipping(3);

        assert_eq!(view.batch_count(), 2);
        assert_eq!(first_inputs(view.cursor()), vec![6, 8]);
    }

    #[test]
    fn test_skip_beyond_epoch_is_empty() {
        let loader = BatchLoader::new(ramp_dataset(4), plain_config(2)).unwrap();
        let prepared = PreparedLoader::new(loader, 0, 1, 0);
        let view = prepared.view_skipping(99);

        assert_eq!(view.batch_count(), 0);
        assert!(view.cursor().next().is_none());
    }

    #[test]
    fn test_prefetching_cursor_matches_foreground() {
        let foreground = BatchLoader::new(ramp_dataset(10), plain_config(2)).unwrap();
        let prefetching = BatchLoader::new(
            ramp_dataset(10),
            LoaderConfig {
                num_workers: 1,
                ..plain_config(2)
            },
        )
        .unwrap();

        let a = first_inputs(PreparedLoader::new(foreground, 0, 1, 0).view().cursor());
        let b = first_inputs(PreparedLoader::new(prefetching, 0, 1, 1).view().cursor());
        assert_eq!(a, b);
    }

    #[test]
    fn test_partial_final_batch_size() {
        let loader = BatchLoader::new(ramp_dataset(5), plain_config(2)).unwrap();
        let prepared = PreparedLoader::new(loader, 0, 1, 0);

        let sizes: Vec<usize> = prepared
            .view()
            .cursor()
            .map(|batch| batch.unwrap().len().unwrap())
            .collect();
        assert_eq!(sizes, vec![2, 2, 1]);
    }
}
