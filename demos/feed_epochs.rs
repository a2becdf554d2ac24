/// Drive a dataset capsule through two epochs with a mid-epoch resume
use std::sync::Arc;

use batchflow::{
    Accelerator, BatchSlot, Capsule, Context, DatasetCapsule, LoaderConfig, MemoryDataset, Mode,
};
use batchflow::data::Dataset;

fn main() -> anyhow::Result<()> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("=== Batchflow - epoch feeding demo ===");

    // Device setup - Try CUDA first, fallback to CPU
    let device = if candle_core::utils::cuda_is_available() {
        candle_core::Device::new_cuda(0)?
    } else {
        candle_core::Device::Cpu
    };
    log::info!("Using device: {:?}", device);

    // Synthetic dataset: 32 sequences of 4 tokens, targets shifted by one
    let inputs: Vec<Vec<u32>> = (0..32u32).map(|i| (i..i + 4).collect()).collect();
    let targets: Vec<Vec<u32>> = (0..32u32).map(|i| (i + 1..i + 5).collect()).collect();
    let dataset = Arc::new(MemoryDataset::new(inputs, targets)?);
    log::info!("Dataset created: {} examples", dataset.len());

    let config = LoaderConfig {
        batch_size: 8,
        shuffle: false,
        ..LoaderConfig::default()
    };

    let accel = Arc::new(Accelerator::new(device));
    let mut capsule = DatasetCapsule::new(dataset.clone(), accel.clone(), config.clone());
    let mut ctx = Context::with_looper(Mode::Train);

    capsule.setup(Some(&mut ctx))?;

    for epoch in 0..2 {
        capsule.set(Some(&mut ctx))?;
        log::info!("=== Epoch {}: {} batches ===", epoch + 1, capsule.total());

        loop {
            ctx.batch = BatchSlot::Empty;
            capsule.launch(Some(&mut ctx))?;

            if ctx.should_terminate() {
                log::info!("Epoch {} exhausted", epoch + 1);
                break;
            }

            if let BatchSlot::Loaded(batch) = &ctx.batch {
                log::info!(
                    "  batch {}: inputs {:?}",
                    capsule.batch_index(),
                    batch.inputs.dims()
                );
            }
        }

        capsule.reset(Some(&mut ctx))?;
    }

    // Checkpoint mid-epoch, then resume on a fresh capsule
    capsule.set(Some(&mut ctx))?;
    for _ in 0..2 {
        ctx.batch = BatchSlot::Empty;
        capsule.launch(Some(&mut ctx))?;
    }
    let state = capsule.state_dict()?;
    log::info!("Saved state after 2 batches: {}", state);

    capsule.reset(Some(&mut ctx))?;
    capsule.destroy(Some(&mut ctx))?;

    let mut resumed = DatasetCapsule::new(dataset, accel, config);
    resumed.setup(Some(&mut ctx))?;
    resumed.load_state_dict(state)?;
    resumed.set(Some(&mut ctx))?;
    log::info!("Resumed: {} batches left in epoch", resumed.total());

    loop {
        ctx.batch = BatchSlot::Empty;
        resumed.launch(Some(&mut ctx))?;
        if ctx.should_terminate() {
            break;
        }
        log::info!("  resumed batch, index now {}", resumed.batch_index());
    }

    resumed.reset(Some(&mut ctx))?;
    resumed.destroy(Some(&mut ctx))?;

    log::info!("Demo complete");
    Ok(())
}
