/// Pipeline capsule lifecycle
pub mod capsule;
pub mod context;
pub mod dataset;

pub use capsule::Capsule;
pub use context::{BatchSlot, Context, Looper, Mode};
pub use dataset::DatasetCapsule;
