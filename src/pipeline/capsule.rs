/// Capsule lifecycle contract
use super::context::Context;

/// A lifecycle-managed pipeline stage.
///
/// The controller dispatches over this trait in priority order: `setup`
/// once at pipeline build, `set` at each epoch start, `launch` at each
/// step, `reset` at each epoch end, `destroy` at teardown. State flows
/// through `state_dict`/`load_state_dict` at checkpoint boundaries for
/// capsules that report themselves stateful.
///
/// Every call receives the shared execution context; a capsule must
/// tolerate an absent context and treat it as "nothing to do".
pub trait Capsule {
    /// Dispatch ordering among capsules sharing a controller
    fn priority(&self) -> i32 {
        1000
    }

    /// Whether this capsule registers for checkpointing
    fn stateful(&self) -> bool {
        false
    }

    /// Build owned resources; runs exactly once before any `set`/`launch`
    fn setup(&mut self, ctx: Option<&mut Context>) -> crate::Result<()>;

    /// Open an epoch; runs after `setup`/`reset` and before `launch`
    fn set(&mut self, ctx: Option<&mut Context>) -> crate::Result<()>;

    /// Produce this step's contribution to the context
    fn launch(&mut self, ctx: Option<&mut Context>) -> crate::Result<()>;

    /// Close the epoch and clear per-epoch state
    fn reset(&mut self, ctx: Option<&mut Context>) -> crate::Result<()>;

    /// Release owned resources; terminal
    fn destroy(&mut self, ctx: Option<&mut Context>) -> crate::Result<()>;

    /// Checkpoint payload for this capsule
    fn state_dict(&self) -> crate::Result<serde_json::Value> {
        Ok(serde_json::Value::Null)
    }

    /// Restore a payload produced by `state_dict`
    fn load_state_dict(&mut self, _state: serde_json::Value) -> crate::Result<()> {
        Ok(())
    }
}
