//! Admin-action guard and its supporting state.

pub mod admin_guard;
pub mod attempts;
pub mod attribution;
pub mod trust;

pub use admin_guard::{AdminActionGuard, AllowReason, GuardDecision, GuardSettings};
pub use attempts::{
    AttemptDecision, AttemptKey, AttemptStore, AttemptTracker, InMemoryAttemptStore,
    RedisAttemptStore,
};
pub use attribution::resolve_actor;
pub use trust::TrustWindows;
