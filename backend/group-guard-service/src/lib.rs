pub mod config;
pub mod consumer;
pub mod db;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod guard;
pub mod logging;
pub mod models;
pub mod policy;
pub mod services;

// Re-export commonly used types
pub use config::Config;
pub use engine::{DispatchOutcome, MessageOutcome, ModerationEngine};
pub use error::{GuardError, Result};
pub use guard::{GuardDecision, GuardSettings};
pub use models::{ContentEvent, Event, GroupId, ParticipantEvent, UserId, ViolationKind};
