pub mod events;
pub mod identity;
pub mod violation;

pub use events::*;
pub use identity::*;
pub use violation::*;
