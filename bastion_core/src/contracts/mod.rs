//! Contracts the core consumes from its collaborators.
//!
//! Each collaborator is an abstract capability set declared here, next to the
//! components that consume it. Implementations are injected at wiring time;
//! a missing implementation is a configuration error reported at startup,
//! never a nil discovered at request time.

mod access;
mod events;
mod infrastructure;
mod spaces;
mod users;

pub use access::*;
pub use events::*;
pub use infrastructure::*;
pub use spaces::*;
pub use users::*;
