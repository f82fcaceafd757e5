//! Shopping cart of laboratory tests.
//!
//! [`Cart`] is the plain state and its pricing derivations; [`CartStore`]
//! wraps it with persistence so the cart survives restarts. Neither ever
//! returns an error: duplicate adds and removals of absent items are silent
//! no-ops, and persistence failures are logged.

mod model;
mod persist;
mod store;

pub use model::{Cart, CartItem};
pub use persist::{CartPersistence, FilePersistence, MemoryPersistence};
pub use store::{CartConfig, CartStore};
