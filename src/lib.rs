#![doc = include_str!("../README.md")]

#[cfg(feature = "client")]
pub mod api;
pub mod cart;
#[cfg(feature = "client")]
pub mod config;
#[cfg(feature = "client")]
pub mod credentials;
#[cfg(feature = "client")]
mod envelope;
pub mod error;
#[cfg(feature = "client")]
pub mod session;
pub mod types;

// Re-exports for convenient access
#[cfg(feature = "client")]
pub use api::{
    ApiClient, CheckoutDetails, LoginOutcome, NewAccount, Order, OrderItem, OrderStatus,
    Profile, ProfileUpdate, TestResult,
};
pub use cart::{Cart, CartConfig, CartItem, CartPersistence, CartStore, FilePersistence, MemoryPersistence};
#[cfg(feature = "client")]
pub use config::{Endpoints, SessionConfig};
#[cfg(feature = "client")]
pub use credentials::{
    CookieOptions, CredentialName, CredentialStore, JarCredentialStore, MemoryCredentialStore,
};
pub use error::Error;
#[cfg(feature = "client")]
pub use session::SessionManager;
pub use types::{OrderId, TestId};
