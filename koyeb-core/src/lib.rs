//! Koyeb Core
//!
//! Core library for the Koyeb provider: the resource/state model, the
//! provider trait, the API capability the provider is built on, and the two
//! pieces of logic every resource shares:
//!
//! - `idmapper` - resolve names and `app/service` slugs to object IDs
//! - `waiter` - poll an object until it reaches a status or disappears

pub mod api;
pub mod idmapper;
pub mod provider;
pub mod resource;
pub mod waiter;

pub use idmapper::{Mapper, MapperError, ResourceKind};
pub use waiter::{WaitError, WaitOptions, wait_for_status};
