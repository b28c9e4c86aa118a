//! Koyeb Client
//!
//! reqwest-based implementation of [`koyeb_core::api::KoyebApi`] plus the
//! write endpoints used by the provider.

pub mod client;
pub mod config;
pub mod models;

pub use client::KoyebClient;
pub use config::ClientConfig;
