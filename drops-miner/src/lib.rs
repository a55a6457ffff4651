//! Keeps a Twitch viewing session alive so time-based drops accrue without
//! anyone at the keyboard.
//!
//! The platform side lives in the `twitch-gql` crate. This crate adds the
//! store, the mining loop, status/log fan-out and the HTTP API around it.

pub mod api;
pub mod auth;
pub mod broadcast;
pub mod config;
pub mod domain;
pub mod error;
pub mod journal;
pub mod logging;
pub mod miner;
pub mod services;
pub mod store;

pub use error::{Error, Result};
