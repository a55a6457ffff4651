//! Twitch platform client used by the drops miner.
//!
//! Covers the OAuth device-code login, the authenticated GraphQL transport
//! (persisted queries only) and the typed catalog calls built on top of it.

pub mod auth;
pub mod catalog;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod operations;
pub mod session;

pub use auth::{AuthController, DeviceAuthFailure, PollStatus, TokenGrant};
pub use catalog::CatalogClient;
pub use client::TransportClient;
pub use config::TwitchConfig;
pub use error::{Error, Result};
pub use models::{DeviceCode, StreamNode, TokenValidation};
pub use operations::GqlOperation;
pub use session::{AuthSession, AuthState};
