//! The mining loop: pick a game, keep a stream, register watch time.

mod catalog;
mod config;
mod service;
mod session;

pub use catalog::{DropProgressHook, NoopDropProgress, SessionAgeStaleness, StalenessPolicy, StreamCatalog};
pub use config::MinerConfig;
pub use service::Miner;
pub use session::WatchSession;
