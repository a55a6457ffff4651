//! Domain models shared by the store, the miner and the API.

pub mod game;
pub mod settings;
pub mod status;

pub use game::{DropRecord, Game, StreamHandle, slugify};
pub use settings::{AuthRecord, Settings};
pub use status::{LogEvent, LogLevel, StatusSnapshot};
