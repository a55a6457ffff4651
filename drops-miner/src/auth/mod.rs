//! Login lifecycle around the device-code controller: persistence of the
//! obtained token, restore at startup and logout.

mod service;

pub use service::{AuthStatus, LoginService};
