//! `certgen`: certificates from a JSON configuration
//!
//! The configuration names the settings option file, the media library, a
//! JSON directory of users and badges, the storage root and the fonts. See
//! [`config::Config`].

pub mod cli;
pub mod config;
pub mod directory;
pub mod outbox;

pub use cli::{execute, run, Args, Command};
pub use config::Config;
pub use directory::JsonDirectory;
pub use outbox::{ConfiguredNonce, OutboxMailer};
