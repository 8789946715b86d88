//! # wablast-store
//!
//! Persistence for wablast: the SQLite contact list and message log,
//! staged media files, and the dashboard settings file.

pub mod media;
pub mod settings;
pub mod store;

pub use media::MediaStager;
pub use settings::{Settings, SettingsFile};
pub use store::{Contact, ContactResult, NewContact, Store};
