//! # wablast-channels
//!
//! WhatsApp session access for wablast.

pub mod whatsapp;

pub use whatsapp::{BridgeEvent, SessionState, WhatsAppBridge};
