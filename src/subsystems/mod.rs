//! Subsystem modules for the kata bot.

pub mod admin;
pub mod comms;
#[cfg(feature = "moderation")]
pub mod moderation;
pub mod runtime;
