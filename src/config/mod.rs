//! Configuration management for voicenote.
//!
//! Settings live in a TOML file in the user's config directory. Every field
//! has a default, so a missing or partial file is valid.

pub mod file;

pub use file::{config_path, VoicenoteConfig};
