//! cz-pane library.
//!
//! This module exposes the internal modules for testing.

pub mod config;
pub mod direct;
pub mod driver;
pub mod embedded;
pub mod error;
pub mod logging;
pub mod message;
pub mod questionnaire;
pub mod terminal;
pub mod watch;
