//! Curator - Rust backend for a personal media library manager
//!
//! The heart of the crate is the background task engine ([`tasks`]): a
//! process-wide [`tasks::TaskManager`] routing work onto three pools (one
//! exclusive slot for main library operations, FIFO pools for background and
//! probe work) and the atomic artwork acquisition protocol
//! ([`tasks::ArtworkFetchJob`]) that downloads assets into a staged file and
//! swaps them into place so the library never holds a half-written image.

pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod fsops;
pub mod media;
pub mod messages;
pub mod tasks;

pub use config::Config;
pub use error::TaskError;
pub use messages::{Message, MessageLevel, MessageSink};
pub use tasks::{Task, TaskKind, TaskManager};
