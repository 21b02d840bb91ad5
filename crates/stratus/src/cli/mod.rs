//! CLI module for the Stratus broker
//!
//! - [`config`]: config file discovery and flag overrides
//! - [`request`]: reading a request document from a file or stdin
//! - [`output`]: JSON rendering of replies and errors
//! - [`dispatch`]: running one verb against a broker

pub mod config;
pub mod dispatch;
pub mod output;
pub mod request;

pub use dispatch::{execute, Verb};
