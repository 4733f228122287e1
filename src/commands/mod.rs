//! Subcommand implementations
//!
//! Each command has a thin `run` that wires the [`Context`](crate::Context)
//! and an inner function over a [`Session`](crate::session::Session) and
//! [`Resolver`](appconfig::Resolver) that the tests drive directly.

pub mod config;
pub mod connections;
pub mod load_config;
pub mod rai;
pub mod search;
pub mod seed;
