//! streamsub-lib: build submission and monitoring for a remote stream-processing build service
//!
//! This crate provides the engine behind the `streamsub` CLI:
//! - `archive`: packs an application directory (and toolkits) into a source archive
//! - `credentials`: resolves service credentials and exchanges them for a token
//! - `client`: the remote build service operations
//! - `poll`: follows a build to completion, tracking its output
//! - `recovery`: starts a dormant service and replays the failed operation
//! - `artifacts`: downloads bundles or starts jobs from them
//! - `engine`: top-level operations wiring the above together

pub mod archive;
pub mod artifacts;
pub mod client;
pub mod config;
pub mod consts;
pub mod credentials;
pub mod engine;
pub mod handler;
pub mod lint;
pub mod poll;
pub mod recovery;
pub mod spl;
pub mod types;

#[cfg(test)]
mod util;
