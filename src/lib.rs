//! Voicelink Core Library
//!
//! This crate provides the core functionality for the Voicelink daemon:
//! credential rotation, audio device pipelines, the live endpoint
//! abstraction, session orchestration, and telemetry.

pub mod audio;
pub mod credentials;
pub mod endpoint;
pub mod orchestrator;
pub mod session;
pub mod telemetry;
