//! Session orchestration engine.

pub(crate) mod constants;
mod engine;
mod runtime;

pub mod config;
pub mod types;

pub use config::{ConfigUpdate, ResponseModality, SessionConfig};
pub use runtime::SessionHandle;
pub use types::{AudioChunk, InboundEvent, NoticeLevel, SessionNotice, SessionUpdate};

pub(crate) use engine::SessionEngine;
pub(crate) use runtime::spawn_session;
