//! LLM provider abstraction for tether.
//!
//! Wraps the local providers behind a [`Provider`] enum with capability
//! dispatch. Chat requests stream through a dedicated worker task into a
//! bounded chunk pipe; the OpenAI-compatible path additionally reassembles
//! tool-call deltas so downstream code sees one batch shape regardless of
//! provider.

mod accumulate;
mod capabilities;
mod chunk;
mod client;
mod kind;
mod listing;
mod options;
mod resolve;

pub use capabilities::{capabilities_for, ConfigField, FieldKind, ProviderCapabilities};
#[allow(unused_imports)]
pub use capabilities::{all as all_providers, lookup as lookup_provider};
pub use chunk::{chunk_pipe, ChunkReceiver, ChunkSender, StreamChunk, StreamEnd};
pub use client::{Provider, ProviderError};
pub use kind::{default_model_for, ProviderKind};
pub use listing::list_models;
pub use options::{ChatOptions, ResponseFormat};
pub use resolve::{resolve_model, ModelSelection};
