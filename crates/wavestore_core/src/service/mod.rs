//! Core use-case services.
//!
//! # Responsibility
//! - Express window/workspace/tab/block use-cases over the store accessors.
//! - Give request handlers one atomic entry point per use-case.

pub mod domain;
pub mod wave_service;

pub use wave_service::WaveService;
