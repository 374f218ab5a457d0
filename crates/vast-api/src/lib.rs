//! # Vast API
//!
//! HTTP API client for the Vast.ai marketplace.
//! This crate provides the low-level REST client, a typed SDK facade and
//! the static table of commands both of them serve.

pub mod client;
pub mod errors;
pub mod sdk;

// Re-export common types for convenience
pub use client::*;
pub use errors::*;
pub use sdk::*;

// Re-export core types that API consumers will need
pub use vast_core::{
    ActionResponse, CreateInstanceRequest, DefJobRequest, FilterQuery, InvoiceSummary,
    ListMachineRequest, OfferType, QueryCompiler, Result as CoreResult, RunType,
};
