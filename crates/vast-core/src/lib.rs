//! # Vast Core
//!
//! Core domain logic for the Vast.ai marketplace client.
//!
//! This crate contains pure logic with no I/O dependencies:
//! - The filter expression compiler and its field tables
//! - Sort order parsing
//! - Request and response models
//! - Error definitions
//!
//! ## Design Principles
//!
//! - **Pure Functions**: No side effects, easy to test
//! - **Dependency-Free**: No I/O, networking, or persistence dependencies
//! - **Composable**: Field tables are plain values, one per endpoint

pub mod errors;
pub mod fields;
pub mod models;
pub mod order;
pub mod query;

// Re-export commonly used types
pub use errors::{QueryError, Result, VastError};
pub use fields::FieldTable;
pub use models::{
    ActionResponse, CreateInstanceRequest, DefJobRequest, InstanceState, InstanceUpdate,
    InvoiceSummary, ListMachineRequest, OfferType, PriceChange, RunType, SearchRequest,
};
pub use order::{parse_order, Direction, SortKey};
pub use query::{Compiled, Constraints, FilterQuery, Operator, QueryCompiler};
