//! # vast-rs
//!
//! Command-line client and SDK for the Vast.ai GPU rental marketplace.
//!
//! The workspace is split the same way the binary uses it:
//! - [`vast_core`]: filter expression compiler, field tables and request models
//! - [`vast_utils`]: table cell formatting, argument parsers, bounded retry pool
//! - [`vast_api`]: REST client and the typed [`VastAi`] SDK
//! - [`vast_cli`]: the `vast` command tree
//!
//! ```no_run
//! # async fn demo() -> Result<(), vast_rs::ApiError> {
//! use vast_rs::{SearchOffers, VastAi};
//!
//! let vast = VastAi::from_env()?;
//! let params = SearchOffers {
//!     query: "num_gpus>=2 reliability>0.99".to_string(),
//!     ..Default::default()
//! };
//! for offer in vast.search_offers(&params).await? {
//!     println!("{}", offer["id"]);
//! }
//! # Ok(())
//! # }
//! ```

pub use vast_api::{
    ApiError, BatchReport, CommandSpec, SearchOffers, VastAi, VastApiClient, COMMANDS,
};
pub use vast_core::{FieldTable, FilterQuery, OfferType, QueryCompiler, QueryError};
pub use vast_utils::RetryPolicy;
