use crate::errors::{Result, VastError};
use crate::order::SortKey;
use crate::query::FilterQuery;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Pricing model of an offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OfferType {
    #[default]
    #[serde(rename = "on-demand")]
    OnDemand,
    /// Interruptible instances rented through bidding.
    #[serde(rename = "bid", alias = "interruptible")]
    Bid,
}

impl FromStr for OfferType {
    type Err = VastError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "on-demand" => Ok(OfferType::OnDemand),
            // `interruptible` is accepted for backwards compatibility
            "bid" | "interruptible" => Ok(OfferType::Bid),
            other => Err(VastError::InvalidInput(format!(
                "Unknown offer type '{}'. Use 'on-demand' or 'bid'",
                other
            ))),
        }
    }
}

impl fmt::Display for OfferType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OfferType::OnDemand => f.write_str("on-demand"),
            OfferType::Bid => f.write_str("bid"),
        }
    }
}

/// The `q` object sent to the offer search endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchRequest {
    #[serde(flatten)]
    pub query: FilterQuery,
    pub order: Vec<SortKey>,
    #[serde(rename = "type")]
    pub offer_type: OfferType,
    /// Storage in GiB used when pricing the offers.
    pub allocated_storage: f64,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub disable_bundling: bool,
}

/// How a new instance is launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunType {
    #[default]
    Ssh,
    Jupyter,
    Args,
}

impl RunType {
    /// Pick the run type from the launch flags. Jupyter cannot be combined
    /// with explicit container arguments.
    pub fn select(has_args: bool, jupyter: bool) -> Result<Self> {
        match (has_args, jupyter) {
            (true, true) => Err(VastError::ValidationFailed(
                "Can't use --jupyter and --args together. Try --onstart or --onstart-cmd instead of --args."
                    .to_string(),
            )),
            (true, false) => Ok(RunType::Args),
            (false, true) => Ok(RunType::Jupyter),
            (false, false) => Ok(RunType::Ssh),
        }
    }
}

/// Body of `PUT /asks/{id}/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateInstanceRequest {
    pub client_id: String,
    pub image: Option<String>,
    pub env: BTreeMap<String, String>,
    pub price: Option<f64>,
    /// Local disk size in GB.
    pub disk: f64,
    pub label: Option<String>,
    pub extra: Option<String>,
    pub onstart: Option<String>,
    pub runtype: RunType,
    pub image_login: Option<String>,
    pub python_utf8: bool,
    pub lang_utf8: bool,
    pub use_jupyter_lab: bool,
    pub jupyter_dir: Option<String>,
    pub create_from: Option<String>,
    pub force: bool,
    pub args: Option<Vec<String>>,
}

impl Default for CreateInstanceRequest {
    fn default() -> Self {
        Self {
            client_id: "me".to_string(),
            image: None,
            env: BTreeMap::new(),
            price: None,
            disk: 10.0,
            label: None,
            extra: None,
            onstart: None,
            runtype: RunType::Ssh,
            image_login: None,
            python_utf8: false,
            lang_utf8: false,
            use_jupyter_lab: false,
            jupyter_dir: None,
            create_from: None,
            force: false,
            args: None,
        }
    }
}

/// Body of `PUT /machines/create_asks/`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListMachineRequest {
    #[serde(alias = "id")]
    pub machine: u64,
    pub price_gpu: Option<f64>,
    pub price_disk: Option<f64>,
    pub price_inetu: Option<f64>,
    pub price_inetd: Option<f64>,
    pub min_chunk: Option<u32>,
    /// Unix timestamp the offer stays available until.
    pub end_date: Option<i64>,
}

/// Body of `PUT /machines/create_bids/`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DefJobRequest {
    #[serde(alias = "id")]
    pub machine: u64,
    pub price_gpu: Option<f64>,
    pub price_inetu: Option<f64>,
    pub price_inetd: Option<f64>,
    pub image: Option<String>,
    pub args: Option<Vec<String>>,
}

/// Bid or minimum-bid price change. `None` lets the server pick a winning price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceChange {
    pub client_id: String,
    pub price: Option<f64>,
}

impl PriceChange {
    pub fn new(price: Option<f64>) -> Self {
        Self {
            client_id: "me".to_string(),
            price,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceState {
    Running,
    Stopped,
}

/// Body of `PUT /instances/{id}/`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum InstanceUpdate {
    State { state: InstanceState },
    Label { label: String },
}

/// Reply of `GET /users/me/invoices`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvoiceSummary {
    #[serde(default)]
    pub invoices: Vec<Value>,
    /// Charges accrued since the last invoice.
    #[serde(default)]
    pub current: Value,
}

/// Reply shape shared by the mutating endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ActionResponse {
    pub fn message(&self) -> &str {
        self.msg.as_deref().unwrap_or("(no detail message supplied)")
    }
}
