//! Typed SDK facade over [`VastApiClient`].
//!
//! Every CLI command has an entry in [`COMMANDS`]; [`VastAi::dispatch`] maps a
//! method name plus JSON parameters onto the matching typed method.

use crate::client::VastApiClient;
use crate::errors::{ApiError, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use vast_core::{
    parse_order, ActionResponse, CreateInstanceRequest, DefJobRequest, FilterQuery,
    InvoiceSummary, ListMachineRequest, OfferType, QueryCompiler, SearchRequest,
};
use vast_utils::{run_bounded, RetryPolicy};

pub const LOGIN_DEPRECATED: &str = "\
login via the command line is no longer supported.
go to https://vast.ai/console/cli in a web browser to get your api key, then run:

    vast set api-key YOUR_API_KEY_HERE";

/// One command of the CLI surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSpec {
    /// Words typed on the command line, e.g. `show instances`
    pub name: &'static str,
    /// SDK method name, e.g. `show_instances`
    pub method: &'static str,
    /// Parameters that must be present for [`VastAi::dispatch`]
    pub required: &'static [&'static str],
    pub summary: &'static str,
    /// Handled by the CLI alone; the SDK cannot dispatch it.
    pub local: bool,
}

const fn command(
    name: &'static str,
    method: &'static str,
    required: &'static [&'static str],
    summary: &'static str,
) -> CommandSpec {
    CommandSpec {
        name,
        method,
        required,
        summary,
        local: false,
    }
}

const fn local(name: &'static str, method: &'static str, summary: &'static str) -> CommandSpec {
    CommandSpec {
        name,
        method,
        required: &[],
        summary,
        local: true,
    }
}

pub static COMMANDS: &[CommandSpec] = &[
    command("search offers", "search_offers", &[], "Search for instance types using custom query"),
    command("show instances", "show_instances", &[], "Display user's current instances"),
    command("show machines", "show_machines", &[], "Show hosted machines"),
    command("show invoices", "show_invoices", &[], "Show billing history"),
    command("show user", "show_user", &[], "Get current user data"),
    command("ssh-url", "ssh_url", &[], "ssh url helper"),
    command("scp-url", "scp_url", &[], "scp url helper"),
    command("create instance", "create_instance", &["id"], "Create a new instance"),
    command("start instance", "start_instance", &["id"], "Start a stopped instance"),
    command("stop instance", "stop_instance", &["id"], "Stop a running instance"),
    command("start instances", "start_instances", &["ids"], "Start a list of stopped instances"),
    command("stop instances", "stop_instances", &["ids"], "Stop a list of running instances"),
    command("label instance", "label_instance", &["id", "label"], "Assign a string label to an instance"),
    command("destroy instance", "destroy_instance", &["id"], "Destroy an instance (irreversible, deletes data)"),
    command("destroy instances", "destroy_instances", &["ids"], "Destroy a list of instances (irreversible, deletes data)"),
    command("change bid", "change_bid", &["id"], "Change the bid price for a spot/interruptible instance"),
    command("list machine", "list_machine", &["id"], "[Host] list a machine for rent"),
    command("unlist machine", "unlist_machine", &["id"], "[Host] Unlist a listed machine"),
    command("set defjob", "set_defjob", &["id"], "[Host] Create default jobs for a machine"),
    command("remove defjob", "remove_defjob", &["id"], "[Host] Delete default jobs"),
    command("set min-bid", "set_min_bid", &["id"], "[Host] Set the minimum bid/rental price for a machine"),
    local("set api-key", "set_api_key", "Set api-key (get your api-key from the console/CLI)"),
    local("create account", "create_account", "Deprecated, use the web console"),
    local("login", "login", "Deprecated, use the web console"),
];

pub fn find_command(method: &str) -> Option<&'static CommandSpec> {
    COMMANDS.iter().find(|spec| spec.method == method)
}

/// Parameters of `search offers`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOffers {
    /// Filter expression, e.g. `num_gpus>=2 reliability>0.99`
    pub query: String,
    #[serde(rename = "type")]
    pub offer_type: OfferType,
    /// Skip the `verified rentable !external` seed
    pub no_default: bool,
    pub disable_bundling: bool,
    /// GiB of storage used for pricing
    pub storage: f64,
    /// Comma separated sort fields, `-` suffix for descending
    pub order: String,
}

impl Default for SearchOffers {
    fn default() -> Self {
        Self {
            query: String::new(),
            offer_type: OfferType::OnDemand,
            no_default: false,
            disable_bundling: false,
            storage: 5.0,
            order: "score-".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct IdParam {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct IdsParam {
    ids: Vec<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct InstanceSelector {
    #[serde(default)]
    id: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct LabelParams {
    id: u64,
    label: String,
}

#[derive(Debug, Deserialize)]
struct PriceParams {
    id: u64,
    #[serde(default)]
    price: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct CreateInstanceParams {
    id: u64,
    #[serde(flatten)]
    request: CreateInstanceRequest,
}

/// Per-instance result of a batch start, stop or destroy.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub succeeded: Vec<u64>,
    pub failed: Vec<(u64, String)>,
}

#[derive(Debug, Clone, Copy)]
enum BatchAction {
    Start,
    Stop,
    Destroy,
}

/// Main SDK struct for Vast
pub struct VastAi {
    client: VastApiClient,
    compiler: QueryCompiler,
    batch: RetryPolicy,
}

impl VastAi {
    /// Create new VastAi instance with API key
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ApiError::Config("API key is required".to_string()));
        }
        Ok(Self::with_client(VastApiClient::new(Some(api_key), None)))
    }

    /// Create from environment variable
    pub fn from_env() -> Result<Self> {
        Ok(Self::with_client(VastApiClient::from_env()?))
    }

    pub fn with_client(client: VastApiClient) -> Self {
        Self {
            client,
            compiler: QueryCompiler::offers(),
            batch: RetryPolicy::default(),
        }
    }

    pub fn with_batch_policy(mut self, policy: RetryPolicy) -> Self {
        self.batch = policy;
        self
    }

    pub fn client(&self) -> &VastApiClient {
        &self.client
    }

    /// Compile the search parameters into the request body, returning the
    /// unrecognized-field warnings alongside.
    pub fn build_search(&self, params: &SearchOffers) -> Result<(SearchRequest, Vec<String>)> {
        let base = if params.no_default {
            FilterQuery::new()
        } else {
            FilterQuery::offer_defaults()
        };
        let compiled = self.compiler.compile(&params.query, base)?;

        let request = SearchRequest {
            query: compiled.query,
            order: parse_order(&params.order, self.compiler.fields()),
            offer_type: params.offer_type,
            allocated_storage: params.storage,
            disable_bundling: params.disable_bundling,
        };
        Ok((request, compiled.warnings))
    }

    pub async fn search_offers(&self, params: &SearchOffers) -> Result<Vec<Value>> {
        let (request, warnings) = self.build_search(params)?;
        for warning in &warnings {
            warn!("{}", warning);
        }
        self.client.search_offers(&request).await
    }

    pub async fn show_instances(&self) -> Result<Vec<Value>> {
        self.client.show_instances().await
    }

    pub async fn show_machines(&self) -> Result<Vec<Value>> {
        self.client.show_machines().await
    }

    pub async fn show_invoices(&self) -> Result<InvoiceSummary> {
        self.client.show_invoices().await
    }

    pub async fn show_user(&self) -> Result<Value> {
        self.client.show_user().await
    }

    /// `ssh://root@host:port` for instance `id`, or for the only instance.
    pub async fn ssh_url(&self, id: Option<u64>) -> Result<String> {
        self.connection_url(id, "ssh://").await
    }

    pub async fn scp_url(&self, id: Option<u64>) -> Result<String> {
        self.connection_url(id, "scp://").await
    }

    async fn connection_url(&self, id: Option<u64>, scheme: &str) -> Result<String> {
        let instances = self.client.show_instances().await?;
        let instance = select_instance(&instances, id)?;

        let host = instance
            .get("ssh_host")
            .and_then(Value::as_str)
            .ok_or_else(|| ApiError::NotFound("instance has no ssh_host".to_string()))?;
        let port = instance
            .get("ssh_port")
            .filter(|port| !port.is_null())
            .ok_or_else(|| ApiError::NotFound("instance has no ssh_port".to_string()))?;
        let port = port.as_str().map_or_else(|| port.to_string(), str::to_string);

        Ok(format!("{}root@{}:{}", scheme, host, port))
    }

    pub async fn create_instance(
        &self,
        id: u64,
        request: &CreateInstanceRequest,
    ) -> Result<ActionResponse> {
        self.client.create_instance(id, request).await
    }

    pub async fn start_instance(&self, id: u64) -> Result<ActionResponse> {
        self.client.start_instance(id).await
    }

    pub async fn stop_instance(&self, id: u64) -> Result<ActionResponse> {
        self.client.stop_instance(id).await
    }

    pub async fn label_instance(&self, id: u64, label: &str) -> Result<ActionResponse> {
        self.client.label_instance(id, label).await
    }

    pub async fn destroy_instance(&self, id: u64) -> Result<ActionResponse> {
        self.client.destroy_instance(id).await
    }

    /// Start several stopped instances through the bounded retry pool.
    pub async fn start_instances(&self, ids: Vec<u64>) -> BatchReport {
        self.run_batch(ids, BatchAction::Start).await
    }

    /// Stop several running instances through the bounded retry pool.
    pub async fn stop_instances(&self, ids: Vec<u64>) -> BatchReport {
        self.run_batch(ids, BatchAction::Stop).await
    }

    /// Destroy several instances through the bounded retry pool.
    pub async fn destroy_instances(&self, ids: Vec<u64>) -> BatchReport {
        self.run_batch(ids, BatchAction::Destroy).await
    }

    /// `success: false` replies count as failures, so the pool retries them.
    async fn run_batch(&self, ids: Vec<u64>, action: BatchAction) -> BatchReport {
        let client = &self.client;
        let outcomes = run_bounded(ids, self.batch, move |id| async move {
            let response = match action {
                BatchAction::Start => client.start_instance(id).await?,
                BatchAction::Stop => client.stop_instance(id).await?,
                BatchAction::Destroy => client.destroy_instance(id).await?,
            };
            if response.success {
                Ok(response)
            } else {
                Err(ApiError::Rejected(response.message().to_string()))
            }
        })
        .await;

        let mut report = BatchReport::default();
        for outcome in outcomes {
            match outcome.result {
                Ok(_) => report.succeeded.push(outcome.item),
                Err(e) => report.failed.push((outcome.item, e.to_string())),
            }
        }
        report.succeeded.sort_unstable();
        report.failed.sort_by_key(|(id, _)| *id);

        debug!(
            "Batch {:?}: {} succeeded, {} failed",
            action,
            report.succeeded.len(),
            report.failed.len()
        );
        report
    }

    pub async fn change_bid(&self, id: u64, price: Option<f64>) -> Result<ActionResponse> {
        self.client.change_bid(id, price).await
    }

    pub async fn list_machine(&self, request: &ListMachineRequest) -> Result<ActionResponse> {
        self.client.list_machine(request).await
    }

    pub async fn unlist_machine(&self, id: u64) -> Result<ActionResponse> {
        self.client.unlist_machine(id).await
    }

    pub async fn set_defjob(&self, request: &DefJobRequest) -> Result<ActionResponse> {
        self.client.set_defjob(request).await
    }

    pub async fn remove_defjob(&self, id: u64) -> Result<ActionResponse> {
        self.client.remove_defjob(id).await
    }

    pub async fn set_min_bid(&self, id: u64, price: Option<f64>) -> Result<ActionResponse> {
        self.client.set_min_bid(id, price).await
    }

    /// Run the command registered as `method` with JSON parameters.
    pub async fn dispatch(&self, method: &str, params: Value) -> Result<Value> {
        let spec = find_command(method)
            .ok_or_else(|| ApiError::InvalidArguments(format!("Unknown command: {}", method)))?;

        let params = match params {
            Value::Null => Value::Object(Map::new()),
            other => other,
        };
        check_required(spec, &params)?;
        debug!("Dispatching {} ({})", spec.method, spec.name);

        let result = match spec.method {
            "search_offers" => {
                let params: SearchOffers = serde_json::from_value(params)?;
                serde_json::to_value(self.search_offers(&params).await?)?
            }
            "show_instances" => serde_json::to_value(self.show_instances().await?)?,
            "show_machines" => serde_json::to_value(self.show_machines().await?)?,
            "show_invoices" => serde_json::to_value(self.show_invoices().await?)?,
            "show_user" => self.show_user().await?,
            "ssh_url" | "scp_url" => {
                let selector: InstanceSelector = serde_json::from_value(params)?;
                let url = if spec.method == "ssh_url" {
                    self.ssh_url(selector.id).await?
                } else {
                    self.scp_url(selector.id).await?
                };
                Value::String(url)
            }
            "create_instance" => {
                let params: CreateInstanceParams = serde_json::from_value(params)?;
                serde_json::to_value(self.create_instance(params.id, &params.request).await?)?
            }
            "start_instance" => {
                let IdParam { id } = serde_json::from_value(params)?;
                serde_json::to_value(self.start_instance(id).await?)?
            }
            "stop_instance" => {
                let IdParam { id } = serde_json::from_value(params)?;
                serde_json::to_value(self.stop_instance(id).await?)?
            }
            "label_instance" => {
                let LabelParams { id, label } = serde_json::from_value(params)?;
                serde_json::to_value(self.label_instance(id, &label).await?)?
            }
            "destroy_instance" => {
                let IdParam { id } = serde_json::from_value(params)?;
                serde_json::to_value(self.destroy_instance(id).await?)?
            }
            "start_instances" => {
                let IdsParam { ids } = serde_json::from_value(params)?;
                serde_json::to_value(self.start_instances(ids).await)?
            }
            "stop_instances" => {
                let IdsParam { ids } = serde_json::from_value(params)?;
                serde_json::to_value(self.stop_instances(ids).await)?
            }
            "destroy_instances" => {
                let IdsParam { ids } = serde_json::from_value(params)?;
                serde_json::to_value(self.destroy_instances(ids).await)?
            }
            "change_bid" => {
                let PriceParams { id, price } = serde_json::from_value(params)?;
                serde_json::to_value(self.change_bid(id, price).await?)?
            }
            "list_machine" => {
                let request: ListMachineRequest = serde_json::from_value(params)?;
                serde_json::to_value(self.list_machine(&request).await?)?
            }
            "unlist_machine" => {
                let IdParam { id } = serde_json::from_value(params)?;
                serde_json::to_value(self.unlist_machine(id).await?)?
            }
            "set_defjob" => {
                let request: DefJobRequest = serde_json::from_value(params)?;
                serde_json::to_value(self.set_defjob(&request).await?)?
            }
            "remove_defjob" => {
                let IdParam { id } = serde_json::from_value(params)?;
                serde_json::to_value(self.remove_defjob(id).await?)?
            }
            "set_min_bid" => {
                let PriceParams { id, price } = serde_json::from_value(params)?;
                serde_json::to_value(self.set_min_bid(id, price).await?)?
            }
            "create_account" | "login" => Value::String(LOGIN_DEPRECATED.to_string()),
            other => {
                return Err(ApiError::InvalidArguments(format!(
                    "{} is only available from the command line",
                    other
                )))
            }
        };

        Ok(result)
    }
}

fn check_required(spec: &CommandSpec, params: &Value) -> Result<()> {
    let missing: Vec<&str> = spec
        .required
        .iter()
        .copied()
        .filter(|name| params.get(*name).map_or(true, Value::is_null))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ApiError::InvalidArguments(format!(
            "Missing required arguments for {}: {}",
            spec.method,
            missing.join(", ")
        )))
    }
}

fn select_instance(instances: &[Value], id: Option<u64>) -> Result<&Value> {
    match id {
        Some(id) => instances
            .iter()
            .find(|instance| instance.get("id").and_then(Value::as_u64) == Some(id))
            .ok_or_else(|| ApiError::NotFound(format!("instance {}", id))),
        None => match instances {
            [only] => Ok(only),
            [] => Err(ApiError::NotFound("no running instances".to_string())),
            _ => Err(ApiError::InvalidArguments(
                "Found multiple running instances".to_string(),
            )),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;
    use std::collections::HashSet;
    use std::time::Duration;

    fn sdk_for(server: &MockServer) -> VastAi {
        let client = VastApiClient::new(Some("k3y".to_string()), Some(server.base_url()))
            .with_backoff(Duration::from_millis(1));
        VastAi::with_client(client).with_batch_policy(RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(1),
            concurrency: 4,
        })
    }

    #[test]
    fn test_api_key_required() {
        assert!(matches!(VastAi::new("  "), Err(ApiError::Config(_))));
        assert!(VastAi::new("abc").is_ok());
    }

    #[test]
    fn test_command_table_is_consistent() {
        let mut names = HashSet::new();
        let mut methods = HashSet::new();
        for spec in COMMANDS {
            assert!(names.insert(spec.name), "duplicate name {}", spec.name);
            assert!(methods.insert(spec.method), "duplicate method {}", spec.method);
            assert_eq!(spec.name.replace([' ', '-'], "_"), spec.method);
        }
        assert!(find_command("show_instances").is_some());
        assert!(find_command("generate_pdf_invoices").is_none());
    }

    #[test]
    fn test_build_search_defaults() {
        let sdk = VastAi::new("abc").unwrap();
        let (request, warnings) = sdk.build_search(&SearchOffers::default()).unwrap();

        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["verified"], json!({"eq": true}));
        assert_eq!(body["order"], json!([["score", "desc"]]));
        assert_eq!(body["type"], json!("on-demand"));
        assert_eq!(body["allocated_storage"], json!(5.0));
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_build_search_no_default_and_warnings() {
        let sdk = VastAi::new("abc").unwrap();
        let params = SearchOffers {
            query: "num_gpus=2 made_up=1".to_string(),
            no_default: true,
            offer_type: OfferType::Bid,
            ..Default::default()
        };
        let (request, warnings) = sdk.build_search(&params).unwrap();

        assert!(!request.query.contains_field("verified"));
        assert!(request.query.contains_field("num_gpus"));
        assert_eq!(request.offer_type, OfferType::Bid);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_build_search_rejects_bad_query() {
        let sdk = VastAi::new("abc").unwrap();
        let params = SearchOffers {
            query: "foo>bar<baz".to_string(),
            ..Default::default()
        };

        assert!(matches!(sdk.build_search(&params), Err(ApiError::Query(_))));
    }

    #[test]
    fn test_select_instance() {
        let rows = vec![json!({"id": 1}), json!({"id": 2})];

        assert_eq!(select_instance(&rows, Some(2)).unwrap()["id"], 2);
        assert!(matches!(select_instance(&rows, Some(3)), Err(ApiError::NotFound(_))));
        assert!(matches!(select_instance(&rows, None), Err(ApiError::InvalidArguments(_))));
        assert!(matches!(select_instance(&[], None), Err(ApiError::NotFound(_))));
        assert_eq!(select_instance(&rows[..1], None).unwrap()["id"], 1);
    }

    #[tokio::test]
    async fn test_ssh_and_scp_urls() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/instances");
                then.status(200).json_body(json!({"instances": [
                    {"id": 5, "ssh_host": "ssh4.vast.ai", "ssh_port": 31022}
                ]}));
            })
            .await;

        let sdk = sdk_for(&server);
        assert_eq!(sdk.ssh_url(None).await.unwrap(), "ssh://root@ssh4.vast.ai:31022");
        assert_eq!(sdk.scp_url(Some(5)).await.unwrap(), "scp://root@ssh4.vast.ai:31022");
    }

    #[tokio::test]
    async fn test_dispatch_missing_arguments() {
        let sdk = VastAi::new("abc").unwrap();

        let err = sdk.dispatch("label_instance", json!({"id": 3})).await.unwrap_err();
        match err {
            ApiError::InvalidArguments(msg) => assert!(msg.contains("label")),
            other => panic!("unexpected error: {:?}", other),
        }

        assert!(sdk.dispatch("no_such_command", Value::Null).await.is_err());
        assert!(sdk.dispatch("set_api_key", Value::Null).await.is_err());
    }

    #[tokio::test]
    async fn test_dispatch_login_is_local_notice() {
        let sdk = VastAi::new("abc").unwrap();
        let notice = sdk.dispatch("login", Value::Null).await.unwrap();

        assert_eq!(notice, Value::String(LOGIN_DEPRECATED.to_string()));
    }

    #[tokio::test]
    async fn test_dispatch_start_instance() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/instances/11/")
                    .json_body(json!({"state": "running"}));
                then.status(200).json_body(json!({"success": true}));
            })
            .await;

        let result = sdk_for(&server)
            .dispatch("start_instance", json!({"id": 11}))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(result["success"], json!(true));
    }

    #[tokio::test]
    async fn test_destroy_instances_reports_each_id() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(DELETE).path("/instances/1/");
                then.status(200).json_body(json!({"success": true}));
            })
            .await;
        let refused = server
            .mock_async(|when, then| {
                when.method(DELETE).path("/instances/2/");
                then.status(200).json_body(json!({"success": false, "msg": "already gone"}));
            })
            .await;

        let report = sdk_for(&server).destroy_instances(vec![2, 1]).await;

        assert_eq!(report.succeeded, vec![1]);
        assert_eq!(report.failed, vec![(2, "already gone".to_string())]);
        refused.assert_hits_async(2).await;
    }

    #[tokio::test]
    async fn test_start_instances_reports_each_id() {
        let server = MockServer::start_async().await;
        let started = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/instances/3/")
                    .json_body(json!({"state": "running"}));
                then.status(200).json_body(json!({"success": true}));
            })
            .await;
        let refused = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/instances/4/")
                    .json_body(json!({"state": "running"}));
                then.status(200).json_body(json!({"success": false, "msg": "no gpus available"}));
            })
            .await;

        let report = sdk_for(&server).start_instances(vec![4, 3]).await;

        assert_eq!(report.succeeded, vec![3]);
        assert_eq!(report.failed, vec![(4, "no gpus available".to_string())]);
        started.assert_async().await;
        refused.assert_hits_async(2).await;
    }

    #[tokio::test]
    async fn test_dispatch_stop_instances() {
        let server = MockServer::start_async().await;
        let stopped = server
            .mock_async(|when, then| {
                when.method(PUT).json_body(json!({"state": "stopped"}));
                then.status(200).json_body(json!({"success": true}));
            })
            .await;

        let value = sdk_for(&server)
            .dispatch("stop_instances", json!({"ids": [5, 6]}))
            .await
            .unwrap();

        assert_eq!(value, json!({"succeeded": [5, 6], "failed": []}));
        stopped.assert_hits_async(2).await;
    }
}
