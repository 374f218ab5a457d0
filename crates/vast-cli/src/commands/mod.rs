pub mod account;
pub mod instance;
pub mod machine;
pub mod search;
pub mod show;
pub mod ssh;

use crate::config::Config;
use crate::display::{print_json, print_success};
use crate::{CliError, Result};
use vast_api::{ActionResponse, VastAi, VastApiClient};

/// State shared by every command handler
pub struct Context {
    pub config: Config,
    /// `--raw`: print JSON instead of tables and messages
    pub raw: bool,
}

impl Context {
    pub fn new(config: Config, raw: bool) -> Self {
        Self { config, raw }
    }

    pub fn sdk(&self) -> Result<VastAi> {
        let client = VastApiClient::from_config(&self.config)?;
        Ok(VastAi::with_client(client))
    }

    /// Print the outcome of a mutating call.
    ///
    /// A response with `success: false` becomes an error carrying the
    /// server's `msg`, so the process exits non-zero.
    pub fn report(&self, response: &ActionResponse, success_message: &str) -> Result<()> {
        if self.raw {
            print_json(response)?;
        } else if response.success {
            print_success(success_message);
        }

        if response.success {
            Ok(())
        } else {
            Err(CliError::OperationFailed(response.message().to_string()))
        }
    }

    /// For endpoints whose reply carries no `success` flag: a 2xx status
    /// already means the change was accepted.
    pub fn report_accepted(&self, response: &ActionResponse, message: &str) -> Result<()> {
        if self.raw {
            print_json(response)
        } else {
            print_success(message);
            Ok(())
        }
    }
}
