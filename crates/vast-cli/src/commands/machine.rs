use super::Context;
use crate::{CliError, Result};
use chrono::{NaiveDate, NaiveTime};
use clap::Args;
use vast_api::{DefJobRequest, ListMachineRequest};

#[derive(Args, Debug)]
pub struct MachineIdArgs {
    /// Machine id
    pub id: u64,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Id of machine to list
    pub id: u64,

    /// Per gpu rental price in $/hour (price for active instances)
    #[arg(short = 'g', long)]
    pub price_gpu: Option<f64>,

    /// Storage price in $/GB/month (price for inactive instances)
    #[arg(short = 's', long)]
    pub price_disk: Option<f64>,

    /// Price for internet upload bandwidth in $/GB
    #[arg(short = 'u', long)]
    pub price_inetu: Option<f64>,

    /// Price for internet download bandwidth in $/GB
    #[arg(short = 'd', long)]
    pub price_inetd: Option<f64>,

    /// Minimum amount of gpus
    #[arg(short = 'm', long)]
    pub min_chunk: Option<u32>,

    /// Available until: unix timestamp or YYYY-MM-DD
    #[arg(short = 'e', long)]
    pub end_date: Option<String>,
}

impl ListArgs {
    pub fn to_request(&self) -> Result<ListMachineRequest> {
        let end_date = self.end_date.as_deref().map(parse_end_date).transpose()?;
        Ok(ListMachineRequest {
            machine: self.id,
            price_gpu: self.price_gpu,
            price_disk: self.price_disk,
            price_inetu: self.price_inetu,
            price_inetd: self.price_inetd,
            min_chunk: self.min_chunk,
            end_date,
        })
    }
}

#[derive(Args, Debug)]
pub struct DefJobArgs {
    /// Id of machine to launch default instance on
    pub id: u64,

    /// Per gpu rental price in $/hour
    #[arg(long)]
    pub price_gpu: Option<f64>,

    /// Price for internet upload bandwidth in $/GB
    #[arg(long)]
    pub price_inetu: Option<f64>,

    /// Price for internet download bandwidth in $/GB
    #[arg(long)]
    pub price_inetd: Option<f64>,

    /// Docker container image to launch
    #[arg(long)]
    pub image: Option<String>,

    /// Arguments passed to container launch
    #[arg(long, num_args = 1.., allow_hyphen_values = true)]
    pub args: Option<Vec<String>>,
}

#[derive(Args, Debug)]
#[command(after_help = "Change the current min bid price of machine ID to PRICE.")]
pub struct MinBidArgs {
    /// Id of machine to set min bid price for
    pub id: u64,
    /// Per gpu min bid price in $/hour
    #[arg(long)]
    pub price: Option<f64>,
}

/// Accept a unix timestamp or a calendar date (midnight UTC).
fn parse_end_date(input: &str) -> Result<i64> {
    let input = input.trim();
    if let Ok(timestamp) = input.parse::<i64>() {
        return Ok(timestamp);
    }

    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .map(|date| date.and_time(NaiveTime::MIN).and_utc().timestamp())
        .map_err(|_| {
            CliError::InvalidInput(format!(
                "Invalid end date '{}': expected a unix timestamp or YYYY-MM-DD",
                input
            ))
        })
}

fn or_default<T: ToString>(value: Option<T>, default: &str) -> String {
    value.map_or_else(|| default.to_string(), |v| v.to_string())
}

pub async fn handle_list(args: ListArgs, ctx: &Context) -> Result<()> {
    let request = args.to_request()?;
    let response = ctx.sdk()?.list_machine(&request).await?;

    let message = format!(
        "offers created for machine {}, @ ${}/gpu/hour, ${}/GB up, ${}/GB down, {}/min gpus, till {}",
        request.machine,
        or_default(request.price_gpu, "def"),
        or_default(request.price_inetu, "def"),
        or_default(request.price_inetd, "def"),
        or_default(request.min_chunk, "def"),
        or_default(request.end_date, "forever"),
    );
    ctx.report(&response, &message)
}

pub async fn handle_unlist(args: MachineIdArgs, ctx: &Context) -> Result<()> {
    let response = ctx.sdk()?.unlist_machine(args.id).await?;
    ctx.report(
        &response,
        &format!("all offers for machine {} removed, machine delisted.", args.id),
    )
}

pub async fn handle_set_defjob(args: DefJobArgs, ctx: &Context) -> Result<()> {
    let request = DefJobRequest {
        machine: args.id,
        price_gpu: args.price_gpu,
        price_inetu: args.price_inetu,
        price_inetd: args.price_inetd,
        image: args.image,
        args: args.args,
    };
    let response = ctx.sdk()?.set_defjob(&request).await?;

    let message = format!(
        "bids created for machine {}, @ ${}/gpu/hour, ${}/GB up, ${}/GB down",
        request.machine,
        or_default(request.price_gpu, "def"),
        or_default(request.price_inetu, "def"),
        or_default(request.price_inetd, "def"),
    );
    ctx.report(&response, &message)
}

pub async fn handle_remove_defjob(args: MachineIdArgs, ctx: &Context) -> Result<()> {
    let response = ctx.sdk()?.remove_defjob(args.id).await?;
    ctx.report(
        &response,
        &format!("default instance for machine {} removed.", args.id),
    )
}

pub async fn handle_set_min_bid(args: MinBidArgs, ctx: &Context) -> Result<()> {
    let response = ctx.sdk()?.set_min_bid(args.id, args.price).await?;
    ctx.report_accepted(&response, "Per gpu min bid price changed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Cli, Commands, ListCommands};
    use clap::Parser;

    #[test]
    fn test_parse_end_date() {
        assert_eq!(parse_end_date("1700000000").unwrap(), 1_700_000_000);
        assert_eq!(parse_end_date("2024-01-01").unwrap(), 1_704_067_200);
        assert!(matches!(parse_end_date("next week"), Err(CliError::InvalidInput(_))));
    }

    #[test]
    fn test_list_machine_request() {
        let cli = Cli::try_parse_from([
            "vast", "list", "machine", "77", "-g", "0.4", "-m", "2", "-e", "2024-01-01",
        ])
        .unwrap();

        let request = match cli.command {
            Commands::List {
                object: ListCommands::Machine(args),
            } => args.to_request().unwrap(),
            _ => panic!("expected list machine"),
        };

        assert_eq!(request.machine, 77);
        assert_eq!(request.price_gpu, Some(0.4));
        assert_eq!(request.min_chunk, Some(2));
        assert_eq!(request.end_date, Some(1_704_067_200));
        assert_eq!(request.price_disk, None);
    }

    #[test]
    fn test_or_default() {
        assert_eq!(or_default(Some(0.5), "def"), "0.5");
        assert_eq!(or_default(None::<f64>, "def"), "def");
    }
}
