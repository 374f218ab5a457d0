use super::Context;
use crate::display::{print_json, print_table, print_warning, OFFER_COLUMNS};
use crate::Result;
use clap::Args;
use log::debug;
use vast_api::{OfferType, SearchOffers};

#[derive(Args, Debug)]
#[command(after_help = "\
Query syntax:  field op value [field op value ...]
  ops: <, <=, ==, !=, >=, >, in, notin (or lt, lte, eq, neq, gte, gt)
  write spaces in values as underscores, e.g. gpu_name=RTX_3090
  value 'any' removes a default filter, e.g. verified=any

Examples:
  vast search offers 'reliability > 0.99 num_gpus>=4' -o num_gpus-
  vast search offers 'gpu_name in [RTX_3090,RTX_4090]' --storage 50")]
pub struct SearchArgs {
    /// Pricing type: on-demand or bid (interruptible)
    #[arg(short = 't', long = "type", value_name = "TYPE", default_value = "on-demand")]
    pub offer_type: String,

    /// Alias for --type=bid
    #[arg(short = 'i', long, conflicts_with = "on_demand")]
    pub interruptible: bool,

    /// Alias for --type=bid
    #[arg(short = 'b', long, conflicts_with = "on_demand")]
    pub bid: bool,

    /// Alias for --type=on-demand
    #[arg(short = 'd', long = "on-demand")]
    pub on_demand: bool,

    /// Disable the default query (verified, rentable, not external)
    #[arg(short = 'n', long)]
    pub no_default: bool,

    /// Show identical offers separately
    #[arg(long)]
    pub disable_bundling: bool,

    /// GiB of storage to include in the price
    #[arg(long, default_value_t = 5.0)]
    pub storage: f64,

    /// Comma-separated sort fields; append '-' for descending
    #[arg(short = 'o', long, default_value = "score-")]
    pub order: String,

    /// Query words, joined with spaces
    #[arg(value_name = "QUERY")]
    pub query: Vec<String>,
}

impl SearchArgs {
    pub fn offer_type(&self) -> Result<OfferType> {
        if self.interruptible || self.bid {
            Ok(OfferType::Bid)
        } else if self.on_demand {
            Ok(OfferType::OnDemand)
        } else {
            Ok(self.offer_type.parse()?)
        }
    }

    pub fn to_params(&self) -> Result<SearchOffers> {
        Ok(SearchOffers {
            query: self.query.join(" "),
            offer_type: self.offer_type()?,
            no_default: self.no_default,
            disable_bundling: self.disable_bundling,
            storage: self.storage,
            order: self.order.clone(),
        })
    }
}

pub async fn handle(args: SearchArgs, ctx: &Context) -> Result<()> {
    let params = args.to_params()?;
    let sdk = ctx.sdk()?;

    let (request, warnings) = sdk.build_search(&params)?;
    for warning in &warnings {
        print_warning(warning);
    }

    let offers = sdk.client().search_offers(&request).await?;
    debug!("Search returned {} offers", offers.len());

    if ctx.raw {
        print_json(&offers)
    } else {
        print_table(&offers, OFFER_COLUMNS);
        Ok(())
    }
}
