use super::Context;
use crate::Result;
use clap::Args;

#[derive(Args, Debug)]
pub struct UrlArgs {
    /// Instance id; may be left out when exactly one instance exists
    #[arg(long)]
    pub id: Option<u64>,
}

pub async fn handle_ssh(args: UrlArgs, ctx: &Context) -> Result<()> {
    println!("{}", ctx.sdk()?.ssh_url(args.id).await?);
    Ok(())
}

pub async fn handle_scp(args: UrlArgs, ctx: &Context) -> Result<()> {
    println!("{}", ctx.sdk()?.scp_url(args.id).await?);
    Ok(())
}
