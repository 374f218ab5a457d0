use super::Context;
use crate::display::{print_error, print_info, print_json, print_success, prompt_confirm};
use crate::{CliError, Result};
use clap::Args;
use log::{debug, info};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use vast_api::{BatchReport, CreateInstanceRequest, RunType};
use vast_utils::{parse_env, parse_id_list};

#[derive(Args, Debug)]
pub struct IdArgs {
    /// Instance id
    pub id: u64,
}

#[derive(Args, Debug)]
pub struct LabelArgs {
    /// Instance id
    pub id: u64,
    /// Label to set
    pub label: String,
}

#[derive(Args, Debug)]
#[command(after_help = "\
Change the current bid price of instance ID to PRICE.
If PRICE is not given, a winning bid price is used.")]
pub struct PriceArgs {
    /// Instance id
    pub id: u64,
    /// Per machine bid price in $/hour
    #[arg(long)]
    pub price: Option<f64>,
}

#[derive(Args, Debug)]
pub struct IdListArgs {
    /// Instance ids, separated by spaces or commas
    #[arg(required = true, value_name = "IDS")]
    pub ids: Vec<String>,
}

#[derive(Args, Debug)]
pub struct DestroyManyArgs {
    /// Instance ids, separated by spaces or commas
    #[arg(required = true, value_name = "IDS")]
    pub ids: Vec<String>,

    /// Skip confirmation
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Id of the offer to launch (from `search offers`)
    pub id: u64,

    /// Per machine bid price in $/hour
    #[arg(long)]
    pub price: Option<f64>,

    /// Size of local disk partition in GB
    #[arg(long, default_value_t = 10.0)]
    pub disk: f64,

    /// Docker container image to launch
    #[arg(long)]
    pub image: Option<String>,

    /// Docker login arguments for private repositories
    #[arg(long)]
    pub login: Option<String>,

    /// Label to set on the instance
    #[arg(long)]
    pub label: Option<String>,

    /// File to use as onstart script
    #[arg(long, value_name = "FILE")]
    pub onstart: Option<PathBuf>,

    /// Contents of onstart script as a single argument
    #[arg(long, value_name = "SCRIPT", conflicts_with = "onstart")]
    pub onstart_cmd: Option<String>,

    /// Docker-style options, e.g. '-e TZ=UTC -p 8080:8080'
    #[arg(long, allow_hyphen_values = true)]
    pub env: Option<String>,

    /// Launch as a jupyter instance instead of an ssh instance
    #[arg(long)]
    pub jupyter: bool,

    /// Directory to launch jupyter in (implies --jupyter)
    #[arg(long)]
    pub jupyter_dir: Option<String>,

    /// Launch with jupyter lab (implies --jupyter)
    #[arg(long)]
    pub jupyter_lab: bool,

    /// Install and generate locales, set locale to C.UTF-8
    #[arg(long)]
    pub lang_utf8: bool,

    /// Set python's locale to C.UTF-8
    #[arg(long)]
    pub python_utf8: bool,

    #[arg(long, hide = true)]
    pub extra: Option<String>,

    /// Existing instance id to use as basis for the new instance
    #[arg(long)]
    pub create_from: Option<String>,

    /// Skip sanity checks when creating from an existing instance
    #[arg(long)]
    pub force: bool,

    /// DEPRECATED: arguments passed to container launch; use --onstart instead
    #[arg(long, num_args = 1.., allow_hyphen_values = true)]
    pub args: Option<Vec<String>>,
}

impl CreateArgs {
    pub fn to_request(&self) -> Result<CreateInstanceRequest> {
        let onstart = match &self.onstart {
            Some(path) => Some(fs::read_to_string(path)?),
            None => self.onstart_cmd.clone(),
        };
        let jupyter = self.jupyter || self.jupyter_dir.is_some() || self.jupyter_lab;
        let runtype = RunType::select(self.args.is_some(), jupyter)?;
        let env = match &self.env {
            Some(env) => parse_env(env)?,
            None => BTreeMap::new(),
        };

        Ok(CreateInstanceRequest {
            image: self.image.clone(),
            env,
            price: self.price,
            disk: self.disk,
            label: self.label.clone(),
            extra: self.extra.clone(),
            onstart,
            runtype,
            image_login: self.login.clone(),
            python_utf8: self.python_utf8,
            lang_utf8: self.lang_utf8,
            use_jupyter_lab: self.jupyter_lab,
            jupyter_dir: self.jupyter_dir.clone(),
            create_from: self.create_from.clone(),
            force: self.force,
            args: self.args.clone(),
            ..Default::default()
        })
    }
}

pub async fn handle_create(args: CreateArgs, ctx: &Context) -> Result<()> {
    let request = args.to_request()?;
    debug!("Creating instance from offer {} ({:?})", args.id, request.runtype);

    let response = ctx.sdk()?.create_instance(args.id, &request).await?;
    let message = format!("Started. {}", serde_json::to_string(&response)?);
    ctx.report_accepted(&response, &message)
}

pub async fn handle_start(args: IdArgs, ctx: &Context) -> Result<()> {
    let response = ctx.sdk()?.start_instance(args.id).await?;
    ctx.report(&response, &format!("starting instance {}.", args.id))
}

pub async fn handle_stop(args: IdArgs, ctx: &Context) -> Result<()> {
    let response = ctx.sdk()?.stop_instance(args.id).await?;
    ctx.report(&response, &format!("stopping instance {}.", args.id))
}

pub async fn handle_label(args: LabelArgs, ctx: &Context) -> Result<()> {
    let response = ctx.sdk()?.label_instance(args.id, &args.label).await?;
    ctx.report(&response, &format!("label for {} set to {}.", args.id, args.label))
}

pub async fn handle_destroy(args: IdArgs, ctx: &Context) -> Result<()> {
    let response = ctx.sdk()?.destroy_instance(args.id).await?;
    ctx.report(&response, &format!("destroying instance {}.", args.id))
}

fn instance_ids(args: &[String]) -> Result<Vec<u64>> {
    let ids = parse_id_list(&args.join(" "))?;
    if ids.is_empty() {
        return Err(CliError::InvalidInput("No instance ids given".to_string()));
    }
    Ok(ids)
}

/// Print one line per id and fail if any id was not handled.
fn finish_batch(report: &BatchReport, ctx: &Context, doing: &str, verb: &str) -> Result<()> {
    if ctx.raw {
        print_json(report)?;
    } else {
        for id in &report.succeeded {
            print_success(&format!("{} instance {}.", doing, id));
        }
        for (id, reason) in &report.failed {
            print_error(&format!("instance {}: {}", id, reason));
        }
    }

    if report.failed.is_empty() {
        Ok(())
    } else {
        Err(CliError::OperationFailed(format!(
            "{} of {} instances could not be {}",
            report.failed.len(),
            report.failed.len() + report.succeeded.len(),
            verb
        )))
    }
}

pub async fn handle_start_many(args: IdListArgs, ctx: &Context) -> Result<()> {
    let ids = instance_ids(&args.ids)?;
    info!("Starting {} instances", ids.len());
    let report = ctx.sdk()?.start_instances(ids).await;
    finish_batch(&report, ctx, "starting", "started")
}

pub async fn handle_stop_many(args: IdListArgs, ctx: &Context) -> Result<()> {
    let ids = instance_ids(&args.ids)?;
    info!("Stopping {} instances", ids.len());
    let report = ctx.sdk()?.stop_instances(ids).await;
    finish_batch(&report, ctx, "stopping", "stopped")
}

pub async fn handle_destroy_many(args: DestroyManyArgs, ctx: &Context) -> Result<()> {
    let ids = instance_ids(&args.ids)?;

    if !args.yes {
        let prompt = format!(
            "Destroy {} instance(s)? This deletes their data and cannot be undone",
            ids.len()
        );
        if !prompt_confirm(&prompt, false)? {
            print_info("Cancelled.");
            return Ok(());
        }
    }

    info!("Destroying {} instances", ids.len());
    let report = ctx.sdk()?.destroy_instances(ids).await;
    finish_batch(&report, ctx, "destroying", "destroyed")
}

pub async fn handle_change_bid(args: PriceArgs, ctx: &Context) -> Result<()> {
    let response = ctx.sdk()?.change_bid(args.id, args.price).await?;
    ctx.report_accepted(&response, "Per gpu bid price changed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Cli, Commands, CreateCommands};
    use clap::Parser;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn parse(args: &[&str]) -> CreateArgs {
        let argv = ["vast", "create", "instance"].iter().chain(args).copied();
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Create {
                object: CreateCommands::Instance(args),
            } => args,
            _ => panic!("expected create instance"),
        }
    }

    #[test]
    fn test_default_request() {
        let request = parse(&["1234", "--image", "pytorch/pytorch"]).to_request().unwrap();

        assert_eq!(request.client_id, "me");
        assert_eq!(request.image.as_deref(), Some("pytorch/pytorch"));
        assert_eq!(request.disk, 10.0);
        assert_eq!(request.runtype, RunType::Ssh);
        assert!(request.env.is_empty());
    }

    #[test]
    fn test_env_option() {
        let request = parse(&["1", "--env", "-e TZ=UTC -p 8080:8080"]).to_request().unwrap();

        assert_eq!(request.env.get("TZ").map(String::as_str), Some("UTC"));
        assert_eq!(request.env.get("-p 8080:8080").map(String::as_str), Some("1"));
    }

    #[test]
    fn test_jupyter_dir_implies_jupyter() {
        let request = parse(&["1", "--jupyter-dir", "/workspace"]).to_request().unwrap();
        assert_eq!(request.runtype, RunType::Jupyter);
        assert!(!request.use_jupyter_lab);

        let request = parse(&["1", "--jupyter-lab"]).to_request().unwrap();
        assert_eq!(request.runtype, RunType::Jupyter);
        assert!(request.use_jupyter_lab);
    }

    #[test]
    fn test_jupyter_with_args_is_rejected() {
        let args = parse(&["1", "--jupyter", "--args", "python", "-m", "http.server"]);
        assert_eq!(
            args.args.as_deref(),
            Some(&["python".to_string(), "-m".to_string(), "http.server".to_string()][..])
        );
        assert!(args.to_request().is_err());

        let request = parse(&["1", "--args", "sleep", "60"]).to_request().unwrap();
        assert_eq!(request.runtype, RunType::Args);
    }

    #[test]
    fn test_onstart_file_is_read() {
        let mut script = NamedTempFile::new().unwrap();
        writeln!(script, "#!/bin/bash\necho hello").unwrap();
        let path = script.path().to_str().unwrap().to_string();

        let request = parse(&["1", "--onstart", &path]).to_request().unwrap();
        assert_eq!(request.onstart.as_deref(), Some("#!/bin/bash\necho hello\n"));
    }

    #[test]
    fn test_destroy_many_parses_ids() {
        let cli = Cli::try_parse_from(["vast", "destroy", "instances", "1,2", "3", "-y"]).unwrap();
        match cli.command {
            Commands::Destroy {
                object: crate::DestroyCommands::Instances(args),
            } => {
                assert!(args.yes);
                assert_eq!(parse_id_list(&args.ids.join(" ")).unwrap(), vec![1, 2, 3]);
            }
            _ => panic!("expected destroy instances"),
        }
    }

    #[test]
    fn test_start_and_stop_many_parse_ids() {
        let cli = Cli::try_parse_from(["vast", "start", "instances", "4", "5,6"]).unwrap();
        match cli.command {
            Commands::Start {
                object: crate::StartCommands::Instances(args),
            } => assert_eq!(instance_ids(&args.ids).unwrap(), vec![4, 5, 6]),
            _ => panic!("expected start instances"),
        }

        let cli = Cli::try_parse_from(["vast", "stop", "instances", "7"]).unwrap();
        match cli.command {
            Commands::Stop {
                object: crate::StopCommands::Instances(args),
            } => assert_eq!(instance_ids(&args.ids).unwrap(), vec![7]),
            _ => panic!("expected stop instances"),
        }

        assert!(Cli::try_parse_from(["vast", "stop", "instances"]).is_err());
        assert!(matches!(instance_ids(&[",".to_string()]), Err(CliError::InvalidInput(_))));
    }
}
