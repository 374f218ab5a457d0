use super::Context;
use crate::display::{
    print_json, print_table, INSTANCE_COLUMNS, INVOICE_COLUMNS, USER_COLUMNS,
};
use crate::Result;
use clap::Subcommand;
use serde_json::Value;

#[derive(Subcommand, Debug)]
pub enum ShowCommands {
    /// Display user's current instances
    Instances,
    /// [Host] Show hosted machines
    Machines {
        /// Only display numeric ids
        #[arg(short, long)]
        quiet: bool,
    },
    /// Show billing history
    Invoices,
    /// Get current user data
    User,
}

pub async fn handle(command: ShowCommands, ctx: &Context) -> Result<()> {
    let sdk = ctx.sdk()?;

    match command {
        ShowCommands::Instances => {
            let instances = sdk.show_instances().await?;
            if ctx.raw {
                print_json(&instances)?;
            } else {
                print_table(&instances, INSTANCE_COLUMNS);
            }
        }
        ShowCommands::Machines { quiet } => {
            let machines = sdk.show_machines().await?;
            if ctx.raw {
                print_json(&machines)?;
            } else if quiet {
                for machine in &machines {
                    println!("{}", machine_id(machine));
                }
            } else {
                println!("{} machines:", machines.len());
                for machine in &machines {
                    println!("{}: {}", machine_id(machine), serde_json::to_string_pretty(machine)?);
                }
            }
        }
        ShowCommands::Invoices => {
            let summary = sdk.show_invoices().await?;
            if ctx.raw {
                print_json(&summary.invoices)?;
            } else {
                print_table(&summary.invoices, INVOICE_COLUMNS);
            }
            println!("Current: {}", summary.current);
        }
        ShowCommands::User => {
            let user = sdk.show_user().await?;
            if ctx.raw {
                print_json(&user)?;
            } else {
                print_table(std::slice::from_ref(&user), USER_COLUMNS);
            }
        }
    }

    Ok(())
}

fn machine_id(machine: &Value) -> String {
    match machine.get("id") {
        Some(Value::String(id)) => id.clone(),
        Some(id) => id.to_string(),
        None => "-".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_machine_id() {
        assert_eq!(machine_id(&json!({"id": 42})), "42");
        assert_eq!(machine_id(&json!({"id": "m-1"})), "m-1");
        assert_eq!(machine_id(&json!({})), "-");
    }
}
