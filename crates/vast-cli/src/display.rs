use crate::Result;
use colored::Colorize;
use dialoguer::{theme::ColorfulTheme, Confirm};
use serde::Serialize;
use serde_json::Value;
use vast_utils::{
    format_cell, fraction_to_percent, mb_to_gb, seconds_to_days, CellFormat, UnitConverter,
};

/// One column of a result table.
#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub field: &'static str,
    pub header: &'static str,
    pub format: CellFormat,
    pub convert: Option<UnitConverter>,
    /// Left-justify (true) or right-justify (false)
    pub left: bool,
}

const fn col(field: &'static str, header: &'static str, format: CellFormat) -> Column {
    Column {
        field,
        header,
        format,
        convert: None,
        left: true,
    }
}

const fn right(mut column: Column) -> Column {
    column.left = false;
    column
}

const fn converted(mut column: Column, convert: UnitConverter) -> Column {
    column.convert = Some(convert);
    column
}

use CellFormat::{Fixed, Plain, Suffix, Timestamp};

/// Columns of `search offers`
pub const OFFER_COLUMNS: &[Column] = &[
    col("id", "ID", Plain),
    col("cuda_max_good", "CUDA", Fixed(1)),
    right(col("num_gpus", "Num", Suffix("x"))),
    col("gpu_name", "Model", Plain),
    col("pcie_bw", "PCIE_BW", Fixed(1)),
    col("cpu_cores_effective", "vCPUs", Fixed(1)),
    right(converted(col("cpu_ram", "RAM", Fixed(1)), mb_to_gb)),
    col("disk_space", "Storage", Fixed(0)),
    col("dph_total", "$/hr", Fixed(4)),
    col("dlperf", "DLPerf", Fixed(1)),
    col("dlperf_per_dphtotal", "DLP/$", Fixed(1)),
    col("driver_version", "Nvidia Driver Version", Plain),
    col("inet_up", "Net_up", Fixed(1)),
    col("inet_down", "Net_down", Fixed(1)),
    converted(col("reliability2", "R", Fixed(1)), fraction_to_percent),
    converted(col("duration", "Max_Days", Fixed(1)), seconds_to_days),
    col("machine_id", "machine_id", Plain),
];

/// Columns of `show instances`
pub const INSTANCE_COLUMNS: &[Column] = &[
    col("id", "ID", Plain),
    col("machine_id", "Machine", Plain),
    col("actual_status", "Status", Plain),
    right(col("num_gpus", "Num", Suffix("x"))),
    col("gpu_name", "Model", Plain),
    col("gpu_util", "Util. %", Fixed(1)),
    col("cpu_cores_effective", "vCPUs", Fixed(1)),
    right(converted(col("cpu_ram", "RAM", Fixed(1)), mb_to_gb)),
    col("disk_space", "Storage", Fixed(0)),
    col("ssh_host", "SSH Addr", Plain),
    col("ssh_port", "SSH Port", Plain),
    col("dph_total", "$/hr", Fixed(4)),
    col("image_uuid", "Image", Plain),
    col("inet_up", "Net up", Fixed(1)),
    col("inet_down", "Net down", Fixed(1)),
    converted(col("reliability2", "R", Fixed(1)), fraction_to_percent),
    col("label", "Label", Plain),
];

/// Columns of `show invoices`
pub const INVOICE_COLUMNS: &[Column] = &[
    col("amount", "Amount", Plain),
    col("description", "Description", Plain),
    col("quantity", "Quantity", Plain),
    col("rate", "Rate", Plain),
    col("timestamp", "Timestamp", Timestamp),
    col("type", "Type", Plain),
];

/// Columns of `show user`
pub const USER_COLUMNS: &[Column] = &[
    col("balance", "Balance", Plain),
    col("balance_threshold", "Bal. Thld", Plain),
    col("balance_threshold_enabled", "Bal. Thld Enabled", Plain),
    col("billaddress_city", "City", Plain),
    col("billaddress_country", "Country", Plain),
    col("billaddress_line1", "Addr Line 1", Plain),
    col("billaddress_line2", "Addr line 2", Plain),
    col("billaddress_zip", "Zip", Plain),
    col("billed_expected", "Billed Expected", Plain),
    col("billed_verified", "Billed Vfy", Plain),
    col("billing_creditonly", "Billing Creditonly", Plain),
    col("can_pay", "Can Pay", Plain),
    col("credit", "Credit", Fixed(2)),
    col("email", "Email", Plain),
    col("email_verified", "Email Vfy", Plain),
    col("fullname", "Full Name", Plain),
    col("got_signup_credit", "Got Signup Credit", Plain),
    col("has_billing", "Has Billing", Plain),
    col("has_payout", "Has Payout", Plain),
    col("id", "Id", Plain),
    col("last4", "Last4", Plain),
    col("paid_expected", "Paid Expected", Plain),
    col("paid_verified", "Paid Vfy", Plain),
    col("password_resettable", "Pwd Resettable", Plain),
    col("paypal_email", "Paypal Email", Plain),
    col("ssh_key", "Ssh Key", Plain),
    col("user", "User", Plain),
    col("username", "Username", Plain),
];

/// Lay `rows` out under `columns`.
///
/// Cells are padded to the widest entry of their column and joined with two
/// spaces. Spaces inside a cell become underscores so every row stays
/// splittable on whitespace.
pub fn render_table(rows: &[Value], columns: &[Column]) -> String {
    let mut table: Vec<Vec<String>> = vec![columns.iter().map(|c| c.header.to_string()).collect()];
    let mut widths: Vec<usize> = columns.iter().map(|c| c.header.chars().count()).collect();

    for row in rows {
        let cells: Vec<String> = columns
            .iter()
            .enumerate()
            .map(|(i, column)| {
                let cell = format_cell(row.get(column.field), column.format, column.convert)
                    .replace(' ', "_");
                widths[i] = widths[i].max(cell.chars().count());
                cell
            })
            .collect();
        table.push(cells);
    }

    let mut out = String::new();
    for cells in &table {
        let line: Vec<String> = cells
            .iter()
            .zip(columns)
            .zip(&widths)
            .map(|((cell, column), &width)| {
                if column.left {
                    format!("{:<width$}", cell, width = width)
                } else {
                    format!("{:>width$}", cell, width = width)
                }
            })
            .collect();
        out.push_str(&line.join("  "));
        out.push('\n');
    }
    out
}

pub fn print_table(rows: &[Value], columns: &[Column]) {
    print!("{}", render_table(rows, columns));
}

/// Pretty JSON with sorted keys, as `--raw` prints it
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    // serde_json maps are ordered, so going through Value sorts the keys
    let value = serde_json::to_value(value)?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

/// Interactive prompts
pub fn prompt_confirm(message: &str, default: bool) -> Result<bool> {
    let result = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(message)
        .default(default)
        .interact()?;

    Ok(result)
}

/// Status messages
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Warnings go to stderr so `--raw` output stays parseable.
pub fn print_warning(message: &str) {
    eprintln!("{} {}", "⚠".yellow().bold(), message);
}

pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}
