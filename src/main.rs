use vast_cli::display::print_error;

const ENV_LOG: &str = "VAST_LOG";

fn init_logging() {
    let filter = std::env::var(ENV_LOG)
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "warn".to_string());

    // `log` records from the library crates are bridged by the subscriber
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .with_env_filter(filter)
        .init();
}

#[tokio::main]
async fn main() {
    init_logging();

    if let Err(e) = vast_cli::run().await {
        print_error(&format!("Error: {}", e));
        std::process::exit(1);
    }
}
