//! mcsw - a Minecraft server wrapper.

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mcsw::listeners::{ConsoleLogger, Herobrine, LogFilter, WebhookNotifier};
use mcsw::supervisor::Wrapper;
use mcsw::{config, display};

#[derive(Parser)]
#[command(name = "mcsw", about = "A Minecraft server wrapper", version)]
struct Cli {
    /// Name of the managed server directory.
    #[arg(short, long, default_value = "default")]
    directory: String,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(&cli.directory).await {
        display::print_error(&e);
        std::process::exit(1);
    }
}

async fn run(name: &str) -> Result<(), String> {
    let directory = config::server_directory(name).map_err(|e| e.to_string())?;
    let wrapper_config = config::load_wrapper_config(&directory).map_err(|e| e.to_string())?;
    tracing::info!(directory = %directory.display(), "Starting wrapper");

    let mut wrapper = Wrapper::new(&directory, wrapper_config);

    wrapper
        .registry_mut()
        .register(Box::new(ConsoleLogger::new(LogFilter::default())));

    if wrapper.config().use_webhook {
        match WebhookNotifier::from_directory(&directory) {
            Ok(notifier) => wrapper.registry_mut().register(Box::new(notifier)),
            Err(e) => display::print_error(&format!("Webhook disabled: {e}")),
        }
    }

    if wrapper.config().use_herobrine {
        match Herobrine::from_directory(wrapper.handle(), &directory) {
            Ok(listener) => wrapper.registry_mut().register(Box::new(listener)),
            Err(e) => display::print_error(&format!("Herobrine disabled: {e}")),
        }
    }

    wrapper.run().await.map_err(|e| e.to_string())
}
