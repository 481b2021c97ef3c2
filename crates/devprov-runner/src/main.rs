use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{ArgAction, Parser, Subcommand};
use serde_json::Value;
use tokio::sync::Notify;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use devprov_fwinfo::ProtoFwInfoCodec;
use devprov_runner::monitor::{run_monitor, DEFAULT_INIT_HEX};
use devprov_runner::{
    DeviceSession, HexBytes, Outcome, ProvisionConfig, Provisioner, RunnerError, TcpConnector,
};

/// Provision devices over a SLIP-multiplexed serial link
#[derive(Parser, Debug)]
#[command(name = "devprov", version, author, long_about = None)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Device endpoint as host:port (overrides the config file)
    #[arg(short, long, global = true)]
    endpoint: Option<String>,

    /// More logging (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Lock the device, upload signed settings and restart it
    Provision {
        /// Shared AES key in hex (overrides the config file)
        #[arg(short, long)]
        key: Option<String>,
    },
    /// Read the settings once and print them as JSON
    Read,
    /// Log every frame the device sends
    Monitor {
        /// Raw message to send after connecting, in hex; empty to send nothing
        #[arg(long, default_value = DEFAULT_INIT_HEX)]
        init: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run_until_interrupted(cli)) {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn run_until_interrupted(cli: Cli) -> Result<ExitCode, RunnerError> {
    let interrupted = Arc::new(Notify::new());
    let notify = interrupted.clone();
    ctrlc::set_handler(move || notify.notify_one())?;

    tokio::select! {
        result = run(cli) => result,
        _ = interrupted.notified() => {
            info!("Stopped.");
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_config(cli: &Cli) -> Result<ProvisionConfig, RunnerError> {
    let mut config = match &cli.config {
        Some(path) => ProvisionConfig::load(path)?,
        None => ProvisionConfig::default(),
    };
    if let Some(endpoint) = &cli.endpoint {
        config.endpoint = endpoint.clone();
    }
    Ok(config)
}

async fn run(cli: Cli) -> Result<ExitCode, RunnerError> {
    let mut config = load_config(&cli)?;
    let connector = Arc::new(TcpConnector::new(config.endpoint.clone()));

    match cli.command {
        Command::Provision { key } => {
            if let Some(key) = key {
                config.auth_key = Some(HexBytes::parse(&key, "key")?);
            }
            let mut provisioner = Provisioner::new(config, connector)?;
            let report = provisioner.run().await?;
            match report.outcome {
                Outcome::Done => {
                    info!(
                        "Device {} provisioned",
                        report.serial.as_deref().unwrap_or("?")
                    );
                    Ok(ExitCode::SUCCESS)
                }
                Outcome::Failed(reason) => {
                    error!("Provisioning failed: {}", reason);
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Command::Read => {
            let mut session =
                DeviceSession::new(connector, config.addresses, Arc::new(ProtoFwInfoCodec));
            session.connect().await?;
            let snapshot = session
                .read_settings(config.timing.response_timeout())
                .await?;
            session.disconnect().await;
            match snapshot {
                Some(settings) => {
                    println!("{:#}", Value::Object(settings));
                    Ok(ExitCode::SUCCESS)
                }
                None => {
                    error!("No settings received");
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Command::Monitor { init } => {
            let init = HexBytes::parse(&init, "init")?;
            let init = (!init.0.is_empty()).then_some(init.as_bytes());
            run_monitor(connector.as_ref(), init).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
