use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use stereocam::{
    local_base_url, GroqChatClient, MockOrientationSource, RelayClient, RelayServer, SessionComponents,
    StereocamConfig, StereocamEvent, SyntheticCamera, VrSession,
};
use tokio::sync::oneshot;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "stereocam")]
#[command(about = "Image analysis relay for the stereo VR camera viewer")]
#[command(version)]
#[command(long_about = "Serves POST /api/analyze-image, forwarding a still image and a prompt \
to a hosted vision model and returning its description. Optionally runs a headless viewer \
session against a synthetic camera to exercise the capture-analyze loop end to end.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "stereocam.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit without starting the relay")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Override the relay listen port
    #[arg(short, long, help = "Port for the relay to listen on")]
    port: Option<u16>,

    /// Run a headless session with the synthetic camera alongside the relay
    #[arg(long, help = "Run a synthetic-camera session that analyzes through the relay")]
    session: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    init_logging(&args)?;

    info!("Starting stereocam relay v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let mut config = match StereocamConfig::load_from_file(&args.config) {
        Ok(config) => {
            info!("Configuration loaded successfully from: {}", args.config);
            config
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if let Some(port) = args.port {
        config.relay.port = port;
    }

    if args.validate_config {
        match config.validate() {
            Ok(()) => {
                info!("Configuration validation successful");
                println!("✓ Configuration is valid");
                return Ok(());
            }
            Err(e) => {
                error!("Configuration validation failed: {}", e);
                eprintln!("✗ Configuration validation failed: {}", e);
                std::process::exit(1);
            }
        }
    }
    config.validate()?;

    let model = Arc::new(GroqChatClient::from_config(&config.relay)?);
    let relay = RelayServer::new(
        config.relay.clone(),
        model,
        Arc::new(stereocam::EventBus::new(config.system.event_bus_capacity)),
    );

    let (shutdown_sender, shutdown_receiver) = oneshot::channel::<String>();
    spawn_signal_handlers(shutdown_sender);

    // bound before the session starts so its first request has somewhere to go
    let listener = relay.bind().await?;
    if args.port.is_some() {
        let bound = listener.local_addr()?;
        config.analysis.relay_url = local_base_url(bound);
        info!("Session relay URL set to {}", config.analysis.relay_url);
    }

    let session = if args.session {
        Some(start_session(&config).await?)
    } else {
        None
    };

    let result = relay
        .serve_on(listener, async move {
            match shutdown_receiver.await {
                Ok(signal) => info!("Received {}; shutting down", signal),
                Err(_) => warn!("Shutdown channel closed unexpectedly"),
            }
        })
        .await;

    if let Some(session) = session {
        if let Err(e) = session.stop() {
            error!("Error stopping session: {}", e);
        }
    }

    result.map_err(|e| {
        error!("Relay error: {}", e);
        e.into()
    })
}

/// Headless session that analyzes synthetic frames through this relay
async fn start_session(config: &StereocamConfig) -> Result<VrSession> {
    let client = RelayClient::from_config(&config.analysis)?;
    info!("Headless session analyzing through {}", client.endpoint());

    let session = VrSession::new(
        config.clone(),
        SessionComponents {
            camera: Arc::new(SyntheticCamera::builder().build()),
            orientation: Arc::new(MockOrientationSource::unsupported()),
            analysis: Arc::new(client),
        },
    );

    let mut events = session.event_bus().subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if let StereocamEvent::AnalysisCompleted { result, .. } = event {
                info!("Analysis: {}", result);
            }
        }
    });

    session.start().await?;
    Ok(session)
}

fn spawn_signal_handlers(sender: oneshot::Sender<String>) {
    let sender = Arc::new(parking_lot::Mutex::new(Some(sender)));

    #[cfg(unix)]
    {
        let sender = Arc::clone(&sender);
        tokio::spawn(async move {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    if sigterm.recv().await.is_some() {
                        if let Some(tx) = sender.lock().take() {
                            let _ = tx.send("SIGTERM".to_string());
                        }
                    }
                }
                Err(e) => warn!("Failed to register SIGTERM handler: {}", e),
            }
        });
    }

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            if let Some(tx) = sender.lock().take() {
                let _ = tx.send("SIGINT".to_string());
            }
        }
    });
}

fn init_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("stereocam={}", log_level)));

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_target(true)
                .with_thread_ids(args.debug)
                .with_file(args.debug)
                .with_line_number(args.debug)
                .boxed()
        }
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .init();

    Ok(())
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# Stereocam Configuration File");
    println!("# Every key can be overridden with STEREOCAM_<SECTION>__<KEY>, e.g. STEREOCAM_RELAY__PORT");
    println!();
    let defaults = toml::to_string_pretty(&StereocamConfig::default())
        .map_err(stereocam::StereocamError::from)?;
    println!("{}", defaults);
    Ok(())
}
