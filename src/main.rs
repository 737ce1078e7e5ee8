use anyhow::Result;
use clap::Parser;
use snapcam::{SnapcamApp, SnapcamConfig};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "snapcam")]
#[command(about = "Camera app with live preview, lens switching, torch and photo capture")]
#[command(version)]
#[command(long_about = "A camera application that binds the back or front camera, \
shows a live preview, toggles the torch and saves timestamped JPEG photos. \
Runs on V4L2 cameras through GStreamer or on a built-in virtual camera.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "snapcam.toml", help = "Path to TOML configuration file")]
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
    #[arg(long, help = "Validate configuration file and exit without opening a camera")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Disable terminal key bindings
    #[arg(long, help = "Do not read key presses; stop with Ctrl+C or SIGTERM")]
    no_keyboard: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Handle special modes that don't require full initialization
    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    init_logging(&args)?;

    info!("Starting Snapcam v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let config = match SnapcamConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if args.validate_config {
        match config.validate() {
            Ok(()) => {
                info!("Configuration validation successful");
                println!("Configuration is valid");
                return Ok(());
            }
            Err(e) => {
                error!("Configuration validation failed: {}", e);
                eprintln!("Configuration validation failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    let mut app = SnapcamApp::new(config).await.map_err(|e| {
        error!("Failed to create application: {}", e);
        e
    })?;

    if args.no_keyboard {
        app.set_keyboard_enabled(false);
    }

    app.initialize().await.map_err(|e| {
        error!("Failed to initialize: {}", e);
        e
    })?;

    app.start().await.map_err(|e| {
        error!("Failed to start: {}", e);
        e
    })?;

    let exit_code = app.run().await.map_err(|e| {
        error!("Error during execution: {}", e);
        e
    })?;

    info!(
        "Snapcam exited with code {} ({} photo(s) saved)",
        exit_code,
        app.captured_images().len()
    );

    std::process::exit(exit_code);
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

    // RUST_LOG takes precedence over the flags
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("snapcam={}", log_level)));

    // Logs go to stderr so they do not tear the status line
    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .with_writer(std::io::stderr)
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .with_writer(std::io::stderr)
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .with_writer(std::io::stderr)
            .pretty()
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_writer(std::io::stderr)
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
    println!("# Snapcam configuration file");
    println!("# Every key is optional; environment overrides use SNAPCAM_<SECTION>__<KEY>");
    println!();
    println!("{}", toml::to_string_pretty(&SnapcamConfig::default())?);
    Ok(())
}
