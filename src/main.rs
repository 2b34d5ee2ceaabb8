// GA4 User Simulator - Main Entry Point
//
// You can run it via Cargo:
//
// ```console
// $ cargo build --release
// $ GA4_MEASUREMENT_ID=G-XXXXXXX GA4_MP_SECRET=... ./target/release/ga4-user-simulator --users 10
// ```
//
// Or without touching the network:
//
// ```console
// $ ./target/release/ga4-user-simulator --users 200 --mode mp --offline --verbose
// ```

use anyhow::{Context, Result};
use clap::Parser;
use ga4_user_simulator::events::{EventSink, MeasurementProtocolSink, MockEventSink};
use ga4_user_simulator::session::{HttpSessionProvider, MockSessionProvider, SessionProvider};
use ga4_user_simulator::simulation::{
    LoggingConfig, LoggingError, LoggingGuard, ProgressCallback, RandomSource, SimulationStats,
    UserSimulator,
};
use ga4_user_simulator::types::{CliArgs, SimulationConfig};
use std::io::Write;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

const EXIT_UNIT_ERRORS: i32 = 1;
const EXIT_INTERRUPTED: i32 = 130;

#[tokio::main]
async fn main() {
    // Parse CLI arguments first to check for special flags
    let args = CliArgs::parse();

    // Handle special CLI flags that don't require full initialization
    if args.print_config {
        match SimulationConfig::default().print_json() {
            Ok(json) => {
                println!("{}", json);
                return;
            }
            Err(e) => {
                eprintln!("Failed to serialize default configuration: {}", e);
                process::exit(1);
            }
        }
    }

    let _logging = match init_logging(&args) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            process::exit(1);
        }
    };

    info!("Starting GA4 User Simulator");

    match run(args).await {
        Ok(code) => process::exit(code),
        Err(e) => {
            error!("Simulation failed: {:#}", e);
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

fn init_logging(args: &CliArgs) -> Result<LoggingGuard, LoggingError> {
    LoggingConfig::for_cli(args.verbose, args.debug_logs, args.log_json, args.log_dir.as_deref())
        .init()
}

/// Load configuration, run the simulation and report; returns the exit code
async fn run(args: CliArgs) -> Result<i32> {
    let mut config =
        SimulationConfig::from_cli_args(&args).context("Failed to load configuration")?;
    config.validate().context("Configuration validation failed")?;
    if args.offline {
        if config.ga4.measurement_id.is_empty() {
            config.ga4.measurement_id = "G-OFFLINE".to_string();
        }
    } else {
        config.validate_credentials().context("GA4 credentials are not usable")?;
    }

    info!("Configuration loaded and validated successfully");

    // Handle dry run mode
    if args.dry_run {
        eprintln!("Configuration validation successful!");
        eprintln!("Dry run mode - simulation will not be executed.");
        print_configuration_summary(&config, &args);
        return Ok(0);
    }

    print_startup_banner(&config, &args);

    let rng = RandomSource::from_optional_seed(config.seed);
    let (sessions, sink) = build_collaborators(&config, &rng, args.offline);

    let progress: ProgressCallback = Arc::new(|current, total| {
        let percent = if total == 0 { 100 } else { current * 100 / total };
        eprint!("\rProgress: {}/{} users ({}%)", current, total, percent);
        let _ = std::io::stderr().flush();
    });

    let stats_output = config.stats_output.clone();
    let simulator = UserSimulator::new(config, sessions, sink)
        .context("Failed to create simulator")?
        .with_random_source(rng)
        .with_progress(progress);

    let cancel = simulator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing in-flight users");
            eprintln!("\nInterrupted - waiting for in-flight users to finish...");
            cancel.cancel();
        }
    });

    let stats = simulator
        .simulate(args.users as u64, args.mode, args.debug)
        .await
        .context("Simulation could not start")?;

    eprintln!();
    print_final_statistics(&stats);

    if let Some(path) = stats_output {
        write_stats(&stats, &path)?;
        eprintln!("Statistics written to: {}", path);
    }

    Ok(exit_code(&stats))
}

fn build_collaborators(
    config: &SimulationConfig,
    rng: &RandomSource,
    offline: bool,
) -> (Arc<dyn SessionProvider>, Arc<dyn EventSink>) {
    if offline {
        info!("Using in-process collaborators");
        let sessions = MockSessionProvider::new(config.target_url.clone())
            .with_delay(Duration::from_millis(250))
            .with_analytics_cookies(
                &config.ga4.measurement_id,
                &format!("{}.{}", rng.range_u64(100_000_000, 999_999_999), rng.client_suffix()),
                rng.range_u64(1_600_000_000, 1_900_000_000),
            );
        let sink = MockEventSink::new().with_delay(Duration::from_millis(20));
        (Arc::new(sessions), Arc::new(sink))
    } else {
        let sessions = HttpSessionProvider::new(config.target_url.clone(), rng.clone());
        let sink = MeasurementProtocolSink::new(config.ga4.clone());
        (Arc::new(sessions), Arc::new(sink))
    }
}

fn exit_code(stats: &SimulationStats) -> i32 {
    if stats.cancelled {
        EXIT_INTERRUPTED
    } else if stats.errors > 0 {
        EXIT_UNIT_ERRORS
    } else {
        0
    }
}

fn write_stats(stats: &SimulationStats, path: &str) -> Result<()> {
    let json = serde_json::to_string_pretty(stats).context("Failed to serialize statistics")?;
    std::fs::write(path, json).with_context(|| format!("Failed to write statistics to '{}'", path))?;
    Ok(())
}

/// Print startup banner and configuration summary
fn print_startup_banner(config: &SimulationConfig, args: &CliArgs) {
    eprintln!("╔═══════════════════════════════════════╗");
    eprintln!("║          GA4 User Simulator           ║");
    eprintln!("╚═══════════════════════════════════════╝");
    eprintln!();

    print_configuration_summary(config, args);
}

/// Print configuration summary
fn print_configuration_summary(config: &SimulationConfig, args: &CliArgs) {
    let users = config.clamp_users(args.users as u64);
    eprintln!("Configuration:");
    eprintln!("  Target: {}", config.target_url);
    eprintln!("  Measurement ID: {}", config.ga4.measurement_id);
    eprintln!("  Mode: {} ({})", args.mode, args.mode.description());
    eprintln!("  Users: {}", users);
    if users < args.users as u64 {
        eprintln!("    (clamped from {} by the daily limit)", args.users);
    }
    eprintln!("  Concurrency: {}", config.effective_concurrency(args.mode));
    eprintln!("  Batch Size: {}", args.mode.batch_size());
    eprintln!(
        "  Session Duration: {} - {} ms",
        config.min_session_duration_ms, config.max_session_duration_ms
    );
    eprintln!(
        "  Pages per Session: {} - {}",
        config.min_pages_per_session, config.max_pages_per_session
    );
    eprintln!("  Validation Endpoint: {}", if args.debug { "yes" } else { "no" });
    if args.offline {
        eprintln!("  Backend: offline");
    }
    if let Some(seed) = config.seed {
        eprintln!("  Random Seed: {}", seed);
    }
    eprintln!();
}

/// Print final statistics
fn print_final_statistics(stats: &SimulationStats) {
    eprintln!("{}", stats.generate_summary_output());
}
