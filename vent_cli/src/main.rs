mod app;
mod cli;
mod sweep;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use eyre::WrapErr;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use vent_traits::clock::{Clock, MonotonicClock};

use crate::cli::{Cli, Commands, FILE_GUARD};

fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let args = Cli::parse();

    let cfg = load_config(&args);
    init_logging(&args.log_level, &cfg.logging);

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = Arc::clone(&shutdown);
        ctrlc::set_handler(move || {
            shutdown.store(true, Ordering::Relaxed);
        })
        .wrap_err("installing ctrl-c handler")?;
    }

    let clock: Arc<dyn Clock + Send + Sync> = Arc::new(MonotonicClock::new());

    match args.cmd {
        Commands::Run {
            cycles,
            interval_ms,
            status_every,
        } => run_loop(
            &cfg,
            clock,
            cycles,
            interval_ms,
            status_every,
            args.json,
            &shutdown,
        ),
        Commands::Status => {
            let mut app = app::build(&cfg, clock)?;
            app.tick_sim(cfg.cycle.interval_ms);
            app.system.update()?;
            let snapshot = app.system.snapshot();
            if args.json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                print!("{snapshot}");
            }
            Ok(())
        }
        Commands::Sweep {
            fan,
            steps,
            settle_ms,
        } => {
            let fan_cfg = cfg
                .fans
                .get(fan)
                .ok_or_else(|| eyre::eyre!("no fan at index {fan} (have {})", cfg.fans.len()))?;
            sweep::run(fan_cfg, steps, settle_ms, clock, &shutdown)
        }
    }
}

fn load_config(args: &Cli) -> vent_config::Config {
    let mut cfg = vent_config::load_or_default(&args.config);
    if !args.config.exists() {
        eprintln!(
            "config {:?} not found, using built-in defaults",
            args.config
        );
    }
    if let Some(tuning) = vent_config::load_tuning(&args.tuning) {
        cfg.apply_tuning(&tuning);
    }
    cfg
}

fn init_logging(cli_level: &str, logging: &vent_config::Logging) {
    let level = logging.level.as_deref().unwrap_or(cli_level);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_owned()));

    if let Some(path) = &logging.file {
        let path = std::path::Path::new(path);
        let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
        let file = path.file_name().map(|f| f.to_string_lossy().into_owned());
        let appender = match logging.rotation.as_deref() {
            Some("daily") => tracing_appender::rolling::daily(dir, file.unwrap_or_default()),
            Some("hourly") => tracing_appender::rolling::hourly(dir, file.unwrap_or_default()),
            _ => tracing_appender::rolling::never(dir, file.unwrap_or_default()),
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_writer(writer)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[allow(clippy::too_many_arguments)]
fn run_loop(
    cfg: &vent_config::Config,
    clock: Arc<dyn Clock + Send + Sync>,
    cycles: Option<u64>,
    interval_ms: Option<u64>,
    status_every: u64,
    json: bool,
    shutdown: &AtomicBool,
) -> eyre::Result<()> {
    let mut app = app::build(cfg, clock)?;
    if let Some(ms) = interval_ms {
        app.interval = std::time::Duration::from_millis(ms.max(1));
    }
    let interval = app.interval;
    info!(
        interval_ms = interval.as_millis() as u64,
        watchdog = app.watchdog.is_some(),
        "control loop start"
    );

    let mut completed = 0u64;
    while !shutdown.load(Ordering::Relaxed) {
        app.tick_sim(interval.as_millis() as u64);
        // A failed cycle must not stop the loop; the watchdog still gets fed.
        if let Err(e) = app.system.update() {
            warn!(error = ?e, "control cycle failed");
        }
        if let Some(wd) = app.watchdog.as_mut()
            && let Err(e) = wd.feed()
        {
            // A missed feed means an imminent reset; nothing to do but say so.
            warn!(error = %e, "watchdog feed failed");
        }
        completed += 1;

        if json {
            println!("{}", serde_json::to_string(&app.system.snapshot())?);
        } else if status_every > 0 && completed.is_multiple_of(status_every) {
            print!("{}", app.system.snapshot());
        }

        if let Some(limit) = cycles
            && completed >= limit
        {
            break;
        }
        std::thread::sleep(interval);
    }

    info!(completed, "control loop stopped");
    Ok(())
}
