mod config;
mod convert;
mod gateway;
mod lh;
mod logging;
mod qm;
mod server;
mod shutdown;
mod task;
mod ticker;
mod utils;
mod wire;

use std::process;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use config::AppConfig;
use gateway::Gateway;
use lh::OfflineLibraryHandler;
use logging::{LogLevel, Logger, LoggerConfig};
use serde_json::json;
use server::TcpServer;
use shutdown::ShutdownHooks;
use task::{Scheduler, SystemClock};
use ticker::Ticker;
use utils::runtime::ensure_posix_or_exit;
use utils::startup_banner::print_startup_banner;
use utils::timing::timed_step;

const IDLE_SLEEP: Duration = Duration::from_millis(5);

fn main() {
    ensure_posix_or_exit();

    let (app_config, source) = match AppConfig::load_with_discovery(std::env::args().skip(1)) {
        Ok(loaded) => loaded,
        Err(error) => {
            eprintln!("configuration error: {error}");
            process::exit(2);
        }
    };
    print_startup_banner(&source);

    let log_level = app_config.log_level().unwrap_or_else(|error| {
        eprintln!("configuration error: {error}");
        process::exit(2);
    });
    let min_version = app_config.min_client_version().unwrap_or_else(|error| {
        eprintln!("configuration error: {error}");
        process::exit(2);
    });
    let logger = Arc::new(Logger::new(LoggerConfig {
        min_level: log_level,
        human_friendly: app_config.logging.human_friendly,
    }));

    if let Err(error) = qm::initialize(app_config.queues.max_queues) {
        eprintln!("queue manager initialization error: {error}");
        process::exit(2);
    }
    let tables =
        timed_step("tables.load", &logger, task::tables::install).unwrap_or_else(|error| {
            eprintln!("state table error: {error}");
            process::exit(2);
        });
    logger.log(
        LogLevel::Info,
        Some("main::task"),
        "State tables loaded",
        Some(json!({
            "tables": tables.all().iter().map(|table| table.id().as_str()).collect::<Vec<_>>(),
            "task_slots": app_config.queues.task_slots,
        })),
    );

    let scheduler = Scheduler::shared(
        app_config.task_config(),
        tables,
        Box::new(SystemClock),
        Arc::clone(&logger),
    )
    .unwrap_or_else(|error| {
        eprintln!("task scheduler error: {error}");
        process::exit(2);
    });
    let scheduler = Arc::new(Mutex::new(scheduler));

    let server = TcpServer::from_app_config(&app_config, Arc::clone(&logger))
        .unwrap_or_else(|error| {
            eprintln!("server startup error: {error}");
            process::exit(2);
        });
    let bound_addr = server.local_addr().unwrap_or_else(|error| {
        eprintln!("server startup error: failed to read local address: {error}");
        process::exit(2);
    });
    logger.log(
        LogLevel::Info,
        Some("main::server"),
        &format!(
            "{} v{} listening",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION")
        ),
        Some(json!({
            "bind_address": bound_addr.to_string(),
            "max_frame_bytes": app_config.server.max_frame_bytes,
            "min_client_version": min_version.code(),
        })),
    );

    let mut gateway = Gateway::new(
        Arc::clone(&scheduler),
        OfflineLibraryHandler::default(),
        Arc::clone(&logger),
        min_version,
    );
    logger.warn(
        Some("main::library"),
        "No library handler attached; every request is answered LIBRARY_NOT_AVAILABLE",
    );

    let tick_scheduler = Arc::clone(&scheduler);
    let mut ticker = Ticker::new(app_config.ticker.interval_ms, move || {
        tick_scheduler
            .lock()
            .expect("scheduler mutex poisoned")
            .tick();
    })
    .unwrap_or_else(|error| {
        eprintln!("ticker configuration error: {error}");
        process::exit(2);
    });
    if let Err(error) = ticker.start() {
        eprintln!("ticker startup error: {error}");
        process::exit(2);
    }

    let shutdown_hooks = ShutdownHooks::install().unwrap_or_else(|error| {
        eprintln!("failed to install shutdown hooks: {error}");
        process::exit(2);
    });
    logger.info(
        Some("main::shutdown"),
        &format!(
            "Termination signals hooked; a second signal exits with code {}",
            shutdown::FORCED_EXIT_CODE
        ),
    );

    while !shutdown_hooks.is_triggered() {
        if server.poll(&mut gateway).is_idle() {
            thread::sleep(IDLE_SLEEP);
        }
    }

    logger.info(
        Some("main::shutdown"),
        "Shutdown signal received, closing client sessions",
    );
    if let Err(error) = ticker.stop() {
        logger.warn(Some("main::shutdown"), &error.to_string());
    }
    server.shutdown_all_connections(&mut gateway);
    drop(server);

    let remaining = scheduler
        .lock()
        .expect("scheduler mutex poisoned")
        .active_tasks();
    if let Ok(status) = qm::with_manager(|manager| Ok(manager.manager_status())) {
        logger.log(
            LogLevel::Debug,
            Some("main::shutdown"),
            "Queue manager state at shutdown",
            serde_json::to_value(status).ok(),
        );
    }
    drop(gateway);
    drop(scheduler);
    if let Err(error) = qm::teardown() {
        logger.warn(Some("main::shutdown"), &error.to_string());
    }
    logger.log(
        LogLevel::Info,
        Some("main::shutdown"),
        "Shutdown completed",
        Some(json!({ "tasks_abandoned": remaining })),
    );
}
