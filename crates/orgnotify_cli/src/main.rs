//! `orgnotify` entry point.
//!
//! # Responsibility
//! - Parse arguments, load the selected config section, start logging.
//! - Wire the command-based renderer and delivery into one run.
//! - Map outcomes onto process exit codes.

use clap::Parser;
use log::{error, info};
use orgnotify_core::db::open_db;
use orgnotify_core::{
    init_logging, CommandDelivery, CommandRenderer, LogLevel, NotificationRun, RunContext,
    RunError, SectionConfig,
};
use std::process::ExitCode;

mod cli;

use cli::Cli;

const EXIT_CONFIG_ERROR: u8 = 1;
const EXIT_GENERATION_FAILURE: u8 = 3;
const EXIT_STORE_FAILURE: u8 = 4;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.log_level.parse::<LogLevel>() {
        Ok(level) => level,
        Err(message) => {
            eprintln!("CRITICAL {message}");
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let config = match SectionConfig::load(&cli.config, &cli.section) {
        Ok(config) => config,
        Err(err) => {
            if init_logging(level, None).is_err() {
                eprintln!("ERROR {err}");
            }
            error!("event=config_load module=cli status=error error={err}");
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    if let Err(message) = init_logging(level, config.log_dir.as_deref()) {
        eprintln!("ERROR {message}");
        return ExitCode::from(EXIT_CONFIG_ERROR);
    }

    let code = run(&cli.section, &config);
    log::logger().flush();
    code
}

fn run(section: &str, config: &SectionConfig) -> ExitCode {
    info!(
        "event=run module=cli status=start section={section} version={}",
        orgnotify_core::core_version()
    );

    let store = match open_db(&config.database) {
        Ok(store) => store,
        Err(err) => {
            error!("event=run module=cli status=error step=open_store error={err}");
            return ExitCode::from(EXIT_STORE_FAILURE);
        }
    };

    let renderer = CommandRenderer::new(config.renderer.clone(), &config.database);
    let delivery = CommandDelivery::new(config.delivery.clone());
    let ctx = RunContext::from_config(config, today_utc());

    match NotificationRun::new(&store, &renderer, &delivery).execute(&ctx) {
        Ok(report) => {
            info!(
                "event=run module=cli status=ok resolved={} artifacts={} no_content={} delivery={:?} delivered_deleted={} ineligible_deleted={}",
                report.resolved.len(),
                report.generation.created_count(),
                report.generation.no_content.len(),
                report.delivery,
                report
                    .delivered_deleted
                    .map_or_else(|| "skipped".to_string(), |count| count.to_string()),
                report.ineligible_deleted
            );
            ExitCode::SUCCESS
        }
        Err(RunError::Generation(err)) => {
            error!("event=run module=cli status=error step=generate error={err}");
            ExitCode::from(EXIT_GENERATION_FAILURE)
        }
        Err(err) => {
            error!("event=run module=cli status=error error={err}");
            ExitCode::from(EXIT_STORE_FAILURE)
        }
    }
}

fn today_utc() -> chrono::NaiveDate {
    chrono::Utc::now().date_naive()
}
