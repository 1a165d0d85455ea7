mod app;
mod cli;
mod config;
mod connection;
mod keyboard;
mod monitor;
mod piano;
mod prefs;
mod protocol;
mod store;
mod tui;
mod workflow;

use std::fs::File;
use std::io::Write;
use std::sync::{Mutex, OnceLock};
use std::time::SystemTime;

use clap::Parser;
use cli::{Cli, Command};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = config::load(cli.config.as_deref())?;
    if let Some(server) = cli.server {
        config.server = server;
    }
    config::init(config);

    match cli.command {
        None => {
            init_file_logger();
            let app = new_app()?;
            tui::run(app)
        }
        Some(Command::Monitor(args)) => {
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
                .init();
            let app = new_app()?;
            monitor::run(app, args)
        }
        Some(Command::Layout { low, high }) => {
            monitor::layout(keyboard::KeyRange::new(low, high));
            Ok(())
        }
    }
}

fn new_app() -> anyhow::Result<app::App> {
    let url = connection::endpoint_url(config::server())?;
    let prefs = prefs::Preferences::load(config::prefs_file());
    Ok(app::App::new(url, prefs))
}

/// Logger for TUI mode. The terminal belongs to the UI, so records go to the
/// configured log file, one `[HH:MM:SS.mmm LEVEL] message` line each.
struct FileLogger {
    file: Mutex<File>,
}

impl log::Log for FileLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            let now = SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .unwrap_or_default();
            let secs = now.as_secs() % 86400; // time of day
            let h = secs / 3600;
            let m = (secs % 3600) / 60;
            let s = secs % 60;
            let ms = now.subsec_millis();
            if let Ok(mut file) = self.file.lock() {
                let _ = writeln!(
                    file,
                    "[{h:02}:{m:02}:{s:02}.{ms:03} {}] {}",
                    record.level(),
                    record.args()
                );
            }
        }
    }

    fn flush(&self) {
        if let Ok(mut file) = self.file.lock() {
            let _ = file.flush();
        }
    }
}

static FILE_LOGGER: OnceLock<FileLogger> = OnceLock::new();

fn init_file_logger() {
    let Some(path) = config::log_file() else {
        log::set_max_level(log::LevelFilter::Off);
        return;
    };
    let file = match File::options().create(true).append(true).open(path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Cannot open log file {}: {e}", path.display());
            return;
        }
    };
    let logger = FILE_LOGGER.get_or_init(|| FileLogger {
        file: Mutex::new(file),
    });
    if log::set_logger(logger).is_ok() {
        log::set_max_level(
            std::env::var("RUST_LOG")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(log::LevelFilter::Info),
        );
    }
}
