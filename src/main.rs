use std::fs::OpenOptions;

use anyhow::{Context, Result, bail};
use log::LevelFilter;
use owo_colors::OwoColorize;

use fatshell::Volume;
use fatshell::shell::Shell;

// ─── Logging ───────────────────────────────────────────────────────────────────

struct StderrLogger;

static LOGGER: StderrLogger = StderrLogger;

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let level = record.level();
        let tag = format!("{level:5}");
        let tag = match level {
            log::Level::Error => tag.bright_red().to_string(),
            log::Level::Warn => tag.bright_yellow().to_string(),
            log::Level::Info => tag.bright_blue().to_string(),
            log::Level::Debug => tag.bright_cyan().to_string(),
            log::Level::Trace => tag.bright_magenta().to_string(),
        };
        eprintln!("{tag} {}", record.args());
    }

    fn flush(&self) {}
}

fn init_logger() {
    let level = std::env::var("FATSHELL_LOG")
        .ok()
        .and_then(|v| v.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::Warn);
    log::set_max_level(level);
    let _ = log::set_logger(&LOGGER);
}

// ─── Entry point ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    init_logger();

    let mut args = std::env::args().skip(1);
    let image_path = match args.next() {
        Some(p) => p,
        None => bail!("usage: fatshell <image>"),
    };
    if args.next().is_some() {
        bail!("usage: fatshell <image>");
    }

    let disk = OpenOptions::new()
        .read(true)
        .write(true)
        .open(&image_path)
        .with_context(|| format!("cannot open image {image_path}"))?;
    let volume = Volume::mount(disk)
        .with_context(|| format!("{image_path} is not a usable FAT volume"))?;

    Shell::new(volume).run()?;
    Ok(())
}
