use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use midimon::{
    ConsoleOutput, DeviceManager, IgnoreFilter, MidiBackend, MidirBackend, Monitor,
    MonitorSettings,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Print incoming MIDI messages from every input device")]
struct Cli {
    /// Settings file to use instead of the per-user one.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Wait between loop iterations in milliseconds.
    #[arg(long)]
    interval_ms: Option<u64>,
    /// Client name registered with the MIDI driver.
    #[arg(long)]
    client_name: Option<String>,
    /// Message classes to drop before they are printed.
    #[arg(long, value_enum)]
    ignore: Option<IgnoreArg>,
    /// List the MIDI inputs currently available and exit.
    #[arg(long)]
    list: bool,
    /// Diagnostic log filter, e.g. `debug` or `midimon=trace`.
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum IgnoreArg {
    None,
    Sysex,
    Time,
    ActiveSense,
    All,
}

impl From<IgnoreArg> for IgnoreFilter {
    fn from(value: IgnoreArg) -> Self {
        match value {
            IgnoreArg::None => IgnoreFilter::None,
            IgnoreArg::Sysex => IgnoreFilter::Sysex,
            IgnoreArg::Time => IgnoreFilter::Time,
            IgnoreArg::ActiveSense => IgnoreFilter::ActiveSense,
            IgnoreArg::All => IgnoreFilter::All,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match &cli.log_level {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::from_default_env(),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .ok();

    let settings = load_settings(&cli)?;
    let manager = DeviceManager::new();
    let backend = MidirBackend::new(manager.sink(), &settings);

    if cli.list {
        return list_inputs(backend);
    }

    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    ctrlc::set_handler(move || {
        running_clone.store(false, Ordering::SeqCst);
    })
    .context("failed to install Ctrl-C handler")?;

    let mut monitor = Monitor::new(
        manager,
        backend,
        ConsoleOutput::default(),
        settings.poll_interval(),
    );
    monitor.run(&running);
    Ok(())
}

fn load_settings(cli: &Cli) -> Result<MonitorSettings> {
    let mut settings = match &cli.config {
        Some(path) => MonitorSettings::load_from(path)?,
        None => MonitorSettings::load_default().context("failed to load settings")?,
    };
    if let Some(interval) = cli.interval_ms {
        settings.poll_interval_ms = interval;
    }
    if let Some(name) = &cli.client_name {
        settings.client_name = name.clone();
    }
    if let Some(ignore) = cli.ignore {
        settings.ignore = ignore.into();
    }
    Ok(settings)
}

fn list_inputs(mut backend: impl MidiBackend) -> Result<()> {
    let devices = backend
        .enumerate()
        .context("failed to list MIDI inputs")?;
    if devices.is_empty() {
        println!("No MIDI input ports detected.");
    } else {
        println!("Available MIDI inputs:");
        for device in devices {
            println!("  {}: {} ({})", device.index, device.name, device.identity);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_settings() {
        let cli = Cli::parse_from([
            "midimon",
            "--interval-ms",
            "20",
            "--ignore",
            "active-sense",
            "--client-name",
            "probe",
        ]);
        let settings = load_settings(&cli).unwrap();
        assert_eq!(settings.poll_interval_ms, 20);
        assert_eq!(settings.ignore, IgnoreFilter::ActiveSense);
        assert_eq!(settings.client_name, "probe");
    }
}
