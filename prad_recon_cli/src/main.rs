//! # prad_recon_cli
//!
//! Part of the prad_recon crate family.
//!
//! This is the command line application to reconstruct PRad events.
//!
//! ## Use
//!
//! Make a template configuration with
//!
//! ```bash
//! prad_recon_cli --path config.yaml new
//! ```
//!
//! fill it out, and then run the reconstruction with
//!
//! ```bash
//! prad_recon_cli --path config.yaml
//! ```
//!
//! A progress bar is drawn for every worker. The full log is written to `./prad_recon.log`.
use clap::{Arg, Command};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};
use std::time::Duration;

use libprad_recon::config::Config;
use libprad_recon::process::process;
use libprad_recon::worker_status::{BarColor, WorkerStatus};

fn make_template_config(path: &Path) -> std::io::Result<()> {
    let config = Config::default();
    let yaml_str = serde_yaml::to_string(&config).map_err(std::io::Error::other)?;
    let mut file = File::create(path)?;
    file.write_all(yaml_str.as_bytes())
}

fn setup_logging() -> Result<(), spdlog::Error> {
    let file_sink = Arc::new(
        spdlog::sink::FileSink::builder()
            .path(PathBuf::from("./prad_recon.log"))
            .formatter(Box::new(spdlog::formatter::PatternFormatter::new(
                spdlog::formatter::pattern!(
                    "[{date_short} {time_short}] - [thread: {tid}] - [{^{level}}] - {payload}{eol}"
                ),
            )))
            .truncate(true)
            .build()?,
    );
    // Only problems go to the terminal, the bars own it otherwise
    let term_sink = Arc::new(
        spdlog::sink::StdStreamSink::builder()
            .std_stream(spdlog::sink::StdStream::Stdout)
            .level_filter(spdlog::LevelFilter::MoreSevereEqual(spdlog::Level::Warn))
            .build()?,
    );
    let logger = Arc::new(
        spdlog::Logger::builder()
            .flush_level_filter(spdlog::LevelFilter::All)
            .sink(file_sink)
            .sink(term_sink)
            .build()?,
    );
    spdlog::set_default_logger(logger);
    Ok(())
}

fn make_bar(pb_manager: &MultiProgress, status: &WorkerStatus) -> ProgressBar {
    let template = match status.color {
        BarColor::CYAN => "{prefix} [{bar:40.cyan/blue}] {percent}% {msg}",
        BarColor::MAGENTA => "{prefix} [{bar:40.magenta/blue}] {percent}% {msg}",
        BarColor::RED => "{prefix} [{bar:40.red/blue}] {percent}% {msg}",
    };
    let pb = pb_manager.add(ProgressBar::new(100));
    pb.set_style(
        ProgressStyle::with_template(template).unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    pb.set_prefix(format!("Worker {}", status.worker_id));
    pb
}

fn main() {
    // Create a cli
    let matches = Command::new("prad_recon_cli")
        .arg_required_else_help(true)
        .subcommand(Command::new("new").about("Make a template configuration yaml file"))
        .arg(
            Arg::new("path")
                .short('p')
                .long("path")
                .help("Path to the file"),
        )
        .get_matches();

    if let Err(e) = setup_logging() {
        eprintln!("Could not create logging: {e}");
        return;
    }

    // Parse the cli
    let Some(config_path) = matches.get_one::<String>("path").map(PathBuf::from) else {
        spdlog::error!("A configuration path is required (--path)");
        return;
    };

    if let Some(("new", _)) = matches.subcommand() {
        spdlog::info!(
            "Making a template config at {}...",
            config_path.to_string_lossy()
        );
        match make_template_config(&config_path) {
            Ok(()) => println!("Wrote template config to {}", config_path.display()),
            Err(e) => spdlog::error!("Could not write template config: {e}"),
        }
        return;
    }

    // Load our config
    spdlog::info!("Loading config from {}...", config_path.to_string_lossy());
    let config = match Config::read_config_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            spdlog::error!("{e}");
            return;
        }
    };
    spdlog::info!("Config successfully loaded.");
    spdlog::info!("Event Path: {}", config.event_path.to_string_lossy());
    spdlog::info!("Output Path: {}", config.output_path.to_string_lossy());
    if let Some(path) = &config.recon_config_path {
        spdlog::info!("Reconstruction Settings: {}", path.to_string_lossy());
    }
    if let Some(path) = &config.coord_path {
        spdlog::info!("Coordinates: {}", path.to_string_lossy());
    }
    if let Some(path) = &config.calib_path {
        spdlog::info!("Calibration: {}", path.to_string_lossy());
    }
    if let Some(path) = &config.pedestal_path {
        spdlog::info!("Pedestals: {}", path.to_string_lossy());
    }
    spdlog::info!(
        "Run: {} Pedestal Run: {} Workers: {}",
        config.run_number,
        config.pedestal_run,
        config.n_threads
    );

    let pb_manager = MultiProgress::new();
    let mut bars: Vec<Option<ProgressBar>> = Vec::new();
    let (tx, rx) = mpsc::channel::<WorkerStatus>();
    // Spawn the task!
    let handle = std::thread::spawn(move || process(config, tx));

    loop {
        match rx.recv_timeout(Duration::from_millis(500)) {
            Ok(status) => {
                let id = status.worker_id;
                if bars.len() <= id {
                    bars.resize(id + 1, None);
                }
                let pb = bars[id].get_or_insert_with(|| make_bar(&pb_manager, &status));
                pb.set_position((status.progress * 100.0) as u64);
                pb.set_message(format!(
                    "{} run {}: {} events",
                    status.color.label(),
                    status.run_number,
                    status.events_done
                ));
            }
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            // Every sender is gone, so the processor returned
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    let succeeded = match handle.join() {
        Ok(Ok(())) => {
            spdlog::info!("Successfully reconstructed data!");
            true
        }
        Ok(Err(e)) => {
            spdlog::error!("Reconstruction failed with error: {e}");
            false
        }
        Err(_) => {
            spdlog::error!("Failed to join reconstruction task!");
            false
        }
    };

    for pb in bars.into_iter().flatten() {
        if succeeded {
            pb.finish();
        } else {
            pb.abandon_with_message(BarColor::RED.label());
        }
    }

    spdlog::info!("Done.");
}
