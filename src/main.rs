#[cfg(not(feature = "cli"))]
compile_error!("The `pdu` binary requires the `cli` feature. Build with `--features cli`.");

use clap::Parser;
use std::fs::File;
use std::io::Write;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use pdu::cli;
use pdu::cli::app::{Cli, ColorMode, Commands};
use pdu::PduError;

/// Send diagnostics to stderr; `--log-level` wins over `RUST_LOG`.
fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(l) => EnvFilter::try_new(l).ok(),
        None => EnvFilter::try_from_default_env().ok(),
    }
    .unwrap_or_else(|| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();

    init_logging(cli.log_level.as_deref());

    // Configure rayon thread pool if --threads was specified
    if cli.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(cli.threads)
            .build_global()
            .ok(); // Ignore if already initialized
    }

    match cli.color {
        ColorMode::Always => colored::control::set_override(true),
        ColorMode::Never => colored::control::set_override(false),
        ColorMode::Auto => {} // colored auto-detects tty
    }

    let writer_result: Result<Box<dyn Write>, PduError> = match &cli.output {
        Some(path) => File::create(path)
            .map(|f| Box::new(f) as Box<dyn Write>)
            .map_err(|e| PduError::Io(format!("Cannot create {}: {}", path, e))),
        None => Ok(Box::new(std::io::stdout()) as Box<dyn Write>),
    };

    let mut writer = match writer_result {
        Ok(w) => w,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Info {
            file,
            page,
            verbose,
            json,
        } => cli::info::execute(
            &cli::info::InfoOptions {
                file,
                page,
                verbose,
                json,
                mmap: cli.mmap,
            },
            &mut writer,
        ),

        Commands::Scan { dir, verbose, json } => cli::scan::execute(
            &cli::scan::ScanOptions {
                dir,
                verbose,
                json,
                mmap: cli.mmap,
            },
            &mut writer,
        ),

        Commands::Unload {
            file,
            schema,
            table,
            format,
            page,
        } => cli::unload::execute(
            &cli::unload::UnloadOptions {
                file,
                schema,
                table,
                format,
                page,
                mmap: cli.mmap,
            },
            &mut writer,
        ),

        Commands::Dropscan {
            file,
            schema,
            table,
            probe_step,
            region_size,
            start,
            stop,
            verbose,
            json,
        } => {
            // Ctrl+C stops the scan; pages found so far are still written
            let cancel = Arc::new(AtomicBool::new(false));
            let flag = Arc::clone(&cancel);
            if let Err(e) = ctrlc::set_handler(move || {
                flag.store(true, Ordering::SeqCst);
            }) {
                tracing::warn!(error = %e, "cannot set Ctrl+C handler");
            }
            cli::dropscan::execute(
                &cli::dropscan::DropscanOptions {
                    file,
                    schema,
                    table,
                    probe_step,
                    region_size,
                    start,
                    stop,
                    verbose,
                    json,
                    mmap: cli.mmap,
                    threads: cli.threads,
                    cancel: Some(cancel),
                },
                &mut writer,
            )
        }

        Commands::Completions { shell } => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            clap_complete::generate(shell, &mut cmd, "pdu", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = writer.flush() {
        tracing::debug!(error = %e, "flush failed");
    }

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
