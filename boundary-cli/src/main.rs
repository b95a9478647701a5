// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! boundary-bench CLI
//!
//! `bench <cpu_affinity> <benchmark_type> [page_count] [region_count]`
//!
//! Results go to stdout, diagnostics to stderr. Exit status is 255 on a
//! usage error or when the isolated domain cannot be established.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use boundary_benchmark::{ReporterError, SystemInfo, TextReporter};
use boundary_core::{BenchConfig, BenchError, BenchResult, Clock, ConfigLoader, CpuAffinity};

mod commands;
mod cpu_affinity;

use commands::BenchmarkCommand;

/// Exit status for usage errors and fatal failures.
const EXIT_FATAL: u8 = 255;

/// Measure the cost of crossing an isolation boundary
#[derive(Debug, Parser)]
#[command(name = "bench")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// CPU to pin the process to, e.g. 0 (-1 means no affinity)
    #[arg(allow_negative_numbers = true)]
    pub cpu_affinity: i64,

    /// Benchmark to run
    #[arg(value_enum)]
    pub benchmark_type: BenchmarkType,

    /// Pages per region (memory_management only)
    pub page_count: Option<u32>,

    /// Regions per phase (memory_management only)
    pub region_count: Option<u32>,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BenchmarkType {
    /// Boundary-call round trips
    #[value(name = "switching")]
    Switching,
    /// Region lifecycle and heap movement
    #[value(name = "memory_management")]
    MemoryManagement,
    /// Sequential and random access
    #[value(name = "memory_access")]
    MemoryAccess,
    /// Isolated domain creation
    #[value(name = "create_enclave", alias = "create_domain")]
    CreateEnclave,
}

impl Cli {
    fn benchmark_command(&self) -> Result<BenchmarkCommand, boundary_core::UsageError> {
        Ok(match self.benchmark_type {
            BenchmarkType::Switching => BenchmarkCommand::Switching,
            BenchmarkType::MemoryManagement => {
                BenchmarkCommand::memory_management(self.page_count, self.region_count)?
            }
            BenchmarkType::MemoryAccess => BenchmarkCommand::MemoryAccess,
            BenchmarkType::CreateEnclave => BenchmarkCommand::CreateDomain,
        })
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(EXIT_FATAL),
            };
        }
    };

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(&cli) {
        Ok(()) => {
            println!("Info: bench exited.");
            ExitCode::SUCCESS
        }
        Err(err) => {
            report_fatal(&err);
            ExitCode::from(EXIT_FATAL)
        }
    }
}

fn run(cli: &Cli) -> BenchResult<()> {
    let affinity = CpuAffinity::from_raw(cli.cpu_affinity)?;
    let command = cli.benchmark_command()?;
    let config = match &cli.config {
        Some(path) => ConfigLoader::load_file(path)?,
        None => BenchConfig::default(),
    };

    if let CpuAffinity::Core(cpu) = affinity {
        match cpu_affinity::pin_current_process(cpu) {
            Ok(now) => {
                let now = now.map_or_else(|| "unknown".to_string(), |c| c.to_string());
                println!("Info: setaffinity {}, now cpu is at {}", cpu, now);
            }
            Err(err) => tracing::warn!(cpu = cpu, error = %err, "Running without CPU affinity"),
        }
    }

    println!(
        "Info: {} | clock: {}",
        SystemInfo::collect().banner(),
        Clock::source()
    );

    let report = commands::execute(command, config)?;
    TextReporter::new()
        .write(&report, &mut std::io::stdout().lock())
        .map_err(|ReporterError::Write(source)| BenchError::Io {
            context: "writing report",
            source,
        })
}

fn report_fatal(err: &BenchError) {
    tracing::error!(error = %err, "Benchmark aborted");
    if let BenchError::Domain(domain) = err {
        if let Some(suggestion) = domain.suggestion() {
            eprintln!("Info: {}", suggestion);
        }
    }
    eprintln!("Error: {}", err);
    if matches!(err, BenchError::Usage(_)) {
        eprintln!(
            "[cmd]: bench <cpu_affinity> <benchmark_type> [page_count] [region_count]\n\
             cpu_affinity: one cpu number, e.g. 0 (-1 means no affinity)\n\
             benchmark_type: switching / memory_management / memory_access / create_enclave"
        );
    }
}
