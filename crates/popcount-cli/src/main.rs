// SPDX-License-Identifier: AGPL-3.0-only

//! `popcount`: count the set bits of a file on the popcount accelerator.
//!
//! ```text
//! USAGE:
//!   popcount <INPUT>                     DMA through /dev/udmabuf0 (default)
//!   popcount -b mmio <INPUT>             one register write per word
//!   popcount -b software <INPUT>         host CPU only
//!   popcount -b auto --verify <INPUT>    best available, checked against software
//! ```
//!
//! Prints `Counted N ones` on stdout. Diagnostics go to stderr; any failure
//! exits with status 1.

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{Parser, ValueEnum};
use popcount_driver::{count_stream, cross_check, select_backend, BackendSelection, DeviceConfig};
use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "popcount", about = "Count set bits with the popcount accelerator", version)]
struct Cli {
    /// File to count.
    input: PathBuf,

    /// Counting backend.
    #[arg(short, long, value_enum, default_value_t = Backend::Dma)]
    backend: Backend,

    /// Also count in software and fail if the results differ.
    #[arg(long)]
    verify: bool,

    /// UIO device exposing the accelerator registers.
    #[arg(long, default_value = "/dev/uio0")]
    uio: PathBuf,

    /// Size of the UIO window in bytes.
    #[arg(long, default_value = "0x10000", value_parser = parse_size)]
    uio_size: usize,

    /// u-dma-buf device backing the DMA buffer.
    #[arg(long, default_value = "/dev/udmabuf0")]
    udmabuf: PathBuf,

    /// sysfs directory with the u-dma-buf `phys_addr` and `size` attributes.
    #[arg(long, default_value = "/sys/class/u-dma-buf/udmabuf0")]
    udmabuf_sysfs: PathBuf,

    /// Offset of the AXI DMA registers inside the UIO window.
    #[arg(long, default_value = "0x1000", value_parser = parse_size)]
    dma_offset: usize,

    /// Largest single DMA transfer in bytes.
    #[arg(long, default_value = "8192", value_parser = parse_size)]
    dma_max_transfer: usize,

    /// Bound on each DMA status wait, in milliseconds.
    #[arg(long, default_value_t = 100)]
    timeout_ms: u64,

    /// Log driver progress (overridden by RUST_LOG).
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Backend {
    /// DMA if available, otherwise software.
    Auto,
    /// AXI DMA from the u-dma-buf.
    Dma,
    /// Programmed I/O into the counter register.
    Mmio,
    /// Host CPU only.
    Software,
}

impl From<Backend> for BackendSelection {
    fn from(b: Backend) -> Self {
        match b {
            Backend::Auto => Self::Auto,
            Backend::Dma => Self::Dma,
            Backend::Mmio => Self::Mmio,
            Backend::Software => Self::Software,
        }
    }
}

impl Cli {
    fn device_config(&self) -> DeviceConfig {
        DeviceConfig::default()
            .with_uio(&self.uio, self.uio_size)
            .with_udmabuf(&self.udmabuf, &self.udmabuf_sysfs)
            .with_dma(self.dma_offset, self.dma_max_transfer)
            .with_poll_timeout(Duration::from_millis(self.timeout_ms))
    }
}

/// Accept decimal or `0x`-prefixed hexadecimal.
fn parse_size(s: &str) -> Result<usize, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16),
        None => s.parse(),
    };
    match parsed {
        Ok(0) => Err("must be greater than zero".into()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.exit()
        }
        Err(e) => {
            let _ = e.print();
            return ExitCode::FAILURE;
        }
    };

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(&cli) {
        Ok(count) => {
            println!("Counted {count} ones");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("popcount: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<u64> {
    let cfg = cli.device_config();
    let mut backend = select_backend(cli.backend.into(), &cfg).context("backend init")?;
    tracing::info!("Backend: {}", backend.backend_type());

    let mut input = File::open(&cli.input)
        .with_context(|| format!("open() {}", cli.input.display()))?;
    let count = backend
        .count(&mut input)
        .with_context(|| format!("{} count of {}", backend.backend_type(), cli.input.display()))?;

    if cli.verify && backend.backend_type().is_hardware() {
        let mut again = File::open(&cli.input)
            .with_context(|| format!("open() {}", cli.input.display()))?;
        let software = count_stream(&mut again)
            .with_context(|| format!("software count of {}", cli.input.display()))?;
        cross_check(count, software).context("verify")?;
        tracing::info!("Hardware and software agree: {count}");
    }

    Ok(count)
}
