//! Stream a file over DMA and report per-run totals
//!
//! Usage: `cargo run --example dma_stats -- <file>`

use popcount_driver::prelude::*;
use popcount_driver::{count_stream, cross_check, DmaBufferInfo};
use std::fs::File;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("popcount_driver=debug")
        .init();

    let path = std::env::args().nth(1).unwrap_or_else(|| "data.bin".into());
    let cfg = DeviceConfig::default();

    let info = DmaBufferInfo::locate(&cfg.udmabuf_sysfs)?;
    println!("u-dma-buf");
    println!("  phys_addr: {:#010x}", info.phys_addr);
    println!("  size:      {} bytes", info.size);
    println!("  capacity:  {} bytes", info.capacity(cfg.dma_max_transfer));

    let mut backend = DmaBackend::open(&cfg)?;
    let stats = backend.stream(&mut File::open(&path)?)?;
    println!("\n{path}");
    println!("  chunks:    {}", stats.chunks);
    println!("  bytes:     {}", stats.bytes);
    println!("  count:     {}", stats.count);

    let software = count_stream(&mut File::open(&path)?)?;
    let verdict = match cross_check(u64::from(stats.count), software) {
        Ok(()) => "match",
        Err(_) => "MISMATCH",
    };
    println!("  software:  {software} ({verdict})");
    Ok(())
}
