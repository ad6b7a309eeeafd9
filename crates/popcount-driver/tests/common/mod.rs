//! Shared fixtures for integration tests

#![allow(dead_code)]

use popcount_driver::sim::{Fault, SimAccelerator, SimMemory};
use popcount_driver::{Accelerator, DeviceConfig, DmaBackend, DmaBuffer};
use std::time::Duration;

/// Physical address the simulated u-dma-buf lives at.
pub const PHYS: u64 = 0x1f00_0000;

pub fn config() -> DeviceConfig {
    DeviceConfig::default().with_poll_timeout(Duration::from_millis(20))
}

/// DMA backend over a simulated device whose buffer holds `capacity` bytes.
pub fn sim_backend(capacity: usize, fault: Fault) -> DmaBackend<SimAccelerator, SimMemory> {
    let cfg = config();
    let (sim, mem) = SimAccelerator::new(&cfg, PHYS, capacity);
    let accel = Accelerator::new(sim.with_fault(fault), &cfg);
    let buffer = DmaBuffer::new(mem, PHYS, capacity).expect("buffer");
    DmaBackend::from_parts(accel, buffer)
}

/// Deterministic pseudo-random bytes (xorshift).
pub fn noise(len: usize, mut seed: u32) -> Vec<u8> {
    (0..len)
        .map(|_| {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            seed.to_le_bytes()[1]
        })
        .collect()
}
