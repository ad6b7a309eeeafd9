//! Resource discovery and mapping against a fake device tree
//!
//! Regular files stand in for `/dev/uio0`, `/dev/udmabuf0` and the u-dma-buf
//! sysfs attributes. The mappings are real `mmap`s; only the hardware
//! behind them is missing, so the engine never reports completion.

use popcount_driver::{
    select_backend, BackendSelection, BackendType, DeviceConfig, DmaBackend, MmioBackend,
    PopcountBackend, PopcountError, RegisterIo,
};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

struct FakeBoard {
    dir: TempDir,
}

impl FakeBoard {
    fn new(phys_addr: &str, size: &str, udmabuf_len: u64) -> Self {
        let dir = TempDir::new().unwrap();
        let sysfs = dir.path().join("sysfs");
        std::fs::create_dir(&sysfs).unwrap();
        std::fs::write(sysfs.join("phys_addr"), phys_addr).unwrap();
        std::fs::write(sysfs.join("size"), size).unwrap();

        let uio = std::fs::File::create(dir.path().join("uio0")).unwrap();
        uio.set_len(0x1_0000).unwrap();
        let udmabuf = std::fs::File::create(dir.path().join("udmabuf0")).unwrap();
        udmabuf.set_len(udmabuf_len).unwrap();
        Self { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn config(&self) -> DeviceConfig {
        DeviceConfig::default()
            .with_uio(self.path("uio0"), 0x1_0000)
            .with_udmabuf(self.path("udmabuf0"), self.path("sysfs"))
            .with_poll_timeout(Duration::from_millis(5))
    }
}

#[test]
fn opens_both_mappings_with_capacity_capped_by_engine() {
    let board = FakeBoard::new("0x1f000000\n", "1048576\n", 1 << 20);
    let backend = DmaBackend::open(&board.config()).unwrap();
    assert_eq!(backend.accelerator().transfer_limit(), 8192);
    assert_eq!(backend.backend_type(), BackendType::Dma);
}

#[test]
fn small_buffer_limits_capacity() {
    let board = FakeBoard::new("0x1f000000", "4096", 4096);
    let backend = DmaBackend::open(&board.config()).unwrap();
    assert_eq!(backend.accelerator().transfer_limit(), 4096);
}

#[test]
fn zero_size_fails_before_mapping() {
    let board = FakeBoard::new("0x1f000000", "0\n", 4096);
    let err = DmaBackend::open(&board.config()).unwrap_err();
    match err {
        PopcountError::ResourceUnavailable { resource, .. } => {
            assert_eq!(resource, board.path("sysfs").join("size"));
        }
        other => panic!("expected ResourceUnavailable, got {other}"),
    }
}

#[test]
fn missing_uio_is_unavailable() {
    let board = FakeBoard::new("0x1f000000", "8192", 8192);
    std::fs::remove_file(board.path("uio0")).unwrap();
    let err = DmaBackend::open(&board.config()).unwrap_err();
    assert!(
        matches!(err, PopcountError::ResourceUnavailable { ref resource, .. } if resource.ends_with("uio0")),
        "{err}"
    );
}

#[test]
fn undersized_buffer_device_is_mapping_failure() {
    let board = FakeBoard::new("0x1f000000", "8192", 1024);
    let err = DmaBackend::open(&board.config()).unwrap_err();
    assert!(matches!(err, PopcountError::MappingFailed { .. }), "{err}");
}

#[test]
fn silent_engine_times_out() {
    let board = FakeBoard::new("0x1f000000", "8192", 8192);
    let mut backend = DmaBackend::open(&board.config()).unwrap();
    let err = backend.count(&mut Cursor::new(vec![0xFFu8; 16])).unwrap_err();
    assert!(
        matches!(err, PopcountError::HardwareTimeout { operation: "MM2S idle", .. }),
        "{err}"
    );
    // The protocol got as far as programming the source and length.
    let regs = backend.accelerator().registers();
    assert_eq!(regs.read32(0x1018).unwrap(), 0x1f00_0000);
    assert_eq!(regs.read32(0x1028).unwrap(), 16);
    assert_eq!(regs.read32(0x0).unwrap(), 1);
}

fn is_mapped(path: &Path) -> bool {
    let maps = std::fs::read_to_string("/proc/self/maps").unwrap();
    maps.lines().any(|line| line.ends_with(path.to_str().unwrap()))
}

#[test]
fn buffer_unmapped_when_uio_open_fails() {
    let board = FakeBoard::new("0x1f000000", "8192", 8192);
    let udmabuf = std::fs::canonicalize(board.path("udmabuf0")).unwrap();
    std::fs::remove_file(board.path("uio0")).unwrap();

    let err = DmaBackend::open(&board.config()).unwrap_err();
    assert!(matches!(err, PopcountError::ResourceUnavailable { .. }), "{err}");
    assert!(!is_mapped(&udmabuf), "{} still mapped", udmabuf.display());
}

#[test]
fn both_regions_unmapped_on_drop() {
    let board = FakeBoard::new("0x1f000000", "8192", 8192);
    let udmabuf = std::fs::canonicalize(board.path("udmabuf0")).unwrap();
    let uio = std::fs::canonicalize(board.path("uio0")).unwrap();

    let backend = DmaBackend::open(&board.config()).unwrap();
    assert!(is_mapped(&udmabuf));
    assert!(is_mapped(&uio));

    drop(backend);
    assert!(!is_mapped(&udmabuf));
    assert!(!is_mapped(&uio));
}

#[test]
fn regions_unmapped_after_failed_transfer() {
    let board = FakeBoard::new("0x1f000000", "8192", 8192);
    let udmabuf = std::fs::canonicalize(board.path("udmabuf0")).unwrap();
    let uio = std::fs::canonicalize(board.path("uio0")).unwrap();

    let mut backend = DmaBackend::open(&board.config()).unwrap();
    assert!(backend.count(&mut Cursor::new(vec![1u8; 8])).is_err());
    drop(backend);
    assert!(!is_mapped(&udmabuf));
    assert!(!is_mapped(&uio));
}

#[test]
fn mmio_backend_writes_reach_counter_register() {
    let board = FakeBoard::new("0x1f000000", "8192", 8192);
    let mut backend = MmioBackend::open(&board.config()).unwrap();
    // A plain file just keeps the last word written.
    let last = backend
        .count(&mut Cursor::new(vec![0x00, 0x00, 0x00, 0x00, 0x07]))
        .unwrap();
    assert_eq!(last, 7);
}

#[test]
fn auto_uses_dma_when_resources_exist() {
    let board = FakeBoard::new("0x1f000000", "8192", 8192);
    let backend = select_backend(BackendSelection::Auto, &board.config()).unwrap();
    assert_eq!(backend.backend_type(), BackendType::Dma);
}

#[test]
fn auto_falls_back_on_unparsable_sysfs() {
    let board = FakeBoard::new("zzz", "8192", 8192);
    let backend = select_backend(BackendSelection::Auto, &board.config()).unwrap();
    assert_eq!(backend.backend_type(), BackendType::Software);
}
