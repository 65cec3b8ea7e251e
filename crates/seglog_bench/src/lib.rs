//! Benchmark utilities.

use rand::Rng;
use seglog_core::{Config, Log};
use tempfile::TempDir;

/// Generate random record data of the specified size.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Segment limits large enough that benchmarks measure appends, not
/// rollover, unless they ask for it.
pub fn large_segments() -> Config {
    Config::new()
        .max_store_bytes(1024 * 1024 * 1024)
        .max_index_bytes(64 * 1024 * 1024)
}

/// Open a log in a fresh temporary directory.
///
/// The directory is removed when the returned guard drops.
pub fn temp_log(config: Config) -> (TempDir, Log) {
    let dir = TempDir::new().unwrap();
    let log = Log::open(dir.path(), config).unwrap();
    (dir, log)
}

/// Open a log pre-filled with `count` records of `size` bytes.
pub fn filled_log(config: Config, count: usize, size: usize) -> (TempDir, Log) {
    let (dir, log) = temp_log(config);
    let data = random_data(size);
    for _ in 0..count {
        log.append(&data).unwrap();
    }
    (dir, log)
}
