//! Rolling history of observed download speeds.
//!
//! Samples are stored as one decimal integer (bytes per second) per line in
//! a flat text file. Only the most recent [`MAX_SPEED_SAMPLES`] are kept.
//! The representative speed is the mode of the samples after rounding each
//! one to a bin whose width scales with the mean.
//!
//! Storage failures never abort the caller: they are logged and the store
//! behaves as if it had no history.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::Result;

/// Maximum number of samples kept on disk.
pub const MAX_SPEED_SAMPLES: usize = 10;

/// Smallest histogram bin, in bytes per second.
pub const MIN_BIN_SIZE: u64 = 50_000;

/// Default file name of the history record.
pub const SPEED_HISTORY_FILE: &str = "last_speed.txt";

/// Flat-file store of recent transfer speeds.
#[derive(Debug, Clone)]
pub struct SpeedHistory {
    path: PathBuf,
}

impl SpeedHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored samples in insertion order. A missing file is an empty history.
    pub fn samples(&self) -> Result<Vec<u64>> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(parse_samples(&contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Append a sample and persist the last [`MAX_SPEED_SAMPLES`].
    pub fn record(&self, speed_bps: u64) {
        let mut speeds = self.samples().unwrap_or_else(|e| {
            warn!("Failed to load speeds for saving: {}", e);
            Vec::new()
        });

        speeds.push(speed_bps);
        if speeds.len() > MAX_SPEED_SAMPLES {
            speeds.drain(..speeds.len() - MAX_SPEED_SAMPLES);
        }

        let contents: String = speeds.iter().map(|s| format!("{s}\n")).collect();
        match std::fs::write(&self.path, contents) {
            Ok(()) => debug!(
                "Recorded speed {} B/s ({} samples) in {}",
                speed_bps,
                speeds.len(),
                self.path.display()
            ),
            Err(e) => warn!("Failed to save speeds to {}: {}", self.path.display(), e),
        }
    }

    /// Most frequent binned speed, or `None` when there is no usable history.
    pub fn representative(&self) -> Option<u64> {
        match self.samples() {
            Ok(samples) => representative_speed(&samples),
            Err(e) => {
                warn!("Failed to load speeds from {}: {}", self.path.display(), e);
                None
            }
        }
    }
}

fn parse_samples(contents: &str) -> Vec<u64> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && line.bytes().all(|b| b.is_ascii_digit()))
        .filter_map(|line| line.parse().ok())
        .collect()
}

/// Bin width for a given mean: 5% of the mean, never below [`MIN_BIN_SIZE`].
pub fn bin_size(mean: f64) -> u64 {
    MIN_BIN_SIZE.max((mean * 0.05) as u64)
}

/// Round `speed` to the nearest multiple of `bin`, saturating near `u64::MAX`.
pub fn bin_speed(speed: u64, bin: u64) -> u64 {
    speed.saturating_add(bin / 2) / bin * bin
}

/// Mode of the binned samples. Ties go to the bin that appears first.
pub fn representative_speed(samples: &[u64]) -> Option<u64> {
    if samples.is_empty() {
        return None;
    }

    let mean = samples.iter().map(|&s| s as f64).sum::<f64>() / samples.len() as f64;
    let bin = bin_size(mean);

    // (bin value, count) in first-seen order
    let mut counts: Vec<(u64, usize)> = Vec::new();
    for &sample in samples {
        let binned = bin_speed(sample, bin);
        match counts.iter_mut().find(|(value, _)| *value == binned) {
            Some((_, count)) => *count += 1,
            None => counts.push((binned, 1)),
        }
    }

    let mut best = counts[0];
    for &entry in &counts[1..] {
        if entry.1 > best.1 {
            best = entry;
        }
    }
    Some(best.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> SpeedHistory {
        SpeedHistory::new(dir.path().join(SPEED_HISTORY_FILE))
    }

    #[test]
    fn test_missing_file_is_empty_history() {
        let dir = TempDir::new().unwrap();
        let history = store(&dir);

        assert!(history.samples().unwrap().is_empty());
        assert_eq!(history.representative(), None);
    }

    #[test]
    fn test_record_keeps_insertion_order() {
        let dir = TempDir::new().unwrap();
        let history = store(&dir);

        for n in 1..=MAX_SPEED_SAMPLES as u64 {
            history.record(n * 1000);
            let expected: Vec<u64> = (1..=n).map(|i| i * 1000).collect();
            assert_eq!(history.samples().unwrap(), expected);
        }
    }

    #[test]
    fn test_record_evicts_oldest() {
        let dir = TempDir::new().unwrap();
        let history = store(&dir);

        for n in 1..=25u64 {
            history.record(n);
        }

        let samples = history.samples().unwrap();
        assert_eq!(samples.len(), MAX_SPEED_SAMPLES);
        assert_eq!(samples, (16..=25).collect::<Vec<u64>>());
    }

    #[test]
    fn test_record_writes_one_integer_per_line() {
        let dir = TempDir::new().unwrap();
        let history = store(&dir);

        history.record(123_456);
        history.record(7);

        let contents = std::fs::read_to_string(history.path()).unwrap();
        assert_eq!(contents, "123456\n7\n");
    }

    #[test]
    fn test_record_swallows_write_failure() {
        let dir = TempDir::new().unwrap();
        let history = SpeedHistory::new(dir.path().join("missing").join(SPEED_HISTORY_FILE));

        history.record(1000);

        assert!(!history.path().exists());
        assert_eq!(history.representative(), None);
    }

    #[test]
    fn test_invalid_lines_are_ignored() {
        let dir = TempDir::new().unwrap();
        let history = store(&dir);
        std::fs::write(history.path(), "100000\n\nabc\n-5\n 200000 \n1.5\n").unwrap();

        assert_eq!(history.samples().unwrap(), vec![100_000, 200_000]);
    }

    #[test]
    fn test_unreadable_history_degrades_to_none() {
        let dir = TempDir::new().unwrap();
        // a directory at the record path makes the read fail
        let history = SpeedHistory::new(dir.path());

        assert!(history.samples().is_err());
        assert_eq!(history.representative(), None);
    }

    #[test]
    fn test_bin_size_has_floor() {
        assert_eq!(bin_size(200_000.0), MIN_BIN_SIZE);
        assert_eq!(bin_size(10_000_000.0), 500_000);
    }

    #[test]
    fn test_bin_speed_rounds_to_nearest() {
        assert_eq!(bin_speed(98_000, 50_000), 100_000);
        assert_eq!(bin_speed(124_999, 50_000), 100_000);
        assert_eq!(bin_speed(125_000, 50_000), 150_000);
        assert_eq!(bin_speed(0, 50_000), 0);
    }

    #[test]
    fn test_bin_speed_saturates_at_u64_max() {
        assert_eq!(bin_speed(u64::MAX, 50_000), 18_446_744_073_709_550_000);
        assert_eq!(bin_speed(u64::MAX - 1, 1), u64::MAX - 1);
    }

    #[test]
    fn test_huge_stored_sample_does_not_panic() {
        let dir = TempDir::new().unwrap();
        let history = store(&dir);
        std::fs::write(history.path(), "18446744073709551615\n100000\n100000\n").unwrap();

        assert_eq!(history.samples().unwrap().len(), 3);
        // the outlier inflates the bin until both small samples round to zero
        assert_eq!(history.representative(), Some(0));

        history.record(100_000);
        assert_eq!(history.samples().unwrap().len(), 4);
    }

    #[test]
    fn test_representative_is_most_frequent_bin() {
        let samples = [100_000, 102_000, 98_000, 500_000];
        // mean 200_000 -> bin 50_000; three samples land on 100_000
        assert_eq!(representative_speed(&samples), Some(100_000));
    }

    #[test]
    fn test_representative_tie_goes_to_first_seen_bin() {
        let samples = [500_000, 100_000, 510_000, 90_000];
        assert_eq!(representative_speed(&samples), Some(500_000));

        let samples = [100_000, 500_000, 90_000, 510_000];
        assert_eq!(representative_speed(&samples), Some(100_000));
    }

    #[test]
    fn test_representative_from_store() {
        let dir = TempDir::new().unwrap();
        let history = store(&dir);
        for speed in [100_000, 102_000, 98_000, 500_000] {
            history.record(speed);
        }

        assert_eq!(history.representative(), Some(100_000));
    }

    #[test]
    fn test_representative_empty() {
        assert_eq!(representative_speed(&[]), None);
    }
}
