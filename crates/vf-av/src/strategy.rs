//! Single vs multi-rendition decision.
//!
//! Small uploads get one rendition at source resolution; anything larger
//! than the threshold gets an adaptive ladder.

use std::path::Path;

use vf_core::{ProbeError, Strategy};

/// Bytes in one MB as used by the size threshold (MiB).
pub const BYTES_PER_MB: u64 = 1024 * 1024;

/// Decide the strategy from a known byte count.
///
/// Sizes at or below `threshold_mb` select [`Strategy::SingleStream`].
pub fn select_strategy_for_size(size_bytes: u64, threshold_mb: u64, max_rungs: usize) -> Strategy {
    if size_bytes <= threshold_mb.saturating_mul(BYTES_PER_MB) {
        Strategy::SingleStream
    } else {
        Strategy::MultiStream { rungs: max_rungs }
    }
}

/// Stat `input` and decide the strategy from its size.
///
/// # Errors
///
/// [`ProbeError::Unreadable`] if the file cannot be stat'ed.
pub async fn select_strategy(
    input: &Path,
    threshold_mb: u64,
    max_rungs: usize,
) -> Result<Strategy, ProbeError> {
    let meta = tokio::fs::metadata(input)
        .await
        .map_err(|e| ProbeError::unreadable(input, e))?;
    let strategy = select_strategy_for_size(meta.len(), threshold_mb, max_rungs);
    tracing::debug!(
        "{} is {:.1} MB; strategy {:?}",
        input.display(),
        meta.len() as f64 / BYTES_PER_MB as f64,
        strategy
    );
    Ok(strategy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const MB: u64 = BYTES_PER_MB;

    #[test]
    fn small_upload_is_single_stream() {
        assert_eq!(select_strategy_for_size(30 * MB, 50, 2), Strategy::SingleStream);
        assert_eq!(select_strategy_for_size(1, 50, 2), Strategy::SingleStream);
    }

    #[test]
    fn large_upload_is_multi_stream() {
        assert_eq!(
            select_strategy_for_size(120 * MB, 50, 2),
            Strategy::MultiStream { rungs: 2 }
        );
    }

    #[test]
    fn threshold_is_inclusive() {
        assert_eq!(select_strategy_for_size(50 * MB, 50, 2), Strategy::SingleStream);
        assert_eq!(
            select_strategy_for_size(50 * MB + 1, 50, 3),
            Strategy::MultiStream { rungs: 3 }
        );
    }

    #[test]
    fn huge_threshold_does_not_overflow() {
        assert_eq!(
            select_strategy_for_size(u64::MAX, u64::MAX, 2),
            Strategy::SingleStream
        );
    }

    #[tokio::test]
    async fn stats_file_on_disk() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), vec![0u8; 2048]).unwrap();
        assert_eq!(
            select_strategy(file.path(), 0, 2).await.unwrap(),
            Strategy::MultiStream { rungs: 2 }
        );
        assert_eq!(
            select_strategy(file.path(), 1, 2).await.unwrap(),
            Strategy::SingleStream
        );
    }

    #[tokio::test]
    async fn missing_file_is_unreadable() {
        assert_matches!(
            select_strategy(Path::new("/nonexistent/upload.mp4"), 50, 2).await,
            Err(ProbeError::Unreadable { .. })
        );
    }
}
