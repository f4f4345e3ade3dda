use std::sync::atomic::{AtomicU64, Ordering};

const UNKNOWN_TOTAL: u64 = 0;

/// Byte counters shared between a transfer worker and its observer.
#[derive(Debug, Default)]
pub struct TransferProgress {
    total: AtomicU64,
    done: AtomicU64,
}

impl TransferProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_total(&self, total: Option<u64>) {
        self.total
            .store(total.unwrap_or(UNKNOWN_TOTAL), Ordering::Relaxed);
    }

    pub fn advance(&self, bytes: u64) {
        self.done.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn bytes_done(&self) -> u64 {
        self.done.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> Option<u64> {
        match self.total.load(Ordering::Relaxed) {
            UNKNOWN_TOTAL => None,
            total => Some(total),
        }
    }

    /// Completion as 0-100, or `None` when the size is not known up front
    /// (e.g. a chunked HTTP response or a pipe).
    pub fn percent(&self) -> Option<u8> {
        let total = self.total()?;
        let done = self.bytes_done().min(total);
        Some(((done as u128 * 100) / total as u128) as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_is_none_until_total_is_known() {
        let progress = TransferProgress::new();
        progress.advance(512);
        assert_eq!(progress.percent(), None);

        progress.set_total(Some(2048));
        assert_eq!(progress.percent(), Some(25));
        progress.advance(4096);
        assert_eq!(progress.percent(), Some(100));
    }

    #[test]
    fn zero_length_total_reads_as_unknown() {
        let progress = TransferProgress::new();
        progress.set_total(Some(0));
        assert_eq!(progress.total(), None);
        assert_eq!(progress.percent(), None);
    }
}
