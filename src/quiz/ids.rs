use std::sync::atomic::{AtomicU64, Ordering};

/// Supplies the per-call stamp that generated question ids are built from.
///
/// Ids combine a stamp with the question's position, so they only need to be
/// unique inside one call. Passing the source in keeps the parsers free of
/// clock reads.
pub trait StampSource {
    fn stamp(&self) -> String;
}

/// Milliseconds since the Unix epoch.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl StampSource for SystemClock {
    fn stamp(&self) -> String {
        chrono::Utc::now().timestamp_millis().to_string()
    }
}

/// Hands out 1, 2, 3, ... so ids are predictable.
#[derive(Debug, Default)]
pub struct SequenceStamp {
    next: AtomicU64,
}

impl SequenceStamp {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StampSource for SequenceStamp {
    fn stamp(&self) -> String {
        (self.next.fetch_add(1, Ordering::Relaxed) + 1).to_string()
    }
}

pub(crate) fn stamped_id(stamp: &str, position: usize) -> String {
    format!("{}-{}", stamp, position)
}

pub(crate) fn fallback_id(stamp: &str, position: usize) -> String {
    format!("fallback-{}-{}", stamp, position)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_stamp_counts_up() {
        let stamps = SequenceStamp::new();
        assert_eq!(stamps.stamp(), "1");
        assert_eq!(stamps.stamp(), "2");
    }

    #[test]
    fn system_clock_is_numeric() {
        let stamp = SystemClock.stamp();
        assert!(stamp.parse::<i64>().unwrap() > 0);
    }

    #[test]
    fn id_formats() {
        assert_eq!(stamped_id("42", 3), "42-3");
        assert_eq!(fallback_id("42", 0), "fallback-42-0");
    }
}
