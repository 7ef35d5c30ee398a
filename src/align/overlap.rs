use tracing::{info, warn};

/// Result of comparing the probe's coverage with the counter store's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlapOutcome {
    Overlap { start: u64, end: u64 },
    /// `start > end`: the later source began after the earlier one finished.
    NoOverlap { start: u64, end: u64 },
    /// At least one source produced no samples.
    Indeterminate,
}

impl OverlapOutcome {
    pub fn is_overlap(&self) -> bool {
        matches!(self, Self::Overlap { .. })
    }
}

/// Intersect two inclusive `(min_ts, max_ts)` ranges. Never fails; anything
/// other than an overlap is logged as a warning.
pub fn check_overlap(probe: Option<(u64, u64)>, store: Option<(u64, u64)>) -> OverlapOutcome {
    let (Some((probe_min, probe_max)), Some((store_min, store_max))) = (probe, store) else {
        warn!(
            probe_known = probe.is_some(),
            store_known = store.is_some(),
            "Probe or counter store range unknown, skipping overlap check"
        );
        return OverlapOutcome::Indeterminate;
    };

    let start = probe_min.max(store_min);
    let end = probe_max.min(store_max);
    if start <= end {
        info!("Overlap exists: {} -> {}", start, end);
        OverlapOutcome::Overlap { start, end }
    } else {
        warn!(
            "No overlap between counter store ({}..{}) and probe ({}..{}); check clock skew, \
             settling delay or polling interval",
            store_min, store_max, probe_min, probe_max
        );
        OverlapOutcome::NoOverlap { start, end }
    }
}
