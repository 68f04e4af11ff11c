//! Reference-frame selection for live comparisons.

/// Map the live caller's progress counter to a stored reference index.
///
/// `progress` is a raw frame counter, not a percentage of video length;
/// dividing by the stride moves it into the same decimation domain as the
/// stored records. The clamp keeps the result inside `[0, stored_count - 1]`
/// so a live session that runs ahead of extraction never indexes past the
/// newest stored frame.
///
/// Precondition: `stored_count >= 1`. With nothing stored there is no valid
/// index and callers must fall back to "no reference available" instead of
/// calling this.
pub fn select_reference_frame(progress: u64, stored_count: u64, sample_rate: u32) -> u64 {
    debug_assert!(stored_count >= 1, "selector needs at least one stored frame");
    let last = stored_count.saturating_sub(1);
    let candidate = (progress / u64::from(sample_rate.max(1))).max(last);
    candidate.min(last)
}
