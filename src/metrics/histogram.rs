//! Fixed-memory logarithmic-bucket histogram for streaming latencies.
//!
//! Values below `2^sub_bits` occupy 1:1 linear buckets; above that each
//! power-of-two octave carries `2^(sub_bits - 1)` buckets, so the
//! relative width of any bucket is bounded by `2^-(sub_bits - 1)`
//! (about 1.6% at the default 7 bits). Insertion is O(1) and memory is
//! fixed regardless of how many samples are recorded.

pub const DEFAULT_SUB_BITS: u32 = 7;
pub const DEFAULT_MAX_VALUE: u64 = 60_000;

#[derive(Debug, Clone)]
pub struct LogHist {
    sub_bits: u32,
    max_value: u64,
    counts: Vec<u64>,
    total: u64,
    min_seen: u64,
    max_seen: u64,
}

impl LogHist {
    /// Default shape: millisecond domain up to one minute.
    #[must_use]
    pub fn new() -> Self {
        Self::with_bounds(DEFAULT_SUB_BITS, DEFAULT_MAX_VALUE)
    }

    /// `sub_bits` sets the precision (buckets per octave), `max_value`
    /// the largest representable sample; anything larger clamps to it.
    #[must_use]
    pub fn with_bounds(sub_bits: u32, max_value: u64) -> Self {
        let sub_bits = sub_bits.clamp(1, 16);
        let max_value = max_value.max(1);
        let buckets = bucket_index(sub_bits, max_value).saturating_add(1);
        Self {
            sub_bits,
            max_value,
            counts: vec![0; buckets],
            total: 0,
            min_seen: u64::MAX,
            max_seen: 0,
        }
    }

    pub fn add(&mut self, value: u64) {
        let clamped = value.min(self.max_value);
        let index = bucket_index(self.sub_bits, clamped);
        if let Some(slot) = self.counts.get_mut(index) {
            *slot = slot.saturating_add(1);
        }
        self.total = self.total.saturating_add(1);
        self.min_seen = self.min_seen.min(clamped);
        self.max_seen = self.max_seen.max(clamped);
    }

    #[must_use]
    pub const fn count(&self) -> u64 {
        self.total
    }

    #[must_use]
    pub const fn min(&self) -> u64 {
        if self.total == 0 { 0 } else { self.min_seen }
    }

    #[must_use]
    pub const fn max(&self) -> u64 {
        self.max_seen
    }

    /// Index of the bucket covering `value`. Monotonic in `value`.
    #[must_use]
    pub fn bucket(&self, value: u64) -> usize {
        bucket_index(self.sub_bits, value.min(self.max_value))
    }

    /// Approximate value at quantile `p` (clamped to [0, 1]): walks the
    /// cumulative counts and interpolates inside the covering bucket.
    /// An empty histogram yields 0.
    #[must_use]
    #[expect(clippy::float_arithmetic, reason = "quantile threshold math")]
    pub fn percentile(&self, p: f64) -> u64 {
        if self.total == 0 {
            return 0;
        }
        let fraction = p.clamp(0.0, 1.0);
        let raw = (fraction * self.total as f64).ceil() as u64;
        let threshold = raw.clamp(1, self.total);
        let mut seen = 0u64;
        for (index, &count) in self.counts.iter().enumerate() {
            if count == 0 {
                continue;
            }
            let next = seen.saturating_add(count);
            if next >= threshold {
                let (low, high) = bucket_cover(self.sub_bits, index);
                let into = threshold.saturating_sub(seen);
                let width = high.saturating_sub(low);
                let step = u128::from(width)
                    .saturating_mul(u128::from(into))
                    .checked_div(u128::from(count))
                    .unwrap_or(0);
                let value = low.saturating_add(u64::try_from(step).unwrap_or(u64::MAX));
                return value.clamp(self.min(), self.max());
            }
            seen = next;
        }
        self.max()
    }

    /// Weighted mean over bucket midpoints; approximate since raw
    /// samples are not retained.
    #[must_use]
    pub fn average(&self) -> u64 {
        if self.total == 0 {
            return 0;
        }
        let mut sum: u128 = 0;
        for (index, &count) in self.counts.iter().enumerate() {
            if count == 0 {
                continue;
            }
            let (low, high) = bucket_cover(self.sub_bits, index);
            let mid = low.saturating_add(high.saturating_sub(low) / 2);
            sum = sum.saturating_add(u128::from(mid).saturating_mul(u128::from(count)));
        }
        u64::try_from(sum.checked_div(u128::from(self.total)).unwrap_or(0)).unwrap_or(u64::MAX)
    }

    /// Fold another histogram into this one. Identical shapes merge
    /// bucket-for-bucket; differing shapes re-add bucket midpoints.
    pub fn merge(&mut self, other: &LogHist) {
        if other.total == 0 {
            return;
        }
        if self.sub_bits == other.sub_bits && self.counts.len() == other.counts.len() {
            for (slot, &count) in self.counts.iter_mut().zip(other.counts.iter()) {
                *slot = slot.saturating_add(count);
            }
            self.total = self.total.saturating_add(other.total);
            self.min_seen = self.min_seen.min(other.min_seen);
            self.max_seen = self.max_seen.max(other.max_seen);
            return;
        }
        for (index, &count) in other.counts.iter().enumerate() {
            if count == 0 {
                continue;
            }
            let (low, high) = bucket_cover(other.sub_bits, index);
            let mid = low.saturating_add(high.saturating_sub(low) / 2);
            let slot = bucket_index(self.sub_bits, mid.min(self.max_value));
            if let Some(target) = self.counts.get_mut(slot) {
                *target = target.saturating_add(count);
            }
            self.total = self.total.saturating_add(count);
            self.min_seen = self.min_seen.min(mid.min(self.max_value));
            self.max_seen = self.max_seen.max(mid.min(self.max_value));
        }
    }
}

impl Default for LogHist {
    fn default() -> Self {
        Self::new()
    }
}

fn bucket_index(sub_bits: u32, value: u64) -> usize {
    let sub_count = 1u64.checked_shl(sub_bits).unwrap_or(u64::MAX);
    if value < sub_count {
        return usize::try_from(value).unwrap_or(usize::MAX);
    }
    let msb = 63u32.saturating_sub(value.leading_zeros());
    let group = msb.saturating_sub(sub_bits).saturating_add(1);
    let half = sub_count >> 1;
    let offset = value
        .checked_shr(group)
        .unwrap_or(0)
        .saturating_sub(half);
    let index = sub_count
        .saturating_add(u64::from(group.saturating_sub(1)).saturating_mul(half))
        .saturating_add(offset);
    usize::try_from(index).unwrap_or(usize::MAX)
}

/// The `[low, high)` value range bucket `index` covers.
fn bucket_cover(sub_bits: u32, index: usize) -> (u64, u64) {
    let sub_count = 1u64.checked_shl(sub_bits).unwrap_or(u64::MAX);
    let index = u64::try_from(index).unwrap_or(u64::MAX);
    if index < sub_count {
        return (index, index.saturating_add(1));
    }
    let half = sub_count >> 1;
    let past = index.saturating_sub(sub_count);
    let group_wide = past.checked_div(half).unwrap_or(0).saturating_add(1);
    let group = u32::try_from(group_wide).unwrap_or(u32::MAX);
    let offset = past.checked_rem(half).unwrap_or(0);
    let low = half
        .saturating_add(offset)
        .checked_shl(group)
        .unwrap_or(u64::MAX);
    let width = 1u64.checked_shl(group).unwrap_or(u64::MAX);
    (low, low.saturating_add(width))
}
