//! Tunable constants for the collector, grouped so an embedder can override
//! them (primarily useful in tests that want frequent collection).

/// Collector tunables. `Default` reproduces the fixed constants used by the
/// reference runtime; only tests construct a non-default instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GcConfig {
    /// Collections never shrink the threshold below this many bytes.
    pub min_threshold_bytes: u64,
    /// Numerator of the post-collection threshold growth factor.
    pub growth_numerator: u64,
    /// Denominator of the post-collection threshold growth factor.
    pub growth_denominator: u64,
    /// Initial backing capacity for a freshly constructed reference vector.
    pub initial_vector_capacity: u64,
}

impl Default for GcConfig {
    fn default() -> Self {
        GcConfig {
            min_threshold_bytes: 64 * 1024,
            growth_numerator: 2,
            growth_denominator: 1,
            initial_vector_capacity: 4,
        }
    }
}

impl GcConfig {
    pub(crate) fn next_threshold(&self, live_bytes: u64) -> u64 {
        let grown = live_bytes.saturating_mul(self.growth_numerator) / self.growth_denominator;
        grown.max(self.min_threshold_bytes)
    }
}
