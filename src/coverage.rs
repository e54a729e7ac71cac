//src/coverage.rs

use std::cell::OnceCell;

/// Derived statistics of a finished histogram.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CoverageSummary {
    pub non_zero_bins: u32,
    /// Fraction of bins with at least one hit, in [0, 1].
    pub percent_covered: f64,
    /// Mean hits per bin, zero bins included.
    pub mean_depth: f64,
}

/// Fixed-width histogram of where hits land along one reference.
///
/// The summary is computed on first query and cached; recording another
/// hit drops the cache.
#[derive(Debug, Clone)]
pub struct CoverageHistogram {
    bin_width: u32,
    bins: Vec<u32>,
    summary: OnceCell<CoverageSummary>,
}

impl CoverageHistogram {
    /// `ceil(length / bin_width)` empty bins.
    pub fn new(length: u32, bin_width: u32) -> Self {
        let bin_width = bin_width.max(1);
        let n_bins = length.div_ceil(bin_width) as usize;
        Self {
            bin_width,
            bins: vec![0; n_bins],
            summary: OnceCell::new(),
        }
    }

    pub fn bin_count(&self) -> u32 {
        self.bins.len() as u32
    }

    /// Bin containing `position`, clamped to the last bin.
    pub fn bin_of(&self, position: u32) -> u32 {
        let bin = position / self.bin_width;
        bin.min(self.bin_count().saturating_sub(1))
    }

    /// Count one hit in bin `bin`. Out-of-range bins are clamped.
    pub fn record(&mut self, bin: u32) {
        if self.bins.is_empty() {
            return;
        }
        let idx = (bin as usize).min(self.bins.len() - 1);
        self.bins[idx] += 1;
        self.summary.take();
    }

    pub fn summary(&self) -> CoverageSummary {
        *self.summary.get_or_init(|| {
            if self.bins.is_empty() {
                return CoverageSummary::default();
            }
            let non_zero_bins = self.bins.iter().filter(|&&h| h > 0).count() as u32;
            let total: u64 = self.bins.iter().map(|&h| h as u64).sum();
            let n = self.bins.len() as f64;
            CoverageSummary {
                non_zero_bins,
                percent_covered: non_zero_bins as f64 / n,
                mean_depth: total as f64 / n,
            }
        })
    }

    pub fn non_zero_bins(&self) -> u32 {
        self.summary().non_zero_bins
    }

    pub fn percent_covered(&self) -> f64 {
        self.summary().percent_covered
    }

    pub fn mean_depth(&self) -> f64 {
        self.summary().mean_depth
    }
}
