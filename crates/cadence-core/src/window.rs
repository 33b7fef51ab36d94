//! Window functions for short-time analysis and synthesis.
//!
//! All windows are periodic (DFT-even): the sample after the last one would
//! repeat the first. Periodic windows reach constant overlap-add exactly at
//! their natural hop sizes, e.g. Hann and Hamming at `M/2` and `M/4`.

use std::f32::consts::PI;

/// Window function types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WindowKind {
    /// Rectangular (no windowing).
    Rectangular,
    /// Hann window (raised cosine).
    #[default]
    Hann,
    /// Hamming window.
    Hamming,
    /// Blackman window.
    Blackman,
    /// Triangular window.
    Bartlett,
}

impl WindowKind {
    /// Every window kind, in declaration order.
    pub const ALL: [WindowKind; 5] = [
        WindowKind::Rectangular,
        WindowKind::Hann,
        WindowKind::Hamming,
        WindowKind::Blackman,
        WindowKind::Bartlett,
    ];

    /// Lowercase name used in configuration files.
    pub const fn name(&self) -> &'static str {
        match self {
            WindowKind::Rectangular => "rect",
            WindowKind::Hann => "hann",
            WindowKind::Hamming => "hamming",
            WindowKind::Blackman => "blackman",
            WindowKind::Bartlett => "bartlett",
        }
    }

    /// Parse a configuration name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "rect" | "rectangular" => Some(WindowKind::Rectangular),
            "hann" | "hanning" => Some(WindowKind::Hann),
            "hamming" => Some(WindowKind::Hamming),
            "blackman" => Some(WindowKind::Blackman),
            "bartlett" | "triangular" => Some(WindowKind::Bartlett),
            _ => None,
        }
    }

    /// Coefficient `i` of a window of length `n`.
    pub fn value(&self, i: usize, n: usize) -> f32 {
        let x = 2.0 * PI * i as f32 / n as f32;
        match self {
            WindowKind::Rectangular => 1.0,
            WindowKind::Hann => 0.5 * (1.0 - x.cos()),
            WindowKind::Hamming => 0.54 - 0.46 * x.cos(),
            WindowKind::Blackman => 0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos(),
            WindowKind::Bartlett => {
                let half = n as f32 / 2.0;
                1.0 - ((i as f32 - half) / half).abs()
            }
        }
    }

    /// Multiply `buffer` by the window in place.
    pub fn apply(&self, buffer: &mut [f32]) {
        let n = buffer.len();
        for (i, sample) in buffer.iter_mut().enumerate() {
            *sample *= self.value(i, n);
        }
    }

    /// Window coefficients of length `size`.
    pub fn coefficients(&self, size: usize) -> Vec<f32> {
        let mut coeffs = vec![1.0; size];
        self.apply(&mut coeffs);
        coeffs
    }
}

/// Overlap-add sum of `window` at hop `hop`, per phase.
///
/// Entry `j` is `Σ_k window[j + k·hop]`. A constant result means the window
/// satisfies COLA at that hop.
pub fn overlap_add_sum(window: &[f32], hop: usize) -> Vec<f32> {
    let mut sums = vec![0.0f32; hop];
    for (i, w) in window.iter().enumerate() {
        sums[i % hop] += w;
    }
    sums
}

/// Mean overlap-add gain and its peak relative ripple.
pub fn cola_gain(window: &[f32], hop: usize) -> (f32, f32) {
    let sums = overlap_add_sum(window, hop);
    let mean = sums.iter().sum::<f32>() / hop as f32;
    if mean.abs() <= f32::EPSILON {
        return (0.0, f32::INFINITY);
    }
    let ripple = sums
        .iter()
        .map(|s| ((s - mean) / mean).abs())
        .fold(0.0, f32::max);
    (mean, ripple)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn periodic_hann_starts_at_zero_and_peaks_mid() {
        let w = WindowKind::Hann.coefficients(8);
        assert!(w[0].abs() < 1e-7);
        assert!((w[4] - 1.0).abs() < 1e-6);
        assert!((w[2] - w[6]).abs() < 1e-6);
    }

    #[test]
    fn hann_and_hamming_are_cola_at_half_and_quarter_hop() {
        for kind in [WindowKind::Hann, WindowKind::Hamming, WindowKind::Bartlett] {
            let w = kind.coefficients(256);
            let (_, ripple) = cola_gain(&w, 128);
            assert!(ripple < 1e-4, "{kind:?} ripple {ripple}");
        }
        let w = WindowKind::Hann.coefficients(256);
        let (gain, ripple) = cola_gain(&w, 64);
        assert!(ripple < 1e-4);
        assert!((gain - 2.0).abs() < 1e-4);
    }

    #[test]
    fn blackman_is_cola_at_third_hop() {
        let w = WindowKind::Blackman.coefficients(192);
        let (gain, ripple) = cola_gain(&w, 64);
        assert!(ripple < 1e-4, "ripple {ripple}");
        assert!((gain - 1.26).abs() < 1e-3);
    }

    #[test]
    fn hann_is_not_cola_at_odd_hop() {
        let w = WindowKind::Hann.coefficients(256);
        let (_, ripple) = cola_gain(&w, 100);
        assert!(ripple > 1e-2);
    }

    #[test]
    fn names_round_trip() {
        for kind in WindowKind::ALL {
            assert_eq!(WindowKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(WindowKind::from_name("HANNING"), Some(WindowKind::Hann));
        assert_eq!(WindowKind::from_name("kaiser"), None);
    }
}
