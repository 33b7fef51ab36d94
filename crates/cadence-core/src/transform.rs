//! Fixed-length real transform used by the domain converters.
//!
//! The converters treat the transform as an opaque primitive behind
//! [`SpectralTransform`]; [`RustFftTransform`] is the default implementation.
//! All working memory is allocated when the transform is created so the
//! audio path never allocates.

use std::fmt;
use std::sync::Arc;

use rustfft::{Fft, FftPlanner};

use crate::fragment::Complex32;

/// Forward and inverse discrete Fourier transform of a fixed length.
pub trait SpectralTransform: Send {
    /// Transform length `N`.
    fn len(&self) -> usize;

    /// Number of non-negative frequency bins, `N / 2 + 1`.
    fn bins(&self) -> usize {
        self.len() / 2 + 1
    }

    /// Real input of length `N` to the `N / 2 + 1` non-negative bins.
    fn forward(&mut self, input: &[f32], output: &mut [Complex32]);

    /// `N / 2 + 1` bins of a real signal back to `N` samples, scaled by `1/N`.
    fn inverse(&mut self, input: &[Complex32], output: &mut [f32]);
}

/// Creates a transform of the requested length.
pub type TransformFactory = fn(usize) -> Box<dyn SpectralTransform>;

/// Default [`TransformFactory`].
pub fn rustfft_factory(len: usize) -> Box<dyn SpectralTransform> {
    Box::new(RustFftTransform::new(len))
}

/// [`SpectralTransform`] on top of `rustfft`.
pub struct RustFftTransform {
    len: usize,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    buffer: Vec<Complex32>,
    scratch: Vec<Complex32>,
}

impl RustFftTransform {
    /// Plan forward and inverse transforms of length `len`.
    pub fn new(len: usize) -> Self {
        let mut planner = FftPlanner::new();
        let forward = planner.plan_fft_forward(len);
        let inverse = planner.plan_fft_inverse(len);
        let scratch_len = forward
            .get_inplace_scratch_len()
            .max(inverse.get_inplace_scratch_len());

        Self {
            len,
            forward,
            inverse,
            buffer: vec![Complex32::new(0.0, 0.0); len],
            scratch: vec![Complex32::new(0.0, 0.0); scratch_len],
        }
    }
}

impl SpectralTransform for RustFftTransform {
    fn len(&self) -> usize {
        self.len
    }

    fn forward(&mut self, input: &[f32], output: &mut [Complex32]) {
        for (c, &x) in self.buffer.iter_mut().zip(input) {
            *c = Complex32::new(x, 0.0);
        }
        self.forward
            .process_with_scratch(&mut self.buffer, &mut self.scratch);
        let bins = output.len().min(self.bins());
        output[..bins].copy_from_slice(&self.buffer[..bins]);
    }

    fn inverse(&mut self, input: &[Complex32], output: &mut [f32]) {
        let n = self.len;
        let bins = self.bins().min(input.len());
        self.buffer[..bins].copy_from_slice(&input[..bins]);
        // Hermitian mirror of the negative frequencies.
        for k in 1..(n - self.bins() + 1) {
            self.buffer[n - k] = input[k].conj();
        }
        self.inverse
            .process_with_scratch(&mut self.buffer, &mut self.scratch);
        let scale = 1.0 / n as f32;
        for (out, c) in output.iter_mut().zip(&self.buffer) {
            *out = c.re * scale;
        }
    }
}

impl fmt::Debug for RustFftTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RustFftTransform")
            .field("len", &self.len)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_even_and_odd_lengths() {
        for n in [8usize, 64, 63] {
            let mut t = RustFftTransform::new(n);
            let input: Vec<f32> = (0..n)
                .map(|i| (2.0 * std::f32::consts::PI * 3.0 * i as f32 / n as f32).sin() + 0.25)
                .collect();
            let mut bins = vec![Complex32::new(0.0, 0.0); t.bins()];
            let mut output = vec![0.0; n];
            t.forward(&input, &mut bins);
            t.inverse(&bins, &mut output);
            for (a, b) in input.iter().zip(&output) {
                assert!((a - b).abs() < 1e-5, "n={n}: {a} vs {b}");
            }
        }
    }

    #[test]
    fn dc_lands_in_bin_zero() {
        let mut t = RustFftTransform::new(16);
        let mut bins = vec![Complex32::new(0.0, 0.0); 9];
        t.forward(&[1.0; 16], &mut bins);
        assert!((bins[0].re - 16.0).abs() < 1e-5);
        for b in &bins[1..] {
            assert!(b.norm() < 1e-5);
        }
    }

    #[test]
    fn factory_produces_requested_length() {
        let t = rustfft_factory(32);
        assert_eq!(t.len(), 32);
        assert_eq!(t.bins(), 17);
    }
}
