//! Signal fragments: the block of data one processing cycle works on.
//!
//! Both representations store their channels contiguously (channel-major)
//! so stages can borrow one channel as a slice. Buffers are allocated once,
//! from a [`SignalDescriptor`], and reused for every cycle afterwards.

use core::fmt;

pub use rustfft::num_complex::Complex32;

use crate::descriptor::{Domain, SignalDescriptor};

/// Real-valued samples, `channels × frames`.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    channels: usize,
    frames: usize,
    data: Vec<f32>,
}

impl Waveform {
    /// Silent waveform.
    pub fn new(channels: usize, frames: usize) -> Self {
        Self {
            channels,
            frames,
            data: vec![0.0; channels * frames],
        }
    }

    /// Number of channels.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Frames per channel.
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Samples of one channel.
    pub fn channel(&self, channel: usize) -> &[f32] {
        let start = channel * self.frames;
        &self.data[start..start + self.frames]
    }

    /// Mutable samples of one channel.
    pub fn channel_mut(&mut self, channel: usize) -> &mut [f32] {
        let start = channel * self.frames;
        &mut self.data[start..start + self.frames]
    }

    /// Iterator over channels.
    pub fn iter_channels(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks_exact(self.frames.max(1))
    }

    /// Mutable iterator over channels.
    pub fn iter_channels_mut(&mut self) -> impl Iterator<Item = &mut [f32]> {
        self.data.chunks_exact_mut(self.frames.max(1))
    }

    /// All samples, channel after channel.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// All samples, channel after channel.
    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Fill from interleaved frames (`frame0ch0, frame0ch1, ...`).
    ///
    /// Missing trailing frames are filled with silence.
    pub fn copy_from_interleaved(&mut self, interleaved: &[f32]) {
        for frame in 0..self.frames {
            for ch in 0..self.channels {
                self.data[ch * self.frames + frame] =
                    interleaved.get(frame * self.channels + ch).copied().unwrap_or(0.0);
            }
        }
    }

    /// Write interleaved frames into `out`, up to its length.
    pub fn write_interleaved(&self, out: &mut [f32]) {
        for (i, sample) in out.iter_mut().enumerate() {
            let frame = i / self.channels;
            let ch = i % self.channels;
            if frame >= self.frames {
                break;
            }
            *sample = self.data[ch * self.frames + frame];
        }
    }
}

/// Complex bins per channel, `channels × bins`.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    channels: usize,
    bins: usize,
    data: Vec<Complex32>,
}

impl Spectrum {
    /// All-zero spectrum.
    pub fn new(channels: usize, bins: usize) -> Self {
        Self {
            channels,
            bins,
            data: vec![Complex32::new(0.0, 0.0); channels * bins],
        }
    }

    /// Number of channels.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Bins per channel.
    pub fn bins(&self) -> usize {
        self.bins
    }

    /// Bins of one channel.
    pub fn channel(&self, channel: usize) -> &[Complex32] {
        let start = channel * self.bins;
        &self.data[start..start + self.bins]
    }

    /// Mutable bins of one channel.
    pub fn channel_mut(&mut self, channel: usize) -> &mut [Complex32] {
        let start = channel * self.bins;
        &mut self.data[start..start + self.bins]
    }

    /// Mutable iterator over channels.
    pub fn iter_channels_mut(&mut self) -> impl Iterator<Item = &mut [Complex32]> {
        self.data.chunks_exact_mut(self.bins.max(1))
    }

    /// All bins, channel after channel.
    pub fn as_slice(&self) -> &[Complex32] {
        &self.data
    }

    /// All bins, channel after channel.
    pub fn as_mut_slice(&mut self) -> &mut [Complex32] {
        &mut self.data
    }
}

/// Domain, channel count and per-channel length of a fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentShape {
    /// Representation.
    pub domain: Domain,
    /// Channel count.
    pub channels: usize,
    /// Frames (waveform) or bins (spectrum) per channel.
    pub len: usize,
}

impl FragmentShape {
    /// Shape of fragments described by `descriptor`.
    pub fn of(descriptor: &SignalDescriptor) -> Self {
        Self {
            domain: descriptor.domain,
            channels: descriptor.channels,
            len: descriptor.channel_len(),
        }
    }
}

impl fmt::Display for FragmentShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = match self.domain {
            Domain::Waveform => "frames",
            Domain::Spectrum => "bins",
        };
        write!(f, "{} {}ch x {} {}", self.domain, self.channels, self.len, unit)
    }
}

/// One cycle of signal in exactly one domain.
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    /// Time domain.
    Waveform(Waveform),
    /// Frequency domain.
    Spectrum(Spectrum),
}

impl Fragment {
    /// Allocate a zeroed fragment matching `descriptor`.
    pub fn for_descriptor(descriptor: &SignalDescriptor) -> Self {
        match descriptor.domain {
            Domain::Waveform => {
                Fragment::Waveform(Waveform::new(descriptor.channels, descriptor.fragment_size))
            }
            Domain::Spectrum => {
                Fragment::Spectrum(Spectrum::new(descriptor.channels, descriptor.bins()))
            }
        }
    }

    /// Current domain.
    pub fn domain(&self) -> Domain {
        match self {
            Fragment::Waveform(_) => Domain::Waveform,
            Fragment::Spectrum(_) => Domain::Spectrum,
        }
    }

    /// Channel count.
    pub fn channels(&self) -> usize {
        match self {
            Fragment::Waveform(w) => w.channels(),
            Fragment::Spectrum(s) => s.channels(),
        }
    }

    /// Current shape.
    pub fn shape(&self) -> FragmentShape {
        let len = match self {
            Fragment::Waveform(w) => w.frames(),
            Fragment::Spectrum(s) => s.bins(),
        };
        FragmentShape {
            domain: self.domain(),
            channels: self.channels(),
            len,
        }
    }

    /// Waveform view, if in the time domain.
    pub fn as_waveform(&self) -> Option<&Waveform> {
        match self {
            Fragment::Waveform(w) => Some(w),
            Fragment::Spectrum(_) => None,
        }
    }

    /// Mutable waveform view, if in the time domain.
    pub fn as_waveform_mut(&mut self) -> Option<&mut Waveform> {
        match self {
            Fragment::Waveform(w) => Some(w),
            Fragment::Spectrum(_) => None,
        }
    }

    /// Spectrum view, if in the frequency domain.
    pub fn as_spectrum(&self) -> Option<&Spectrum> {
        match self {
            Fragment::Spectrum(s) => Some(s),
            Fragment::Waveform(_) => None,
        }
    }

    /// Mutable spectrum view, if in the frequency domain.
    pub fn as_spectrum_mut(&mut self) -> Option<&mut Spectrum> {
        match self {
            Fragment::Spectrum(s) => Some(s),
            Fragment::Waveform(_) => None,
        }
    }

    /// Zero every sample or bin.
    pub fn clear(&mut self) {
        match self {
            Fragment::Waveform(w) => w.as_mut_slice().fill(0.0),
            Fragment::Spectrum(s) => s.as_mut_slice().fill(Complex32::new(0.0, 0.0)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interleaved_round_trip() {
        let mut w = Waveform::new(2, 4);
        let input = [1.0, -1.0, 2.0, -2.0, 3.0, -3.0, 4.0, -4.0];
        w.copy_from_interleaved(&input);
        assert_eq!(w.channel(0), &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(w.channel(1), &[-1.0, -2.0, -3.0, -4.0]);

        let mut out = [0.0; 8];
        w.write_interleaved(&mut out);
        assert_eq!(out, input);
    }

    #[test]
    fn short_interleaved_input_pads_with_silence() {
        let mut w = Waveform::new(1, 4);
        w.as_mut_slice().fill(9.0);
        w.copy_from_interleaved(&[1.0, 2.0]);
        assert_eq!(w.channel(0), &[1.0, 2.0, 0.0, 0.0]);
    }

    #[test]
    fn fragment_shape_matches_descriptor() {
        let d = SignalDescriptor::waveform(3, 16, 8000.0).with_transform(32, 64);
        let f = Fragment::for_descriptor(&d);
        assert_eq!(f.shape(), FragmentShape::of(&d));

        let s = d.with_domain(Domain::Spectrum);
        let f = Fragment::for_descriptor(&s);
        assert_eq!(f.shape().len, 33);
        assert_eq!(f.shape(), FragmentShape::of(&s));
        assert!(f.as_waveform().is_none());
    }

    #[test]
    fn shape_display() {
        let shape = FragmentShape {
            domain: Domain::Spectrum,
            channels: 2,
            len: 129,
        };
        assert_eq!(shape.to_string(), "spectrum 2ch x 129 bins");
    }
}
