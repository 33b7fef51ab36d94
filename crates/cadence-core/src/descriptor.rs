//! Signal descriptors exchanged between stages at prepare time.
//!
//! A [`SignalDescriptor`] fixes the shape of every fragment that crosses a
//! stage boundary: domain, channel count, fragment size, sample rate and the
//! short-time transform geometry. Once a chain is prepared its descriptors
//! never change; a different shape requires `release` followed by `prepare`.

use core::fmt;

use crate::error::NegotiationError;

/// Representation of a fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    /// Real-valued samples, `frames × channels`.
    Waveform,
    /// Complex bins per channel, `transform_length / 2 + 1` bins each.
    Spectrum,
}

impl Domain {
    /// The other domain.
    pub const fn opposite(self) -> Self {
        match self {
            Domain::Waveform => Domain::Spectrum,
            Domain::Spectrum => Domain::Waveform,
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Domain::Waveform => write!(f, "waveform"),
            Domain::Spectrum => write!(f, "spectrum"),
        }
    }
}

/// A single field of a [`SignalDescriptor`], used in mismatch reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorField {
    /// [`SignalDescriptor::domain`]
    Domain,
    /// [`SignalDescriptor::channels`]
    Channels,
    /// [`SignalDescriptor::fragment_size`]
    FragmentSize,
    /// [`SignalDescriptor::sample_rate`]
    SampleRate,
    /// [`SignalDescriptor::transform_length`]
    TransformLength,
    /// [`SignalDescriptor::window_length`]
    WindowLength,
}

impl fmt::Display for DescriptorField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DescriptorField::Domain => "domain",
            DescriptorField::Channels => "channels",
            DescriptorField::FragmentSize => "fragment size",
            DescriptorField::SampleRate => "sample rate",
            DescriptorField::TransformLength => "transform length",
            DescriptorField::WindowLength => "window length",
        };
        f.write_str(name)
    }
}

/// Shape of the signal at one stage boundary.
///
/// `transform_length` and `window_length` describe the short-time transform
/// used by domain converters. They are required for spectrum descriptors and
/// for any waveform chain that needs a domain conversion; a pure waveform
/// chain may leave them at zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalDescriptor {
    /// Current representation.
    pub domain: Domain,
    /// Number of audio channels.
    pub channels: usize,
    /// Frames per processing cycle (the hop size of the transform).
    pub fragment_size: usize,
    /// Sample rate in Hz.
    pub sample_rate: f32,
    /// Transform length `N` (zero padded, `N >= window_length`).
    pub transform_length: usize,
    /// Analysis window length `M`.
    pub window_length: usize,
}

impl SignalDescriptor {
    /// Waveform descriptor without transform geometry.
    pub fn waveform(channels: usize, fragment_size: usize, sample_rate: f32) -> Self {
        Self {
            domain: Domain::Waveform,
            channels,
            fragment_size,
            sample_rate,
            transform_length: 0,
            window_length: 0,
        }
    }

    /// Sets the transform geometry.
    pub fn with_transform(mut self, window_length: usize, transform_length: usize) -> Self {
        self.window_length = window_length;
        self.transform_length = transform_length;
        self
    }

    /// Same descriptor in another domain.
    pub fn with_domain(mut self, domain: Domain) -> Self {
        self.domain = domain;
        self
    }

    /// Same descriptor with another channel count.
    pub fn with_channels(mut self, channels: usize) -> Self {
        self.channels = channels;
        self
    }

    /// Number of spectral bins per channel.
    pub fn bins(&self) -> usize {
        self.transform_length / 2 + 1
    }

    /// Length of one channel of a fragment with this descriptor.
    pub fn channel_len(&self) -> usize {
        match self.domain {
            Domain::Waveform => self.fragment_size,
            Domain::Spectrum => self.bins(),
        }
    }

    /// Duration of one fragment in seconds.
    pub fn fragment_seconds(&self) -> f64 {
        self.fragment_size as f64 / f64::from(self.sample_rate)
    }

    /// True when both transform lengths are set.
    pub fn has_transform(&self) -> bool {
        self.transform_length > 0 && self.window_length > 0
    }

    /// Checks the descriptor for internal consistency.
    pub fn validate(&self) -> Result<(), NegotiationError> {
        if self.channels == 0 {
            return Err(NegotiationError::invalid_descriptor("channel count is zero"));
        }
        if self.fragment_size == 0 {
            return Err(NegotiationError::invalid_descriptor("fragment size is zero"));
        }
        if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
            return Err(NegotiationError::invalid_descriptor(format!(
                "sample rate {} is not positive",
                self.sample_rate
            )));
        }
        if self.domain == Domain::Spectrum && !self.has_transform() {
            return Err(NegotiationError::invalid_descriptor(
                "spectrum descriptor without transform and window length",
            ));
        }
        if self.has_transform() {
            if self.window_length > self.transform_length {
                return Err(NegotiationError::invalid_descriptor(format!(
                    "window length {} exceeds transform length {}",
                    self.window_length, self.transform_length
                )));
            }
            if self.fragment_size > self.window_length {
                return Err(NegotiationError::invalid_descriptor(format!(
                    "fragment size {} exceeds window length {}",
                    self.fragment_size, self.window_length
                )));
            }
        }
        Ok(())
    }

    /// First field in which `self` and `other` differ, with both values
    /// rendered for reporting.
    pub fn difference(&self, other: &Self) -> Option<(DescriptorField, String, String)> {
        if self.domain != other.domain {
            return Some((
                DescriptorField::Domain,
                self.domain.to_string(),
                other.domain.to_string(),
            ));
        }
        if self.channels != other.channels {
            return Some((
                DescriptorField::Channels,
                self.channels.to_string(),
                other.channels.to_string(),
            ));
        }
        if self.fragment_size != other.fragment_size {
            return Some((
                DescriptorField::FragmentSize,
                self.fragment_size.to_string(),
                other.fragment_size.to_string(),
            ));
        }
        if self.sample_rate != other.sample_rate {
            return Some((
                DescriptorField::SampleRate,
                self.sample_rate.to_string(),
                other.sample_rate.to_string(),
            ));
        }
        if self.transform_length != other.transform_length {
            return Some((
                DescriptorField::TransformLength,
                self.transform_length.to_string(),
                other.transform_length.to_string(),
            ));
        }
        if self.window_length != other.window_length {
            return Some((
                DescriptorField::WindowLength,
                self.window_length.to_string(),
                other.window_length.to_string(),
            ));
        }
        None
    }

    /// Fails with [`NegotiationError::Mismatch`] unless `actual` equals `self`.
    pub fn expect_match(&self, actual: &Self) -> Result<(), NegotiationError> {
        match self.difference(actual) {
            None => Ok(()),
            Some((field, expected, actual)) => Err(NegotiationError::Mismatch {
                field,
                expected,
                actual,
            }),
        }
    }
}

impl fmt::Display for SignalDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}ch x {} @ {} Hz",
            self.domain, self.channels, self.fragment_size, self.sample_rate
        )?;
        if self.has_transform() {
            write!(f, " (window {}, fft {})", self.window_length, self.transform_length)?;
        }
        Ok(())
    }
}
