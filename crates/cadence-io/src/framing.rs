//! Fragment framing between interleaved sample buffers and a chain.
//!
//! [`FragmentSource`] cuts an interleaved recording into fragments, padding
//! the last one with silence and optionally appending extra silence so the
//! chain's latency can be flushed out. [`FragmentSink`] collects output
//! fragments back into an interleaved buffer, dropping the first `skip`
//! frames and stopping after `limit` frames.

use cadence_core::{Fragment, ProcessingChain, Waveform};

use crate::{Error, Result};

/// Feeds an interleaved recording to a chain one fragment at a time.
#[derive(Debug, Clone)]
pub struct FragmentSource {
    samples: Vec<f32>,
    channels: usize,
    fragment_size: usize,
    frames: usize,
    tail: usize,
    position: usize,
}

impl FragmentSource {
    /// Source over `samples` with `channels` interleaved channels.
    pub fn new(samples: Vec<f32>, channels: usize, fragment_size: usize) -> Self {
        let frames = samples.len() / channels.max(1);
        Self {
            samples,
            channels,
            fragment_size,
            frames,
            tail: 0,
            position: 0,
        }
    }

    /// Append `frames` of silence after the recording.
    pub fn with_tail(mut self, frames: usize) -> Self {
        self.tail = frames;
        self
    }

    /// Frames in the recording, without the tail.
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Frames handed out so far, tail included.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Total fragments this source yields.
    pub fn fragments(&self) -> usize {
        (self.frames + self.tail).div_ceil(self.fragment_size.max(1))
    }

    /// Load the next fragment into `fragment`.
    ///
    /// Returns `false` once recording and tail are exhausted; `fragment` is
    /// left untouched then.
    pub fn fill(&mut self, fragment: &mut Fragment) -> bool {
        if self.position >= self.frames + self.tail {
            return false;
        }
        let Some(waveform) = fragment.as_waveform_mut() else {
            return false;
        };
        let start = (self.position * self.channels).min(self.samples.len());
        let end = ((self.position + self.fragment_size) * self.channels).min(self.samples.len());
        waveform.copy_from_interleaved(&self.samples[start..end]);
        self.position += self.fragment_size;
        true
    }
}

/// Collects output fragments into an interleaved buffer.
#[derive(Debug, Clone)]
pub struct FragmentSink {
    samples: Vec<f32>,
    scratch: Vec<f32>,
    channels: usize,
    skip: usize,
    limit: usize,
    seen: usize,
}

impl FragmentSink {
    /// Sink keeping `limit` frames of `channels` channels after skipping `skip`.
    pub fn new(channels: usize, skip: usize, limit: usize) -> Self {
        Self {
            samples: Vec::with_capacity(limit * channels),
            scratch: Vec::new(),
            channels,
            skip,
            limit,
            seen: 0,
        }
    }

    /// Frames kept so far.
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1)
    }

    /// Append one output fragment.
    pub fn push(&mut self, waveform: &Waveform) -> Result<()> {
        if waveform.channels() != self.channels {
            return Err(Error::ChannelMismatch {
                expected: self.channels,
                actual: waveform.channels(),
            });
        }
        let frames = waveform.frames();
        self.scratch.resize(frames * self.channels, 0.0);
        waveform.write_interleaved(&mut self.scratch);

        let first = self.skip.saturating_sub(self.seen).min(frames);
        let room = self.limit - self.frames();
        let keep = (frames - first).min(room);
        self.samples.extend_from_slice(
            &self.scratch[first * self.channels..(first + keep) * self.channels],
        );
        self.seen += frames;
        Ok(())
    }

    /// The collected interleaved samples.
    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }
}

/// Run a prepared chain over a whole interleaved recording.
///
/// With `compensate` set the chain latency is flushed out with silence and
/// trimmed from the front, so the output lines up with the input frame for
/// frame. The output has the chain's output channel count.
pub fn render(
    chain: &mut ProcessingChain,
    samples: Vec<f32>,
    compensate: bool,
) -> Result<Vec<f32>> {
    let (Some(input), Some(output)) = (chain.input_descriptor(), chain.output_descriptor()) else {
        return Err(Error::NotPrepared);
    };
    if output.domain != cadence_core::Domain::Waveform {
        return Err(Error::SpectrumOutput);
    }
    let latency = if compensate { chain.latency() } else { 0 };

    let mut source = FragmentSource::new(samples, input.channels, input.fragment_size)
        .with_tail(latency);
    let mut sink = FragmentSink::new(output.channels, latency, source.frames());
    let mut fragment = Fragment::for_descriptor(&input);

    tracing::debug!(
        frames = source.frames(),
        fragments = source.fragments(),
        latency,
        "render: start"
    );

    while source.fill(&mut fragment) {
        let out = chain.process(&mut fragment)?;
        let waveform = out.as_waveform().ok_or(Error::SpectrumOutput)?;
        sink.push(waveform)?;
    }

    tracing::debug!(frames = sink.frames(), "render: done");
    Ok(sink.into_samples())
}
