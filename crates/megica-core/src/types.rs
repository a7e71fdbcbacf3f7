//! Core types for the Megica pipeline
//!
//! This module provides the data model shared by every stage:
//! - Channel kinds (MEG sensors vs. auxiliary channels)
//! - Sensor positions and channel layouts
//! - The multichannel signal itself

use serde::{Deserialize, Serialize};

use crate::error::{SignalError, SignalResult};

// ============================================================================
// Channel Kinds
// ============================================================================

/// Kind of sensor that recorded a channel.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// MEG magnetometer
    Magnetometer,
    /// MEG planar gradiometer
    Gradiometer,
    /// EEG electrode
    Eeg,
    /// Electro-oculogram
    Eog,
    /// Electrocardiogram
    Ecg,
    /// Stimulus / trigger line
    Stim,
    /// Reference sensor (e.g. reference magnetometer array)
    Reference,
    /// Anything else
    Misc,
}

impl ChannelKind {
    /// MEG sensor kinds (magnetometers and gradiometers)
    pub const MEG: [Self; 2] = [Self::Magnetometer, Self::Gradiometer];

    /// Whether this is a MEG sensor channel
    #[inline]
    #[must_use]
    pub const fn is_meg(self) -> bool {
        matches!(self, Self::Magnetometer | Self::Gradiometer)
    }

    /// Short lowercase name
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Magnetometer => "mag",
            Self::Gradiometer => "grad",
            Self::Eeg => "eeg",
            Self::Eog => "eog",
            Self::Ecg => "ecg",
            Self::Stim => "stim",
            Self::Reference => "ref",
            Self::Misc => "misc",
        }
    }
}

// ============================================================================
// Sensor Layout
// ============================================================================

/// Sensor position in head coordinates (metres).
///
/// 2D layouts use `z = 0`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorPosition {
    /// X coordinate (left → right)
    pub x: f64,
    /// Y coordinate (posterior → anterior)
    pub y: f64,
    /// Z coordinate (inferior → superior)
    #[serde(default)]
    pub z: f64,
}

impl SensorPosition {
    /// Create a position on a flat 2D layout
    #[inline]
    #[must_use]
    pub const fn planar(x: f64, y: f64) -> Self {
        Self { x, y, z: 0.0 }
    }
}

/// Per-channel metadata.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelInfo {
    /// Channel name as reported by the acquisition system
    pub name: String,
    /// Sensor kind
    pub kind: ChannelKind,
    /// Sensor position, if known
    #[serde(default)]
    pub position: Option<SensorPosition>,
}

impl ChannelInfo {
    /// Create channel metadata without a position
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ChannelKind) -> Self {
        Self { name: name.into(), kind, position: None }
    }

    /// Attach a sensor position
    #[must_use]
    pub fn with_position(mut self, position: SensorPosition) -> Self {
        self.position = Some(position);
        self
    }
}

/// Ordered channel metadata for a recording.
///
/// Only the export side interprets positions; the decomposition core only
/// needs kinds for channel selection.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelLayout {
    channels: Vec<ChannelInfo>,
}

impl ChannelLayout {
    /// Create a layout from channel metadata
    #[must_use]
    pub fn new(channels: Vec<ChannelInfo>) -> Self {
        Self { channels }
    }

    /// Create a layout of `n` anonymous channels of one kind
    #[must_use]
    pub fn uniform(n: usize, kind: ChannelKind) -> Self {
        let prefix = kind.name().to_uppercase();
        Self {
            channels: (0..n).map(|i| ChannelInfo::new(format!("{prefix}{i:03}"), kind)).collect(),
        }
    }

    /// Number of channels
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Whether the layout has no channels
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Channel metadata by index
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&ChannelInfo> {
        self.channels.get(index)
    }

    /// Iterate over channel metadata
    pub fn iter(&self) -> impl Iterator<Item = &ChannelInfo> {
        self.channels.iter()
    }

    /// Indices of channels whose kind is in `kinds`
    #[must_use]
    pub fn indices_of(&self, kinds: &[ChannelKind]) -> Vec<usize> {
        self.channels
            .iter()
            .enumerate()
            .filter(|(_, ch)| kinds.contains(&ch.kind))
            .map(|(i, _)| i)
            .collect()
    }

    /// Layout restricted to the given indices, in the given order
    #[must_use]
    pub fn subset(&self, indices: &[usize]) -> Self {
        Self {
            channels: indices.iter().filter_map(|&i| self.channels.get(i).cloned()).collect(),
        }
    }
}

// ============================================================================
// Multichannel Signal
// ============================================================================

/// A multichannel recording: `n_channels` equal-length sample sequences.
///
/// Construction validates that every channel has the same length and that
/// the layout describes exactly the stored channels.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSignal", into = "RawSignal")]
pub struct MultichannelSignal {
    data: Vec<Vec<f64>>,
    sampling_rate: f64,
    layout: ChannelLayout,
}

impl MultichannelSignal {
    /// Create a signal, validating its shape.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError`] if the signal is empty, channels differ in
    /// length, the layout has the wrong size or the sampling rate is not a
    /// positive finite number.
    pub fn new(data: Vec<Vec<f64>>, sampling_rate: f64, layout: ChannelLayout) -> SignalResult<Self> {
        if !(sampling_rate.is_finite() && sampling_rate > 0.0) {
            return Err(SignalError::InvalidSamplingRate { rate: sampling_rate });
        }
        let Some(first) = data.first() else {
            return Err(SignalError::EmptySignal);
        };
        let expected = first.len();
        if expected == 0 {
            return Err(SignalError::EmptySignal);
        }
        if let Some((channel, ch)) = data.iter().enumerate().find(|(_, ch)| ch.len() != expected) {
            return Err(SignalError::RaggedChannels { channel, expected, got: ch.len() });
        }
        if layout.len() != data.len() {
            return Err(SignalError::LayoutMismatch { channels: data.len(), layout: layout.len() });
        }

        Ok(Self { data, sampling_rate, layout })
    }

    /// Number of channels
    #[inline]
    #[must_use]
    pub fn n_channels(&self) -> usize {
        self.data.len()
    }

    /// Number of samples per channel
    #[inline]
    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.data.first().map_or(0, Vec::len)
    }

    /// Sampling rate in Hz
    #[inline]
    #[must_use]
    pub fn sampling_rate(&self) -> f64 {
        self.sampling_rate
    }

    /// Nyquist frequency in Hz
    #[inline]
    #[must_use]
    pub fn nyquist(&self) -> f64 {
        self.sampling_rate / 2.0
    }

    /// Channel layout
    #[inline]
    #[must_use]
    pub fn layout(&self) -> &ChannelLayout {
        &self.layout
    }

    /// Samples of one channel
    #[must_use]
    pub fn channel(&self, index: usize) -> Option<&[f64]> {
        self.data.get(index).map(Vec::as_slice)
    }

    /// All channels, in layout order
    #[inline]
    #[must_use]
    pub fn channels(&self) -> &[Vec<f64>] {
        &self.data
    }

    /// Consume the signal, returning its parts
    #[must_use]
    pub fn into_parts(self) -> (Vec<Vec<f64>>, f64, ChannelLayout) {
        (self.data, self.sampling_rate, self.layout)
    }

    /// New signal with only the given channels, in the given order
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::EmptySignal`] if `indices` selects nothing.
    pub fn select(&self, indices: &[usize]) -> SignalResult<Self> {
        let data: Vec<Vec<f64>> = indices.iter().filter_map(|&i| self.data.get(i).cloned()).collect();
        Self::new(data, self.sampling_rate, self.layout.subset(indices))
    }

    /// Same layout, new sample data and rate
    ///
    /// # Errors
    ///
    /// Returns [`SignalError`] if the new data is inconsistent with the layout.
    pub fn with_data(&self, data: Vec<Vec<f64>>, sampling_rate: f64) -> SignalResult<Self> {
        Self::new(data, sampling_rate, self.layout.clone())
    }

    /// Check that every sample is finite
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::NonFiniteSample`] at the first NaN or infinity.
    pub fn ensure_finite(&self) -> SignalResult<()> {
        for (channel, samples) in self.data.iter().enumerate() {
            if let Some(sample) = samples.iter().position(|v| !v.is_finite()) {
                return Err(SignalError::NonFiniteSample { channel, sample });
            }
        }
        Ok(())
    }
}

/// Serialized form of [`MultichannelSignal`]; validated on the way in.
#[derive(Serialize, Deserialize)]
struct RawSignal {
    sampling_rate: f64,
    layout: ChannelLayout,
    data: Vec<Vec<f64>>,
}

impl TryFrom<RawSignal> for MultichannelSignal {
    type Error = SignalError;

    fn try_from(raw: RawSignal) -> SignalResult<Self> {
        Self::new(raw.data, raw.sampling_rate, raw.layout)
    }
}

impl From<MultichannelSignal> for RawSignal {
    fn from(signal: MultichannelSignal) -> Self {
        let (data, sampling_rate, layout) = signal.into_parts();
        Self { sampling_rate, layout, data }
    }
}
