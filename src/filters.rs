//! Audio filters and the per-session filter sink
//!
//! Every filter kind validates its parameters on construction and on every
//! setter, so a [`FilterSink`] only ever holds values the node accepts. The
//! sink serializes kinds in a fixed order (volume, timescale, karaoke,
//! channel_mix, vibrato, rotation, low_pass, tremolo, equalizer, distortion)
//! and omits kinds that are not set.

use crate::error::{ObsidianError, Result};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::collections::BTreeMap;

/// Number of equalizer bands the node understands
pub const EQ_BANDS: usize = 15;

/// Filter kinds, declared in wire order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FilterKind {
    Volume,
    Timescale,
    Karaoke,
    ChannelMix,
    Vibrato,
    Rotation,
    LowPass,
    Tremolo,
    Equalizer,
    Distortion,
}

impl FilterKind {
    pub const ALL: [FilterKind; 10] = [
        FilterKind::Volume,
        FilterKind::Timescale,
        FilterKind::Karaoke,
        FilterKind::ChannelMix,
        FilterKind::Vibrato,
        FilterKind::Rotation,
        FilterKind::LowPass,
        FilterKind::Tremolo,
        FilterKind::Equalizer,
        FilterKind::Distortion,
    ];

    /// Key of this kind in the `filters` object
    pub fn key(self) -> &'static str {
        match self {
            FilterKind::Volume => "volume",
            FilterKind::Timescale => "timescale",
            FilterKind::Karaoke => "karaoke",
            FilterKind::ChannelMix => "channel_mix",
            FilterKind::Vibrato => "vibrato",
            FilterKind::Rotation => "rotation",
            FilterKind::LowPass => "low_pass",
            FilterKind::Tremolo => "tremolo",
            FilterKind::Equalizer => "equalizer",
            FilterKind::Distortion => "distortion",
        }
    }
}

fn in_range(name: &str, value: f64, min: f64, max: f64) -> Result<f64> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(ObsidianError::Validation(format!(
            "{name} must be between {min} and {max}, got {value}"
        )))
    }
}

fn positive(name: &str, value: f64) -> Result<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ObsidianError::Validation(format!("{name} must be positive, got {value}")))
    }
}

fn positive_up_to(name: &str, value: f64, max: f64) -> Result<f64> {
    if value.is_finite() && value > 0.0 && value <= max {
        Ok(value)
    } else {
        Err(ObsidianError::Validation(format!(
            "{name} must be above 0 and at most {max}, got {value}"
        )))
    }
}

/// Output volume as a multiplier, 1.0 = 100%
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeFilter {
    volume: f64,
}

impl VolumeFilter {
    /// Highest accepted multiplier (500%)
    pub const MAX: f64 = 5.0;

    /// Create a volume filter from a multiplier in `[0, 5]`
    ///
    /// # Example
    ///
    /// ```
    /// # use obsidian_client::VolumeFilter;
    /// let louder = VolumeFilter::new(1.5)?;
    /// assert_eq!(louder.percent(), 150);
    /// assert!(VolumeFilter::new(5.5).is_err());
    /// # Ok::<(), obsidian_client::ObsidianError>(())
    /// ```
    pub fn new(volume: f64) -> Result<Self> {
        Ok(Self {
            volume: in_range("volume", volume, 0.0, Self::MAX)?,
        })
    }

    /// Volume from a percentage, 100 = unchanged
    pub fn from_percent(percent: u32) -> Result<Self> {
        Self::new(f64::from(percent) / 100.0)
    }

    /// Get the volume multiplier
    pub fn volume(&self) -> f64 {
        self.volume
    }

    /// Set the volume multiplier, leaving it untouched when out of range
    pub fn set_volume(&mut self, volume: f64) -> Result<()> {
        self.volume = in_range("volume", volume, 0.0, Self::MAX)?;
        Ok(())
    }

    /// Get the volume as a rounded percentage
    pub fn percent(&self) -> u32 {
        (self.volume * 100.0).round() as u32
    }

    /// Set the volume from a percentage, 0 to 500
    pub fn set_percent(&mut self, percent: u32) -> Result<()> {
        self.set_volume(f64::from(percent) / 100.0)
    }
}

impl Default for VolumeFilter {
    fn default() -> Self {
        Self { volume: 1.0 }
    }
}

impl Serialize for VolumeFilter {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.volume)
    }
}

/// Pitch, rate and speed changes
///
/// Within each group only one representation can be set; setting one
/// clears the others.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TimescaleFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pitch: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pitch_octaves: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rate_change: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    speed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    speed_change: Option<f64>,
    #[serde(rename = "pitch_semi_tones", skip_serializing_if = "Option::is_none")]
    pitch_semitones: Option<f64>,
}

impl TimescaleFilter {
    /// Create a timescale filter with nothing set
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the pitch multiplier, clearing octave and semitone shifts
    pub fn with_pitch(mut self, pitch: f64) -> Result<Self> {
        self.pitch = Some(positive("pitch", pitch)?);
        self.pitch_octaves = None;
        self.pitch_semitones = None;
        Ok(self)
    }

    /// Shift the pitch by octaves, clearing the multiplier and semitone shift
    pub fn with_pitch_octaves(mut self, octaves: f64) -> Result<Self> {
        self.pitch_octaves = Some(in_range("pitch_octaves", octaves, f64::MIN, f64::MAX)?);
        self.pitch = None;
        self.pitch_semitones = None;
        Ok(self)
    }

    /// Shift the pitch by semitones, clearing the multiplier and octave shift
    pub fn with_pitch_semitones(mut self, semitones: f64) -> Result<Self> {
        self.pitch_semitones = Some(in_range("pitch_semitones", semitones, f64::MIN, f64::MAX)?);
        self.pitch = None;
        self.pitch_octaves = None;
        Ok(self)
    }

    /// Set the rate multiplier, clearing the percentage change
    pub fn with_rate(mut self, rate: f64) -> Result<Self> {
        self.rate = Some(positive("rate", rate)?);
        self.rate_change = None;
        Ok(self)
    }

    /// Change the rate by a percentage, clearing the multiplier
    pub fn with_rate_change(mut self, change: f64) -> Result<Self> {
        self.rate_change = Some(in_range("rate_change", change, f64::MIN, f64::MAX)?);
        self.rate = None;
        Ok(self)
    }

    /// Set the speed multiplier, clearing the percentage change
    pub fn with_speed(mut self, speed: f64) -> Result<Self> {
        self.speed = Some(positive("speed", speed)?);
        self.speed_change = None;
        Ok(self)
    }

    /// Change the speed by a percentage, clearing the multiplier
    pub fn with_speed_change(mut self, change: f64) -> Result<Self> {
        self.speed_change = Some(in_range("speed_change", change, f64::MIN, f64::MAX)?);
        self.speed = None;
        Ok(self)
    }

    /// Get the pitch multiplier
    pub fn pitch(&self) -> Option<f64> {
        self.pitch
    }

    /// Get the pitch shift in octaves
    pub fn pitch_octaves(&self) -> Option<f64> {
        self.pitch_octaves
    }

    /// Get the pitch shift in semitones
    pub fn pitch_semitones(&self) -> Option<f64> {
        self.pitch_semitones
    }

    /// Get the rate multiplier
    pub fn rate(&self) -> Option<f64> {
        self.rate
    }

    /// Get the rate change in percent
    pub fn rate_change(&self) -> Option<f64> {
        self.rate_change
    }

    /// Get the speed multiplier
    pub fn speed(&self) -> Option<f64> {
        self.speed
    }

    /// Get the speed change in percent
    pub fn speed_change(&self) -> Option<f64> {
        self.speed_change
    }
}

/// Vocal elimination by band filtering
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct KaraokeFilter {
    level: f64,
    mono_level: f64,
    filter_band: f64,
    filter_width: f64,
}

impl KaraokeFilter {
    /// Levels are in `[0, 1]`; band and width must be positive
    pub fn new(level: f64, mono_level: f64, filter_band: f64, filter_width: f64) -> Result<Self> {
        Ok(Self {
            level: in_range("level", level, 0.0, 1.0)?,
            mono_level: in_range("mono_level", mono_level, 0.0, 1.0)?,
            filter_band: positive("filter_band", filter_band)?,
            filter_width: positive("filter_width", filter_width)?,
        })
    }

    /// Get the effect level
    pub fn level(&self) -> f64 {
        self.level
    }

    /// Get the mono level
    pub fn mono_level(&self) -> f64 {
        self.mono_level
    }

    /// Get the filtered band in Hz
    pub fn filter_band(&self) -> f64 {
        self.filter_band
    }

    /// Get the width of the filtered band
    pub fn filter_width(&self) -> f64 {
        self.filter_width
    }
}

impl Default for KaraokeFilter {
    fn default() -> Self {
        Self {
            level: 1.0,
            mono_level: 1.0,
            filter_band: 220.0,
            filter_width: 100.0,
        }
    }
}

/// Mixes the left and right channels into each other
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChannelMixFilter {
    left_to_left: f64,
    left_to_right: f64,
    right_to_left: f64,
    right_to_right: f64,
}

impl ChannelMixFilter {
    /// Create a mix from four factors in `[0, 1]`
    pub fn new(left_to_left: f64, left_to_right: f64, right_to_left: f64, right_to_right: f64) -> Result<Self> {
        Ok(Self {
            left_to_left: in_range("left_to_left", left_to_left, 0.0, 1.0)?,
            left_to_right: in_range("left_to_right", left_to_right, 0.0, 1.0)?,
            right_to_left: in_range("right_to_left", right_to_left, 0.0, 1.0)?,
            right_to_right: in_range("right_to_right", right_to_right, 0.0, 1.0)?,
        })
    }

    /// Both outputs carry the average of both inputs
    pub fn mono() -> Self {
        Self {
            left_to_left: 0.5,
            left_to_right: 0.5,
            right_to_left: 0.5,
            right_to_right: 0.5,
        }
    }

    /// Left and right swapped
    pub fn switch() -> Self {
        Self {
            left_to_left: 0.0,
            left_to_right: 1.0,
            right_to_left: 1.0,
            right_to_right: 0.0,
        }
    }
}

impl Default for ChannelMixFilter {
    fn default() -> Self {
        Self {
            left_to_left: 1.0,
            left_to_right: 0.0,
            right_to_left: 0.0,
            right_to_right: 1.0,
        }
    }
}

/// Pitch oscillation
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VibratoFilter {
    frequency: f64,
    depth: f64,
}

impl VibratoFilter {
    pub const MAX_FREQUENCY: f64 = 14.0;

    /// Frequency in `(0, 14]` Hz, depth in `(0, 1]`
    pub fn new(frequency: f64, depth: f64) -> Result<Self> {
        Ok(Self {
            frequency: positive_up_to("frequency", frequency, Self::MAX_FREQUENCY)?,
            depth: positive_up_to("depth", depth, 1.0)?,
        })
    }

    /// Get the oscillation frequency in Hz
    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    /// Get the effect depth
    pub fn depth(&self) -> f64 {
        self.depth
    }
}

impl Default for VibratoFilter {
    fn default() -> Self {
        Self {
            frequency: 2.0,
            depth: 0.5,
        }
    }
}

/// Volume oscillation
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TremoloFilter {
    frequency: f64,
    depth: f64,
}

impl TremoloFilter {
    /// Frequency must be positive, depth in `(0, 1]`
    pub fn new(frequency: f64, depth: f64) -> Result<Self> {
        Ok(Self {
            frequency: positive("frequency", frequency)?,
            depth: positive_up_to("depth", depth, 1.0)?,
        })
    }

    /// Get the oscillation frequency in Hz
    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    /// Get the effect depth
    pub fn depth(&self) -> f64 {
        self.depth
    }
}

impl Default for TremoloFilter {
    fn default() -> Self {
        Self {
            frequency: 2.0,
            depth: 0.5,
        }
    }
}

/// Audio panning around the stereo field, in Hz
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotationFilter {
    hz: f64,
}

impl RotationFilter {
    /// Create a rotation at `hz` rotations per second
    pub fn new(hz: f64) -> Result<Self> {
        Ok(Self {
            hz: positive("hz", hz)?,
        })
    }

    /// Get the rotation speed in Hz
    pub fn hz(&self) -> f64 {
        self.hz
    }
}

impl Default for RotationFilter {
    fn default() -> Self {
        Self { hz: 5.0 }
    }
}

impl Serialize for RotationFilter {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.hz)
    }
}

/// Suppresses high frequencies
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LowPassFilter {
    smoothing: f64,
}

impl LowPassFilter {
    /// Create a low-pass filter; higher smoothing cuts more
    pub fn new(smoothing: f64) -> Result<Self> {
        Ok(Self {
            smoothing: positive("smoothing", smoothing)?,
        })
    }

    /// Get the smoothing factor
    pub fn smoothing(&self) -> f64 {
        self.smoothing
    }
}

impl Default for LowPassFilter {
    fn default() -> Self {
        Self { smoothing: 20.0 }
    }
}

/// Trigonometric waveshaping
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DistortionFilter {
    pub sin_offset: f64,
    pub sin_scale: f64,
    pub cos_offset: f64,
    pub cos_scale: f64,
    pub tan_offset: f64,
    pub tan_scale: f64,
    pub offset: f64,
    pub scale: f64,
}

impl Default for DistortionFilter {
    fn default() -> Self {
        Self {
            sin_offset: 0.0,
            sin_scale: 1.0,
            cos_offset: 0.0,
            cos_scale: 1.0,
            tan_offset: 0.0,
            tan_scale: 1.0,
            offset: 0.0,
            scale: 1.0,
        }
    }
}

/// 15-band equalizer, gains in `[-0.25, 1.0]`
#[derive(Debug, Clone, PartialEq)]
pub struct Equalizer {
    name: String,
    gains: [f64; EQ_BANDS],
}

impl Equalizer {
    /// Lowest accepted band gain
    pub const MIN_GAIN: f64 = -0.25;
    /// Highest accepted band gain
    pub const MAX_GAIN: f64 = 1.0;

    /// Build from up to 15 gains; missing bands are flat, extra gains are
    /// dropped
    pub fn new(name: impl Into<String>, gains: &[f64]) -> Result<Self> {
        let mut bands = [0.0; EQ_BANDS];
        for (band, gain) in bands.iter_mut().zip(gains) {
            *band = in_range("gain", *gain, Self::MIN_GAIN, Self::MAX_GAIN)?;
        }
        Ok(Self {
            name: name.into(),
            gains: bands,
        })
    }

    /// Get the equalizer name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the gains of all 15 bands
    pub fn gains(&self) -> &[f64; EQ_BANDS] {
        &self.gains
    }

    /// Set one band's gain
    ///
    /// Fails for bands past 14 or gains outside `[-0.25, 1.0]`.
    pub fn set(&mut self, band: usize, gain: f64) -> Result<()> {
        let gain = in_range("gain", gain, Self::MIN_GAIN, Self::MAX_GAIN)?;
        let slot = self
            .gains
            .get_mut(band)
            .ok_or(ObsidianError::IndexOutOfRange { index: band, len: EQ_BANDS })?;
        *slot = gain;
        Ok(())
    }

    /// Reset one band to flat
    pub fn reset_band(&mut self, band: usize) -> Result<()> {
        self.set(band, 0.0)
    }

    /// Reset every band to flat, keeping the name
    pub fn reset(&mut self) {
        self.gains = [0.0; EQ_BANDS];
    }

    fn preset(name: &str, gains: &[f64]) -> Self {
        let mut bands = [0.0; EQ_BANDS];
        for (band, gain) in bands.iter_mut().zip(gains) {
            *band = *gain;
        }
        Self {
            name: name.to_string(),
            gains: bands,
        }
    }

    /// All bands at zero
    pub fn flat() -> Self {
        Self::preset("flat", &[])
    }

    /// Lifted lows and highs
    pub fn boost() -> Self {
        Self::preset(
            "boost",
            &[-0.075, 0.125, 0.125, 0.1, 0.1, 0.05, 0.075, 0.0, 0.0, 0.0, 0.0, 0.0, 0.125, 0.15, 0.05],
        )
    }

    pub fn metal() -> Self {
        Self::preset(
            "metal",
            &[0.0, 0.1, 0.1, 0.15, 0.13, 0.1, 0.0, 0.125, 0.175, 0.175, 0.125, 0.125, 0.1, 0.075, 0.0],
        )
    }

    pub fn piano() -> Self {
        Self::preset(
            "piano",
            &[-0.25, -0.25, -0.125, 0.0, 0.25, 0.25, 0.0, -0.25, -0.25, 0.0, 0.0, 0.5, 0.25, -0.025],
        )
    }

    pub fn jazz() -> Self {
        Self::preset(
            "jazz",
            &[-0.13, -0.11, 0.1, -0.1, 0.14, 0.2, -0.18, 0.0, 0.24, 0.22, 0.2, 0.0, 0.0, 0.0, 0.0],
        )
    }

    pub fn pop() -> Self {
        Self::preset(
            "pop",
            &[-0.02, -0.01, 0.08, 0.1, 0.15, 0.1, 0.03, -0.02, -0.035, -0.05, -0.05, -0.05, -0.05, -0.05, -0.05],
        )
    }

    /// Look up a preset by name
    pub fn by_name(name: &str) -> Option<Self> {
        match name {
            "flat" => Some(Self::flat()),
            "boost" => Some(Self::boost()),
            "metal" => Some(Self::metal()),
            "piano" => Some(Self::piano()),
            "jazz" => Some(Self::jazz()),
            "pop" => Some(Self::pop()),
            _ => None,
        }
    }
}

impl Serialize for Equalizer {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.gains.serialize(serializer)
    }
}

/// One configured filter
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Volume(VolumeFilter),
    Timescale(TimescaleFilter),
    Karaoke(KaraokeFilter),
    ChannelMix(ChannelMixFilter),
    Vibrato(VibratoFilter),
    Rotation(RotationFilter),
    LowPass(LowPassFilter),
    Tremolo(TremoloFilter),
    Equalizer(Equalizer),
    Distortion(DistortionFilter),
}

impl Filter {
    /// Get the kind this filter is stored under
    pub fn kind(&self) -> FilterKind {
        match self {
            Filter::Volume(_) => FilterKind::Volume,
            Filter::Timescale(_) => FilterKind::Timescale,
            Filter::Karaoke(_) => FilterKind::Karaoke,
            Filter::ChannelMix(_) => FilterKind::ChannelMix,
            Filter::Vibrato(_) => FilterKind::Vibrato,
            Filter::Rotation(_) => FilterKind::Rotation,
            Filter::LowPass(_) => FilterKind::LowPass,
            Filter::Tremolo(_) => FilterKind::Tremolo,
            Filter::Equalizer(_) => FilterKind::Equalizer,
            Filter::Distortion(_) => FilterKind::Distortion,
        }
    }
}

impl Serialize for Filter {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Filter::Volume(f) => f.serialize(serializer),
            Filter::Timescale(f) => f.serialize(serializer),
            Filter::Karaoke(f) => f.serialize(serializer),
            Filter::ChannelMix(f) => f.serialize(serializer),
            Filter::Vibrato(f) => f.serialize(serializer),
            Filter::Rotation(f) => f.serialize(serializer),
            Filter::LowPass(f) => f.serialize(serializer),
            Filter::Tremolo(f) => f.serialize(serializer),
            Filter::Equalizer(f) => f.serialize(serializer),
            Filter::Distortion(f) => f.serialize(serializer),
        }
    }
}

macro_rules! impl_into_filter {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Filter {
                fn from(filter: $ty) -> Self {
                    Filter::$variant(filter)
                }
            }
        )*
    };
}

impl_into_filter! {
    VolumeFilter => Volume,
    TimescaleFilter => Timescale,
    KaraokeFilter => Karaoke,
    ChannelMixFilter => ChannelMix,
    VibratoFilter => Vibrato,
    RotationFilter => Rotation,
    LowPassFilter => LowPass,
    TremoloFilter => Tremolo,
    Equalizer => Equalizer,
    DistortionFilter => Distortion,
}

/// The set of filters applied to one session, at most one per kind
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSink {
    filters: BTreeMap<FilterKind, Filter>,
}

impl FilterSink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a filter, replacing any filter of the same kind
    pub fn add(&mut self, filter: impl Into<Filter>) -> &mut Self {
        let filter = filter.into();
        self.filters.insert(filter.kind(), filter);
        self
    }

    /// Remove the filter of `kind`, returning it
    pub fn remove(&mut self, kind: FilterKind) -> Option<Filter> {
        self.filters.remove(&kind)
    }

    /// Remove every filter
    pub fn reset(&mut self) {
        self.filters.clear();
    }

    /// Get the filter of `kind`
    pub fn get(&self, kind: FilterKind) -> Option<&Filter> {
        self.filters.get(&kind)
    }

    /// Whether a filter of `kind` is set
    pub fn contains(&self, kind: FilterKind) -> bool {
        self.filters.contains_key(&kind)
    }

    /// Get the number of active filters
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Active filters in wire order
    pub fn iter(&self) -> impl Iterator<Item = &Filter> {
        self.filters.values()
    }

    /// Get the volume filter, if set
    pub fn volume(&self) -> Option<&VolumeFilter> {
        match self.filters.get(&FilterKind::Volume) {
            Some(Filter::Volume(f)) => Some(f),
            _ => None,
        }
    }

    /// Get the equalizer, if set
    pub fn equalizer(&self) -> Option<&Equalizer> {
        match self.filters.get(&FilterKind::Equalizer) {
            Some(Filter::Equalizer(f)) => Some(f),
            _ => None,
        }
    }

    /// Get the timescale filter, if set
    pub fn timescale(&self) -> Option<&TimescaleFilter> {
        match self.filters.get(&FilterKind::Timescale) {
            Some(Filter::Timescale(f)) => Some(f),
            _ => None,
        }
    }

    /// `PLAYER_FILTERS` payload for a guild
    pub fn to_payload(&self, guild_id: u64) -> FiltersPayload<'_> {
        FiltersPayload {
            guild_id: guild_id.to_string(),
            filters: self,
        }
    }
}

impl Serialize for FilterSink {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.filters.len()))?;
        for (kind, filter) in &self.filters {
            map.serialize_entry(kind.key(), filter)?;
        }
        map.end()
    }
}

/// `{"guild_id": "...", "filters": {...}}`
#[derive(Debug, Serialize)]
pub struct FiltersPayload<'a> {
    pub guild_id: String,
    pub filters: &'a FilterSink,
}
