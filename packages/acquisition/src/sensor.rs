use crate::clock::Clock;
use crate::reading::{self, Reading, SensorName, READING_MAX, READING_MIN};

pub const MAX_CHANNELS: usize = 4;

/// Raw analog conversions, one channel at a time.
///
/// `None` means the conversion produced nothing usable; the reader turns that
/// into the sentinel reading instead of an error.
pub trait AnalogSource {
    fn sample(&mut self, channel: ChannelId) -> Option<u16>;
}

impl<T: AnalogSource + ?Sized> AnalogSource for &mut T {
    fn sample(&mut self, channel: ChannelId) -> Option<u16> {
        (**self).sample(channel)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChannelId(u8);

impl ChannelId {
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Linear map from raw counts onto the reading range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Calibration {
    pub raw_min: u16,
    pub raw_max: u16,
}

impl Calibration {
    /// Raw counts already in reading units.
    pub const TEN_BIT: Self = Self {
        raw_min: 0,
        raw_max: READING_MAX,
    };
    /// Full scale of a 12-bit converter such as the ESP32 ADC1.
    pub const TWELVE_BIT: Self = Self {
        raw_min: 0,
        raw_max: 4095,
    };

    pub const fn is_valid(self) -> bool {
        self.raw_min < self.raw_max
    }

    pub const fn contains(self, raw: u16) -> bool {
        raw >= self.raw_min && raw <= self.raw_max
    }

    pub fn to_reading(self, raw: u16) -> u16 {
        if !self.is_valid() {
            return READING_MIN;
        }
        let clamped = raw.clamp(self.raw_min, self.raw_max);
        let span = u32::from(self.raw_max - self.raw_min);
        let offset = u32::from(clamped - self.raw_min);
        let scaled = (offset * u32::from(READING_MAX) + span / 2) / span;
        (scaled as u16).min(READING_MAX)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SensorAnomaly {
    NoSignal,
    OutOfRange { raw: u16 },
    Stuck { raw: u16, repeats: u16 },
}

impl SensorAnomaly {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoSignal => "no_signal",
            Self::OutOfRange { .. } => "out_of_range",
            Self::Stuck { .. } => "stuck",
        }
    }

    pub const fn raw(self) -> Option<u16> {
        match self {
            Self::NoSignal => None,
            Self::OutOfRange { raw } | Self::Stuck { raw, .. } => Some(raw),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SensorConfigError {
    TooManyChannels,
    NameTooLong,
    InvalidCalibration,
}

impl SensorConfigError {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TooManyChannels => "too_many_channels",
            Self::NameTooLong => "name_too_long",
            Self::InvalidCalibration => "invalid_calibration",
        }
    }
}

#[derive(Clone, Debug)]
struct ChannelSlot {
    name: SensorName,
    calibration: Calibration,
    last_raw: Option<u16>,
    repeats: u16,
    anomaly: Option<SensorAnomaly>,
}

/// Named analog channels with per-channel calibration and anomaly tracking.
pub struct SensorReader<A, C> {
    source: A,
    clock: C,
    channels: heapless::Vec<ChannelSlot, MAX_CHANNELS>,
    stuck_threshold: u16,
}

impl<A: AnalogSource, C: Clock> SensorReader<A, C> {
    /// `stuck_threshold` of zero disables stuck detection.
    pub fn new(source: A, clock: C, stuck_threshold: u16) -> Self {
        Self {
            source,
            clock,
            channels: heapless::Vec::new(),
            stuck_threshold,
        }
    }

    pub fn configure(
        &mut self,
        name: &str,
        calibration: Calibration,
    ) -> Result<ChannelId, SensorConfigError> {
        if !calibration.is_valid() {
            return Err(SensorConfigError::InvalidCalibration);
        }
        let name = reading::sensor_name(name).ok_or(SensorConfigError::NameTooLong)?;
        let id = ChannelId(self.channels.len() as u8);
        self.channels
            .push(ChannelSlot {
                name,
                calibration,
                last_raw: None,
                repeats: 0,
                anomaly: None,
            })
            .map_err(|_| SensorConfigError::TooManyChannels)?;
        Ok(id)
    }

    /// Configures one channel per name, in pin order. Channel ids are
    /// positional, so the first rejected name ends the list rather than
    /// shifting the names after it onto its pin.
    pub fn configure_in_pin_order<'n>(
        &mut self,
        names: impl IntoIterator<Item = &'n str>,
        calibration: Calibration,
    ) -> Result<(), (&'n str, SensorConfigError)> {
        for name in names {
            self.configure(name, calibration).map_err(|err| (name, err))?;
        }
        Ok(())
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn channel(&self, index: usize) -> Option<ChannelId> {
        (index < self.channels.len()).then_some(ChannelId(index as u8))
    }

    pub fn name(&self, channel: ChannelId) -> &str {
        self.channels
            .get(channel.index())
            .map(|slot| slot.name.as_str())
            .unwrap_or("")
    }

    /// Anomaly observed by the latest capture on `channel`.
    pub fn anomaly(&self, channel: ChannelId) -> Option<SensorAnomaly> {
        self.channels
            .get(channel.index())
            .and_then(|slot| slot.anomaly)
    }

    pub fn capture(&mut self, channel: ChannelId) -> Reading {
        let timestamp = self.clock.now();
        let raw = self.source.sample(channel);
        let stuck_threshold = self.stuck_threshold;
        let Some(slot) = self.channels.get_mut(channel.index()) else {
            return Reading::new(SensorName::new(), READING_MIN, timestamp);
        };

        let Some(raw) = raw else {
            slot.last_raw = None;
            slot.repeats = 0;
            slot.anomaly = Some(SensorAnomaly::NoSignal);
            return Reading::new(slot.name.clone(), READING_MIN, timestamp);
        };

        if slot.last_raw == Some(raw) {
            slot.repeats = slot.repeats.saturating_add(1);
        } else {
            slot.last_raw = Some(raw);
            slot.repeats = 1;
        }

        slot.anomaly = if !slot.calibration.contains(raw) {
            Some(SensorAnomaly::OutOfRange { raw })
        } else if stuck_threshold > 0 && slot.repeats >= stuck_threshold {
            Some(SensorAnomaly::Stuck {
                raw,
                repeats: slot.repeats,
            })
        } else {
            None
        };

        let value = slot.calibration.to_reading(raw);
        Reading::new(slot.name.clone(), value, timestamp)
    }

    pub fn source_mut(&mut self) -> &mut A {
        &mut self.source
    }
}
