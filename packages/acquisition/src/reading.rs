use embassy_time::Instant;

pub const READING_MIN: u16 = 0;
pub const READING_MAX: u16 = 1023;
pub const SENSOR_NAME_MAX: usize = 24;

pub type SensorName = heapless::String<SENSOR_NAME_MAX>;

/// One calibrated sample. Fields are private so a captured reading cannot
/// change on its way to the delivery client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reading {
    sensor_name: SensorName,
    value: u16,
    timestamp: Instant,
}

impl Reading {
    pub fn new(sensor_name: SensorName, value: u16, timestamp: Instant) -> Self {
        Self {
            sensor_name,
            value: value.min(READING_MAX),
            timestamp,
        }
    }

    pub fn sensor_name(&self) -> &str {
        self.sensor_name.as_str()
    }

    pub fn value(&self) -> u16 {
        self.value
    }

    pub fn timestamp(&self) -> Instant {
        self.timestamp
    }
}

/// Copies `name` into a bounded sensor name, or `None` when it does not fit.
pub fn sensor_name(name: &str) -> Option<SensorName> {
    let mut out = SensorName::new();
    out.push_str(name).ok()?;
    Some(out)
}
