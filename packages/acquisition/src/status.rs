use core::fmt;

use embassy_time::{Duration, Instant};

use crate::delivery::FailureReason;
use crate::link::{AttachError, LinkState, LinkTransition};
use crate::sensor::SensorAnomaly;

/// Everything the core reports while it runs.
///
/// `Display` renders the console line for each event, so every sink prints
/// the same format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusEvent<'a> {
    Captured {
        sensor: &'a str,
        value: u16,
    },
    Anomaly {
        sensor: &'a str,
        anomaly: SensorAnomaly,
    },
    Link {
        transition: LinkTransition,
        at: Instant,
    },
    AttachFailed {
        attempt: u8,
        error: AttachError,
    },
    AttachRetryScheduled {
        delay: Duration,
    },
    Skipped {
        sensor: &'a str,
        link: LinkState,
    },
    Response {
        status: u16,
        body: &'a str,
    },
    RetryScheduled {
        sensor: &'a str,
        attempt: u8,
        reason: FailureReason,
        delay: Duration,
    },
    Delivered {
        sensor: &'a str,
        status: u16,
        attempts: u8,
    },
    Dropped {
        sensor: &'a str,
        reason: FailureReason,
        status: Option<u16>,
        attempts: u8,
        payload: &'a str,
    },
    TickCompleted {
        tick: u32,
        delivered: u8,
        dropped: u8,
        skipped: u8,
    },
}

pub trait StatusSink {
    fn emit(&mut self, event: StatusEvent<'_>);
}

impl<T: StatusSink + ?Sized> StatusSink for &mut T {
    fn emit(&mut self, event: StatusEvent<'_>) {
        (**self).emit(event)
    }
}

/// Discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl StatusSink for NullSink {
    fn emit(&mut self, _event: StatusEvent<'_>) {}
}

struct OptionalU16(Option<u16>);

impl fmt::Display for OptionalU16 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(value) => write!(f, "{value}"),
            None => f.write_str("-"),
        }
    }
}

impl fmt::Display for StatusEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Captured { sensor, value } => write!(f, "acq: {sensor} | {value}"),
            Self::Anomaly { sensor, anomaly } => {
                write!(
                    f,
                    "acq: anomaly sensor={sensor} kind={} raw={}",
                    anomaly.as_str(),
                    OptionalU16(anomaly.raw())
                )?;
                if let SensorAnomaly::Stuck { repeats, .. } = anomaly {
                    write!(f, " repeats={repeats}")?;
                }
                Ok(())
            }
            Self::Link { transition, at } => write!(
                f,
                "NET_EVENT {{\"from\":\"{}\",\"to\":\"{}\",\"trigger\":\"{}\",\"at_ms\":{}}}",
                transition.from.as_str(),
                transition.to.as_str(),
                transition.trigger,
                at.as_millis()
            ),
            Self::AttachFailed { attempt, error } => write!(
                f,
                "net: attach failed attempt={attempt} error={}",
                error.as_str()
            ),
            Self::AttachRetryScheduled { delay } => {
                write!(f, "net: attach retry in_ms={}", delay.as_millis())
            }
            Self::Skipped { sensor, link } => {
                write!(f, "acq: skip sensor={sensor} link={}", link.as_str())
            }
            Self::Response { status, body } => {
                write!(f, "http: status={status} body={}", body.trim())
            }
            Self::RetryScheduled {
                sensor,
                attempt,
                reason,
                delay,
            } => write!(
                f,
                "acq: retry sensor={sensor} attempt={attempt} reason={} status={} delay_ms={}",
                reason.as_str(),
                OptionalU16(reason.status()),
                delay.as_millis()
            ),
            Self::Delivered {
                sensor,
                status,
                attempts,
            } => write!(
                f,
                "acq: delivered sensor={sensor} status={status} attempts={attempts}"
            ),
            Self::Dropped {
                sensor,
                reason,
                status,
                attempts,
                payload,
            } => write!(
                f,
                "acq: drop sensor={sensor} reason={} status={} attempts={attempts} payload={payload}",
                reason.as_str(),
                OptionalU16(status)
            ),
            Self::TickCompleted {
                tick,
                delivered,
                dropped,
                skipped,
            } => write!(
                f,
                "acq: tick={tick} delivered={delivered} dropped={dropped} skipped={skipped}"
            ),
        }
    }
}
