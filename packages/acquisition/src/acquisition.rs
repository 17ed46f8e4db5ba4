use embassy_time::Duration;

use crate::clock::Clock;
use crate::delivery::{DeliveryClient, DeliveryOutcome, FailureReason};
use crate::link::{ConnectivityManager, Connector, Link, LinkState};
use crate::policy::AcquisitionPolicy;
use crate::sensor::{AnalogSource, ChannelId, SensorReader, MAX_CHANNELS};
use crate::status::{StatusEvent, StatusSink};

/// What happened to one channel's reading during a tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposition {
    Delivered { status: u16 },
    Skipped { link: LinkState },
    Dropped { reason: FailureReason },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelReport {
    pub channel: ChannelId,
    pub value: u16,
    pub attempts: u8,
    pub disposition: Disposition,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u32,
    pub channels: heapless::Vec<ChannelReport, MAX_CHANNELS>,
}

impl TickReport {
    fn count(&self, pred: impl Fn(&Disposition) -> bool) -> u8 {
        self.channels
            .iter()
            .filter(|report| pred(&report.disposition))
            .count() as u8
    }

    pub fn delivered(&self) -> u8 {
        self.count(|d| matches!(d, Disposition::Delivered { .. }))
    }

    pub fn dropped(&self) -> u8 {
        self.count(|d| matches!(d, Disposition::Dropped { .. }))
    }

    pub fn skipped(&self) -> u8 {
        self.count(|d| matches!(d, Disposition::Skipped { .. }))
    }
}

/// Samples every configured channel once per tick and pushes each reading
/// through connect, deliver and bounded retry. Failures end in a drop, never
/// in an error.
pub struct AcquisitionLoop<A, L, C, S> {
    reader: SensorReader<A, C>,
    manager: ConnectivityManager<L, C>,
    client: DeliveryClient,
    clock: C,
    sink: S,
    tick_interval: Duration,
    retry_limit: u8,
    retry_delay: Duration,
    tick: u32,
}

impl<A, L, C, S> AcquisitionLoop<A, L, C, S>
where
    A: AnalogSource,
    L: Link + Connector,
    C: Clock,
    S: StatusSink,
{
    pub fn new(
        reader: SensorReader<A, C>,
        manager: ConnectivityManager<L, C>,
        client: DeliveryClient,
        clock: C,
        sink: S,
        policy: &AcquisitionPolicy,
    ) -> Self {
        let policy = policy.sanitized();
        Self {
            reader,
            manager,
            client,
            clock,
            sink,
            tick_interval: policy.tick_interval(),
            retry_limit: policy.retry_limit,
            retry_delay: policy.retry_delay(),
            tick: 0,
        }
    }

    pub fn reader(&self) -> &SensorReader<A, C> {
        &self.reader
    }

    pub fn reader_mut(&mut self) -> &mut SensorReader<A, C> {
        &mut self.reader
    }

    pub fn manager(&self) -> &ConnectivityManager<L, C> {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut ConnectivityManager<L, C> {
        &mut self.manager
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Runs ticks forever, each starting one interval after the previous one
    /// started (or right away if a tick overran).
    pub async fn run(&mut self) -> ! {
        loop {
            let _ = self.run_paced_tick().await;
        }
    }

    /// One tick, then the wait until the next one is due.
    pub async fn run_paced_tick(&mut self) -> TickReport {
        let started = self.clock.now();
        let report = self.run_tick().await;
        let spent = self.clock.now().saturating_duration_since(started);
        if let Some(rest) = remaining_interval(self.tick_interval, spent) {
            self.clock.sleep(rest).await;
        }
        report
    }

    pub async fn run_tick(&mut self) -> TickReport {
        self.tick = self.tick.wrapping_add(1);
        let mut report = TickReport {
            tick: self.tick,
            channels: heapless::Vec::new(),
        };
        for index in 0..self.reader.channel_count() {
            let Some(channel) = self.reader.channel(index) else {
                continue;
            };
            let channel_report = self.process(channel).await;
            let _ = report.channels.push(channel_report);
        }
        self.sink.emit(StatusEvent::TickCompleted {
            tick: report.tick,
            delivered: report.delivered(),
            dropped: report.dropped(),
            skipped: report.skipped(),
        });
        report
    }

    async fn process(&mut self, channel: ChannelId) -> ChannelReport {
        let reading = self.reader.capture(channel);
        let sensor = reading.sensor_name();
        self.sink.emit(StatusEvent::Captured {
            sensor,
            value: reading.value(),
        });
        if let Some(anomaly) = self.reader.anomaly(channel) {
            self.sink.emit(StatusEvent::Anomaly { sensor, anomaly });
        }

        let mut report = ChannelReport {
            channel,
            value: reading.value(),
            attempts: 0,
            disposition: Disposition::Skipped {
                link: LinkState::Disconnected,
            },
        };

        let link = self.manager.ensure_connected(&mut self.sink).await;
        if link != LinkState::Connected {
            self.sink.emit(StatusEvent::Skipped { sensor, link });
            report.disposition = Disposition::Skipped { link };
            return report;
        }

        loop {
            let Some(mut session) = self.manager.session() else {
                self.drop_reading(sensor, FailureReason::LinkLost, None, report.attempts);
                report.disposition = Disposition::Dropped {
                    reason: FailureReason::LinkLost,
                };
                return report;
            };
            report.attempts += 1;
            let outcome = self
                .client
                .deliver(&mut session, &self.clock, &reading)
                .await;

            if let Some(response) = self.client.last_response() {
                self.sink.emit(StatusEvent::Response {
                    status: response.status,
                    body: response.body,
                });
            }

            let reason = match outcome {
                DeliveryOutcome::Success(status) => {
                    self.sink.emit(StatusEvent::Delivered {
                        sensor,
                        status,
                        attempts: report.attempts,
                    });
                    report.disposition = Disposition::Delivered { status };
                    return report;
                }
                DeliveryOutcome::FatalFailure(reason) => {
                    self.drop_reading(sensor, reason, reason.status(), report.attempts);
                    report.disposition = Disposition::Dropped { reason };
                    return report;
                }
                DeliveryOutcome::TransientFailure(reason) => reason,
            };

            if reason.is_network() {
                self.manager.report_transport_fault(&mut self.sink);
            }
            if report.attempts > self.retry_limit {
                self.drop_reading(sensor, reason, reason.status(), report.attempts);
                report.disposition = Disposition::Dropped { reason };
                return report;
            }
            self.sink.emit(StatusEvent::RetryScheduled {
                sensor,
                attempt: report.attempts,
                reason,
                delay: self.retry_delay,
            });
            self.clock.sleep(self.retry_delay).await;
        }
    }

    fn drop_reading(
        &mut self,
        sensor: &str,
        reason: FailureReason,
        status: Option<u16>,
        attempts: u8,
    ) {
        self.sink.emit(StatusEvent::Dropped {
            sensor,
            reason,
            status,
            attempts,
            payload: self.client.last_payload(),
        });
    }
}

/// Time left in the tick interval; `None` once the tick used all of it.
fn remaining_interval(interval: Duration, spent: Duration) -> Option<Duration> {
    interval
        .checked_sub(spent)
        .filter(|rest| rest.as_ticks() > 0)
}
