//! Host-side doubles for the platform seams.

use core::cell::{Cell, RefCell};
use std::collections::VecDeque;

use embassy_time::{Duration, Instant};
use embedded_io_async::{ErrorKind, ErrorType, Read, Write};

use crate::clock::Clock;
use crate::link::{AttachError, Connector, Link, TransportError};
use crate::sensor::{AnalogSource, ChannelId, MAX_CHANNELS};
use crate::status::{StatusEvent, StatusSink};

/// Virtual time: `sleep` returns immediately after moving the clock forward.
#[derive(Default)]
pub(crate) struct MockClock {
    now_ms: Cell<u64>,
    sleeps: RefCell<Vec<Duration>>,
}

impl MockClock {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn advance_ms(&self, ms: u64) {
        self.now_ms.set(self.now_ms.get() + ms);
    }

    pub(crate) fn set_ms(&self, ms: u64) {
        self.now_ms.set(ms);
    }

    pub(crate) fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.borrow().clone()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        Instant::from_millis(self.now_ms.get())
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.borrow_mut().push(duration);
        self.advance_ms(duration.as_millis());
    }
}

#[derive(Default)]
pub(crate) struct MockSource {
    values: [Option<u16>; MAX_CHANNELS],
}

impl MockSource {
    pub(crate) fn set(&mut self, channel: ChannelId, value: Option<u16>) {
        self.values[channel.index()] = value;
    }
}

impl AnalogSource for MockSource {
    fn sample(&mut self, channel: ChannelId) -> Option<u16> {
        self.values.get(channel.index()).copied().flatten()
    }
}

#[derive(Clone, Copy, Debug)]
pub(crate) enum AttachStep {
    Succeed,
    Fail(AttachError),
    Hang,
}

#[derive(Clone, Debug)]
pub(crate) enum MockResponse {
    Reply(Vec<u8>),
    Refuse,
    RefuseAndDropLink,
    Hang,
}

impl MockResponse {
    pub(crate) fn reply(raw: &str) -> Self {
        Self::Reply(raw.as_bytes().to_vec())
    }
}

pub(crate) struct MockLink {
    pub(crate) script: VecDeque<AttachStep>,
    pub(crate) default_step: AttachStep,
    pub(crate) up: bool,
    pub(crate) attach_calls: u32,
    pub(crate) detach_calls: u32,
    pub(crate) responses: VecDeque<MockResponse>,
    pub(crate) connections: u32,
    pub(crate) requests: Vec<Vec<u8>>,
}

impl MockLink {
    pub(crate) fn attaching_with(steps: impl IntoIterator<Item = AttachStep>) -> Self {
        Self {
            script: steps.into_iter().collect(),
            default_step: AttachStep::Fail(AttachError::Rejected),
            up: false,
            attach_calls: 0,
            detach_calls: 0,
            responses: VecDeque::new(),
            connections: 0,
            requests: Vec::new(),
        }
    }

    pub(crate) fn respond_with(mut self, responses: impl IntoIterator<Item = MockResponse>) -> Self {
        self.responses.extend(responses);
        self
    }

    pub(crate) fn request_text(&self, index: usize) -> String {
        String::from_utf8_lossy(&self.requests[index]).into_owned()
    }
}

impl Link for MockLink {
    async fn attach(&mut self) -> Result<(), AttachError> {
        self.attach_calls += 1;
        match self.script.pop_front().unwrap_or(self.default_step) {
            AttachStep::Succeed => {
                self.up = true;
                Ok(())
            }
            AttachStep::Fail(error) => Err(error),
            AttachStep::Hang => core::future::pending().await,
        }
    }

    fn link_up(&self) -> bool {
        self.up
    }

    async fn detach(&mut self) {
        self.detach_calls += 1;
        self.up = false;
    }
}

impl Connector for MockLink {
    type Connection<'a>
        = MockConnection<'a>
    where
        Self: 'a;

    async fn connect(&mut self) -> Result<MockConnection<'_>, TransportError> {
        self.connections += 1;
        let response = self.responses.pop_front().unwrap_or(MockResponse::Refuse);
        match response {
            MockResponse::Refuse => return Err(TransportError::Connect),
            MockResponse::RefuseAndDropLink => {
                self.up = false;
                return Err(TransportError::Connect);
            }
            MockResponse::Reply(_) | MockResponse::Hang => {}
        }
        self.requests.push(Vec::new());
        let index = self.requests.len() - 1;
        Ok(MockConnection {
            written: &mut self.requests[index],
            response,
            read_pos: 0,
        })
    }
}

pub(crate) struct MockConnection<'a> {
    written: &'a mut Vec<u8>,
    response: MockResponse,
    read_pos: usize,
}

impl ErrorType for MockConnection<'_> {
    type Error = ErrorKind;
}

impl Read for MockConnection<'_> {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, ErrorKind> {
        let bytes = match &self.response {
            MockResponse::Reply(bytes) => bytes,
            MockResponse::Hang => return core::future::pending().await,
            MockResponse::Refuse | MockResponse::RefuseAndDropLink => {
                return Err(ErrorKind::ConnectionReset)
            }
        };
        // Dribble the reply out in small chunks like a real socket.
        let rest = &bytes[self.read_pos..];
        let n = rest.len().min(buf.len()).min(48);
        buf[..n].copy_from_slice(&rest[..n]);
        self.read_pos += n;
        Ok(n)
    }
}

impl Write for MockConnection<'_> {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, ErrorKind> {
        self.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    async fn flush(&mut self) -> Result<(), ErrorKind> {
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct RecordingSink {
    pub(crate) lines: Vec<String>,
}

impl RecordingSink {
    pub(crate) fn contains(&self, needle: &str) -> bool {
        self.lines.iter().any(|line| line.contains(needle))
    }

    pub(crate) fn count(&self, prefix: &str) -> usize {
        self.lines
            .iter()
            .filter(|line| line.starts_with(prefix))
            .count()
    }

    pub(crate) fn retry_delays_ms(&self) -> Vec<u64> {
        self.lines
            .iter()
            .filter_map(|line| line.strip_prefix("net: attach retry in_ms="))
            .filter_map(|ms| ms.parse().ok())
            .collect()
    }
}

impl StatusSink for RecordingSink {
    fn emit(&mut self, event: StatusEvent<'_>) {
        self.lines.push(event.to_string());
    }
}
