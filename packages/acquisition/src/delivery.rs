use core::ops::Range;

use embassy_time::Duration;
use embedded_io_async::{Read as _, Write as _};

use crate::clock::{self, Clock};
use crate::http::{self, ResponseProgress, StatusClass};
use crate::link::{Connector, Session};
use crate::payload::{self, Payload};
use crate::reading::Reading;

pub const HOST_MAX: usize = 64;
pub const PATH_MAX: usize = 96;
pub const REQUEST_MAX: usize = 512;
pub const RESPONSE_MAX: usize = 512;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureReason {
    Connect,
    Write,
    Read,
    Timeout,
    MalformedResponse,
    ResponseTooLarge,
    PayloadTooLarge,
    Status(u16),
    LinkLost,
}

impl FailureReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Write => "write",
            Self::Read => "read",
            Self::Timeout => "timeout",
            Self::MalformedResponse => "malformed_response",
            Self::ResponseTooLarge => "response_too_large",
            Self::PayloadTooLarge => "payload_too_large",
            Self::Status(_) => "status",
            Self::LinkLost => "link_lost",
        }
    }

    pub const fn status(self) -> Option<u16> {
        match self {
            Self::Status(code) => Some(code),
            _ => None,
        }
    }

    /// Failures below HTTP that may mean the link itself went away.
    pub const fn is_network(self) -> bool {
        matches!(self, Self::Connect | Self::Write | Self::Read | Self::Timeout)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Success(u16),
    TransientFailure(FailureReason),
    FatalFailure(FailureReason),
}

impl DeliveryOutcome {
    pub const fn status(self) -> Option<u16> {
        match self {
            Self::Success(code) => Some(code),
            Self::TransientFailure(reason) | Self::FatalFailure(reason) => reason.status(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    host: heapless::String<HOST_MAX>,
    port: u16,
    path: heapless::String<PATH_MAX>,
}

impl Endpoint {
    pub fn new(host: &str, port: u16, path: &str) -> Result<Self, &'static str> {
        if host.is_empty() {
            return Err("endpoint host is empty");
        }
        if port == 0 {
            return Err("endpoint port is zero");
        }
        if !path.starts_with('/') {
            return Err("endpoint path must start with '/'");
        }
        let mut stored_host = heapless::String::new();
        stored_host
            .push_str(host)
            .map_err(|_| "endpoint host too long")?;
        let mut stored_path = heapless::String::new();
        stored_path
            .push_str(path)
            .map_err(|_| "endpoint path too long")?;
        Ok(Self {
            host: stored_host,
            port,
            path: stored_path,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResponseView<'a> {
    pub status: u16,
    pub body: &'a str,
}

/// Posts one reading per call over a borrowed session.
///
/// The last payload and response stay buffered until the next call so the
/// caller can log them.
pub struct DeliveryClient {
    endpoint: Endpoint,
    request_timeout: Duration,
    payload: Payload,
    request: heapless::String<REQUEST_MAX>,
    response: [u8; RESPONSE_MAX],
    last_status: Option<u16>,
    body: Range<usize>,
}

impl DeliveryClient {
    pub fn new(endpoint: Endpoint, request_timeout: Duration) -> Self {
        Self {
            endpoint,
            request_timeout,
            payload: Payload::new(),
            request: heapless::String::new(),
            response: [0; RESPONSE_MAX],
            last_status: None,
            body: 0..0,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn last_payload(&self) -> &str {
        &self.payload
    }

    pub fn last_response(&self) -> Option<ResponseView<'_>> {
        let status = self.last_status?;
        let body = core::str::from_utf8(&self.response[self.body.clone()]).unwrap_or("<binary>");
        Some(ResponseView { status, body })
    }

    pub async fn deliver<L, C>(
        &mut self,
        session: &mut Session<'_, L>,
        clock: &C,
        reading: &Reading,
    ) -> DeliveryOutcome
    where
        L: Connector,
        C: Clock,
    {
        self.last_status = None;
        self.body = 0..0;

        self.payload = match payload::encode(reading) {
            Ok(payload) => payload,
            Err(_) => {
                self.payload.clear();
                return DeliveryOutcome::FatalFailure(FailureReason::PayloadTooLarge);
            }
        };
        if http::write_post_request(
            &mut self.request,
            self.endpoint.host(),
            self.endpoint.port(),
            self.endpoint.path(),
            &self.payload,
        )
        .is_err()
        {
            return DeliveryOutcome::FatalFailure(FailureReason::PayloadTooLarge);
        }

        let round_trip = exchange(session.connector(), self.request.as_bytes(), &mut self.response);
        let received = match clock::with_deadline(clock, self.request_timeout, round_trip).await {
            Ok(Ok(received)) => received,
            Ok(Err(reason)) => return DeliveryOutcome::TransientFailure(reason),
            Err(_) => return DeliveryOutcome::TransientFailure(FailureReason::Timeout),
        };
        self.classify(received)
    }

    fn classify(&mut self, received: usize) -> DeliveryOutcome {
        let malformed = DeliveryOutcome::TransientFailure(FailureReason::MalformedResponse);
        let buf = &self.response[..received];
        let Some(header_end) = http::find_header_end(buf) else {
            return malformed;
        };
        let Ok(header) = core::str::from_utf8(&buf[..header_end]) else {
            return malformed;
        };
        let Some(status) = http::parse_status_line(header) else {
            return malformed;
        };

        let body_start = header_end + 4;
        let body_len = match http::parse_content_length(header) {
            Ok(Some(len)) => len,
            _ => received.saturating_sub(body_start),
        };
        self.last_status = Some(status);
        self.body = body_start..body_start.saturating_add(body_len).min(received);

        match http::classify_status(status) {
            Some(StatusClass::Success) => DeliveryOutcome::Success(status),
            Some(StatusClass::Transient) => {
                DeliveryOutcome::TransientFailure(FailureReason::Status(status))
            }
            Some(StatusClass::Fatal) => DeliveryOutcome::FatalFailure(FailureReason::Status(status)),
            None => malformed,
        }
    }
}

async fn exchange<L: Connector>(
    connector: &mut L,
    request: &[u8],
    response: &mut [u8],
) -> Result<usize, FailureReason> {
    let mut connection = connector
        .connect()
        .await
        .map_err(|_| FailureReason::Connect)?;
    connection
        .write_all(request)
        .await
        .map_err(|_| FailureReason::Write)?;
    connection.flush().await.map_err(|_| FailureReason::Write)?;

    let mut filled = 0;
    loop {
        match http::response_progress(&response[..filled]) {
            ResponseProgress::Complete { .. } => return Ok(filled),
            ResponseProgress::Malformed => return Err(FailureReason::MalformedResponse),
            ResponseProgress::NeedMore => {}
        }
        if filled == response.len() {
            // Headers fit, body got truncated; the status is still usable.
            return match http::find_header_end(response) {
                Some(_) => Ok(filled),
                None => Err(FailureReason::ResponseTooLarge),
            };
        }
        let n = connection
            .read(&mut response[filled..])
            .await
            .map_err(|_| FailureReason::Read)?;
        if n == 0 {
            return if filled == 0 {
                Err(FailureReason::Read)
            } else {
                Ok(filled)
            };
        }
        filled += n;
    }
}

#[cfg(test)]
mod tests {
    use embassy_futures::block_on;
    use embassy_time::Instant;

    use super::*;
    use crate::link::ConnectivityManager;
    use crate::policy::AcquisitionPolicy;
    use crate::reading::sensor_name;
    use crate::testing::{AttachStep, MockClock, MockLink, MockResponse, RecordingSink};

    fn client() -> DeliveryClient {
        DeliveryClient::new(
            Endpoint::new("192.168.1.10", 3000, "/api/data").unwrap(),
            Duration::from_secs(10),
        )
    }

    fn reading(value: u16) -> Reading {
        Reading::new(sensor_name("moisture").unwrap(), value, Instant::from_millis(0))
    }

    fn deliver_once(clock: &MockClock, response: MockResponse) -> (DeliveryOutcome, DeliveryClient, MockLink) {
        let mut link = MockLink::attaching_with([AttachStep::Succeed]);
        link.responses.push_back(response);
        let mut mgr = ConnectivityManager::new(link, clock, &AcquisitionPolicy::defaults());
        let mut sink = RecordingSink::default();
        let _ = block_on(mgr.ensure_connected(&mut sink));
        let mut client = client();
        let outcome = {
            let mut session = mgr.session().unwrap();
            block_on(client.deliver(&mut session, &clock, &reading(512)))
        };
        let link = core::mem::replace(mgr.link_mut(), MockLink::attaching_with([]));
        (outcome, client, link)
    }

    #[test]
    fn ok_response_is_success_and_request_is_framed() {
        let clock = MockClock::new();
        let (outcome, client, link) = deliver_once(
            &clock,
            MockResponse::reply("HTTP/1.1 200 OK\r\nContent-Length: 21\r\n\r\n{\"message\":\"thanks!\"}"),
        );
        assert_eq!(outcome, DeliveryOutcome::Success(200));
        assert_eq!(link.connections, 1);
        let request = link.request_text(0);
        assert!(request.starts_with("POST /api/data HTTP/1.1\r\n"));
        assert!(request.contains("Content-Type: application/json\r\n"));
        assert!(request.ends_with("\r\n\r\n{\"sensor\":\"moisture\",\"value\":512}"));
        assert_eq!(
            client.last_response(),
            Some(ResponseView {
                status: 200,
                body: "{\"message\":\"thanks!\"}"
            })
        );
        assert_eq!(client.last_payload(), r#"{"sensor":"moisture","value":512}"#);
    }

    #[test]
    fn status_codes_map_to_outcomes() {
        let cases = [
            ("HTTP/1.1 204 No Content\r\n\r\n", DeliveryOutcome::Success(204)),
            (
                "HTTP/1.1 302 Found\r\nContent-Length: 0\r\n\r\n",
                DeliveryOutcome::FatalFailure(FailureReason::Status(302)),
            ),
            (
                "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n",
                DeliveryOutcome::FatalFailure(FailureReason::Status(404)),
            ),
            (
                "HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\n\r\n",
                DeliveryOutcome::TransientFailure(FailureReason::Status(503)),
            ),
            (
                "HTTP/1.1 100 Continue\r\n\r\n",
                DeliveryOutcome::TransientFailure(FailureReason::MalformedResponse),
            ),
            (
                "garbage without headers",
                DeliveryOutcome::TransientFailure(FailureReason::MalformedResponse),
            ),
        ];
        for (raw, expected) in cases {
            let clock = MockClock::new();
            let (outcome, _, _) = deliver_once(&clock, MockResponse::reply(raw));
            assert_eq!(outcome, expected, "{raw:?}");
        }
    }

    #[test]
    fn network_failures_are_transient() {
        let clock = MockClock::new();
        let (outcome, _, _) = deliver_once(&clock, MockResponse::Refuse);
        assert_eq!(outcome, DeliveryOutcome::TransientFailure(FailureReason::Connect));

        let clock = MockClock::new();
        let (outcome, _, _) = deliver_once(&clock, MockResponse::reply(""));
        assert_eq!(outcome, DeliveryOutcome::TransientFailure(FailureReason::Read));
    }

    #[test]
    fn silent_server_times_out_after_request_timeout() {
        let clock = MockClock::new();
        let start = clock.now();
        let (outcome, client, _) = deliver_once(&clock, MockResponse::Hang);
        assert_eq!(outcome, DeliveryOutcome::TransientFailure(FailureReason::Timeout));
        assert_eq!(
            clock.now().saturating_duration_since(start),
            Duration::from_secs(10)
        );
        assert_eq!(client.last_response(), None);
    }

    #[test]
    fn oversized_body_is_truncated_but_status_kept() {
        let clock = MockClock::new();
        let mut raw = String::from("HTTP/1.1 200 OK\r\nContent-Length: 2000\r\n\r\n");
        raw.push_str(&"x".repeat(2000));
        let (outcome, client, _) = deliver_once(&clock, MockResponse::Reply(raw.into_bytes()));
        assert_eq!(outcome, DeliveryOutcome::Success(200));
        let response = client.last_response().unwrap();
        assert!(response.body.len() < 2000);
    }

    #[test]
    fn absurd_content_length_is_transient_not_a_panic() {
        let clock = MockClock::new();
        let raw = format!("HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\nok", usize::MAX);
        let (outcome, client, _) = deliver_once(&clock, MockResponse::reply(&raw));
        assert_eq!(
            outcome,
            DeliveryOutcome::TransientFailure(FailureReason::MalformedResponse)
        );
        assert_eq!(client.last_response(), None);
    }

    #[test]
    fn endpoint_validation() {
        assert!(Endpoint::new("", 3000, "/api/data").is_err());
        assert!(Endpoint::new("hub", 0, "/api/data").is_err());
        assert!(Endpoint::new("hub", 3000, "api/data").is_err());
        let endpoint = Endpoint::new("hub", 3000, "/api/data").unwrap();
        assert_eq!((endpoint.host(), endpoint.port(), endpoint.path()), ("hub", 3000, "/api/data"));
    }
}
