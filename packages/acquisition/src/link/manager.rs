use embassy_time::{Duration, Instant};

use super::machine::{LinkEngine, LinkEvent};
use super::{AttachError, Connector, Link, LinkState};
use crate::backoff::Backoff;
use crate::clock::{self, Clock};
use crate::policy::AcquisitionPolicy;
use crate::status::{StatusEvent, StatusSink};

const DETACH_TIMEOUT: Duration = Duration::from_secs(2);

/// Borrow of a connected link, good for one delivery.
///
/// Only [`ConnectivityManager::session`] hands these out, and only while the
/// link is `Connected`.
pub struct Session<'a, L> {
    link: &'a mut L,
}

impl<L: Connector> Session<'_, L> {
    pub(crate) fn connector(&mut self) -> &mut L {
        self.link
    }
}

/// Owns the link and the only copy of its state.
pub struct ConnectivityManager<L, C> {
    link: L,
    clock: C,
    engine: LinkEngine,
    backoff: Backoff,
    retry_at: Option<Instant>,
    attach_timeout: Duration,
    attach_attempts: u8,
    attach_attempt_timeout: Duration,
}

impl<L, C> ConnectivityManager<L, C>
where
    L: Link + Connector,
    C: Clock,
{
    pub fn new(link: L, clock: C, policy: &AcquisitionPolicy) -> Self {
        let policy = policy.sanitized();
        Self {
            link,
            clock,
            engine: LinkEngine::new(),
            backoff: Backoff::new(policy.backoff_base(), policy.backoff_cap()),
            retry_at: None,
            attach_timeout: policy.attach_timeout(),
            attach_attempts: policy.attach_attempts,
            attach_attempt_timeout: policy.attach_attempt_timeout(),
        }
    }

    pub fn state(&self) -> LinkState {
        self.engine.state()
    }

    /// When a `Failed` link becomes eligible for the next attach episode.
    pub fn retry_at(&self) -> Option<Instant> {
        self.retry_at
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    /// Brings the link up if it is not, and reports where it ended.
    ///
    /// Returns at once when already connected (after a heartbeat) or while a
    /// failed link is still inside its backoff window. Otherwise runs one
    /// attach episode: at most the attach timeout, plus up to two seconds to
    /// detach when the episode fails.
    pub async fn ensure_connected<S: StatusSink>(&mut self, sink: &mut S) -> LinkState {
        match self.engine.state() {
            LinkState::Connected => {
                if self.link.link_up() {
                    return LinkState::Connected;
                }
                self.apply(LinkEvent::LinkLost, "heartbeat", sink);
                self.apply(LinkEvent::AttachRequested, "ensure_connected", sink);
            }
            LinkState::Failed => {
                let now = self.clock.now();
                if self.retry_at.is_some_and(|at| now < at) {
                    return LinkState::Failed;
                }
                self.apply(LinkEvent::BackoffElapsed, "backoff_elapsed", sink);
            }
            LinkState::Disconnected => {
                self.apply(LinkEvent::AttachRequested, "ensure_connected", sink);
            }
            LinkState::Connecting => {}
        }
        self.attach_episode(sink).await
    }

    /// Lends the link for one delivery while connected.
    pub fn session(&mut self) -> Option<Session<'_, L>> {
        if self.engine.state() != LinkState::Connected {
            return None;
        }
        Some(Session {
            link: &mut self.link,
        })
    }

    /// Heartbeat after a network-level delivery failure.
    pub fn report_transport_fault<S: StatusSink>(&mut self, sink: &mut S) -> LinkState {
        if self.engine.state() == LinkState::Connected && !self.link.link_up() {
            self.apply(LinkEvent::LinkLost, "transport_fault", sink);
        }
        self.engine.state()
    }

    async fn attach_episode<S: StatusSink>(&mut self, sink: &mut S) -> LinkState {
        let started = self.clock.now();
        let deadline = started + self.attach_timeout;
        let mut unused_delay = None;

        for attempt in 1..=self.attach_attempts {
            let now = self.clock.now();
            if now >= deadline {
                break;
            }
            let limit = self
                .attach_attempt_timeout
                .min(deadline.saturating_duration_since(now));
            let result =
                match clock::with_deadline(&self.clock, limit, self.link.attach()).await {
                    Ok(result) => result,
                    Err(_) => Err(AttachError::Timeout),
                };

            let error = match result {
                Ok(()) => {
                    self.backoff.reset();
                    self.retry_at = None;
                    self.apply(LinkEvent::LinkAcquired, "attach", sink);
                    return LinkState::Connected;
                }
                Err(error) => error,
            };

            sink.emit(StatusEvent::AttachFailed { attempt, error });
            self.apply(LinkEvent::AttemptFailed, error.as_str(), sink);
            if attempt == self.attach_attempts {
                break;
            }

            let delay = self.backoff.next_delay();
            if self.clock.now() + delay >= deadline {
                unused_delay = Some(delay);
                break;
            }
            sink.emit(StatusEvent::AttachRetryScheduled { delay });
            self.clock.sleep(delay).await;
        }

        let _ = clock::with_deadline(&self.clock, DETACH_TIMEOUT, self.link.detach()).await;
        let delay = unused_delay.unwrap_or_else(|| self.backoff.next_delay());
        self.retry_at = Some(self.clock.now() + delay);
        self.apply(LinkEvent::AttachExhausted, "attach_exhausted", sink);
        sink.emit(StatusEvent::AttachRetryScheduled { delay });
        LinkState::Failed
    }

    fn apply<S: StatusSink>(&mut self, event: LinkEvent, trigger: &'static str, sink: &mut S) {
        let result = self.engine.apply(event);
        if let Some(transition) = result.transition(trigger) {
            sink.emit(StatusEvent::Link {
                transition,
                at: self.clock.now(),
            });
        }
    }
}
