//! Network attachment: the platform seam, the link state machine and the
//! manager that drives it.

mod machine;
mod manager;

pub use machine::{LinkApplyResult, LinkApplyStatus, LinkEngine, LinkEvent};
pub use manager::{ConnectivityManager, Session};

use embedded_io_async::{Read, Write};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

impl LinkState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Failed => "failed",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LinkTransition {
    pub from: LinkState,
    pub to: LinkState,
    pub trigger: &'static str,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttachError {
    NotConfigured,
    NoAccessPoint,
    Rejected,
    AddressTimeout,
    Driver,
    Timeout,
}

impl AttachError {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotConfigured => "not_configured",
            Self::NoAccessPoint => "no_access_point",
            Self::Rejected => "rejected",
            Self::AddressTimeout => "address_timeout",
            Self::Driver => "driver",
            Self::Timeout => "timeout",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportError {
    Resolve,
    Connect,
}

impl TransportError {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Resolve => "resolve",
            Self::Connect => "connect",
        }
    }
}

/// One network attachment (a WiFi station on device).
#[allow(async_fn_in_trait)]
pub trait Link {
    /// Makes a single attach attempt, returning once the link carries traffic.
    async fn attach(&mut self) -> Result<(), AttachError>;

    /// Cheap heartbeat: is the attachment still usable?
    fn link_up(&self) -> bool;

    async fn detach(&mut self);
}

/// Opens one stream connection to the configured endpoint.
#[allow(async_fn_in_trait)]
pub trait Connector {
    type Connection<'a>: Read + Write
    where
        Self: 'a;

    async fn connect(&mut self) -> Result<Self::Connection<'_>, TransportError>;
}
