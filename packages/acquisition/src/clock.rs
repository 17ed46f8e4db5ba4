use core::future::Future;

use embassy_futures::select::{select, Either};
use embassy_time::{Duration, Instant};

/// Monotonic time plus a cooperative delay.
///
/// Every suspension point in the core goes through this trait, so timeouts
/// stay deterministic under a mock clock.
#[allow(async_fn_in_trait)]
pub trait Clock {
    fn now(&self) -> Instant;

    async fn sleep(&self, duration: Duration);
}

impl<T: Clock + ?Sized> Clock for &T {
    fn now(&self) -> Instant {
        (**self).now()
    }

    async fn sleep(&self, duration: Duration) {
        (**self).sleep(duration).await
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Elapsed;

/// Races `future` against a sleep of `timeout` on `clock`.
pub(crate) async fn with_deadline<C, F>(
    clock: &C,
    timeout: Duration,
    future: F,
) -> Result<F::Output, Elapsed>
where
    C: Clock,
    F: Future,
{
    match select(future, clock.sleep(timeout)).await {
        Either::First(output) => Ok(output),
        Either::Second(()) => Err(Elapsed),
    }
}
