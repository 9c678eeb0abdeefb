use std::pin::Pin;

use tokio::time::{interval_at, sleep_until, Duration, Instant, Interval, Sleep};

use crate::models::order::OrderId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownState {
    Idle,
    CountingDown { offer_id: OrderId, remaining: u64 },
    Resolved { offer_id: OrderId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownEvent {
    Tick { offer_id: OrderId, remaining: u64 },
    Expired { offer_id: OrderId },
}

/// Offer countdown: a 1 s tick that lowers the visible counter, and an
/// independent one-shot expiry timer. Both live only while counting down.
pub struct Countdown {
    window_secs: u64,
    state: CountdownState,
    tick: Option<Interval>,
    expiry: Option<Pin<Box<Sleep>>>,
}

impl Countdown {
    pub fn new(window_secs: u64) -> Self {
        Self {
            window_secs,
            state: CountdownState::Idle,
            tick: None,
            expiry: None,
        }
    }

    pub fn state(&self) -> CountdownState {
        self.state
    }

    /// Seconds left, only while counting down.
    pub fn remaining(&self) -> Option<u64> {
        match self.state {
            CountdownState::CountingDown { remaining, .. } => Some(remaining),
            _ => None,
        }
    }

    /// (Re)starts a fresh window for `offer_id`, dropping any running timers.
    pub fn start(&mut self, offer_id: OrderId) {
        let now = Instant::now();
        let second = Duration::from_secs(1);

        self.tick = Some(interval_at(now + second, second));
        self.expiry = Some(Box::pin(sleep_until(
            now + Duration::from_secs(self.window_secs),
        )));
        self.state = CountdownState::CountingDown {
            offer_id,
            remaining: self.window_secs,
        };
    }

    pub fn resolve(&mut self, offer_id: OrderId) {
        self.drop_timers();
        self.state = CountdownState::Resolved { offer_id };
    }

    pub fn clear(&mut self) {
        self.drop_timers();
        self.state = CountdownState::Idle;
    }

    fn drop_timers(&mut self) {
        self.tick = None;
        self.expiry = None;
    }

    /// Waits for the next timer event. Pending forever when no timers run,
    /// which makes it safe to poll from a `select!` loop at all times.
    pub async fn next(&mut self) -> CountdownEvent {
        let CountdownState::CountingDown { offer_id, remaining } = self.state else {
            return std::future::pending().await;
        };
        let (Some(tick), Some(expiry)) = (self.tick.as_mut(), self.expiry.as_mut()) else {
            return std::future::pending().await;
        };

        tokio::select! {
            biased;
            _ = tick.tick() => {
                let remaining = remaining.saturating_sub(1);
                self.state = CountdownState::CountingDown { offer_id, remaining };
                CountdownEvent::Tick { offer_id, remaining }
            }
            _ = expiry.as_mut() => {
                self.drop_timers();
                self.state = CountdownState::CountingDown { offer_id, remaining: 0 };
                CountdownEvent::Expired { offer_id }
            }
        }
    }
}
