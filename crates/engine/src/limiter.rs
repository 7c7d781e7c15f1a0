//! Sliding-window rate limiter, one instance per platform
//!
//! `acquire` only ever delays, it never rejects. Waiters queue on the
//! internal mutex, which tokio services in FIFO order, so already-queued
//! work is not starved by newcomers.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::config::RateBudget;

pub struct RateLimiter {
    calls: usize,
    period: Duration,
    state: Mutex<LimiterState>,
}

struct LimiterState {
    /// Start instants of calls admitted within the current window.
    starts: VecDeque<Instant>,
    /// Remote "slow down" penalty: no slot is handed out before this.
    cooldown_until: Option<Instant>,
}

impl RateLimiter {
    pub fn new(budget: RateBudget) -> Self {
        Self {
            calls: budget.calls.max(1) as usize,
            period: budget.period,
            state: Mutex::new(LimiterState {
                starts: VecDeque::new(),
                cooldown_until: None,
            }),
        }
    }

    /// Block until a call slot is available within the window, then claim it.
    pub async fn acquire(&self) {
        loop {
            let wait_until = {
                let mut state = self.state.lock().await;
                let now = Instant::now();

                while let Some(&front) = state.starts.front() {
                    if now.duration_since(front) >= self.period {
                        state.starts.pop_front();
                    } else {
                        break;
                    }
                }

                if let Some(cooldown) = state.cooldown_until {
                    if cooldown > now {
                        cooldown
                    } else {
                        state.cooldown_until = None;
                        match self.claim(&mut state, now) {
                            Some(at) => at,
                            None => return,
                        }
                    }
                } else {
                    match self.claim(&mut state, now) {
                        Some(at) => at,
                        None => return,
                    }
                }
            };

            tokio::time::sleep_until(wait_until).await;
        }
    }

    /// Claim a slot if the window has room, otherwise report when the oldest
    /// admitted call falls out of the window.
    fn claim(&self, state: &mut LimiterState, now: Instant) -> Option<Instant> {
        if state.starts.len() < self.calls {
            state.starts.push_back(now);
            None
        } else {
            state.starts.front().map(|&front| front + self.period)
        }
    }

    /// Widen the effective rate after a remote throttling signal: the next
    /// slot is not handed out before `cooldown` has elapsed. An earlier,
    /// longer cooldown is kept.
    pub async fn penalize(&self, cooldown: Duration) {
        let until = Instant::now() + cooldown;
        let mut state = self.state.lock().await;
        match state.cooldown_until {
            Some(existing) if existing >= until => {}
            _ => state.cooldown_until = Some(until),
        }
    }
}
