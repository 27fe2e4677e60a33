// ── Dial input coalescer ──
//
// Turns a burst of dial ticks into one command. Every tick restarts the
// control's timer (trailing-edge debounce); when a control has been quiet
// for the full delay its accumulated delta is flushed exactly once.
//
// Ticks accumulate unclamped. Clamping applies to the live feedback value
// and to the flushed value only.

use std::collections::HashMap;
use std::future::{pending, poll_fn};

use tokio_util::time::DelayQueue;
use tokio_util::time::delay_queue::Key;
use tracing::trace;

use crate::config::{DialRange, DialTuning};
use crate::controller::ControlId;

/// Outcome of a debounce flush.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRotation {
    pub control: ControlId,
    /// Sum of all ticks since the previous flush.
    pub total_ticks: i64,
    /// Item state the delta applies to, as of the last tick.
    pub base: i64,
    /// `clamp(base + total_ticks)`, saturating.
    pub value: i64,
}

#[derive(Debug)]
struct Accumulator {
    ticks: i64,
    base: i64,
    timer: Key,
}

pub struct DialCoalescer {
    tuning: DialTuning,
    timers: DelayQueue<ControlId>,
    pending: HashMap<ControlId, Accumulator>,
}

impl DialCoalescer {
    pub fn new(tuning: DialTuning) -> Self {
        Self {
            tuning,
            timers: DelayQueue::new(),
            pending: HashMap::new(),
        }
    }

    pub fn range(&self) -> DialRange {
        self.tuning.range
    }

    /// Record `ticks` for `control` and restart its timer.
    ///
    /// Returns the clamped in-progress value for immediate feedback.
    pub fn rotate(&mut self, control: &ControlId, ticks: i64, base: i64) -> i64 {
        let delay = self.tuning.debounce;
        let accumulated = match self.pending.get_mut(control) {
            Some(acc) => {
                acc.ticks = acc.ticks.saturating_add(ticks);
                acc.base = base;
                self.timers.reset(&acc.timer, delay);
                acc.ticks
            }
            None => {
                let timer = self.timers.insert(control.clone(), delay);
                self.pending.insert(
                    control.clone(),
                    Accumulator {
                        ticks,
                        base,
                        timer,
                    },
                );
                ticks
            }
        };

        trace!(%control, ticks, accumulated, "dial rotated");
        self.tuning.range.clamp(base.saturating_add(accumulated))
    }

    /// Wait for the next control to go quiet. Never resolves while
    /// nothing is pending, so it can sit in a `select!` loop.
    pub async fn next_flush(&mut self) -> ResolvedRotation {
        loop {
            let Some(expired) = poll_fn(|cx| self.timers.poll_expired(cx)).await else {
                return pending().await;
            };

            let control = expired.into_inner();
            if let Some(acc) = self.pending.remove(&control) {
                return ResolvedRotation {
                    value: self.tuning.range.clamp(acc.base.saturating_add(acc.ticks)),
                    control,
                    total_ticks: acc.ticks,
                    base: acc.base,
                };
            }
        }
    }

    /// Drop any pending accumulation for `control` without flushing.
    pub fn cancel(&mut self, control: &ControlId) {
        if let Some(acc) = self.pending.remove(control) {
            self.timers.remove(&acc.timer);
        }
    }

    /// Unflushed tick total for `control`, if any.
    pub fn accumulated(&self, control: &ControlId) -> Option<i64> {
        self.pending.get(control).map(|acc| acc.ticks)
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_empty()
    }
}
