//! Match clock: countdown, active play and the end-of-match broadcast
//!
//! The clock never sleeps and never counts seconds down by hand. Each phase
//! stores a monotonic deadline and every poll recomputes the remaining whole
//! seconds from it, so a late poll never makes the clock drift. The caller
//! owns the recurring check and passes the current instant to [`MatchClock::poll`].

use photon_shared::{MATCH_END_CODE, MATCH_START_CODE};
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;

/// Number of times the end code is broadcast when the match runs out.
pub const END_SIGNAL_REPEATS: u8 = 3;

/// Longest countdown an operator may ask for.
pub const MAX_COUNTDOWN_SECS: u64 = 60 * 60;

/// Longest configurable match.
pub const MAX_MATCH_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Idle,
    Countdown,
    Running,
    Ended,
}

/// What happened during one poll of the clock.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ClockTick {
    /// Codes to broadcast, in order.
    pub codes: Vec<i32>,
    /// Phase entered during this poll, if any.
    pub entered: Option<Phase>,
    /// True if anything visible (phase or remaining seconds) changed.
    pub changed: bool,
}

#[derive(Debug, Clone)]
pub struct MatchClock {
    phase: Phase,
    match_secs: u64,
    end_signal_gap: Duration,
    deadline: Option<Instant>,
    remaining_secs: u64,
    end_signals_left: u8,
    next_end_signal: Option<Instant>,
}

impl MatchClock {
    pub fn new(match_secs: u64, end_signal_gap: Duration) -> Self {
        Self {
            phase: Phase::Idle,
            match_secs,
            end_signal_gap,
            deadline: None,
            remaining_secs: 0,
            end_signals_left: 0,
            next_end_signal: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Whole seconds left in the current phase, rounded up.
    pub fn remaining_secs(&self) -> u64 {
        self.remaining_secs
    }

    /// True while polling can still change the clock or emit codes.
    pub fn is_ticking(&self) -> bool {
        match self.phase {
            Phase::Countdown | Phase::Running => true,
            Phase::Ended => self.end_signals_left > 0,
            Phase::Idle => false,
        }
    }

    /// When the next repeated end signal is due, if one is pending.
    pub fn next_end_signal(&self) -> Option<Instant> {
        match self.phase {
            Phase::Ended if self.end_signals_left > 0 => self.next_end_signal,
            _ => None,
        }
    }

    /// Starts the countdown. Only honoured from Idle, and only when both the
    /// countdown and the match that follows it end at a representable instant.
    /// Returns whether it started.
    pub fn begin(&mut self, countdown_secs: u64, now: Instant) -> bool {
        if self.phase != Phase::Idle {
            return false;
        }

        let Some(deadline) = now.checked_add(Duration::from_secs(countdown_secs)) else {
            return false;
        };
        if deadline.checked_add(self.match_len()).is_none() {
            return false;
        }

        self.phase = Phase::Countdown;
        self.deadline = Some(deadline);
        self.remaining_secs = countdown_secs;
        true
    }

    /// Returns to Idle from any phase, discarding deadlines and pending end signals.
    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
        self.deadline = None;
        self.remaining_secs = 0;
        self.end_signals_left = 0;
        self.next_end_signal = None;
    }

    /// Advances the clock to `now`.
    pub fn poll(&mut self, now: Instant) -> ClockTick {
        let mut tick = ClockTick::default();

        match self.phase {
            Phase::Idle => {}

            Phase::Countdown => {
                let deadline = self.deadline.unwrap_or(now);
                self.refresh_remaining(deadline, now, &mut tick);

                if now >= deadline {
                    let match_len = self.match_len();
                    self.phase = Phase::Running;
                    // begin() checked that deadline + match_len fits
                    self.deadline = now
                        .checked_add(match_len)
                        .or_else(|| deadline.checked_add(match_len));
                    self.remaining_secs = self.match_secs;
                    tick.codes.push(MATCH_START_CODE);
                    tick.entered = Some(Phase::Running);
                    tick.changed = true;
                }
            }

            Phase::Running => {
                let deadline = self.deadline.unwrap_or(now);
                self.refresh_remaining(deadline, now, &mut tick);

                if now >= deadline {
                    self.phase = Phase::Ended;
                    self.deadline = None;
                    self.remaining_secs = 0;
                    tick.codes.push(MATCH_END_CODE);
                    self.end_signals_left = END_SIGNAL_REPEATS - 1;
                    self.next_end_signal = now.checked_add(self.end_signal_gap);
                    tick.entered = Some(Phase::Ended);
                    tick.changed = true;
                }
            }

            Phase::Ended => {
                if let Some(due) = self.next_end_signal {
                    if self.end_signals_left > 0 && now >= due {
                        tick.codes.push(MATCH_END_CODE);
                        self.end_signals_left -= 1;
                        self.next_end_signal = if self.end_signals_left > 0 {
                            now.checked_add(self.end_signal_gap)
                        } else {
                            None
                        };
                    }
                }
            }
        }

        tick
    }

    fn match_len(&self) -> Duration {
        Duration::from_secs(self.match_secs)
    }

    fn refresh_remaining(&mut self, deadline: Instant, now: Instant, tick: &mut ClockTick) {
        let remaining = secs_until(deadline, now);
        if remaining != self.remaining_secs {
            self.remaining_secs = remaining;
            tick.changed = true;
        }
    }
}

fn secs_until(deadline: Instant, now: Instant) -> u64 {
    let left = deadline.saturating_duration_since(now);
    left.as_secs() + u64::from(left.subsec_nanos() > 0)
}

/// Formats seconds as `M:SS` for the timer readout.
pub fn format_clock(secs: u64) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GAP: Duration = Duration::from_millis(200);

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    /// Polls every 200ms from `start` until `until`, collecting all ticks.
    fn run(clock: &mut MatchClock, start: Instant, until: Duration) -> Vec<(Duration, ClockTick)> {
        let mut ticks = Vec::new();
        let mut offset = Duration::ZERO;
        while offset <= until {
            let tick = clock.poll(start + offset);
            ticks.push((offset, tick));
            offset += ms(200);
        }
        ticks
    }

    #[test]
    fn test_new_clock_is_idle() {
        let clock = MatchClock::new(10, GAP);
        assert_eq!(clock.phase(), Phase::Idle);
        assert_eq!(clock.remaining_secs(), 0);
        assert!(!clock.is_ticking());
    }

    #[test]
    fn test_idle_poll_does_nothing() {
        let mut clock = MatchClock::new(10, GAP);
        assert_eq!(clock.poll(Instant::now()), ClockTick::default());
    }

    #[test]
    fn test_begin_enters_countdown() {
        let mut clock = MatchClock::new(10, GAP);
        assert!(clock.begin(3, Instant::now()));
        assert_eq!(clock.phase(), Phase::Countdown);
        assert_eq!(clock.remaining_secs(), 3);
        assert!(clock.is_ticking());
    }

    #[test]
    fn test_begin_is_guarded_by_phase() {
        let start = Instant::now();
        let mut clock = MatchClock::new(10, GAP);
        assert!(clock.begin(3, start));
        assert!(!clock.begin(5, start + ms(500)));
        assert_eq!(clock.remaining_secs(), 3);

        clock.poll(start + ms(3000));
        assert_eq!(clock.phase(), Phase::Running);
        assert!(!clock.begin(3, start + ms(3200)));
        assert_eq!(clock.phase(), Phase::Running);
    }

    #[test]
    fn test_remaining_recomputed_from_deadline() {
        let start = Instant::now();
        let mut clock = MatchClock::new(10, GAP);
        clock.begin(3, start);

        clock.poll(start + ms(200));
        assert_eq!(clock.remaining_secs(), 3);

        // A late poll jumps straight to the right value
        clock.poll(start + ms(2100));
        assert_eq!(clock.remaining_secs(), 1);
    }

    #[test]
    fn test_full_sequence() {
        let start = Instant::now();
        let mut clock = MatchClock::new(10, GAP);
        clock.begin(3, start);

        let ticks = run(&mut clock, start, Duration::from_secs(15));

        let starts: Vec<Duration> = ticks
            .iter()
            .filter(|(_, t)| t.codes.contains(&MATCH_START_CODE))
            .map(|(at, _)| *at)
            .collect();
        assert_eq!(starts, vec![ms(3000)]);

        let ends: Vec<Duration> = ticks
            .iter()
            .flat_map(|(at, t)| {
                t.codes
                    .iter()
                    .filter(|c| **c == MATCH_END_CODE)
                    .map(move |_| *at)
            })
            .collect();
        assert_eq!(ends.len(), 3);
        assert_eq!(ends[0], ms(13000));
        for pair in ends.windows(2) {
            assert!(pair[1] - pair[0] >= GAP);
        }

        let entered: Vec<Phase> = ticks.iter().filter_map(|(_, t)| t.entered).collect();
        assert_eq!(entered, vec![Phase::Running, Phase::Ended]);

        assert_eq!(clock.phase(), Phase::Ended);
        assert!(!clock.is_ticking());
    }

    #[test]
    fn test_phase_observed_over_time() {
        let start = Instant::now();
        let mut clock = MatchClock::new(10, GAP);
        clock.begin(3, start);

        clock.poll(start + ms(2800));
        assert_eq!(clock.phase(), Phase::Countdown);
        clock.poll(start + ms(3000));
        assert_eq!(clock.phase(), Phase::Running);
        assert_eq!(clock.remaining_secs(), 10);
        clock.poll(start + ms(12800));
        assert_eq!(clock.phase(), Phase::Running);
        assert_eq!(clock.remaining_secs(), 1);
        clock.poll(start + ms(13000));
        assert_eq!(clock.phase(), Phase::Ended);
    }

    #[test]
    fn test_end_signals_wait_for_gap() {
        let start = Instant::now();
        let mut clock = MatchClock::new(1, GAP);
        clock.begin(0, start);

        assert_eq!(clock.poll(start).codes, vec![MATCH_START_CODE]);
        assert_eq!(clock.poll(start + ms(1000)).codes, vec![MATCH_END_CODE]);
        // Too early for the second signal
        assert!(clock.poll(start + ms(1100)).codes.is_empty());
        assert_eq!(clock.poll(start + ms(1200)).codes, vec![MATCH_END_CODE]);
        assert_eq!(clock.poll(start + ms(1400)).codes, vec![MATCH_END_CODE]);
        assert!(clock.poll(start + ms(5000)).codes.is_empty());
    }

    #[test]
    fn test_begin_rejects_unrepresentable_deadline() {
        let start = Instant::now();
        let mut clock = MatchClock::new(10, GAP);

        assert!(!clock.begin(u64::MAX, start));
        assert_eq!(clock.phase(), Phase::Idle);
        assert!(!clock.is_ticking());

        // The match length is checked too, not just the countdown
        let mut endless = MatchClock::new(u64::MAX, GAP);
        assert!(!endless.begin(1, start));
        assert_eq!(endless.phase(), Phase::Idle);

        assert!(clock.begin(MAX_COUNTDOWN_SECS, start));
        assert_eq!(clock.remaining_secs(), MAX_COUNTDOWN_SECS);
    }

    #[test]
    fn test_next_end_signal_only_while_ended() {
        let start = Instant::now();
        let mut clock = MatchClock::new(1, GAP);
        assert_eq!(clock.next_end_signal(), None);

        clock.begin(0, start);
        clock.poll(start);
        assert_eq!(clock.next_end_signal(), None);

        let ended = start + ms(1003);
        clock.poll(ended);
        assert_eq!(clock.next_end_signal(), Some(ended + GAP));

        // Polling exactly at the due instant fires the repeat
        assert_eq!(clock.poll(ended + GAP).codes, vec![MATCH_END_CODE]);
        assert_eq!(clock.next_end_signal(), Some(ended + GAP * 2));
        assert_eq!(clock.poll(ended + GAP * 2).codes, vec![MATCH_END_CODE]);
        assert_eq!(clock.next_end_signal(), None);

        clock.reset();
        assert_eq!(clock.next_end_signal(), None);
    }

    #[test]
    fn test_reset_from_every_phase() {
        let start = Instant::now();

        for stop_at in [ms(0), ms(1000), ms(4000), ms(13000)] {
            let mut clock = MatchClock::new(10, GAP);
            clock.begin(3, start);
            clock.poll(start + stop_at);

            clock.reset();
            clock.reset();
            assert_eq!(clock.phase(), Phase::Idle);
            assert!(!clock.is_ticking());

            let leftovers = run(&mut clock, start + stop_at, Duration::from_secs(20));
            assert!(leftovers.iter().all(|(_, t)| t.codes.is_empty()));
        }
    }

    #[test]
    fn test_reset_allows_fresh_begin() {
        let start = Instant::now();
        let mut clock = MatchClock::new(10, GAP);
        clock.begin(3, start);
        clock.poll(start + ms(3000));
        clock.reset();

        assert!(clock.begin(5, start + ms(3200)));
        assert_eq!(clock.phase(), Phase::Countdown);
        assert_eq!(clock.remaining_secs(), 5);
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(360), "6:00");
        assert_eq!(format_clock(65), "1:05");
        assert_eq!(format_clock(0), "0:00");
    }
}
