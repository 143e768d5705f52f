//! Chess clock built from two countdown timers.
//!
//! Remaining time is derived from the instant a timer was last started, so
//! nothing ticks in the background. Owners observe expiry by sleeping until
//! [`Clock::deadline`].

use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::board::Color;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerState {
    Idle,
    Running,
    Paused,
}

/// A countdown over a fixed initial duration.
#[derive(Debug, Clone)]
pub struct Timer {
    initial: Duration,
    remaining: Duration,
    started_at: Option<Instant>,
    state: TimerState,
}

impl Timer {
    #[must_use]
    pub fn new(initial: Duration) -> Self {
        Timer {
            initial,
            remaining: initial,
            started_at: None,
            state: TimerState::Idle,
        }
    }

    /// Start counting down. A running timer is left alone.
    pub fn start(&mut self) {
        if self.state == TimerState::Running {
            return;
        }
        self.started_at = Some(Instant::now());
        self.state = TimerState::Running;
    }

    /// Freeze the remaining time.
    pub fn pause(&mut self) {
        if self.state != TimerState::Running {
            return;
        }
        self.remaining = self.remaining();
        self.started_at = None;
        self.state = TimerState::Paused;
    }

    /// Back to the initial duration, idle.
    pub fn stop(&mut self) {
        self.remaining = self.initial;
        self.started_at = None;
        self.state = TimerState::Idle;
    }

    /// Increase the remaining time by exactly `d`.
    ///
    /// A running timer folds its elapsed time in first and restarts, so the
    /// increment is not eaten by time already spent.
    pub fn add(&mut self, d: Duration) {
        if self.state == TimerState::Running {
            self.remaining = self.remaining() + d;
            self.started_at = Some(Instant::now());
        } else {
            self.remaining += d;
        }
    }

    /// Remaining time, floored at zero.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        match (self.state, self.started_at) {
            (TimerState::Running, Some(started)) => {
                self.remaining.saturating_sub(started.elapsed())
            }
            _ => self.remaining,
        }
    }

    /// The instant this timer runs out, if it is running.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        match (self.state, self.started_at) {
            (TimerState::Running, Some(started)) => Some(started + self.remaining),
            _ => None,
        }
    }

    #[must_use]
    pub fn state(&self) -> TimerState {
        self.state
    }

    #[must_use]
    pub fn initial(&self) -> Duration {
        self.initial
    }
}

/// Two timers, the side whose timer runs, and the per-move increment.
#[derive(Debug, Clone)]
pub struct Clock {
    increment: Duration,
    timers: [Timer; 2],
    first: Color,
    active: Color,
    state: TimerState,
}

impl Clock {
    #[must_use]
    pub fn new(initial: Duration, increment: Duration) -> Self {
        Clock {
            increment,
            timers: [Timer::new(initial), Timer::new(initial)],
            first: Color::White,
            active: Color::White,
            state: TimerState::Idle,
        }
    }

    /// Make `color` the side whose timer runs first, for games set up from
    /// a position with Black to move.
    #[must_use]
    pub fn with_first_mover(mut self, color: Color) -> Self {
        self.first = color;
        self.active = color;
        self
    }

    /// Start the active side's timer.
    pub fn start(&mut self) {
        if self.state == TimerState::Running {
            return;
        }
        self.timers[self.active.index()].start();
        self.state = TimerState::Running;
    }

    pub fn pause(&mut self) {
        if self.state != TimerState::Running {
            return;
        }
        self.timers[self.active.index()].pause();
        self.state = TimerState::Paused;
    }

    /// Both timers back to the initial time, first mover active, idle.
    pub fn reset(&mut self) {
        for timer in &mut self.timers {
            timer.stop();
        }
        self.active = self.first;
        self.state = TimerState::Idle;
    }

    /// Hand the move to the other side.
    ///
    /// The mover's timer is paused and credited with the increment before the
    /// opponent's timer starts. An idle clock is simply started.
    pub fn toggle(&mut self) {
        match self.state {
            TimerState::Idle => self.start(),
            TimerState::Running => {
                let mover = &mut self.timers[self.active.index()];
                mover.pause();
                if !self.increment.is_zero() {
                    mover.add(self.increment);
                }
                self.active = self.active.opponent();
                self.timers[self.active.index()].start();
            }
            TimerState::Paused => {}
        }
    }

    pub fn add(&mut self, color: Color, d: Duration) {
        self.timers[color.index()].add(d);
    }

    #[must_use]
    pub fn remaining(&self, color: Color) -> Duration {
        self.timers[color.index()].remaining()
    }

    #[must_use]
    pub fn deadline(&self, color: Color) -> Option<Instant> {
        self.timers[color.index()].deadline()
    }

    #[must_use]
    pub fn active(&self) -> Color {
        self.active
    }

    #[must_use]
    pub fn state(&self) -> TimerState {
        self.state
    }

    #[must_use]
    pub fn increment(&self) -> Duration {
        self.increment
    }

    #[must_use]
    pub fn timer(&self, color: Color) -> &Timer {
        &self.timers[color.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    const MINUTE: Duration = Duration::from_secs(60);

    #[tokio::test(start_paused = true)]
    async fn test_timer_pause_subtracts_elapsed() {
        let mut timer = Timer::new(MINUTE);
        timer.start();
        advance(Duration::from_secs(7)).await;
        timer.pause();
        assert_eq!(timer.state(), TimerState::Paused);
        assert_eq!(timer.remaining(), Duration::from_secs(53));

        // Paused time does not count
        advance(Duration::from_secs(30)).await;
        assert_eq!(timer.remaining(), Duration::from_secs(53));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_add_is_exact() {
        let mut timer = Timer::new(MINUTE);
        timer.add(Duration::from_secs(2));
        assert_eq!(timer.remaining(), Duration::from_secs(62));

        timer.start();
        advance(Duration::from_secs(10)).await;
        timer.add(Duration::from_secs(3));
        assert_eq!(timer.remaining(), Duration::from_secs(55));
        assert_eq!(timer.state(), TimerState::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_floors_at_zero() {
        let mut timer = Timer::new(Duration::from_secs(1));
        timer.start();
        advance(Duration::from_secs(5)).await;
        assert_eq!(timer.remaining(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_start_twice_keeps_origin() {
        let mut timer = Timer::new(MINUTE);
        timer.start();
        advance(Duration::from_secs(4)).await;
        timer.start();
        assert_eq!(timer.remaining(), Duration::from_secs(56));
        let deadline = timer.deadline().unwrap();
        assert_eq!(deadline - Instant::now(), Duration::from_secs(56));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_stop_resets() {
        let mut timer = Timer::new(MINUTE);
        timer.start();
        advance(Duration::from_secs(4)).await;
        timer.stop();
        assert_eq!(timer.state(), TimerState::Idle);
        assert_eq!(timer.remaining(), MINUTE);
        assert!(timer.deadline().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_clock_toggle_applies_increment() {
        let mut clock = Clock::new(MINUTE, Duration::from_secs(2));
        clock.toggle();
        assert_eq!(clock.state(), TimerState::Running);
        assert_eq!(clock.active(), Color::White);

        advance(Duration::from_secs(5)).await;
        clock.toggle();
        assert_eq!(clock.active(), Color::Black);
        assert_eq!(clock.remaining(Color::White), Duration::from_secs(57));
        assert!(clock.deadline(Color::White).is_none());
        assert!(clock.deadline(Color::Black).is_some());

        advance(Duration::from_secs(3)).await;
        assert_eq!(clock.remaining(Color::Black), Duration::from_secs(57));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clock_pause_and_reset() {
        let mut clock = Clock::new(MINUTE, Duration::ZERO);
        clock.start();
        advance(Duration::from_secs(10)).await;
        clock.pause();
        assert_eq!(clock.state(), TimerState::Paused);
        assert_eq!(clock.remaining(Color::White), Duration::from_secs(50));

        // Paused clocks ignore toggles
        clock.toggle();
        assert_eq!(clock.active(), Color::White);

        clock.reset();
        assert_eq!(clock.state(), TimerState::Idle);
        assert_eq!(clock.remaining(Color::White), MINUTE);
        assert_eq!(clock.active(), Color::White);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clock_first_mover_survives_reset() {
        let mut clock = Clock::new(MINUTE, Duration::ZERO).with_first_mover(Color::Black);
        assert_eq!(clock.active(), Color::Black);

        clock.toggle();
        advance(Duration::from_secs(4)).await;
        assert_eq!(clock.remaining(Color::Black), Duration::from_secs(56));
        assert_eq!(clock.remaining(Color::White), MINUTE);

        clock.toggle();
        assert_eq!(clock.active(), Color::White);
        clock.reset();
        assert_eq!(clock.active(), Color::Black);
    }
}
