//! # Fixed-Timestep Tick Driver
//!
//! The server advances the simulation on a fixed period regardless of
//! how long each tick's work takes. Time is accumulated between polls;
//! a slow tick is caught up by running multiple steps, never by
//! stretching dt.

use std::time::{Duration, Instant};

/// Default server tick rate in Hz.
pub const DEFAULT_TICK_RATE: u32 = 30;

/// Fixed-timestep loop controller.
pub struct TickLoop {
    /// Target tick period.
    period: Duration,
    /// Time of the last poll.
    last_poll: Instant,
    /// Unconsumed elapsed time.
    accumulator: Duration,
    /// Total ticks executed.
    tick_count: u64,
    /// Timing statistics.
    stats: TickStats,
}

/// Tick timing statistics.
#[derive(Clone, Copy, Debug, Default)]
pub struct TickStats {
    /// Shortest tick observed, microseconds.
    pub min_tick_us: u64,
    /// Longest tick observed, microseconds.
    pub max_tick_us: u64,
    /// Rolling average tick duration, microseconds.
    pub avg_tick_us: u64,
    /// Ticks that exceeded the period budget.
    pub late_ticks: u64,
    /// Ticks measured.
    pub total_ticks: u64,
}

impl TickLoop {
    /// Creates a loop targeting `tick_rate` ticks per second.
    #[must_use]
    pub fn new(tick_rate: u32) -> Self {
        let period = Duration::from_micros(1_000_000 / u64::from(tick_rate.max(1)));
        Self {
            period,
            last_poll: Instant::now(),
            accumulator: Duration::ZERO,
            tick_count: 0,
            stats: TickStats {
                min_tick_us: u64::MAX,
                avg_tick_us: period.as_micros() as u64,
                ..TickStats::default()
            },
        }
    }

    /// Returns true when at least one full period has accumulated.
    ///
    /// Call in a loop until false to catch up after a stall.
    #[must_use]
    pub fn should_tick(&mut self) -> bool {
        let now = Instant::now();
        self.accumulator += now.duration_since(self.last_poll);
        self.last_poll = now;
        self.accumulator >= self.period
    }

    /// Consumes one period and returns the tick start time.
    #[must_use]
    pub fn begin_tick(&mut self) -> Instant {
        self.accumulator = self.accumulator.saturating_sub(self.period);
        self.tick_count += 1;
        Instant::now()
    }

    /// Records one finished tick's duration.
    pub fn end_tick(&mut self, start: Instant) {
        let duration = start.elapsed();
        let duration_us = duration.as_micros() as u64;

        self.stats.total_ticks += 1;
        self.stats.min_tick_us = self.stats.min_tick_us.min(duration_us);
        self.stats.max_tick_us = self.stats.max_tick_us.max(duration_us);
        self.stats.avg_tick_us = (self.stats.avg_tick_us * 15 + duration_us) / 16;

        if duration > self.period {
            self.stats.late_ticks += 1;
            tracing::debug!(tick = self.tick_count, duration_us, "late tick");
        }
    }

    /// Sleeps until the next tick is due, spin-waiting the final stretch
    /// for precision.
    pub fn wait_for_next_tick(&self) {
        let elapsed = Instant::now().duration_since(self.last_poll);
        if elapsed >= self.period {
            return;
        }
        let remaining = self.period - elapsed;
        if remaining > Duration::from_micros(1000) {
            std::thread::sleep(remaining - Duration::from_micros(500));
        }
        while Instant::now().duration_since(self.last_poll) < self.period {
            std::hint::spin_loop();
        }
    }

    /// Fixed dt handed to the simulation each tick, in seconds.
    #[must_use]
    pub fn dt_seconds(&self) -> f64 {
        self.period.as_secs_f64()
    }

    /// Ticks executed so far.
    #[must_use]
    pub const fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Timing statistics.
    #[must_use]
    pub const fn stats(&self) -> &TickStats {
        &self.stats
    }

    /// Target tick period.
    #[must_use]
    pub const fn period(&self) -> Duration {
        self.period
    }
}

impl Default for TickLoop {
    fn default() -> Self {
        Self::new(DEFAULT_TICK_RATE)
    }
}
