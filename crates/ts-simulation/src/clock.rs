use std::time::Duration;

/// Tracks simulation time: a monotonic tick counter and the live tick rate.
#[derive(Debug, Clone)]
pub struct SimClock {
    tick: u64,
    tick_rate: f64,
}

impl SimClock {
    /// Create a new clock at tick 0 running at `tick_rate` ticks per second.
    pub fn new(tick_rate: f64) -> Self {
        Self { tick: 0, tick_rate }
    }

    /// Advance the clock by one tick. Returns the new tick number.
    pub fn advance(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    /// Return the current tick number.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Return the configured number of ticks per real second.
    pub fn tick_rate(&self) -> f64 {
        self.tick_rate
    }

    /// Change the live tick rate. Non-positive or non-finite rates are ignored.
    pub fn set_tick_rate(&mut self, tick_rate: f64) {
        if tick_rate.is_finite() && tick_rate > 0.0 {
            self.tick_rate = tick_rate;
        }
    }

    /// Real time one tick should occupy when paced live.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate)
    }

    /// Real seconds the elapsed ticks represent at the current rate.
    pub fn elapsed_seconds(&self) -> f64 {
        self.tick as f64 / self.tick_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_initial_state() {
        let clock = SimClock::new(10.0);
        assert_eq!(clock.tick(), 0);
        assert_eq!(clock.elapsed_seconds(), 0.0);
    }

    #[test]
    fn clock_advance_increments() {
        let mut clock = SimClock::new(4.0);
        clock.advance();
        clock.advance();
        assert_eq!(clock.advance(), 3);
        assert!((clock.elapsed_seconds() - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn clock_interval_from_rate() {
        let clock = SimClock::new(10.0);
        assert!((clock.tick_interval().as_secs_f64() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn clock_ignores_bad_rate() {
        let mut clock = SimClock::new(10.0);
        clock.set_tick_rate(0.0);
        clock.set_tick_rate(f64::NAN);
        assert_eq!(clock.tick_rate(), 10.0);
        clock.set_tick_rate(20.0);
        assert_eq!(clock.tick_rate(), 20.0);
    }
}
