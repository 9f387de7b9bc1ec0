use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Monotonic time source read by the rerender throttle.
#[derive(Debug, Clone)]
pub enum Clock {
    System { origin: Instant },
    Manual(Rc<Cell<Duration>>),
}

impl Clock {
    pub fn system() -> Self {
        Clock::System {
            origin: Instant::now(),
        }
    }

    /// A clock that only moves when [`Clock::advance`] is called. Clones share
    /// the same reading.
    pub fn manual() -> Self {
        Clock::Manual(Rc::new(Cell::new(Duration::ZERO)))
    }

    pub fn now(&self) -> Duration {
        match self {
            Clock::System { origin } => origin.elapsed(),
            Clock::Manual(current) => current.get(),
        }
    }

    /// No-op for the system clock.
    pub fn advance(&self, by: Duration) {
        if let Clock::Manual(current) = self {
            current.set(current.get() + by);
        }
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::system()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_is_shared_between_clones() {
        let clock = Clock::manual();
        let other = clock.clone();
        clock.advance(Duration::from_millis(250));
        assert_eq!(other.now(), Duration::from_millis(250));
    }
}
