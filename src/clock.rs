use core::time::Duration;

/// Monotonic time source and blocking delay used by the transmit loop
pub trait Clock {
    /// Time since an arbitrary, fixed epoch
    fn now(&mut self) -> Duration;

    fn delay(&mut self, duration: Duration);
}

impl<C: Clock + ?Sized> Clock for &mut C {
    fn now(&mut self) -> Duration {
        (**self).now()
    }

    fn delay(&mut self, duration: Duration) {
        (**self).delay(duration)
    }
}

/// Wall clock backed by [`std::time::Instant`], measured from construction
#[cfg(feature = "std")]
#[derive(Debug, Clone, Copy)]
pub struct StdClock {
    epoch: std::time::Instant,
}

#[cfg(feature = "std")]
impl StdClock {
    pub fn new() -> Self {
        Self {
            epoch: std::time::Instant::now(),
        }
    }
}

#[cfg(feature = "std")]
impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "std")]
impl Clock for StdClock {
    fn now(&mut self) -> Duration {
        self.epoch.elapsed()
    }

    fn delay(&mut self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}
