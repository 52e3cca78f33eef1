use core::time::Duration;

use crate::{codec::SignalSample, ranges::abs_f32};

/// Fixed divisor applied to the ramp speed before it is put on the wire
pub const RATE_DIVISOR: f32 = 4.0;

/// Which steering extreme the pattern is currently heading to or holding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    #[default]
    SteeringLeft,
    SteeringRight,
}

impl Phase {
    pub fn opposite(self) -> Self {
        match self {
            Self::SteeringLeft => Self::SteeringRight,
            Self::SteeringRight => Self::SteeringLeft,
        }
    }
}

/// Shape of the left/right sweep
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PatternConfig {
    pub left_angle: f32,
    pub right_angle: f32,
    /// Where the very first ramp starts from
    pub straight_angle: f32,
    #[cfg_attr(feature = "defmt", defmt(Debug2Format))]
    pub transition: Duration,
    #[cfg_attr(feature = "defmt", defmt(Debug2Format))]
    pub hold: Duration,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            left_angle: -45.0,
            right_angle: 45.0,
            straight_angle: 0.0,
            transition: Duration::from_secs(2),
            hold: Duration::from_secs(5),
        }
    }
}

impl PatternConfig {
    pub fn with_angles(mut self, left: f32, right: f32) -> Self {
        self.left_angle = left;
        self.right_angle = right;
        self
    }

    pub fn with_straight_angle(mut self, straight: f32) -> Self {
        self.straight_angle = straight;
        self
    }

    pub fn with_transition(mut self, transition: Duration) -> Self {
        self.transition = transition;
        self
    }

    pub fn with_hold(mut self, hold: Duration) -> Self {
        self.hold = hold;
        self
    }

    /// The steady-state angle of a phase
    pub fn extreme(&self, phase: Phase) -> f32 {
        match phase {
            Phase::SteeringLeft => self.left_angle,
            Phase::SteeringRight => self.right_angle,
        }
    }
}

/// Time driven generator of steering angle samples.
///
/// Each phase ramps linearly from the previously held angle to its own
/// extreme over `transition`, then holds there for `hold` before handing
/// over to the opposite phase. Timestamps are offsets from any fixed epoch
/// chosen by the caller.
#[derive(Debug, Clone)]
pub struct SteeringPattern {
    config: PatternConfig,
    phase: Phase,
    phase_entry: Duration,
    /// Angle the current ramp starts from
    origin: f32,
    sequence: u8,
}

impl SteeringPattern {
    pub fn new(config: PatternConfig, start: Duration) -> Self {
        Self {
            phase: Phase::SteeringLeft,
            phase_entry: start,
            origin: config.straight_angle,
            sequence: 0,
            config,
        }
    }

    pub fn config(&self) -> &PatternConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn phase_entry(&self) -> Duration {
        self.phase_entry
    }

    /// The rolling counter value the next tick will emit
    pub fn sequence(&self) -> u8 {
        self.sequence
    }

    /// Computes the sample for `now` and advances the pattern.
    ///
    /// The returned sample always describes the phase that was active on
    /// entry; a phase change triggered by this tick only affects later ones.
    /// A `now` earlier than the phase entry counts as zero elapsed time.
    pub fn tick(&mut self, now: Duration) -> SignalSample {
        let elapsed = now.saturating_sub(self.phase_entry);
        let target = self.config.extreme(self.phase);

        let (angle, rate) = if elapsed < self.config.transition {
            ramp(self.origin, target, elapsed, self.config.transition)
        } else {
            if elapsed >= self.config.transition.saturating_add(self.config.hold) {
                self.advance(now);
            }
            (target, 0.0)
        };

        let sample = SignalSample::new(angle, rate, 0, self.sequence);
        self.sequence = (self.sequence + 1) & 0xF;

        sample
    }

    fn advance(&mut self, now: Duration) {
        let next = self.phase.opposite();

        log::debug!("pattern phase {:?} -> {:?}", self.phase, next);

        self.origin = self.config.extreme(self.phase);
        self.phase = next;
        self.phase_entry = now;
    }
}

/// Linear ramp from `from` to `to`. Only called with `elapsed < duration`,
/// so `duration` is never zero here.
fn ramp(from: f32, to: f32, elapsed: Duration, duration: Duration) -> (f32, f32) {
    let duration = duration.as_secs_f32();
    let progress = elapsed.as_secs_f32() / duration;
    let delta = to - from;

    (from + delta * progress, abs_f32(delta) / duration / RATE_DIVISOR)
}
