use core::{
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

use embedded_can::Id;
use log::{debug, error, info, warn};

use crate::{
    clock::Clock,
    codec::encode,
    frame::Can2Frame,
    pattern::{PatternConfig, SteeringPattern},
    transport::{AcquireError, BitrateIndex, ErrorCode, Transport, TransportGuard},
    STEERING_ANGLE_ID,
};

/// Everything the transmit loop needs besides the transport and clock
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DriverConfig {
    pub channel: u8,
    pub bitrate: BitrateIndex,
    /// Standard or extended ID the steering message is sent with
    #[cfg_attr(feature = "defmt", defmt(Debug2Format))]
    pub can_id: Id,
    pub pattern: PatternConfig,
    /// Stop after this many frames went out
    pub max_frames: u64,
    /// Pause after every successful send, zero to send back to back
    #[cfg_attr(feature = "defmt", defmt(Debug2Format))]
    pub cycle: Duration,
    /// Pause before offering a frame again to a busy transmitter
    #[cfg_attr(feature = "defmt", defmt(Debug2Format))]
    pub retry_backoff: Duration,
    /// Log progress every this many frames, zero disables it
    pub report_interval: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            channel: 0,
            bitrate: BitrateIndex::Rate500Kbit,
            can_id: Id::Standard(STEERING_ANGLE_ID),
            pattern: PatternConfig::default(),
            max_frames: 9_999_999,
            cycle: Duration::from_millis(1),
            retry_backoff: Duration::from_millis(1),
            report_interval: 1000,
        }
    }
}

impl DriverConfig {
    pub fn with_channel(mut self, channel: u8) -> Self {
        self.channel = channel;
        self
    }

    pub fn with_bitrate(mut self, bitrate: BitrateIndex) -> Self {
        self.bitrate = bitrate;
        self
    }

    pub fn with_can_id(mut self, can_id: impl Into<Id>) -> Self {
        self.can_id = can_id.into();
        self
    }

    pub fn with_pattern(mut self, pattern: PatternConfig) -> Self {
        self.pattern = pattern;
        self
    }

    pub fn with_max_frames(mut self, max_frames: u64) -> Self {
        self.max_frames = max_frames;
        self
    }

    pub fn with_cycle(mut self, cycle: Duration) -> Self {
        self.cycle = cycle;
        self
    }

    pub fn with_retry_backoff(mut self, retry_backoff: Duration) -> Self {
        self.retry_backoff = retry_backoff;
        self
    }

    pub fn with_report_interval(mut self, report_interval: u64) -> Self {
        self.report_interval = report_interval;
        self
    }
}

/// Why the transmit loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Outcome {
    /// The configured number of frames was sent
    Completed,
    /// The cancellation flag was raised
    Cancelled,
    /// The transport rejected a frame with a non-retryable error
    Aborted,
}

/// Final statistics of a transmit session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SessionReport {
    pub frames_sent: u64,
    /// Number of times a frame was offered again after a busy transmitter
    pub busy_retries: u64,
    #[cfg_attr(feature = "defmt", defmt(Debug2Format))]
    pub elapsed: Duration,
    pub outcome: Outcome,
}

impl SessionReport {
    /// Average messages per second over the whole session
    pub fn rate(&self) -> f32 {
        message_rate(self.frames_sent, self.elapsed)
    }
}

fn message_rate(frames: u64, elapsed: Duration) -> f32 {
    let secs = elapsed.as_secs_f32();

    if secs > 0.0 {
        frames as f32 / secs
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DriverError {
    #[error("Failed to open CAN channel ({0})")]
    Open(ErrorCode),
    #[error("Failed to start CAN controller ({0})")]
    Start(ErrorCode),
    /// Carries the statistics of the session up to the failure
    #[error("Failed to send steering frame after {} frames ({code})", .report.frames_sent)]
    Send { code: ErrorCode, report: SessionReport },
}

impl From<AcquireError> for DriverError {
    fn from(error: AcquireError) -> Self {
        match error {
            AcquireError::Open(code) => Self::Open(code),
            AcquireError::Start(code) => Self::Start(code),
        }
    }
}

enum Delivery {
    Sent,
    Cancelled,
}

/// An open channel plus the counters of one run. Dropping it releases the
/// channel.
pub struct TransmitSession<T: Transport> {
    guard: TransportGuard<T>,
    start: Duration,
    frames_sent: u64,
    busy_retries: u64,
}

impl<T: Transport> TransmitSession<T> {
    /// Opens and starts the channel described by `config`
    pub fn open(
        transport: T,
        config: &DriverConfig,
        start: Duration,
    ) -> Result<Self, DriverError> {
        let guard = TransportGuard::acquire(transport, config.channel, config.bitrate)?;

        info!(
            "CAN channel {} on bus at {} bit/s",
            config.channel,
            config.bitrate.bits_per_second()
        );

        Ok(Self {
            guard,
            start,
            frames_sent: 0,
            busy_retries: 0,
        })
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    pub fn busy_retries(&self) -> u64 {
        self.busy_retries
    }

    /// Offers `frame` until the transport takes it. A busy transmitter gets
    /// the very same frame again after `backoff`; anything else is fatal.
    fn deliver<C: Clock>(
        &mut self,
        frame: &Can2Frame,
        clock: &mut C,
        backoff: Duration,
        cancel: &AtomicBool,
    ) -> Result<Delivery, ErrorCode> {
        loop {
            match self.guard.transport().send(frame) {
                Ok(()) => {
                    self.frames_sent += 1;
                    return Ok(Delivery::Sent);
                }
                Err(code) if code.is_retryable() => {
                    if cancel.load(Ordering::Relaxed) {
                        return Ok(Delivery::Cancelled);
                    }

                    self.busy_retries += 1;
                    debug!("transmitter busy, retrying in {:?}", backoff);
                    clock.delay(backoff);
                }
                Err(code) => return Err(code),
            }
        }
    }

    fn log_status(&mut self) {
        match self.guard.transport().status() {
            Ok(status) => error!("controller status: {:?}", status),
            Err(code) => debug!("controller status unavailable ({})", code),
        }
    }

    /// Closes the channel and summarizes the run
    pub fn finish(self, now: Duration, outcome: Outcome) -> SessionReport {
        let report = SessionReport {
            frames_sent: self.frames_sent,
            busy_retries: self.busy_retries,
            elapsed: now.saturating_sub(self.start),
            outcome,
        };

        drop(self);

        info!(
            "{:?} after {} frames in {:?} ({:.2} msg/s)",
            report.outcome,
            report.frames_sent,
            report.elapsed,
            report.rate()
        );

        report
    }
}

/// Drives the steering pattern onto the bus until `config.max_frames` went
/// out, `cancel` is raised, or the transport fails.
///
/// The channel is opened here and closed again on every way out.
pub fn run<T: Transport, C: Clock>(
    transport: T,
    mut clock: C,
    config: &DriverConfig,
    cancel: &AtomicBool,
) -> Result<SessionReport, DriverError> {
    let start = clock.now();
    let mut session = TransmitSession::open(transport, config, start)?;
    let mut pattern = SteeringPattern::new(config.pattern, start);

    let outcome = loop {
        if cancel.load(Ordering::Relaxed) {
            break Outcome::Cancelled;
        }

        if session.frames_sent >= config.max_frames {
            break Outcome::Completed;
        }

        let sample = pattern.tick(clock.now());
        let frame = encode(&sample).to_can_frame(config.can_id);

        match session.deliver(&frame, &mut clock, config.retry_backoff, cancel) {
            Ok(Delivery::Sent) => {}
            Ok(Delivery::Cancelled) => break Outcome::Cancelled,
            Err(code) => {
                error!("send failed after {} frames: {}", session.frames_sent, code);
                session.log_status();

                let report = session.finish(clock.now(), Outcome::Aborted);
                return Err(DriverError::Send { code, report });
            }
        }

        if config.report_interval != 0 && session.frames_sent % config.report_interval == 0 {
            let elapsed = clock.now().saturating_sub(start);
            info!(
                "sent {} frames ({:.2} msg/s)",
                session.frames_sent,
                message_rate(session.frames_sent, elapsed)
            );
        }

        if !config.cycle.is_zero() {
            clock.delay(config.cycle);
        }
    };

    if outcome == Outcome::Cancelled {
        warn!("transmission cancelled after {} frames", session.frames_sent);
    }

    Ok(session.finish(clock.now(), outcome))
}
