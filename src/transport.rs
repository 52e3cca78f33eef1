use num_enum::{FromPrimitive, IntoPrimitive, TryFromPrimitive};

use crate::frame::Can2Frame;

/// Result codes reported by the CAN adapter library. Zero is success and is
/// never carried in an `Err`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, FromPrimitive, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(i32)]
pub enum ErrorCode {
    /// Any code not listed below, kept verbatim
    #[error("vendor specific error ({0})")]
    #[num_enum(catch_all)]
    Other(i32),
    #[error("bus off")]
    BusOff = -1,
    #[error("error warning level reached")]
    ErrorWarning = -2,
    #[error("bus error")]
    BusError = -3,
    #[error("controller is not started")]
    Offline = -9,
    #[error("controller is already started")]
    Online = -10,
    #[error("message lost")]
    MessageLost = -11,
    #[error("transmitter busy")]
    TxBusy = -20,
    #[error("receiver empty")]
    RxEmpty = -30,
    #[error("queue overrun")]
    QueueOverrun = -40,
    #[error("timed out")]
    Timeout = -50,
    #[error("resource allocation failed")]
    Resource = -90,
    #[error("illegal bit rate")]
    Baudrate = -91,
    #[error("illegal handle")]
    Handle = -92,
    #[error("illegal parameter")]
    IllegalParameter = -93,
    #[error("null pointer")]
    NullPointer = -94,
    #[error("channel not initialized")]
    NotInitialized = -95,
    #[error("channel already initialized")]
    AlreadyInitialized = -96,
    #[error("driver library error")]
    Library = -97,
    #[error("not supported")]
    NotSupported = -98,
    #[error("fatal driver error")]
    Fatal = -99,
}

impl ErrorCode {
    /// Only a busy transmitter is worth trying again
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TxBusy)
    }

    /// Maps a raw adapter return value, where zero (and any positive value)
    /// means success
    pub fn check(result: i32) -> Result<(), Self> {
        if result >= 0 {
            Ok(())
        } else {
            Err(Self::from(result))
        }
    }

    fn illegal_bitrate(_index: i32) -> Self {
        Self::Baudrate
    }
}

/// The adapter's predefined bit timing table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[num_enum(error_type(name = ErrorCode, constructor = ErrorCode::illegal_bitrate))]
#[repr(i32)]
pub enum BitrateIndex {
    /// Transmits and receives at 1 Mbit/s
    Rate1Mbit = 0,
    /// Transmits and receives at 800 Kbit/s
    Rate800Kbit = -1,
    /// Transmits and receives at 500 Kbit/s
    #[default]
    Rate500Kbit = -2,
    /// Transmits and receives at 250 Kbit/s
    Rate250Kbit = -3,
    /// Transmits and receives at 125 Kbit/s
    Rate125Kbit = -4,
    /// Transmits and receives at 100 Kbit/s
    Rate100Kbit = -5,
    /// Transmits and receives at 50 Kbit/s
    Rate50Kbit = -6,
    /// Transmits and receives at 20 Kbit/s
    Rate20Kbit = -7,
    /// Transmits and receives at 10 Kbit/s
    Rate10Kbit = -8,
}

impl BitrateIndex {
    pub fn bits_per_second(&self) -> u32 {
        match self {
            Self::Rate1Mbit => 1_000_000,
            Self::Rate800Kbit => 800_000,
            Self::Rate500Kbit => 500_000,
            Self::Rate250Kbit => 250_000,
            Self::Rate125Kbit => 125_000,
            Self::Rate100Kbit => 100_000,
            Self::Rate50Kbit => 50_000,
            Self::Rate20Kbit => 20_000,
            Self::Rate10Kbit => 10_000,
        }
    }
}

/// Controller status register as reported by the adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StatusFlags {
    /// Controller is in reset, i.e. not started
    pub can_stopped: bool,
    pub bus_off: bool,
    pub warning_level: bool,
    pub bus_error: bool,
    pub transmitter_busy: bool,
    pub receiver_empty: bool,
    pub message_lost: bool,
    pub queue_overrun: bool,
}

impl From<u8> for StatusFlags {
    fn from(byte: u8) -> Self {
        let bit = |n: u8| byte & (1 << n) != 0;

        Self {
            can_stopped: bit(7),
            bus_off: bit(6),
            warning_level: bit(5),
            bus_error: bit(4),
            transmitter_busy: bit(3),
            receiver_empty: bit(2),
            message_lost: bit(1),
            queue_overrun: bit(0),
        }
    }
}

impl From<StatusFlags> for u8 {
    fn from(flags: StatusFlags) -> Self {
        let mut byte = 0;

        for (set, n) in [
            (flags.can_stopped, 7),
            (flags.bus_off, 6),
            (flags.warning_level, 5),
            (flags.bus_error, 4),
            (flags.transmitter_busy, 3),
            (flags.receiver_empty, 2),
            (flags.message_lost, 1),
            (flags.queue_overrun, 0),
        ] {
            if set {
                byte |= 1u8 << n;
            }
        }

        byte
    }
}

/// A CAN adapter channel capable of sending classic CAN frames.
///
/// Implementations wrap the vendor driver; this crate never talks to
/// hardware directly.
pub trait Transport {
    /// Opens (initializes) the given channel
    fn open(&mut self, channel: u8) -> Result<(), ErrorCode>;

    /// Puts the controller on the bus with the given bit timing
    fn start(&mut self, bitrate: BitrateIndex) -> Result<(), ErrorCode>;

    /// Queues one frame for transmission. [`ErrorCode::TxBusy`] means the
    /// frame was not accepted and may be offered again.
    fn send(&mut self, frame: &Can2Frame) -> Result<(), ErrorCode>;

    fn status(&mut self) -> Result<StatusFlags, ErrorCode> {
        Err(ErrorCode::NotSupported)
    }

    /// Takes the controller off the bus and releases the channel. Must be
    /// safe to call when never opened or already closed.
    fn close(&mut self);
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn open(&mut self, channel: u8) -> Result<(), ErrorCode> {
        (**self).open(channel)
    }

    fn start(&mut self, bitrate: BitrateIndex) -> Result<(), ErrorCode> {
        (**self).start(bitrate)
    }

    fn send(&mut self, frame: &Can2Frame) -> Result<(), ErrorCode> {
        (**self).send(frame)
    }

    fn status(&mut self) -> Result<StatusFlags, ErrorCode> {
        (**self).status()
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// Owns an opened transport and closes it when dropped, whichever way the
/// owner exits.
pub struct TransportGuard<T: Transport> {
    transport: T,
}

impl<T: Transport> TransportGuard<T> {
    /// Opens and starts the channel. On a start failure the channel is
    /// closed again before the error is returned.
    pub fn acquire(
        mut transport: T,
        channel: u8,
        bitrate: BitrateIndex,
    ) -> Result<Self, AcquireError> {
        if let Err(code) = transport.open(channel) {
            transport.close();
            return Err(AcquireError::Open(code));
        }

        // From here on dropping the guard closes the channel
        let mut guard = Self { transport };

        guard.transport.start(bitrate).map_err(AcquireError::Start)?;

        Ok(guard)
    }

    pub fn transport(&mut self) -> &mut T {
        &mut self.transport
    }
}

impl<T: Transport> Drop for TransportGuard<T> {
    fn drop(&mut self) {
        self.transport.close();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AcquireError {
    #[error("Failed to open CAN channel ({0})")]
    Open(ErrorCode),
    #[error("Failed to start CAN controller ({0})")]
    Start(ErrorCode),
}
