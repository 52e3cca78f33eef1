use embedded_can::Id;

/// Length of a full classic CAN payload
pub const CAN2_PAYLOAD_LENGTH: usize = 8;

/// Represents a CAN 2.0 data frame with a full 8 byte payload.
///
/// The steering message is never sent as a remote request, so adapter
/// drivers always transmit these with the RTR flag cleared.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Can2Frame {
    #[cfg_attr(feature = "defmt", defmt(Debug2Format))]
    id: Id,
    data: [u8; CAN2_PAYLOAD_LENGTH],
}

impl Can2Frame {
    /// Creates a full length data frame, which cannot fail
    pub fn from_payload(id: impl Into<Id>, data: [u8; CAN2_PAYLOAD_LENGTH]) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }

    /// Gets the message ID of the frame
    pub fn id(&self) -> Id {
        self.id
    }

    /// Gets the numeric value of the message ID, without the kind
    pub fn raw_id(&self) -> u32 {
        match self.id {
            Id::Standard(id) => id.as_raw() as u32,
            Id::Extended(id) => id.as_raw(),
        }
    }

    /// Gets the DLC (Data Length Code) of the frame
    pub fn dlc(&self) -> usize {
        CAN2_PAYLOAD_LENGTH
    }

    /// Gets the data associated with the frame
    pub fn data(&self) -> &[u8; CAN2_PAYLOAD_LENGTH] {
        &self.data
    }

    pub fn is_extended(&self) -> bool {
        self.id.kind() == IdKind::Extended
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IdKind {
    #[default]
    Standard,
    Extended,
}

pub trait IdExt {
    fn kind(self) -> IdKind;
}

impl IdExt for Id {
    fn kind(self) -> IdKind {
        match self {
            Id::Standard(_) => IdKind::Standard,
            Id::Extended(_) => IdKind::Extended,
        }
    }
}

#[cfg(test)]
mod tests {
    use embedded_can::{ExtendedId, Id, StandardId};

    use crate::{codec::encode, Can2Frame, IdExt, IdKind, SignalSample, STEERING_ANGLE_ID};

    #[test]
    fn id_kinds() {
        assert_eq!(Id::Standard(StandardId::MAX).kind(), IdKind::Standard);
        assert_eq!(Id::Extended(ExtendedId::ZERO).kind(), IdKind::Extended);
    }

    #[test]
    fn extended_frame_reports_raw_id() {
        let frame = Can2Frame::from_payload(ExtendedId::MAX, [1, 2, 3, 4, 5, 6, 7, 8]);

        assert!(frame.is_extended());
        assert_eq!(frame.raw_id(), 0x1FFF_FFFF);
        assert_eq!(frame.dlc(), 8);
        assert_eq!(frame.data(), &[1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn steering_payload_as_can_frame() {
        let payload = encode(&SignalSample::new(-45.0, 0.0, 0, 3));
        let frame = payload.to_can_frame(STEERING_ANGLE_ID);

        assert_eq!(frame.raw_id(), 0x2B0);
        assert!(!frame.is_extended());
        assert_eq!(frame.dlc(), 8);
        assert_eq!(frame.data(), payload.as_bytes());
    }
}
