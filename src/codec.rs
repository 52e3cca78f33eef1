use embedded_can::Id;

use crate::{
    frame::Can2Frame,
    ranges::{angle_to_raw, rate_to_raw, raw_to_angle, sequence_to_raw, status_to_raw},
};

/// Payload length of the steering angle message
pub const WIRE_FRAME_LENGTH: usize = 8;

/// The semantic content of one steering angle message.
///
/// Fields are deliberately wider than their wire representation; anything
/// out of range is clamped by [`encode`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SignalSample {
    /// Steering wheel angle in degrees, [-3276.8, 3276.7] at 0.1 resolution
    pub angle: f32,
    /// Magnitude of the steering speed, [0, 255]
    pub rate: f32,
    /// Free-form status code, [0, 255]
    pub status: u16,
    /// Rolling counter, [0, 15]
    pub sequence: u8,
}

impl SignalSample {
    pub fn new(angle: f32, rate: f32, status: u16, sequence: u8) -> Self {
        Self {
            angle,
            rate,
            status,
            sequence,
        }
    }
}

/// The 8 byte payload of the steering angle message.
///
/// | Bytes | Field                                  |
/// |-------|----------------------------------------|
/// | 0-1   | angle, i16 little-endian, 0.1 deg/unit |
/// | 2     | rate                                   |
/// | 3     | status                                 |
/// | 4     | sequence (high nibble), checksum (low) |
/// | 5-7   | reserved, zero                         |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WireFrame([u8; WIRE_FRAME_LENGTH]);

impl WireFrame {
    pub fn from_bytes(bytes: [u8; WIRE_FRAME_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; WIRE_FRAME_LENGTH] {
        &self.0
    }

    /// Checksum nibble as stored in byte 4
    pub fn stored_checksum(&self) -> u8 {
        low_nibble(self.0[4])
    }

    /// Sequence nibble as stored in byte 4
    pub fn sequence(&self) -> u8 {
        high_nibble(self.0[4])
    }

    /// Checksum recomputed from bytes 0-3
    pub fn expected_checksum(&self) -> u8 {
        checksum(&self.0)
    }

    /// Wraps the payload into a CAN 2.0 data frame with the given ID
    pub fn to_can_frame(&self, id: impl Into<Id>) -> Can2Frame {
        Can2Frame::from_payload(id, self.0)
    }
}

impl From<WireFrame> for [u8; WIRE_FRAME_LENGTH] {
    fn from(frame: WireFrame) -> Self {
        frame.0
    }
}

/// The result of unpacking a [`WireFrame`]. The checksum is reported, not
/// enforced; callers decide what a mismatch means.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DecodedFrame {
    pub sample: SignalSample,
    pub checksum: u8,
    pub expected_checksum: u8,
}

impl DecodedFrame {
    pub fn is_checksum_valid(&self) -> bool {
        self.checksum == self.expected_checksum
    }
}

/* Encoding */

fn low_nibble(byte: u8) -> u8 {
    byte & 0xF
}

fn high_nibble(byte: u8) -> u8 {
    byte >> 4
}

fn pack_nibbles(high: u8, low: u8) -> u8 {
    (high << 4) | low_nibble(low)
}

/// XOR of bytes 0-3 folded to 4 bits
pub fn checksum(data: &[u8; WIRE_FRAME_LENGTH]) -> u8 {
    low_nibble(data[0] ^ data[1] ^ data[2] ^ data[3])
}

/// Packs a sample into the 8 byte payload. Every field is clamped to what
/// the wire can carry first, so this never fails.
pub fn encode(sample: &SignalSample) -> WireFrame {
    let [angle_lo, angle_hi] = angle_to_raw(sample.angle).to_le_bytes();

    let mut data = [0u8; WIRE_FRAME_LENGTH];

    data[0] = angle_lo;
    data[1] = angle_hi;
    data[2] = rate_to_raw(sample.rate);
    data[3] = status_to_raw(sample.status);
    data[4] = pack_nibbles(sequence_to_raw(sample.sequence), checksum(&data));

    WireFrame(data)
}

/* Decoding */

pub fn decode(frame: &WireFrame) -> DecodedFrame {
    let data = frame.as_bytes();

    DecodedFrame {
        sample: SignalSample {
            angle: raw_to_angle(i16::from_le_bytes([data[0], data[1]])),
            rate: data[2] as f32,
            status: data[3] as u16,
            sequence: frame.sequence(),
        },
        checksum: frame.stored_checksum(),
        expected_checksum: frame.expected_checksum(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranges::{ANGLE_MAX, ANGLE_MIN};

    #[test]
    fn negative_angle_is_twos_complement() {
        let frame = encode(&SignalSample::new(-45.0, 0.0, 0, 0));

        // 65536 - 450 = 65086 = 0xFE3E
        assert_eq!(&frame.as_bytes()[..2], &[0x3E, 0xFE]);
        assert_eq!(u16::from_le_bytes([0x3E, 0xFE]), 65086);
    }

    #[test]
    fn byte_layout() {
        let frame = encode(&SignalSample::new(12.3, 6.0, 0x5A, 9));

        // 123 = 0x007B
        let expected_checksum = (0x7B ^ 0x00 ^ 0x06 ^ 0x5A) & 0xF;

        assert_eq!(
            frame.as_bytes(),
            &[0x7B, 0x00, 0x06, 0x5A, (9 << 4) | expected_checksum, 0, 0, 0]
        );
    }

    #[test]
    fn out_of_range_fields_are_clamped() {
        let decoded = decode(&encode(&SignalSample::new(5000.0, 9999.0, 9999, 99)));

        assert_eq!(decoded.sample.angle, ANGLE_MAX);
        assert_eq!(decoded.sample.rate, 255.0);
        assert_eq!(decoded.sample.status, 255);
        assert_eq!(decoded.sample.sequence, 15);
        assert!(decoded.is_checksum_valid());

        let decoded = decode(&encode(&SignalSample::new(-5000.0, -1.0, 0, 0)));

        assert_eq!(decoded.sample.angle, ANGLE_MIN);
        assert_eq!(decoded.sample.rate, 0.0);
    }

    #[test]
    fn every_representable_angle_survives() {
        for raw in i16::MIN..=i16::MAX {
            let angle = raw as f32 / 10.0;
            let frame = encode(&SignalSample::new(angle, 0.0, 0, 0));

            assert_eq!(decode(&frame).sample.angle, angle, "raw value {raw}");
        }
    }

    #[test]
    fn stored_checksum_matches_payload() {
        for sequence in 0..16u8 {
            for status in [0u16, 1, 0x7F, 0xFF] {
                let sample = SignalSample::new(-123.4 + sequence as f32, 17.0, status, sequence);
                let frame = encode(&sample);
                let data = frame.as_bytes();

                assert_eq!(
                    frame.stored_checksum(),
                    (data[0] ^ data[1] ^ data[2] ^ data[3]) & 0xF
                );
                assert_eq!(frame.sequence(), sequence);
                assert_eq!(&data[5..], &[0, 0, 0]);
            }
        }
    }

    #[test]
    fn corrupted_frame_reports_checksum_mismatch() {
        let mut bytes: [u8; WIRE_FRAME_LENGTH] = encode(&SignalSample::new(30.0, 3.0, 1, 4)).into();
        bytes[2] ^= 0x01;

        let decoded = decode(&WireFrame::from_bytes(bytes));

        assert!(!decoded.is_checksum_valid());
        assert_eq!(decoded.checksum ^ decoded.expected_checksum, 0x01);
    }
}
