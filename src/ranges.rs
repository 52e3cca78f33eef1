/// Smallest angle the 16 bit field can carry, in degrees
pub const ANGLE_MIN: f32 = -3276.8;
/// Largest angle the 16 bit field can carry, in degrees
pub const ANGLE_MAX: f32 = 3276.7;
/// Raw units per degree of the angle field (0.1 deg/unit)
pub const ANGLE_SCALE: f32 = 10.0;

pub const RATE_MAX: f32 = u8::MAX as f32;
pub const STATUS_MAX: u16 = u8::MAX as u16;
pub const SEQUENCE_MAX: u8 = 0xF;

/// Clamps a float into `[min, max]`. NaN maps to `min` so that nothing
/// unrepresentable ever reaches a frame.
pub fn clamp_f32(value: f32, min: f32, max: f32) -> f32 {
    if value.is_nan() {
        min
    } else {
        value.clamp(min, max)
    }
}

/// Rounds half away from zero, the way the float `round` in `std` does.
/// `core` has no float rounding intrinsics, so the value is truncated by a
/// saturating cast and the leftover fraction decides the direction. NaN
/// maps to 0.
pub fn round_to_i32(value: f32) -> i32 {
    let truncated = value as i32;
    // Exact below 2^23; above that every f32 is already integral
    let fraction = value - truncated as f32;

    if fraction >= 0.5 {
        truncated.saturating_add(1)
    } else if fraction <= -0.5 {
        truncated.saturating_sub(1)
    } else {
        truncated
    }
}

pub fn abs_f32(value: f32) -> f32 {
    if value < 0.0 {
        -value
    } else {
        value
    }
}

/// Angle in degrees to the raw signed field value (0.1 deg/unit)
pub fn angle_to_raw(angle: f32) -> i16 {
    let clamped = clamp_f32(angle, ANGLE_MIN, ANGLE_MAX);
    round_to_i32(clamped * ANGLE_SCALE).clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

pub fn raw_to_angle(raw: i16) -> f32 {
    raw as f32 / ANGLE_SCALE
}

pub fn rate_to_raw(rate: f32) -> u8 {
    round_to_i32(clamp_f32(rate, 0.0, RATE_MAX)) as u8
}

pub fn status_to_raw(status: u16) -> u8 {
    status.min(STATUS_MAX) as u8
}

pub fn sequence_to_raw(sequence: u8) -> u8 {
    sequence.min(SEQUENCE_MAX)
}
