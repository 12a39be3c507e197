use crate::selector::SpinError;

pub const FULL_TURN: f64 = 360.0;
pub const DEFAULT_EXTRA_TURNS: u32 = 5;
/// Offsets closer than this to a full turn count as already aligned.
const ALIGNMENT_TOLERANCE: f64 = 1e-9;

/// Maps a selected segment to the rotation that brings its midpoint under
/// the pointer at the top of the wheel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelGeometry {
    pub extra_turns: u32,
}
impl Default for WheelGeometry {
    fn default() -> Self {
        Self {
            extra_turns: DEFAULT_EXTRA_TURNS,
        }
    }
}
impl WheelGeometry {
    pub fn new(extra_turns: u32) -> Self {
        Self { extra_turns }
    }
    pub fn segment_width(segments: usize) -> Result<f64, SpinError> {
        if segments == 0 {
            return Err(SpinError::EmptyPrizeList);
        }
        Ok(FULL_TURN / segments as f64)
    }
    /// Angle of the midpoint of `index`, measured on the unrotated wheel.
    pub fn segment_midpoint(index: usize, segments: usize) -> Result<f64, SpinError> {
        let width = Self::segment_width(segments)?;
        if index >= segments {
            return Err(SpinError::SegmentOutOfRange { index, segments });
        }
        Ok(index as f64 * width + width / 2.0)
    }
    /// Rotation at which the wheel rests with `index` under the pointer, in
    /// `(0, 360)`.
    pub fn resting_angle(index: usize, segments: usize) -> Result<f64, SpinError> {
        Ok(FULL_TURN - Self::segment_midpoint(index, segments)?)
    }
    /// New cumulative rotation for a spin landing on `index`.
    ///
    /// The result never decreases: it is `current` plus the extra turns plus
    /// the smallest forward offset that reaches the resting angle. From a
    /// rotation that is a whole number of turns the offset is exactly the
    /// resting angle.
    pub fn target_rotation(
        &self,
        index: usize,
        segments: usize,
        current: f64,
    ) -> Result<f64, SpinError> {
        let resting = Self::resting_angle(index, segments)?;
        let mut offset = (resting - current.rem_euclid(FULL_TURN)).rem_euclid(FULL_TURN);
        if FULL_TURN - offset < ALIGNMENT_TOLERANCE {
            offset = 0.0;
        }
        Ok(current + self.extra_turns as f64 * FULL_TURN + offset)
    }
}

/// Segment currently under the pointer for a given cumulative rotation.
#[cfg(test)]
pub fn segment_at_pointer(rotation: f64, segments: usize) -> Result<usize, SpinError> {
    let width = WheelGeometry::segment_width(segments)?;
    let angle = (FULL_TURN - rotation.rem_euclid(FULL_TURN)).rem_euclid(FULL_TURN);
    Ok(((angle / width) as usize).min(segments - 1))
}

#[cfg(test)]
mod test {
    use super::*;

    const EPS: f64 = 1e-9;

    fn pointer_offset(rotation: f64, index: usize, segments: usize) -> f64 {
        // where the midpoint of `index` ends up, 0 is the pointer
        let midpoint = WheelGeometry::segment_midpoint(index, segments).unwrap();
        let angle = (midpoint + rotation).rem_euclid(FULL_TURN);
        angle.min(FULL_TURN - angle)
    }

    #[test]
    fn first_spin_from_rest() {
        let geometry = WheelGeometry::default();
        // 4 segments of 90 degrees, segment 1 has its midpoint at 135
        let target = geometry.target_rotation(1, 4, 0.0).unwrap();
        assert!((target - (5.0 * 360.0 + 225.0)).abs() < EPS);
    }

    #[test]
    fn every_segment_lands_under_pointer() {
        let geometry = WheelGeometry::default();
        for segments in 1..=13 {
            for index in 0..segments {
                for current in [0.0, 45.5, 359.9, 1800.0, 2047.25] {
                    let target = geometry.target_rotation(index, segments, current).unwrap();
                    assert!(
                        pointer_offset(target, index, segments) < EPS,
                        "segments {} index {} current {}",
                        segments,
                        index,
                        current
                    );
                    assert!(target >= current + 5.0 * FULL_TURN);
                    assert!(target < current + 6.0 * FULL_TURN);
                    assert_eq!(segment_at_pointer(target, segments).unwrap(), index);
                }
            }
        }
    }

    #[test]
    fn chained_spins_add_exactly_the_extra_turns() {
        let geometry = WheelGeometry::new(3);
        let first = geometry.target_rotation(2, 6, 0.0).unwrap();
        let second = geometry.target_rotation(2, 6, first).unwrap();
        assert!((second - first - 3.0 * FULL_TURN).abs() < EPS);
        assert_eq!(
            geometry.target_rotation(2, 6, first).unwrap(),
            second
        );
    }

    #[test]
    fn invalid_segments() {
        let geometry = WheelGeometry::default();
        assert_eq!(
            geometry.target_rotation(0, 0, 0.0).unwrap_err(),
            SpinError::EmptyPrizeList
        );
        assert_eq!(
            geometry.target_rotation(4, 4, 0.0).unwrap_err(),
            SpinError::SegmentOutOfRange {
                index: 4,
                segments: 4
            }
        );
    }
}
