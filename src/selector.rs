use crate::api::Prize;
use log::trace;
use rand::Rng;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum SpinError {
    #[error("Invalid input: the prize list is empty")]
    EmptyPrizeList,
    #[error("Invalid input: prize at position {index} has negative weight {weight}")]
    NegativeWeight { index: usize, weight: f64 },
    #[error("Invalid input: prize at position {index} has a weight that is not a finite number")]
    NonFiniteWeight { index: usize },
    #[error("Invalid input: segment {index} doesn't exist on a wheel with {segments} segments")]
    SegmentOutOfRange { index: usize, segments: usize },
}

/// Uniform randomness in `[0, 1)`.
pub trait RandomSource {
    fn next_unit(&mut self) -> f64;
}
/// Adapts any `rand` generator.
#[derive(Debug)]
pub struct RngSource<R>(pub R);
impl<R: Rng> RandomSource for RngSource<R> {
    fn next_unit(&mut self) -> f64 {
        self.0.gen::<f64>()
    }
}
/// Always yields the same draw.
#[cfg(test)]
#[derive(Debug, Clone, Copy)]
pub struct FixedDraw(pub f64);
#[cfg(test)]
impl RandomSource for FixedDraw {
    fn next_unit(&mut self) -> f64 {
        self.0
    }
}

pub trait Weighted {
    fn weight(&self) -> f64;
}
impl Weighted for Prize {
    fn weight(&self) -> f64 {
        self.weight
    }
}

/// Checks the preconditions of [`select`] and returns the total weight.
pub fn total_weight<T: Weighted>(outcomes: &[T]) -> Result<f64, SpinError> {
    if outcomes.is_empty() {
        return Err(SpinError::EmptyPrizeList);
    }
    let mut total = 0.0;
    for (index, outcome) in outcomes.iter().enumerate() {
        let weight = outcome.weight();
        if !weight.is_finite() {
            return Err(SpinError::NonFiniteWeight { index });
        }
        if weight < 0.0 {
            return Err(SpinError::NegativeWeight { index, weight });
        }
        total += weight;
    }
    Ok(total)
}

/// Picks one outcome with probability proportional to its weight.
///
/// Draws `r` in `[0, total)` and walks the list in order, subtracting each
/// weight until the remainder is zero or below. When every weight is zero the
/// first outcome is returned. Returns the index of the outcome together with
/// the outcome itself.
pub fn select<'a, T: Weighted>(
    outcomes: &'a [T],
    random: &mut impl RandomSource,
) -> Result<(usize, &'a T), SpinError> {
    let total = total_weight(outcomes)?;
    if total == 0.0 {
        trace!("All {} weights are zero, falling back to the first", outcomes.len());
        return Ok((0, &outcomes[0]));
    }
    let draw = clamp_unit(random.next_unit());
    let mut remainder = draw * total;
    trace!("Drew {} of total weight {}", remainder, total);
    let mut last_weighted = 0;
    for (index, outcome) in outcomes.iter().enumerate() {
        let weight = outcome.weight();
        if weight == 0.0 {
            continue;
        }
        remainder -= weight;
        if remainder <= 0.0 {
            return Ok((index, outcome));
        }
        last_weighted = index;
    }
    // rounding can leave a tiny positive remainder after the last weight
    Ok((last_weighted, &outcomes[last_weighted]))
}

fn clamp_unit(draw: f64) -> f64 {
    if draw.is_nan() || draw < 0.0 {
        0.0
    } else if draw >= 1.0 {
        1.0 - f64::EPSILON
    } else {
        draw
    }
}
