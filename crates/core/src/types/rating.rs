//! Product ratings.
//!
//! A product's aggregate rating is the arithmetic mean of every rating ever
//! submitted for it. The mean and the review count only ever change together;
//! [`RatingSummary::record`] is the single place that computes the next pair,
//! and storage backends apply it as one atomic step.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Errors produced when validating a rating.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RatingError {
    /// Rating is outside `[0, 5]`.
    #[error("rating must be between 0 and 5 inclusive (got {0})")]
    OutOfRange(Decimal),
}

/// A single submitted rating in the closed interval `[0, 5]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct RatingValue(Decimal);

impl RatingValue {
    /// Lowest accepted rating.
    pub const MIN: Decimal = Decimal::ZERO;
    /// Highest accepted rating.
    pub const MAX: Decimal = Decimal::from_parts(5, 0, 0, false, 0);

    /// Validate a raw rating. Both bounds are accepted.
    ///
    /// # Errors
    ///
    /// Returns `RatingError::OutOfRange` outside `[0, 5]`.
    pub fn new(value: Decimal) -> Result<Self, RatingError> {
        if value < Self::MIN || value > Self::MAX {
            return Err(RatingError::OutOfRange(value));
        }
        Ok(Self(value))
    }

    /// The rating value.
    #[must_use]
    pub const fn get(self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for RatingValue {
    type Error = RatingError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RatingValue> for Decimal {
    fn from(value: RatingValue) -> Self {
        value.0
    }
}

/// Aggregate rating state of one product.
///
/// `sum` is kept alongside the mean so repeated recomputation never drifts:
/// `rating` is `sum / num_reviews` rounded half away from zero to
/// [`RatingSummary::SCALE`] places (and `0` with no reviews). Storage that
/// computes the mean itself must round the same way, so the reported rating
/// and the one `minRating` filters on are the same number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RatingSummary {
    /// Arithmetic mean of all submitted ratings.
    pub rating: Decimal,
    /// Number of submitted ratings.
    pub num_reviews: u32,
    /// Sum of all submitted ratings.
    #[serde(skip)]
    pub sum: Decimal,
}

impl RatingSummary {
    /// Decimal places kept in the mean.
    pub const SCALE: u32 = 10;

    /// Rebuild a summary from its stored sum and count.
    #[must_use]
    pub fn from_totals(sum: Decimal, num_reviews: u32) -> Self {
        let rating = if num_reviews == 0 {
            Decimal::ZERO
        } else {
            (sum / Decimal::from(num_reviews))
                .round_dp_with_strategy(Self::SCALE, RoundingStrategy::MidpointAwayFromZero)
                .normalize()
        };
        Self {
            rating,
            num_reviews,
            sum,
        }
    }

    /// The summary after one more rating has been submitted.
    ///
    /// Equivalent to `rating = (rating * n + value) / (n + 1)`, `n += 1`.
    #[must_use]
    pub fn record(self, value: RatingValue) -> Self {
        Self::from_totals(self.sum + value.get(), self.num_reviews.saturating_add(1))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn rating(v: i64) -> RatingValue {
        RatingValue::new(Decimal::from(v)).unwrap()
    }

    #[test]
    fn test_bounds_are_inclusive() {
        assert!(RatingValue::new(Decimal::ZERO).is_ok());
        assert!(RatingValue::new(Decimal::from(5)).is_ok());
        assert!(RatingValue::new("5.01".parse().unwrap()).is_err());
        assert!(RatingValue::new("-0.1".parse().unwrap()).is_err());
    }

    #[test]
    fn test_record_sequence_is_mean() {
        let summary = RatingSummary::default()
            .record(rating(4))
            .record(rating(5))
            .record(rating(3));
        assert_eq!(summary.num_reviews, 3);
        assert_eq!(summary.rating, Decimal::from(4));
    }

    #[test]
    fn test_record_matches_incremental_formula() {
        let before = RatingSummary::from_totals(Decimal::from(9), 2);
        let after = before.record(rating(3));
        let expected =
            (before.rating * Decimal::from(before.num_reviews) + Decimal::from(3)) / Decimal::from(3);
        assert_eq!(after.rating, expected.normalize());
    }

    #[test]
    fn test_repeating_mean_is_rounded_to_scale() {
        let summary = RatingSummary::default()
            .record(rating(4))
            .record(rating(4))
            .record(rating(5));
        assert_eq!(summary.rating, "4.3333333333".parse::<Decimal>().unwrap());

        let summary = RatingSummary::from_totals(Decimal::from(14), 3);
        assert_eq!(summary.rating, "4.6666666667".parse::<Decimal>().unwrap());
    }

    #[test]
    fn test_empty_summary_is_zero() {
        let summary = RatingSummary::from_totals(Decimal::ZERO, 0);
        assert_eq!(summary.rating, Decimal::ZERO);
    }

    #[test]
    fn test_fractional_ratings() {
        let summary = RatingSummary::default()
            .record(RatingValue::new("4.5".parse().unwrap()).unwrap())
            .record(RatingValue::new("3.5".parse().unwrap()).unwrap());
        assert_eq!(summary.rating, Decimal::from(4));
    }
}
