use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type RowId = i64;
pub type RedemptionCode = String;
pub type Rating = u8;

/// One weighted reward option on a wheel.
///
/// `weight` is relative: the weights of a wheel need not sum to 1.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Prize {
    pub id: RowId,
    pub name: String,
    pub weight: f64,
    pub color: String,
    /// Probability text the merchant shows next to the prize, e.g. "1 in 10".
    pub probability_label: Option<String>,
}
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpinRecord {
    pub code: RedemptionCode,
    pub wheel: RowId,
    pub prize: RowId,
    pub prize_name: String,
    pub customer: String,
    pub rating: Rating,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub state: RedemptionState,
}
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RedemptionState {
    Open,
    Redeemed,
}
