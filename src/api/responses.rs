use serde::{Deserialize, Serialize};

use super::*;

#[derive(PartialEq, Debug, Serialize, Deserialize, Clone)]
pub struct WheelResponse {
    pub id: RowId,
    pub name: String,
    pub prizes: Vec<Prize>,
}
#[derive(PartialEq, Debug, Serialize, Deserialize, Clone)]
pub struct SpinResponse {
    pub prize: Prize,
    /// Segment of the wheel the pointer comes to rest on.
    pub segment: usize,
    /// Cumulative rotation in degrees the wheel animates to.
    pub rotation: f64,
    pub duration_ms: u64,
    pub code: RedemptionCode,
}
#[derive(PartialEq, Debug, Serialize, Deserialize, Clone)]
pub struct PrizeCount {
    pub prize: RowId,
    pub name: String,
    pub spins: u64,
}
#[derive(PartialEq, Debug, Serialize, Deserialize, Clone)]
pub struct WheelStats {
    pub wheel: RowId,
    pub spins: u64,
    pub redeemed: u64,
    pub average_rating: Option<f64>,
    pub prizes: Vec<PrizeCount>,
}
