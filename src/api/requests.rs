use serde::{Deserialize, Serialize};

use super::*;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct NewWheelRequest {
    pub name: String,
}
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct WheelRequest {
    pub wheel: RowId,
}
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AddPrizeRequest {
    pub wheel: RowId,
    pub name: String,
    pub weight: f64,
    pub color: String,
    pub probability_label: Option<String>,
}
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct UpdatePrizeRequest {
    pub prize: RowId,
    pub name: Option<String>,
    pub weight: Option<f64>,
    pub color: Option<String>,
    pub probability_label: Option<String>,
}
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PrizeRequest {
    pub prize: RowId,
}
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SpinRequest {
    pub wheel: RowId,
    /// Identifies the customer for rate limiting, e.g. a phone number.
    pub customer: String,
    /// Checked against 1-5 by the service.
    pub rating: i64,
    pub comment: Option<String>,
}
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RedemptionRequest {
    pub code: RedemptionCode,
}
