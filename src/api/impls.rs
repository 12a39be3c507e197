use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};

use anyhow::bail;

use super::*;

impl Display for RedemptionState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let output = match self {
            Self::Open => "Open",
            Self::Redeemed => "Redeemed",
        };
        write!(f, "{}", output)
    }
}
impl FromStr for RedemptionState {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Open" => Ok(Self::Open),
            "Redeemed" => Ok(Self::Redeemed),
            e => bail!("Couldn't deserialize to RedemptionState: {}", e),
        }
    }
}
impl Default for RedemptionState {
    fn default() -> Self {
        RedemptionState::Open
    }
}
