use crate::api::*;
use crate::db::{NewPrize, DB};
use crate::orchestrator::{SpinObserver, SpinOrchestrator, SpinOutcome, SpinStart};
use crate::rate_limit::{RateLimited, RateLimiter};
use crate::selector::{total_weight, RngSource, SpinError};
use crate::settings::Settings;
use crate::wheel::WheelGeometry;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use log::{debug, error, trace};
use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;

pub const MIN_RATING: Rating = 1;
pub const MAX_RATING: Rating = 5;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Rating must be between 1 and 5 but was {0}")]
    InvalidRating(i64),
    #[error("Invalid prize: {0}")]
    InvalidPrize(String),
    #[error("Invalid wheel: {0}")]
    InvalidWheel(String),
    #[error("Wheel {0} doesn't exist")]
    UnknownWheel(RowId),
    #[error("Prize {0} doesn't exist")]
    UnknownPrize(RowId),
    #[error("No spin with redemption code {0}")]
    UnknownCode(RedemptionCode),
    #[error("Prize for code {0} was already redeemed")]
    AlreadyRedeemed(RedemptionCode),
    #[error("The wheel is already spinning")]
    AlreadySpinning,
    #[error(transparent)]
    RateLimited(#[from] RateLimited),
    #[error(transparent)]
    Spin(#[from] SpinError),
}

/// Everything about a spin request that is only stored once the wheel stops.
#[derive(Debug)]
pub struct PendingSpin {
    wheel: RowId,
    customer: String,
    rating: Rating,
    comment: Option<String>,
    code: RedemptionCode,
}

/// Persists completed spins.
pub struct SpinRecorder {
    db: Arc<Box<dyn DB + Send + Sync>>,
}
#[async_trait]
impl SpinObserver for SpinRecorder {
    type Context = PendingSpin;

    fn celebrate(&self, outcome: &SpinOutcome) {
        debug!("Confetti for {} on wheel segment {}", outcome.prize.name, outcome.index);
    }
    async fn spin_completed(&self, outcome: SpinOutcome, pending: PendingSpin) {
        let code = pending.code.clone();
        let record = SpinRecord {
            code: pending.code,
            wheel: pending.wheel,
            prize: outcome.prize.id,
            prize_name: outcome.prize.name,
            customer: pending.customer,
            rating: pending.rating,
            comment: pending.comment,
            created_at: Utc::now(),
            state: RedemptionState::Open,
        };
        match self.db.record_spin(record).await {
            Ok(()) => debug!("Recorded spin {}", code),
            Err(e) => error!("Couldn't record spin {}: {:#}", code, e),
        }
    }
}

type Wheel = Arc<Mutex<SpinOrchestrator<SpinRecorder>>>;

pub struct StarSpin {
    db: Arc<Box<dyn DB + Send + Sync>>,
    recorder: Arc<SpinRecorder>,
    geometry: WheelGeometry,
    spin_duration: Duration,
    redemption_code_len: usize,
    limiter: Mutex<RateLimiter>,
    wheels: Mutex<HashMap<RowId, Wheel>>,
}
impl StarSpin {
    pub fn new(db: Box<dyn DB + Send + Sync>, settings: &Settings) -> Self {
        let db = Arc::new(db);
        Self {
            recorder: Arc::new(SpinRecorder { db: db.clone() }),
            db,
            geometry: WheelGeometry::new(settings.extra_turns),
            spin_duration: Duration::from_millis(settings.spin_duration_ms),
            redemption_code_len: settings.redemption_code_len,
            limiter: Mutex::new(RateLimiter::new(
                settings.rate_limit.max_requests,
                chrono::Duration::seconds(settings.rate_limit.window_sec),
            )),
            wheels: Mutex::new(HashMap::new()),
        }
    }
    pub async fn new_wheel(&self, name: String) -> Result<RowId> {
        if name.trim().is_empty() {
            return Err(ServiceError::InvalidWheel("name is empty".to_string()).into());
        }
        self.db.add_wheel(name).await
    }
    pub async fn get_wheels(&self) -> Result<Vec<WheelResponse>> {
        let mut wheels = vec![];
        for (id, name) in self.db.get_wheels().await? {
            let prizes = self.db.get_prizes(id).await?;
            wheels.push(WheelResponse { id, name, prizes });
        }
        Ok(wheels)
    }
    pub async fn get_wheel(&self, wheel: RowId) -> Result<WheelResponse> {
        let name = self.wheel_name(wheel).await?;
        let prizes = self
            .db
            .get_prizes(wheel)
            .await
            .context("couldn't get prizes")?;
        Ok(WheelResponse {
            id: wheel,
            name,
            prizes,
        })
    }
    pub async fn add_prize(&self, request: AddPrizeRequest) -> Result<RowId> {
        check_prize(&request.name, request.weight, &request.color)?;
        self.wheel_name(request.wheel).await?;
        self.db
            .add_prize(
                request.wheel,
                NewPrize {
                    name: request.name,
                    weight: request.weight,
                    color: request.color,
                    probability_label: request.probability_label,
                },
            )
            .await
    }
    /// Changes only the fields that are set. Spins already running keep the
    /// prize as it was when they started.
    pub async fn update_prize(&self, request: UpdatePrizeRequest) -> Result<()> {
        let mut prize = self
            .db
            .get_prize(request.prize)
            .await
            .context("couldn't look up prize")?
            .ok_or(ServiceError::UnknownPrize(request.prize))?;
        if let Some(name) = request.name {
            prize.name = name;
        }
        if let Some(weight) = request.weight {
            prize.weight = weight;
        }
        if let Some(color) = request.color {
            prize.color = color;
        }
        if request.probability_label.is_some() {
            prize.probability_label = request.probability_label;
        }
        check_prize(&prize.name, prize.weight, &prize.color)?;
        self.db.update_prize(prize).await
    }
    pub async fn remove_prize(&self, prize: RowId) -> Result<()> {
        if !self
            .db
            .remove_prize(prize)
            .await
            .context("couldn't remove prize")?
        {
            return Err(ServiceError::UnknownPrize(prize).into());
        }
        Ok(())
    }
    /// Validates the request and starts a spin. The spin is recorded under the
    /// returned redemption code once the wheel has stopped.
    pub async fn spin(&self, request: SpinRequest) -> Result<SpinResponse> {
        let rating = Rating::try_from(request.rating)
            .ok()
            .filter(|rating| (MIN_RATING..=MAX_RATING).contains(rating))
            .ok_or(ServiceError::InvalidRating(request.rating))?;
        let WheelResponse { prizes, .. } = self.get_wheel(request.wheel).await?;
        total_weight(&prizes).map_err(ServiceError::from)?;
        let remaining = self
            .limiter
            .lock()
            .await
            .hit(&request.customer)
            .map_err(ServiceError::from)?;
        trace!("{} has {} spins left", request.customer, remaining);

        let code = redemption_code(self.redemption_code_len);
        let pending = PendingSpin {
            wheel: request.wheel,
            customer: request.customer,
            rating,
            comment: request.comment,
            code: code.clone(),
        };
        let wheel = self.wheel(request.wheel).await;
        let mut random = RngSource(StdRng::from_entropy());
        let start = wheel
            .lock()
            .await
            .start_spin(&prizes, &mut random, pending)
            .await
            .map_err(ServiceError::from)?;
        match start {
            SpinStart::Started(ticket) => Ok(SpinResponse {
                prize: ticket.outcome.prize,
                segment: ticket.outcome.index,
                rotation: ticket.rotation,
                duration_ms: ticket.duration.as_millis() as u64,
                code,
            }),
            SpinStart::AlreadySpinning => Err(ServiceError::AlreadySpinning.into()),
        }
    }
    pub async fn get_spin(&self, code: RedemptionCode) -> Result<SpinRecord> {
        let spin = self
            .db
            .get_spin(&code)
            .await
            .context("couldn't look up spin")?;
        Ok(spin.ok_or(ServiceError::UnknownCode(code))?)
    }
    pub async fn redeem(&self, code: RedemptionCode) -> Result<()> {
        let spin = self.get_spin(code.clone()).await?;
        if spin.state == RedemptionState::Redeemed {
            return Err(ServiceError::AlreadyRedeemed(code).into());
        }
        self.db
            .set_redemption_state(&code, RedemptionState::Redeemed)
            .await?;
        debug!("Redeemed {} for {}", spin.prize_name, spin.customer);
        Ok(())
    }
    pub async fn get_stats(&self, wheel: RowId) -> Result<WheelStats> {
        self.wheel_name(wheel).await?;
        self.db.get_stats(wheel).await
    }
    /// Cancels every running spin. Cancelled spins are never recorded.
    pub async fn shutdown(&self) {
        let wheels = self.wheels.lock().await;
        for (id, wheel) in wheels.iter() {
            if wheel.lock().await.cancel().await {
                debug!("Cancelled running spin on wheel {}", id);
            }
        }
    }
    async fn wheel_name(&self, wheel: RowId) -> Result<String> {
        let name = self
            .db
            .get_wheel_name(wheel)
            .await
            .context("couldn't look up wheel")?;
        Ok(name.ok_or(ServiceError::UnknownWheel(wheel))?)
    }
    async fn wheel(&self, wheel: RowId) -> Wheel {
        self.wheels
            .lock()
            .await
            .entry(wheel)
            .or_insert_with(|| {
                Arc::new(Mutex::new(SpinOrchestrator::new(
                    self.recorder.clone(),
                    self.geometry,
                    self.spin_duration,
                )))
            })
            .clone()
    }
}

fn check_prize(name: &str, weight: f64, color: &str) -> Result<(), ServiceError> {
    if name.trim().is_empty() {
        return Err(ServiceError::InvalidPrize("name is empty".to_string()));
    }
    if !weight.is_finite() || weight < 0.0 {
        return Err(ServiceError::InvalidPrize(format!(
            "weight must be a non-negative number but was {}",
            weight
        )));
    }
    let hex = color.strip_prefix('#').unwrap_or("");
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ServiceError::InvalidPrize(format!(
            "color must look like #rrggbb but was {}",
            color
        )));
    }
    Ok(())
}

fn redemption_code(len: usize) -> RedemptionCode {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect::<String>()
        .to_uppercase()
}
