use crate::api::*;
use crate::db::SQLite;
use crate::settings::{Settings, DEFAULT_CONFIG_FILE};
use crate::starspin::{ServiceError, StarSpin};
use anyhow::Result;
use axum::extract::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use axum_macros::debug_handler;
use clap::Parser;
use env_logger::{Builder, WriteStyle};
use log::{debug, error, trace};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

mod api;
#[cfg(test)]
mod client;
mod db;
mod orchestrator;
mod rate_limit;
mod selector;
mod settings;
mod starspin;
mod wheel;

#[debug_handler]
async fn new_wheel(
    State(state): State<Arc<RwLock<StarSpin>>>,
    Json(request): Json<NewWheelRequest>,
) -> Result<(StatusCode, Json<RowId>), (StatusCode, String)> {
    let backend = state.write().await;
    let id = backend
        .new_wheel(request.name.clone())
        .await
        .map_err(map_any_err_and_code)?;
    debug!("Created wheel {}: {}", id, request.name);
    Ok((StatusCode::CREATED, id.into()))
}
async fn get_wheels(
    State(state): State<Arc<RwLock<StarSpin>>>,
) -> Result<Json<Vec<WheelResponse>>, (StatusCode, String)> {
    let backend = state.read().await;
    let wheels = backend.get_wheels().await.map_err(map_any_err_and_code)?;
    Ok(Json(wheels))
}
async fn get_wheel(
    State(state): State<Arc<RwLock<StarSpin>>>,
    Json(request): Json<WheelRequest>,
) -> Result<Json<WheelResponse>, (StatusCode, String)> {
    let backend = state.read().await;
    let wheel = backend
        .get_wheel(request.wheel)
        .await
        .map_err(map_any_err_and_code)?;
    Ok(Json(wheel))
}
#[debug_handler]
async fn add_prize(
    State(state): State<Arc<RwLock<StarSpin>>>,
    Json(request): Json<AddPrizeRequest>,
) -> Result<(StatusCode, Json<RowId>), (StatusCode, String)> {
    let backend = state.write().await;
    debug!(
        "Adding prize {} with weight {} to wheel {}",
        request.name, request.weight, request.wheel
    );
    let id = backend
        .add_prize(request)
        .await
        .map_err(map_any_err_and_code)?;
    Ok((StatusCode::CREATED, id.into()))
}
async fn update_prize(
    State(state): State<Arc<RwLock<StarSpin>>>,
    Json(request): Json<UpdatePrizeRequest>,
) -> Result<(), (StatusCode, String)> {
    let backend = state.write().await;
    debug!("Updating prize {}", request.prize);
    backend
        .update_prize(request)
        .await
        .map_err(map_any_err_and_code)?;
    Ok(())
}
async fn remove_prize(
    State(state): State<Arc<RwLock<StarSpin>>>,
    Json(request): Json<PrizeRequest>,
) -> Result<(), (StatusCode, String)> {
    let backend = state.write().await;
    backend
        .remove_prize(request.prize)
        .await
        .map_err(map_any_err_and_code)?;
    debug!("Removed prize {}", request.prize);
    Ok(())
}
#[debug_handler]
async fn spin(
    State(state): State<Arc<RwLock<StarSpin>>>,
    Json(request): Json<SpinRequest>,
) -> Result<Json<SpinResponse>, (StatusCode, String)> {
    // spins on different wheels run side by side, the service serializes per wheel
    let backend = state.read().await;
    trace!("Spin request from {} on wheel {}", request.customer, request.wheel);
    let response = backend.spin(request).await.map_err(map_any_err_and_code)?;
    debug!(
        "Spinning to {} for {}, landing on {}",
        response.rotation, response.code, response.prize.name
    );
    Ok(Json(response))
}
async fn get_spin(
    State(state): State<Arc<RwLock<StarSpin>>>,
    Json(request): Json<RedemptionRequest>,
) -> Result<Json<SpinRecord>, (StatusCode, String)> {
    let backend = state.read().await;
    let spin = backend
        .get_spin(request.code)
        .await
        .map_err(map_any_err_and_code)?;
    Ok(Json(spin))
}
async fn redeem(
    State(state): State<Arc<RwLock<StarSpin>>>,
    Json(request): Json<RedemptionRequest>,
) -> Result<(), (StatusCode, String)> {
    let backend = state.write().await;
    backend
        .redeem(request.code.clone())
        .await
        .map_err(map_any_err_and_code)?;
    debug!("Redeemed code {}", request.code);
    Ok(())
}
async fn get_stats(
    State(state): State<Arc<RwLock<StarSpin>>>,
    Json(request): Json<WheelRequest>,
) -> Result<Json<WheelStats>, (StatusCode, String)> {
    let backend = state.read().await;
    let stats = backend
        .get_stats(request.wheel)
        .await
        .map_err(map_any_err_and_code)?;
    Ok(Json(stats))
}

fn map_any_err_and_code(e: anyhow::Error) -> (StatusCode, String) {
    debug!("Error: {:#}", e);
    let code = match e.downcast_ref::<ServiceError>() {
        Some(
            ServiceError::InvalidRating(_)
            | ServiceError::InvalidPrize(_)
            | ServiceError::InvalidWheel(_)
            | ServiceError::Spin(_),
        ) => StatusCode::BAD_REQUEST,
        Some(
            ServiceError::UnknownWheel(_)
            | ServiceError::UnknownPrize(_)
            | ServiceError::UnknownCode(_),
        ) => StatusCode::NOT_FOUND,
        Some(ServiceError::AlreadySpinning | ServiceError::AlreadyRedeemed(_)) => {
            StatusCode::CONFLICT
        }
        Some(ServiceError::RateLimited(_)) => StatusCode::TOO_MANY_REQUESTS,
        None => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (code, format!("{:#}", e))
}

#[derive(Parser)]
struct Args {
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: String,
    #[arg(short, long)]
    port: Option<u16>,
    #[arg(short, long)]
    db: Option<String>,
}

impl Args {
    /// Flags given on the command line win over the configuration.
    fn apply(self, settings: &mut Settings) {
        if let Some(port) = self.port {
            settings.port = port;
        }
        if self.db.is_some() {
            settings.db = self.db;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Args::parse();
    let mut settings = Settings::load(&cli.config)?;
    cli.apply(&mut settings);
    Builder::default()
        .filter_level(settings.log_level()?)
        .write_style(WriteStyle::Always)
        .init();
    let (_port, handle) = run_server(settings).await?;
    handle.await?;
    Ok(())
}

async fn run_server(settings: Settings) -> Result<(u16, JoinHandle<()>)> {
    let state = Arc::new(RwLock::new(StarSpin::new(
        Box::new(SQLite::new(settings.db.clone()).await?),
        &settings,
    )));
    let app = Router::new()
        .route("/new_wheel", post(new_wheel))
        .route("/get_wheels", get(get_wheels))
        .route("/get_wheel", post(get_wheel))
        .route("/add_prize", post(add_prize))
        .route("/update_prize", post(update_prize))
        .route("/remove_prize", post(remove_prize))
        .route("/spin", post(spin))
        .route("/get_spin", post(get_spin))
        .route("/redeem", post(redeem))
        .route("/get_stats", post(get_stats))
        .with_state(state.clone());

    let addr = "127.0.0.1:".to_string() + settings.port.to_string().as_str();
    let server = axum::Server::try_bind(&addr.parse()?)?.serve(app.into_make_service());
    let port = server.local_addr().port();
    debug!("Listening on {}", server.local_addr());
    let server = server.with_graceful_shutdown(async {
        tokio::signal::ctrl_c().await.ok();
    });
    let handle = tokio::spawn(async move {
        if let Err(e) = server.await {
            error!("Server stopped: {}", e);
        }
        state.read().await.shutdown().await;
        debug!("Shut down");
    });
    Ok((port, handle))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::client::Client;
    use std::time::Duration;

    const SPIN_MILLIS: u64 = 300;

    async fn start() -> Client {
        let mut settings = Settings::default();
        settings.port = 0;
        settings.spin_duration_ms = SPIN_MILLIS;
        settings.rate_limit.max_requests = 3;
        let (port, _) = run_server(settings).await.unwrap();
        Client::new("http://127.0.0.1:".to_string() + port.to_string().as_str())
    }
    fn spin_request(wheel: RowId, customer: &str) -> SpinRequest {
        SpinRequest {
            wheel,
            customer: customer.to_string(),
            rating: 5,
            comment: None,
        }
    }

    #[tokio::test]
    async fn manage_wheel() {
        let client = start().await;
        client.get_wheel(1).await.unwrap_err();

        let wheel = client.new_wheel("Cafe".to_string()).await.unwrap();
        let coffee = client
            .add_prize(AddPrizeRequest {
                wheel,
                name: "Coffee".to_string(),
                weight: 1.0,
                color: "#6f4e37".to_string(),
                probability_label: Some("1 in 2".to_string()),
            })
            .await
            .unwrap();
        let err = client
            .add_prize(AddPrizeRequest {
                wheel,
                name: "Debt".to_string(),
                weight: -1.0,
                color: "#000000".to_string(),
                probability_label: None,
            })
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("400"), "{}", err);

        client
            .update_prize(UpdatePrizeRequest {
                prize: coffee,
                name: Some("Espresso".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        let response = client.get_wheel(wheel).await.unwrap();
        assert_eq!(
            response,
            WheelResponse {
                id: wheel,
                name: "Cafe".to_string(),
                prizes: vec![Prize {
                    id: coffee,
                    name: "Espresso".to_string(),
                    weight: 1.0,
                    color: "#6f4e37".to_string(),
                    probability_label: Some("1 in 2".to_string()),
                }],
            }
        );
        assert_eq!(client.get_wheels().await.unwrap(), vec![response]);

        client.remove_prize(coffee).await.unwrap();
        let err = client.remove_prize(coffee).await.unwrap_err();
        assert!(err.to_string().starts_with("404"), "{}", err);
    }

    #[tokio::test]
    async fn spin_and_redeem() {
        let client = start().await;
        let wheel = client.new_wheel("Cafe".to_string()).await.unwrap();

        let err = client.spin(spin_request(wheel, "alice")).await.unwrap_err();
        assert!(err.to_string().starts_with("400"), "{}", err);
        let mut out_of_range = spin_request(wheel, "alice");
        out_of_range.rating = 300;
        let err = client.spin(out_of_range).await.unwrap_err();
        assert!(err.to_string().starts_with("400"), "{}", err);

        for (name, weight) in [("Coffee", 1.0), ("Nothing", 0.0), ("Cake", 0.0)] {
            client
                .add_prize(AddPrizeRequest {
                    wheel,
                    name: name.to_string(),
                    weight,
                    color: "#ffffff".to_string(),
                    probability_label: None,
                })
                .await
                .unwrap();
        }
        let response = client.spin(spin_request(wheel, "alice")).await.unwrap();
        assert_eq!(response.prize.name, "Coffee");
        assert_eq!(response.segment, 0);
        assert_eq!(response.duration_ms, SPIN_MILLIS);

        let err = client.spin(spin_request(wheel, "bob")).await.unwrap_err();
        assert!(err.to_string().starts_with("409"), "{}", err);

        tokio::time::sleep(Duration::from_millis(SPIN_MILLIS * 4)).await;
        let record = client.get_spin(response.code.clone()).await.unwrap();
        assert_eq!(record.prize_name, "Coffee");
        assert_eq!(record.state, RedemptionState::Open);

        client.redeem(response.code.clone()).await.unwrap();
        let err = client.redeem(response.code.clone()).await.unwrap_err();
        assert!(err.to_string().starts_with("409"), "{}", err);

        let stats = client.get_stats(wheel).await.unwrap();
        assert_eq!(stats.spins, 1);
        assert_eq!(stats.redeemed, 1);
        assert_eq!(stats.average_rating, Some(5.0));
    }

    #[tokio::test]
    async fn rate_limit() {
        let client = start().await;
        let wheel = client.new_wheel("Cafe".to_string()).await.unwrap();
        client
            .add_prize(AddPrizeRequest {
                wheel,
                name: "Coffee".to_string(),
                weight: 1.0,
                color: "#ffffff".to_string(),
                probability_label: None,
            })
            .await
            .unwrap();
        for _ in 0..3 {
            client.spin(spin_request(wheel, "carol")).await.unwrap();
            tokio::time::sleep(Duration::from_millis(SPIN_MILLIS * 2)).await;
        }
        let err = client.spin(spin_request(wheel, "carol")).await.unwrap_err();
        assert!(err.to_string().starts_with("429"), "{}", err);
    }

    #[test]
    fn status_codes() {
        let (code, message) = map_any_err_and_code(ServiceError::AlreadySpinning.into());
        assert_eq!(code, StatusCode::CONFLICT);
        assert_eq!(message, "The wheel is already spinning");
        let (code, _) = map_any_err_and_code(anyhow::anyhow!("disk full"));
        assert_eq!(code, StatusCode::INTERNAL_SERVER_ERROR);
        let (code, _) = map_any_err_and_code(
            ServiceError::Spin(crate::selector::SpinError::EmptyPrizeList).into(),
        );
        assert_eq!(code, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn store_failure_is_internal_error() {
        let db = SQLite::new(None).await.unwrap();
        db.close().await;
        let starspin = StarSpin::new(Box::new(db), &Settings::default());
        let (code, _) = map_any_err_and_code(starspin.get_wheel(1).await.unwrap_err());
        assert_eq!(code, StatusCode::INTERNAL_SERVER_ERROR);
        let (code, _) = map_any_err_and_code(starspin.remove_prize(1).await.unwrap_err());
        assert_eq!(code, StatusCode::INTERNAL_SERVER_ERROR);

        let db = SQLite::new(None).await.unwrap();
        let starspin = StarSpin::new(Box::new(db), &Settings::default());
        let (code, _) = map_any_err_and_code(starspin.get_wheel(1).await.unwrap_err());
        assert_eq!(code, StatusCode::NOT_FOUND);
    }

    #[test]
    fn flags_override_settings() {
        let mut settings = Settings::default();
        Args::parse_from(["server", "--port", "9100", "--db", "sqlite://wheels.db"])
            .apply(&mut settings);
        assert_eq!(settings.port, 9100);
        assert_eq!(settings.db, Some("sqlite://wheels.db".to_string()));

        let mut settings = Settings::default();
        Args::parse_from(["server"]).apply(&mut settings);
        assert_eq!(settings, Settings::default());
    }
}
