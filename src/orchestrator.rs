use crate::api::Prize;
use crate::selector::{select, RandomSource, SpinError};
use crate::wheel::WheelGeometry;
use async_trait::async_trait;
use log::{debug, trace};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

pub const DEFAULT_SPIN_DURATION: Duration = Duration::from_millis(4000);

#[derive(Debug, Clone, PartialEq)]
pub struct SpinOutcome {
    /// Position of the prize in the list the spin was started with.
    pub index: usize,
    pub prize: Prize,
}
#[derive(Debug, Clone, PartialEq)]
pub struct SpinTicket {
    pub spin: u64,
    pub outcome: SpinOutcome,
    pub rotation: f64,
    pub duration: Duration,
}
#[derive(Debug, Clone, PartialEq)]
pub enum SpinStart {
    Started(SpinTicket),
    /// A spin was already in flight, the request was ignored.
    AlreadySpinning,
}

/// Receives the result of every spin that runs to completion.
#[async_trait]
pub trait SpinObserver: Send + Sync + 'static {
    /// Data handed to `start_spin` and given back on completion.
    type Context: Send + 'static;

    fn celebrate(&self, _outcome: &SpinOutcome) {}
    async fn spin_completed(&self, outcome: SpinOutcome, context: Self::Context);
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum SpinPhase {
    Idle,
    Spinning { spin: u64 },
}
#[derive(Debug)]
struct WheelState {
    rotation: f64,
    phase: SpinPhase,
    spins: u64,
}

/// Runs spins on one wheel: Idle -> Spinning -> Idle.
///
/// The outcome is chosen when the spin starts and the rotation is derived
/// from it. Completion is a timer task; the observer is told about the
/// outcome once the timer elapses, unless the spin was cancelled first.
pub struct SpinOrchestrator<O: SpinObserver> {
    geometry: WheelGeometry,
    duration: Duration,
    state: Arc<Mutex<WheelState>>,
    observer: Arc<O>,
    timer: Option<JoinHandle<()>>,
}
impl<O: SpinObserver> SpinOrchestrator<O> {
    pub fn new(observer: Arc<O>, geometry: WheelGeometry, duration: Duration) -> Self {
        Self {
            geometry,
            duration,
            state: Arc::new(Mutex::new(WheelState {
                rotation: 0.0,
                phase: SpinPhase::Idle,
                spins: 0,
            })),
            observer,
            timer: None,
        }
    }
    #[cfg(test)]
    pub async fn rotation(&self) -> f64 {
        self.state.lock().await.rotation
    }
    #[cfg(test)]
    pub async fn is_spinning(&self) -> bool {
        matches!(self.state.lock().await.phase, SpinPhase::Spinning { .. })
    }
    #[cfg(test)]
    pub fn is_scheduled(&self) -> bool {
        self.timer
            .as_ref()
            .map_or(false, |timer| !timer.is_finished())
    }
    pub async fn start_spin(
        &mut self,
        prizes: &[Prize],
        random: &mut impl RandomSource,
        context: O::Context,
    ) -> Result<SpinStart, SpinError> {
        let mut state = self.state.lock().await;
        if let SpinPhase::Spinning { spin } = state.phase {
            debug!("Spin {} is still running, ignoring start request", spin);
            return Ok(SpinStart::AlreadySpinning);
        }
        let (index, prize) = select(prizes, random)?;
        let rotation = self
            .geometry
            .target_rotation(index, prizes.len(), state.rotation)?;
        state.spins += 1;
        let spin = state.spins;
        state.rotation = rotation;
        state.phase = SpinPhase::Spinning { spin };
        drop(state);

        let outcome = SpinOutcome {
            index,
            prize: prize.clone(),
        };
        debug!(
            "Spin {} started: segment {} ({}) of {}, rotating to {}",
            spin,
            index,
            prize.name,
            prizes.len(),
            rotation
        );
        self.timer = Some(tokio::spawn(finish_spin(
            self.state.clone(),
            self.observer.clone(),
            spin,
            outcome.clone(),
            context,
            Instant::now() + self.duration,
        )));
        Ok(SpinStart::Started(SpinTicket {
            spin,
            outcome,
            rotation,
            duration: self.duration,
        }))
    }
    /// Stops the running spin without completing it. Returns whether a spin
    /// was cancelled.
    pub async fn cancel(&mut self) -> bool {
        let cancelled = {
            let mut state = self.state.lock().await;
            match state.phase {
                SpinPhase::Spinning { spin } => {
                    debug!("Cancelling spin {}", spin);
                    state.phase = SpinPhase::Idle;
                    true
                }
                SpinPhase::Idle => false,
            }
        };
        if let Some(timer) = self.timer.take() {
            // an uncancelled timer is already past its check and completing
            if cancelled {
                timer.abort();
            }
        }
        cancelled
    }
}
impl<O: SpinObserver> Drop for SpinOrchestrator<O> {
    fn drop(&mut self) {
        let Some(timer) = self.timer.take() else {
            return;
        };
        match self.state.try_lock() {
            Ok(mut state) => {
                if let SpinPhase::Spinning { spin } = state.phase {
                    trace!("Dropping orchestrator during spin {}", spin);
                    state.phase = SpinPhase::Idle;
                    timer.abort();
                }
            }
            Err(_) => timer.abort(),
        }
    }
}

async fn finish_spin<O: SpinObserver>(
    state: Arc<Mutex<WheelState>>,
    observer: Arc<O>,
    spin: u64,
    outcome: SpinOutcome,
    context: O::Context,
    deadline: Instant,
) {
    tokio::time::sleep_until(deadline).await;
    {
        let mut state = state.lock().await;
        if state.phase != (SpinPhase::Spinning { spin }) {
            trace!("Spin {} was cancelled before it finished", spin);
            return;
        }
        state.phase = SpinPhase::Idle;
    }
    debug!("Spin {} finished on {}", spin, outcome.prize.name);
    observer.celebrate(&outcome);
    observer.spin_completed(outcome, context).await;
}
