//! Periodic health check of the generation server
//!
//! The poller owns the only writer of the availability signal. Everyone else
//! holds a `watch::Receiver` and reads the latest value when they need it.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::ai::ModelLister;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Availability {
    #[default]
    Checking,
    /// At least one model is listed; `model` is the first one
    Available { model: String },
    Unavailable,
}

impl Availability {
    pub fn is_available(&self) -> bool {
        matches!(self, Availability::Available { .. })
    }

    pub fn model(&self) -> Option<&str> {
        match self {
            Availability::Available { model } => Some(model),
            _ => None,
        }
    }

    pub fn label(&self) -> String {
        match self {
            Availability::Checking => "Checking Ollama connection...".to_string(),
            Availability::Available { model } => format!("Ollama AI connected ({})", model),
            Availability::Unavailable => "Ollama AI disconnected - using fallback mode".to_string(),
        }
    }
}

/// Query the model listing once and classify the result
pub async fn check_once(lister: &dyn ModelLister) -> Availability {
    match lister.list_models().await {
        Ok(models) => match models.into_iter().next() {
            Some(model) => Availability::Available { model },
            None => Availability::Unavailable,
        },
        Err(e) => {
            debug!(error = %e, "model listing failed");
            Availability::Unavailable
        }
    }
}

pub struct AvailabilityPoller;

impl AvailabilityPoller {
    /// Check immediately, then again `interval` after each check completes,
    /// however long the check took. The task stops once all receivers are gone.
    pub fn spawn(lister: Arc<dyn ModelLister>, interval: Duration) -> watch::Receiver<Availability> {
        let (tx, rx) = watch::channel(Availability::Checking);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let next = check_once(lister.as_ref()).await;
                // A slow check must not leave overdue ticks behind
                ticker.reset();

                if *tx.borrow() != next {
                    info!(status = %next.label(), "generation availability changed");
                }
                if tx.send(next).is_err() {
                    break;
                }
            }
        });

        rx
    }
}
