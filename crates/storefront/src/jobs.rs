//! Background sweepers for lapsed carts and reservations.
//!
//! Each sweeper runs on its own `tokio::time::interval` and stops when the
//! shutdown channel flips. A failed sweep is logged and retried on the next tick.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument};

use crate::db::{CartRepository, ProductRepository, RepositoryError};
use crate::state::AppState;

/// Handles of the spawned sweepers.
pub struct Sweepers {
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl Sweepers {
    /// Spawn both sweepers with the intervals from `JobsConfig`.
    #[must_use]
    pub fn spawn(state: &AppState) -> Self {
        let jobs = state.config().jobs;
        let (shutdown, rx) = watch::channel(false);

        let carts = {
            let state = state.clone();
            let rx = rx.clone();
            tokio::spawn(run_every(jobs.cart_sweep_interval, rx, move || {
                let state = state.clone();
                async move { sweep_carts(&state).await.map(|_| ()) }
            }))
        };
        let reservations = {
            let state = state.clone();
            tokio::spawn(run_every(jobs.reservation_sweep_interval, rx, move || {
                let state = state.clone();
                async move { sweep_reservations(&state).await.map(|_| ()) }
            }))
        };

        info!(
            cart_every = ?jobs.cart_sweep_interval,
            reservation_every = ?jobs.reservation_sweep_interval,
            "background sweepers started"
        );

        Self {
            shutdown,
            handles: vec![carts, reservations],
        }
    }

    /// Signal the sweepers and wait for them to finish their current tick.
    pub async fn shutdown(self) {
        // Receivers only go away once the tasks have ended.
        let _ = self.shutdown.send(true);
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!(error = %e, "sweeper task failed");
            }
        }
        info!("background sweepers stopped");
    }
}

/// Call `job` every `period` until `shutdown` becomes `true`.
pub async fn run_every<F, Fut>(period: Duration, mut shutdown: watch::Receiver<bool>, mut job: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), RepositoryError>>,
{
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = job().await {
                    error!(error = %e, "sweep failed");
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}

/// Delete cart rows whose hold lapsed. Returns how many were removed.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the delete fails.
#[instrument(skip_all)]
pub async fn sweep_carts(state: &AppState) -> Result<u64, RepositoryError> {
    let deleted = CartRepository::new(state.pool()).delete_expired().await?;
    if deleted > 0 {
        info!(deleted, "expired cart items removed");
    } else {
        debug!("no expired cart items");
    }
    Ok(deleted)
}

/// Clear lapsed reservations on unsold products. Returns how many were released.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
#[instrument(skip_all)]
pub async fn sweep_reservations(state: &AppState) -> Result<usize, RepositoryError> {
    let released = ProductRepository::new(state.pool()).release_expired().await?;
    if released.is_empty() {
        debug!("no expired reservations");
    } else {
        state.cache().invalidate_products(&released).await;
        info!(released = released.len(), "expired reservations released");
    }
    Ok(released.len())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_run_every_ticks_until_shutdown() {
        let runs = Arc::new(AtomicU32::new(0));
        let (tx, rx) = watch::channel(false);

        let counter = Arc::clone(&runs);
        let task = tokio::spawn(run_every(Duration::from_secs(60), rx, move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }));

        // First tick fires immediately, then one per period.
        tokio::time::sleep(Duration::from_secs(150)).await;
        tx.send(true).unwrap();
        task.await.unwrap();

        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_every_survives_failed_sweeps() {
        let runs = Arc::new(AtomicU32::new(0));
        let (tx, rx) = watch::channel(false);

        let counter = Arc::clone(&runs);
        let task = tokio::spawn(run_every(Duration::from_secs(10), rx, move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(RepositoryError::NotFound)
            }
        }));

        tokio::time::sleep(Duration::from_secs(25)).await;
        drop(tx);
        task.await.unwrap();

        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }
}
