//! Cancellation and deadline for a rotation.
//!
//! One [`Cancellation`] is threaded through a whole pool rotation. Each
//! remote call is raced against the shutdown signal and the deadline; the
//! loser is dropped and the step fails with [`Interrupted`].

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::error::{Interrupted, Step, StepFailure};

/// Shutdown signal plus optional deadline.
#[derive(Debug, Clone)]
pub struct Cancellation {
    shutdown: watch::Receiver<bool>,
    deadline: Option<Instant>,
}

impl Cancellation {
    /// A signal that never fires.
    pub fn none() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self {
            shutdown: rx,
            deadline: None,
        }
    }

    /// Cancel when `true` is sent on the shutdown channel.
    pub fn from_shutdown(shutdown: watch::Receiver<bool>) -> Self {
        Self {
            shutdown,
            deadline: None,
        }
    }

    /// Also give up once `timeout` has elapsed from now.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Returns the interruption in effect right now, if any.
    pub fn check(&self) -> Option<Interrupted> {
        if *self.shutdown.borrow() {
            return Some(Interrupted::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(Interrupted::DeadlineExceeded),
            _ => None,
        }
    }

    /// Run a remote call for `step`, abandoning it on cancellation.
    pub async fn run<T, F>(&self, step: Step, call: F) -> Result<T, StepFailure>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        if let Some(reason) = self.check() {
            return Err(StepFailure::new(step, reason));
        }

        let mut shutdown = self.shutdown.clone();
        tokio::select! {
            result = call => result.map_err(|e| StepFailure::new(step, e)),
            _ = shutdown_requested(&mut shutdown) => {
                Err(StepFailure::new(step, Interrupted::Cancelled))
            }
            _ = deadline_reached(self.deadline) => {
                Err(StepFailure::new(step, Interrupted::DeadlineExceeded))
            }
        }
    }

    /// Sleep for `duration` unless interrupted first.
    pub async fn sleep(&self, step: Step, duration: Duration) -> Result<(), StepFailure> {
        self.run(step, async {
            tokio::time::sleep(duration).await;
            Ok(())
        })
        .await
    }
}

impl Default for Cancellation {
    fn default() -> Self {
        Self::none()
    }
}

async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            // Sender gone: shutdown can no longer be requested.
            std::future::pending::<()>().await;
        }
    }
}

async fn deadline_reached(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_none_never_interrupts() {
        let cancel = Cancellation::none();
        let value = cancel.run(Step::ListVMs, async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_already_cancelled_skips_call() {
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();
        let cancel = Cancellation::from_shutdown(rx);
        let ran = std::sync::atomic::AtomicBool::new(false);

        let err = cancel
            .run(Step::Drain, async {
                ran.store(true, std::sync::atomic::Ordering::SeqCst);
                Ok(())
            })
            .await
            .unwrap_err();
        assert_eq!(err.step, Step::Drain);
        assert!(err.is_interrupted());
        assert!(!ran.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_shutdown_abandons_pending_call() {
        let (tx, rx) = watch::channel(false);
        let cancel = Cancellation::from_shutdown(rx);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let _ = tx.send(true);
        });

        let err = cancel
            .run(Step::Reimage, std::future::pending::<anyhow::Result<()>>())
            .await
            .unwrap_err();
        assert_eq!(err.step, Step::Reimage);
        assert_eq!(
            err.cause.downcast_ref::<Interrupted>(),
            Some(&Interrupted::Cancelled)
        );
    }

    #[tokio::test]
    async fn test_deadline_abandons_pending_call() {
        let cancel = Cancellation::none().with_timeout(Duration::from_millis(20));

        let err = cancel
            .run(Step::Start, std::future::pending::<anyhow::Result<()>>())
            .await
            .unwrap_err();
        assert_eq!(
            err.cause.downcast_ref::<Interrupted>(),
            Some(&Interrupted::DeadlineExceeded)
        );
    }

    #[tokio::test]
    async fn test_remote_error_keeps_step() {
        let err = Cancellation::none()
            .run(Step::Deallocate, async {
                Err::<(), _>(anyhow::anyhow!("conflict"))
            })
            .await
            .unwrap_err();
        assert_eq!(err.step, Step::Deallocate);
        assert!(!err.is_interrupted());
    }
}
