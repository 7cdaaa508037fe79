//! External termination signal for the acquisition loop.

use tokio::sync::watch;

/// Sending half; flipping it stops every [`Shutdown`] cloned from the same pair.
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    /// Request termination. Idempotent.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

/// Receiving half polled by the accumulator.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    /// Connected trigger/receiver pair.
    pub fn channel() -> (ShutdownTrigger, Shutdown) {
        let (tx, rx) = watch::channel(false);
        (ShutdownTrigger { tx }, Shutdown { rx })
    }

    /// A signal that never fires.
    pub fn never() -> Shutdown {
        Self::channel().1
    }

    /// Resolve when the trigger fires. Pends forever if the trigger was dropped unfired.
    pub async fn wait(&mut self) {
        let dropped = self.rx.wait_for(|stop| *stop).await.is_err();
        if dropped {
            std::future::pending::<()>().await;
        }
    }
}
