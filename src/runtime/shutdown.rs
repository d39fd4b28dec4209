use tokio::sync::watch;

/// Creates a connected shutdown signal and its receiver.
#[must_use]
pub fn channel() -> (Signal, Shutdown) {
    let (sender, receiver) = watch::channel(false);
    (Signal(sender), Shutdown(receiver))
}

pub struct Signal(watch::Sender<bool>);

impl Signal {
    pub fn trigger(&self) {
        self.0.send_replace(true);
    }

    #[must_use]
    pub fn subscribe(&self) -> Shutdown {
        Shutdown(self.0.subscribe())
    }
}

/// Dropping the [`Signal`] counts as a shutdown too.
#[derive(Clone)]
pub struct Shutdown(watch::Receiver<bool>);

impl Shutdown {
    /// Resolves once the shutdown is triggered.
    pub async fn triggered(&mut self) {
        while !*self.0.borrow_and_update() {
            if self.0.changed().await.is_err() {
                return;
            }
        }
    }
}
