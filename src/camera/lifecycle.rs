use tokio_util::sync::CancellationToken;
use tracing::info;

/// Host lifecycle owner. Camera bindings made against it are released when it is destroyed.
#[derive(Debug, Clone, Default)]
pub struct Lifecycle {
    token: CancellationToken,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// End the lifecycle
    pub fn destroy(&self) {
        if !self.token.is_cancelled() {
            info!("Lifecycle destroyed");
            self.token.cancel();
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the lifecycle is destroyed
    pub async fn destroyed(&self) {
        self.token.cancelled().await
    }
}
