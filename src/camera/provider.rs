use super::backend::{CameraBackend, CameraDevice};
use super::builder::CameraBackendBuilder;
use super::lifecycle::Lifecycle;
use super::types::{CameraInfo, LensFacing};
use super::use_cases::{ImageCapture, Preview};
use crate::config::CameraConfig;
use crate::error::CameraError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::{oneshot, Mutex, OnceCell};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// The binding currently attached to a lifecycle
struct ActiveBinding {
    id: u64,
    lens: LensFacing,
    device: Arc<dyn CameraDevice>,
    image_capture: ImageCapture,
    release: CancellationToken,
}

/// Process-wide camera provider. Binds one camera at a time to a lifecycle.
pub struct ProcessCameraProvider {
    backend: Arc<dyn CameraBackend>,
    binding: Mutex<Option<ActiveBinding>>,
    bind_counter: AtomicU64,
}

impl ProcessCameraProvider {
    pub fn new(backend: Arc<dyn CameraBackend>) -> Self {
        info!("Camera provider created with '{}' backend", backend.name());
        Self {
            backend,
            binding: Mutex::new(None),
            bind_counter: AtomicU64::new(0),
        }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Open the camera for `lens`, stream it into `preview` and attach `image_capture`.
    /// Fails with `AlreadyBound` while another binding is active.
    pub async fn bind_to_lifecycle(
        self: &Arc<Self>,
        lifecycle: &Lifecycle,
        lens: LensFacing,
        preview: &Preview,
        image_capture: &ImageCapture,
    ) -> Result<Camera, CameraError> {
        if lifecycle.is_destroyed() {
            return Err(CameraError::Configuration {
                details: "cannot bind a camera to a destroyed lifecycle".to_string(),
            });
        }

        // One binding at a time; callers unbind first
        let mut binding = self.binding.lock().await;
        if let Some(active) = binding.as_ref() {
            return Err(CameraError::AlreadyBound { lens: active.lens });
        }

        // Open, stream into the preview, then hand the device to capture
        info!("Binding {} camera", lens);
        let device = self.backend.open(lens).await?;
        device.start_streaming(preview.clone()).await?;
        image_capture.attach(Arc::clone(&device));

        let id = self.bind_counter.fetch_add(1, Ordering::Relaxed) + 1;
        let release = CancellationToken::new();
        *binding = Some(ActiveBinding {
            id,
            lens,
            device: Arc::clone(&device),
            image_capture: image_capture.clone(),
            release: release.clone(),
        });
        drop(binding);

        // Destroying the lifecycle releases this binding
        self.watch_lifecycle(lifecycle.clone(), id, release);

        info!("{} camera bound ({})", lens, device.info().name);
        Ok(Camera::new(device))
    }

    /// Release the active binding, if any
    pub async fn unbind_all(&self) -> Result<(), CameraError> {
        let active = self.binding.lock().await.take();
        match active {
            Some(active) => self.release(active).await,
            None => {
                debug!("unbind_all: nothing bound");
                Ok(())
            }
        }
    }

    pub async fn is_bound(&self) -> bool {
        self.binding.lock().await.is_some()
    }

    pub async fn bound_lens(&self) -> Option<LensFacing> {
        self.binding.lock().await.as_ref().map(|active| active.lens)
    }

    async fn release(&self, active: ActiveBinding) -> Result<(), CameraError> {
        info!("Unbinding {} camera", active.lens);
        active.release.cancel();
        active.image_capture.detach();
        active.device.stop_streaming().await
    }

    async fn release_binding(&self, id: u64) -> Result<(), CameraError> {
        let active = {
            let mut binding = self.binding.lock().await;
            match binding.as_ref() {
                Some(active) if active.id == id => binding.take(),
                _ => None,
            }
        };

        match active {
            Some(active) => self.release(active).await,
            None => Ok(()),
        }
    }

    fn watch_lifecycle(self: &Arc<Self>, lifecycle: Lifecycle, id: u64, release: CancellationToken) {
        let provider: Weak<Self> = Arc::downgrade(self);

        tokio::spawn(async move {
            tokio::select! {
                _ = lifecycle.destroyed() => {
                    if let Some(provider) = provider.upgrade() {
                        debug!("Lifecycle ended, releasing binding {}", id);
                        if let Err(e) = provider.release_binding(id).await {
                            warn!("Failed to release camera binding {}: {}", id, e);
                        }
                    }
                }
                _ = release.cancelled() => {}
            }
        });
    }
}

/// Handle to a bound camera
#[derive(Clone)]
pub struct Camera {
    device: Arc<dyn CameraDevice>,
}

impl Camera {
    fn new(device: Arc<dyn CameraDevice>) -> Self {
        Self { device }
    }

    pub fn info(&self) -> &CameraInfo {
        self.device.info()
    }

    pub fn has_flash_unit(&self) -> bool {
        self.device.info().has_flash_unit
    }

    pub async fn enable_torch(&self, enabled: bool) -> Result<(), CameraError> {
        if !self.has_flash_unit() {
            return Err(CameraError::Torch {
                details: format!("{} has no flash unit", self.info().name),
            });
        }

        self.device.set_torch(enabled).await
    }
}

/// Listener invoked once the provider resolves
pub type ProviderListener =
    Box<dyn FnOnce(Result<Arc<ProcessCameraProvider>, CameraError>) + Send + 'static>;

/// Callback-style provider acquisition
pub trait ProviderSource: Send + Sync {
    /// Resolve the provider asynchronously and call `listener` exactly once
    fn get_instance(&self, listener: ProviderListener);
}

/// Wait for the provider. Resumes in the calling task.
pub async fn acquire_provider(
    source: &dyn ProviderSource,
) -> Result<Arc<ProcessCameraProvider>, CameraError> {
    let (tx, rx) = oneshot::channel();

    source.get_instance(Box::new(move |result| {
        let _ = tx.send(result);
    }));

    rx.await.map_err(|_| CameraError::ProviderUnavailable {
        details: "provider listener dropped without resolving".to_string(),
    })?
}

static GLOBAL_PROVIDER: OnceCell<Arc<ProcessCameraProvider>> = OnceCell::const_new();

#[derive(Clone)]
enum ProviderCell {
    Global,
    Owned(Arc<OnceCell<Arc<ProcessCameraProvider>>>),
}

#[derive(Clone)]
enum BackendFactory {
    Config(CameraConfig),
    Backend(Arc<dyn CameraBackend>),
}

/// Lazily creates the camera provider on first request and caches it
#[derive(Clone)]
pub struct ProcessProviderSource {
    cell: ProviderCell,
    factory: BackendFactory,
}

impl ProcessProviderSource {
    /// Source backed by the process-wide provider. Only the first
    /// initialization's configuration takes effect.
    pub fn global(config: CameraConfig) -> Self {
        Self {
            cell: ProviderCell::Global,
            factory: BackendFactory::Config(config),
        }
    }

    /// Source with its own provider instance
    pub fn new(config: CameraConfig) -> Self {
        Self {
            cell: ProviderCell::Owned(Arc::new(OnceCell::new())),
            factory: BackendFactory::Config(config),
        }
    }

    /// Source with its own provider over an existing backend
    pub fn with_backend(backend: Arc<dyn CameraBackend>) -> Self {
        Self {
            cell: ProviderCell::Owned(Arc::new(OnceCell::new())),
            factory: BackendFactory::Backend(backend),
        }
    }

    fn cell(&self) -> &OnceCell<Arc<ProcessCameraProvider>> {
        match &self.cell {
            ProviderCell::Global => &GLOBAL_PROVIDER,
            ProviderCell::Owned(cell) => cell,
        }
    }

    fn create_provider(&self) -> Result<Arc<ProcessCameraProvider>, CameraError> {
        let backend = match &self.factory {
            BackendFactory::Config(config) => {
                CameraBackendBuilder::new().config(config.clone()).build()?
            }
            BackendFactory::Backend(backend) => Arc::clone(backend),
        };

        Ok(Arc::new(ProcessCameraProvider::new(backend)))
    }

    async fn resolve(&self) -> Result<Arc<ProcessCameraProvider>, CameraError> {
        self.cell()
            .get_or_try_init(|| async { self.create_provider() })
            .await
            .map(Arc::clone)
    }
}

impl ProviderSource for ProcessProviderSource {
    fn get_instance(&self, listener: ProviderListener) {
        let source = self.clone();

        tokio::spawn(async move {
            let result = source.resolve().await;
            if let Err(e) = &result {
                warn!("Camera provider initialization failed: {}", e);
            }
            listener(result);
        });
    }
}
