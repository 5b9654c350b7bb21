use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::info;

use crate::error::ExtractError;

/// Image-to-text recognition
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize(&self, image: &[u8]) -> Result<String, ExtractError>;

    /// Releases native resources held by the engine.
    async fn shutdown(&self) {}
}

/// Creates an OCR engine. Runs on the blocking pool, so it may do expensive setup.
pub trait OcrLoader: Send + Sync {
    fn load(&self) -> Result<Arc<dyn OcrEngine>, ExtractError>;
}

impl<F> OcrLoader for F
where
    F: Fn() -> Result<Arc<dyn OcrEngine>, ExtractError> + Send + Sync,
{
    fn load(&self) -> Result<Arc<dyn OcrEngine>, ExtractError> {
        self()
    }
}

/// OCR engine created on first use and cached until [`LazyOcr::cleanup`].
///
/// The mutex is held across the load so concurrent first callers share one engine; after
/// that it only guards cloning the `Arc`.
pub struct LazyOcr {
    loader: Arc<dyn OcrLoader>,
    engine: Mutex<Option<Arc<dyn OcrEngine>>>,
}

impl LazyOcr {
    pub fn new(loader: Arc<dyn OcrLoader>) -> Self {
        Self {
            loader,
            engine: Mutex::new(None),
        }
    }

    pub async fn engine(&self) -> Result<Arc<dyn OcrEngine>, ExtractError> {
        let mut slot = self.engine.lock().await;
        if let Some(engine) = slot.as_ref() {
            return Ok(engine.clone());
        }

        let loader = self.loader.clone();
        let engine = tokio::task::spawn_blocking(move || loader.load())
            .await
            .map_err(|e| ExtractError::Interrupted(e.to_string()))??;

        info!("OCR engine loaded");
        *slot = Some(engine.clone());
        Ok(engine)
    }

    pub async fn is_loaded(&self) -> bool {
        self.engine.lock().await.is_some()
    }

    pub async fn cleanup(&self) {
        let engine = self.engine.lock().await.take();
        if let Some(engine) = engine {
            engine.shutdown().await;
            info!("OCR engine released");
        }
    }
}

/// Loader used by the service binary: Tesseract when compiled in, otherwise a loader that
/// reports OCR as unavailable.
pub fn default_ocr_loader(languages: &str) -> Arc<dyn OcrLoader> {
    let languages = if languages.trim().is_empty() {
        "eng".to_string()
    } else {
        languages.trim().to_string()
    };

    #[cfg(feature = "tesseract")]
    {
        Arc::new(move || -> Result<Arc<dyn OcrEngine>, ExtractError> {
            let engine = tesseract::TesseractEngine::new(&languages)?;
            Ok(Arc::new(engine) as Arc<dyn OcrEngine>)
        })
    }

    #[cfg(not(feature = "tesseract"))]
    {
        Arc::new(move || -> Result<Arc<dyn OcrEngine>, ExtractError> {
            Err(ExtractError::OcrUnavailable(format!(
                "built without the `tesseract` feature (requested languages: {languages})"
            )))
        })
    }
}

/// A native OCR handle created once, used from the blocking pool and dropped on release.
///
/// Calls are serialized on the handle; recognition itself is CPU bound, so there is nothing to
/// gain from running two on one engine.
#[cfg_attr(not(feature = "tesseract"), allow(dead_code))]
pub(crate) struct BlockingHandle<H> {
    inner: Arc<std::sync::Mutex<Option<H>>>,
}

#[cfg_attr(not(feature = "tesseract"), allow(dead_code))]
impl<H: Send + 'static> BlockingHandle<H> {
    pub(crate) fn new(handle: H) -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(Some(handle))),
        }
    }

    pub(crate) async fn with<R, F>(&self, work: F) -> Result<R, ExtractError>
    where
        R: Send + 'static,
        F: FnOnce(&mut H) -> Result<R, ExtractError> + Send + 'static,
    {
        let inner = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = inner
                .lock()
                .map_err(|_| ExtractError::OcrFailed("OCR engine lock poisoned".to_string()))?;
            let handle = guard.as_mut().ok_or_else(|| {
                ExtractError::OcrUnavailable("OCR engine has been released".to_string())
            })?;
            work(handle)
        })
        .await
        .map_err(|e| ExtractError::Interrupted(e.to_string()))?
    }

    /// Drops the handle; returns whether one was still held.
    pub(crate) fn release(&self) -> bool {
        match self.inner.lock() {
            Ok(mut guard) => guard.take().is_some(),
            Err(poisoned) => poisoned.into_inner().take().is_some(),
        }
    }
}

#[cfg(feature = "tesseract")]
pub mod tesseract {
    use std::io::Cursor;

    use async_trait::async_trait;
    use leptess::LepTess;
    use tracing::debug;

    use super::{BlockingHandle, OcrEngine};
    use crate::error::ExtractError;

    /// Tesseract with its language data loaded once, at construction.
    pub struct TesseractEngine {
        handle: BlockingHandle<LepTess>,
    }

    impl TesseractEngine {
        pub fn new(languages: &str) -> Result<Self, ExtractError> {
            let tess = LepTess::new(None, languages).map_err(|e| {
                ExtractError::OcrUnavailable(format!("failed to initialize Tesseract: {e}"))
            })?;
            Ok(Self {
                handle: BlockingHandle::new(tess),
            })
        }
    }

    fn to_png(image_data: &[u8]) -> Result<Vec<u8>, ExtractError> {
        let img = image::load_from_memory(image_data)
            .map_err(|e| ExtractError::OcrFailed(format!("failed to load image: {e}")))?;

        // leptess wants an encoded image, so normalize to PNG
        let mut png_data = Vec::new();
        img.write_to(&mut Cursor::new(&mut png_data), image::ImageFormat::Png)
            .map_err(|e| ExtractError::OcrFailed(format!("failed to convert image: {e}")))?;
        Ok(png_data)
    }

    #[async_trait]
    impl OcrEngine for TesseractEngine {
        async fn recognize(&self, image: &[u8]) -> Result<String, ExtractError> {
            let data = image.to_vec();
            self.handle
                .with(move |tess| {
                    let png_data = to_png(&data)?;
                    tess.set_image_from_mem(&png_data)
                        .map_err(|e| ExtractError::OcrFailed(format!("failed to set image: {e}")))?;
                    tess.get_utf8_text()
                        .map_err(|e| ExtractError::OcrFailed(e.to_string()))
                })
                .await
        }

        async fn shutdown(&self) {
            if self.handle.release() {
                debug!("Tesseract handle dropped");
            }
        }
    }
}
