//! Native-side host: owns one applier per session and feeds it batches.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use canvex_core::error::{CanvexError, Result};
use canvex_core::types::{BufferHandle, SurfaceOptions, TextMetrics};

use crate::applier::{ApplyReport, CommandApplier};
use crate::codec::BatchCodec;
use crate::surface::Surface;

/// Builds the native surface for a new session.
pub type SurfaceFactory<S> =
    Box<dyn Fn(&str, u32, u32, SurfaceOptions) -> Result<S> + Send + Sync>;

struct HostedSurface<S: Surface> {
    applier: CommandApplier<S>,
    options: SurfaceOptions,
}

/// All surfaces living on the native side of the boundary.
pub struct SurfaceHost<S: Surface> {
    surfaces: RwLock<HashMap<String, Arc<Mutex<HostedSurface<S>>>>>,
    factory: SurfaceFactory<S>,
    codec: BatchCodec,
    warn_threshold: usize,
}

impl<S: Surface + 'static> SurfaceHost<S> {
    pub fn new(factory: SurfaceFactory<S>) -> Self {
        Self::with_settings(factory, BatchCodec::default(), 1024)
    }

    /// Host with an explicit codec (memo capacity) and registry warning size.
    pub fn with_settings(
        factory: SurfaceFactory<S>,
        codec: BatchCodec,
        warn_threshold: usize,
    ) -> Self {
        Self {
            surfaces: RwLock::new(HashMap::new()),
            factory,
            codec,
            warn_threshold,
        }
    }

    /// Acquire the native surface and its context for a session.
    pub async fn init_surface(
        &self,
        session_id: &str,
        width: u32,
        height: u32,
        options: SurfaceOptions,
    ) -> Result<()> {
        let surface = (self.factory)(session_id, width, height, options)?;
        let hosted = HostedSurface {
            applier: CommandApplier::with_warn_threshold(surface, self.warn_threshold),
            options,
        };

        let mut surfaces = self.surfaces.write().await;
        if surfaces.contains_key(session_id) {
            return Err(CanvexError::InvalidArgument(format!(
                "surface for session {session_id} already exists"
            )));
        }
        surfaces.insert(session_id.to_string(), Arc::new(Mutex::new(hosted)));
        info!(
            session_id,
            width,
            height,
            color_space = options.color_space.as_str(),
            "Surface initialized"
        );
        Ok(())
    }

    /// Decode and replay one batch. A malformed payload applies nothing.
    pub async fn process_batch(&self, session_id: &str, payload: &str) -> Result<ApplyReport> {
        let hosted = self.get(session_id).await?;
        let ops = self.codec.decode(payload)?;
        let mut hosted = hosted.lock().await;
        let report = hosted.applier.apply(&ops);
        debug!(
            session_id,
            operations = ops.len(),
            applied = report.applied,
            "Processed batch"
        );
        Ok(report)
    }

    pub async fn measure_text(&self, session_id: &str, text: &str) -> Result<TextMetrics> {
        let hosted = self.get(session_id).await?;
        let mut hosted = hosted.lock().await;
        hosted.applier.surface_mut().measure_text(text)
    }

    pub async fn create_image_buffer(&self, session_id: &str, buffer: BufferHandle) -> Result<()> {
        if buffer.width == 0 || buffer.height == 0 {
            return Err(CanvexError::InvalidArgument(format!(
                "image buffer size {}x{} must be non-zero",
                buffer.width, buffer.height
            )));
        }
        let hosted = self.get(session_id).await?;
        let mut hosted = hosted.lock().await;
        hosted.applier.surface_mut().create_image_buffer(buffer)
    }

    /// Upload RGBA8 pixels. `rgba` must cover the whole buffer.
    pub async fn put_image_buffer(
        &self,
        session_id: &str,
        buffer: BufferHandle,
        rgba: &[u8],
        x: i32,
        y: i32,
    ) -> Result<()> {
        if rgba.len() != buffer.byte_len() {
            return Err(CanvexError::InvalidArgument(format!(
                "expected {} bytes for a {}x{} RGBA buffer, got {}",
                buffer.byte_len(),
                buffer.width,
                buffer.height,
                rgba.len()
            )));
        }
        let hosted = self.get(session_id).await?;
        let mut hosted = hosted.lock().await;
        hosted.applier.surface_mut().put_image_buffer(buffer, rgba, x, y)
    }

    /// Resize and reacquire the context with the session's creation options.
    pub async fn resize_surface(&self, session_id: &str, width: u32, height: u32) -> Result<()> {
        let hosted = self.get(session_id).await?;
        let mut hosted = hosted.lock().await;
        let options = hosted.options;
        hosted.applier.reset_context(width, height, options)?;
        info!(session_id, width, height, "Surface resized, context reacquired");
        Ok(())
    }

    /// Drop the session's surface and every native object registered for it.
    pub async fn release_surface(&self, session_id: &str) -> Result<()> {
        let removed = self.surfaces.write().await.remove(session_id);
        let Some(hosted) = removed else {
            return Err(CanvexError::SessionNotFound(session_id.to_string()));
        };
        hosted.lock().await.applier.release();
        info!(session_id, "Surface released");
        Ok(())
    }

    pub async fn contains(&self, session_id: &str) -> bool {
        self.surfaces.read().await.contains_key(session_id)
    }

    pub async fn len(&self) -> usize {
        self.surfaces.read().await.len()
    }

    /// Run `f` against a session's applier, e.g. to inspect its state.
    pub async fn with_applier<R>(
        &self,
        session_id: &str,
        f: impl FnOnce(&CommandApplier<S>) -> R,
    ) -> Result<R> {
        let hosted = self.get(session_id).await?;
        let hosted = hosted.lock().await;
        Ok(f(&hosted.applier))
    }

    async fn get(&self, session_id: &str) -> Result<Arc<Mutex<HostedSurface<S>>>> {
        let surfaces = self.surfaces.read().await;
        match surfaces.get(session_id) {
            Some(hosted) => Ok(hosted.clone()),
            None => {
                warn!(session_id, "Dropping request for unknown or disposed surface");
                Err(CanvexError::SessionNotFound(session_id.to_string()))
            }
        }
    }
}
