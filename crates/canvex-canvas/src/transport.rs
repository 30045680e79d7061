//! The boundary between the application side and the native side.

use std::sync::Arc;

use async_trait::async_trait;

use canvex_core::error::Result;
use canvex_core::types::{BufferHandle, SurfaceOptions, TextMetrics};

use crate::applier::ApplyReport;
use crate::host::SurfaceHost;
use crate::surface::Surface;

/// Carries batches and direct calls across the boundary.
///
/// Every call is one boundary crossing and may fail; the driver never
/// retries.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Acquire the native surface for a new session.
    async fn init_surface(
        &self,
        session_id: &str,
        width: u32,
        height: u32,
        options: SurfaceOptions,
    ) -> Result<()>;

    /// Deliver one encoded batch and wait until it has been replayed.
    async fn process_batch(&self, session_id: &str, payload: String) -> Result<ApplyReport>;

    /// Unbatched call that needs an answer now.
    async fn measure_text(&self, session_id: &str, text: &str) -> Result<TextMetrics>;

    async fn create_image_buffer(&self, session_id: &str, buffer: BufferHandle) -> Result<()>;

    async fn put_image_buffer(
        &self,
        session_id: &str,
        buffer: BufferHandle,
        rgba: Vec<u8>,
        x: i32,
        y: i32,
    ) -> Result<()>;

    async fn resize_surface(&self, session_id: &str, width: u32, height: u32) -> Result<()>;

    async fn release_surface(&self, session_id: &str) -> Result<()>;
}

/// Transport to a [`SurfaceHost`] in the same process.
pub struct InProcessTransport<S: Surface> {
    host: Arc<SurfaceHost<S>>,
}

impl<S: Surface + 'static> InProcessTransport<S> {
    pub fn new(host: Arc<SurfaceHost<S>>) -> Self {
        Self { host }
    }

    pub fn host(&self) -> &Arc<SurfaceHost<S>> {
        &self.host
    }
}

#[async_trait]
impl<S: Surface + 'static> Transport for InProcessTransport<S> {
    async fn init_surface(
        &self,
        session_id: &str,
        width: u32,
        height: u32,
        options: SurfaceOptions,
    ) -> Result<()> {
        self.host
            .init_surface(session_id, width, height, options)
            .await
    }

    async fn process_batch(&self, session_id: &str, payload: String) -> Result<ApplyReport> {
        self.host.process_batch(session_id, &payload).await
    }

    async fn measure_text(&self, session_id: &str, text: &str) -> Result<TextMetrics> {
        self.host.measure_text(session_id, text).await
    }

    async fn create_image_buffer(&self, session_id: &str, buffer: BufferHandle) -> Result<()> {
        self.host.create_image_buffer(session_id, buffer).await
    }

    async fn put_image_buffer(
        &self,
        session_id: &str,
        buffer: BufferHandle,
        rgba: Vec<u8>,
        x: i32,
        y: i32,
    ) -> Result<()> {
        self.host
            .put_image_buffer(session_id, buffer, &rgba, x, y)
            .await
    }

    async fn resize_surface(&self, session_id: &str, width: u32, height: u32) -> Result<()> {
        self.host.resize_surface(session_id, width, height).await
    }

    async fn release_surface(&self, session_id: &str) -> Result<()> {
        self.host.release_surface(session_id).await
    }
}
