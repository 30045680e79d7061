//! Drawing surface session metadata.

use chrono::{DateTime, Utc};

use canvex_core::error::{CanvexError, Result};
use canvex_core::types::SurfaceOptions;

/// One managed drawing surface, as known to the application side.
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: String,
    pub width: u32,
    pub height: u32,
    pub options: SurfaceOptions,
    pub frames: u64,
    pub created_at: DateTime<Utc>,
    pub last_frame: Option<DateTime<Utc>>,
}

impl Session {
    /// Fails fast on an empty or blank id.
    pub fn new(
        session_id: impl Into<String>,
        width: u32,
        height: u32,
        options: SurfaceOptions,
    ) -> Result<Self> {
        let session_id = session_id.into();
        if session_id.trim().is_empty() {
            return Err(CanvexError::InvalidSession(session_id));
        }
        Ok(Self {
            session_id,
            width,
            height,
            options,
            frames: 0,
            created_at: Utc::now(),
            last_frame: None,
        })
    }

    pub fn generate_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    pub fn record_frame(&mut self) {
        self.frames += 1;
        self.last_frame = Some(Utc::now());
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }
}
