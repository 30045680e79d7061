//! Frame driver: one tick per display refresh, flushing every session.
//!
//! Per tick, each live session runs its frame handler, then its queue is
//! drained, encoded and sent through the transport. Sessions are ticked
//! concurrently; a session's own ticks never overlap because its slot stays
//! locked until the flush has been answered. A failed flush only loses that
//! session's frame.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use canvex_core::config::Config;
use canvex_core::error::{CanvexError, Result};
use canvex_core::events::{
    FrameTick, InputEvent, KeyInput, KeyboardEvent, ModifierState, MouseMove, Resize,
};
use canvex_core::protocol::Operation;
use canvex_core::types::{SurfaceOptions, TextMetrics};

use crate::applier::{ApplyReport, SkippedOp};
use crate::codec::BatchCodec;
use crate::context::{BufferCommand, FrameBatch, PendingBuffer, RenderContext};
use crate::session::Session;
use crate::transport::Transport;

/// Application callbacks for one session.
pub trait FrameHandler: Send {
    /// Enqueue this frame's drawing. Runs to completion before the flush.
    fn on_frame(&mut self, ctx: &mut RenderContext, tick: &FrameTick);

    fn on_event(&mut self, _ctx: &mut RenderContext, _event: &InputEvent) {}
}

impl<F> FrameHandler for F
where
    F: FnMut(&mut RenderContext, &FrameTick) + Send,
{
    fn on_frame(&mut self, ctx: &mut RenderContext, tick: &FrameTick) {
        self(ctx, tick)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverPhase {
    Idle,
    /// A tick was accepted and live sessions are being collected.
    Scheduled,
    /// Frame handlers and flushes are in flight.
    Running,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Flushed {
        session_id: String,
        operations: usize,
        report: ApplyReport,
    },
    Failed {
        session_id: String,
        error: String,
    },
}

impl TickOutcome {
    pub fn session_id(&self) -> &str {
        match self {
            Self::Flushed { session_id, .. } | Self::Failed { session_id, .. } => session_id,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

struct SessionSlot {
    session: Session,
    ctx: RenderContext,
    handler: Box<dyn FrameHandler>,
    disposed: bool,
}

/// Held keys and modifiers. Exists only while at least one session does.
#[derive(Debug, Default)]
struct InputState {
    held: BTreeSet<String>,
    modifiers: ModifierState,
}

pub struct FrameDriver {
    transport: Arc<dyn Transport>,
    codec: BatchCodec,
    sessions: RwLock<HashMap<String, Arc<Mutex<SessionSlot>>>>,
    input: Mutex<Option<InputState>>,
    phase: std::sync::Mutex<DriverPhase>,
    frame_interval: Duration,
    handle_warn_threshold: usize,
    started: Instant,
}

impl FrameDriver {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::from_config(transport, &Config::default())
    }

    pub fn from_config(transport: Arc<dyn Transport>, config: &Config) -> Self {
        Self {
            transport,
            // encode side only, nothing to memoize
            codec: BatchCodec::new(0),
            sessions: RwLock::new(HashMap::new()),
            input: Mutex::new(None),
            phase: std::sync::Mutex::new(DriverPhase::Idle),
            frame_interval: Duration::from_millis(config.frame_interval_ms().max(1)),
            handle_warn_threshold: config.handle_warn_threshold(),
            started: Instant::now(),
        }
    }

    pub fn phase(&self) -> DriverPhase {
        *self.phase.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_phase(&self, phase: DriverPhase) {
        *self.phase.lock().unwrap_or_else(|e| e.into_inner()) = phase;
    }

    pub fn frame_interval(&self) -> Duration {
        self.frame_interval
    }

    /// Create a session with a generated id.
    pub async fn create_session(
        &self,
        width: u32,
        height: u32,
        options: SurfaceOptions,
        handler: Box<dyn FrameHandler>,
    ) -> Result<String> {
        self.create_session_with_id(&Session::generate_id(), width, height, options, handler)
            .await
    }

    /// Create a session under a caller-chosen id, shared with the native side.
    pub async fn create_session_with_id(
        &self,
        session_id: &str,
        width: u32,
        height: u32,
        options: SurfaceOptions,
        handler: Box<dyn FrameHandler>,
    ) -> Result<String> {
        let session = Session::new(session_id, width, height, options)?;
        if self.sessions.read().await.contains_key(session_id) {
            return Err(CanvexError::InvalidArgument(format!(
                "session {session_id} already exists"
            )));
        }

        self.transport
            .init_surface(session_id, width, height, options)
            .await?;

        let slot = SessionSlot {
            ctx: RenderContext::new(width, height, self.handle_warn_threshold),
            session,
            handler,
            disposed: false,
        };
        // sessions before input, here and in dispose, so the emptiness check
        // and the input lifecycle change happen together
        let mut sessions = self.sessions.write().await;
        sessions.insert(session_id.to_string(), Arc::new(Mutex::new(slot)));
        let mut input = self.input.lock().await;
        if input.is_none() {
            *input = Some(InputState::default());
            debug!("Input state initialized");
        }
        drop(input);
        drop(sessions);

        info!(session_id, width, height, "Session created");
        Ok(session_id.to_string())
    }

    /// Remove a session. It is never ticked again, its pending operations
    /// are discarded and its native surface is released.
    pub async fn dispose(&self, session_id: &str) -> Result<()> {
        let removed = {
            let mut sessions = self.sessions.write().await;
            let removed = sessions.remove(session_id);
            if removed.is_some() && sessions.is_empty() {
                *self.input.lock().await = None;
                debug!("Input state torn down");
            }
            removed
        };
        let Some(slot) = removed else {
            return Err(CanvexError::SessionNotFound(session_id.to_string()));
        };

        let dropped = {
            let mut slot = slot.lock().await;
            slot.disposed = true;
            slot.ctx.discard()
        };
        info!(session_id, dropped, "Session disposed");

        self.transport.release_surface(session_id).await
    }

    /// Resize a surface. The native context is reacquired with default
    /// settings; the application's style mirror keeps its values, and the
    /// handler gets a `Resize` event so it can resend what it needs.
    pub async fn resize(&self, session_id: &str, width: u32, height: u32) -> Result<()> {
        let slot = self.slot(session_id).await?;
        let mut slot = slot.lock().await;
        self.transport
            .resize_surface(session_id, width, height)
            .await?;

        let SessionSlot {
            session,
            ctx,
            handler,
            ..
        } = &mut *slot;
        session.resize(width, height);
        ctx.resized(width, height);
        handler.on_event(ctx, &InputEvent::Resize(Resize { width, height }));
        Ok(())
    }

    /// Unbatched text measurement against the session's live context.
    pub async fn measure_text(&self, session_id: &str, text: &str) -> Result<TextMetrics> {
        self.slot(session_id).await?;
        self.transport.measure_text(session_id, text).await
    }

    /// Run one frame for every live session.
    pub async fn tick(&self, timestamp: f64) -> Vec<TickOutcome> {
        self.set_phase(DriverPhase::Scheduled);
        let slots: Vec<(String, Arc<Mutex<SessionSlot>>)> = self
            .sessions
            .read()
            .await
            .iter()
            .map(|(id, slot)| (id.clone(), slot.clone()))
            .collect();

        self.set_phase(DriverPhase::Running);
        let outcomes = join_all(
            slots
                .into_iter()
                .map(|(id, slot)| self.tick_session(id, slot, timestamp)),
        )
        .await;
        self.set_phase(DriverPhase::Idle);

        outcomes.into_iter().flatten().collect()
    }

    async fn tick_session(
        &self,
        session_id: String,
        slot: Arc<Mutex<SessionSlot>>,
        timestamp: f64,
    ) -> Option<TickOutcome> {
        let mut slot = slot.lock().await;
        if slot.disposed {
            debug!(session_id = %session_id, "Skipping disposed session");
            return None;
        }

        let SessionSlot {
            session,
            ctx,
            handler,
            ..
        } = &mut *slot;
        handler.on_frame(ctx, &FrameTick { timestamp });
        session.record_frame();
        let frame = ctx.take_frame();
        let operations = frame.ops.len();

        match self.flush(&session_id, frame, ctx).await {
            Ok(report) => Some(TickOutcome::Flushed {
                session_id,
                operations,
                report,
            }),
            Err(e) => {
                warn!(session_id = %session_id, operations, error = %e, "Flush failed, frame dropped");
                Some(TickOutcome::Failed {
                    session_id,
                    error: e.to_string(),
                })
            }
        }
    }

    /// Send the frame in enqueue order: the operations between two pieces of
    /// pixel work go as one batch, the pixel work as its own call. Empty
    /// batches are not sent.
    ///
    /// A transport failure drops the rest of the frame; buffer creations
    /// that never went out are put back on `ctx`. Any other buffer error
    /// only skips that command.
    async fn flush(
        &self,
        session_id: &str,
        frame: FrameBatch,
        ctx: &mut RenderContext,
    ) -> Result<ApplyReport> {
        let FrameBatch { ops, buffers } = frame;
        let mut report = ApplyReport::default();
        let mut start = 0;
        let mut buffers = buffers.into_iter();

        loop {
            let next = buffers.next();
            let end = next.as_ref().map_or(ops.len(), |p| p.at.min(ops.len()));
            if end > start {
                let sent = match self.codec.encode(&ops[start..end]) {
                    Ok(payload) => self.transport.process_batch(session_id, payload).await,
                    Err(e) => Err(e),
                };
                match sent {
                    Ok(segment) => report.merge(segment, start),
                    Err(e) => {
                        ctx.requeue_creates(next.into_iter().chain(buffers));
                        return Err(e);
                    }
                }
                start = end;
            }

            let Some(PendingBuffer { at, command }) = next else { break };
            let name = command.name();
            let (sent, create) = match command {
                BufferCommand::Create(buffer) => (
                    self.transport.create_image_buffer(session_id, buffer).await,
                    Some(buffer),
                ),
                BufferCommand::Put { buffer, rgba, x, y } => (
                    self.transport
                        .put_image_buffer(session_id, buffer, rgba, x, y)
                        .await,
                    None,
                ),
            };
            match sent {
                Ok(()) => {}
                Err(e @ CanvexError::Transport(_)) => {
                    let unsent = create.map(|buffer| PendingBuffer {
                        at,
                        command: BufferCommand::Create(buffer),
                    });
                    ctx.requeue_creates(unsent.into_iter().chain(buffers));
                    return Err(e);
                }
                Err(e) => {
                    warn!(session_id, command = name, error = %e, "Skipping buffer command");
                    report.skipped.push(SkippedOp {
                        index: end,
                        name,
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(report)
    }

    /// Tick at the configured frame interval until `shutdown` fires.
    pub async fn run(&self, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(self.frame_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        info!(
            interval_ms = self.frame_interval.as_millis() as u64,
            "Frame driver started"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    let timestamp = self.started.elapsed().as_secs_f64() * 1000.0;
                    let outcomes = self.tick(timestamp).await;
                    let failed = outcomes.iter().filter(|o| o.is_failure()).count();
                    if failed > 0 {
                        debug!(failed, sessions = outcomes.len(), "Tick finished with failures");
                    }
                }
            }
        }
        info!("Frame driver stopped");
    }

    pub async fn session_ids(&self) -> Vec<String> {
        self.sessions.read().await.keys().cloned().collect()
    }

    pub async fn session(&self, session_id: &str) -> Result<Session> {
        let slot = self.slot(session_id).await?;
        let slot = slot.lock().await;
        Ok(slot.session.clone())
    }

    /// Run `f` against a session's render context outside a frame.
    pub async fn with_context<R>(
        &self,
        session_id: &str,
        f: impl FnOnce(&mut RenderContext) -> R,
    ) -> Result<R> {
        let slot = self.slot(session_id).await?;
        let mut slot = slot.lock().await;
        Ok(f(&mut slot.ctx))
    }

    // Input

    pub async fn input_active(&self) -> bool {
        self.input.lock().await.is_some()
    }

    /// Codes of the keys currently held, if input state exists.
    pub async fn held_keys(&self) -> Option<Vec<String>> {
        self.input
            .lock()
            .await
            .as_ref()
            .map(|s| s.held.iter().cloned().collect())
    }

    /// A printable key also produces a `KeyPress`.
    pub async fn dispatch_key_down(&self, input: KeyInput) {
        let event = {
            let mut guard = self.input.lock().await;
            let Some(state) = guard.as_mut() else {
                debug!(code = %input.code, "Key down with no sessions, ignored");
                return;
            };
            let is_held = !state.held.insert(input.code.clone());
            state.modifiers = input.modifiers;
            keyboard_event(&input, is_held, state)
        };

        let mut events = vec![InputEvent::KeyDown(event.clone())];
        if input.is_printable() {
            events.push(InputEvent::KeyPress(event));
        }
        self.broadcast(&events).await;
    }

    pub async fn dispatch_key_up(&self, input: KeyInput) {
        let event = {
            let mut guard = self.input.lock().await;
            let Some(state) = guard.as_mut() else {
                debug!(code = %input.code, "Key up with no sessions, ignored");
                return;
            };
            state.held.remove(&input.code);
            state.modifiers = input.modifiers;
            keyboard_event(&input, false, state)
        };
        self.broadcast(&[InputEvent::KeyUp(event)]).await;
    }

    pub async fn dispatch_mouse_move(&self, event: MouseMove) {
        self.broadcast(&[InputEvent::MouseMove(event)]).await;
    }

    /// Window-level resize. Surfaces keep their size; handlers decide.
    pub async fn dispatch_window_resize(&self, event: Resize) {
        self.broadcast(&[InputEvent::Resize(event)]).await;
    }

    /// Deliver a surface-local event (wheel, button) to one session.
    pub async fn dispatch_to(&self, session_id: &str, event: InputEvent) -> Result<()> {
        let slot = self.slot(session_id).await?;
        let mut slot = slot.lock().await;
        let SessionSlot { ctx, handler, .. } = &mut *slot;
        handler.on_event(ctx, &event);
        Ok(())
    }

    async fn broadcast(&self, events: &[InputEvent]) {
        let slots: Vec<Arc<Mutex<SessionSlot>>> =
            self.sessions.read().await.values().cloned().collect();
        for slot in slots {
            let mut slot = slot.lock().await;
            if slot.disposed {
                continue;
            }
            let SessionSlot { ctx, handler, .. } = &mut *slot;
            for event in events {
                handler.on_event(ctx, event);
            }
        }
    }

    async fn slot(&self, session_id: &str) -> Result<Arc<Mutex<SessionSlot>>> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| CanvexError::SessionNotFound(session_id.to_string()))
    }
}

fn keyboard_event(input: &KeyInput, is_held: bool, state: &InputState) -> KeyboardEvent {
    KeyboardEvent {
        key_code: input.code.clone(),
        key: input.key.clone(),
        is_held,
        held_keys: state.held.iter().cloned().collect(),
        modifiers: state.modifiers,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    use crate::host::SurfaceHost;
    use crate::recording::RecordingSurface;
    use crate::transport::InProcessTransport;

    fn driver() -> (FrameDriver, Arc<SurfaceHost<RecordingSurface>>) {
        let host = Arc::new(SurfaceHost::new(Box::new(
            |_: &str, w: u32, h: u32, _: SurfaceOptions| Ok(RecordingSurface::new(w, h)),
        )));
        let transport = Arc::new(InProcessTransport::new(host.clone()));
        (FrameDriver::new(transport), host)
    }

    struct EventLog(Arc<StdMutex<Vec<InputEvent>>>);

    impl FrameHandler for EventLog {
        fn on_frame(&mut self, _ctx: &mut RenderContext, _tick: &FrameTick) {}

        fn on_event(&mut self, _ctx: &mut RenderContext, event: &InputEvent) {
            self.0.lock().unwrap().push(event.clone());
        }
    }

    #[tokio::test]
    async fn test_blank_session_id_fails_fast() {
        let (driver, host) = driver();
        let result = driver
            .create_session_with_id(" ", 10, 10, SurfaceOptions::default(), Box::new(|_: &mut RenderContext, _: &FrameTick| {}))
            .await;
        assert!(matches!(result, Err(CanvexError::InvalidSession(_))));
        assert_eq!(host.len().await, 0);
    }

    #[tokio::test]
    async fn test_tick_flushes_and_returns_to_idle() {
        let (driver, _host) = driver();
        let id = driver
            .create_session(
                10,
                10,
                SurfaceOptions::default(),
                Box::new(|ctx: &mut RenderContext, _: &FrameTick| ctx.fill_rect(0.0, 0.0, 1.0, 1.0)),
            )
            .await
            .unwrap();

        assert_eq!(driver.phase(), DriverPhase::Idle);
        let outcomes = driver.tick(16.0).await;
        assert_eq!(driver.phase(), DriverPhase::Idle);

        assert_eq!(outcomes.len(), 1);
        match &outcomes[0] {
            TickOutcome::Flushed {
                session_id,
                operations,
                report,
            } => {
                assert_eq!(session_id, &id);
                assert_eq!(*operations, 1);
                assert_eq!(report.applied, 1);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(driver.session(&id).await.unwrap().frames, 1);
    }

    #[tokio::test]
    async fn test_input_state_lifecycle() {
        let (driver, _host) = driver();
        assert!(!driver.input_active().await);

        let a = driver
            .create_session(1, 1, SurfaceOptions::default(), Box::new(|_: &mut RenderContext, _: &FrameTick| {}))
            .await
            .unwrap();
        let b = driver
            .create_session(1, 1, SurfaceOptions::default(), Box::new(|_: &mut RenderContext, _: &FrameTick| {}))
            .await
            .unwrap();
        assert!(driver.input_active().await);

        driver.dispose(&a).await.unwrap();
        assert!(driver.input_active().await);
        driver.dispose(&b).await.unwrap();
        assert!(!driver.input_active().await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_input_survives_dispose_racing_create() {
        for _ in 0..50 {
            let (driver, _host) = driver();
            let driver = Arc::new(driver);
            let last = driver
                .create_session(1, 1, SurfaceOptions::default(), Box::new(|_: &mut RenderContext, _: &FrameTick| {}))
                .await
                .unwrap();

            let disposer = {
                let driver = driver.clone();
                tokio::spawn(async move { driver.dispose(&last).await })
            };
            let creator = {
                let driver = driver.clone();
                tokio::spawn(async move {
                    driver
                        .create_session(1, 1, SurfaceOptions::default(), Box::new(|_: &mut RenderContext, _: &FrameTick| {}))
                        .await
                })
            };
            disposer.await.unwrap().unwrap();
            creator.await.unwrap().unwrap();

            // one session is left, so input must be live
            assert_eq!(driver.session_ids().await.len(), 1);
            assert!(driver.input_active().await);
        }
    }

    #[tokio::test]
    async fn test_key_events_track_held_keys() {
        let (driver, _host) = driver();
        let events = Arc::new(StdMutex::new(Vec::new()));
        driver
            .create_session(1, 1, SurfaceOptions::default(), Box::new(EventLog(events.clone())))
            .await
            .unwrap();

        let shift = ModifierState {
            shift: true,
            ..ModifierState::default()
        };
        driver
            .dispatch_key_down(KeyInput::new("KeyA", "A").with_modifiers(shift))
            .await;
        driver
            .dispatch_key_down(KeyInput::new("KeyA", "A").with_modifiers(shift))
            .await;
        driver.dispatch_key_down(KeyInput::new("ArrowUp", "ArrowUp")).await;
        assert_eq!(
            driver.held_keys().await.unwrap(),
            vec!["ArrowUp".to_string(), "KeyA".to_string()]
        );
        driver.dispatch_key_up(KeyInput::new("KeyA", "a")).await;

        let events = events.lock().unwrap();
        // down + press, repeat down + press, arrow down, up
        assert_eq!(events.len(), 6);
        match (&events[0], &events[2], &events[4], &events[5]) {
            (
                InputEvent::KeyDown(first),
                InputEvent::KeyDown(repeat),
                InputEvent::KeyDown(arrow),
                InputEvent::KeyUp(up),
            ) => {
                assert!(!first.is_held);
                assert!(first.modifiers.shift);
                assert!(repeat.is_held);
                assert_eq!(arrow.held_keys, vec!["ArrowUp", "KeyA"]);
                assert_eq!(up.held_keys, vec!["ArrowUp"]);
            }
            other => panic!("unexpected events {other:?}"),
        }
        assert!(matches!(events[1], InputEvent::KeyPress(_)));
    }

    #[tokio::test]
    async fn test_dispatch_to_unknown_session() {
        let (driver, _host) = driver();
        let result = driver
            .dispatch_to("nope", InputEvent::MouseMove(MouseMove::default()))
            .await;
        assert!(matches!(result, Err(CanvexError::SessionNotFound(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_shutdown() {
        let (driver, _host) = driver();
        let driver = Arc::new(driver);
        let frames = Arc::new(StdMutex::new(0u32));
        let counter = frames.clone();
        driver
            .create_session(
                1,
                1,
                SurfaceOptions::default(),
                Box::new(move |_: &mut RenderContext, _: &FrameTick| {
                    *counter.lock().unwrap() += 1;
                }),
            )
            .await
            .unwrap();

        let shutdown = CancellationToken::new();
        let runner = {
            let driver = driver.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move { driver.run(shutdown).await })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown.cancel();
        runner.await.unwrap();

        let frames = *frames.lock().unwrap();
        assert!(frames >= 5, "only {frames} frames ran");
        assert_eq!(driver.phase(), DriverPhase::Idle);
    }
}
