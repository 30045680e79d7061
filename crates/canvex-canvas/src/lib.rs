//! Batched 2D drawing across a serialization boundary.
//!
//! Application code draws through a [`RenderContext`], which only queues
//! operations. Once per frame the [`FrameDriver`] flushes each session's
//! queue as one encoded batch through a [`Transport`]; on the native side a
//! [`SurfaceHost`] decodes it and a [`CommandApplier`] replays it against the
//! live [`Surface`], keeping gradients and patterns addressable by handle.

pub mod applier;
pub mod codec;
pub mod context;
pub mod driver;
pub mod handles;
pub mod host;
pub mod queue;
pub mod recording;
pub mod session;
pub mod style;
pub mod surface;
pub mod transport;

pub use applier::{ApplyReport, CommandApplier, SkippedOp};
pub use codec::BatchCodec;
pub use context::{BufferCommand, FrameBatch, Gradient, Pattern, PendingBuffer, RenderContext};
pub use driver::{DriverPhase, FrameDriver, FrameHandler, TickOutcome};
pub use handles::HandlePool;
pub use host::SurfaceHost;
pub use queue::OperationQueue;
pub use recording::{CallLog, NativeCall, RecordingSurface};
pub use session::Session;
pub use style::StyleState;
pub use surface::{NativeArg, Surface};
pub use transport::{InProcessTransport, Transport};
