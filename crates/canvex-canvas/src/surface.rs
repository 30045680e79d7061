//! The native drawing surface seen from the applying side.

use std::fmt::Debug;

use canvex_core::error::Result;
use canvex_core::protocol::{HandleId, Method, Property, Value};
use canvex_core::types::{BufferHandle, SurfaceOptions, TextMetrics};

/// An argument after handle resolution.
#[derive(Debug, Clone)]
pub enum NativeArg<E, O> {
    Value(Value),
    /// A native element (image) looked up from an element handle.
    Element(E),
    /// A composite object (gradient, pattern) from the registry.
    Object(O),
    /// Arguments to be passed through `new <class>(...)`.
    Construct { class: String, args: Vec<Value> },
}

pub type ArgOf<S> = NativeArg<<S as Surface>::Element, <S as Surface>::Object>;

/// A live 2D context plus the native resources behind it.
///
/// Implementations are driven by [`crate::applier::CommandApplier`], one
/// surface per session.
pub trait Surface: Send {
    type Element: Clone + Debug + Send + Sync;
    type Object: Clone + Debug + Send + Sync;

    /// Call a context method. Methods producing a composite object return it.
    fn invoke(&mut self, method: Method, args: Vec<ArgOf<Self>>) -> Result<Option<Self::Object>>;

    fn set_property(&mut self, property: Property, value: ArgOf<Self>) -> Result<()>;

    /// Whether `object` exposes `method` (e.g. a gradient has `addColorStop`).
    fn object_supports(&self, object: &Self::Object, method: Method) -> bool;

    fn invoke_object(
        &mut self,
        object: &Self::Object,
        method: Method,
        args: Vec<ArgOf<Self>>,
    ) -> Result<()>;

    /// Find the native element behind an element handle.
    fn lookup_element(&mut self, id: HandleId) -> Option<Self::Element>;

    /// Resize the backing store and reacquire the context. Every context
    /// setting is back to its default afterwards.
    fn reset(&mut self, width: u32, height: u32, options: SurfaceOptions) -> Result<()>;

    fn create_image_buffer(&mut self, buffer: BufferHandle) -> Result<()>;

    /// `rgba` has already been checked against the buffer size.
    fn put_image_buffer(&mut self, buffer: BufferHandle, rgba: &[u8], x: i32, y: i32)
    -> Result<()>;

    fn measure_text(&mut self, text: &str) -> Result<TextMetrics>;

    /// Free native resources. Called once when the session goes away.
    fn release(&mut self) {}
}
