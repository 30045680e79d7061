//! A headless [`Surface`] that records every native call.
//!
//! Used by the CLI to run samples without a display, and by tests to assert
//! on exactly what reached the native side.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use canvex_core::error::{CanvexError, Result};
use canvex_core::protocol::{HandleId, Method, Property, Value};
use canvex_core::types::{BufferHandle, SurfaceOptions, TextMetrics};

use crate::surface::{ArgOf, NativeArg, Surface};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordedKind {
    Gradient,
    Pattern,
}

/// A native composite object, identified by creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordedObject {
    pub serial: usize,
    pub kind: RecordedKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordedElement {
    pub id: HandleId,
}

/// One call as seen by the native side. Arguments are rendered to strings.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeCall {
    Call {
        method: String,
        args: Vec<String>,
    },
    Set {
        property: String,
        value: String,
    },
    ObjectCall {
        object: usize,
        method: String,
        args: Vec<String>,
    },
    Reset {
        width: u32,
        height: u32,
    },
    CreateBuffer {
        id: u32,
        width: u32,
        height: u32,
    },
    PutBuffer {
        id: u32,
        bytes: usize,
        x: i32,
        y: i32,
    },
    MeasureText {
        text: String,
    },
    Release,
}

/// Shared view of a [`RecordingSurface`]'s call log. Stays readable after
/// the surface has been moved into a host.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<NativeCall>>>,
}

impl CallLog {
    fn push(&self, call: NativeCall) {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call);
    }

    pub fn calls(&self) -> Vec<NativeCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Method and property names of context and object calls, in order.
    pub fn names(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                NativeCall::Call { method, .. } | NativeCall::ObjectCall { method, .. } => {
                    Some(method)
                }
                NativeCall::Set { property, .. } => Some(property),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.names().iter().filter(|n| *n == name).count()
    }

    /// Context calls that put pixels on the surface.
    pub fn draw_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| match c {
                NativeCall::Call { method, .. } => {
                    Method::from_name(method).is_some_and(|m| m.is_draw())
                }
                _ => false,
            })
            .count()
    }

    pub fn len(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

#[derive(Debug)]
pub struct RecordingSurface {
    width: u32,
    height: u32,
    options: SurfaceOptions,
    font: String,
    elements: HashSet<HandleId>,
    buffers: HashMap<u32, BufferHandle>,
    failing: HashSet<Method>,
    next_serial: usize,
    log: CallLog,
}

impl RecordingSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            options: SurfaceOptions::default(),
            font: default_font(),
            elements: HashSet::new(),
            buffers: HashMap::new(),
            failing: HashSet::new(),
            next_serial: 0,
            log: CallLog::default(),
        }
    }

    pub fn with_options(mut self, options: SurfaceOptions) -> Self {
        self.options = options;
        self
    }

    /// Make an element with this handle id resolvable.
    pub fn with_element(mut self, id: HandleId) -> Self {
        self.elements.insert(id);
        self
    }

    /// Make every call to `method` fail with a surface error.
    pub fn with_failure(mut self, method: Method) -> Self {
        self.failing.insert(method);
        self
    }

    pub fn log(&self) -> CallLog {
        self.log.clone()
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn options(&self) -> SurfaceOptions {
        self.options
    }

    fn check_failure(&self, method: Method) -> Result<()> {
        if self.failing.contains(&method) {
            return Err(CanvexError::Surface(format!("{method} failed")));
        }
        Ok(())
    }
}

fn default_font() -> String {
    "10px sans-serif".into()
}

fn render_value(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "?".into())
}

fn render_arg(arg: &ArgOf<RecordingSurface>) -> String {
    match arg {
        NativeArg::Value(v) => render_value(v),
        NativeArg::Element(e) => format!("element#{}", e.id),
        NativeArg::Object(o) => match o.kind {
            RecordedKind::Gradient => format!("gradient#{}", o.serial),
            RecordedKind::Pattern => format!("pattern#{}", o.serial),
        },
        NativeArg::Construct { class, args } => {
            let inner: Vec<String> = args.iter().map(render_value).collect();
            format!("new {class}({})", inner.join(", "))
        }
    }
}

/// Pixel size from a CSS font shorthand such as `bold 12px serif`.
fn font_px(font: &str) -> f64 {
    font.split_whitespace()
        .find_map(|part| part.strip_suffix("px").and_then(|n| n.parse::<f64>().ok()))
        .unwrap_or(10.0)
}

impl Surface for RecordingSurface {
    type Element = RecordedElement;
    type Object = RecordedObject;

    fn invoke(&mut self, method: Method, args: Vec<ArgOf<Self>>) -> Result<Option<RecordedObject>> {
        self.check_failure(method)?;
        self.log.push(NativeCall::Call {
            method: method.as_str().to_string(),
            args: args.iter().map(render_arg).collect(),
        });

        if !method.creates_composite() {
            return Ok(None);
        }
        self.next_serial += 1;
        let kind = if method == Method::CreatePattern {
            RecordedKind::Pattern
        } else {
            RecordedKind::Gradient
        };
        Ok(Some(RecordedObject {
            serial: self.next_serial,
            kind,
        }))
    }

    fn set_property(&mut self, property: Property, value: ArgOf<Self>) -> Result<()> {
        if property == Property::Font {
            if let NativeArg::Value(Value::Str(font)) = &value {
                self.font = font.clone();
            }
        }
        self.log.push(NativeCall::Set {
            property: property.as_str().to_string(),
            value: render_arg(&value),
        });
        Ok(())
    }

    fn object_supports(&self, object: &RecordedObject, method: Method) -> bool {
        match object.kind {
            RecordedKind::Gradient => method == Method::AddColorStop,
            RecordedKind::Pattern => method == Method::SetTransform,
        }
    }

    fn invoke_object(
        &mut self,
        object: &RecordedObject,
        method: Method,
        args: Vec<ArgOf<Self>>,
    ) -> Result<()> {
        self.check_failure(method)?;
        self.log.push(NativeCall::ObjectCall {
            object: object.serial,
            method: method.as_str().to_string(),
            args: args.iter().map(render_arg).collect(),
        });
        Ok(())
    }

    fn lookup_element(&mut self, id: HandleId) -> Option<RecordedElement> {
        self.elements
            .contains(&id)
            .then_some(RecordedElement { id })
    }

    fn reset(&mut self, width: u32, height: u32, options: SurfaceOptions) -> Result<()> {
        self.width = width;
        self.height = height;
        self.options = options;
        self.font = default_font();
        self.log.push(NativeCall::Reset { width, height });
        Ok(())
    }

    fn create_image_buffer(&mut self, buffer: BufferHandle) -> Result<()> {
        self.buffers.insert(buffer.id, buffer);
        self.log.push(NativeCall::CreateBuffer {
            id: buffer.id,
            width: buffer.width,
            height: buffer.height,
        });
        Ok(())
    }

    fn put_image_buffer(&mut self, buffer: BufferHandle, rgba: &[u8], x: i32, y: i32) -> Result<()> {
        if !self.buffers.contains_key(&buffer.id) {
            return Err(CanvexError::Surface(format!(
                "image buffer {} was never created",
                buffer.id
            )));
        }
        self.log.push(NativeCall::PutBuffer {
            id: buffer.id,
            bytes: rgba.len(),
            x,
            y,
        });
        Ok(())
    }

    fn measure_text(&mut self, text: &str) -> Result<TextMetrics> {
        self.log.push(NativeCall::MeasureText {
            text: text.to_string(),
        });
        let px = font_px(&self.font);
        let width = text.chars().count() as f64 * px * 0.6;
        Ok(TextMetrics {
            width,
            actual_bounding_box_right: width,
            font_bounding_box_ascent: px * 0.8,
            font_bounding_box_descent: px * 0.2,
            actual_bounding_box_ascent: px * 0.7,
            actual_bounding_box_descent: px * 0.15,
            em_height_ascent: px * 0.8,
            em_height_descent: px * 0.2,
            hanging_baseline: px * 0.6,
            ideographic_baseline: -px * 0.2,
            ..TextMetrics::default()
        })
    }

    fn release(&mut self) {
        self.buffers.clear();
        self.log.push(NativeCall::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_font_px() {
        assert_eq!(font_px("bold 12px serif"), 12.0);
        assert_eq!(font_px("italic serif"), 10.0);
    }

    #[test]
    fn test_measure_text_follows_font() {
        let mut surface = RecordingSurface::new(10, 10);
        let narrow = surface.measure_text("abcd").unwrap();
        surface
            .set_property(Property::Font, NativeArg::Value("20px mono".into()))
            .unwrap();
        let wide = surface.measure_text("abcd").unwrap();
        assert_eq!(wide.width, narrow.width * 2.0);
    }

    #[test]
    fn test_failure_injection() {
        let mut surface = RecordingSurface::new(10, 10).with_failure(Method::Clip);
        assert!(surface.invoke(Method::Clip, vec![]).is_err());
        assert!(surface.invoke(Method::Fill, vec![]).is_ok());
        assert_eq!(surface.log().names(), ["fill"]);
    }

    #[test]
    fn test_put_into_unknown_buffer_fails() {
        let mut surface = RecordingSurface::new(10, 10);
        let buffer = BufferHandle {
            id: 1,
            width: 1,
            height: 1,
        };
        assert!(surface.put_image_buffer(buffer, &[0; 4], 0, 0).is_err());
        surface.create_image_buffer(buffer).unwrap();
        assert!(surface.put_image_buffer(buffer, &[0; 4], 0, 0).is_ok());
    }
}
