//! Application-side drawing API.
//!
//! Every call only enqueues an operation; nothing crosses the boundary until
//! the frame driver flushes the session. Style setters also update a local
//! mirror so getters never need a round trip.

use canvex_core::error::{CanvexError, Result};
use canvex_core::protocol::{Handle, Method, Operation, Property, StyleValue, Value};
use canvex_core::types::{
    BufferHandle, CompositeOperation, Filter, ImageSmoothingQuality, RepeatPattern, TextAlign,
    TextBaseline, TextRendering,
};

use crate::handles::HandlePool;
use crate::queue::OperationQueue;
use crate::style::StyleState;

/// Constructor the native side wraps pattern transforms in.
const MATRIX_CONSTRUCTOR: &str = "DOMMatrix";

/// Proxy for a gradient that may not exist natively yet.
#[derive(Debug, Clone, PartialEq)]
pub struct Gradient {
    handle: Handle,
}

impl Gradient {
    pub fn handle(&self) -> &Handle {
        &self.handle
    }
}

impl From<&Gradient> for StyleValue {
    fn from(g: &Gradient) -> Self {
        StyleValue::Gradient(g.handle.clone())
    }
}

/// Proxy for a pattern that may not exist natively yet.
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    handle: Handle,
}

impl Pattern {
    pub fn handle(&self) -> &Handle {
        &self.handle
    }
}

impl From<&Pattern> for StyleValue {
    fn from(p: &Pattern) -> Self {
        StyleValue::Pattern(p.handle.clone())
    }
}

/// Pixel work. Sent in sequence with the frame's operations.
#[derive(Debug, Clone, PartialEq)]
pub enum BufferCommand {
    Create(BufferHandle),
    Put {
        buffer: BufferHandle,
        rgba: Vec<u8>,
        x: i32,
        y: i32,
    },
}

impl BufferCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Create(_) => "createImageBuffer",
            Self::Put { .. } => "putImageBuffer",
        }
    }
}

/// A buffer command and the number of operations queued before it.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingBuffer {
    pub at: usize,
    pub command: BufferCommand,
}

/// Everything one frame queued, ready to flush.
#[derive(Debug, Default)]
pub struct FrameBatch {
    pub ops: Vec<Operation>,
    /// Ordered by `at`; each lands between `ops[..at]` and `ops[at..]`.
    pub buffers: Vec<PendingBuffer>,
}

#[derive(Debug)]
pub struct RenderContext {
    width: u32,
    height: u32,
    queue: OperationQueue,
    handles: HandlePool,
    style: StyleState,
    saved: Vec<StyleState>,
    buffers: Vec<PendingBuffer>,
    next_buffer: u32,
}

impl RenderContext {
    pub fn new(width: u32, height: u32, handle_warn_threshold: usize) -> Self {
        Self {
            width,
            height,
            queue: OperationQueue::new(),
            handles: HandlePool::new(handle_warn_threshold),
            style: StyleState::default(),
            saved: Vec::new(),
            buffers: Vec::new(),
            next_buffer: 1,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Mirror of every style property set so far.
    pub fn style(&self) -> &StyleState {
        &self.style
    }

    pub fn handles(&self) -> &HandlePool {
        &self.handles
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn enqueue(&mut self, op: Operation) {
        self.queue.enqueue(op);
    }

    /// Drain the queued operations. Pending buffer commands stay queued and
    /// now come before anything enqueued later.
    pub fn take_batch(&mut self) -> Vec<Operation> {
        for pending in &mut self.buffers {
            pending.at = 0;
        }
        self.queue.drain_all()
    }

    /// Drain the whole frame: operations and the pixel work between them.
    pub fn take_frame(&mut self) -> FrameBatch {
        FrameBatch {
            ops: self.queue.drain_all(),
            buffers: std::mem::take(&mut self.buffers),
        }
    }

    /// Put back buffer creations a failed flush never delivered. The
    /// application already holds their handles, so they go out first in
    /// the next frame. Uploads belonged to the dropped frame and are not
    /// kept.
    pub fn requeue_creates(&mut self, unsent: impl IntoIterator<Item = PendingBuffer>) {
        let creates: Vec<PendingBuffer> = unsent
            .into_iter()
            .filter(|p| matches!(p.command, BufferCommand::Create(_)))
            .map(|p| PendingBuffer { at: 0, ..p })
            .collect();
        self.buffers.splice(0..0, creates);
    }

    fn push_buffer(&mut self, command: BufferCommand) {
        self.buffers.push(PendingBuffer {
            at: self.queue.len(),
            command,
        });
    }

    /// Drop everything pending; returns how many operations were dropped.
    pub fn discard(&mut self) -> usize {
        self.buffers.clear();
        self.queue.discard()
    }

    /// The surface was resized. The style mirror keeps its values so the
    /// application can resend them; the native context starts from defaults
    /// with an empty save stack, so the mirrored one is dropped too.
    pub fn resized(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.saved.clear();
    }

    fn call(&mut self, method: Method, args: Vec<Value>) {
        self.queue.enqueue(Operation::call(method, args));
    }

    fn set(&mut self, property: Property, value: impl Into<Value>) {
        let value = value.into();
        self.style.apply(property, &value);
        self.queue.enqueue(Operation::set(property, value));
    }

    /// Pre-assign a handle to a composite-producing call and enqueue it.
    fn create_composite(&mut self, method: Method, args: Vec<Value>) -> Handle {
        let mut key = Vec::with_capacity(args.len() + 1);
        key.push(Value::from(method.as_str()));
        key.extend(args.iter().cloned());
        let handle = self.handles.handle_for_args(&key);

        let mut call_args = Vec::with_capacity(args.len() + 1);
        call_args.push(Value::Handle(handle.clone()));
        call_args.extend(args);
        self.call(method, call_args);
        handle
    }

    // Rectangles

    pub fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
        self.call(Method::FillRect, nums(&[x, y, w, h]));
    }

    pub fn stroke_rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
        self.call(Method::StrokeRect, nums(&[x, y, w, h]));
    }

    pub fn clear_rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
        self.call(Method::ClearRect, nums(&[x, y, w, h]));
    }

    // Paths

    pub fn begin_path(&mut self) {
        self.call(Method::BeginPath, Vec::new());
    }

    pub fn close_path(&mut self) {
        self.call(Method::ClosePath, Vec::new());
    }

    pub fn move_to(&mut self, x: f64, y: f64) {
        self.call(Method::MoveTo, nums(&[x, y]));
    }

    pub fn line_to(&mut self, x: f64, y: f64) {
        self.call(Method::LineTo, nums(&[x, y]));
    }

    pub fn arc(&mut self, x: f64, y: f64, radius: f64, start: f64, end: f64, ccw: bool) {
        let mut args = nums(&[x, y, radius, start, end]);
        args.push(ccw.into());
        self.call(Method::Arc, args);
    }

    pub fn arc_to(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, radius: f64) {
        self.call(Method::ArcTo, nums(&[x1, y1, x2, y2, radius]));
    }

    pub fn rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
        self.call(Method::Rect, nums(&[x, y, w, h]));
    }

    pub fn round_rect(&mut self, x: f64, y: f64, w: f64, h: f64, radii: &[f64]) {
        let mut args = nums(&[x, y, w, h]);
        args.push(Value::from(radii));
        self.call(Method::RoundRect, args);
    }

    #[allow(clippy::too_many_arguments)]
    pub fn ellipse(
        &mut self,
        x: f64,
        y: f64,
        radius_x: f64,
        radius_y: f64,
        rotation: f64,
        start: f64,
        end: f64,
        ccw: bool,
    ) {
        let mut args = nums(&[x, y, radius_x, radius_y, rotation, start, end]);
        args.push(ccw.into());
        self.call(Method::Ellipse, args);
    }

    pub fn quadratic_curve_to(&mut self, cpx: f64, cpy: f64, x: f64, y: f64) {
        self.call(Method::QuadraticCurveTo, nums(&[cpx, cpy, x, y]));
    }

    pub fn bezier_curve_to(&mut self, cp1x: f64, cp1y: f64, cp2x: f64, cp2y: f64, x: f64, y: f64) {
        self.call(Method::BezierCurveTo, nums(&[cp1x, cp1y, cp2x, cp2y, x, y]));
    }

    pub fn fill(&mut self) {
        self.call(Method::Fill, Vec::new());
    }

    pub fn stroke(&mut self) {
        self.call(Method::Stroke, Vec::new());
    }

    pub fn clip(&mut self) {
        self.call(Method::Clip, Vec::new());
    }

    // Text

    pub fn fill_text(&mut self, text: &str, x: f64, y: f64) {
        self.call(Method::FillText, vec![text.into(), x.into(), y.into()]);
    }

    pub fn fill_text_max(&mut self, text: &str, x: f64, y: f64, max_width: f64) {
        self.call(
            Method::FillText,
            vec![text.into(), x.into(), y.into(), max_width.into()],
        );
    }

    pub fn stroke_text(&mut self, text: &str, x: f64, y: f64) {
        self.call(Method::StrokeText, vec![text.into(), x.into(), y.into()]);
    }

    // Images

    /// Handle for a native image element addressed by a stable key.
    pub fn image(&mut self, key: &str) -> Result<Handle> {
        self.handles.handle_for_element(key)
    }

    pub fn draw_image(&mut self, image: &Handle, dx: f64, dy: f64) {
        self.call(
            Method::DrawImage,
            vec![image.clone().into(), dx.into(), dy.into()],
        );
    }

    pub fn draw_image_scaled(&mut self, image: &Handle, dx: f64, dy: f64, dw: f64, dh: f64) {
        let mut args = vec![Value::Handle(image.clone())];
        args.extend(nums(&[dx, dy, dw, dh]));
        self.call(Method::DrawImage, args);
    }

    /// Draw the `(sx, sy, sw, sh)` region of `image` into `(dx, dy, dw, dh)`.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_image_region(
        &mut self,
        image: &Handle,
        sx: f64,
        sy: f64,
        sw: f64,
        sh: f64,
        dx: f64,
        dy: f64,
        dw: f64,
        dh: f64,
    ) {
        let mut args = vec![Value::Handle(image.clone())];
        args.extend(nums(&[sx, sy, sw, sh, dx, dy, dw, dh]));
        self.call(Method::DrawImage, args);
    }

    // Gradients and patterns

    pub fn create_linear_gradient(&mut self, x0: f64, y0: f64, x1: f64, y1: f64) -> Gradient {
        let handle = self.create_composite(Method::CreateLinearGradient, nums(&[x0, y0, x1, y1]));
        Gradient { handle }
    }

    pub fn create_radial_gradient(
        &mut self,
        x0: f64,
        y0: f64,
        r0: f64,
        x1: f64,
        y1: f64,
        r1: f64,
    ) -> Gradient {
        let handle = self.create_composite(
            Method::CreateRadialGradient,
            nums(&[x0, y0, r0, x1, y1, r1]),
        );
        Gradient { handle }
    }

    pub fn create_conic_gradient(&mut self, start_angle: f64, x: f64, y: f64) -> Gradient {
        let handle = self.create_composite(Method::CreateConicGradient, nums(&[start_angle, x, y]));
        Gradient { handle }
    }

    pub fn add_color_stop(&mut self, gradient: &Gradient, offset: f64, color: &str) {
        self.call(
            Method::AddColorStop,
            vec![gradient.handle.clone().into(), offset.into(), color.into()],
        );
    }

    pub fn create_pattern(&mut self, image: &Handle, repetition: RepeatPattern) -> Pattern {
        let handle = self.create_composite(
            Method::CreatePattern,
            vec![image.clone().into(), repetition.as_str().into()],
        );
        Pattern { handle }
    }

    /// 2D transform of a pattern, as the `a..f` of a matrix.
    #[allow(clippy::too_many_arguments)]
    pub fn set_pattern_transform(
        &mut self,
        pattern: &Pattern,
        a: f64,
        b: f64,
        c: f64,
        d: f64,
        e: f64,
        f: f64,
    ) {
        self.pattern_matrix(pattern, &[a, b, c, d, e, f]);
    }

    /// 3D transform of a pattern, column-major 4x4.
    pub fn set_pattern_transform_3d(&mut self, pattern: &Pattern, matrix: &[f64; 16]) {
        self.pattern_matrix(pattern, matrix);
    }

    fn pattern_matrix(&mut self, pattern: &Pattern, matrix: &[f64]) {
        let target = pattern.handle.with_constructor(MATRIX_CONSTRUCTOR);
        self.call(
            Method::SetTransform,
            vec![target.into(), Value::from(matrix)],
        );
    }

    // State and transforms

    pub fn save(&mut self) {
        self.saved.push(self.style.clone());
        self.call(Method::Save, Vec::new());
    }

    pub fn restore(&mut self) {
        if let Some(style) = self.saved.pop() {
            self.style = style;
        }
        self.call(Method::Restore, Vec::new());
    }

    pub fn translate(&mut self, x: f64, y: f64) {
        self.call(Method::Translate, nums(&[x, y]));
    }

    pub fn rotate(&mut self, angle: f64) {
        self.call(Method::Rotate, nums(&[angle]));
    }

    pub fn scale(&mut self, x: f64, y: f64) {
        self.call(Method::Scale, nums(&[x, y]));
    }

    pub fn set_transform(&mut self, a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) {
        self.call(Method::SetTransform, nums(&[a, b, c, d, e, f]));
    }

    pub fn transform(&mut self, a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) {
        self.call(Method::Transform, nums(&[a, b, c, d, e, f]));
    }

    pub fn reset_transform(&mut self) {
        self.call(Method::ResetTransform, Vec::new());
    }

    // Style

    pub fn set_fill_style(&mut self, style: impl Into<StyleValue>) {
        let style = style.into();
        self.queue
            .enqueue(Operation::set(Property::FillStyle, style.to_value()));
        self.style.fill_style = style;
    }

    pub fn fill_style(&self) -> &StyleValue {
        &self.style.fill_style
    }

    pub fn set_stroke_style(&mut self, style: impl Into<StyleValue>) {
        let style = style.into();
        self.queue
            .enqueue(Operation::set(Property::StrokeStyle, style.to_value()));
        self.style.stroke_style = style;
    }

    pub fn stroke_style(&self) -> &StyleValue {
        &self.style.stroke_style
    }

    pub fn set_line_width(&mut self, width: f64) {
        self.set(Property::LineWidth, width);
    }

    pub fn line_width(&self) -> f64 {
        self.style.line_width
    }

    pub fn set_line_dash(&mut self, segments: &[f64]) {
        let args = vec![Value::from(segments)];
        self.style.set_line_dash(&args);
        self.call(Method::SetLineDash, args);
    }

    pub fn line_dash(&self) -> &[f64] {
        &self.style.line_dash
    }

    pub fn set_font(&mut self, font: &str) {
        self.set(Property::Font, font);
    }

    pub fn font(&self) -> &str {
        &self.style.font
    }

    pub fn set_text_align(&mut self, align: TextAlign) {
        self.set(Property::TextAlign, align.as_str());
    }

    pub fn text_align(&self) -> TextAlign {
        self.style.text_align
    }

    pub fn set_text_baseline(&mut self, baseline: TextBaseline) {
        self.set(Property::TextBaseline, baseline.as_str());
    }

    pub fn text_baseline(&self) -> TextBaseline {
        self.style.text_baseline
    }

    pub fn set_text_rendering(&mut self, rendering: TextRendering) {
        self.set(Property::TextRendering, rendering.as_str());
    }

    pub fn text_rendering(&self) -> TextRendering {
        self.style.text_rendering
    }

    pub fn set_filter(&mut self, filter: &Filter) {
        self.set(Property::Filter, filter.as_str());
    }

    pub fn filter(&self) -> &Filter {
        &self.style.filter
    }

    pub fn set_global_alpha(&mut self, alpha: f64) {
        self.set(Property::GlobalAlpha, alpha);
    }

    pub fn global_alpha(&self) -> f64 {
        self.style.global_alpha
    }

    pub fn set_global_composite_operation(&mut self, op: CompositeOperation) {
        self.set(Property::GlobalCompositeOperation, op.as_str());
    }

    pub fn global_composite_operation(&self) -> CompositeOperation {
        self.style.composite_operation
    }

    pub fn set_shadow_color(&mut self, color: &str) {
        self.set(Property::ShadowColor, color);
    }

    pub fn shadow_color(&self) -> &str {
        &self.style.shadow_color
    }

    pub fn set_shadow_blur(&mut self, blur: f64) {
        self.set(Property::ShadowBlur, blur);
    }

    pub fn shadow_blur(&self) -> f64 {
        self.style.shadow_blur
    }

    pub fn set_shadow_offset_x(&mut self, x: f64) {
        self.set(Property::ShadowOffsetX, x);
    }

    pub fn shadow_offset_x(&self) -> f64 {
        self.style.shadow_offset_x
    }

    pub fn set_shadow_offset_y(&mut self, y: f64) {
        self.set(Property::ShadowOffsetY, y);
    }

    pub fn shadow_offset_y(&self) -> f64 {
        self.style.shadow_offset_y
    }

    pub fn set_image_smoothing_enabled(&mut self, enabled: bool) {
        self.set(Property::ImageSmoothingEnabled, enabled);
    }

    pub fn image_smoothing_enabled(&self) -> bool {
        self.style.image_smoothing_enabled
    }

    pub fn set_image_smoothing_quality(&mut self, quality: ImageSmoothingQuality) {
        self.set(Property::ImageSmoothingQuality, quality.as_str());
    }

    pub fn image_smoothing_quality(&self) -> ImageSmoothingQuality {
        self.style.image_smoothing_quality
    }

    // Pixel buffers

    /// Allocate an RGBA8 buffer. The native buffer is created when the
    /// session is next flushed, before any upload into it.
    pub fn create_image_buffer(&mut self, width: u32, height: u32) -> Result<BufferHandle> {
        if width == 0 || height == 0 {
            return Err(CanvexError::InvalidArgument(format!(
                "image buffer size {width}x{height} must be non-zero"
            )));
        }
        let buffer = BufferHandle {
            id: self.next_buffer,
            width,
            height,
        };
        self.next_buffer += 1;
        self.push_buffer(BufferCommand::Create(buffer));
        Ok(buffer)
    }

    /// Queue an upload of a full buffer of RGBA8 pixels, row-major, to be
    /// drawn at `(x, y)`.
    pub fn put_image_buffer(
        &mut self,
        buffer: &BufferHandle,
        rgba: Vec<u8>,
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
        self.push_buffer(BufferCommand::Put {
            buffer: *buffer,
            rgba,
            x,
            y,
        });
        Ok(())
    }
}

fn nums(values: &[f64]) -> Vec<Value> {
    values.iter().copied().map(Value::Number).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> RenderContext {
        RenderContext::new(100, 100, 1024)
    }

    #[test]
    fn test_calls_are_queued_not_applied() {
        let mut ctx = ctx();
        ctx.fill_rect(0.0, 0.0, 10.0, 10.0);
        ctx.set_line_width(2.0);
        assert_eq!(ctx.pending(), 2);

        let batch = ctx.take_batch();
        assert_eq!(batch[0].name(), "fillRect");
        assert_eq!(batch[1], Operation::set(Property::LineWidth, 2.0));
        assert_eq!(ctx.pending(), 0);
    }

    #[test]
    fn test_style_mirror_reads_back() {
        let mut ctx = ctx();
        ctx.set_fill_style("red");
        ctx.set_text_align(TextAlign::Center);
        ctx.set_line_dash(&[5.0, 3.0]);
        ctx.set_filter(&Filter::blur(2.0));

        assert_eq!(ctx.fill_style(), &StyleValue::Color("red".into()));
        assert_eq!(ctx.text_align(), TextAlign::Center);
        assert_eq!(ctx.line_dash(), &[5.0, 3.0]);
        assert_eq!(ctx.filter().as_str(), "blur(2px)");
    }

    #[test]
    fn test_gradient_handle_is_preassigned() {
        let mut ctx = ctx();
        let gradient = ctx.create_linear_gradient(0.0, 0.0, 50.0, 0.0);
        ctx.add_color_stop(&gradient, 0.0, "white");
        ctx.set_fill_style(&gradient);

        let batch = ctx.take_batch();
        assert_eq!(batch.len(), 3);
        let Operation::Call { method, args } = &batch[0] else {
            panic!("expected a call");
        };
        assert_eq!(*method, Method::CreateLinearGradient);
        assert_eq!(args[0], Value::Handle(gradient.handle().clone()));
        assert_eq!(
            batch[2],
            Operation::set(Property::FillStyle, gradient.handle().clone())
        );
        assert_eq!(ctx.fill_style(), &StyleValue::Gradient(gradient.handle().clone()));
    }

    #[test]
    fn test_same_gradient_args_share_handle() {
        let mut ctx = ctx();
        let a = ctx.create_linear_gradient(0.0, 0.0, 1.0, 1.0);
        let b = ctx.create_linear_gradient(0.0, 0.0, 1.0, 1.0);
        let radial = ctx.create_radial_gradient(0.0, 0.0, 1.0, 1.0, 0.0, 0.0);
        assert_eq!(a, b);
        assert_ne!(a.handle().id, radial.handle().id);
    }

    #[test]
    fn test_pattern_transform_uses_matrix_constructor() {
        let mut ctx = ctx();
        let image = ctx.image("tiles").unwrap();
        let pattern = ctx.create_pattern(&image, RepeatPattern::RepeatX);
        ctx.set_pattern_transform(&pattern, 1.0, 0.0, 0.0, 1.0, 10.0, 0.0);

        let batch = ctx.take_batch();
        let Operation::Call { method, args } = &batch[1] else {
            panic!("expected a call");
        };
        assert_eq!(*method, Method::SetTransform);
        let target = args[0].as_handle().unwrap();
        assert_eq!(target.id, pattern.handle().id);
        assert_eq!(target.constructor_name.as_deref(), Some("DOMMatrix"));
    }

    #[test]
    fn test_save_restore_mirror() {
        let mut ctx = ctx();
        ctx.set_global_alpha(0.5);
        ctx.save();
        ctx.set_global_alpha(0.1);
        ctx.restore();
        assert_eq!(ctx.global_alpha(), 0.5);
    }

    #[test]
    fn test_resized_keeps_mirror() {
        let mut ctx = ctx();
        ctx.set_fill_style("red");
        ctx.resized(300, 200);
        assert_eq!((ctx.width(), ctx.height()), (300, 200));
        assert_eq!(ctx.fill_style(), &StyleValue::Color("red".into()));
    }

    #[test]
    fn test_image_buffer_length_checked() {
        let mut ctx = ctx();
        let buffer = ctx.create_image_buffer(2, 3).unwrap();
        assert!(matches!(
            ctx.put_image_buffer(&buffer, vec![0; 23], 0, 0),
            Err(CanvexError::InvalidArgument(_))
        ));
        ctx.put_image_buffer(&buffer, vec![0; 24], 0, 0).unwrap();

        let frame = ctx.take_frame();
        assert_eq!(frame.buffers.len(), 2);
        assert_eq!(frame.buffers[0].command, BufferCommand::Create(buffer));
        assert!(ctx.create_image_buffer(0, 4).is_err());
    }

    #[test]
    fn test_buffer_commands_keep_their_position() {
        let mut ctx = ctx();
        ctx.clear_rect(0.0, 0.0, 2.0, 2.0);
        let buffer = ctx.create_image_buffer(1, 1).unwrap();
        ctx.put_image_buffer(&buffer, vec![0; 4], 0, 0).unwrap();
        ctx.fill_text("caption", 0.0, 0.0);

        let frame = ctx.take_frame();
        assert_eq!(frame.ops.len(), 2);
        let positions: Vec<usize> = frame.buffers.iter().map(|p| p.at).collect();
        assert_eq!(positions, [1, 1]);
        assert_eq!(frame.buffers[1].command.name(), "putImageBuffer");
    }

    #[test]
    fn test_requeue_keeps_only_creates() {
        let mut ctx = ctx();
        ctx.fill_rect(0.0, 0.0, 1.0, 1.0);
        let buffer = ctx.create_image_buffer(1, 1).unwrap();
        ctx.put_image_buffer(&buffer, vec![0; 4], 0, 0).unwrap();
        let frame = ctx.take_frame();

        ctx.fill_rect(1.0, 1.0, 1.0, 1.0);
        ctx.requeue_creates(frame.buffers);
        let next = ctx.take_frame();
        assert_eq!(
            next.buffers,
            vec![PendingBuffer {
                at: 0,
                command: BufferCommand::Create(buffer),
            }]
        );
    }

    #[test]
    fn test_resized_drops_saved_states() {
        let mut ctx = ctx();
        ctx.set_line_width(3.0);
        ctx.save();
        ctx.set_line_width(8.0);
        ctx.resized(50, 50);

        // nothing to restore natively; the mirror must agree
        ctx.restore();
        assert_eq!(ctx.line_width(), 8.0);
    }

    #[test]
    fn test_discard() {
        let mut ctx = ctx();
        ctx.begin_path();
        ctx.stroke();
        assert_eq!(ctx.discard(), 2);
        assert!(ctx.take_batch().is_empty());
    }
}
