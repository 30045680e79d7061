//! Gradients and a tiled pattern, kept alive across frames by handle.
//!
//! The gradient is rebuilt once per `REBUILD_EVERY` frames with a shifted
//! end point, so it gets a fresh handle; every other frame reuses the
//! registered native objects.

use canvex_canvas::{FrameHandler, Gradient, Pattern, RenderContext};
use canvex_core::events::{FrameTick, InputEvent};
use canvex_core::types::RepeatPattern;
use tracing::{debug, warn};

use super::SAMPLE_IMAGE_ID;

const REBUILD_EVERY: u64 = 60;
const STOPS: [&str; 4] = ["#1d4ed8", "#9333ea", "#db2777", "#f59e0b"];

#[derive(Default)]
pub struct GradientSample {
    frame: u64,
    gradient: Option<Gradient>,
    halo: Option<Gradient>,
    pattern: Option<Pattern>,
}

impl GradientSample {
    pub fn new() -> Self {
        Self::default()
    }

    fn build_gradient(&self, ctx: &mut RenderContext) -> Gradient {
        let shift = (self.frame / REBUILD_EVERY) as f64 * 10.0;
        let gradient = ctx.create_linear_gradient(0.0, 0.0, ctx.width() as f64, shift);
        let last = (STOPS.len() - 1) as f64;
        for (i, color) in STOPS.iter().enumerate() {
            ctx.add_color_stop(&gradient, i as f64 / last, color);
        }
        debug!(handle = gradient.handle().id, "Gradient rebuilt");
        gradient
    }

    fn build_halo(ctx: &mut RenderContext) -> Gradient {
        let (cx, cy) = (ctx.width() as f64 / 2.0, ctx.height() as f64 / 2.0);
        let halo = ctx.create_radial_gradient(cx, cy, 0.0, cx, cy, cx.min(cy));
        ctx.add_color_stop(&halo, 0.0, "rgba(255, 255, 255, 0.8)");
        ctx.add_color_stop(&halo, 1.0, "rgba(255, 255, 255, 0)");
        halo
    }

    fn build_pattern(ctx: &mut RenderContext) -> Option<Pattern> {
        match ctx.image(&SAMPLE_IMAGE_ID.to_string()) {
            Ok(image) => Some(ctx.create_pattern(&image, RepeatPattern::Repeat)),
            Err(e) => {
                warn!(error = %e, "No pattern source");
                None
            }
        }
    }
}

impl FrameHandler for GradientSample {
    fn on_frame(&mut self, ctx: &mut RenderContext, tick: &FrameTick) {
        let (w, h) = (ctx.width() as f64, ctx.height() as f64);

        if self.frame % REBUILD_EVERY == 0 || self.gradient.is_none() {
            self.gradient = Some(self.build_gradient(ctx));
        }
        if self.pattern.is_none() {
            self.pattern = Self::build_pattern(ctx);
        }
        let halo = self.halo.get_or_insert_with(|| Self::build_halo(ctx)).clone();

        ctx.clear_rect(0.0, 0.0, w, h);
        if let Some(gradient) = &self.gradient {
            ctx.set_fill_style(gradient);
            ctx.fill_rect(0.0, 0.0, w, h / 2.0);
        }

        if let Some(pattern) = &self.pattern {
            let angle = tick.timestamp / 1000.0;
            let (sin, cos) = angle.sin_cos();
            ctx.set_pattern_transform(pattern, cos, sin, -sin, cos, 0.0, 0.0);
            ctx.set_fill_style(pattern);
            ctx.fill_rect(0.0, h / 2.0, w, h / 2.0);
        }

        ctx.set_stroke_style(&halo);
        ctx.set_line_width(4.0);
        ctx.begin_path();
        ctx.arc(w / 2.0, h / 2.0, w.min(h) / 3.0, 0.0, std::f64::consts::TAU, false);
        ctx.stroke();

        self.frame += 1;
    }

    fn on_event(&mut self, ctx: &mut RenderContext, event: &InputEvent) {
        // a fresh native context forgets line width and stroke style
        if let InputEvent::Resize(_) = event {
            let stroke = ctx.stroke_style().clone();
            let width = ctx.line_width();
            ctx.set_stroke_style(stroke);
            ctx.set_line_width(width);
            self.halo = None;
        }
    }
}
