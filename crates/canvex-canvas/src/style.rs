//! Mirror of the settable context state.

use canvex_core::protocol::{Property, StyleValue, Value};
use canvex_core::types::{
    CompositeOperation, Filter, ImageSmoothingQuality, TextAlign, TextBaseline, TextRendering,
};

/// Last-known values of the context's style properties.
///
/// The application keeps one so it can read back what it set without a
/// boundary crossing; the applier keeps one that tracks the live context.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleState {
    pub fill_style: StyleValue,
    pub stroke_style: StyleValue,
    pub line_width: f64,
    pub line_dash: Vec<f64>,
    pub font: String,
    pub text_align: TextAlign,
    pub text_baseline: TextBaseline,
    pub text_rendering: TextRendering,
    pub filter: Filter,
    pub global_alpha: f64,
    pub composite_operation: CompositeOperation,
    pub shadow_color: String,
    pub shadow_blur: f64,
    pub shadow_offset_x: f64,
    pub shadow_offset_y: f64,
    pub image_smoothing_enabled: bool,
    pub image_smoothing_quality: ImageSmoothingQuality,
}

impl Default for StyleState {
    fn default() -> Self {
        Self {
            fill_style: StyleValue::default(),
            stroke_style: StyleValue::default(),
            line_width: 1.0,
            line_dash: Vec::new(),
            font: "10px sans-serif".into(),
            text_align: TextAlign::default(),
            text_baseline: TextBaseline::default(),
            text_rendering: TextRendering::default(),
            filter: Filter::default(),
            global_alpha: 1.0,
            composite_operation: CompositeOperation::default(),
            shadow_color: "rgba(0, 0, 0, 0)".into(),
            shadow_blur: 0.0,
            shadow_offset_x: 0.0,
            shadow_offset_y: 0.0,
            image_smoothing_enabled: true,
            image_smoothing_quality: ImageSmoothingQuality::default(),
        }
    }
}

impl StyleState {
    /// Record an assignment coming off the wire. Values of the wrong shape
    /// leave the field untouched, as a real context ignores them.
    ///
    /// Fill and stroke style are resolved by the caller and go through
    /// [`StyleState::set_style`].
    pub fn apply(&mut self, property: Property, value: &Value) {
        match property {
            Property::FillStyle | Property::StrokeStyle => {
                if let Some(color) = value.as_str() {
                    self.set_style(property, StyleValue::Color(color.to_string()));
                }
            }
            Property::LineWidth => {
                // non-positive widths are ignored by the context
                if let Some(w) = value.as_f64().filter(|w| *w > 0.0) {
                    self.line_width = w;
                }
            }
            Property::Font => {
                if let Some(font) = value.as_str() {
                    self.font = font.to_string();
                }
            }
            Property::TextAlign => {
                if let Some(v) = value.as_str().and_then(TextAlign::parse) {
                    self.text_align = v;
                }
            }
            Property::TextBaseline => {
                if let Some(v) = value.as_str().and_then(TextBaseline::parse) {
                    self.text_baseline = v;
                }
            }
            Property::TextRendering => {
                if let Some(v) = value.as_str().and_then(TextRendering::parse) {
                    self.text_rendering = v;
                }
            }
            Property::Filter => {
                if let Some(v) = value.as_str() {
                    self.filter = Filter::raw(v);
                }
            }
            Property::GlobalAlpha => {
                if let Some(a) = value.as_f64().filter(|a| (0.0..=1.0).contains(a)) {
                    self.global_alpha = a;
                }
            }
            Property::GlobalCompositeOperation => {
                if let Some(v) = value.as_str().and_then(CompositeOperation::parse) {
                    self.composite_operation = v;
                }
            }
            Property::ImageSmoothingEnabled => {
                if let Some(b) = value.as_bool() {
                    self.image_smoothing_enabled = b;
                }
            }
            Property::ImageSmoothingQuality => {
                if let Some(v) = value.as_str().and_then(ImageSmoothingQuality::parse) {
                    self.image_smoothing_quality = v;
                }
            }
            Property::ShadowColor => {
                if let Some(c) = value.as_str() {
                    self.shadow_color = c.to_string();
                }
            }
            Property::ShadowBlur => {
                if let Some(b) = value.as_f64().filter(|b| *b >= 0.0) {
                    self.shadow_blur = b;
                }
            }
            Property::ShadowOffsetX => {
                if let Some(x) = value.as_f64() {
                    self.shadow_offset_x = x;
                }
            }
            Property::ShadowOffsetY => {
                if let Some(y) = value.as_f64() {
                    self.shadow_offset_y = y;
                }
            }
        }
    }

    pub fn set_style(&mut self, property: Property, style: StyleValue) {
        match property {
            Property::StrokeStyle => self.stroke_style = style,
            _ => self.fill_style = style,
        }
    }

    pub fn set_line_dash(&mut self, args: &[Value]) {
        let segments: Option<Vec<f64>> = match args.first() {
            Some(Value::Array(items)) => items.iter().map(Value::as_f64).collect(),
            _ => None,
        };
        if let Some(s) = segments.filter(|s| s.iter().all(|n| n.is_finite() && *n >= 0.0)) {
            self.line_dash = s;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_updates_typed_fields() {
        let mut style = StyleState::default();
        style.apply(Property::TextAlign, &Value::from("center"));
        style.apply(Property::GlobalAlpha, &Value::from(0.5));
        style.apply(Property::GlobalCompositeOperation, &Value::from("xor"));
        style.apply(Property::FillStyle, &Value::from("red"));

        assert_eq!(style.text_align, TextAlign::Center);
        assert_eq!(style.global_alpha, 0.5);
        assert_eq!(style.composite_operation, CompositeOperation::Xor);
        assert_eq!(style.fill_style, StyleValue::Color("red".into()));
    }

    #[test]
    fn test_apply_ignores_invalid_values() {
        let mut style = StyleState::default();
        style.apply(Property::LineWidth, &Value::from(-2));
        style.apply(Property::GlobalAlpha, &Value::from(3));
        style.apply(Property::TextBaseline, &Value::from("sideways"));
        assert_eq!(style, StyleState::default());
    }

    #[test]
    fn test_set_line_dash() {
        let mut style = StyleState::default();
        style.set_line_dash(&[Value::Array(vec![4.into(), 2.into()])]);
        assert_eq!(style.line_dash, vec![4.0, 2.0]);

        style.set_line_dash(&[Value::Array(vec![Value::from(-1)])]);
        assert_eq!(style.line_dash, vec![4.0, 2.0]);
    }
}
