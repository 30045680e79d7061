use serde::{Deserialize, Serialize};

/// Color space of a 2D rendering context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorSpace {
    #[default]
    #[serde(rename = "srgb")]
    Srgb,
    #[serde(rename = "display-p3")]
    DisplayP3,
}

impl ColorSpace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Srgb => "srgb",
            Self::DisplayP3 => "display-p3",
        }
    }
}

/// Creation hints for the native 2D context. They only affect how the
/// native side acquires its context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurfaceOptions {
    /// Whether the backdrop has an alpha channel. `false` lets the native side
    /// assume an opaque backdrop.
    pub alpha: bool,
    /// Desynchronize the paint cycle from the event loop for lower latency.
    pub desynchronized: bool,
    pub color_space: ColorSpace,
    /// Hint that pixels will be read back often (forces a software context).
    pub will_read_frequently: bool,
}

impl Default for SurfaceOptions {
    fn default() -> Self {
        Self {
            alpha: false,
            desynchronized: true,
            color_space: ColorSpace::Srgb,
            will_read_frequently: false,
        }
    }
}

macro_rules! css_keyword {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $css:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $css)]
                $variant,
            )+
        }

        impl $name {
            /// The keyword as it appears on the native context.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $css,)+
                }
            }

            pub fn parse(value: &str) -> Option<Self> {
                match value {
                    $($css => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

css_keyword! {
    TextAlign {
        Left => "left",
        Right => "right",
        Center => "center",
        Start => "start",
        End => "end",
    }
}

css_keyword! {
    TextBaseline {
        Top => "top",
        Hanging => "hanging",
        Middle => "middle",
        Alphabetic => "alphabetic",
        Ideographic => "ideographic",
        Bottom => "bottom",
    }
}

css_keyword! {
    TextRendering {
        Auto => "auto",
        OptimizeSpeed => "optimizeSpeed",
        OptimizeLegibility => "optimizeLegibility",
        GeometricPrecision => "geometricPrecision",
    }
}

css_keyword! {
    ImageSmoothingQuality {
        Low => "low",
        Medium => "medium",
        High => "high",
    }
}

css_keyword! {
    /// Repetition mode for patterns.
    RepeatPattern {
        Repeat => "repeat",
        RepeatX => "repeat-x",
        RepeatY => "repeat-y",
        NoRepeat => "no-repeat",
    }
}

css_keyword! {
    CompositeOperation {
        SourceOver => "source-over",
        SourceIn => "source-in",
        SourceOut => "source-out",
        SourceAtop => "source-atop",
        DestinationOver => "destination-over",
        DestinationIn => "destination-in",
        DestinationOut => "destination-out",
        DestinationAtop => "destination-atop",
        Lighter => "lighter",
        Copy => "copy",
        Xor => "xor",
        Multiply => "multiply",
        Screen => "screen",
        Overlay => "overlay",
        Darken => "darken",
        Lighten => "lighten",
        ColorDodge => "color-dodge",
        ColorBurn => "color-burn",
        HardLight => "hard-light",
        SoftLight => "soft-light",
        Difference => "difference",
        Exclusion => "exclusion",
        Hue => "hue",
        Saturation => "saturation",
        Color => "color",
        Luminosity => "luminosity",
    }
}

impl Default for TextAlign {
    fn default() -> Self {
        Self::Start
    }
}

impl Default for TextBaseline {
    fn default() -> Self {
        Self::Alphabetic
    }
}

impl Default for TextRendering {
    fn default() -> Self {
        Self::Auto
    }
}

impl Default for ImageSmoothingQuality {
    fn default() -> Self {
        Self::Low
    }
}

impl Default for CompositeOperation {
    fn default() -> Self {
        Self::SourceOver
    }
}

/// A CSS filter chain, e.g. `blur(2px) grayscale(50%)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Filter(String);

impl Filter {
    pub fn none() -> Self {
        Self("none".into())
    }

    /// A filter given as a CSS string, taken verbatim.
    pub fn raw(css: impl Into<String>) -> Self {
        Self(css.into())
    }

    pub fn url(url: &str) -> Self {
        Self(format!("url({url})"))
    }

    pub fn blur(px: f64) -> Self {
        Self(format!("blur({}px)", fmt_num(px)))
    }

    pub fn brightness(percent: f64) -> Self {
        Self(format!("brightness({}%)", fmt_num(percent)))
    }

    pub fn contrast(percent: f64) -> Self {
        Self(format!("contrast({}%)", fmt_num(percent)))
    }

    pub fn drop_shadow(offset_x: f64, offset_y: f64, blur_radius: f64, color: &str) -> Self {
        Self(format!(
            "drop-shadow({}px {}px {}px {color})",
            fmt_num(offset_x),
            fmt_num(offset_y),
            fmt_num(blur_radius)
        ))
    }

    pub fn grayscale(percent: f64) -> Self {
        Self(format!("grayscale({}%)", fmt_num(percent)))
    }

    pub fn hue_rotate(deg: f64) -> Self {
        Self(format!("hue-rotate({}deg)", fmt_num(deg)))
    }

    pub fn invert(percent: f64) -> Self {
        Self(format!("invert({}%)", fmt_num(percent)))
    }

    pub fn opacity(percent: f64) -> Self {
        Self(format!("opacity({}%)", fmt_num(percent)))
    }

    pub fn saturate(percent: f64) -> Self {
        Self(format!("saturate({}%)", fmt_num(percent)))
    }

    pub fn sepia(percent: f64) -> Self {
        Self(format!("sepia({}%)", fmt_num(percent)))
    }

    /// Chain several filters, applied left to right.
    pub fn combine(filters: &[Filter]) -> Self {
        Self(
            filters
                .iter()
                .map(|f| f.0.as_str())
                .collect::<Vec<_>>()
                .join(" "),
        )
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Filter {
    fn default() -> Self {
        Self::none()
    }
}

/// At most two decimals, trailing zeros trimmed.
fn fmt_num(value: f64) -> String {
    let s = format!("{value:.2}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s.is_empty() || s == "-" { "0".into() } else { s.to_string() }
}

/// An RGBA8 pixel buffer allocated on the native side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BufferHandle {
    pub id: u32,
    pub width: u32,
    pub height: u32,
}

impl BufferHandle {
    /// Number of bytes a full upload must carry: 4 per pixel, row-major.
    pub fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

/// Result of a `measureText` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TextMetrics {
    pub width: f64,
    pub actual_bounding_box_left: f64,
    pub actual_bounding_box_right: f64,
    pub font_bounding_box_ascent: f64,
    pub font_bounding_box_descent: f64,
    pub actual_bounding_box_ascent: f64,
    pub actual_bounding_box_descent: f64,
    pub em_height_ascent: f64,
    pub em_height_descent: f64,
    pub hanging_baseline: f64,
    pub alphabetic_baseline: f64,
    pub ideographic_baseline: f64,
}
