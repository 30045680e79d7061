//! Operations, argument values and handles exchanged across the boundary.
//!
//! The in-memory form uses closed enums ([`Method`], [`Property`]); the
//! camelCase names only appear on the wire, inside [`WireOperation`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CanvexError, Result};

/// Identifier of a handle, unique within one session's pool.
pub type HandleId = u32;

/// Lightweight stand-in for an object that cannot be re-sent in full.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Handle {
    pub id: HandleId,

    /// True for a pre-existing native element (an image) looked up by key,
    /// false for an object created by an earlier drawing call.
    #[serde(rename = "isElementRef")]
    pub is_external_element: bool,

    /// When set, arguments of calls replayed against this handle are wrapped
    /// in the named constructor first (e.g. `DOMMatrix`).
    #[serde(
        rename = "classInitializer",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub constructor_name: Option<String>,
}

impl Handle {
    pub fn element(id: HandleId) -> Self {
        Self {
            id,
            is_external_element: true,
            constructor_name: None,
        }
    }

    pub fn composite(id: HandleId) -> Self {
        Self {
            id,
            is_external_element: false,
            constructor_name: None,
        }
    }

    /// Same handle, with calls against it wrapped in `constructor`.
    pub fn with_constructor(&self, constructor: impl Into<String>) -> Self {
        Self {
            constructor_name: Some(constructor.into()),
            ..self.clone()
        }
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_external_element {
            write!(f, "element#{}", self.id)
        } else {
            write!(f, "handle#{}", self.id)
        }
    }
}

/// An argument value. Serialized untagged so a batch reads like a plain
/// JSON argument list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    Handle(Handle),
    Array(Vec<Value>),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_handle(&self) -> Option<&Handle> {
        match self {
            Self::Handle(h) => Some(h),
            _ => None,
        }
    }

    /// JSON has no NaN or infinity; such a number cannot cross the boundary.
    pub fn is_finite(&self) -> bool {
        match self {
            Self::Number(n) => n.is_finite(),
            Self::Array(items) => items.iter().all(Value::is_finite),
            _ => true,
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Number(v as f64)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::Number(v as f64)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<Handle> for Value {
    fn from(v: Handle) -> Self {
        Self::Handle(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Self::Array(v)
    }
}

impl From<&[f64]> for Value {
    fn from(v: &[f64]) -> Self {
        Self::Array(v.iter().copied().map(Value::Number).collect())
    }
}

macro_rules! wire_names {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $wire:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant,)+
        }

        impl $name {
            /// Name of the native method or property.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $wire,)+
                }
            }

            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($wire => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

wire_names! {
    /// Drawing surface methods that can be queued.
    Method {
        FillRect => "fillRect",
        StrokeRect => "strokeRect",
        ClearRect => "clearRect",
        BeginPath => "beginPath",
        ClosePath => "closePath",
        MoveTo => "moveTo",
        LineTo => "lineTo",
        Arc => "arc",
        ArcTo => "arcTo",
        Rect => "rect",
        RoundRect => "roundRect",
        Ellipse => "ellipse",
        QuadraticCurveTo => "quadraticCurveTo",
        BezierCurveTo => "bezierCurveTo",
        Fill => "fill",
        Stroke => "stroke",
        Clip => "clip",
        FillText => "fillText",
        StrokeText => "strokeText",
        DrawImage => "drawImage",
        CreateLinearGradient => "createLinearGradient",
        CreateRadialGradient => "createRadialGradient",
        CreateConicGradient => "createConicGradient",
        CreatePattern => "createPattern",
        AddColorStop => "addColorStop",
        Save => "save",
        Restore => "restore",
        Translate => "translate",
        Rotate => "rotate",
        Scale => "scale",
        SetTransform => "setTransform",
        Transform => "transform",
        ResetTransform => "resetTransform",
        SetLineDash => "setLineDash",
    }
}

impl Method {
    /// Whether the method returns a composite object (gradient or pattern)
    /// that later calls address by handle.
    pub fn creates_composite(&self) -> bool {
        matches!(
            self,
            Self::CreateLinearGradient
                | Self::CreateRadialGradient
                | Self::CreateConicGradient
                | Self::CreatePattern
        )
    }

    /// Whether the method puts pixels on the surface.
    pub fn is_draw(&self) -> bool {
        matches!(
            self,
            Self::FillRect
                | Self::StrokeRect
                | Self::Fill
                | Self::Stroke
                | Self::FillText
                | Self::StrokeText
                | Self::DrawImage
        )
    }
}

wire_names! {
    /// Settable drawing surface properties.
    Property {
        FillStyle => "fillStyle",
        StrokeStyle => "strokeStyle",
        LineWidth => "lineWidth",
        Font => "font",
        TextAlign => "textAlign",
        TextBaseline => "textBaseline",
        TextRendering => "textRendering",
        Filter => "filter",
        GlobalAlpha => "globalAlpha",
        GlobalCompositeOperation => "globalCompositeOperation",
        ImageSmoothingEnabled => "imageSmoothingEnabled",
        ImageSmoothingQuality => "imageSmoothingQuality",
        ShadowColor => "shadowColor",
        ShadowBlur => "shadowBlur",
        ShadowOffsetX => "shadowOffsetX",
        ShadowOffsetY => "shadowOffsetY",
    }
}

impl Property {
    /// Fill and stroke style may carry a gradient or pattern handle.
    pub fn is_style_bearing(&self) -> bool {
        matches!(self, Self::FillStyle | Self::StrokeStyle)
    }
}

/// A fill or stroke style.
#[derive(Debug, Clone, PartialEq)]
pub enum StyleValue {
    Color(String),
    Gradient(Handle),
    Pattern(Handle),
}

impl StyleValue {
    pub fn to_value(&self) -> Value {
        match self {
            Self::Color(c) => Value::Str(c.clone()),
            Self::Gradient(h) | Self::Pattern(h) => Value::Handle(h.clone()),
        }
    }
}

impl Default for StyleValue {
    fn default() -> Self {
        Self::Color("#000000".into())
    }
}

impl From<&str> for StyleValue {
    fn from(c: &str) -> Self {
        Self::Color(c.to_string())
    }
}

impl From<String> for StyleValue {
    fn from(c: String) -> Self {
        Self::Color(c)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    FunctionCall,
    PropertyAssignment,
}

/// One unit of queued work. Immutable once enqueued.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Call { method: Method, args: Vec<Value> },
    Set { property: Property, value: Value },
}

impl Operation {
    pub fn call(method: Method, args: Vec<Value>) -> Self {
        Self::Call { method, args }
    }

    pub fn set(property: Property, value: impl Into<Value>) -> Self {
        Self::Set {
            property,
            value: value.into(),
        }
    }

    pub fn kind(&self) -> OpKind {
        match self {
            Self::Call { .. } => OpKind::FunctionCall,
            Self::Set { .. } => OpKind::PropertyAssignment,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Call { method, .. } => method.as_str(),
            Self::Set { property, .. } => property.as_str(),
        }
    }

    /// Wire form of this operation. Fails on a non-finite number, which JSON
    /// would silently turn into `null`.
    pub fn to_wire(&self) -> Result<WireOperation> {
        let (is_property, args) = match self {
            Self::Call { args, .. } => {
                if let Some(bad) = args.iter().position(|a| !a.is_finite()) {
                    return Err(CanvexError::InvalidArgument(format!(
                        "{} argument {bad} is not a finite number",
                        self.name()
                    )));
                }
                (false, serde_json::to_value(args)?)
            }
            Self::Set { value, .. } => {
                if !value.is_finite() {
                    return Err(CanvexError::InvalidArgument(format!(
                        "{} value is not a finite number",
                        self.name()
                    )));
                }
                (true, serde_json::to_value(value)?)
            }
        };
        Ok(WireOperation {
            is_property,
            method_name: self.name().to_string(),
            args,
        })
    }
}

/// Serialized shape of one batch entry.
///
/// For a call `args` is the argument array; for a property assignment it is
/// the value itself, possibly inside a `{ "value" }`, `{ "id" }` or
/// `{ "result" }` wrapper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireOperation {
    pub is_property: bool,
    pub method_name: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_names() {
        assert_eq!(Method::QuadraticCurveTo.as_str(), "quadraticCurveTo");
        assert_eq!(Method::from_name("arcTo"), Some(Method::ArcTo));
        assert_eq!(Method::from_name("eval"), None);
        assert!(Method::CreatePattern.creates_composite());
        assert!(!Method::AddColorStop.creates_composite());
    }

    #[test]
    fn test_handle_wire_shape() {
        let handle = Handle::composite(7).with_constructor("DOMMatrix");
        let json = serde_json::to_value(&handle).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"id": 7, "isElementRef": false, "classInitializer": "DOMMatrix"})
        );

        let plain = serde_json::to_value(Handle::element(3)).unwrap();
        assert!(plain.get("classInitializer").is_none());
    }

    #[test]
    fn test_value_untagged_decode() {
        let args: Vec<Value> =
            serde_json::from_str(r#"[1, "red", true, null, {"id": 2, "isElementRef": true}, [0.5]]"#)
                .unwrap();
        assert_eq!(args[0], Value::Number(1.0));
        assert_eq!(args[1], Value::Str("red".into()));
        assert_eq!(args[2], Value::Bool(true));
        assert_eq!(args[3], Value::Null);
        assert_eq!(args[4], Value::Handle(Handle::element(2)));
        assert_eq!(args[5], Value::Array(vec![Value::Number(0.5)]));
    }

    #[test]
    fn test_operation_to_wire() {
        let op = Operation::call(Method::FillRect, vec![0.into(), 0.into(), 10.into(), 10.into()]);
        assert_eq!(op.kind(), OpKind::FunctionCall);
        let wire = op.to_wire().unwrap();
        assert!(!wire.is_property);
        assert_eq!(wire.method_name, "fillRect");
        assert_eq!(wire.args, serde_json::json!([0.0, 0.0, 10.0, 10.0]));

        let set = Operation::set(Property::LineWidth, 2.5);
        assert_eq!(set.name(), "lineWidth");
        assert_eq!(set.to_wire().unwrap().args, serde_json::json!(2.5));
    }

    #[test]
    fn test_non_finite_numbers_rejected_on_wire() {
        let rotate = Operation::call(Method::Rotate, vec![f64::INFINITY.into()]);
        assert!(matches!(rotate.to_wire(), Err(CanvexError::InvalidArgument(_))));

        let dash = Operation::call(
            Method::SetLineDash,
            vec![Value::Array(vec![4.0.into(), f64::NAN.into()])],
        );
        assert!(dash.to_wire().is_err());

        let alpha = Operation::set(Property::GlobalAlpha, f64::NEG_INFINITY);
        assert!(alpha.to_wire().is_err());
    }
}
