//! Replays decoded batches against a live [`Surface`].
//!
//! Composite objects (gradients, patterns) are registered under the handle
//! id pre-assigned by the application, the first time their creating call is
//! replayed. Later calls addressed to that handle run on the same native
//! object. An operation that cannot be resolved is skipped on its own; the
//! rest of the batch still applies.

use std::collections::HashMap;

use tracing::{debug, warn};

use canvex_core::protocol::{Handle, HandleId, Method, Operation, Property, StyleValue, Value};
use canvex_core::types::SurfaceOptions;

use crate::style::StyleState;
use crate::surface::{ArgOf, NativeArg, Surface};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositeKind {
    Gradient,
    Pattern,
}

impl CompositeKind {
    fn of(method: Method) -> Self {
        if method == Method::CreatePattern {
            Self::Pattern
        } else {
            Self::Gradient
        }
    }
}

#[derive(Debug)]
struct Registered<O> {
    object: O,
    kind: CompositeKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedOp {
    /// Position of the operation in its batch (or frame, once merged).
    pub index: usize,
    pub name: &'static str,
    pub reason: String,
}

/// Outcome of replaying one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub applied: usize,
    pub skipped: Vec<SkippedOp>,
    /// Handle ids registered (or re-registered) by this batch, in order.
    pub created: Vec<HandleId>,
}

impl ApplyReport {
    /// Fold in the report of a later segment of the same frame. `offset` is
    /// the segment's first position in the frame.
    pub fn merge(&mut self, segment: ApplyReport, offset: usize) {
        self.applied += segment.applied;
        self.skipped
            .extend(segment.skipped.into_iter().map(|mut skipped| {
                skipped.index += offset;
                skipped
            }));
        self.created.extend(segment.created);
    }
}

pub struct CommandApplier<S: Surface> {
    surface: S,
    registry: HashMap<HandleId, Registered<S::Object>>,
    elements: HashMap<HandleId, S::Element>,
    live: StyleState,
    saved: Vec<StyleState>,
    warn_threshold: usize,
    warned: bool,
}

impl<S: Surface> CommandApplier<S> {
    pub fn new(surface: S) -> Self {
        Self::with_warn_threshold(surface, 1024)
    }

    pub fn with_warn_threshold(surface: S, warn_threshold: usize) -> Self {
        Self {
            surface,
            registry: HashMap::new(),
            elements: HashMap::new(),
            live: StyleState::default(),
            saved: Vec::new(),
            warn_threshold,
            warned: false,
        }
    }

    /// Replay `ops` in order.
    pub fn apply(&mut self, ops: &[Operation]) -> ApplyReport {
        let mut report = ApplyReport::default();

        for (index, op) in ops.iter().enumerate() {
            match self.apply_one(op) {
                Ok(created) => {
                    report.applied += 1;
                    if let Some(id) = created {
                        report.created.push(id);
                    }
                }
                Err(reason) => {
                    warn!(index, operation = op.name(), %reason, "Skipping operation");
                    report.skipped.push(SkippedOp {
                        index,
                        name: op.name(),
                        reason,
                    });
                }
            }
        }

        debug!(
            applied = report.applied,
            skipped = report.skipped.len(),
            created = report.created.len(),
            "Batch applied"
        );
        report
    }

    /// The native context was reacquired (after a resize): every setting is
    /// back to default. Registered objects and cached elements stay valid.
    pub fn reset_context(
        &mut self,
        width: u32,
        height: u32,
        options: SurfaceOptions,
    ) -> canvex_core::error::Result<()> {
        self.surface.reset(width, height, options)?;
        self.live = StyleState::default();
        self.saved.clear();
        Ok(())
    }

    /// Style state of the live context as far as replayed operations tell.
    pub fn live_style(&self) -> &StyleState {
        &self.live
    }

    pub fn is_registered(&self, id: HandleId) -> bool {
        self.registry.contains_key(&id)
    }

    pub fn registered(&self) -> usize {
        self.registry.len()
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    /// Drop every native resource held for this session.
    pub fn release(&mut self) {
        self.registry.clear();
        self.elements.clear();
        self.surface.release();
    }

    fn apply_one(&mut self, op: &Operation) -> Result<Option<HandleId>, String> {
        match op {
            Operation::Set { property, value } => {
                self.assign(*property, value)?;
                Ok(None)
            }
            Operation::Call { method, args } => self.call(*method, args),
        }
    }

    fn assign(&mut self, property: Property, value: &Value) -> Result<(), String> {
        if !property.is_style_bearing() {
            self.surface
                .set_property(property, NativeArg::Value(value.clone()))
                .map_err(|e| e.to_string())?;
            self.live.apply(property, value);
            return Ok(());
        }

        let style = self.resolve_style(value)?;
        let native = match &style {
            StyleValue::Color(color) => NativeArg::Value(Value::Str(color.clone())),
            StyleValue::Gradient(h) | StyleValue::Pattern(h) => match self.registry.get(&h.id) {
                Some(registered) => NativeArg::Object(registered.object.clone()),
                None => return Err(format!("{h} is not registered")),
            },
        };
        self.surface
            .set_property(property, native)
            .map_err(|e| e.to_string())?;
        self.live.set_style(property, style);
        Ok(())
    }

    fn resolve_style(&self, value: &Value) -> Result<StyleValue, String> {
        let handle = match value {
            Value::Str(color) => return Ok(StyleValue::Color(color.clone())),
            Value::Handle(h) if !h.is_external_element => h.clone(),
            Value::Number(n) if n.fract() == 0.0 && *n >= 0.0 && *n <= HandleId::MAX as f64 => {
                Handle::composite(*n as HandleId)
            }
            other => return Err(format!("unsupported style value {other:?}")),
        };

        match self.registry.get(&handle.id) {
            Some(registered) => Ok(match registered.kind {
                CompositeKind::Gradient => StyleValue::Gradient(handle),
                CompositeKind::Pattern => StyleValue::Pattern(handle),
            }),
            None => Err(format!("{handle} is not registered")),
        }
    }

    fn call(&mut self, method: Method, args: &[Value]) -> Result<Option<HandleId>, String> {
        if args.is_empty() {
            self.surface
                .invoke(method, Vec::new())
                .map_err(|e| e.to_string())?;
            self.track(method, args);
            return Ok(None);
        }

        if let Some(Value::Handle(target)) = args.first() {
            if !target.is_external_element {
                return self.call_composite(method, target, &args[1..]);
            }
        }

        let resolved = self.resolve_args(args)?;
        self.surface
            .invoke(method, resolved)
            .map_err(|e| e.to_string())?;
        self.track(method, args);
        Ok(None)
    }

    fn call_composite(
        &mut self,
        method: Method,
        target: &Handle,
        rest: &[Value],
    ) -> Result<Option<HandleId>, String> {
        let existing = self
            .registry
            .get(&target.id)
            .filter(|r| self.surface.object_supports(&r.object, method))
            .map(|r| r.object.clone());

        if let Some(object) = existing {
            let args = match &target.constructor_name {
                Some(class) => vec![NativeArg::Construct {
                    class: class.clone(),
                    args: rest.to_vec(),
                }],
                None => self.resolve_args(rest)?,
            };
            self.surface
                .invoke_object(&object, method, args)
                .map_err(|e| e.to_string())?;
            return Ok(None);
        }

        if !method.creates_composite() {
            return Err(format!("{target} is not registered for {method}"));
        }

        let args = self.resolve_args(rest)?;
        let object = self
            .surface
            .invoke(method, args)
            .map_err(|e| e.to_string())?
            .ok_or_else(|| format!("{method} produced no object"))?;

        let replaced = self
            .registry
            .insert(
                target.id,
                Registered {
                    object,
                    kind: CompositeKind::of(method),
                },
            )
            .is_some();
        debug!(handle = target.id, %method, replaced, "Registered composite object");

        if !self.warned && self.registry.len() > self.warn_threshold {
            self.warned = true;
            warn!(
                size = self.registry.len(),
                threshold = self.warn_threshold,
                "Composite registry keeps growing; objects are never evicted"
            );
        }
        Ok(Some(target.id))
    }

    fn resolve_args(&mut self, args: &[Value]) -> Result<Vec<ArgOf<S>>, String> {
        args.iter().map(|arg| self.resolve_arg(arg)).collect()
    }

    fn resolve_arg(&mut self, arg: &Value) -> Result<ArgOf<S>, String> {
        let Value::Handle(handle) = arg else {
            return Ok(NativeArg::Value(arg.clone()));
        };

        if handle.is_external_element {
            if let Some(element) = self.elements.get(&handle.id) {
                return Ok(NativeArg::Element(element.clone()));
            }
            let element = self
                .surface
                .lookup_element(handle.id)
                .ok_or_else(|| format!("{handle} not found"))?;
            self.elements.insert(handle.id, element.clone());
            return Ok(NativeArg::Element(element));
        }

        self.registry
            .get(&handle.id)
            .map(|r| NativeArg::Object(r.object.clone()))
            .ok_or_else(|| format!("{handle} is not registered"))
    }

    /// Keep the live mirror in step with calls that touch context state.
    fn track(&mut self, method: Method, args: &[Value]) {
        match method {
            Method::SetLineDash => self.live.set_line_dash(args),
            Method::Save => self.saved.push(self.live.clone()),
            Method::Restore => {
                if let Some(state) = self.saved.pop() {
                    self.live = state;
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::{NativeCall, RecordingSurface};

    fn fill_rect() -> Operation {
        Operation::call(
            Method::FillRect,
            vec![0.into(), 0.into(), 10.into(), 10.into()],
        )
    }

    fn gradient_ops(handle: &Handle) -> Vec<Operation> {
        vec![
            Operation::call(
                Method::CreateLinearGradient,
                vec![handle.clone().into(), 0.into(), 0.into(), 100.into(), 0.into()],
            ),
            Operation::call(
                Method::AddColorStop,
                vec![handle.clone().into(), 0.into(), "red".into()],
            ),
            Operation::call(
                Method::AddColorStop,
                vec![handle.clone().into(), 1.into(), "blue".into()],
            ),
        ]
    }

    #[test]
    fn test_replays_in_order() {
        let surface = RecordingSurface::new(100, 100);
        let log = surface.log();
        let mut applier = CommandApplier::new(surface);

        let report = applier.apply(&[
            Operation::call(Method::BeginPath, vec![]),
            Operation::call(Method::MoveTo, vec![1.into(), 2.into()]),
            Operation::set(Property::LineWidth, 3),
            Operation::call(Method::Stroke, vec![]),
        ]);

        assert_eq!(report.applied, 4);
        assert_eq!(log.names(), ["beginPath", "moveTo", "lineWidth", "stroke"]);
        assert_eq!(applier.live_style().line_width, 3.0);
    }

    #[test]
    fn test_composite_created_once() {
        let surface = RecordingSurface::new(100, 100);
        let log = surface.log();
        let mut applier = CommandApplier::new(surface);
        let handle = Handle::composite(11);

        let report = applier.apply(&gradient_ops(&handle));

        assert_eq!(report.applied, 3);
        assert_eq!(report.created, vec![11]);
        assert_eq!(log.count(Method::CreateLinearGradient.as_str()), 1);
        let stops: Vec<_> = log
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                NativeCall::ObjectCall { object, method, .. } if method == "addColorStop" => {
                    Some(object)
                }
                _ => None,
            })
            .collect();
        assert_eq!(stops.len(), 2);
        assert_eq!(stops[0], stops[1]);
    }

    #[test]
    fn test_unregistered_style_handle_is_skipped() {
        let surface = RecordingSurface::new(100, 100);
        let log = surface.log();
        let mut applier = CommandApplier::new(surface);

        let report = applier.apply(&[
            fill_rect(),
            Operation::set(Property::FillStyle, Handle::composite(7)),
            fill_rect(),
        ]);

        assert_eq!(report.applied, 2);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].index, 1);
        assert_eq!(log.draw_calls(), 2);
        assert_eq!(applier.live_style().fill_style, StyleValue::default());
    }

    #[test]
    fn test_numeric_style_id_resolves_registered_gradient() {
        let surface = RecordingSurface::new(100, 100);
        let mut applier = CommandApplier::new(surface);
        let handle = Handle::composite(5);
        applier.apply(&gradient_ops(&handle));

        let report = applier.apply(&[Operation::set(Property::StrokeStyle, 5)]);
        assert!(report.skipped.is_empty());
        assert_eq!(
            applier.live_style().stroke_style,
            StyleValue::Gradient(handle)
        );
    }

    #[test]
    fn test_unresolvable_call_does_not_block_batch() {
        let surface = RecordingSurface::new(100, 100);
        let log = surface.log();
        let mut applier = CommandApplier::new(surface);

        let report = applier.apply(&[
            Operation::call(
                Method::AddColorStop,
                vec![Handle::composite(99).into(), 0.into(), "red".into()],
            ),
            fill_rect(),
        ]);

        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.applied, 1);
        assert_eq!(log.names(), ["fillRect"]);
    }

    #[test]
    fn test_pattern_transform_wrapped_in_constructor() {
        let surface = RecordingSurface::new(100, 100).with_element(3);
        let log = surface.log();
        let mut applier = CommandApplier::new(surface);
        let pattern = Handle::composite(21);

        let report = applier.apply(&[
            Operation::call(
                Method::CreatePattern,
                vec![pattern.clone().into(), Handle::element(3).into(), "repeat".into()],
            ),
            Operation::call(
                Method::SetTransform,
                vec![
                    pattern.with_constructor("DOMMatrix").into(),
                    Value::from(&[1.0, 0.0, 0.0, 1.0, 5.0, 5.0][..]),
                ],
            ),
            Operation::set(Property::FillStyle, pattern.clone()),
        ]);

        assert!(report.skipped.is_empty(), "{:?}", report.skipped);
        let wrapped = log.calls().into_iter().any(|c| {
            matches!(c, NativeCall::ObjectCall { method, args, .. }
                if method == "setTransform" && args[0].starts_with("new DOMMatrix"))
        });
        assert!(wrapped);
        assert_eq!(applier.live_style().fill_style, StyleValue::Pattern(pattern));
    }

    #[test]
    fn test_missing_element_skips_draw() {
        let surface = RecordingSurface::new(100, 100);
        let mut applier = CommandApplier::new(surface);
        let report = applier.apply(&[Operation::call(
            Method::DrawImage,
            vec![Handle::element(8).into(), 0.into(), 0.into()],
        )]);
        assert_eq!(report.applied, 0);
        assert!(report.skipped[0].reason.contains("element#8"));
    }

    #[test]
    fn test_recreating_composite_replaces_registration() {
        let surface = RecordingSurface::new(100, 100);
        let log = surface.log();
        let mut applier = CommandApplier::new(surface);
        let handle = Handle::composite(4);

        applier.apply(&gradient_ops(&handle));
        let report = applier.apply(&gradient_ops(&handle));

        assert_eq!(report.created, vec![4]);
        assert_eq!(applier.registered(), 1);
        assert_eq!(log.count("createLinearGradient"), 2);
    }

    #[test]
    fn test_reset_context_restores_defaults() {
        let surface = RecordingSurface::new(100, 100);
        let mut applier = CommandApplier::new(surface);
        applier.apply(&gradient_ops(&Handle::composite(1)));
        applier.apply(&[Operation::set(Property::Font, "20px serif")]);

        applier
            .reset_context(200, 50, SurfaceOptions::default())
            .unwrap();

        assert_eq!(applier.live_style(), &StyleState::default());
        assert!(applier.is_registered(1));
        assert_eq!(applier.surface().size(), (200, 50));
    }

    #[test]
    fn test_save_restore_tracks_live_style() {
        let surface = RecordingSurface::new(100, 100);
        let mut applier = CommandApplier::new(surface);
        applier.apply(&[
            Operation::set(Property::GlobalAlpha, 0.25),
            Operation::call(Method::Save, vec![]),
            Operation::set(Property::GlobalAlpha, 0.75),
            Operation::call(Method::Restore, vec![]),
        ]);
        assert_eq!(applier.live_style().global_alpha, 0.25);
    }

    #[test]
    fn test_merge_offsets_skipped_positions() {
        let mut frame = ApplyReport {
            applied: 2,
            skipped: vec![],
            created: vec![3],
        };
        frame.merge(
            ApplyReport {
                applied: 1,
                skipped: vec![SkippedOp {
                    index: 1,
                    name: "fillStyle",
                    reason: "handle#7 is not registered".into(),
                }],
                created: vec![9],
            },
            2,
        );
        assert_eq!(frame.applied, 3);
        assert_eq!(frame.skipped[0].index, 3);
        assert_eq!(frame.created, vec![3, 9]);
    }
}
