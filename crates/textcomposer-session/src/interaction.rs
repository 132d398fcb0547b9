//! Pointer and keyboard gestures from the rendering surface.
//!
//! A surface reports what the user did as a [`Gesture`]; the session decides
//! whether it becomes a transient, debounced or durable store mutation.

use textcomposer_core::{ElementId, ElementPatch, TextElement};

/// How an edit reaches the history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commit {
    /// Live state only
    Immediate,
    /// Live state now, history once the element has been idle for the
    /// debounce window
    Debounced,
    /// Recorded and persisted right away
    Durable,
}

/// Final box and affine components reported when a transform handle is released
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub scale_x: f64,
    pub scale_y: f64,
    pub rotation: f64,
    pub skew_x: f64,
    pub skew_y: f64,
}

impl Transform {
    pub fn to_patch(&self) -> ElementPatch {
        ElementPatch {
            x: Some(self.x),
            y: Some(self.y),
            width: Some(self.width),
            height: Some(self.height),
            scale_x: Some(self.scale_x),
            scale_y: Some(self.scale_y),
            rotation: Some(self.rotation),
            skew_x: Some(self.skew_x),
            skew_y: Some(self.skew_y),
            ..ElementPatch::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Gesture {
    /// Click on empty canvas: create an element there and select it
    Create { x: f64, y: f64 },
    /// Pointer moved while dragging an element
    DragMove { id: ElementId, x: f64, y: f64 },
    /// Drag released
    DragEnd { id: ElementId, x: f64, y: f64 },
    /// Transform handle released
    TransformEnd { id: ElementId, transform: Transform },
    /// Arrow key on the selected element, in nudge steps
    Nudge { dx: f64, dy: f64 },
    /// Property edit from a toolbar control
    Edit {
        id: ElementId,
        patch: ElementPatch,
        commit: Commit,
    },
    Select(Option<ElementId>),
    Deselect,
}

/// Canvas size in display pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasSize {
    pub width: f64,
    pub height: f64,
}

impl CanvasSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn center(&self) -> (f64, f64) {
        (self.width / 2.0, self.height / 2.0)
    }
}

/// Snap each axis of a dragged element to the canvas centre when its own
/// centre is closer than `threshold`
pub fn snap_to_center(
    element: &TextElement,
    x: f64,
    y: f64,
    canvas: CanvasSize,
    threshold: f64,
) -> (f64, f64) {
    let (center_x, center_y) = canvas.center();
    let half_w = element.width / 2.0;
    let half_h = element.height / 2.0;

    let x = if ((x + half_w) - center_x).abs() < threshold {
        center_x - half_w
    } else {
        x
    };
    let y = if ((y + half_h) - center_y).abs() < threshold {
        center_y - half_h
    } else {
        y
    };
    (x, y)
}

/// Reject transforms that shrink the box below `min_size` on either axis
pub fn constrain_box(transform: Transform, min_size: f64) -> Option<Transform> {
    if transform.width.abs() < min_size || transform.height.abs() < min_size {
        None
    } else {
        Some(transform)
    }
}
