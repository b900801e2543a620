/*!
 * # Canvas
 *
 * Object-based drawing documents. A `Scene` is an ordered list of
 * `CanvasObject`s (later objects paint on top). Every structural edit is a
 * reversible `Command`; the `CommandLog` keeps the linear undo/redo history.
 *
 * Commands never mutate a scene in place: `apply` and `reverse` take a scene
 * and return the next one, so `reverse(c, apply(c, s)) == s` can be checked
 * directly.
 *
 * The log is in-memory only and is reset when another document is loaded.
 */

pub mod command_log;
pub mod commands;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use command_log::CommandLog;
pub use commands::{Command, CommandError, Placed};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(pub Uuid);

impl ObjectId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Shape {
    Rect {
        origin: Point,
        width: f64,
        height: f64,
    },
    Circle {
        center: Point,
        radius: f64,
    },
    Line {
        from: Point,
        to: Point,
    },
    Text {
        origin: Point,
        content: String,
    },
    Path {
        points: Vec<Point>,
    },
}

impl Shape {
    /// Lowercase name used in command descriptions
    pub fn name(&self) -> &'static str {
        match self {
            Shape::Rect { .. } => "rectangle",
            Shape::Circle { .. } => "circle",
            Shape::Line { .. } => "line",
            Shape::Text { .. } => "text",
            Shape::Path { .. } => "path",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Style {
    pub stroke: String,
    pub fill: Option<String>,
    pub stroke_width: f64,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            stroke: "#000000".to_string(),
            fill: None,
            stroke_width: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanvasObject {
    pub id: ObjectId,
    pub shape: Shape,
    pub style: Style,
}

impl CanvasObject {
    /// New object with a fresh id and default style
    pub fn new(shape: Shape) -> Self {
        Self {
            id: ObjectId::new(),
            shape,
            style: Style::default(),
        }
    }

    pub fn with_style(mut self, style: Style) -> Self {
        self.style = style;
        self
    }

    pub fn circle(center: Point, radius: f64) -> Self {
        Self::new(Shape::Circle { center, radius })
    }

    pub fn rect(origin: Point, width: f64, height: f64) -> Self {
        Self::new(Shape::Rect {
            origin,
            width,
            height,
        })
    }
}

/// Ordered objects of one canvas, bottom to top
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    objects: Vec<CanvasObject>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_objects(objects: Vec<CanvasObject>) -> Self {
        Self { objects }
    }

    pub fn objects(&self) -> &[CanvasObject] {
        &self.objects
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn get(&self, id: ObjectId) -> Option<&CanvasObject> {
        self.objects.iter().find(|object| object.id == id)
    }

    pub fn position(&self, id: ObjectId) -> Option<usize> {
        self.objects.iter().position(|object| object.id == id)
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.position(id).is_some()
    }
}
