/*!
 * Capability Data Types
 * Values passed through capability interfaces; all of them cross boundaries
 */

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle; width and height are never negative
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle spanned by two corner points, in any order
    pub fn from_points(a: Point, b: Point) -> Self {
        let x = a.x.min(b.x);
        let y = a.y.min(b.y);
        Self {
            x,
            y,
            width: (a.x - b.x).abs(),
            height: (a.y - b.y).abs(),
        }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x < self.right() && p.y >= self.y && p.y < self.bottom()
    }

    /// Smallest rectangle covering both
    pub fn union(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Rect::new(
            x,
            y,
            self.right().max(other.right()) - x,
            self.bottom().max(other.bottom()) - y,
        )
    }

    /// Grow by `amount` on every side
    pub fn inflate(&self, amount: i32) -> Rect {
        Rect::new(
            self.x - amount,
            self.y - amount,
            self.width + 2 * amount,
            self.height + 2 * amount,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const RED: Color = Color::rgb(255, 0, 0);
    pub const BLACK: Color = Color::rgb(0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageFormat {
    Png,
    Rgba8,
}

/// Encoded or raw image bytes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
    pub bytes: Vec<u8>,
}

impl ImageData {
    /// Blank RGBA image
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            format: ImageFormat::Rgba8,
            bytes: vec![0; width as usize * height as usize * 4],
        }
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width as i32, self.height as i32)
    }
}

/// One paint operation emitted by an effect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawCommand {
    Line {
        from: Point,
        to: Point,
        color: Color,
        width: u32,
    },
    Rectangle {
        rect: Rect,
        color: Color,
        width: u32,
    },
    Arrow {
        from: Point,
        to: Point,
        color: Color,
        width: u32,
    },
    Image {
        dest: Rect,
        image: ImageData,
    },
    /// Darken everything on the surface outside `keep`
    Shade {
        keep: Rect,
        alpha: u8,
    },
}

/// Drawing surface an effect paints onto
///
/// Effects append commands; the host renders them.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Surface {
    pub bounds: Rect,
    pub commands: Vec<DrawCommand>,
}

impl Surface {
    pub fn new(bounds: Rect) -> Self {
        Self {
            bounds,
            commands: Vec::new(),
        }
    }

    pub fn draw(&mut self, command: DrawCommand) {
        self.commands.push(command);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextValue {
    Text(String),
    Number(i64),
    Rect(Rect),
    Image(ImageData),
}

/// Shared state handed to editable and screenshot effects
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EffectContext {
    pub bounds: Rect,
    items: BTreeMap<String, ContextValue>,
}

impl EffectContext {
    /// Key under which screenshot effects store the captured image
    pub const SCREENSHOT_KEY: &'static str = "screenshot";

    pub fn new(bounds: Rect) -> Self {
        Self {
            bounds,
            items: BTreeMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&ContextValue> {
        self.items.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: ContextValue) {
        self.items.insert(key.into(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<ContextValue> {
        self.items.remove(key)
    }

    pub fn screenshot(&self) -> Option<&ImageData> {
        match self.items.get(Self::SCREENSHOT_KEY) {
            Some(ContextValue::Image(image)) => Some(image),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerButton {
    None,
    Left,
    Right,
    Middle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointerEvent {
    pub button: PointerButton,
    pub clicks: u32,
    pub x: i32,
    pub y: i32,
    pub delta: i32,
}

impl PointerEvent {
    pub fn new(button: PointerButton, x: i32, y: i32) -> Self {
        Self {
            button,
            clicks: 1,
            x,
            y,
            delta: 0,
        }
    }

    pub fn location(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// Repaint-needed notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invalidated {
    pub rect: Rect,
}

/// Capability-indexed listing of one module, handed to editor managers
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    pub module: String,
    pub effects: Vec<String>,
    pub selections: Vec<String>,
    pub screenshots: Vec<String>,
    pub export_actions: Vec<String>,
}

impl CatalogSnapshot {
    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
            && self.selections.is_empty()
            && self.screenshots.is_empty()
            && self.export_actions.is_empty()
    }
}
