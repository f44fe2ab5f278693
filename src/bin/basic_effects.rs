/*!
 * Basic Effects Module
 *
 * Module package with the stock annotation tools: rectangle, line and arrow
 * shapes, a region selection, a screenshot capture and a save-to-file export.
 * Runs as a boundary process; the host talks to it over stdin/stdout.
 */

use snip_modules::boundary::PackageSettings;
use snip_modules::capability::{
    Color, ContextValue, DrawCommand, Editable, Effect, EffectContext, ExportAction, ImageData,
    InvalidationEmitting, Invalidated, Point, PointerAware, PointerButton, PointerEvent, Rect,
    ScreenshotCapturing, SelectionBearing, Surface,
};
use snip_modules::{Capability, ModuleObject, ModuleRegistry, ModuleType};
use std::path::PathBuf;
use tracing::debug;

const MODULE: &str = "basic_effects";

/// Stroke settings shared by every shape
#[derive(Debug, Clone, Copy, PartialEq)]
struct Stroke {
    color: Color,
    width: u32,
}

impl Default for Stroke {
    fn default() -> Self {
        Self {
            color: Color::RED,
            width: 2,
        }
    }
}

impl Stroke {
    /// `stroke_color` is `#rrggbb`, `stroke_width` a pixel count
    fn from_settings(settings: &PackageSettings) -> Self {
        let mut stroke = Self::default();
        if let Some(color) = settings.get("stroke_color").and_then(parse_color) {
            stroke.color = color;
        }
        if let Some(width) = settings.get("stroke_width").and_then(|w| w.parse().ok()) {
            stroke.width = width;
        }
        stroke
    }
}

fn parse_color(hex: &str) -> Option<Color> {
    let hex = hex.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    Some(Color::rgb(channel(0)?, channel(2)?, channel(4)?))
}

/// Two-point drag gesture
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Drag {
    start: Option<Point>,
    end: Option<Point>,
    active: bool,
}

impl Drag {
    fn down(&mut self, event: PointerEvent) {
        if event.button == PointerButton::Left {
            self.start = Some(event.location());
            self.end = Some(event.location());
            self.active = true;
        }
    }

    /// Moves the end point; returns the area to repaint
    fn drag(&mut self, event: PointerEvent) -> Option<Rect> {
        if !self.active {
            return None;
        }
        let before = self.bounds();
        self.end = Some(event.location());
        let after = self.bounds()?;
        Some(before.map_or(after, |b| b.union(&after)))
    }

    fn up(&mut self, event: PointerEvent) -> Option<Rect> {
        let dirty = self.drag(event);
        self.active = false;
        dirty
    }

    fn points(&self) -> Option<(Point, Point)> {
        Some((self.start?, self.end?))
    }

    fn bounds(&self) -> Option<Rect> {
        self.points().map(|(a, b)| Rect::from_points(a, b))
    }
}

// =============================================================================
// RECTANGLE
// =============================================================================

#[derive(Default)]
struct RectangleEffect {
    stroke: Stroke,
    drag: Drag,
    saved: Option<Drag>,
    dirty: Vec<Invalidated>,
}

impl RectangleEffect {
    fn invalidate(&mut self, rect: Option<Rect>) {
        if let Some(rect) = rect {
            self.dirty.push(Invalidated {
                rect: rect.inflate(self.stroke.width as i32),
            });
        }
    }
}

impl ModuleObject for RectangleEffect {
    fn configure(&mut self, settings: &PackageSettings) {
        self.stroke = Stroke::from_settings(settings);
    }

    fn as_effect(&mut self) -> Option<&mut dyn Effect> {
        Some(self)
    }

    fn as_editable(&mut self) -> Option<&mut dyn Editable> {
        Some(self)
    }

    fn as_pointer_aware(&mut self) -> Option<&mut dyn PointerAware> {
        Some(self)
    }

    fn as_invalidating(&mut self) -> Option<&mut dyn InvalidationEmitting> {
        Some(self)
    }
}

impl Effect for RectangleEffect {
    fn apply(&mut self, surface: &mut Surface) -> anyhow::Result<()> {
        if let Some(rect) = self.drag.bounds().filter(|r| !r.is_empty()) {
            surface.draw(DrawCommand::Rectangle {
                rect,
                color: self.stroke.color,
                width: self.stroke.width,
            });
        }
        Ok(())
    }
}

impl Editable for RectangleEffect {
    fn start_edit(&mut self, _context: &EffectContext) -> anyhow::Result<()> {
        self.saved = Some(self.drag);
        Ok(())
    }

    fn commit_edit(&mut self) -> anyhow::Result<()> {
        if self.saved.take().is_none() {
            anyhow::bail!("no edit in progress");
        }
        Ok(())
    }

    fn cancel_edit(&mut self) -> anyhow::Result<()> {
        let saved = self
            .saved
            .take()
            .ok_or_else(|| anyhow::anyhow!("no edit in progress"))?;
        let dirty = self.drag.bounds();
        self.drag = saved;
        self.invalidate(dirty);
        Ok(())
    }
}

impl PointerAware for RectangleEffect {
    fn pointer_down(&mut self, event: PointerEvent) -> anyhow::Result<()> {
        self.drag.down(event);
        Ok(())
    }

    fn pointer_move(&mut self, event: PointerEvent) -> anyhow::Result<()> {
        let dirty = self.drag.drag(event);
        self.invalidate(dirty);
        Ok(())
    }

    fn pointer_up(&mut self, event: PointerEvent) -> anyhow::Result<()> {
        let dirty = self.drag.up(event);
        self.invalidate(dirty);
        Ok(())
    }
}

impl InvalidationEmitting for RectangleEffect {
    fn take_invalidations(&mut self) -> anyhow::Result<Vec<Invalidated>> {
        Ok(std::mem::take(&mut self.dirty))
    }
}

impl ModuleType for RectangleEffect {
    const TYPE_NAME: &'static str = "basic_effects.RectangleEffect";
    const CAPABILITIES: &'static [Capability] = &[
        Capability::Editable,
        Capability::PointerAware,
        Capability::InvalidationEmitting,
    ];

    fn create() -> Self {
        Self::default()
    }
}

// =============================================================================
// LINE AND ARROW
// =============================================================================

#[derive(Default)]
struct LineEffect {
    stroke: Stroke,
    drag: Drag,
}

impl ModuleObject for LineEffect {
    fn configure(&mut self, settings: &PackageSettings) {
        self.stroke = Stroke::from_settings(settings);
    }

    fn as_effect(&mut self) -> Option<&mut dyn Effect> {
        Some(self)
    }

    fn as_pointer_aware(&mut self) -> Option<&mut dyn PointerAware> {
        Some(self)
    }
}

impl Effect for LineEffect {
    fn apply(&mut self, surface: &mut Surface) -> anyhow::Result<()> {
        if let Some((from, to)) = self.drag.points() {
            surface.draw(DrawCommand::Line {
                from,
                to,
                color: self.stroke.color,
                width: self.stroke.width,
            });
        }
        Ok(())
    }
}

impl PointerAware for LineEffect {
    fn pointer_down(&mut self, event: PointerEvent) -> anyhow::Result<()> {
        self.drag.down(event);
        Ok(())
    }

    fn pointer_move(&mut self, event: PointerEvent) -> anyhow::Result<()> {
        self.drag.drag(event);
        Ok(())
    }

    fn pointer_up(&mut self, event: PointerEvent) -> anyhow::Result<()> {
        self.drag.up(event);
        Ok(())
    }
}

impl ModuleType for LineEffect {
    const TYPE_NAME: &'static str = "basic_effects.LineEffect";
    const CAPABILITIES: &'static [Capability] = &[Capability::Effect, Capability::PointerAware];

    fn create() -> Self {
        Self::default()
    }
}

#[derive(Default)]
struct ArrowEffect {
    stroke: Stroke,
    drag: Drag,
}

impl ModuleObject for ArrowEffect {
    fn configure(&mut self, settings: &PackageSettings) {
        self.stroke = Stroke::from_settings(settings);
    }

    fn as_effect(&mut self) -> Option<&mut dyn Effect> {
        Some(self)
    }

    fn as_pointer_aware(&mut self) -> Option<&mut dyn PointerAware> {
        Some(self)
    }
}

impl Effect for ArrowEffect {
    fn apply(&mut self, surface: &mut Surface) -> anyhow::Result<()> {
        if let Some((from, to)) = self.drag.points().filter(|(a, b)| a != b) {
            surface.draw(DrawCommand::Arrow {
                from,
                to,
                color: self.stroke.color,
                width: self.stroke.width,
            });
        }
        Ok(())
    }
}

impl PointerAware for ArrowEffect {
    fn pointer_down(&mut self, event: PointerEvent) -> anyhow::Result<()> {
        self.drag.down(event);
        Ok(())
    }

    fn pointer_move(&mut self, event: PointerEvent) -> anyhow::Result<()> {
        self.drag.drag(event);
        Ok(())
    }

    fn pointer_up(&mut self, event: PointerEvent) -> anyhow::Result<()> {
        self.drag.up(event);
        Ok(())
    }
}

impl ModuleType for ArrowEffect {
    const TYPE_NAME: &'static str = "basic_effects.ArrowEffect";
    const CAPABILITIES: &'static [Capability] = &[Capability::Effect, Capability::PointerAware];

    fn create() -> Self {
        Self::default()
    }
}

// =============================================================================
// SELECTION AND SCREENSHOT
// =============================================================================

#[derive(Default)]
struct SelectionEffect {
    drag: Drag,
}

impl ModuleObject for SelectionEffect {
    fn as_effect(&mut self) -> Option<&mut dyn Effect> {
        Some(self)
    }

    fn as_pointer_aware(&mut self) -> Option<&mut dyn PointerAware> {
        Some(self)
    }

    fn as_selection(&mut self) -> Option<&mut dyn SelectionBearing> {
        Some(self)
    }
}

impl Effect for SelectionEffect {
    fn apply(&mut self, surface: &mut Surface) -> anyhow::Result<()> {
        let keep = self.drag.bounds().unwrap_or(surface.bounds);
        surface.draw(DrawCommand::Shade { keep, alpha: 128 });
        Ok(())
    }
}

impl SelectionBearing for SelectionEffect {
    fn selection(&mut self) -> anyhow::Result<Rect> {
        match self.drag.bounds() {
            Some(rect) if !rect.is_empty() => Ok(rect),
            _ => anyhow::bail!("no region selected"),
        }
    }
}

impl PointerAware for SelectionEffect {
    fn pointer_down(&mut self, event: PointerEvent) -> anyhow::Result<()> {
        self.drag.down(event);
        Ok(())
    }

    fn pointer_move(&mut self, event: PointerEvent) -> anyhow::Result<()> {
        self.drag.drag(event);
        Ok(())
    }

    fn pointer_up(&mut self, event: PointerEvent) -> anyhow::Result<()> {
        self.drag.up(event);
        Ok(())
    }
}

impl ModuleType for SelectionEffect {
    const TYPE_NAME: &'static str = "basic_effects.SelectionEffect";
    const CAPABILITIES: &'static [Capability] = &[
        Capability::Effect,
        Capability::SelectionBearing,
        Capability::PointerAware,
    ];

    fn create() -> Self {
        Self::default()
    }
}

#[derive(Default)]
struct ScreenshotEffect {
    captured: Option<ImageData>,
}

impl ModuleObject for ScreenshotEffect {
    fn as_effect(&mut self) -> Option<&mut dyn Effect> {
        Some(self)
    }

    fn as_screenshot(&mut self) -> Option<&mut dyn ScreenshotCapturing> {
        Some(self)
    }
}

impl Effect for ScreenshotEffect {
    fn apply(&mut self, surface: &mut Surface) -> anyhow::Result<()> {
        let image = self
            .captured
            .clone()
            .ok_or_else(|| anyhow::anyhow!("screen has not been captured"))?;
        surface.draw(DrawCommand::Image {
            dest: image.bounds(),
            image,
        });
        Ok(())
    }
}

impl ScreenshotCapturing for ScreenshotEffect {
    fn capture_screen(&mut self, context: &mut EffectContext) -> anyhow::Result<()> {
        let bounds = context.bounds;
        if bounds.is_empty() {
            anyhow::bail!("capture bounds are empty");
        }
        let image = ImageData::blank(bounds.width as u32, bounds.height as u32);
        context.set(
            EffectContext::SCREENSHOT_KEY,
            ContextValue::Image(image.clone()),
        );
        self.captured = Some(image);
        Ok(())
    }
}

impl ModuleType for ScreenshotEffect {
    const TYPE_NAME: &'static str = "basic_effects.ScreenshotEffect";
    const CAPABILITIES: &'static [Capability] =
        &[Capability::Effect, Capability::ScreenshotCapturing];

    fn create() -> Self {
        Self::default()
    }
}

// =============================================================================
// EXPORT
// =============================================================================

/// Writes the raw image bytes into `export_dir` (default: package directory)
struct SaveToFileExport {
    dir: PathBuf,
    count: u32,
}

impl ModuleObject for SaveToFileExport {
    fn configure(&mut self, settings: &PackageSettings) {
        if let Some(dir) = settings.get("export_dir") {
            self.dir = PathBuf::from(dir);
        }
    }

    fn as_export_action(&mut self) -> Option<&mut dyn ExportAction> {
        Some(self)
    }
}

impl ExportAction for SaveToFileExport {
    fn export(&mut self, image: &ImageData) -> anyhow::Result<()> {
        if image.bytes.is_empty() {
            anyhow::bail!("nothing to export");
        }
        self.count += 1;
        let path = self.dir.join(format!(
            "export-{}-{}x{}.raw",
            self.count, image.width, image.height
        ));
        std::fs::write(&path, &image.bytes)?;
        debug!(path = %path.display(), bytes = image.bytes.len(), "Image exported");
        Ok(())
    }
}

impl ModuleType for SaveToFileExport {
    const TYPE_NAME: &'static str = "basic_effects.SaveToFileExport";
    const CAPABILITIES: &'static [Capability] = &[Capability::ExportAction];

    fn create() -> Self {
        Self {
            dir: PathBuf::from("."),
            count: 0,
        }
    }
}

/// Crosshair guide drawn by the editor itself; never offered to users
#[derive(Default)]
struct GuideEffect;

impl ModuleObject for GuideEffect {
    fn as_effect(&mut self) -> Option<&mut dyn Effect> {
        Some(self)
    }
}

impl Effect for GuideEffect {
    fn apply(&mut self, surface: &mut Surface) -> anyhow::Result<()> {
        let b = surface.bounds;
        let (cx, cy) = (b.x + b.width / 2, b.y + b.height / 2);
        for (from, to) in [
            (Point::new(b.x, cy), Point::new(b.right(), cy)),
            (Point::new(cx, b.y), Point::new(cx, b.bottom())),
        ] {
            surface.draw(DrawCommand::Line {
                from,
                to,
                color: Color::BLACK,
                width: 1,
            });
        }
        Ok(())
    }
}

impl ModuleType for GuideEffect {
    const TYPE_NAME: &'static str = "basic_effects.GuideEffect";
    const CAPABILITIES: &'static [Capability] = &[Capability::Effect];

    fn create() -> Self {
        GuideEffect
    }
}

fn registry() -> ModuleRegistry {
    ModuleRegistry::new(MODULE)
        .declare_abstract(
            "basic_effects.ShapeEffect",
            &[Capability::Effect, Capability::PointerAware],
        )
        .export::<RectangleEffect>()
        .export::<LineEffect>()
        .export::<ArrowEffect>()
        .export::<SelectionEffect>()
        .export::<ScreenshotEffect>()
        .export::<SaveToFileExport>()
        .internal::<GuideEffect>()
        .resource(
            "Icons.RectangleEffect.png",
            include_bytes!("../../assets/icons/RectangleEffect.png").as_slice(),
        )
        .resource(
            "Icons.ArrowEffect.png",
            include_bytes!("../../assets/icons/ArrowEffect.png").as_slice(),
        )
        .resource(
            "Icons.SelectionEffect.png",
            include_bytes!("../../assets/icons/SelectionEffect.png").as_slice(),
        )
        .resource(
            "Icons.ScreenshotEffect.png",
            include_bytes!("../../assets/icons/ScreenshotEffect.png").as_slice(),
        )
        .resource(
            "Icons.SaveToFileExport.png",
            include_bytes!("../../assets/icons/SaveToFileExport.png").as_slice(),
        )
}

fn main() -> anyhow::Result<()> {
    snip_modules::serve(registry())
}
