//! Capsule mode: a compact, always-on-top preview card for a window.
//!
//! Capture itself lives in [`capture`]. This module sizes and places capsules,
//! keeps the last good image per window, and builds the placeholder used when
//! nothing better is available.

pub mod capture;

use tracing::debug;

use crate::common::collections::HashMap;
use crate::common::config::CapsuleSettings;
use crate::model::{PreviewImage, WindowId};
use crate::sys::geometry::{Point, Rect, Size};

pub use capture::{
    CaptureBackend, CaptureError, CaptureRequest, NullCaptureBackend, SyntheticCaptureBackend,
    VisibilityGuard,
};

/// Identifies one capture attempt so stale completions can be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CaptureToken(pub u64);

/// Width follows the title length, clamped; height is the fixed card stack.
pub fn capsule_size(title: &str, settings: &CapsuleSettings) -> Size {
    let chars = i32::try_from(title.chars().count()).unwrap_or(i32::MAX);
    let width = chars
        .saturating_mul(settings.char_width)
        .saturating_add(settings.chrome_padding)
        .clamp(settings.min_width, settings.max_width);
    Size::new(width, settings.compact_height())
}

/// Top-right of `area`, stepping down and left until no existing capsule sits
/// at exactly the same origin.
pub fn capsule_position(
    area: Rect,
    size: Size,
    occupied: &[Point],
    settings: &CapsuleSettings,
) -> Point {
    let mut pos = Point::new(area.max_x() - settings.margin - size.width, area.y + settings.margin);
    for _ in 0..=occupied.len() {
        if !occupied.contains(&pos) {
            break;
        }
        pos = Point::new(pos.x - settings.cascade_offset, pos.y + settings.cascade_offset);
    }
    pos
}

/// Deterministic SVG card with the title and icon.
pub fn placeholder(title: &str, icon: Option<&str>, size: Size) -> PreviewImage {
    let (w, h) = (size.width.max(1), size.height.max(1));
    let icon = icon.map(escape_xml).unwrap_or_default();
    let title = escape_xml(title);
    let svg = format!(
        concat!(
            r##"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"##,
            r##"<rect width="{w}" height="{h}" rx="8" fill="#2b2b2b"/>"##,
            r##"<text x="{cx}" y="{iy}" font-size="28" text-anchor="middle" fill="#dddddd">{icon}</text>"##,
            r##"<text x="{cx}" y="{ty}" font-size="13" text-anchor="middle" fill="#dddddd">{title}</text>"##,
            "</svg>"
        ),
        w = w,
        h = h,
        cx = w / 2,
        iy = h / 2,
        ty = h / 2 + 24,
        icon = icon,
        title = title,
    );
    PreviewImage::Placeholder { svg }
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

/// Last successfully captured image per window.
#[derive(Debug, Default)]
pub struct SnapshotCache {
    images: HashMap<WindowId, PreviewImage>,
}

impl SnapshotCache {
    pub fn get(&self, window: WindowId) -> Option<&PreviewImage> { self.images.get(&window) }

    pub fn remove(&mut self, window: WindowId) -> Option<PreviewImage> {
        self.images.remove(&window)
    }

    pub fn len(&self) -> usize { self.images.len() }

    pub fn is_empty(&self) -> bool { self.images.is_empty() }

    /// Picks the image for a finished capture: the fresh one (which is also
    /// cached), else the previous capture, else a placeholder.
    pub fn resolve(
        &mut self,
        window: WindowId,
        result: Result<PreviewImage, CaptureError>,
        title: &str,
        icon: Option<&str>,
        size: Size,
    ) -> PreviewImage {
        match result {
            Ok(image) => {
                self.images.insert(window, image.clone());
                image
            }
            Err(e) => match self.images.get(&window) {
                Some(cached) => {
                    debug!(?window, %e, "capture failed, reusing cached image");
                    cached.clone()
                }
                None => {
                    debug!(?window, %e, "capture failed, using placeholder");
                    placeholder(title, icon, size)
                }
            },
        }
    }
}
