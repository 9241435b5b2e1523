use slotmap::SlotMap;
use tracing::trace;

use super::window::{WindowConfig, WindowId, WindowRecord};
use crate::common::config::WindowSettings;
use crate::sys::geometry::{Point, Rect, Size};

/// Owns every live [`WindowRecord`]. Nothing else holds records; geometry and
/// lifecycle writes go through `get_mut` from the engine.
#[derive(Debug, Default)]
pub struct WindowRegistry {
    windows: SlotMap<WindowId, WindowRecord>,
    cascade_index: i32,
}

impl WindowRegistry {
    pub fn new() -> Self { Self::default() }

    /// Inserts a record built from `config`. Missing geometry is filled from
    /// `settings` and the cascade.
    pub fn create(
        &mut self,
        config: WindowConfig,
        settings: &WindowSettings,
        area: Rect,
        z_order: u64,
    ) -> WindowId {
        let geometry = self.initial_geometry(&config, settings, area);
        let id = self.windows.insert_with_key(|id| WindowRecord::new(id, config, geometry, z_order));
        trace!(?id, ?geometry, "created window record");
        id
    }

    pub fn remove(&mut self, id: WindowId) -> Option<WindowRecord> { self.windows.remove(id) }

    #[inline]
    pub fn contains(&self, id: WindowId) -> bool { self.windows.contains_key(id) }

    #[inline]
    pub fn get(&self, id: WindowId) -> Option<&WindowRecord> { self.windows.get(id) }

    #[inline]
    pub fn get_mut(&mut self, id: WindowId) -> Option<&mut WindowRecord> {
        self.windows.get_mut(id)
    }

    #[inline]
    pub fn len(&self) -> usize { self.windows.len() }

    #[inline]
    pub fn is_empty(&self) -> bool { self.windows.is_empty() }

    pub fn ids(&self) -> Vec<WindowId> { self.windows.keys().collect() }

    pub fn iter(&self) -> impl Iterator<Item = &WindowRecord> + '_ { self.windows.values() }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut WindowRecord> + '_ {
        self.windows.values_mut()
    }

    /// All records, back to front.
    pub fn sorted_by_z(&self) -> Vec<&WindowRecord> {
        let mut all: Vec<_> = self.windows.values().collect();
        all.sort_by_key(|w| w.z_order);
        all
    }

    /// Front-most visible window, ignoring `exclude`.
    pub fn top_visible(&self, exclude: Option<WindowId>) -> Option<WindowId> {
        self.windows
            .values()
            .filter(|w| w.is_visible() && Some(w.id) != exclude)
            .max_by_key(|w| w.z_order)
            .map(|w| w.id)
    }

    fn initial_geometry(&mut self, config: &WindowConfig, settings: &WindowSettings, area: Rect) -> Rect {
        let size = Size::new(
            config.width.unwrap_or(settings.default_width).max(settings.min_width),
            config.height.unwrap_or(settings.default_height).max(settings.min_height),
        );
        let origin = match (config.x, config.y) {
            (Some(x), Some(y)) => Point::new(x, y),
            (x, y) => {
                let cascade = self.next_cascade_position(size, settings, area);
                Point::new(x.unwrap_or(cascade.x), y.unwrap_or(cascade.y))
            }
        };
        Rect::from_parts(origin, size)
    }

    /// `origin + n * offset` relative to the available area, wrapping back to
    /// the origin once the window would leave it.
    fn next_cascade_position(&mut self, size: Size, settings: &WindowSettings, area: Rect) -> Point {
        let at = |n: i32| {
            Point::new(
                area.x + settings.cascade_origin_x + n * settings.cascade_offset,
                area.y + settings.cascade_origin_y + n * settings.cascade_offset,
            )
        };
        let mut n = self.cascade_index;
        let candidate = Rect::from_parts(at(n), size);
        if n > 0 && !area.contains_rect(candidate) {
            n = 0;
        }
        self.cascade_index = n + 1;
        at(n)
    }
}
