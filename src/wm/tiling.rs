//! Tiling Module
//!
//! Two-column master/stack arrangement for desktops in dynamic mode.

use tracing::debug;

use crate::shared::Geometry;
use crate::wm::client::ClientId;
use crate::wm::conn::XConn;
use crate::wm::error::XError;
use crate::wm::WindowManager;

pub const MIN_SPLIT: f32 = 0.05;
pub const MAX_SPLIT: f32 = 0.95;

/// Frame rectangles for `count` clients: the first `masters` in the left
/// column, the rest in the right one. Heights within a column sum exactly to
/// the area height.
pub fn master_stack(area: Geometry, count: usize, masters: usize, split: f32) -> Vec<Geometry> {
    if count == 0 {
        return Vec::new();
    }
    let masters = masters.max(1).min(count);
    let stack = count - masters;
    let master_width = if stack == 0 {
        area.width
    } else {
        ((area.width as f64 * split as f64).round() as u32).min(area.width)
    };

    let mut rects = column(area.x, area.y, master_width, area.height, masters);
    rects.extend(column(
        area.x + master_width as i32,
        area.y,
        area.width - master_width,
        area.height,
        stack,
    ));
    rects
}

fn column(x: i32, y: i32, width: u32, height: u32, count: usize) -> Vec<Geometry> {
    if count == 0 {
        return Vec::new();
    }
    let base = height / count as u32;
    let remainder = (height % count as u32) as usize;
    let mut rects = Vec::with_capacity(count);
    let mut cursor = y;
    for i in 0..count {
        // the last `remainder` cells absorb one extra pixel each
        let h = if i >= count - remainder { base + 1 } else { base };
        rects.push(Geometry::new(x, cursor, width, h));
        cursor += h as i32;
    }
    rects
}

impl<X: XConn> WindowManager<X> {
    /// Re-run the layout of a desktop. No-op unless it is dynamic.
    pub fn arrange(&mut self, monitor: usize, desktop: usize) -> Result<(), XError> {
        let Some(d) = self
            .registry
            .monitors
            .get(monitor)
            .and_then(|m| m.desktops.get(desktop))
        else {
            return Ok(());
        };
        if !d.dynamic {
            return Ok(());
        }
        let (area, masters, split) = (d.workarea, d.masters, d.split);

        let eligible: Vec<ClientId> = self
            .registry
            .desktop_clients(monitor, desktop)
            .into_iter()
            .filter(|id| self.registry.get(*id).map(|c| c.is_tileable()).unwrap_or(false))
            .collect();

        // tiled excludes fullscreen and maximized
        for id in &eligible {
            while self.restore(*id)? {}
        }

        let rects = master_stack(area, eligible.len(), masters, split);
        debug!(
            "Arranging {} clients on monitor {} desktop {} (masters {}, split {:.2})",
            eligible.len(),
            monitor,
            desktop,
            masters,
            split
        );
        for (id, rect) in eligible.into_iter().zip(rects) {
            self.tile(id, rect)?;
        }
        Ok(())
    }

    /// Flip dynamic mode on the monitor's active desktop.
    pub fn toggle_dynamic(&mut self, monitor: usize) -> Result<(), XError> {
        let Some(mon) = self.registry.monitors.get_mut(monitor) else {
            return Ok(());
        };
        let desktop = mon.active_desktop;
        let d = &mut mon.desktops[desktop];
        d.dynamic = !d.dynamic;
        debug!("Monitor {} desktop {} dynamic: {}", monitor, desktop, d.dynamic);

        if d.dynamic {
            return self.arrange(monitor, desktop);
        }
        for id in self.registry.desktop_clients(monitor, desktop) {
            self.untile(id)?;
        }
        Ok(())
    }

    pub fn adjust_masters(&mut self, monitor: usize, delta: i32) -> Result<(), XError> {
        let Some(mon) = self.registry.monitors.get_mut(monitor) else {
            return Ok(());
        };
        let desktop = mon.active_desktop;
        let d = &mut mon.desktops[desktop];
        d.masters = (d.masters as i64 + delta as i64).max(1) as usize;
        self.arrange(monitor, desktop)
    }

    pub fn adjust_split(&mut self, monitor: usize, delta: f32) -> Result<(), XError> {
        let Some(mon) = self.registry.monitors.get(monitor) else {
            return Ok(());
        };
        let split = mon.desktop().split + delta;
        self.set_split(monitor, split)
    }

    pub fn set_split(&mut self, monitor: usize, split: f32) -> Result<(), XError> {
        let Some(mon) = self.registry.monitors.get_mut(monitor) else {
            return Ok(());
        };
        let desktop = mon.active_desktop;
        mon.desktops[desktop].split = split.clamp(MIN_SPLIT, MAX_SPLIT);
        self.arrange(monitor, desktop)
    }
}
