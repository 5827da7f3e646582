//! Workspace Module
//!
//! Per-monitor virtual desktops: workarea accounting from client struts,
//! desktop switching, sticky windows and moving clients between desktops and
//! monitors.

use tracing::{debug, info};

use crate::shared::Geometry;
use crate::wm::client::{ClientId, Strut};
use crate::wm::client_flags::StateFlags;
use crate::wm::conn::XConn;
use crate::wm::error::{Tolerate, XError};
use crate::wm::WindowManager;

/// Monitor bounds minus, per edge, the largest reservation among `struts`.
pub fn compute_workarea<I>(monitor: Geometry, struts: I) -> Geometry
where
    I: IntoIterator<Item = Strut>,
{
    let reserved = struts.into_iter().fold(Strut::default(), |acc, s| Strut {
        left: acc.left.max(s.left),
        right: acc.right.max(s.right),
        top: acc.top.max(s.top),
        bottom: acc.bottom.max(s.bottom),
    });
    Geometry {
        x: monitor.x + reserved.left as i32,
        y: monitor.y + reserved.top as i32,
        width: monitor.width.saturating_sub(reserved.left + reserved.right).max(1),
        height: monitor.height.saturating_sub(reserved.top + reserved.bottom).max(1),
    }
}

impl<X: XConn> WindowManager<X> {
    /// Workarea of the desktop a client lives on.
    pub fn client_workarea(&self, id: ClientId) -> Option<Geometry> {
        let c = self.registry.get(id)?;
        let mon = self.registry.monitors.get(c.monitor)?;
        let desktop = if c.is_sticky() { mon.active_desktop } else { c.desktop };
        mon.desktops.get(desktop).map(|d| d.workarea)
    }

    /// Recompute one desktop's workarea, leaving `exclude` out of the strut
    /// maximum.
    pub fn update_workarea(
        &mut self,
        monitor: usize,
        desktop: usize,
        exclude: Option<ClientId>,
    ) -> Result<(), XError> {
        let Some(mon) = self.registry.monitors.get(monitor) else {
            return Ok(());
        };
        let bounds = mon.geometry;
        let struts: Vec<Strut> = self
            .registry
            .monitor_clients(monitor)
            .into_iter()
            .filter(|id| Some(*id) != exclude)
            .filter_map(|id| self.registry.get(id))
            .filter(|c| c.is_on_desktop(desktop) && !c.strut.is_empty())
            .map(|c| c.strut)
            .collect();
        let workarea = compute_workarea(bounds, struts);

        let Some(d) = self.registry.monitors[monitor].desktops.get_mut(desktop) else {
            return Ok(());
        };
        if d.workarea != workarea {
            debug!("Workarea of monitor {} desktop {} is now {:?}", monitor, desktop, workarea);
            d.workarea = workarea;
        }
        self.publish_desktops()
    }

    /// Recompute every desktop of a monitor (sticky struts span them all).
    pub fn update_all_workareas(&mut self, monitor: usize) -> Result<(), XError> {
        let count = self.registry.monitors.get(monitor).map(|m| m.desktops.len()).unwrap_or(0);
        for desktop in 0..count {
            self.update_workarea(monitor, desktop, None)?;
        }
        Ok(())
    }

    /// Switch a monitor to another desktop.
    pub fn view_desktop(&mut self, monitor: usize, desktop: usize) -> Result<(), XError> {
        let Some(mon) = self.registry.monitors.get(monitor) else {
            return Ok(());
        };
        if desktop >= mon.desktops.len() || desktop == mon.active_desktop {
            return Ok(());
        }
        let old = mon.active_desktop;
        info!("Monitor {}: switching desktop {} -> {}", monitor, old, desktop);

        for id in self.registry.monitor_clients(monitor) {
            let Some(c) = self.registry.get(id) else {
                continue;
            };
            if c.is_sticky() {
                continue;
            }
            if c.desktop == old {
                self.conn.unmap(c.decor.frame).tolerate("unmap frame")?;
            } else if c.desktop == desktop {
                self.conn.map(c.decor.frame).tolerate("map frame")?;
            }
        }
        self.registry.monitors[monitor].active_desktop = desktop;
        self.active_monitor = monitor;

        let target = self.registry.monitors[monitor].desktops[desktop]
            .last_active
            .filter(|id| self.is_eligible_on(*id, monitor, desktop))
            .or_else(|| self.first_eligible(monitor, desktop));
        self.activate(target)?;

        self.arrange(monitor, desktop)?;
        self.publish_desktops()
    }

    /// Move a client to another desktop of its monitor.
    pub fn send_to_desktop(&mut self, id: ClientId, desktop: usize) -> Result<(), XError> {
        let Some(c) = self.registry.get(id) else {
            return Ok(());
        };
        let monitor = c.monitor;
        let old = c.desktop;
        let count = self.registry.monitors[monitor].desktops.len();
        if desktop >= count || (desktop == old && !c.is_sticky()) {
            return Ok(());
        }
        info!("Sending {} from desktop {} to {}", id, old, desktop);

        let was_active = self.active == Some(id);
        let successor = if was_active { self.select_successor(id) } else { None };
        self.untile(id)?;

        // departure first, without the mover, then arrival with it
        self.update_workarea(monitor, old, Some(id))?;
        if let Some(c) = self.registry.get_mut(id) {
            c.desktop = desktop;
            c.state.remove(StateFlags::STICKY);
        }
        self.update_workarea(monitor, desktop, None)?;

        let last = &mut self.registry.monitors[monitor].desktops[old].last_active;
        if *last == Some(id) {
            *last = None;
        }

        let visible = self.registry.monitors[monitor].active_desktop == desktop;
        let frame = self.registry.get(id).map(|c| c.decor.frame).unwrap_or_default();
        if visible {
            self.conn.map(frame).tolerate("map frame")?;
        } else {
            self.conn.unmap(frame).tolerate("unmap frame")?;
            if was_active {
                self.activate(successor)?;
            }
        }

        self.arrange(monitor, old)?;
        self.arrange(monitor, desktop)?;
        self.publish_desktop(id)?;
        self.publish_state(id)
    }

    /// Make a client visible on every desktop of its monitor, or pin it back
    /// to the one being shown.
    pub fn toggle_sticky(&mut self, id: ClientId) -> Result<(), XError> {
        let Some(monitor) = self.registry.get(id).map(|c| c.monitor) else {
            return Ok(());
        };
        let shown = self.registry.monitors[monitor].active_desktop;
        let Some(c) = self.registry.get_mut(id) else {
            return Ok(());
        };
        if c.is_sticky() {
            c.state.remove(StateFlags::STICKY);
            c.desktop = shown;
        } else {
            c.state.insert(StateFlags::STICKY);
        }
        let has_strut = !c.strut.is_empty();
        debug!("Client {} sticky: {}", id, c.is_sticky());
        if has_strut {
            self.update_all_workareas(monitor)?;
        }
        self.publish_desktop(id)?;
        self.publish_state(id)
    }

    /// Move a client `delta` steps around the monitor ring, keeping its
    /// position relative to the monitor origin.
    pub fn send_to_monitor(&mut self, id: ClientId, delta: i32) -> Result<(), XError> {
        let Some(c) = self.registry.get(id) else {
            return Ok(());
        };
        let from = c.monitor;
        let old_desktop = c.desktop;
        let to = self.registry.monitor_offset(from, delta);
        if to == from {
            return Ok(());
        }
        info!("Sending {} from monitor {} to {}", id, from, to);

        self.untile(id)?;
        if self.registry.get(id).map(|c| c.is_fullscreen()).unwrap_or(false) {
            self.restore(id)?;
        }

        let src = self.registry.monitors[from].geometry;
        let dst = self.registry.monitors[to].geometry;
        let target_desktop = self.registry.monitors[to].active_desktop;

        self.registry.detach(id);
        match self.registry.monitors[to].tail {
            Some(tail) => self.registry.stack_after(id, tail),
            None => self.registry.push_back(to, id),
        }
        if let Some(c) = self.registry.get_mut(id) {
            c.desktop = target_desktop;
            let frame = c.frame_geometry.translate(dst.x - src.x, dst.y - src.y);
            c.set_frame(frame);
        }
        self.push_geometry(id)?;

        self.update_workarea(from, old_desktop, Some(id))?;
        self.update_workarea(to, target_desktop, None)?;
        if self.active == Some(id) {
            self.active_monitor = to;
        }
        self.arrange(from, old_desktop)?;
        self.arrange(to, target_desktop)?;
        self.publish_desktop(id)
    }

    fn is_eligible_on(&self, id: ClientId, monitor: usize, desktop: usize) -> bool {
        self.registry
            .get(id)
            .map(|c| c.monitor == monitor && c.is_on_desktop(desktop) && c.is_focus_candidate())
            .unwrap_or(false)
    }

    fn first_eligible(&self, monitor: usize, desktop: usize) -> Option<ClientId> {
        self.registry
            .monitor_clients(monitor)
            .into_iter()
            .find(|id| self.is_eligible_on(*id, monitor, desktop))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wm::conn::mock::{Call, MockConn};
    use crate::wm::tests::{managed, wm_with};

    #[test]
    fn test_workarea_takes_per_edge_maximum() {
        let monitor = Geometry::new(0, 0, 1000, 800);
        let struts = [
            Strut { top: 30, ..Strut::default() },
            Strut { top: 20, left: 50, ..Strut::default() },
            Strut { bottom: 40, ..Strut::default() },
        ];
        assert_eq!(compute_workarea(monitor, struts), Geometry::new(50, 30, 950, 730));
        assert_eq!(compute_workarea(monitor, []), monitor);
    }

    #[test]
    fn test_send_to_desktop_moves_strut() {
        let mut wm = wm_with(MockConn::single(1000, 800));
        let panel = managed(&mut wm, 200, Geometry::new(0, 0, 1000, 30));
        wm.registry.get_mut(panel).expect("managed").strut = Strut { top: 30, ..Strut::default() };
        wm.update_workarea(0, 0, None).expect("update");
        assert_eq!(wm.registry.monitors[0].desktops[0].workarea.y, 30);

        wm.send_to_desktop(panel, 1).expect("send");
        let desktops = &wm.registry.monitors[0].desktops;
        assert_eq!(desktops[0].workarea, Geometry::new(0, 0, 1000, 800));
        assert_eq!(desktops[1].workarea, Geometry::new(0, 30, 1000, 770));
        assert_eq!(wm.registry.get(panel).map(|c| c.desktop), Some(1));
    }

    #[test]
    fn test_view_desktop_swaps_visible_frames() {
        let mut wm = wm_with(MockConn::single(1000, 800));
        let a = managed(&mut wm, 200, Geometry::new(10, 40, 300, 200));
        let b = managed(&mut wm, 201, Geometry::new(10, 40, 300, 200));
        wm.send_to_desktop(b, 1).expect("send");
        let frame_a = wm.registry.get(a).expect("a").decor.frame;
        let frame_b = wm.registry.get(b).expect("b").decor.frame;

        wm.conn.clear_calls();
        wm.view_desktop(0, 1).expect("view");
        let calls = wm.conn.calls();
        assert!(calls.contains(&Call::Unmap(frame_a)));
        assert!(calls.contains(&Call::Map(frame_b)));
        assert_eq!(wm.active, Some(b));
        assert_eq!(wm.registry.monitors[0].active_desktop, 1);
    }

    #[test]
    fn test_sticky_client_stays_mapped() {
        let mut wm = wm_with(MockConn::single(1000, 800));
        let a = managed(&mut wm, 200, Geometry::new(10, 40, 300, 200));
        wm.toggle_sticky(a).expect("sticky");
        let frame = wm.registry.get(a).expect("a").decor.frame;
        wm.conn.clear_calls();
        wm.view_desktop(0, 3).expect("view");
        assert!(!wm.conn.calls().contains(&Call::Unmap(frame)));
        assert_eq!(wm.active, Some(a));
    }

    #[test]
    fn test_unsticky_pins_to_shown_desktop() {
        let mut wm = wm_with(MockConn::single(1000, 800));
        let a = managed(&mut wm, 200, Geometry::new(10, 40, 300, 200));
        wm.toggle_sticky(a).expect("sticky");
        wm.view_desktop(0, 4).expect("view");
        wm.toggle_sticky(a).expect("unsticky");
        let c = wm.registry.get(a).expect("a");
        assert!(!c.is_sticky());
        assert_eq!(c.desktop, 4);
        assert_eq!(wm.conn.prop(200, wm.atoms.net_wm_desktop), vec![4]);
    }

    #[test]
    fn test_send_to_monitor_translates_frame() {
        let outputs = vec![Geometry::new(0, 0, 1000, 800), Geometry::new(1000, 0, 1000, 800)];
        let mut wm = wm_with(MockConn::new(outputs));
        let a = managed(&mut wm, 200, Geometry::new(110, 140, 300, 200));
        let before = wm.registry.get(a).expect("a").frame_geometry;
        wm.send_to_monitor(a, 1).expect("send");
        let c = wm.registry.get(a).expect("a");
        assert_eq!(c.monitor, 1);
        assert_eq!(c.frame_geometry, before.translate(1000, 0));
        assert_eq!(wm.registry.monitor_clients(1), vec![a]);
        assert!(wm.registry.monitor_clients(0).is_empty());
    }
}
