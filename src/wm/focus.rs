//! Focus Module
//!
//! Active-client transfer, successor selection and focus cycling.
//!
//! Inactive clients carry a synchronous click grab so the first click on them
//! activates; the active client carries the modifier drag grabs instead.

use tracing::{debug, info};
use x11rb::protocol::xproto::AtomEnum;
use x11rb::CURRENT_TIME;

use crate::wm::client::ClientId;
use crate::wm::client_flags::{Direction, Protocols, StateFlags};
use crate::wm::conn::{XConn, Xid};
use crate::wm::error::{Tolerate, XError};
use crate::wm::hints::clear_urgency;
use crate::wm::WindowManager;

impl<X: XConn> WindowManager<X> {
    /// Make `target` the active client, or clear focus with `None`.
    pub fn activate(&mut self, target: Option<ClientId>) -> Result<(), XError> {
        let target = target.filter(|id| self.registry.contains(*id));

        if let Some(previous) = self.active {
            if Some(previous) != target {
                self.deactivate(previous)?;
            }
        }

        let Some(id) = target else {
            if self.active.take().is_some() {
                debug!("No eligible client, clearing focus");
            }
            self.conn.focus_root()?;
            return self.publish_active();
        };

        let modifiers = self.config.behavior.drag_modifier.mask();
        let Some(c) = self.registry.get_mut(id) else {
            return Ok(());
        };
        c.active = true;
        c.state.remove(StateFlags::DEMANDS_ATTENTION);
        let (window, protocols, monitor, desktop) = (c.window, c.protocols, c.monitor, c.desktop);
        let desktop = if c.is_sticky() {
            self.registry.monitors[monitor].active_desktop
        } else {
            desktop
        };
        self.registry.monitors[monitor].desktops[desktop].last_active = Some(id);
        self.active = Some(id);
        self.active_monitor = monitor;

        self.conn.ungrab_buttons(window).tolerate("ungrab buttons")?;
        self.conn
            .grab_drag_buttons(window, modifiers)
            .tolerate("grab drag buttons")?;
        if protocols.contains(Protocols::FOCUSABLE) {
            self.conn.set_input_focus(window).tolerate("set input focus")?;
        } else if protocols.contains(Protocols::TAKE_FOCUS) {
            let data = [self.atoms.wm_take_focus, CURRENT_TIME, 0, 0, 0];
            self.conn
                .send_client_message(window, self.atoms.wm_protocols, data)
                .tolerate("WM_TAKE_FOCUS")?;
        }
        self.clear_urgency_hint(window)?;
        info!("Activated {} (window 0x{:x})", id, window);

        self.publish_state(id)?;
        self.publish_active()
    }

    /// Drop the client's own urgency flag so a later WM_HINTS change does
    /// not bring the attention state back.
    fn clear_urgency_hint(&self, window: Xid) -> Result<(), XError> {
        let hints: u32 = AtomEnum::WM_HINTS.into();
        let values = self
            .conn
            .get_property32(window, hints, hints)
            .tolerate("read WM_HINTS")?
            .unwrap_or_default();
        if let Some(cleared) = clear_urgency(&values) {
            self.conn
                .set_property32(window, hints, hints, &cleared)
                .tolerate("clear urgency")?;
        }
        Ok(())
    }

    /// Hand the client back its click-to-activate grab. The modifier drag
    /// grabs belong to the active client only, so the first plain click on
    /// an inactive one is intercepted, activates it and is then replayed.
    fn deactivate(&mut self, id: ClientId) -> Result<(), XError> {
        let Some(c) = self.registry.get_mut(id) else {
            return Ok(());
        };
        c.active = false;
        let window = c.window;
        self.conn.ungrab_buttons(window).tolerate("ungrab buttons")?;
        self.conn.grab_click(window).tolerate("grab click")?;
        Ok(())
    }

    /// Client to activate once `removed` stops being eligible. Must be called
    /// while `removed` is still linked into its monitor list.
    pub fn select_successor(&self, removed: ClientId) -> Option<ClientId> {
        let c = self.registry.get(removed)?;
        let (monitor, desktop) = (c.monitor, self.registry.monitors[c.monitor].active_desktop);
        let eligible = |id: ClientId| {
            id != removed
                && self
                    .registry
                    .get(id)
                    .map(|o| o.is_on_desktop(desktop) && o.is_focus_candidate())
                    .unwrap_or(false)
        };

        if let Some(last) = self.registry.monitors[monitor].desktops[desktop].last_active {
            if eligible(last) {
                return Some(last);
            }
        }

        let list = self.registry.monitor_clients(monitor);
        let pos = list.iter().position(|id| *id == removed).unwrap_or(0);
        list[pos..]
            .iter()
            .chain(list[..pos].iter())
            .copied()
            .find(|id| eligible(*id))
    }

    /// Activate and raise the next or previous eligible client on the active
    /// monitor's desktop.
    pub fn cycle_focus(&mut self, direction: Direction) -> Result<(), XError> {
        let monitor = self.active_monitor;
        let Some(desktop) = self.registry.monitors.get(monitor).map(|m| m.active_desktop) else {
            return Ok(());
        };
        let candidates: Vec<ClientId> = self
            .registry
            .monitor_clients(monitor)
            .into_iter()
            .filter(|id| {
                self.registry
                    .get(*id)
                    .map(|c| c.is_on_desktop(desktop) && c.is_focus_candidate())
                    .unwrap_or(false)
            })
            .collect();
        if candidates.is_empty() {
            return Ok(());
        }
        let len = candidates.len();
        let next = match self.active.and_then(|a| candidates.iter().position(|id| *id == a)) {
            Some(pos) => match direction {
                Direction::Down => (pos + 1) % len,
                Direction::Up => (pos + len - 1) % len,
            },
            None => 0,
        };
        let id = candidates[next];
        self.activate(Some(id))?;
        self.raise(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::Geometry;
    use crate::wm::client_flags::WindowType;
    use crate::wm::conn::mock::{Call, MockConn, ROOT};
    use crate::wm::tests::{managed, wm_with};

    #[test]
    fn test_activate_clears_urgency_hint() {
        let mut wm = wm_with(MockConn::single(1000, 800));
        let a = managed(&mut wm, 200, Geometry::new(10, 40, 300, 200));
        managed(&mut wm, 201, Geometry::new(10, 40, 300, 200));
        let hints: u32 = AtomEnum::WM_HINTS.into();
        // input hint plus urgency
        wm.conn.set_prop(200, hints, &[1 | (1 << 8), 1, 0, 0, 0, 0, 0, 0, 0]);

        wm.activate(Some(a)).expect("activate");
        let values = wm.conn.prop(200, hints);
        assert_eq!(values[0], 1);
        assert_eq!(values[1], 1);
        assert!(!wm.registry.get(a).expect("a").state.contains(StateFlags::DEMANDS_ATTENTION));
    }

    #[test]
    fn test_activate_swaps_grabs() {
        let mut wm = wm_with(MockConn::single(1000, 800));
        let a = managed(&mut wm, 200, Geometry::new(10, 40, 300, 200));
        let b = managed(&mut wm, 201, Geometry::new(10, 40, 300, 200));
        assert_eq!(wm.active, Some(b));

        wm.conn.clear_calls();
        wm.activate(Some(a)).expect("activate");
        let calls = wm.conn.calls();
        assert!(calls.contains(&Call::GrabClick(201)));
        assert!(calls.contains(&Call::GrabDrag(200)));
        assert!(calls.contains(&Call::Focus(200)));
        assert!(!wm.registry.get(b).expect("b").active);
        assert!(wm.registry.get(a).expect("a").active);
        assert_eq!(wm.conn.prop(ROOT, wm.atoms.net_active_window), vec![200]);
    }

    #[test]
    fn test_take_focus_when_not_focusable() {
        let mut wm = wm_with(MockConn::single(1000, 800));
        let a = managed(&mut wm, 200, Geometry::new(10, 40, 300, 200));
        wm.registry.get_mut(a).expect("a").protocols = Protocols::TAKE_FOCUS;
        wm.activate(None).expect("clear");

        wm.conn.clear_calls();
        wm.activate(Some(a)).expect("activate");
        let calls = wm.conn.calls();
        assert!(!calls.contains(&Call::Focus(200)));
        assert!(calls.iter().any(|c| matches!(
            c,
            Call::ClientMessage(200, t, data) if *t == wm.atoms.wm_protocols && data[0] == wm.atoms.wm_take_focus
        )));
    }

    #[test]
    fn test_activate_none_clears_focus() {
        let mut wm = wm_with(MockConn::single(1000, 800));
        managed(&mut wm, 200, Geometry::new(10, 40, 300, 200));
        wm.conn.clear_calls();
        wm.activate(None).expect("clear");
        assert_eq!(wm.active, None);
        assert!(wm.conn.calls().contains(&Call::FocusRoot));
        assert_eq!(wm.conn.prop(ROOT, wm.atoms.net_active_window), vec![0]);
    }

    #[test]
    fn test_activation_clears_attention() {
        let mut wm = wm_with(MockConn::single(1000, 800));
        let a = managed(&mut wm, 200, Geometry::new(10, 40, 300, 200));
        managed(&mut wm, 201, Geometry::new(10, 40, 300, 200));
        wm.registry
            .get_mut(a)
            .expect("a")
            .state
            .insert(StateFlags::DEMANDS_ATTENTION);
        wm.activate(Some(a)).expect("activate");
        assert!(!wm.registry.get(a).expect("a").state.contains(StateFlags::DEMANDS_ATTENTION));
    }

    #[test]
    fn test_successor_skips_ineligible_and_wraps() {
        let mut wm = wm_with(MockConn::single(1000, 800));
        let a = managed(&mut wm, 200, Geometry::new(10, 40, 300, 200));
        let dock = managed(&mut wm, 201, Geometry::new(0, 0, 1000, 30));
        let c = managed(&mut wm, 202, Geometry::new(10, 40, 300, 200));
        let d = managed(&mut wm, 203, Geometry::new(10, 40, 300, 200));
        wm.registry.get_mut(dock).expect("dock").window_type = WindowType::Dock;

        // d is the remembered client; removing it scans forward and wraps
        assert_eq!(wm.select_successor(d), Some(a));

        wm.activate(Some(a)).expect("activate");
        // removing c prefers the remembered client
        assert_eq!(wm.select_successor(c), Some(a));
        // removing a skips the dock
        assert_eq!(wm.select_successor(a), Some(c));
    }

    #[test]
    fn test_cycle_focus_wraps() {
        let mut wm = wm_with(MockConn::single(1000, 800));
        let a = managed(&mut wm, 200, Geometry::new(10, 40, 300, 200));
        let b = managed(&mut wm, 201, Geometry::new(10, 40, 300, 200));
        assert_eq!(wm.active, Some(b));
        wm.cycle_focus(Direction::Down).expect("cycle");
        assert_eq!(wm.active, Some(a));
        wm.cycle_focus(Direction::Up).expect("cycle");
        assert_eq!(wm.active, Some(b));
    }
}
