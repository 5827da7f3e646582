//! Stacking Module
//!
//! List order within a monitor (what the tiler and focus cycling walk) and
//! z-order on the server (raise/lower, carried down to transients).

use std::collections::HashSet;

use tracing::debug;

use crate::wm::client::ClientId;
use crate::wm::client_flags::{Direction, StateFlags};
use crate::wm::conn::{Restack, XConn};
use crate::wm::error::{Tolerate, XError};
use crate::wm::WindowManager;

impl<X: XConn> WindowManager<X> {
    /// Swap a client with its nearest eligible neighbour in the list and
    /// re-tile. Only meaningful while the monitor shows a dynamic desktop.
    pub fn stack_directional(&mut self, id: ClientId, direction: Direction) -> Result<(), XError> {
        let Some(monitor) = self.registry.get(id).map(|c| c.monitor) else {
            return Ok(());
        };
        let mon = &self.registry.monitors[monitor];
        let desktop = mon.active_desktop;
        if !mon.desktops[desktop].dynamic {
            return Ok(());
        }

        let list = self.registry.monitor_clients(monitor);
        let Some(pos) = list.iter().position(|other| *other == id) else {
            return Ok(());
        };
        let eligible = |other: &&ClientId| {
            self.registry
                .get(**other)
                .map(|o| o.desktop == desktop && o.is_tileable())
                .unwrap_or(false)
        };
        let neighbour = match direction {
            Direction::Down => list[pos + 1..].iter().find(eligible),
            Direction::Up => list[..pos].iter().rev().find(eligible),
        };
        let Some(&neighbour) = neighbour else {
            return Ok(());
        };

        debug!("Stacking {} {:?} past {}", id, direction, neighbour);
        match direction {
            Direction::Down => self.registry.stack_after(id, neighbour),
            Direction::Up => self.registry.stack_before(id, neighbour),
        }
        self.arrange(monitor, desktop)
    }

    pub fn raise(&mut self, id: ClientId) -> Result<(), XError> {
        let mut visited = HashSet::new();
        self.restack_tree(id, Restack::Raise, &mut visited)
    }

    pub fn lower(&mut self, id: ClientId) -> Result<(), XError> {
        let mut visited = HashSet::new();
        self.restack_tree(id, Restack::Lower, &mut visited)
    }

    fn restack_tree(
        &mut self,
        id: ClientId,
        mode: Restack,
        visited: &mut HashSet<ClientId>,
    ) -> Result<(), XError> {
        if !visited.insert(id) {
            return Ok(());
        }
        let Some(c) = self.registry.get_mut(id) else {
            return Ok(());
        };
        match mode {
            Restack::Raise => {
                c.state.remove(StateFlags::BELOW);
                c.state.insert(StateFlags::ABOVE);
            }
            Restack::Lower => {
                c.state.remove(StateFlags::ABOVE);
                c.state.insert(StateFlags::BELOW);
            }
        }
        let frame = c.decor.frame;
        let handles = if c.is_fixed_kind() || c.is_size_fixed() {
            Vec::new()
        } else {
            c.decor.handles.clone()
        };
        let transients = c.transients.clone();

        self.conn.restack(frame, mode).tolerate("restack frame")?;
        for handle in handles {
            self.conn.restack(handle, mode).tolerate("restack handle")?;
        }
        self.publish_state(id)?;

        for transient in transients {
            self.restack_tree(transient, mode, visited)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::Geometry;
    use crate::wm::conn::mock::{Call, MockConn};
    use crate::wm::tests::{managed, wm_with};

    #[test]
    fn test_stack_down_swaps_and_retiles() {
        let mut wm = wm_with(MockConn::single(1000, 800));
        let a = managed(&mut wm, 200, Geometry::new(10, 40, 300, 200));
        let b = managed(&mut wm, 201, Geometry::new(10, 40, 300, 200));
        wm.toggle_dynamic(0).expect("dynamic");
        assert_eq!(wm.registry.get(a).expect("a").frame_geometry.x, 0);

        wm.stack_directional(a, Direction::Down).expect("stack");
        assert_eq!(wm.registry.monitor_clients(0), vec![b, a]);
        assert_eq!(wm.registry.get(a).expect("a").frame_geometry.x, 500);
    }

    #[test]
    fn test_stack_past_end_is_noop() {
        let mut wm = wm_with(MockConn::single(1000, 800));
        let a = managed(&mut wm, 200, Geometry::new(10, 40, 300, 200));
        let b = managed(&mut wm, 201, Geometry::new(10, 40, 300, 200));
        wm.toggle_dynamic(0).expect("dynamic");
        wm.conn.clear_calls();

        wm.stack_directional(b, Direction::Down).expect("stack");
        assert_eq!(wm.registry.monitor_clients(0), vec![a, b]);
        assert!(wm.conn.calls().is_empty());
    }

    #[test]
    fn test_stack_skips_ineligible() {
        let mut wm = wm_with(MockConn::single(1000, 800));
        let a = managed(&mut wm, 200, Geometry::new(10, 40, 300, 200));
        let b = managed(&mut wm, 201, Geometry::new(10, 40, 300, 200));
        let c = managed(&mut wm, 202, Geometry::new(10, 40, 300, 200));
        wm.toggle_dynamic(0).expect("dynamic");
        wm.minimize(b).expect("minimize");

        wm.stack_directional(a, Direction::Down).expect("stack");
        assert_eq!(wm.registry.monitor_clients(0), vec![b, c, a]);
    }

    #[test]
    fn test_floating_desktop_ignores_stacking() {
        let mut wm = wm_with(MockConn::single(1000, 800));
        let a = managed(&mut wm, 200, Geometry::new(10, 40, 300, 200));
        let b = managed(&mut wm, 201, Geometry::new(10, 40, 300, 200));
        wm.stack_directional(a, Direction::Down).expect("stack");
        assert_eq!(wm.registry.monitor_clients(0), vec![a, b]);
    }

    #[test]
    fn test_stacking_follows_shown_desktop() {
        let mut wm = wm_with(MockConn::single(1000, 800));
        let a = managed(&mut wm, 200, Geometry::new(10, 40, 300, 200));
        let b = managed(&mut wm, 201, Geometry::new(10, 40, 300, 200));
        wm.toggle_dynamic(0).expect("dynamic");
        wm.toggle_sticky(a).expect("sticky");
        wm.view_desktop(0, 1).expect("view");
        assert!(!wm.registry.monitors[0].desktops[1].dynamic);
        wm.conn.clear_calls();

        wm.stack_directional(a, Direction::Down).expect("stack");
        assert_eq!(wm.registry.monitor_clients(0), vec![a, b]);
        assert!(wm.conn.calls().is_empty());
    }

    #[test]
    fn test_raise_cascades_to_transients() {
        let mut wm = wm_with(MockConn::single(1000, 800));
        let owner = managed(&mut wm, 200, Geometry::new(10, 40, 300, 200));
        let dialog = managed(&mut wm, 201, Geometry::new(10, 40, 100, 100));
        wm.link_transient(dialog, owner);

        wm.conn.clear_calls();
        wm.raise(owner).expect("raise");
        let owner_frame = wm.registry.get(owner).expect("owner").decor.frame;
        let dialog_frame = wm.registry.get(dialog).expect("dialog").decor.frame;
        let restacks: Vec<Call> = wm
            .conn
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Restack(w, Restack::Raise) if *w == owner_frame || *w == dialog_frame))
            .collect();
        assert_eq!(
            restacks,
            vec![
                Call::Restack(owner_frame, Restack::Raise),
                Call::Restack(dialog_frame, Restack::Raise)
            ]
        );
        assert!(wm.registry.get(dialog).expect("dialog").state.contains(StateFlags::ABOVE));

        wm.lower(owner).expect("lower");
        let c = wm.registry.get(owner).expect("owner");
        assert!(c.state.contains(StateFlags::BELOW));
        assert!(!c.state.contains(StateFlags::ABOVE));
    }

    #[test]
    fn test_raise_survives_transient_cycle() {
        let mut wm = wm_with(MockConn::single(1000, 800));
        let a = managed(&mut wm, 200, Geometry::new(10, 40, 300, 200));
        let b = managed(&mut wm, 201, Geometry::new(10, 40, 300, 200));
        // corrupt the relation behind the linker's back
        wm.registry.get_mut(a).expect("a").transients.push(b);
        wm.registry.get_mut(b).expect("b").transients.push(a);
        wm.raise(a).expect("raise terminates");
    }
}
