//! EWMH / ICCCM protocol synchronization
//!
//! Interned atoms, `_NET_WM_STATE` advertisement and the root-window
//! properties pagers and panels read.

use tracing::debug;
use x11rb::protocol::xproto::{Atom, AtomEnum};

use crate::wm::client::ClientId;
use crate::wm::client_flags::StateFlags;
use crate::wm::conn::{XConn, Xid};
use crate::wm::error::{Tolerate, XError};
use crate::wm::WindowManager;

macro_rules! atoms {
    ($($field:ident => $name:literal,)*) => {
        /// Holds all interned atoms
        #[derive(Debug, Clone)]
        pub struct Atoms {
            $(pub $field: Atom,)*
        }

        impl Atoms {
            /// Intern every atom through `intern`.
            pub fn intern<F>(mut intern: F) -> Result<Self, XError>
            where
                F: FnMut(&'static str) -> Result<Atom, XError>,
            {
                Ok(Self {
                    $($field: intern($name)?,)*
                })
            }
        }
    };
}

atoms! {
    net_supported => "_NET_SUPPORTED",
    net_supporting_wm_check => "_NET_SUPPORTING_WM_CHECK",
    net_client_list => "_NET_CLIENT_LIST",
    net_number_of_desktops => "_NET_NUMBER_OF_DESKTOPS",
    net_current_desktop => "_NET_CURRENT_DESKTOP",
    net_active_window => "_NET_ACTIVE_WINDOW",
    net_workarea => "_NET_WORKAREA",
    net_close_window => "_NET_CLOSE_WINDOW",
    net_request_frame_extents => "_NET_REQUEST_FRAME_EXTENTS",
    net_frame_extents => "_NET_FRAME_EXTENTS",
    net_wm_name => "_NET_WM_NAME",
    net_wm_desktop => "_NET_WM_DESKTOP",
    net_wm_strut => "_NET_WM_STRUT",
    net_wm_strut_partial => "_NET_WM_STRUT_PARTIAL",
    net_wm_window_type => "_NET_WM_WINDOW_TYPE",
    net_wm_window_type_desktop => "_NET_WM_WINDOW_TYPE_DESKTOP",
    net_wm_window_type_dock => "_NET_WM_WINDOW_TYPE_DOCK",
    net_wm_window_type_dialog => "_NET_WM_WINDOW_TYPE_DIALOG",
    net_wm_window_type_toolbar => "_NET_WM_WINDOW_TYPE_TOOLBAR",
    net_wm_window_type_menu => "_NET_WM_WINDOW_TYPE_MENU",
    net_wm_window_type_utility => "_NET_WM_WINDOW_TYPE_UTILITY",
    net_wm_window_type_splash => "_NET_WM_WINDOW_TYPE_SPLASH",
    net_wm_window_type_notification => "_NET_WM_WINDOW_TYPE_NOTIFICATION",
    net_wm_window_type_normal => "_NET_WM_WINDOW_TYPE_NORMAL",
    net_wm_state => "_NET_WM_STATE",
    net_wm_state_maximized_horz => "_NET_WM_STATE_MAXIMIZED_HORZ",
    net_wm_state_maximized_vert => "_NET_WM_STATE_MAXIMIZED_VERT",
    net_wm_state_fullscreen => "_NET_WM_STATE_FULLSCREEN",
    net_wm_state_hidden => "_NET_WM_STATE_HIDDEN",
    net_wm_state_sticky => "_NET_WM_STATE_STICKY",
    net_wm_state_above => "_NET_WM_STATE_ABOVE",
    net_wm_state_below => "_NET_WM_STATE_BELOW",
    net_wm_state_demands_attention => "_NET_WM_STATE_DEMANDS_ATTENTION",
    net_wm_state_modal => "_NET_WM_STATE_MODAL",
    net_wm_state_shaded => "_NET_WM_STATE_SHADED",
    net_wm_state_skip_taskbar => "_NET_WM_STATE_SKIP_TASKBAR",
    net_wm_state_skip_pager => "_NET_WM_STATE_SKIP_PAGER",
    wm_protocols => "WM_PROTOCOLS",
    wm_delete_window => "WM_DELETE_WINDOW",
    wm_take_focus => "WM_TAKE_FOCUS",
    wm_state => "WM_STATE",
    wm_change_state => "WM_CHANGE_STATE",
    utf8_string => "UTF8_STRING",
}

/// `_NET_WM_STATE` client-message action codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateAction {
    Remove,
    Add,
    Toggle,
}

impl StateAction {
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::Remove),
            1 => Some(Self::Add),
            2 => Some(Self::Toggle),
            _ => None,
        }
    }

    /// Whether the state should end up set, given whether it is set now.
    pub fn resolve(&self, currently: bool) -> bool {
        match self {
            Self::Remove => false,
            Self::Add => true,
            Self::Toggle => !currently,
        }
    }
}

/// ICCCM `WM_STATE` values
pub const WM_STATE_NORMAL: u32 = 1;
pub const WM_STATE_ICONIC: u32 = 3;

impl Atoms {
    /// State bits this manager interprets, paired with their atoms.
    pub fn managed_states(&self) -> [(StateFlags, Atom); 8] {
        [
            (StateFlags::MAXIMIZED_HORZ, self.net_wm_state_maximized_horz),
            (StateFlags::MAXIMIZED_VERT, self.net_wm_state_maximized_vert),
            (StateFlags::FULLSCREEN, self.net_wm_state_fullscreen),
            (StateFlags::HIDDEN, self.net_wm_state_hidden),
            (StateFlags::STICKY, self.net_wm_state_sticky),
            (StateFlags::ABOVE, self.net_wm_state_above),
            (StateFlags::BELOW, self.net_wm_state_below),
            (StateFlags::DEMANDS_ATTENTION, self.net_wm_state_demands_attention),
        ]
    }

    pub fn state_flag(&self, atom: Atom) -> Option<StateFlags> {
        self.managed_states()
            .into_iter()
            .find(|(_, a)| *a == atom)
            .map(|(flag, _)| flag)
    }

    /// Merge our state bits into a `_NET_WM_STATE` value, keeping atoms we do
    /// not interpret (modal, shaded, skip-taskbar, skip-pager, ...).
    pub fn merge_state(&self, existing: &[Atom], state: StateFlags) -> Vec<Atom> {
        let managed = self.managed_states();
        let mut merged: Vec<Atom> = existing
            .iter()
            .copied()
            .filter(|a| !managed.iter().any(|(_, m)| m == a))
            .collect();
        for (flag, atom) in managed {
            if state.contains(flag) {
                merged.push(atom);
            }
        }
        merged
    }

    pub fn supported(&self) -> Vec<Atom> {
        let mut atoms = vec![
            self.net_supported,
            self.net_supporting_wm_check,
            self.net_client_list,
            self.net_number_of_desktops,
            self.net_current_desktop,
            self.net_active_window,
            self.net_workarea,
            self.net_close_window,
            self.net_request_frame_extents,
            self.net_frame_extents,
            self.net_wm_name,
            self.net_wm_desktop,
            self.net_wm_strut,
            self.net_wm_strut_partial,
            self.net_wm_window_type,
            self.net_wm_state,
        ];
        atoms.extend(self.managed_states().iter().map(|(_, a)| *a));
        atoms
    }
}

impl<X: XConn> WindowManager<X> {
    /// Re-publish the full state of a client.
    pub fn publish_state(&self, id: ClientId) -> Result<(), XError> {
        let Some(client) = self.registry.get(id) else {
            return Ok(());
        };
        let window = client.window;
        let state = client.state;
        let atom = u32::from(AtomEnum::ATOM);

        let Some(existing) = self
            .conn
            .get_property32(window, self.atoms.net_wm_state, atom)
            .tolerate("read _NET_WM_STATE")?
        else {
            return Ok(());
        };
        let merged = self.atoms.merge_state(&existing, state);
        self.conn
            .set_property32(window, self.atoms.net_wm_state, atom, &merged)
            .tolerate("write _NET_WM_STATE")?;

        let wm_state = if state.contains(StateFlags::HIDDEN) {
            WM_STATE_ICONIC
        } else {
            WM_STATE_NORMAL
        };
        self.conn
            .set_property32(window, self.atoms.wm_state, self.atoms.wm_state, &[wm_state, 0])
            .tolerate("write WM_STATE")?;
        debug!("Published state {:?} for window 0x{:x}", state, window);
        Ok(())
    }

    pub fn publish_frame_extents(&self, id: ClientId) -> Result<(), XError> {
        let Some(client) = self.registry.get(id) else {
            return Ok(());
        };
        self.conn
            .set_property32(
                client.window,
                self.atoms.net_frame_extents,
                AtomEnum::CARDINAL.into(),
                &client.extents().as_frame_extents(),
            )
            .tolerate("write _NET_FRAME_EXTENTS")?;
        Ok(())
    }

    pub fn publish_desktop(&self, id: ClientId) -> Result<(), XError> {
        let Some(client) = self.registry.get(id) else {
            return Ok(());
        };
        let desktop = if client.state.contains(StateFlags::STICKY) {
            u32::MAX
        } else {
            client.desktop as u32
        };
        self.conn
            .set_property32(client.window, self.atoms.net_wm_desktop, AtomEnum::CARDINAL.into(), &[desktop])
            .tolerate("write _NET_WM_DESKTOP")?;
        Ok(())
    }

    pub fn publish_active(&self) -> Result<(), XError> {
        let window: Xid = self
            .active
            .and_then(|id| self.registry.get(id))
            .map(|c| c.window)
            .unwrap_or(0);
        self.conn.set_property32(
            self.conn.root(),
            self.atoms.net_active_window,
            AtomEnum::WINDOW.into(),
            &[window],
        )
    }

    pub fn publish_client_list(&self) -> Result<(), XError> {
        let mut windows = Vec::new();
        for mon in 0..self.registry.monitors.len() {
            for id in self.registry.monitor_clients(mon) {
                if let Some(c) = self.registry.get(id) {
                    windows.push(c.window);
                }
            }
        }
        self.conn.set_property32(
            self.conn.root(),
            self.atoms.net_client_list,
            AtomEnum::WINDOW.into(),
            &windows,
        )
    }

    /// `_NET_NUMBER_OF_DESKTOPS`, `_NET_CURRENT_DESKTOP` and `_NET_WORKAREA`,
    /// taken from the first monitor.
    pub fn publish_desktops(&self) -> Result<(), XError> {
        let root = self.conn.root();
        let Some(mon) = self.registry.monitors.first() else {
            return Ok(());
        };
        let count = mon.desktops.len() as u32;
        self.conn
            .set_property32(root, self.atoms.net_number_of_desktops, AtomEnum::CARDINAL.into(), &[count])?;

        let active_mon = &self.registry.monitors[self.active_monitor];
        self.conn.set_property32(
            root,
            self.atoms.net_current_desktop,
            AtomEnum::CARDINAL.into(),
            &[active_mon.active_desktop as u32],
        )?;

        let workareas: Vec<u32> = mon
            .desktops
            .iter()
            .flat_map(|d| {
                let w = d.workarea;
                [w.x as u32, w.y as u32, w.width, w.height]
            })
            .collect();
        self.conn
            .set_property32(root, self.atoms.net_workarea, AtomEnum::CARDINAL.into(), &workareas)
    }

    /// `_NET_SUPPORTED` and the supporting-WM check window.
    pub fn publish_supported(&self, check_window: Xid) -> Result<(), XError> {
        let root = self.conn.root();
        self.conn
            .set_property32(root, self.atoms.net_supported, AtomEnum::ATOM.into(), &self.atoms.supported())?;
        for window in [root, check_window] {
            self.conn.set_property32(
                window,
                self.atoms.net_supporting_wm_check,
                AtomEnum::WINDOW.into(),
                &[check_window],
            )?;
        }
        self.conn
            .set_property8(check_window, self.atoms.net_wm_name, self.atoms.utf8_string, b"strata")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub fn test_atoms() -> Atoms {
        let mut next = 100;
        Atoms::intern(|_| {
            next += 1;
            Ok(next)
        })
        .expect("interning never fails in tests")
    }

    #[test]
    fn test_toggle_twice_restores() {
        for start in [false, true] {
            let once = StateAction::Toggle.resolve(start);
            assert_eq!(StateAction::Toggle.resolve(once), start);
        }
        assert_eq!(StateAction::from_code(3), None);
    }

    #[test]
    fn test_merge_keeps_foreign_atoms() {
        let atoms = test_atoms();
        let existing = [
            atoms.net_wm_state_modal,
            atoms.net_wm_state_fullscreen,
            atoms.net_wm_state_skip_taskbar,
        ];
        let merged = atoms.merge_state(&existing, StateFlags::MAXIMIZED_HORZ | StateFlags::MAXIMIZED_VERT);
        assert!(merged.contains(&atoms.net_wm_state_modal));
        assert!(merged.contains(&atoms.net_wm_state_skip_taskbar));
        assert!(!merged.contains(&atoms.net_wm_state_fullscreen));
        assert!(merged.contains(&atoms.net_wm_state_maximized_horz));
        assert!(merged.contains(&atoms.net_wm_state_maximized_vert));
    }

    #[test]
    fn test_state_flag_lookup() {
        let atoms = test_atoms();
        assert_eq!(atoms.state_flag(atoms.net_wm_state_hidden), Some(StateFlags::HIDDEN));
        assert_eq!(atoms.state_flag(atoms.net_wm_state_shaded), None);
    }
}

#[cfg(test)]
pub use tests::test_atoms;
