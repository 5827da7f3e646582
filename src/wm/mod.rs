//! Window Manager Module
//!
//! The [`WindowManager`] context owns every piece of mutable state: the
//! client arena, monitors and their desktops, the active client and monitor,
//! the binding table and the current pointer drag. The engines live in the
//! submodules as further `impl` blocks on it; this file holds the client
//! lifecycle (manage, scan, unmanage, close).

pub mod client;
pub mod client_flags;
pub mod conn;
pub mod decorations;
pub mod error;
pub mod events;
pub mod ewmh;
pub mod focus;
pub mod hints;
pub mod keyboard;
pub mod moveresize;
pub mod screen;
pub mod stacking;
pub mod state;
pub mod tiling;
pub mod transients;
pub mod workspace;

use std::collections::HashSet;

use tracing::{debug, error, info, trace};
use x11rb::protocol::xproto::AtomEnum;
use x11rb::CURRENT_TIME;

use crate::config::Config;
use crate::shared::Geometry;
use crate::wm::client::{Client, ClientId, Strut};
use crate::wm::client_flags::{Axis, Protocols, StateFlags, WindowType};
use crate::wm::conn::{OwnWindows, WindowKind, XConn, Xid};
use crate::wm::error::{Tolerate, XError};
use crate::wm::hints::{SizeHints, WmHints};
use crate::wm::keyboard::Bindings;
use crate::wm::moveresize::DragState;
use crate::wm::screen::Registry;

pub use decorations::ButtonType;
pub use ewmh::Atoms;

pub struct WindowManager<X: XConn> {
    conn: X,
    pub atoms: Atoms,
    pub config: Config,
    pub registry: Registry,
    pub active: Option<ClientId>,
    pub active_monitor: usize,
    bindings: Bindings,
    drag: Option<DragState>,
    running: bool,
    /// `_NET_SUPPORTING_WM_CHECK` window
    check_window: Xid,
    own: OwnWindows,
}

impl<X: XConn> WindowManager<X> {
    /// Build the context from an already-selected root. Monitors are queried
    /// once here.
    pub fn new(conn: X, atoms: Atoms, config: Config) -> Result<Self, XError> {
        let outputs = conn.monitors()?;
        info!("Managing {} monitor(s): {:?}", outputs.len(), outputs);
        let registry = Registry::new(&outputs, &config.desktops);
        let bindings = Bindings::new(&config.bindings.binding);
        Ok(Self {
            conn,
            atoms,
            config,
            registry,
            active: None,
            active_monitor: 0,
            bindings,
            drag: None,
            running: true,
            check_window: 0,
            own: OwnWindows::default(),
        })
    }

    /// Create the check window, publish the root properties and grab keys.
    pub fn setup(&mut self) -> Result<(), XError> {
        let root = self.conn.root();
        let check = self
            .conn
            .create_window(root, Geometry::new(-1, -1, 1, 1), WindowKind::Decoration)?;
        self.own.insert(check);
        self.check_window = check;

        self.publish_supported(check)?;
        self.publish_desktops()?;
        self.publish_client_list()?;
        self.publish_active()?;
        self.grab_keys()?;
        self.conn.flush()
    }

    pub fn conn(&self) -> &X {
        &self.conn
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Adopt the top-level windows that were mapped before we started.
    pub fn scan(&mut self) -> Result<(), XError> {
        let windows = self.conn.top_level_windows()?;
        for window in windows {
            if self.own.contains(window) {
                continue;
            }
            let Some(attrs) = self.conn.window_attributes(window).tolerate("scan attributes")? else {
                continue;
            };
            if attrs.override_redirect || !attrs.viewable {
                continue;
            }
            self.try_manage(window, true)?;
        }
        info!("Adopted {} existing client(s)", self.registry.len());
        Ok(())
    }

    /// Start managing a window that asked to be mapped.
    pub fn manage(&mut self, window: Xid) -> Result<(), XError> {
        self.try_manage(window, false)
    }

    /// Only a broken connection escapes; any other failure leaves the window
    /// unmanaged.
    fn try_manage(&mut self, window: Xid, existing: bool) -> Result<(), XError> {
        match self.manage_window(window, existing) {
            Ok(()) => Ok(()),
            Err(e) if e.is_stale() => {
                debug!("Window 0x{:x} vanished while being managed", window);
                Ok(())
            }
            Err(e @ XError::Connection(_)) => Err(e),
            Err(e) => {
                error!("Failed to manage window 0x{:x}: {}", window, e);
                Ok(())
            }
        }
    }

    fn manage_window(&mut self, window: Xid, existing: bool) -> Result<(), XError> {
        if self.own.contains(window) || self.registry.lookup(window).is_some() {
            return Ok(());
        }
        let attrs = self.conn.window_attributes(window)?;
        if attrs.override_redirect {
            trace!("Not managing override-redirect window 0x{:x}", window);
            return Ok(());
        }
        let geometry = self.conn.window_geometry(window)?;
        let hints = self.read_size_hints(window)?;
        let wm_hints = self.read_wm_hints(window)?;
        let protocols = self.read_protocols(window, wm_hints)?;
        let window_type = self.read_window_type(window)?;
        let strut = self.read_strut(window)?;
        let owner = self.read_transient_for(window)?;
        let initial = self.read_initial_state(window)?;

        let id = self.registry.allocate_id();
        let mut client = Client::new(id, window, geometry, &self.config.style);
        client.hints = hints;
        client.protocols = protocols;
        client.window_type = window_type;
        client.strut = strut;
        if window_type.is_fixed() {
            client.has_topbar = false;
            client.has_handles = false;
            client.border_visible = false;
        } else if hints.is_fixed() {
            client.has_handles = false;
        }

        let monitor = owner
            .and_then(|o| self.registry.get(o))
            .map(|o| o.monitor)
            .or_else(|| {
                self.registry
                    .monitors
                    .iter()
                    .position(|m| m.geometry.contains_point(geometry.x, geometry.y))
            })
            .unwrap_or(self.active_monitor);
        let mon = &self.registry.monitors[monitor];
        let desktop = mon.active_desktop;
        client.monitor = monitor;
        client.desktop = desktop;
        client.topbar_visible = mon.desktops[desktop].topbar;
        client.ignore_unmaps = u32::from(existing);
        client.set_content(geometry);

        // keep the topbar reachable
        if !window_type.is_fixed() {
            let mut frame = client.frame_geometry;
            frame.x = frame.x.max(mon.geometry.x);
            frame.y = frame.y.max(mon.geometry.y);
            client.set_frame(frame);
        }

        let frame = self
            .conn
            .create_window(self.conn.root(), client.frame_geometry, WindowKind::Frame)?;
        client.decor.frame = frame;
        self.own.insert(frame);
        self.registry.insert(client);
        info!(
            "Managing window 0x{:x} as {} ({:?}, monitor {}, desktop {})",
            window, id, window_type, monitor, desktop
        );

        if let Err(e) = self.attach(id, owner, initial) {
            self.unmanage(id, true)?;
            return Err(e);
        }
        Ok(())
    }

    /// Second half of managing: reparent, decorate, link, apply the states
    /// the client asked for, then show it.
    fn attach(&mut self, id: ClientId, owner: Option<ClientId>, initial: StateFlags) -> Result<(), XError> {
        let Some(c) = self.registry.get(id) else {
            return Ok(());
        };
        let (window, frame, monitor, desktop) = (c.window, c.decor.frame, c.monitor, c.desktop);
        let has_strut = !c.strut.is_empty();
        let (ox, oy) = c.extents().content_offset();

        self.conn.select_client_events(window)?;
        self.conn.reparent(window, frame, ox, oy)?;
        self.create_decorations(id)?;
        self.registry.push_back(monitor, id);

        if let Some(owner) = owner {
            self.link_transient(id, owner);
            self.center_over_owner(id);
        }
        if has_strut {
            self.update_workarea(monitor, desktop, None)?;
        }
        if let Some(c) = self.registry.get_mut(id) {
            c.state |= initial & (StateFlags::STICKY | StateFlags::ABOVE | StateFlags::BELOW);
        }
        self.push_geometry(id)?;

        if initial.contains(StateFlags::FULLSCREEN) {
            self.fullscreen(id)?;
        } else if initial.is_maximized() {
            self.maximize(id, Axis::Both)?;
        } else if initial.contains(StateFlags::MAXIMIZED_HORZ) {
            self.maximize(id, Axis::Horizontal)?;
        } else if initial.contains(StateFlags::MAXIMIZED_VERT) {
            self.maximize(id, Axis::Vertical)?;
        }

        self.conn.map(window)?;
        self.conn.map(frame)?;
        self.conn.grab_click(window)?;

        let Some(c) = self.registry.get(id) else {
            return Ok(());
        };
        let focus = c.is_focus_candidate() || (owner.is_some() && !c.is_fixed_kind());
        if initial.contains(StateFlags::HIDDEN) {
            self.minimize(id)?;
        } else if focus {
            self.activate(Some(id))?;
        }
        self.arrange(monitor, desktop)?;

        self.publish_client_list()?;
        self.publish_desktop(id)?;
        self.publish_state(id)
    }

    /// Stop managing a client. `destroyed` means the content window is
    /// already gone and must not be touched.
    pub fn unmanage(&mut self, id: ClientId, destroyed: bool) -> Result<(), XError> {
        let Some(c) = self.registry.get(id) else {
            return Ok(());
        };
        let (window, geometry, monitor, desktop) = (c.window, c.geometry, c.monitor, c.desktop);
        let (had_strut, sticky) = (!c.strut.is_empty(), c.is_sticky());
        let was_active = self.active == Some(id);
        let successor = if was_active { self.select_successor(id) } else { None };

        if self.drag.map(|d| d.client == id).unwrap_or(false) {
            self.drag = None;
        }
        self.sever_transients(id);

        if !destroyed {
            let root = self.conn.root();
            self.conn.ungrab_buttons(window).tolerate("ungrab buttons")?;
            self.conn
                .reparent(window, root, geometry.x, geometry.y)
                .tolerate("reparent to root")?;
            self.conn.delete_property(window, self.atoms.wm_state).tolerate("withdraw")?;
        }
        self.destroy_decorations(id)?;
        self.registry.remove(id);
        for mon in &mut self.registry.monitors {
            for d in &mut mon.desktops {
                if d.last_active == Some(id) {
                    d.last_active = None;
                }
            }
        }
        info!("Unmanaged {} (window 0x{:x}, destroyed: {})", id, window, destroyed);

        if had_strut {
            if sticky {
                self.update_all_workareas(monitor)?;
            } else {
                self.update_workarea(monitor, desktop, None)?;
            }
        }
        self.arrange(monitor, desktop)?;
        if was_active {
            self.active = None;
            self.activate(successor)?;
        }
        self.publish_client_list()
    }

    /// Ask a client (and first its transients) to close: `WM_DELETE_WINDOW`
    /// when it speaks the protocol, otherwise kill its connection.
    pub fn close_client(&mut self, id: ClientId) -> Result<(), XError> {
        let mut visited = HashSet::new();
        self.close_tree(id, &mut visited)
    }

    fn close_tree(&mut self, id: ClientId, visited: &mut HashSet<ClientId>) -> Result<(), XError> {
        if !visited.insert(id) {
            return Ok(());
        }
        let Some(c) = self.registry.get(id) else {
            return Ok(());
        };
        let (window, protocols, transients) = (c.window, c.protocols, c.transients.clone());
        for transient in transients {
            self.close_tree(transient, visited)?;
        }
        if protocols.contains(Protocols::DELETE) {
            let data = [self.atoms.wm_delete_window, CURRENT_TIME, 0, 0, 0];
            self.conn
                .send_client_message(window, self.atoms.wm_protocols, data)
                .tolerate("WM_DELETE_WINDOW")?;
            debug!("Asked {} to close", id);
        } else {
            self.conn.kill_client(window).tolerate("kill client")?;
            debug!("Killed {}", id);
        }
        Ok(())
    }

    /// Give every client back to the root at its floating geometry and
    /// withdraw the check window, so another manager can take over.
    pub fn shutdown(&mut self) -> Result<(), XError> {
        info!("Releasing {} client(s)", self.registry.len());
        for mon in &mut self.registry.monitors {
            for d in &mut mon.desktops {
                d.dynamic = false;
            }
        }
        for id in self.registry.ids() {
            self.untile(id)?;
            while self.restore(id)? {}
            self.unmanage(id, false)?;
        }
        let root = self.conn.root();
        self.conn
            .delete_property(root, self.atoms.net_supporting_wm_check)
            .tolerate("withdraw check")?;
        self.conn.destroy_window(self.check_window).tolerate("destroy check window")?;
        self.own.remove(self.check_window);
        self.conn.flush()
    }

    fn read_size_hints(&self, window: Xid) -> Result<SizeHints, XError> {
        let values = self
            .conn
            .get_property32(window, AtomEnum::WM_NORMAL_HINTS.into(), AtomEnum::WM_SIZE_HINTS.into())
            .tolerate("read WM_NORMAL_HINTS")?
            .unwrap_or_default();
        Ok(SizeHints::from_normal_hints(&values))
    }

    fn read_wm_hints(&self, window: Xid) -> Result<WmHints, XError> {
        let values = self
            .conn
            .get_property32(window, AtomEnum::WM_HINTS.into(), AtomEnum::WM_HINTS.into())
            .tolerate("read WM_HINTS")?
            .unwrap_or_default();
        Ok(WmHints::from_raw(&values))
    }

    fn read_protocols(&self, window: Xid, wm_hints: WmHints) -> Result<Protocols, XError> {
        let atoms = self
            .conn
            .get_property32(window, self.atoms.wm_protocols, AtomEnum::ATOM.into())
            .tolerate("read WM_PROTOCOLS")?
            .unwrap_or_default();
        let mut protocols = Protocols::empty();
        protocols.set(Protocols::FOCUSABLE, wm_hints.input);
        protocols.set(Protocols::DELETE, atoms.contains(&self.atoms.wm_delete_window));
        protocols.set(Protocols::TAKE_FOCUS, atoms.contains(&self.atoms.wm_take_focus));
        Ok(protocols)
    }

    fn read_window_type(&self, window: Xid) -> Result<WindowType, XError> {
        let types = self
            .conn
            .get_property32(window, self.atoms.net_wm_window_type, AtomEnum::ATOM.into())
            .tolerate("read _NET_WM_WINDOW_TYPE")?
            .unwrap_or_default();
        let a = &self.atoms;
        let known = [
            (a.net_wm_window_type_desktop, WindowType::Desktop),
            (a.net_wm_window_type_dock, WindowType::Dock),
            (a.net_wm_window_type_dialog, WindowType::Dialog),
            (a.net_wm_window_type_toolbar, WindowType::Toolbar),
            (a.net_wm_window_type_menu, WindowType::Menu),
            (a.net_wm_window_type_utility, WindowType::Utility),
            (a.net_wm_window_type_splash, WindowType::Splash),
            (a.net_wm_window_type_notification, WindowType::Notification),
            (a.net_wm_window_type_normal, WindowType::Normal),
        ];
        // first type we understand wins
        Ok(types
            .iter()
            .find_map(|t| known.iter().find(|(atom, _)| atom == t).map(|(_, kind)| *kind))
            .unwrap_or_default())
    }

    fn read_strut(&self, window: Xid) -> Result<Strut, XError> {
        for property in [self.atoms.net_wm_strut_partial, self.atoms.net_wm_strut] {
            let values = self
                .conn
                .get_property32(window, property, AtomEnum::CARDINAL.into())
                .tolerate("read strut")?
                .unwrap_or_default();
            if values.len() >= 4 {
                return Ok(Strut::from_raw(&values));
            }
        }
        Ok(Strut::default())
    }

    /// Managed owner named by `WM_TRANSIENT_FOR`, if any.
    fn read_transient_for(&self, window: Xid) -> Result<Option<ClientId>, XError> {
        let values = self
            .conn
            .get_property32(window, AtomEnum::WM_TRANSIENT_FOR.into(), AtomEnum::WINDOW.into())
            .tolerate("read WM_TRANSIENT_FOR")?
            .unwrap_or_default();
        Ok(values
            .first()
            .filter(|owner| **owner != 0 && **owner != window)
            .and_then(|owner| self.registry.by_content(*owner)))
    }

    fn read_initial_state(&self, window: Xid) -> Result<StateFlags, XError> {
        let atoms = self
            .conn
            .get_property32(window, self.atoms.net_wm_state, AtomEnum::ATOM.into())
            .tolerate("read _NET_WM_STATE")?
            .unwrap_or_default();
        Ok(atoms
            .iter()
            .filter_map(|a| self.atoms.state_flag(*a))
            .fold(StateFlags::empty(), |acc, f| acc | f))
    }
}
