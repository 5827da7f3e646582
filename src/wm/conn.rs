//! Display-server seam
//!
//! Every request the core makes goes through [`XConn`], so the engines can be
//! driven by the real x11rb connection or by the recording double used in
//! tests. All calls return [`XError`] so callers decide per request whether a
//! stale window is tolerable.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;
use x11rb::connection::Connection;
use x11rb::protocol::randr::ConnectionExt as _;
use x11rb::protocol::xproto::*;
use x11rb::rust_connection::RustConnection;
use x11rb::wrapper::ConnectionExt as _;
use x11rb::{CURRENT_TIME, NONE};

use crate::shared::Geometry;
use crate::wm::error::XError;

pub type Xid = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowAttributes {
    pub override_redirect: bool,
    pub viewable: bool,
}

/// What a window created by the manager is for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowKind {
    /// Top-level decorated box the content is reparented into
    Frame,
    /// Topbar or button inside a frame
    Decoration,
    /// Input-only resize region inside a frame
    Handle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Restack {
    Raise,
    Lower,
}

pub trait XConn {
    fn root(&self) -> Xid;
    fn screen_geometry(&self) -> Geometry;
    fn monitors(&self) -> Result<Vec<Geometry>, XError>;
    fn top_level_windows(&self) -> Result<Vec<Xid>, XError>;
    fn window_attributes(&self, window: Xid) -> Result<WindowAttributes, XError>;
    fn window_geometry(&self, window: Xid) -> Result<Geometry, XError>;

    fn create_window(&self, parent: Xid, geometry: Geometry, kind: WindowKind) -> Result<Xid, XError>;
    fn destroy_window(&self, window: Xid) -> Result<(), XError>;
    /// Adds the window to the save-set and reparents it.
    fn reparent(&self, window: Xid, parent: Xid, x: i32, y: i32) -> Result<(), XError>;
    fn select_client_events(&self, window: Xid) -> Result<(), XError>;
    fn map(&self, window: Xid) -> Result<(), XError>;
    fn unmap(&self, window: Xid) -> Result<(), XError>;
    fn move_resize(&self, window: Xid, geometry: Geometry) -> Result<(), XError>;
    fn restack(&self, window: Xid, mode: Restack) -> Result<(), XError>;
    fn forward_configure_request(&self, request: &ConfigureRequestEvent) -> Result<(), XError>;

    fn set_input_focus(&self, window: Xid) -> Result<(), XError>;
    fn focus_root(&self) -> Result<(), XError>;
    fn grab_click(&self, window: Xid) -> Result<(), XError>;
    fn grab_drag_buttons(&self, window: Xid, modifiers: u16) -> Result<(), XError>;
    fn ungrab_buttons(&self, window: Xid) -> Result<(), XError>;
    fn grab_key(&self, modifiers: u16, keycode: u8) -> Result<(), XError>;
    fn replay_pointer(&self) -> Result<(), XError>;

    fn send_client_message(&self, window: Xid, message_type: Atom, data: [u32; 5]) -> Result<(), XError>;
    fn send_configure_notify(&self, window: Xid, geometry: Geometry) -> Result<(), XError>;
    fn kill_client(&self, window: Xid) -> Result<(), XError>;

    fn get_property32(&self, window: Xid, property: Atom, type_: Atom) -> Result<Vec<u32>, XError>;
    fn set_property32(&self, window: Xid, property: Atom, type_: Atom, values: &[u32]) -> Result<(), XError>;
    fn set_property8(&self, window: Xid, property: Atom, type_: Atom, value: &[u8]) -> Result<(), XError>;
    fn delete_property(&self, window: Xid, property: Atom) -> Result<(), XError>;

    fn flush(&self) -> Result<(), XError>;
}

/// Lock and NumLock variants a binding is grabbed under.
const LOCK_COMBOS: [u16; 4] = [0, 1 << 1, 1 << 4, (1 << 1) | (1 << 4)];

/// x11rb-backed connection
pub struct X11Conn {
    conn: Arc<RustConnection>,
    root: Xid,
    depth: u8,
    width: u16,
    height: u16,
}

impl X11Conn {
    pub fn new(conn: Arc<RustConnection>, screen_num: usize) -> Self {
        let screen = &conn.setup().roots[screen_num];
        let (root, depth, width, height) =
            (screen.root, screen.root_depth, screen.width_in_pixels, screen.height_in_pixels);
        Self { conn, root, depth, width, height }
    }

    pub fn connection(&self) -> &Arc<RustConnection> {
        &self.conn
    }

    /// Select SubstructureRedirect on the root; fails when another window
    /// manager already holds it.
    pub fn become_wm(&self) -> Result<(), XError> {
        let mask = EventMask::SUBSTRUCTURE_REDIRECT
            | EventMask::SUBSTRUCTURE_NOTIFY
            | EventMask::BUTTON_PRESS
            | EventMask::POINTER_MOTION
            | EventMask::ENTER_WINDOW
            | EventMask::LEAVE_WINDOW
            | EventMask::PROPERTY_CHANGE;
        self.conn
            .change_window_attributes(self.root, &ChangeWindowAttributesAux::new().event_mask(mask))?
            .check()
            .map_err(|e| XError::from_reply(e, self.root, "ChangeWindowAttributes"))?;
        Ok(())
    }
}

impl XConn for X11Conn {
    fn root(&self) -> Xid {
        self.root
    }

    fn screen_geometry(&self) -> Geometry {
        Geometry::new(0, 0, self.width as u32, self.height as u32)
    }

    fn monitors(&self) -> Result<Vec<Geometry>, XError> {
        let resources = match self.conn.randr_get_screen_resources_current(self.root)?.reply() {
            Ok(r) => r,
            Err(e) => {
                debug!("RandR unavailable, using whole screen: {}", e);
                return Ok(vec![self.screen_geometry()]);
            }
        };
        let mut outputs: Vec<Geometry> = Vec::new();
        for crtc in resources.crtcs {
            let info = self
                .conn
                .randr_get_crtc_info(crtc, resources.config_timestamp)?
                .reply()
                .map_err(|e| XError::from_reply(e, self.root, "RandrGetCrtcInfo"))?;
            if info.width == 0 || info.height == 0 {
                continue;
            }
            let g = Geometry::new(info.x as i32, info.y as i32, info.width as u32, info.height as u32);
            // mirrored outputs share a CRTC geometry
            if !outputs.contains(&g) {
                outputs.push(g);
            }
        }
        if outputs.is_empty() {
            outputs.push(self.screen_geometry());
        }
        Ok(outputs)
    }

    fn top_level_windows(&self) -> Result<Vec<Xid>, XError> {
        let tree = self
            .conn
            .query_tree(self.root)?
            .reply()
            .map_err(|e| XError::from_reply(e, self.root, "QueryTree"))?;
        Ok(tree.children)
    }

    fn window_attributes(&self, window: Xid) -> Result<WindowAttributes, XError> {
        let attrs = self
            .conn
            .get_window_attributes(window)?
            .reply()
            .map_err(|e| XError::from_reply(e, window, "GetWindowAttributes"))?;
        Ok(WindowAttributes {
            override_redirect: attrs.override_redirect,
            viewable: attrs.map_state == MapState::VIEWABLE,
        })
    }

    fn window_geometry(&self, window: Xid) -> Result<Geometry, XError> {
        let g = self
            .conn
            .get_geometry(window)?
            .reply()
            .map_err(|e| XError::from_reply(e, window, "GetGeometry"))?;
        Ok(Geometry::new(g.x as i32, g.y as i32, g.width as u32, g.height as u32))
    }

    fn create_window(&self, parent: Xid, geometry: Geometry, kind: WindowKind) -> Result<Xid, XError> {
        let id = self
            .conn
            .generate_id()
            .map_err(|e| XError::from_reply_or_id(e, parent, "CreateWindow"))?;
        let (class, depth, aux) = match kind {
            WindowKind::Frame => (
                WindowClass::INPUT_OUTPUT,
                self.depth,
                CreateWindowAux::new().override_redirect(1).event_mask(
                    EventMask::SUBSTRUCTURE_REDIRECT
                        | EventMask::SUBSTRUCTURE_NOTIFY
                        | EventMask::BUTTON_PRESS
                        | EventMask::BUTTON_RELEASE
                        | EventMask::BUTTON_MOTION
                        | EventMask::ENTER_WINDOW
                        | EventMask::EXPOSURE,
                ),
            ),
            WindowKind::Decoration => (
                WindowClass::INPUT_OUTPUT,
                self.depth,
                CreateWindowAux::new().override_redirect(1).event_mask(
                    EventMask::BUTTON_PRESS
                        | EventMask::BUTTON_RELEASE
                        | EventMask::BUTTON_MOTION
                        | EventMask::ENTER_WINDOW
                        | EventMask::LEAVE_WINDOW
                        | EventMask::EXPOSURE,
                ),
            ),
            WindowKind::Handle => (
                WindowClass::INPUT_ONLY,
                0,
                CreateWindowAux::new().override_redirect(1).event_mask(
                    EventMask::BUTTON_PRESS | EventMask::BUTTON_RELEASE | EventMask::BUTTON_MOTION,
                ),
            ),
        };
        self.conn.create_window(
            depth,
            id,
            parent,
            geometry.x as i16,
            geometry.y as i16,
            geometry.width.max(1) as u16,
            geometry.height.max(1) as u16,
            0,
            class,
            x11rb::COPY_FROM_PARENT,
            &aux,
        )?;
        Ok(id)
    }

    fn destroy_window(&self, window: Xid) -> Result<(), XError> {
        self.conn.destroy_window(window)?;
        Ok(())
    }

    fn reparent(&self, window: Xid, parent: Xid, x: i32, y: i32) -> Result<(), XError> {
        self.conn.change_save_set(SetMode::INSERT, window)?;
        self.conn.reparent_window(window, parent, x as i16, y as i16)?;
        Ok(())
    }

    fn select_client_events(&self, window: Xid) -> Result<(), XError> {
        // unmap/destroy arrive through the frame's SubstructureNotify
        let mask = EventMask::PROPERTY_CHANGE | EventMask::ENTER_WINDOW;
        self.conn.change_window_attributes(window, &ChangeWindowAttributesAux::new().event_mask(mask))?;
        self.conn.configure_window(window, &ConfigureWindowAux::new().border_width(0))?;
        Ok(())
    }

    fn map(&self, window: Xid) -> Result<(), XError> {
        self.conn.map_window(window)?;
        Ok(())
    }

    fn unmap(&self, window: Xid) -> Result<(), XError> {
        self.conn.unmap_window(window)?;
        Ok(())
    }

    fn move_resize(&self, window: Xid, g: Geometry) -> Result<(), XError> {
        self.conn.configure_window(
            window,
            &ConfigureWindowAux::new()
                .x(g.x)
                .y(g.y)
                .width(g.width.max(1))
                .height(g.height.max(1)),
        )?;
        Ok(())
    }

    fn restack(&self, window: Xid, mode: Restack) -> Result<(), XError> {
        let stack_mode = match mode {
            Restack::Raise => StackMode::ABOVE,
            Restack::Lower => StackMode::BELOW,
        };
        self.conn
            .configure_window(window, &ConfigureWindowAux::new().stack_mode(stack_mode))?;
        Ok(())
    }

    fn forward_configure_request(&self, request: &ConfigureRequestEvent) -> Result<(), XError> {
        self.conn
            .configure_window(request.window, &ConfigureWindowAux::from_configure_request(request))?;
        Ok(())
    }

    fn set_input_focus(&self, window: Xid) -> Result<(), XError> {
        self.conn.set_input_focus(InputFocus::POINTER_ROOT, window, CURRENT_TIME)?;
        Ok(())
    }

    fn focus_root(&self) -> Result<(), XError> {
        self.conn.set_input_focus(InputFocus::POINTER_ROOT, self.root, CURRENT_TIME)?;
        Ok(())
    }

    fn grab_click(&self, window: Xid) -> Result<(), XError> {
        self.conn.grab_button(
            false,
            window,
            EventMask::BUTTON_PRESS,
            GrabMode::SYNC,
            GrabMode::ASYNC,
            NONE,
            NONE,
            ButtonIndex::ANY,
            ModMask::ANY,
        )?;
        Ok(())
    }

    fn grab_drag_buttons(&self, window: Xid, modifiers: u16) -> Result<(), XError> {
        for button in [ButtonIndex::M1, ButtonIndex::M3] {
            for lock in LOCK_COMBOS {
                self.conn.grab_button(
                    false,
                    window,
                    EventMask::BUTTON_PRESS | EventMask::BUTTON_RELEASE | EventMask::BUTTON_MOTION,
                    GrabMode::ASYNC,
                    GrabMode::ASYNC,
                    NONE,
                    NONE,
                    button,
                    ModMask::from(modifiers | lock),
                )?;
            }
        }
        Ok(())
    }

    fn ungrab_buttons(&self, window: Xid) -> Result<(), XError> {
        self.conn.ungrab_button(ButtonIndex::ANY, window, ModMask::ANY)?;
        Ok(())
    }

    fn grab_key(&self, modifiers: u16, keycode: u8) -> Result<(), XError> {
        for lock in LOCK_COMBOS {
            self.conn.grab_key(
                true,
                self.root,
                ModMask::from(modifiers | lock),
                keycode,
                GrabMode::ASYNC,
                GrabMode::ASYNC,
            )?;
        }
        Ok(())
    }

    fn replay_pointer(&self) -> Result<(), XError> {
        self.conn.allow_events(Allow::REPLAY_POINTER, CURRENT_TIME)?;
        Ok(())
    }

    fn send_client_message(&self, window: Xid, message_type: Atom, data: [u32; 5]) -> Result<(), XError> {
        let event = ClientMessageEvent::new(32, window, message_type, data);
        self.conn.send_event(false, window, EventMask::NO_EVENT, event)?;
        Ok(())
    }

    fn send_configure_notify(&self, window: Xid, g: Geometry) -> Result<(), XError> {
        let event = ConfigureNotifyEvent {
            response_type: CONFIGURE_NOTIFY_EVENT,
            sequence: 0,
            event: window,
            window,
            above_sibling: NONE,
            x: g.x as i16,
            y: g.y as i16,
            width: g.width as u16,
            height: g.height as u16,
            border_width: 0,
            override_redirect: false,
        };
        self.conn.send_event(false, window, EventMask::STRUCTURE_NOTIFY, event)?;
        Ok(())
    }

    fn kill_client(&self, window: Xid) -> Result<(), XError> {
        self.conn.kill_client(window)?;
        Ok(())
    }

    fn get_property32(&self, window: Xid, property: Atom, type_: Atom) -> Result<Vec<u32>, XError> {
        let reply = self
            .conn
            .get_property(false, window, property, type_, 0, 1024)?
            .reply()
            .map_err(|e| XError::from_reply(e, window, "GetProperty"))?;
        Ok(reply.value32().map(|v| v.collect()).unwrap_or_default())
    }

    fn set_property32(&self, window: Xid, property: Atom, type_: Atom, values: &[u32]) -> Result<(), XError> {
        self.conn
            .change_property32(PropMode::REPLACE, window, property, type_, values)?;
        Ok(())
    }

    fn set_property8(&self, window: Xid, property: Atom, type_: Atom, value: &[u8]) -> Result<(), XError> {
        self.conn
            .change_property8(PropMode::REPLACE, window, property, type_, value)?;
        Ok(())
    }

    fn delete_property(&self, window: Xid, property: Atom) -> Result<(), XError> {
        self.conn.delete_property(window, property)?;
        Ok(())
    }

    fn flush(&self) -> Result<(), XError> {
        self.conn.flush()?;
        Ok(())
    }
}

/// Windows the manager created itself, so map/configure events for them are
/// never treated as client requests.
#[derive(Debug, Default)]
pub struct OwnWindows(HashSet<Xid>);

impl OwnWindows {
    pub fn insert(&mut self, window: Xid) {
        self.0.insert(window);
    }

    pub fn remove(&mut self, window: Xid) {
        self.0.remove(&window);
    }

    pub fn contains(&self, window: Xid) -> bool {
        self.0.contains(&window)
    }
}
