//! Events Module
//!
//! Translates display-server events into engine calls. Every handler runs to
//! completion before the next event is looked at.

use tracing::{debug, trace};
use x11rb::protocol::xproto::*;
use x11rb::protocol::Event;

use crate::wm::client::ClientId;
use crate::wm::client_flags::{Axis, Protocols, StateFlags};
use crate::wm::conn::XConn;
use crate::wm::decorations::{ButtonType, Handle};
use crate::wm::error::{is_stale_kind, Tolerate, XError};
use crate::wm::ewmh::{StateAction, WM_STATE_ICONIC};
use crate::wm::keyboard::{Action, ClientOp};
use crate::wm::WindowManager;

/// `_NET_WM_DESKTOP` value meaning "all desktops"
const ALL_DESKTOPS: u32 = 0xFFFF_FFFF;

impl<X: XConn> WindowManager<X> {
    /// Route one event. Only non-recoverable protocol errors come back as
    /// `Err`.
    pub fn handle_event(&mut self, event: &Event) -> Result<(), XError> {
        match event {
            Event::MapRequest(e) => self.on_map_request(e),
            Event::UnmapNotify(e) => self.on_unmap_notify(e),
            Event::DestroyNotify(e) => match self.registry.by_content(e.window) {
                Some(id) => self.unmanage(id, true),
                None => Ok(()),
            },
            Event::ConfigureRequest(e) => self.on_configure_request(e),
            Event::PropertyNotify(e) => self.on_property_notify(e),
            Event::ClientMessage(e) => self.on_client_message(e),
            Event::ButtonPress(e) => self.on_button_press(e),
            Event::ButtonRelease(_) => self.end_drag(),
            Event::MotionNotify(e) => {
                if self.is_dragging() {
                    self.drag_motion(e.root_x as i32, e.root_y as i32)
                } else {
                    Ok(())
                }
            }
            Event::EnterNotify(e) => self.on_enter_notify(e),
            Event::LeaveNotify(e) => {
                if let Some(id) = self.registry.lookup(e.event) {
                    if let Some(c) = self.registry.get_mut(id) {
                        if c.decor.buttons.contains(&e.event) {
                            c.hovered_button = None;
                        }
                    }
                }
                Ok(())
            }
            Event::Expose(e) => {
                trace!("Expose on 0x{:x}", e.window);
                Ok(())
            }
            Event::KeyPress(e) => match self.bindings.key(u16::from(e.state), e.detail) {
                Some(action) => self.dispatch(action, None),
                None => Ok(()),
            },
            Event::Error(err) => {
                if is_stale_kind(err) {
                    debug!(
                        "Ignoring async {:?} error (opcode {}) for 0x{:x}",
                        err.error_kind, err.major_opcode, err.bad_value
                    );
                    Ok(())
                } else {
                    Err(XError::Protocol {
                        request: "event stream",
                        kind: err.error_kind,
                    })
                }
            }
            _ => {
                trace!("Unhandled event: {:?}", event);
                Ok(())
            }
        }
    }

    fn on_map_request(&mut self, e: &MapRequestEvent) -> Result<(), XError> {
        if let Some(id) = self.registry.by_content(e.window) {
            // already managed: a hidden client asking to be shown again
            if self.registry.get(id).map(|c| c.is_hidden()).unwrap_or(false) {
                self.restore(id)?;
            }
            return Ok(());
        }
        self.manage(e.window)
    }

    fn on_unmap_notify(&mut self, e: &UnmapNotifyEvent) -> Result<(), XError> {
        let Some(id) = self.registry.by_content(e.window) else {
            return Ok(());
        };
        if let Some(c) = self.registry.get_mut(id) {
            if c.ignore_unmaps > 0 {
                c.ignore_unmaps -= 1;
                trace!("Ignoring reparent unmap of 0x{:x}", e.window);
                return Ok(());
            }
        }
        self.unmanage(id, false)
    }

    fn on_configure_request(&mut self, e: &ConfigureRequestEvent) -> Result<(), XError> {
        let Some(id) = self.registry.by_content(e.window) else {
            self.conn.forward_configure_request(e).tolerate("forward configure")?;
            return Ok(());
        };
        let Some(c) = self.registry.get_mut(id) else {
            return Ok(());
        };
        let mask = u16::from(e.value_mask);
        let has = |flag: ConfigWindow| mask & u16::from(flag) != 0;

        let locked = c.tiled
            || c.is_fullscreen()
            || c.is_hidden()
            || c.state.any_maximized()
            || c.half.is_some();
        if locked {
            let (window, content) = (c.window, c.geometry);
            return self
                .conn
                .send_configure_notify(window, content)
                .tolerate("configure notify")
                .map(|_| ());
        }

        let mut content = c.geometry;
        if has(ConfigWindow::X) {
            content.x = e.x as i32;
        }
        if has(ConfigWindow::Y) {
            content.y = e.y as i32;
        }
        if has(ConfigWindow::WIDTH) {
            content.width = e.width as u32;
        }
        if has(ConfigWindow::HEIGHT) {
            content.height = e.height as u32;
        }
        let (width, height) = c.hints.apply(content.width, content.height);
        content.width = width;
        content.height = height;
        c.set_content(content);
        debug!("Client {} configured to {:?}", id, content);
        self.push_geometry(id)?;

        if has(ConfigWindow::STACK_MODE) {
            if e.stack_mode == StackMode::ABOVE {
                self.raise(id)?;
            } else if e.stack_mode == StackMode::BELOW {
                self.lower(id)?;
            }
        }
        Ok(())
    }

    fn on_property_notify(&mut self, e: &PropertyNotifyEvent) -> Result<(), XError> {
        let Some(id) = self.registry.by_content(e.window) else {
            return Ok(());
        };
        let atom = e.atom;

        if atom == u32::from(AtomEnum::WM_NORMAL_HINTS) {
            let hints = self.read_size_hints(e.window)?;
            if let Some(c) = self.registry.get_mut(id) {
                c.hints = hints;
                c.has_handles = c.has_handles && !hints.is_fixed();
            }
        } else if atom == u32::from(AtomEnum::WM_HINTS) {
            let wm_hints = self.read_wm_hints(e.window)?;
            let active = self.active == Some(id);
            if let Some(c) = self.registry.get_mut(id) {
                c.protocols.set(Protocols::FOCUSABLE, wm_hints.input);
                if wm_hints.urgent && !active {
                    c.state.insert(StateFlags::DEMANDS_ATTENTION);
                }
            }
            self.publish_state(id)?;
        } else if atom == self.atoms.net_wm_strut || atom == self.atoms.net_wm_strut_partial {
            let strut = self.read_strut(e.window)?;
            let Some(c) = self.registry.get_mut(id) else {
                return Ok(());
            };
            c.strut = strut;
            let (monitor, desktop, sticky) = (c.monitor, c.desktop, c.is_sticky());
            if sticky {
                self.update_all_workareas(monitor)?;
            } else {
                self.update_workarea(monitor, desktop, None)?;
            }
            self.arrange(monitor, desktop)?;
        } else if atom == u32::from(AtomEnum::WM_TRANSIENT_FOR) {
            match self.read_transient_for(e.window)? {
                Some(owner) => self.link_transient(id, owner),
                None => self.unlink_transient(id),
            }
        } else if atom == self.atoms.net_wm_name || atom == u32::from(AtomEnum::WM_NAME) {
            trace!("Title of {} changed", id);
        }
        Ok(())
    }

    fn on_client_message(&mut self, e: &ClientMessageEvent) -> Result<(), XError> {
        let data = e.data.as_data32();
        let kind = e.type_;
        let target = self.registry.by_content(e.window);

        if kind == self.atoms.net_current_desktop {
            return self.view_desktop(self.active_monitor, data[0] as usize);
        }
        if kind == self.atoms.net_request_frame_extents {
            return self.on_frame_extents_request(e.window, target);
        }
        let Some(id) = target else {
            trace!("Client message {} for unmanaged window 0x{:x}", kind, e.window);
            return Ok(());
        };

        if kind == self.atoms.net_wm_state {
            self.on_state_message(id, data)
        } else if kind == self.atoms.net_active_window {
            self.on_activate_request(id)
        } else if kind == self.atoms.net_close_window {
            self.close_client(id)
        } else if kind == self.atoms.net_wm_desktop {
            if data[0] == ALL_DESKTOPS {
                if !self.registry.get(id).map(|c| c.is_sticky()).unwrap_or(true) {
                    self.toggle_sticky(id)?;
                }
                Ok(())
            } else {
                self.send_to_desktop(id, data[0] as usize)
            }
        } else if kind == self.atoms.wm_change_state {
            if data[0] == WM_STATE_ICONIC {
                self.minimize(id)?;
            }
            Ok(())
        } else {
            trace!("Ignoring client message {} for {}", kind, id);
            Ok(())
        }
    }

    /// `_NET_WM_STATE`: action code plus one or two state atoms. The
    /// horizontal+vertical maximize pair is one full maximize.
    pub fn on_state_message(&mut self, id: ClientId, data: [u32; 5]) -> Result<(), XError> {
        let Some(action) = StateAction::from_code(data[0]) else {
            return Ok(());
        };
        let (first, second) = (data[1], data[2]);
        let horz = self.atoms.net_wm_state_maximized_horz;
        let vert = self.atoms.net_wm_state_maximized_vert;
        if (first == horz && second == vert) || (first == vert && second == horz) {
            let currently = self.registry.get(id).map(|c| c.state.is_maximized()).unwrap_or(false);
            let wanted = action.resolve(currently);
            if wanted == currently {
                return Ok(());
            }
            if wanted {
                return self.maximize(id, Axis::Both);
            }
            return self.restore(id).map(|_| ());
        }
        for atom in [first, second] {
            if atom != 0 {
                self.apply_state_atom(id, atom, action)?;
            }
        }
        Ok(())
    }

    fn apply_state_atom(&mut self, id: ClientId, atom: Atom, action: StateAction) -> Result<(), XError> {
        let Some(flag) = self.atoms.state_flag(atom) else {
            trace!("Ignoring uninterpreted state atom {}", atom);
            return Ok(());
        };
        let Some(c) = self.registry.get(id) else {
            return Ok(());
        };
        let currently = c.state.contains(flag);
        let wanted = action.resolve(currently);
        if wanted == currently {
            return Ok(());
        }

        if flag == StateFlags::FULLSCREEN {
            if wanted {
                self.fullscreen(id)
            } else {
                self.restore(id).map(|_| ())
            }
        } else if flag == StateFlags::MAXIMIZED_HORZ || flag == StateFlags::MAXIMIZED_VERT {
            if wanted {
                let axis = if flag == StateFlags::MAXIMIZED_HORZ {
                    Axis::Horizontal
                } else {
                    Axis::Vertical
                };
                self.maximize(id, axis)
            } else {
                self.restore(id).map(|_| ())
            }
        } else if flag == StateFlags::HIDDEN {
            if wanted {
                self.minimize(id)
            } else {
                self.restore(id).map(|_| ())
            }
        } else if flag == StateFlags::STICKY {
            self.toggle_sticky(id)
        } else if flag == StateFlags::ABOVE && wanted {
            self.raise(id)
        } else if flag == StateFlags::BELOW && wanted {
            self.lower(id)
        } else {
            // demands-attention, or clearing above/below
            if let Some(c) = self.registry.get_mut(id) {
                c.state.set(flag, wanted);
            }
            self.publish_state(id)
        }
    }

    fn on_activate_request(&mut self, id: ClientId) -> Result<(), XError> {
        let Some(c) = self.registry.get(id) else {
            return Ok(());
        };
        let (monitor, desktop, sticky) = (c.monitor, c.desktop, c.is_sticky());
        if c.is_hidden() {
            self.restore(id)?;
        }
        if !sticky && self.registry.monitors[monitor].active_desktop != desktop {
            self.view_desktop(monitor, desktop)?;
        }
        self.activate(Some(id))?;
        self.raise(id)
    }

    fn on_frame_extents_request(&mut self, window: u32, target: Option<ClientId>) -> Result<(), XError> {
        if let Some(id) = target {
            return self.publish_frame_extents(id);
        }
        // not mapped yet: answer with what a decorated client would get
        let style = &self.config.style;
        let extents = crate::shared::Extents::new(style.border_width, style.topbar_height);
        self.conn
            .set_property32(
                window,
                self.atoms.net_frame_extents,
                AtomEnum::CARDINAL.into(),
                &extents.as_frame_extents(),
            )
            .tolerate("write _NET_FRAME_EXTENTS")
            .map(|_| ())
    }

    fn on_button_press(&mut self, e: &ButtonPressEvent) -> Result<(), XError> {
        let (x, y) = (e.root_x as i32, e.root_y as i32);
        if e.event == self.conn.root() {
            self.active_monitor = self.registry.monitor_at(x, y);
            return Ok(());
        }
        let Some(id) = self.registry.lookup(e.event) else {
            return Ok(());
        };
        let Some(c) = self.registry.get(id) else {
            return Ok(());
        };
        self.active_monitor = c.monitor;
        let is_active = c.active;

        if let Some(index) = c.decor.buttons.iter().position(|w| *w == e.event) {
            return self.on_decoration_button(id, index);
        }
        if let Some(index) = c.decor.handles.iter().position(|w| *w == e.event) {
            self.focus_on_click(id, is_active)?;
            return match Handle::from_index(index) {
                Some(handle) => self.begin_resize(id, handle, x, y),
                None => Ok(()),
            };
        }
        if Some(e.event) == c.decor.topbar || e.event == c.decor.frame {
            self.focus_on_click(id, is_active)?;
            if e.detail == 1 {
                return self.begin_move(id, x, y);
            }
            return Ok(());
        }

        // content window: either the click-to-activate grab or a drag binding
        if !is_active {
            self.focus_on_click(id, false)?;
            return self.conn.replay_pointer();
        }
        match self.bindings.button(u16::from(e.state), e.detail) {
            Some(Action::Client { op: ClientOp::Move }) => self.begin_move(id, x, y),
            Some(Action::Client { op: ClientOp::Resize }) => {
                self.begin_resize(id, Handle::BottomRight, x, y)
            }
            Some(action) => self.dispatch(action, Some(id)),
            None => self.conn.replay_pointer(),
        }
    }

    fn focus_on_click(&mut self, id: ClientId, is_active: bool) -> Result<(), XError> {
        if !is_active {
            self.activate(Some(id))?;
        }
        if self.config.behavior.raise_on_focus {
            self.raise(id)?;
        }
        Ok(())
    }

    fn on_decoration_button(&mut self, id: ClientId, index: usize) -> Result<(), XError> {
        match ButtonType::from_index(index) {
            Some(ButtonType::Close) => self.close_client(id),
            Some(ButtonType::Maximize) => {
                let maximized = self
                    .registry
                    .get(id)
                    .map(|c| c.state.any_maximized() || c.half.is_some())
                    .unwrap_or(false);
                if maximized {
                    self.restore(id).map(|_| ())
                } else {
                    self.maximize(id, Axis::Both)
                }
            }
            Some(ButtonType::Minimize) => self.minimize(id),
            None => Ok(()),
        }
    }

    fn on_enter_notify(&mut self, e: &EnterNotifyEvent) -> Result<(), XError> {
        if e.event == self.conn.root() {
            self.active_monitor = self.registry.monitor_at(e.root_x as i32, e.root_y as i32);
            return Ok(());
        }
        let Some(id) = self.registry.lookup(e.event) else {
            return Ok(());
        };
        let Some(c) = self.registry.get_mut(id) else {
            return Ok(());
        };
        if let Some(index) = c.decor.buttons.iter().position(|w| *w == e.event) {
            c.hovered_button = Some(index);
            trace!("Hovering button {} of {}", index, id);
            return Ok(());
        }
        self.active_monitor = c.monitor;
        let eligible = !c.active && c.is_focus_candidate();
        if self.config.behavior.focus_follows_mouse && eligible && !self.is_dragging() {
            self.activate(Some(id))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use x11rb::x11_utils::X11Error;

    use super::*;
    use crate::shared::Geometry;
    use crate::wm::conn::mock::{Call, MockConn, ROOT};
    use crate::wm::tests::{managed, wm_with};

    fn configure_request(window: u32, mask: ConfigWindow, g: Geometry) -> ConfigureRequestEvent {
        ConfigureRequestEvent {
            response_type: CONFIGURE_REQUEST_EVENT,
            stack_mode: StackMode::ABOVE,
            sequence: 0,
            parent: ROOT,
            window,
            sibling: 0,
            x: g.x as i16,
            y: g.y as i16,
            width: g.width as u16,
            height: g.height as u16,
            border_width: 0,
            value_mask: mask,
        }
    }

    fn client_message(window: u32, kind: Atom, data: [u32; 5]) -> Event {
        Event::ClientMessage(ClientMessageEvent::new(32, window, kind, data))
    }

    #[test]
    fn test_state_toggle_twice_restores() {
        let mut wm = wm_with(MockConn::single(1000, 800));
        let a = managed(&mut wm, 200, Geometry::new(100, 100, 300, 200));
        let original = wm.registry.get(a).expect("a").geometry;
        let fs = wm.atoms.net_wm_state_fullscreen;
        let attention = wm.atoms.net_wm_state_demands_attention;
        let state = wm.atoms.net_wm_state;

        for _ in 0..2 {
            wm.handle_event(&client_message(200, state, [2, fs, 0, 1, 0])).expect("toggle");
            wm.handle_event(&client_message(200, state, [2, attention, 0, 1, 0])).expect("toggle");
        }
        let c = wm.registry.get(a).expect("a");
        assert!(!c.is_fullscreen());
        assert!(!c.state.contains(StateFlags::DEMANDS_ATTENTION));
        assert_eq!(c.geometry, original);
    }

    #[test]
    fn test_state_pair_is_full_maximize() {
        let mut wm = wm_with(MockConn::single(1000, 800));
        let a = managed(&mut wm, 200, Geometry::new(100, 100, 300, 200));
        let (h, v) = (wm.atoms.net_wm_state_maximized_horz, wm.atoms.net_wm_state_maximized_vert);
        let state = wm.atoms.net_wm_state;

        wm.handle_event(&client_message(200, state, [1, v, h, 1, 0])).expect("add");
        let c = wm.registry.get(a).expect("a");
        assert!(c.state.is_maximized());
        assert_eq!(c.frame_geometry, Geometry::new(0, 0, 1000, 800));

        // removing only one axis still goes through restore
        wm.handle_event(&client_message(200, state, [0, h, 0, 1, 0])).expect("remove");
        assert!(!wm.registry.get(a).expect("a").state.any_maximized());
    }

    #[test]
    fn test_configure_request_unmanaged_passthrough() {
        let mut wm = wm_with(MockConn::single(1000, 800));
        let req = configure_request(300, ConfigWindow::WIDTH, Geometry::new(0, 0, 50, 50));
        wm.conn.clear_calls();
        wm.handle_event(&Event::ConfigureRequest(req)).expect("configure");
        assert_eq!(wm.conn.calls(), vec![Call::ForwardConfigure(300)]);
    }

    #[test]
    fn test_configure_request_floating_resize() {
        let mut wm = wm_with(MockConn::single(1000, 800));
        let a = managed(&mut wm, 200, Geometry::new(100, 100, 300, 200));
        wm.registry.get_mut(a).expect("a").hints.width_inc = 50;
        let mask = ConfigWindow::WIDTH | ConfigWindow::HEIGHT;
        let req = configure_request(200, mask, Geometry::new(0, 0, 420, 250));
        wm.handle_event(&Event::ConfigureRequest(req)).expect("configure");
        let c = wm.registry.get(a).expect("a");
        assert_eq!(c.geometry, Geometry::new(100, 100, 400, 250));
        assert_eq!(c.frame_geometry, c.extents().frame_from_window(&c.geometry));
    }

    #[test]
    fn test_configure_request_locked_when_maximized() {
        let mut wm = wm_with(MockConn::single(1000, 800));
        let a = managed(&mut wm, 200, Geometry::new(100, 100, 300, 200));
        wm.maximize(a, Axis::Both).expect("max");
        let content = wm.registry.get(a).expect("a").geometry;
        wm.conn.clear_calls();
        let req = configure_request(200, ConfigWindow::X | ConfigWindow::WIDTH, Geometry::new(5, 0, 50, 50));
        wm.handle_event(&Event::ConfigureRequest(req)).expect("configure");
        assert_eq!(wm.conn.calls(), vec![Call::ConfigureNotify(200, content)]);
        assert_eq!(wm.registry.get(a).expect("a").geometry, content);
    }

    #[test]
    fn test_destroy_unmanages_and_orphans_transients() {
        let mut wm = wm_with(MockConn::single(1000, 800));
        let a = managed(&mut wm, 200, Geometry::new(10, 40, 300, 200));
        let owner = managed(&mut wm, 201, Geometry::new(10, 40, 300, 200));
        let dialog = managed(&mut wm, 202, Geometry::new(10, 40, 100, 100));
        wm.link_transient(dialog, owner);
        wm.activate(Some(owner)).expect("activate");

        wm.conn.kill(201);
        let event = Event::DestroyNotify(DestroyNotifyEvent {
            response_type: DESTROY_NOTIFY_EVENT,
            sequence: 0,
            event: 0,
            window: 201,
        });
        wm.handle_event(&event).expect("destroy");

        assert!(!wm.registry.contains(owner));
        let d = wm.registry.get(dialog).expect("dialog survives");
        assert_eq!(d.owner, None);
        // the successor scan runs forward from the removed client
        assert_eq!(wm.active, Some(dialog));
        assert!(wm.registry.contains(a));
        assert_eq!(wm.conn.prop(ROOT, wm.atoms.net_client_list), vec![200, 202]);
    }

    #[test]
    fn test_reparent_unmap_is_ignored() {
        let mut wm = wm_with(MockConn::single(1000, 800));
        let a = managed(&mut wm, 200, Geometry::new(10, 40, 300, 200));
        wm.registry.get_mut(a).expect("a").ignore_unmaps = 1;
        let unmap = Event::UnmapNotify(UnmapNotifyEvent {
            response_type: UNMAP_NOTIFY_EVENT,
            sequence: 0,
            event: ROOT,
            window: 200,
            from_configure: false,
        });
        wm.handle_event(&unmap).expect("unmap");
        assert!(wm.registry.contains(a));
        wm.handle_event(&unmap).expect("unmap");
        assert!(!wm.registry.contains(a));
    }

    #[test]
    fn test_stale_async_error_is_tolerated() {
        let mut wm = wm_with(MockConn::single(1000, 800));
        let stale = X11Error {
            error_kind: x11rb::protocol::ErrorKind::Window,
            error_code: 3,
            sequence: 0,
            bad_value: 0x42,
            minor_opcode: 0,
            major_opcode: 12,
            extension_name: None,
            request_name: None,
        };
        assert!(wm.handle_event(&Event::Error(stale)).is_ok());

        let fatal = X11Error {
            error_kind: x11rb::protocol::ErrorKind::Alloc,
            error_code: 11,
            sequence: 0,
            bad_value: 0,
            minor_opcode: 0,
            major_opcode: 1,
            extension_name: None,
            request_name: None,
        };
        assert!(wm.handle_event(&Event::Error(fatal)).is_err());
    }

    #[test]
    fn test_iconic_change_state_minimizes() {
        let mut wm = wm_with(MockConn::single(1000, 800));
        let a = managed(&mut wm, 200, Geometry::new(10, 40, 300, 200));
        let kind = wm.atoms.wm_change_state;
        wm.handle_event(&client_message(200, kind, [WM_STATE_ICONIC, 0, 0, 0, 0])).expect("iconify");
        assert!(wm.registry.get(a).expect("a").is_hidden());

        let kind = wm.atoms.net_active_window;
        wm.handle_event(&client_message(200, kind, [1, 0, 0, 0, 0])).expect("activate");
        let c = wm.registry.get(a).expect("a");
        assert!(!c.is_hidden());
        assert_eq!(wm.active, Some(a));
    }
}
