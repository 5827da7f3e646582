use std::fmt;

use crate::config::StyleConfig;
use crate::shared::{Extents, Geometry};
use crate::wm::client_flags::{Edge, Protocols, StateFlags, WindowType};
use crate::wm::conn::Xid;
use crate::wm::hints::SizeHints;

/// Stable arena key for a managed client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(pub u64);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Window handles owned by a client's decorations
#[derive(Debug, Clone, Default)]
pub struct Decorations {
    pub frame: Xid,
    pub topbar: Option<Xid>,
    /// Right to left: close, maximize, minimize
    pub buttons: Vec<Xid>,
    /// Indexed by [`crate::wm::decorations::Handle`]
    pub handles: Vec<Xid>,
    pub topbar_mapped: bool,
    pub handles_mapped: bool,
}

impl Decorations {
    pub fn windows(&self) -> impl Iterator<Item = Xid> + '_ {
        std::iter::once(self.frame)
            .chain(self.topbar)
            .chain(self.buttons.iter().copied())
            .chain(self.handles.iter().copied())
    }
}

/// Frame geometry snapshots, one per mode
#[derive(Debug, Clone, Copy, Default)]
pub struct SavedGeometry {
    pub tile: Geometry,
    pub fullscreen: Geometry,
    pub maximize: Geometry,
    pub hidden: Geometry,
}

/// Reserved margins a client imposes on its desktop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Strut {
    pub left: u32,
    pub right: u32,
    pub top: u32,
    pub bottom: u32,
}

impl Strut {
    /// From `_NET_WM_STRUT` or the first four words of `_NET_WM_STRUT_PARTIAL`.
    pub fn from_raw(values: &[u32]) -> Self {
        match values {
            [left, right, top, bottom, ..] => Self {
                left: *left,
                right: *right,
                top: *top,
                bottom: *bottom,
            },
            _ => Self::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Window Manager client state
/// Represents a window being managed by the WM
#[derive(Debug)]
pub struct Client {
    pub id: ClientId,

    /// Application window
    pub window: Xid,

    pub decor: Decorations,

    /// Content rectangle (root coordinates)
    pub geometry: Geometry,

    /// Decorated frame rectangle (root coordinates)
    pub frame_geometry: Geometry,

    pub saved: SavedGeometry,

    pub border_width: u32,
    pub topbar_height: u32,
    pub border_visible: bool,
    pub topbar_visible: bool,
    /// Decoration eligibility
    pub has_topbar: bool,
    pub has_handles: bool,
    /// Decoration visibility to return to when leaving fullscreen
    pub fullscreen_decor: (bool, bool),

    pub tiled: bool,
    pub active: bool,
    pub hovered_button: Option<usize>,

    pub state: StateFlags,
    /// Half-maximize edge; authoritative over the maximize bits when set
    pub half: Option<Edge>,

    pub hints: SizeHints,
    pub strut: Strut,
    pub protocols: Protocols,
    pub window_type: WindowType,

    pub owner: Option<ClientId>,
    pub transients: Vec<ClientId>,

    pub monitor: usize,
    pub desktop: usize,
    pub prev: Option<ClientId>,
    pub next: Option<ClientId>,

    /// UnmapNotify events caused by our own reparenting
    pub ignore_unmaps: u32,
}

impl Client {
    pub fn new(id: ClientId, window: Xid, geometry: Geometry, style: &StyleConfig) -> Self {
        let mut client = Self {
            id,
            window,
            decor: Decorations::default(),
            geometry,
            frame_geometry: geometry,
            saved: SavedGeometry::default(),
            border_width: style.border_width,
            topbar_height: style.topbar_height,
            border_visible: true,
            topbar_visible: true,
            has_topbar: true,
            has_handles: true,
            fullscreen_decor: (true, true),
            tiled: false,
            active: false,
            hovered_button: None,
            state: StateFlags::default(),
            half: None,
            hints: SizeHints::default(),
            strut: Strut::default(),
            protocols: Protocols::default(),
            window_type: WindowType::Normal,
            owner: None,
            transients: Vec::new(),
            monitor: 0,
            desktop: 0,
            prev: None,
            next: None,
            ignore_unmaps: 0,
        };
        client.frame_geometry = client.extents().frame_from_window(&geometry);
        client
    }

    /// Current decoration thickness
    pub fn extents(&self) -> Extents {
        Extents {
            border: if self.border_visible { self.border_width } else { 0 },
            topbar: if self.has_topbar && self.topbar_visible {
                self.topbar_height
            } else {
                0
            },
        }
    }

    /// Frame-first update: the content rectangle follows.
    pub fn set_frame(&mut self, frame: Geometry) {
        self.frame_geometry = frame;
        self.geometry = self.extents().window_from_frame(&frame);
    }

    /// Window-first update: the frame rectangle follows.
    pub fn set_content(&mut self, content: Geometry) {
        self.geometry = content;
        self.frame_geometry = self.extents().frame_from_window(&content);
    }

    /// Change decoration visibility keeping the frame where it is.
    pub fn set_decor_visibility(&mut self, border: bool, topbar: bool) {
        self.border_visible = border;
        self.topbar_visible = topbar;
        let frame = self.frame_geometry;
        self.set_frame(frame);
    }

    pub fn is_fixed_kind(&self) -> bool {
        self.window_type.is_fixed()
    }

    pub fn is_size_fixed(&self) -> bool {
        self.hints.is_fixed()
    }

    pub fn is_hidden(&self) -> bool {
        self.state.contains(StateFlags::HIDDEN)
    }

    pub fn is_fullscreen(&self) -> bool {
        self.state.contains(StateFlags::FULLSCREEN)
    }

    pub fn is_sticky(&self) -> bool {
        self.state.contains(StateFlags::STICKY)
    }

    /// Guard shared by the maximize family and fullscreen.
    pub fn can_change_mode(&self) -> bool {
        !self.is_fixed_kind() && !self.is_size_fixed() && !self.tiled
    }

    /// Candidate for master/stack arrangement.
    pub fn is_tileable(&self) -> bool {
        self.window_type == WindowType::Normal && !self.is_hidden()
    }

    /// Candidate for successor selection and directional stacking.
    pub fn is_focus_candidate(&self) -> bool {
        !self.is_fixed_kind() && self.window_type == WindowType::Normal && !self.is_hidden()
    }

    pub fn is_on_desktop(&self, desktop: usize) -> bool {
        self.desktop == desktop || self.is_sticky()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn style() -> StyleConfig {
        StyleConfig {
            border_width: 2,
            topbar_height: 20,
            ..StyleConfig::default()
        }
    }

    #[test]
    fn test_new_client_derives_frame() {
        let c = Client::new(ClientId(1), 42, Geometry::new(100, 100, 300, 200), &style());
        assert_eq!(c.frame_geometry, Geometry::new(98, 78, 304, 224));
    }

    #[test]
    fn test_hiding_decorations_keeps_frame() {
        let mut c = Client::new(ClientId(1), 42, Geometry::new(100, 100, 300, 200), &style());
        let frame = c.frame_geometry;
        c.set_decor_visibility(false, false);
        assert_eq!(c.frame_geometry, frame);
        assert_eq!(c.geometry, frame);
        c.set_decor_visibility(true, true);
        assert_eq!(c.geometry, Geometry::new(100, 100, 300, 200));
    }

    #[test]
    fn test_mode_guard() {
        let mut c = Client::new(ClientId(1), 42, Geometry::new(0, 0, 10, 10), &style());
        assert!(c.can_change_mode());
        c.tiled = true;
        assert!(!c.can_change_mode());
        c.tiled = false;
        c.window_type = WindowType::Dock;
        assert!(!c.can_change_mode());
    }

    #[test]
    fn test_strut_from_partial() {
        let strut = Strut::from_raw(&[0, 0, 30, 0, 0, 0, 0, 0, 0, 1919, 0, 0]);
        assert_eq!(strut.top, 30);
        assert!(Strut::from_raw(&[1, 2]).is_empty());
    }
}
