//! Client Flags
//!
//! Bitfield state for managed clients plus the small enums the transition
//! engine uses to name axes, edges and window kinds.

use bitflags::bitflags;

bitflags! {
    /// Client state mask (advertised through `_NET_WM_STATE`)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct StateFlags: u32 {
        const MAXIMIZED_HORZ    = 1 << 0;
        const MAXIMIZED_VERT    = 1 << 1;
        const FULLSCREEN        = 1 << 2;
        const HIDDEN            = 1 << 3;
        const STICKY            = 1 << 4;
        const ABOVE             = 1 << 5;
        const BELOW             = 1 << 6;
        const DEMANDS_ATTENTION = 1 << 7;
    }
}

impl StateFlags {
    pub fn maximized() -> Self {
        Self::MAXIMIZED_HORZ | Self::MAXIMIZED_VERT
    }

    pub fn is_maximized(&self) -> bool {
        self.contains(Self::maximized())
    }

    pub fn any_maximized(&self) -> bool {
        self.intersects(Self::maximized())
    }
}

bitflags! {
    /// Protocol capabilities read from `WM_HINTS` and `WM_PROTOCOLS`
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Protocols: u32 {
        const FOCUSABLE  = 1 << 0;
        const TAKE_FOCUS = 1 << 1;
        const DELETE     = 1 << 2;
    }
}

impl Default for Protocols {
    fn default() -> Self {
        Self::FOCUSABLE
    }
}

/// Window type (EWMH `_NET_WM_WINDOW_TYPE`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowType {
    #[default]
    Normal,
    Desktop,
    Dock,
    Dialog,
    Toolbar,
    Menu,
    Utility,
    Splash,
    Notification,
}

impl WindowType {
    /// Panels, desktops and splash screens never change mode or take focus
    /// from the successor scan.
    pub fn is_fixed(&self) -> bool {
        matches!(self, Self::Desktop | Self::Dock | Self::Splash)
    }
}

/// Maximize axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Horizontal,
    Vertical,
    Both,
}

/// Desktop edge a half-maximized client is snapped to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Left,
    Right,
    Top,
    Bottom,
}

impl Edge {
    /// State bits advertised for a half-maximized client: left/right halves
    /// span the full height, top/bottom halves the full width.
    pub fn state_bits(&self) -> StateFlags {
        match self {
            Self::Left | Self::Right => StateFlags::MAXIMIZED_VERT,
            Self::Top | Self::Bottom => StateFlags::MAXIMIZED_HORZ,
        }
    }
}

/// Direction for list movement and focus cycling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}
