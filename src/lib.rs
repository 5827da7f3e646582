//! strata
//!
//! Geometry and state core of a tiling/stacking X11 window manager. The
//! binary wires it to a live display connection; everything here can also be
//! driven through the recording connection used by the unit tests.

pub mod config;
pub mod shared;
pub mod wm;
pub mod x11_async;
