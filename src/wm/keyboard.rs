//! Keyboard Module
//!
//! Trigger/action bindings. An action is one of four shapes (no target, a
//! client, a client plus an integer, a monitor) and is dispatched by matching
//! on that shape.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::wm::client::ClientId;
use crate::wm::client_flags::{Axis, Direction, Edge};
use crate::wm::conn::XConn;
use crate::wm::error::XError;
use crate::wm::WindowManager;

// Lock and NumLock are ignored when matching
const IGNORED_MODS: u16 = (1 << 1) | (1 << 4);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modifier {
    Shift,
    Control,
    Alt,
    Super,
}

impl Modifier {
    pub fn mask(&self) -> u16 {
        match self {
            Self::Shift => 1 << 0,
            Self::Control => 1 << 2,
            Self::Alt => 1 << 3,
            Self::Super => 1 << 6,
        }
    }
}

pub fn modifier_mask(modifiers: &[Modifier]) -> u16 {
    modifiers.iter().fold(0, |acc, m| acc | m.mask())
}

/// Strip lock modifiers and button state bits from an event state.
pub fn clean_mask(state: u16) -> u16 {
    state & !IGNORED_MODS & 0x00ff
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Trigger {
    Key {
        key: u8,
        #[serde(default)]
        modifiers: Vec<Modifier>,
    },
    Button {
        button: u8,
        #[serde(default)]
        modifiers: Vec<Modifier>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GlobalOp {
    Quit,
    FocusNext,
    FocusPrev,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientOp {
    Close,
    ToggleFullscreen,
    ToggleMaximize,
    MaximizeHorizontal,
    MaximizeVertical,
    MaximizeLeft,
    MaximizeRight,
    MaximizeTop,
    MaximizeBottom,
    Minimize,
    Restore,
    Raise,
    Lower,
    ToggleTopbar,
    ToggleBorder,
    ToggleSticky,
    StackUp,
    StackDown,
    Move,
    Resize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientArgOp {
    SendToDesktop,
    SendToMonitor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorOp {
    ToggleDynamic,
    AdjustMasters,
    /// Argument in percent of the workarea width
    AdjustSplit,
    ViewDesktop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    Global { op: GlobalOp },
    Client { op: ClientOp },
    ClientArg { op: ClientArgOp, arg: i32 },
    Monitor {
        op: MonitorOp,
        #[serde(default)]
        arg: i32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    pub trigger: Trigger,
    pub action: Action,
}

/// Lookup tables built from the configured bindings
#[derive(Debug, Default)]
pub struct Bindings {
    keys: HashMap<(u16, u8), Action>,
    buttons: HashMap<(u16, u8), Action>,
}

impl Bindings {
    pub fn new(bindings: &[Binding]) -> Self {
        let mut table = Self::default();
        for binding in bindings {
            match &binding.trigger {
                Trigger::Key { key, modifiers } => {
                    table.keys.insert((modifier_mask(modifiers), *key), binding.action);
                }
                Trigger::Button { button, modifiers } => {
                    table.buttons.insert((modifier_mask(modifiers), *button), binding.action);
                }
            }
        }
        table
    }

    pub fn key(&self, state: u16, keycode: u8) -> Option<Action> {
        self.keys.get(&(clean_mask(state), keycode)).copied()
    }

    pub fn button(&self, state: u16, button: u8) -> Option<Action> {
        self.buttons.get(&(clean_mask(state), button)).copied()
    }

    pub fn key_grabs(&self) -> impl Iterator<Item = (u16, u8)> + '_ {
        self.keys.keys().copied()
    }
}

/// Built-in table written to a fresh config file (US keycodes).
pub fn default_bindings() -> Vec<Binding> {
    use Modifier::{Shift, Super};

    let key = |key: u8, modifiers: Vec<Modifier>, action: Action| Binding {
        trigger: Trigger::Key { key, modifiers },
        action,
    };
    let client = |op| Action::Client { op };
    let monitor = |op, arg| Action::Monitor { op, arg };

    let mut bindings = vec![
        key(24, vec![Super, Shift], Action::Global { op: GlobalOp::Quit }),
        key(23, vec![Super], Action::Global { op: GlobalOp::FocusNext }),
        key(23, vec![Super, Shift], Action::Global { op: GlobalOp::FocusPrev }),
        key(54, vec![Super], client(ClientOp::Close)),
        key(41, vec![Super], client(ClientOp::ToggleFullscreen)),
        key(58, vec![Super], client(ClientOp::ToggleMaximize)),
        key(57, vec![Super], client(ClientOp::Minimize)),
        key(27, vec![Super], client(ClientOp::Restore)),
        key(113, vec![Super], client(ClientOp::MaximizeLeft)),
        key(114, vec![Super], client(ClientOp::MaximizeRight)),
        key(111, vec![Super], client(ClientOp::MaximizeTop)),
        key(116, vec![Super], client(ClientOp::MaximizeBottom)),
        key(44, vec![Super], client(ClientOp::StackDown)),
        key(45, vec![Super], client(ClientOp::StackUp)),
        key(28, vec![Super], client(ClientOp::ToggleTopbar)),
        key(39, vec![Super], client(ClientOp::ToggleSticky)),
        key(65, vec![Super], monitor(MonitorOp::ToggleDynamic, 0)),
        key(31, vec![Super], monitor(MonitorOp::AdjustMasters, 1)),
        key(40, vec![Super], monitor(MonitorOp::AdjustMasters, -1)),
        key(43, vec![Super], monitor(MonitorOp::AdjustSplit, -5)),
        key(46, vec![Super], monitor(MonitorOp::AdjustSplit, 5)),
        key(59, vec![Super, Shift], Action::ClientArg { op: ClientArgOp::SendToMonitor, arg: -1 }),
        key(60, vec![Super, Shift], Action::ClientArg { op: ClientArgOp::SendToMonitor, arg: 1 }),
    ];

    // 1..9 and 0 on the number row
    for n in 0..10u8 {
        let code = 10 + n;
        bindings.push(key(code, vec![Super], monitor(MonitorOp::ViewDesktop, n as i32)));
        bindings.push(key(
            code,
            vec![Super, Shift],
            Action::ClientArg { op: ClientArgOp::SendToDesktop, arg: n as i32 },
        ));
    }

    bindings.push(Binding {
        trigger: Trigger::Button { button: 1, modifiers: vec![Super] },
        action: client(ClientOp::Move),
    });
    bindings.push(Binding {
        trigger: Trigger::Button { button: 3, modifiers: vec![Super] },
        action: client(ClientOp::Resize),
    });
    bindings
}

impl<X: XConn> WindowManager<X> {
    pub fn grab_keys(&self) -> Result<(), XError> {
        for (mods, keycode) in self.bindings.key_grabs() {
            self.conn.grab_key(mods, keycode)?;
        }
        info!("Grabbed key bindings");
        Ok(())
    }

    /// Run an action. Client-shaped actions target `target`, or the active
    /// client when none is given; they are ignored when neither exists.
    pub fn dispatch(&mut self, action: Action, target: Option<ClientId>) -> Result<(), XError> {
        debug!("Dispatching {:?} (target {:?})", action, target);
        let client = target.or(self.active);
        match action {
            Action::Global { op } => self.run_global(op),
            Action::Client { op } => match client {
                Some(id) => self.run_client(op, id),
                None => Ok(()),
            },
            Action::ClientArg { op, arg } => match client {
                Some(id) => match op {
                    ClientArgOp::SendToDesktop => {
                        if arg < 0 {
                            return Ok(());
                        }
                        self.send_to_desktop(id, arg as usize)
                    }
                    ClientArgOp::SendToMonitor => self.send_to_monitor(id, arg),
                },
                None => Ok(()),
            },
            Action::Monitor { op, arg } => self.run_monitor(op, self.active_monitor, arg),
        }
    }

    fn run_global(&mut self, op: GlobalOp) -> Result<(), XError> {
        match op {
            GlobalOp::Quit => {
                info!("Quit requested");
                self.running = false;
                Ok(())
            }
            GlobalOp::FocusNext => self.cycle_focus(Direction::Down),
            GlobalOp::FocusPrev => self.cycle_focus(Direction::Up),
        }
    }

    fn run_client(&mut self, op: ClientOp, id: ClientId) -> Result<(), XError> {
        match op {
            ClientOp::Close => self.close_client(id),
            ClientOp::ToggleFullscreen => {
                if self.registry.get(id).map(|c| c.is_fullscreen()).unwrap_or(false) {
                    self.restore(id).map(|_| ())
                } else {
                    self.fullscreen(id)
                }
            }
            ClientOp::ToggleMaximize => {
                let maximized = self
                    .registry
                    .get(id)
                    .map(|c| c.state.any_maximized())
                    .unwrap_or(false);
                if maximized {
                    self.restore(id).map(|_| ())
                } else {
                    self.maximize(id, Axis::Both)
                }
            }
            ClientOp::MaximizeHorizontal => self.maximize(id, Axis::Horizontal),
            ClientOp::MaximizeVertical => self.maximize(id, Axis::Vertical),
            ClientOp::MaximizeLeft => self.maximize_half(id, Edge::Left),
            ClientOp::MaximizeRight => self.maximize_half(id, Edge::Right),
            ClientOp::MaximizeTop => self.maximize_half(id, Edge::Top),
            ClientOp::MaximizeBottom => self.maximize_half(id, Edge::Bottom),
            ClientOp::Minimize => self.minimize(id),
            ClientOp::Restore => self.restore(id).map(|_| ()),
            ClientOp::Raise => self.raise(id),
            ClientOp::Lower => self.lower(id),
            ClientOp::ToggleTopbar => self.toggle_topbar(id),
            ClientOp::ToggleBorder => self.toggle_border(id),
            ClientOp::ToggleSticky => self.toggle_sticky(id),
            ClientOp::StackUp => self.stack_directional(id, Direction::Up),
            ClientOp::StackDown => self.stack_directional(id, Direction::Down),
            // pointer drags are started from the button handler
            ClientOp::Move | ClientOp::Resize => Ok(()),
        }
    }

    pub fn run_monitor(&mut self, op: MonitorOp, monitor: usize, arg: i32) -> Result<(), XError> {
        match op {
            MonitorOp::ToggleDynamic => self.toggle_dynamic(monitor),
            MonitorOp::AdjustMasters => self.adjust_masters(monitor, arg),
            MonitorOp::AdjustSplit => self.adjust_split(monitor, arg as f32 / 100.0),
            MonitorOp::ViewDesktop => {
                if arg < 0 {
                    return Ok(());
                }
                self.view_desktop(monitor, arg as usize)
            }
        }
    }
}
