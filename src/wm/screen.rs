//! Screen Module
//!
//! Monitors, their desktops, and the client arena. Each monitor keeps a doubly
//! linked list of its clients (cycling order, distinct from z-order) threaded
//! through `Client::prev`/`Client::next` by [`ClientId`].

use std::collections::HashMap;

use crate::config::DesktopConfig;
use crate::shared::Geometry;
use crate::wm::client::{Client, ClientId};
use crate::wm::conn::Xid;

/// One virtual desktop slot of a monitor
#[derive(Debug, Clone)]
pub struct Desktop {
    /// Monitor bounds minus strut reservations
    pub workarea: Geometry,
    pub dynamic: bool,
    pub masters: usize,
    pub split: f32,
    /// Client to reactivate on re-entry
    pub last_active: Option<ClientId>,
    /// Topbar visibility for newly managed clients
    pub topbar: bool,
}

/// Monitor/Output
#[derive(Debug, Clone)]
pub struct Monitor {
    pub geometry: Geometry,
    pub desktops: Vec<Desktop>,
    pub active_desktop: usize,
    pub head: Option<ClientId>,
    pub tail: Option<ClientId>,
}

impl Monitor {
    pub fn new(geometry: Geometry, config: &DesktopConfig) -> Self {
        let desktop = Desktop {
            workarea: geometry,
            dynamic: config.dynamic,
            masters: config.masters.max(1),
            split: config.split,
            last_active: None,
            topbar: config.topbar,
        };
        Self {
            geometry,
            desktops: vec![desktop; config.count.max(1)],
            active_desktop: 0,
            head: None,
            tail: None,
        }
    }

    pub fn desktop(&self) -> &Desktop {
        &self.desktops[self.active_desktop]
    }
}

/// Client arena plus per-monitor ordering
#[derive(Debug, Default)]
pub struct Registry {
    clients: HashMap<ClientId, Client>,
    /// Content, frame and decoration windows to their client
    windows: HashMap<Xid, ClientId>,
    pub monitors: Vec<Monitor>,
    next_id: u64,
}

impl Registry {
    pub fn new(outputs: &[Geometry], config: &DesktopConfig) -> Self {
        Self {
            clients: HashMap::new(),
            windows: HashMap::new(),
            monitors: outputs.iter().map(|g| Monitor::new(*g, config)).collect(),
            next_id: 1,
        }
    }

    pub fn allocate_id(&mut self) -> ClientId {
        let id = ClientId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Store a client (unlinked) and index every window it owns.
    pub fn insert(&mut self, client: Client) {
        let id = client.id;
        self.windows.insert(client.window, id);
        for w in client.decor.windows() {
            self.windows.insert(w, id);
        }
        self.clients.insert(id, client);
    }

    /// Unlink and drop a client from the arena.
    pub fn remove(&mut self, id: ClientId) -> Option<Client> {
        self.detach(id);
        let client = self.clients.remove(&id)?;
        self.windows.retain(|_, owner| *owner != id);
        Some(client)
    }

    pub fn register_window(&mut self, window: Xid, id: ClientId) {
        self.windows.insert(window, id);
    }

    pub fn lookup(&self, window: Xid) -> Option<ClientId> {
        self.windows.get(&window).copied()
    }

    /// Client whose content window is exactly `window`.
    pub fn by_content(&self, window: Xid) -> Option<ClientId> {
        self.lookup(window)
            .filter(|id| self.get(*id).map(|c| c.window == window).unwrap_or(false))
    }

    pub fn get(&self, id: ClientId) -> Option<&Client> {
        self.clients.get(&id)
    }

    pub fn get_mut(&mut self, id: ClientId) -> Option<&mut Client> {
        self.clients.get_mut(&id)
    }

    pub fn contains(&self, id: ClientId) -> bool {
        self.clients.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn ids(&self) -> Vec<ClientId> {
        self.clients.keys().copied().collect()
    }

    /// Clients of a monitor, head to tail.
    pub fn monitor_clients(&self, monitor: usize) -> Vec<ClientId> {
        let mut out = Vec::new();
        let mut cursor = self.monitors.get(monitor).and_then(|m| m.head);
        while let Some(id) = cursor {
            // a corrupted list must not loop forever
            if out.len() > self.clients.len() {
                break;
            }
            out.push(id);
            cursor = self.clients.get(&id).and_then(|c| c.next);
        }
        out
    }

    pub fn desktop_clients(&self, monitor: usize, desktop: usize) -> Vec<ClientId> {
        self.monitor_clients(monitor)
            .into_iter()
            .filter(|id| self.get(*id).map(|c| c.desktop == desktop).unwrap_or(false))
            .collect()
    }

    /// Remove a client from its monitor list. No-op when unlinked.
    pub fn detach(&mut self, id: ClientId) {
        let Some(c) = self.clients.get(&id) else {
            return;
        };
        let (monitor, prev, next) = (c.monitor, c.prev, c.next);
        let Some(mon) = self.monitors.get_mut(monitor) else {
            return;
        };
        match prev {
            Some(p) => {
                if let Some(pc) = self.clients.get_mut(&p) {
                    pc.next = next;
                }
            }
            None if mon.head == Some(id) => mon.head = next,
            None => {}
        }
        let mon = &mut self.monitors[monitor];
        match next {
            Some(n) => {
                if let Some(nc) = self.clients.get_mut(&n) {
                    nc.prev = prev;
                }
            }
            None if mon.tail == Some(id) => mon.tail = prev,
            None => {}
        }
        if let Some(c) = self.clients.get_mut(&id) {
            c.prev = None;
            c.next = None;
        }
    }

    pub fn push_back(&mut self, monitor: usize, id: ClientId) {
        let tail = self.monitors[monitor].tail;
        let Some(c) = self.clients.get_mut(&id) else {
            return;
        };
        c.monitor = monitor;
        c.prev = tail;
        c.next = None;
        match tail {
            Some(t) => {
                if let Some(tc) = self.clients.get_mut(&t) {
                    tc.next = Some(id);
                }
            }
            None => self.monitors[monitor].head = Some(id),
        }
        self.monitors[monitor].tail = Some(id);
    }

    pub fn push_front(&mut self, monitor: usize, id: ClientId) {
        let head = self.monitors[monitor].head;
        let Some(c) = self.clients.get_mut(&id) else {
            return;
        };
        c.monitor = monitor;
        c.prev = None;
        c.next = head;
        match head {
            Some(h) => {
                if let Some(hc) = self.clients.get_mut(&h) {
                    hc.prev = Some(id);
                }
            }
            None => self.monitors[monitor].tail = Some(id),
        }
        self.monitors[monitor].head = Some(id);
    }

    /// Detach `id` and splice it right after `reference`, adopting the
    /// reference's monitor.
    pub fn stack_after(&mut self, id: ClientId, reference: ClientId) {
        if id == reference || !self.contains(id) {
            return;
        }
        let Some((monitor, next)) = self.get(reference).map(|r| (r.monitor, r.next)) else {
            return;
        };
        self.detach(id);
        // detaching may have changed the reference's successor
        let next = if next == Some(id) {
            self.get(reference).and_then(|r| r.next)
        } else {
            next
        };
        match next {
            None => self.push_back(monitor, id),
            Some(n) => {
                if let Some(c) = self.clients.get_mut(&id) {
                    c.monitor = monitor;
                    c.prev = Some(reference);
                    c.next = Some(n);
                }
                if let Some(r) = self.clients.get_mut(&reference) {
                    r.next = Some(id);
                }
                if let Some(nc) = self.clients.get_mut(&n) {
                    nc.prev = Some(id);
                }
            }
        }
    }

    /// Detach `id` and splice it right before `reference`, adopting the
    /// reference's monitor.
    pub fn stack_before(&mut self, id: ClientId, reference: ClientId) {
        if id == reference || !self.contains(id) {
            return;
        }
        let Some((monitor, prev)) = self.get(reference).map(|r| (r.monitor, r.prev)) else {
            return;
        };
        self.detach(id);
        let prev = if prev == Some(id) {
            self.get(reference).and_then(|r| r.prev)
        } else {
            prev
        };
        match prev {
            None => self.push_front(monitor, id),
            Some(p) => {
                if let Some(c) = self.clients.get_mut(&id) {
                    c.monitor = monitor;
                    c.prev = Some(p);
                    c.next = Some(reference);
                }
                if let Some(r) = self.clients.get_mut(&reference) {
                    r.prev = Some(id);
                }
                if let Some(pc) = self.clients.get_mut(&p) {
                    pc.next = Some(id);
                }
            }
        }
    }

    /// Monitor containing a point, falling back to the first one.
    pub fn monitor_at(&self, x: i32, y: i32) -> usize {
        self.monitors
            .iter()
            .position(|m| m.geometry.contains_point(x, y))
            .unwrap_or(0)
    }

    /// Ring successor/predecessor of a monitor.
    pub fn monitor_offset(&self, monitor: usize, delta: i32) -> usize {
        let len = self.monitors.len().max(1) as i32;
        (monitor as i32 + delta).rem_euclid(len) as usize
    }
}
