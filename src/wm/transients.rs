//! Transients Module
//!
//! Owner/transient relations between clients (dialogs and the window they
//! belong to). The relation is kept as a forest: links that would close a
//! cycle are refused.

use tracing::debug;

use crate::wm::client::ClientId;
use crate::wm::conn::XConn;
use crate::wm::WindowManager;

impl<X: XConn> WindowManager<X> {
    /// Record `id` as transient for `owner`, replacing any previous owner.
    pub fn link_transient(&mut self, id: ClientId, owner: ClientId) {
        if id == owner || !self.registry.contains(id) || !self.registry.contains(owner) {
            return;
        }
        if self.owner_chain_contains(owner, id) {
            debug!("Refusing transient link {} -> {}: would form a cycle", id, owner);
            return;
        }
        self.unlink_transient(id);
        if let Some(o) = self.registry.get_mut(owner) {
            o.transients.push(id);
        }
        if let Some(c) = self.registry.get_mut(id) {
            c.owner = Some(owner);
        }
        debug!("Client {} is transient for {}", id, owner);
    }

    /// Drop the link from `id` to its owner, if any.
    pub fn unlink_transient(&mut self, id: ClientId) {
        let Some(owner) = self.registry.get_mut(id).and_then(|c| c.owner.take()) else {
            return;
        };
        if let Some(o) = self.registry.get_mut(owner) {
            o.transients.retain(|t| *t != id);
        }
    }

    /// Remove every relation of a client about to go away: its own owner
    /// link, and the owner links of its transients (which survive ownerless).
    pub fn sever_transients(&mut self, id: ClientId) {
        self.unlink_transient(id);
        let transients = self
            .registry
            .get_mut(id)
            .map(|c| std::mem::take(&mut c.transients))
            .unwrap_or_default();
        for t in transients {
            if let Some(c) = self.registry.get_mut(t) {
                c.owner = None;
            }
        }
    }

    /// Center a transient's frame over its owner's.
    pub fn center_over_owner(&mut self, id: ClientId) {
        let Some(owner_frame) = self
            .registry
            .get(id)
            .and_then(|c| c.owner)
            .and_then(|o| self.registry.get(o))
            .map(|o| o.frame_geometry)
        else {
            return;
        };
        if let Some(c) = self.registry.get_mut(id) {
            let frame = c.frame_geometry.centered_in(&owner_frame);
            c.set_frame(frame);
        }
    }

    fn owner_chain_contains(&self, start: ClientId, needle: ClientId) -> bool {
        let mut cursor = Some(start);
        let mut steps = 0;
        while let Some(id) = cursor {
            if id == needle {
                return true;
            }
            steps += 1;
            if steps > self.registry.len() {
                return true;
            }
            cursor = self.registry.get(id).and_then(|c| c.owner);
        }
        false
    }
}
