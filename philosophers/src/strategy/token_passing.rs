//! Chandy–Misra token passing.
//!
//! Every resource is shared by exactly two actors and carries a token
//! state: who owns it, whether it is dirty (used since it was last handed
//! over) and whether the other sharer has asked for it. Ownership only
//! moves under the resource's own lock.
//!
//! A clean resource is never given up; a dirty one is handed to whoever
//! asks. An actor that eats dirties everything it used, so after eating
//! it yields to any neighbour that asked in the meantime.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use tracing::trace;

use crate::context::SimContext;
use crate::error::StrategyError;
use crate::strategy::{Acquisition, AcquisitionStrategy, StrategyKind};
use crate::types::{ActorId, ResourceId};

/// Upper bound on a single condvar wait before the availability predicate
/// is re-checked.
const RECHECK_INTERVAL: Duration = Duration::from_millis(10);

/// The `{ owner, dirty, requested_owner }` triple of one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TokenState {
    /// Current owner. Always one of the two sharers.
    pub owner: ActorId,
    /// Used since the last hand-over.
    pub dirty: bool,
    /// The other sharer, if it asked for the resource while it was clean.
    pub requested_owner: Option<ActorId>,
}

impl TokenState {
    /// Whether the triple is legal for a resource shared by `sharers`.
    pub fn is_consistent(&self, sharers: [ActorId; 2]) -> bool {
        let owner_ok = sharers.contains(&self.owner);
        let request_ok = match self.requested_owner {
            None => true,
            Some(requester) => sharers.contains(&requester) && requester != self.owner,
        };
        owner_ok && request_ok
    }
}

/// A resource under the token passing protocol.
#[derive(Debug)]
pub struct TokenResource {
    id: ResourceId,
    sharers: [ActorId; 2],
    state: Mutex<TokenState>,
    available: Condvar,
}

impl TokenResource {
    /// Create a dirty resource shared by `sharers`. The sharer with the
    /// smaller id owns it.
    pub fn new(ctx: &SimContext, sharers: [ActorId; 2]) -> Arc<Self> {
        let owner = sharers[0].min(sharers[1]);
        Arc::new(Self {
            id: ctx.next_resource_id(),
            sharers,
            state: Mutex::new(TokenState {
                owner,
                dirty: true,
                requested_owner: None,
            }),
            available: Condvar::new(),
        })
    }

    /// The resource's unique id.
    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// The two actors wired to this resource.
    pub fn sharers(&self) -> [ActorId; 2] {
        self.sharers
    }

    /// A copy of the current token state.
    pub fn snapshot(&self) -> TokenState {
        *self.state.lock()
    }

    /// Whether the current token state is legal.
    pub fn is_consistent(&self) -> bool {
        self.snapshot().is_consistent(self.sharers)
    }

    /// Try to claim the resource for `me`. On failure the request is
    /// recorded so the owner hands it over on its next release.
    fn try_claim(&self, me: ActorId) -> bool {
        let mut state = self.state.lock();
        if state.owner == me {
            state.dirty = false;
            true
        } else if state.dirty {
            state.owner = me;
            state.dirty = false;
            state.requested_owner = None;
            true
        } else {
            state.requested_owner = Some(me);
            false
        }
    }

    /// Block until the resource is owned by `me` or dirty.
    fn wait_available(&self, me: ActorId) {
        let mut state = self.state.lock();
        while state.owner != me && !state.dirty {
            self.available.wait_for(&mut state, RECHECK_INTERVAL);
        }
    }

    /// Give the resource up after eating. Returns whether ownership moved.
    fn put_down(&self, me: ActorId) -> Result<bool, StrategyError> {
        let mut state = self.state.lock();
        if state.owner != me {
            return Err(self.violation(me, format!("owned by {}", state.owner)));
        }
        if state.dirty {
            return Err(self.violation(me, "released while dirty".to_string()));
        }

        let moved = match state.requested_owner.take() {
            Some(next) => {
                state.owner = next;
                true
            }
            None => {
                state.dirty = true;
                false
            }
        };
        drop(state);
        self.available.notify_all();
        Ok(moved)
    }

    fn violation(&self, actor: ActorId, detail: String) -> StrategyError {
        StrategyError::ProtocolViolation {
            resource: self.id,
            actor,
            detail,
        }
    }
}

/// Acquires through the dirty/clean token protocol.
#[derive(Debug)]
pub struct TokenPassingStrategy {
    actor: ActorId,
    resources: Vec<Arc<TokenResource>>,
    holding: bool,
}

impl TokenPassingStrategy {
    /// Create a token passing strategy for `actor`.
    pub fn new(actor: ActorId, resources: Vec<Arc<TokenResource>>) -> Self {
        Self {
            actor,
            resources,
            holding: false,
        }
    }

    /// Claim every resource in one pass. Returns the index of the first
    /// resource that could not be claimed.
    fn claim_pass(&self) -> Result<(), usize> {
        for (index, resource) in self.resources.iter().enumerate() {
            if !resource.try_claim(self.actor) {
                return Err(index);
            }
        }
        Ok(())
    }
}

impl AcquisitionStrategy for TokenPassingStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::TokenPassing
    }

    fn resources(&self) -> Vec<ResourceId> {
        self.resources.iter().map(|r| r.id()).collect()
    }

    fn acquire(&mut self) -> Result<Acquisition, StrategyError> {
        loop {
            match self.claim_pass() {
                Ok(()) => {
                    self.holding = true;
                    return Ok(Acquisition::Acquired);
                }
                Err(index) => {
                    let resource = &self.resources[index];
                    trace!(actor = %self.actor, resource = %resource.id(), "waiting for token");
                    resource.wait_available(self.actor);
                }
            }
        }
    }

    fn release(&mut self) -> Result<(), StrategyError> {
        if !self.holding {
            return Err(StrategyError::NotHeld { actor: self.actor });
        }
        self.holding = false;

        let mut moved = false;
        for resource in &self.resources {
            moved |= resource.put_down(self.actor)?;
        }
        if moved {
            thread::yield_now();
        }
        Ok(())
    }
}
