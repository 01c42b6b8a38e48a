use stockledger_core::Actor;

/// Acting user for a request.
///
/// Inserted by [`crate::middleware::actor_middleware`] and present for every
/// stock route; writes are stamped with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorContext {
    actor: Actor,
}

impl ActorContext {
    pub fn new(actor: Actor) -> Self {
        Self { actor }
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }
}
