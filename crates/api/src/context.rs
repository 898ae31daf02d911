use stockline_core::ActorId;

/// Who is performing the request, taken from the `x-actor-id` header.
///
/// Identity is asserted by the caller; verifying it is the job of whatever
/// sits in front of this service.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ActorContext {
    actor_id: ActorId,
}

impl ActorContext {
    pub fn new(actor_id: ActorId) -> Self {
        Self { actor_id }
    }

    pub fn actor_id(&self) -> ActorId {
        self.actor_id
    }
}
