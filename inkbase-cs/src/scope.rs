//! Owner scope threaded into every owner-side operation

use uuid::Uuid;

/// The authenticated owner an operation acts for
///
/// Built by the HTTP layer from the upstream authenticator's header, or
/// directly by callers embedding the engine. Every query that reads or
/// writes customers, consents or tokens is filtered by `owner_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnerScope {
    pub owner_id: Uuid,
}

impl OwnerScope {
    pub fn new(owner_id: Uuid) -> Self {
        Self { owner_id }
    }
}
