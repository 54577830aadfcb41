//! Per-request caller identity.

use uuid::Uuid;

/// Who is making the call. Every owner-scoped operation takes one;
/// store queries filter on it, so callers can only reach their own
/// records.
#[derive(Debug, Clone, Copy)]
pub struct RequestContext {
    pub user_id: Uuid,
}

impl RequestContext {
    pub fn new(user_id: Uuid) -> Self {
        Self { user_id }
    }
}
