use super::RecordId;

/// Per-interaction state owned by a front end and passed into service calls.
///
/// Nothing here survives the process; a fresh session is unauthenticated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    authenticated: bool,
    /// Existing record a duplicate submission was routed to, awaiting amendment.
    pub pending_amendment: Option<RecordId>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub(crate) fn grant(&mut self) {
        self.authenticated = true;
    }

    pub fn logout(&mut self) {
        self.authenticated = false;
    }

    /// Take the pending amendment target, clearing it.
    pub fn take_pending_amendment(&mut self) -> Option<RecordId> {
        self.pending_amendment.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_new_session_is_unauthenticated() {
        let session = Session::new();
        assert!(!session.is_authenticated());
        assert!(session.pending_amendment.is_none());
    }

    #[test]
    fn test_logout_clears_flag() {
        let mut session = Session::new();
        session.grant();
        assert!(session.is_authenticated());
        session.logout();
        assert!(!session.is_authenticated());
    }

    #[test]
    fn test_take_pending_amendment() {
        let mut session = Session::new();
        let id = Uuid::new_v4();
        session.pending_amendment = Some(id);
        assert_eq!(session.take_pending_amendment(), Some(id));
        assert_eq!(session.take_pending_amendment(), None);
    }
}
