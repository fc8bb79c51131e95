use crate::ChangeKind;

/// Resume position of the watch plus the first-sync marker.
///
/// Owned and mutated only by the supervisor. The token is never reset while
/// the process lives; a fresh cursor (empty token) only exists at startup.
#[derive(Debug, Clone)]
pub struct ResumeCursor {
    token: String,
    first_sync: bool,
}

impl Default for ResumeCursor {
    fn default() -> Self {
        Self {
            token: String::new(),
            first_sync: true,
        }
    }
}

impl ResumeCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last observed resume token; empty means "from now".
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn is_first_sync(&self) -> bool {
        self.first_sync
    }

    /// Remembers `resume_token` unless it is empty.
    pub fn observe(
        &mut self,
        resume_token: &str,
    ) {
        if !resume_token.is_empty() {
            self.token.clear();
            self.token.push_str(resume_token);
        }
    }

    /// The initial enumeration is presented uniformly as additions.
    pub fn next_event_kind_for(
        &self,
        raw_kind: ChangeKind,
    ) -> ChangeKind {
        if self.first_sync {
            ChangeKind::Added
        } else {
            raw_kind
        }
    }

    /// Irreversible.
    pub fn mark_first_sync_done(&mut self) {
        self.first_sync = false;
    }
}
