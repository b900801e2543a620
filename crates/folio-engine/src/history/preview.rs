/// Monotonic token identifying one preview request
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PreviewToken(u64);

impl PreviewToken {
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Drops preview responses that were superseded before they arrived.
///
/// Every request takes a fresh token; a response is only applied if its token
/// is still the latest one issued, so out-of-order or stale responses are
/// discarded.
#[derive(Debug, Default)]
pub struct PreviewSequencer {
    latest: u64,
}

impl PreviewSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&mut self) -> PreviewToken {
        self.latest += 1;
        PreviewToken(self.latest)
    }

    pub fn is_current(&self, token: PreviewToken) -> bool {
        token.0 == self.latest
    }

    /// Hand back `response` only if `token` is still current
    pub fn accept<T>(&self, token: PreviewToken, response: T) -> Option<T> {
        if self.is_current(token) {
            Some(response)
        } else {
            log::debug!(
                "Dropping stale preview response {} (latest {})",
                token.0,
                self.latest
            );
            None
        }
    }

    /// Invalidate every outstanding request
    pub fn cancel(&mut self) {
        self.latest += 1;
    }
}
