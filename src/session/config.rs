use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for a wallet session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Upper bound on waiting for the user to answer a connect or sign
    /// prompt. `None` waits indefinitely, which is what the providers do.
    pub request_timeout: Option<Duration>,

    /// Query the wallet once at start-up for an already-authorized account
    pub restore_on_start: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            request_timeout: None,
            restore_on_start: true,
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interactive preset: give the user two minutes per prompt.
    pub fn interactive() -> Self {
        Self {
            request_timeout: Some(Duration::from_secs(120)),
            restore_on_start: true,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn with_restore_on_start(mut self, restore: bool) -> Self {
        self.restore_on_start = restore;
        self
    }
}
