use std::collections::BTreeSet;

use serde::Serialize;
use stacks_http::AppError;

/// An authenticated caller and the capabilities it holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub username: String,
    pub capabilities: BTreeSet<String>,
}

impl Principal {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            capabilities: BTreeSet::new(),
        }
    }

    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.insert(capability.into());
        self
    }

    pub fn has(&self, capability: &str) -> bool {
        self.capabilities.contains(capability)
    }

    /// 403 unless the caller holds `capability`.
    pub fn require(&self, capability: &str) -> Result<(), AppError> {
        if self.has(capability) {
            Ok(())
        } else {
            tracing::info!(user = %self.username, capability, "capability check failed");
            Err(AppError::forbidden(format!(
                "'{}' lacks capability '{}'",
                self.username, capability
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_checks_capabilities() {
        let librarian = Principal::new("lib").with_capability("catalog.can_mark_returned");
        assert!(librarian.require("catalog.can_mark_returned").is_ok());

        let err = librarian.require("catalog.delete_book").unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::FORBIDDEN);
    }
}
