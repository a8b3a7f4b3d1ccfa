use std::collections::{BTreeSet, HashMap};
use std::io;
use std::path::Path;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("failed to read policy file {path}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error("policy line {line}: {reason}")]
    Malformed { line: u64, reason: String },
}

/// Capability grants, casbin style.
///
/// ```text
/// # subject, capability
/// p, librarian, catalog.can_mark_returned
/// # user, role
/// g, alice, librarian
/// ```
///
/// A user holds the capabilities granted to them directly plus those of each
/// role they are assigned (one level deep).
#[derive(Debug, Clone, Default)]
pub struct Policy {
    grants: HashMap<String, BTreeSet<String>>,
    roles: HashMap<String, BTreeSet<String>>,
}

impl Policy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(mut self, subject: impl Into<String>, capability: impl Into<String>) -> Self {
        self.grants
            .entry(subject.into())
            .or_default()
            .insert(capability.into());
        self
    }

    pub fn assign(mut self, user: impl Into<String>, role: impl Into<String>) -> Self {
        self.roles.entry(user.into()).or_default().insert(role.into());
        self
    }

    pub fn capabilities_of(&self, user: &str) -> BTreeSet<String> {
        let mut capabilities = self.grants.get(user).cloned().unwrap_or_default();
        for role in self.roles.get(user).into_iter().flatten() {
            if let Some(granted) = self.grants.get(role) {
                capabilities.extend(granted.iter().cloned());
            }
        }
        capabilities
    }

    /// Load from a file. A missing file yields an empty policy.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PolicyError> {
        let path = path.as_ref();
        match std::fs::File::open(path) {
            Ok(file) => {
                let policy = Self::from_reader(file)?;
                tracing::info!(path = %path.display(), subjects = policy.grants.len(), "capability policy loaded");
                Ok(policy)
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "no capability policy found; no caller holds any capability");
                Ok(Self::default())
            }
            Err(source) => Err(PolicyError::Io {
                path: path.display().to_string(),
                source,
            }),
        }
    }

    pub fn from_reader<R: io::Read>(reader: R) -> Result<Self, PolicyError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .comment(Some(b'#'))
            .from_reader(reader);

        let mut policy = Self::default();
        for record in reader.records() {
            let record = record?;
            let line = record.position().map(|p| p.line()).unwrap_or_default();
            let field = |index: usize| -> Result<String, PolicyError> {
                match record.get(index) {
                    Some(value) if !value.is_empty() => Ok(value.to_string()),
                    _ => Err(PolicyError::Malformed {
                        line,
                        reason: format!("missing field {}", index + 1),
                    }),
                }
            };

            match record.get(0) {
                Some("p") => policy = policy.grant(field(1)?, field(2)?),
                Some("g") => policy = policy.assign(field(1)?, field(2)?),
                Some("") | None => continue,
                Some(other) => {
                    return Err(PolicyError::Malformed {
                        line,
                        reason: format!("unknown rule type '{other}'"),
                    })
                }
            }
        }

        Ok(policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLICY: &str = "\
# librarians manage loans
p, librarian, catalog.can_mark_returned
p, carol, catalog.add_author
g, alice, librarian
g, carol, librarian
";

    #[test]
    fn role_capabilities_are_inherited() {
        let policy = Policy::from_reader(POLICY.as_bytes()).unwrap();

        assert!(policy
            .capabilities_of("alice")
            .contains("catalog.can_mark_returned"));

        let carol = policy.capabilities_of("carol");
        assert!(carol.contains("catalog.add_author"));
        assert!(carol.contains("catalog.can_mark_returned"));

        assert!(policy.capabilities_of("bob").is_empty());
    }

    #[test]
    fn unknown_rule_type_is_rejected() {
        let err = Policy::from_reader("x, alice, anything\n".as_bytes()).unwrap_err();
        assert!(matches!(err, PolicyError::Malformed { line: 1, .. }));
    }

    #[test]
    fn incomplete_rule_is_rejected() {
        let err = Policy::from_reader("p, alice\n".as_bytes()).unwrap_err();
        assert!(matches!(err, PolicyError::Malformed { .. }));
    }

    #[test]
    fn missing_file_is_an_empty_policy() {
        let policy = Policy::load("/nonexistent/stacks/policy.csv").unwrap();
        assert!(policy.capabilities_of("alice").is_empty());
    }
}
