use std::fmt;

/// Errors raised before any remote work starts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid repo format: {0:?}, expected 'owner/repo'")]
    InvalidRepo(String),
}

/// A GitHub repository identifier in `owner/repo` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoId {
    full: String,
    split: usize,
}

impl RepoId {
    /// Strict parse: exactly one `/` with a non-empty segment on each side.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidRepo(s.to_owned());
        let split = s.find('/').ok_or_else(invalid)?;
        let (owner, name) = (&s[..split], &s[split + 1..]);

        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return Err(invalid());
        }

        Ok(Self {
            full: s.to_owned(),
            split,
        })
    }

    /// Lenient parse used when a person typed the repository in.
    ///
    /// Accepts `[http[s]://][www.]github.com/owner/repo[/...]` (extra
    /// segments are dropped) or a bare `owner/repo`. Returns `None` when neither form
    /// yields two non-empty segments.
    pub fn normalize(input: &str) -> Option<Self> {
        if input.contains("github.com") {
            let rest = input.trim();
            let rest = rest
                .strip_prefix("https://")
                .or_else(|| rest.strip_prefix("http://"))
                .unwrap_or(rest);
            let rest = rest.strip_prefix("www.").unwrap_or(rest);
            let rest = rest.strip_prefix("github.com").unwrap_or(rest);
            let mut parts = rest.trim_matches('/').split('/');
            let owner = parts.next().filter(|p| !p.is_empty())?;
            let name = parts.next().filter(|p| !p.is_empty())?;
            return Self::parse(&format!("{owner}/{name}")).ok();
        }

        let trimmed = input.trim();
        let parts: Vec<&str> = trimmed.split('/').collect();
        if parts.len() == 2 && parts.iter().all(|p| !p.trim().is_empty()) {
            return Self::parse(trimmed).ok();
        }

        None
    }

    pub fn owner(&self) -> &str {
        &self.full[..self.split]
    }

    pub fn name(&self) -> &str {
        &self.full[self.split + 1..]
    }

    pub fn as_str(&self) -> &str {
        &self.full
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full)
    }
}

impl std::str::FromStr for RepoId {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
