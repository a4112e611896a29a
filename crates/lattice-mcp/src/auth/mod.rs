//! Authentication Hook
//!
//! Per-request bearer validation consumed by the HTTP transports. The crate
//! implements no OAuth flow: hosts supply an [`AuthValidator`] and the
//! transport calls it synchronously before dispatch, short-circuiting to
//! 401/403 with the appropriate `WWW-Authenticate` header on failure.

/// Outcome of validating one `Authorization` header
#[derive(Debug, Clone, Default)]
pub struct AuthVerdict {
    /// Whether the credential was accepted
    pub valid: bool,
    /// Scopes granted to the credential
    pub scopes: Vec<String>,
    /// Authenticated principal, when known
    pub subject: Option<String>,
    /// Human-readable failure detail surfaced in `WWW-Authenticate`
    pub message: Option<String>,
}

impl AuthVerdict {
    /// Accept with the given scopes
    pub fn allow(scopes: Vec<String>) -> Self {
        Self {
            valid: true,
            scopes,
            subject: None,
            message: None,
        }
    }

    /// Reject with a description
    pub fn deny(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            scopes: Vec::new(),
            subject: None,
            message: Some(message.into()),
        }
    }
}

/// Host-supplied bearer-token validator
///
/// Called once per HTTP request with the raw `Authorization` header (or
/// `None` when absent). Implementations must be cheap and non-blocking; token
/// introspection that needs I/O belongs in a cache in front of this hook.
pub trait AuthValidator: Send + Sync {
    fn validate(&self, authorization: Option<&str>) -> AuthVerdict;
}

impl<F> AuthValidator for F
where
    F: Fn(Option<&str>) -> AuthVerdict + Send + Sync,
{
    fn validate(&self, authorization: Option<&str>) -> AuthVerdict {
        self(authorization)
    }
}

/// Settings the HTTP transport needs to enforce authentication
#[derive(Debug, Clone, Default)]
pub struct AuthRequirements {
    /// Scopes a request must hold to pass the gate
    pub required_scopes: Vec<String>,
    /// Resource metadata URL advertised in `WWW-Authenticate`
    pub resource_metadata_url: Option<String>,
}

impl AuthRequirements {
    /// `WWW-Authenticate` value for a 401 (missing/invalid credential)
    pub fn unauthenticated_challenge(&self, detail: Option<&str>) -> String {
        let mut challenge = String::from("Bearer");
        if let Some(url) = &self.resource_metadata_url {
            challenge.push_str(&format!(" resource_metadata=\"{url}\""));
        }
        if let Some(detail) = detail {
            let comma = if challenge.len() > "Bearer".len() { "," } else { "" };
            challenge.push_str(&format!("{comma} error=\"invalid_token\", error_description=\"{detail}\""));
        }
        challenge
    }

    /// `WWW-Authenticate` value for a 403 (insufficient scope)
    pub fn insufficient_scope_challenge(&self) -> String {
        format!(
            "Bearer error=\"insufficient_scope\", scope=\"{}\"",
            self.required_scopes.join(" ")
        )
    }

    /// Whether the verdict's scopes satisfy the requirements
    pub fn scopes_satisfied(&self, granted: &[String]) -> bool {
        self.required_scopes
            .iter()
            .all(|needed| granted.iter().any(|s| s == needed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_validator() {
        let validator = |header: Option<&str>| match header {
            Some("Bearer good") => AuthVerdict::allow(vec!["mcp:read".into()]),
            _ => AuthVerdict::deny("unknown token"),
        };

        assert!(validator.validate(Some("Bearer good")).valid);
        assert!(!validator.validate(Some("Bearer bad")).valid);
        assert!(!validator.validate(None).valid);
    }

    #[test]
    fn test_scope_gate() {
        let requirements = AuthRequirements {
            required_scopes: vec!["mcp:read".into(), "mcp:write".into()],
            resource_metadata_url: None,
        };

        assert!(requirements.scopes_satisfied(&["mcp:write".into(), "mcp:read".into()]));
        assert!(!requirements.scopes_satisfied(&["mcp:read".into()]));
    }

    #[test]
    fn test_challenges() {
        let requirements = AuthRequirements {
            required_scopes: vec!["mcp:read".into()],
            resource_metadata_url: Some("https://rs.example/.well-known/oauth".into()),
        };

        let challenge = requirements.unauthenticated_challenge(Some("expired"));
        assert!(challenge.starts_with("Bearer"));
        assert!(challenge.contains("resource_metadata"));
        assert!(challenge.contains("expired"));

        let scope_hint = requirements.insufficient_scope_challenge();
        assert!(scope_hint.contains("insufficient_scope"));
        assert!(scope_hint.contains("mcp:read"));
    }
}
