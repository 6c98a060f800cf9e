//! Cookie envelope and `Set-Cookie` rendering.
//!
//! All gateway state lives in client-held cookies, so this module defines the
//! one envelope every component shares: a name, an opaque value, and the
//! attribute set the original handlers emit (Max-Age, Path, HttpOnly, Secure,
//! SameSite).

use std::fmt;

/// SameSite policy for a cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strict => write!(f, "Strict"),
            Self::Lax => write!(f, "Lax"),
            Self::None => write!(f, "None"),
        }
    }
}

/// A cookie ready to be attached to a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub max_age: i64,
    pub path: String,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: SameSite,
}

impl Cookie {
    /// Build a cookie with the gateway's standard attributes.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>, max_age: i64) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            max_age,
            path: "/".to_string(),
            http_only: true,
            secure: true,
            same_site: SameSite::Lax,
        }
    }

    /// Build a Max-Age=0 clear instruction for the named cookie.
    #[must_use]
    pub fn clearing(name: impl Into<String>) -> Self {
        Self::new(name, "", 0)
    }

    /// Disable the HttpOnly attribute (the CSRF cookie must be readable by
    /// browser scripts).
    #[must_use]
    pub fn script_readable(mut self) -> Self {
        self.http_only = false;
        self
    }

    /// Toggle the Secure attribute per configuration.
    #[must_use]
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Render the `Set-Cookie` header value.
    #[must_use]
    pub fn to_header_value(&self) -> String {
        let mut out = format!("{}={}", self.name, urlencoding::encode(&self.value));
        out.push_str(&format!("; Max-Age={}", self.max_age));
        if !self.path.is_empty() {
            out.push_str(&format!("; Path={}", self.path));
        }
        if self.http_only {
            out.push_str("; HttpOnly");
        }
        if self.secure {
            out.push_str("; Secure");
        }
        out.push_str(&format!("; SameSite={}", self.same_site));
        out
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for cookie rendering.
    use super::*;

    #[test]
    fn renders_all_attributes() {
        let cookie = Cookie::new("session", "abc123", 3600);
        assert_eq!(
            cookie.to_header_value(),
            "session=abc123; Max-Age=3600; Path=/; HttpOnly; Secure; SameSite=Lax"
        );
    }

    #[test]
    fn clearing_cookie_has_zero_max_age_and_empty_value() {
        let cookie = Cookie::clearing("session");
        let rendered = cookie.to_header_value();
        assert!(rendered.starts_with("session=; Max-Age=0"));
    }

    #[test]
    fn script_readable_drops_http_only() {
        let cookie = Cookie::new("CSRF-TOKEN", "deadbeef", 600).script_readable();
        assert!(!cookie.to_header_value().contains("HttpOnly"));
    }

    #[test]
    fn insecure_mode_drops_secure_attribute() {
        let cookie = Cookie::new("session", "v", 60).with_secure(false);
        assert!(!cookie.to_header_value().contains("Secure"));
    }

    #[test]
    fn value_is_url_encoded() {
        let cookie = Cookie::new("session", "a=b; c", 60);
        assert!(cookie.to_header_value().starts_with("session=a%3Db%3B%20c"));
    }
}
