//! Logo helper
//!
//! `@logo:<ULID>` in action values. The argument is a 26-character
//! Crockford Base32 ULID identifying a cached logo asset.
//!
//! Resolution is deliberately staged: while rules are applied the helper
//! stays deferred (its own syntax is the return value), and a later
//! pipeline stage that knows the serving base URL and the logo store
//! resolves it to a URL. An invalid ULID resolves to the empty string,
//! which drops the field.

use std::sync::Arc;

use tracing::debug;
use ulid::Ulid;

use crate::errors::HelperError;
use crate::helpers::Helper;

/// Call-out into the logo store. Synchronous; errors propagate to the
/// rule processor's caller.
pub trait LogoAssetResolver: Send + Sync {
    fn exists(&self, id: &Ulid) -> Result<bool, HelperError>;
}

pub struct LogoHelper {
    base_url: Option<String>,
    resolver: Option<Arc<dyn LogoAssetResolver>>,
    deferred: bool,
}

impl LogoHelper {
    /// Deferred mode: valid references are returned unchanged as
    /// `@logo:<ULID>` for a later stage to resolve.
    pub fn deferred() -> Self {
        Self {
            base_url: None,
            resolver: None,
            deferred: true,
        }
    }

    /// Resolving mode: produce `/api/v1/logos/<ULID>` paths, absolute when
    /// a base URL is configured.
    pub fn resolving(base_url: Option<String>, resolver: Option<Arc<dyn LogoAssetResolver>>) -> Self {
        Self {
            base_url,
            resolver,
            deferred: false,
        }
    }

    fn parse_ulid(raw: &str) -> Option<Ulid> {
        if raw.len() != 26 {
            return None;
        }
        // Crockford Base32, case-insensitive, excluding I, L, O and U.
        let upper = raw.to_ascii_uppercase();
        let valid = upper.bytes().all(|b| {
            matches!(b, b'0'..=b'9' | b'A'..=b'H' | b'J' | b'K' | b'M' | b'N' | b'P'..=b'T' | b'V'..=b'Z')
        });
        if !valid {
            return None;
        }
        Ulid::from_string(&upper).ok()
    }

    fn render(&self, id: &Ulid) -> String {
        if self.deferred {
            return format!("@logo:{id}");
        }
        match &self.base_url {
            Some(base) => format!("{}/api/v1/logos/{id}", base.trim_end_matches('/')),
            None => format!("/api/v1/logos/{id}"),
        }
    }
}

impl Helper for LogoHelper {
    fn name(&self) -> &str {
        "logo"
    }

    fn process(&self, args: &str) -> Result<String, HelperError> {
        let Some(id) = Self::parse_ulid(args.trim()) else {
            debug!("dropping logo reference with invalid ULID '{args}'");
            return Ok(String::new());
        };

        if let Some(resolver) = &self.resolver {
            if !resolver.exists(&id)? {
                return Ok(String::new());
            }
        }

        Ok(self.render(&id))
    }
}
