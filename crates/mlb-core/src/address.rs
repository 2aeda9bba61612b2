//! Address normalization before membership or ban operations.

use tracing::{debug, warn};

use crate::ports::ListService;

/// Where a resolved address came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Source {
    /// Primary address of a directory account.
    Directory,
    /// Taken literally; the domain differs from the default so no lookup ran,
    /// or the directory has no such account.
    Literal,
    /// Directory lookup failed; fell back to the literal address.
    Degraded(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolved {
    pub address: String,
    pub source: Source,
}

/// Split `raw` into local part and domain, defaulting the domain.
pub fn split_address<'a>(raw: &'a str, default_domain: &'a str) -> (&'a str, &'a str) {
    match raw.rsplit_once('@') {
        Some((local, domain)) => (local, domain),
        None => (raw, default_domain),
    }
}

/// Resolve a raw address or bare local part to a canonical address.
///
/// Never fails: lookup errors degrade to `local@domain` and are logged.
pub async fn resolve(service: &dyn ListService, raw: &str, default_domain: &str) -> Resolved {
    let raw = raw.trim();
    let (local, domain) = split_address(raw, default_domain);
    let literal = format!("{local}@{domain}");

    if !domain.eq_ignore_ascii_case(default_domain) || local.is_empty() {
        return Resolved {
            address: literal,
            source: Source::Literal,
        };
    }

    match service.find_account(local).await {
        Ok(Some(account)) => match account.addresses.into_iter().next() {
            Some(primary) => Resolved {
                address: primary,
                source: Source::Directory,
            },
            None => {
                debug!(local, "directory account has no addresses; using literal");
                Resolved {
                    address: literal,
                    source: Source::Literal,
                }
            }
        },
        Ok(None) => {
            debug!(local, "no directory account; using literal");
            Resolved {
                address: literal,
                source: Source::Literal,
            }
        }
        Err(e) => {
            warn!(local, error = %e, "directory lookup failed; using literal address");
            Resolved {
                address: literal,
                source: Source::Degraded(e.to_string()),
            }
        }
    }
}
