//! Domain-list lookup, the non-core helper spec.md section 1 calls out as
//! "purely test code for domain-list lookup helpers — non-core and
//! omitted" but still needed to answer "does this domain exist" during
//! path decomposition (spec.md section 4.F: "Missing domain →
//! Domain-Not-Found"). Grounded in the domain-list helpers exercised by
//! `original_source/src/tests/cmocka/test_utils.c`.

use crate::config::DomainConfig;

/// Looks up a configured domain by name among the daemon's configured
/// domain list.
pub fn find_domain<'a>(domains: &'a [DomainConfig], name: &str) -> Option<&'a DomainConfig> {
    domains.iter().find(|d| d.name == name)
}

#[cfg(test)]
mod test {
    use super::*;

    fn domains() -> Vec<DomainConfig> {
        vec![
            DomainConfig { name: "dom".to_string() },
            DomainConfig { name: "other".to_string() },
        ]
    }

    #[test]
    fn finds_configured_domain() {
        let domains = domains();
        assert!(find_domain(&domains, "dom").is_some());
        assert!(find_domain(&domains, "nonexistent").is_none());
    }
}
