//! Container identifier generation and prefix resolution (spec §3, §4.1).

use rand::RngCore;

/// Generate a random 64-hex-character container identifier.
pub fn generate_container_id() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Resolve a reference (a short identifier prefix, minimum 4 characters, or a
/// full identifier) against a list of candidate full identifiers.
///
/// Returns `None` if nothing matches, `Some(Ok(id))` on a unique match, and
/// `Some(Err(matches))` when more than one candidate shares the prefix.
pub fn resolve_prefix<'a>(ref_: &str, candidates: impl Iterator<Item = &'a str>) -> PrefixMatch<'a> {
    if ref_.len() < 4 {
        // Still allow an exact match shorter than 4 chars (e.g. a full name).
        let exact: Vec<&str> = candidates.filter(|c| *c == ref_).collect();
        return match exact.len() {
            0 => PrefixMatch::None,
            1 => PrefixMatch::Unique(exact[0]),
            _ => PrefixMatch::Ambiguous(exact),
        };
    }

    let matches: Vec<&str> = candidates.filter(|c| c.starts_with(ref_)).collect();
    match matches.len() {
        0 => PrefixMatch::None,
        1 => PrefixMatch::Unique(matches[0]),
        _ => PrefixMatch::Ambiguous(matches),
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum PrefixMatch<'a> {
    None,
    Unique(&'a str),
    Ambiguous(Vec<&'a str>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_64_hex_chars() {
        let id = generate_container_id();
        assert_eq!(id.len(), 64);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn generated_ids_are_not_trivially_repeated() {
        assert_ne!(generate_container_id(), generate_container_id());
    }

    #[test]
    fn unique_prefix_resolves() {
        let ids = vec!["abcd1234", "ef001234"];
        assert_eq!(
            resolve_prefix("abcd", ids.into_iter()),
            PrefixMatch::Unique("abcd1234")
        );
    }

    #[test]
    fn ambiguous_prefix_is_reported() {
        let ids = vec!["abcd1111", "abcd2222"];
        match resolve_prefix("abcd", ids.into_iter()) {
            PrefixMatch::Ambiguous(m) => assert_eq!(m.len(), 2),
            other => panic!("expected Ambiguous, got {:?}", other),
        }
    }

    #[test]
    fn short_prefix_requires_exact_match() {
        let ids = vec!["abc", "abcdef"];
        assert_eq!(resolve_prefix("abc", ids.into_iter()), PrefixMatch::Unique("abc"));
    }

    #[test]
    fn no_match_returns_none() {
        let ids = vec!["abcd1234"];
        assert_eq!(resolve_prefix("zzzz", ids.into_iter()), PrefixMatch::None);
    }
}
