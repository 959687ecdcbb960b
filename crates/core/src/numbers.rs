//! Human-readable document numbers.
//!
//! Numbers look like `ORD-20250601-K7MXQ2`: a prefix, the UTC date, and six
//! random characters drawn from an alphabet without `0/O` or `1/I/L`, so they
//! can be read out over the phone. Uniqueness is enforced by the database;
//! callers retry on the rare conflict.

use chrono::{DateTime, Utc};
use rand::Rng;

/// Characters used for the random suffix.
pub const ALPHABET: &[u8] = b"23456789ABCDEFGHJKMNPQRSTUVWXYZ";

/// Length of the random suffix.
pub const SUFFIX_LEN: usize = 6;

/// Kinds of numbered documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Order,
    Quote,
    Return,
    Warranty,
}

impl DocumentKind {
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Order => "ORD",
            Self::Quote => "QUO",
            Self::Return => "RMA",
            Self::Warranty => "WAR",
        }
    }
}

/// Generate a document number for `kind` dated `now`.
#[must_use]
pub fn generate(kind: DocumentKind, now: DateTime<Utc>) -> String {
    generate_with(kind, now, &mut rand::rng())
}

/// Generate a document number with a caller-supplied RNG.
pub fn generate_with<R: Rng>(kind: DocumentKind, now: DateTime<Utc>, rng: &mut R) -> String {
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| {
            let idx = rng.random_range(0..ALPHABET.len());
            ALPHABET.get(idx).copied().map_or('X', char::from)
        })
        .collect();
    format!("{}-{}-{suffix}", kind.prefix(), now.format("%Y%m%d"))
}

/// Check that `input` looks like a number of `kind`.
///
/// Used to reject obviously malformed lookups before touching the database.
#[must_use]
pub fn is_well_formed(kind: DocumentKind, input: &str) -> bool {
    let mut parts = input.split('-');
    let (Some(prefix), Some(date), Some(suffix), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    prefix == kind.prefix()
        && date.len() == 8
        && date.bytes().all(|b| b.is_ascii_digit())
        && suffix.len() == SUFFIX_LEN
        && suffix.bytes().all(|b| ALPHABET.contains(&b))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    #[test]
    fn test_format() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 9, 30, 0).unwrap();
        let number = generate(DocumentKind::Order, now);
        assert!(number.starts_with("ORD-20250601-"));
        assert_eq!(number.len(), "ORD-20250601-".len() + SUFFIX_LEN);
        assert!(is_well_formed(DocumentKind::Order, &number));
        assert!(!is_well_formed(DocumentKind::Quote, &number));
    }

    #[test]
    fn test_prefixes() {
        let now = Utc::now();
        assert!(generate(DocumentKind::Quote, now).starts_with("QUO-"));
        assert!(generate(DocumentKind::Return, now).starts_with("RMA-"));
        assert!(generate(DocumentKind::Warranty, now).starts_with("WAR-"));
    }

    #[test]
    fn test_deterministic_with_seed() {
        let now = Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap();
        let a = generate_with(DocumentKind::Return, now, &mut StdRng::seed_from_u64(7));
        let b = generate_with(DocumentKind::Return, now, &mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
    }

    #[test]
    fn test_suffix_avoids_ambiguous_characters() {
        let now = Utc::now();
        for _ in 0..200 {
            let number = generate(DocumentKind::Order, now);
            let suffix = number.rsplit('-').next().unwrap();
            assert!(!suffix.contains(['0', 'O', '1', 'I', 'L']));
        }
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(!is_well_formed(DocumentKind::Order, "ORD-2025-ABCDEF"));
        assert!(!is_well_formed(DocumentKind::Order, "ORD-20250601-ABC0EF"));
        assert!(!is_well_formed(DocumentKind::Order, "ORD-20250601-ABCDEF-X"));
        assert!(!is_well_formed(DocumentKind::Order, ""));
    }
}
