//! Human-readable reference numbers of transactions.

use rand::Rng;

/// Symbols a reference number body is drawn from.
///
/// Excludes `0`, `1`, `I` and `O` as easily confused ones.
pub const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Length of a reference number body.
pub const LENGTH: usize = 8;

/// Draws a new random `{prefix}-{body}` reference number.
pub fn draw<R: Rng + ?Sized>(prefix: &str, rng: &mut R) -> String {
    let mut out = String::with_capacity(prefix.len() + 1 + LENGTH);
    out.push_str(prefix);
    out.push('-');
    out.extend(
        (0..LENGTH)
            .map(|_| char::from(ALPHABET[rng.gen_range(0..ALPHABET.len())])),
    );
    out
}

/// Checks whether the provided string is a `{prefix}-{body}` reference
/// number.
#[must_use]
pub fn is_valid(prefix: &str, s: &str) -> bool {
    s.strip_prefix(prefix)
        .and_then(|s| s.strip_prefix('-'))
        .is_some_and(|body| {
            body.len() == LENGTH && body.bytes().all(|b| ALPHABET.contains(&b))
        })
}

#[cfg(test)]
mod spec {
    use rand::{rngs::StdRng, SeedableRng as _};

    use super::{draw, is_valid};

    #[test]
    fn draws_valid_references() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..100 {
            let r = draw("BK", &mut rng);
            assert!(is_valid("BK", &r), "invalid reference: {r}");
            assert!(!is_valid("SL", &r));
        }
    }

    #[test]
    fn rejects_malformed() {
        assert!(is_valid("SL", "SL-ABCD2345"));
        assert!(!is_valid("SL", "SL-ABCD234"));
        assert!(!is_valid("SL", "SL-ABCD23450"));
        assert!(!is_valid("SL", "SL-ABCD234O"));
        assert!(!is_valid("SL", "SLABCD2345"));
        assert!(!is_valid("SL", "sl-ABCD2345"));
    }
}
