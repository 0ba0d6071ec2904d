use rand::Rng;

const CODE_SPACE: u32 = 1_000_000;

fn random_code<R: Rng>(rng: &mut R) -> String {
    format!("{:06}", rng.gen_range(0..CODE_SPACE))
}

/// Generates a pickup code and a delivery code. The two always differ so a
/// driver cannot complete a delivery with the code shown at pickup.
pub fn generate_pair() -> (String, String) {
    let mut rng = rand::thread_rng();
    let pickup = random_code(&mut rng);
    let mut delivery = random_code(&mut rng);
    while delivery == pickup {
        delivery = random_code(&mut rng);
    }
    (pickup, delivery)
}

/// Compares a code typed by a person with the stored one, ignoring surrounding
/// whitespace. Every byte is inspected regardless of where a mismatch occurs.
pub fn matches(stored: &str, submitted: &str) -> bool {
    let submitted = submitted.trim();
    if stored.len() != submitted.len() {
        return false;
    }

    stored
        .bytes()
        .zip(submitted.bytes())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

#[cfg(test)]
mod tests {
    use super::{generate_pair, matches};

    #[test]
    fn codes_are_six_digits_and_distinct() {
        for _ in 0..200 {
            let (pickup, delivery) = generate_pair();
            assert_eq!(pickup.len(), 6);
            assert_eq!(delivery.len(), 6);
            assert!(pickup.chars().all(|c| c.is_ascii_digit()));
            assert_ne!(pickup, delivery);
        }
    }

    #[test]
    fn matching_ignores_surrounding_whitespace() {
        assert!(matches("042917", " 042917\n"));
    }

    #[test]
    fn wrong_or_partial_codes_do_not_match() {
        assert!(!matches("042917", "042918"));
        assert!(!matches("042917", "04291"));
        assert!(!matches("042917", ""));
    }
}
