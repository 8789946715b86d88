//! Random Indonesian mobile numbers, for filling test contact lists.

use rand::seq::SliceRandom;
use rand::Rng;

/// Upper bound accepted by `GET /api/numbers/random`.
pub const MAX_GENERATED: usize = 1000;

/// Mobile operator prefixes (Telkomsel, Indosat, XL, Axis, Tri, Smartfren).
const OPERATOR_PREFIXES: &[&str] = &[
    "0811", "0812", "0813", "0821", "0822", "0823", "0851", "0852", "0853", // Telkomsel
    "0814", "0815", "0816", "0855", "0856", "0857", "0858", // Indosat
    "0817", "0818", "0819", "0859", "0877", "0878", // XL
    "0831", "0832", "0833", "0838", // Axis
    "0895", "0896", "0897", "0898", "0899", // Tri
    "0881", "0882", "0883", "0884", "0885", "0886", "0887", "0888", "0889", // Smartfren
];

/// Generate `count` numbers with the thread-local RNG.
pub fn generate_numbers(count: usize) -> Vec<String> {
    generate_numbers_with(&mut rand::thread_rng(), count)
}

/// Each number is a random operator prefix padded with random digits
/// to a total length of 11 to 13.
pub fn generate_numbers_with<R: Rng + ?Sized>(rng: &mut R, count: usize) -> Vec<String> {
    (0..count)
        .map(|_| {
            let prefix = OPERATOR_PREFIXES.choose(rng).copied().unwrap_or("0812");
            let len = rng.gen_range(11..=13);
            let mut number = String::with_capacity(len);
            number.push_str(prefix);
            while number.len() < len {
                number.push(char::from(b'0' + rng.gen_range(0..10u8)));
            }
            number
        })
        .collect()
}
