//! License key identity generation.

use rand::Rng;

/// Alphabet without 0/O/1/I so keys survive being read over the phone.
const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const GROUPS: usize = 4;
const GROUP_LEN: usize = 4;

/// Prefix identifying keys issued by this tool; cosmetic, not load-bearing.
const PREFIX: &str = "LK";

/// Generate a license key of the form `LK-XXXX-XXXX-XXXX-XXXX`.
///
/// 16 characters over a 32-symbol alphabet gives 2^80 possibilities, so
/// collisions are negligible at the volumes this tool manages; the unique
/// index on the keys table catches the astronomically unlikely rest.
pub fn generate_key() -> String {
    let mut rng = rand::thread_rng();
    let mut key = String::with_capacity(PREFIX.len() + GROUPS * (GROUP_LEN + 1));
    key.push_str(PREFIX);
    for _ in 0..GROUPS {
        key.push('-');
        for _ in 0..GROUP_LEN {
            key.push(ALPHABET[rng.gen_range(0..ALPHABET.len())] as char);
        }
    }
    key
}
