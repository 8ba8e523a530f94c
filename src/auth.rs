/*!
Password hashing and generation of salts and session keys.

The database side of authentication (looking users up, checking their
passwords, issuing and checking session keys) lives in `store`.
*/
use pbkdf2::pbkdf2_hmac;
use rand::{Rng, distributions};
use sha2::Sha256;

use crate::user::User;

pub const SALT_LENGTH: usize = 16;
pub const KEY_LENGTH: usize = 32;

/// PBKDF2 iterations for newly-hashed passwords. Stored hashes carry their
/// own count, so raising this doesn't invalidate existing accounts.
pub const PBKDF2_ROUNDS: u32 = 600_000;
const HASH_SCHEME: &str = "pbkdf2_sha256";
const DERIVED_LENGTH: usize = 32;

const TOKEN_CHARS: &[char] = &[
    'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm',
    'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M',
    'N', 'O', 'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z',
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9',
];

#[derive(Debug, PartialEq)]
pub enum AuthResult {
    Ok(User),
    BadPassword,
    NoSuchUser,
}

/// Generate a random alphanumeric token of the given length.
///
/// Used for both password salts and session keys.
pub fn generate_token(length: usize) -> String {
    // TOKEN_CHARS is a nonempty constant.
    let dist = distributions::Slice::new(TOKEN_CHARS).unwrap();
    let rng = rand::thread_rng();
    rng.sample_iter(&dist)
        .take(length)
        .collect()
}

pub fn generate_salt() -> String { generate_token(SALT_LENGTH) }

pub fn generate_key() -> String { generate_token(KEY_LENGTH) }

/**
PBKDF2-HMAC-SHA256 of `password` with `salt`, as
`pbkdf2_sha256$<rounds>$<hex digest>`.

This is slow on purpose; async callers should run it on a blocking thread.
*/
pub fn hash_password(password: &str, salt: &str) -> String {
    hash_with_rounds(password, salt, PBKDF2_ROUNDS)
}

fn hash_with_rounds(password: &str, salt: &str, rounds: u32) -> String {
    let mut derived = [0u8; DERIVED_LENGTH];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt.as_bytes(), rounds, &mut derived);
    format!("{}${}${}", HASH_SCHEME, rounds, hex::encode(derived))
}

/// Iteration count of a stored hash, if it's one `hash_password()` made.
fn stored_rounds(hash: &str) -> Option<u32> {
    let mut parts = hash.split('$');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(HASH_SCHEME), Some(n), Some(_), None) => match n.parse() {
            Ok(0) | Err(_) => None,
            Ok(n) => Some(n),
        },
        _ => None,
    }
}

pub fn verify_password(password: &str, user: &User) -> bool {
    let rounds = match stored_rounds(&user.hash) {
        Some(n) => n,
        None => {
            log::warn!("User {:?} has an unrecognized password hash.", &user.uname);
            return false;
        },
    };

    let hash = hash_with_rounds(password, &user.salt, rounds);
    // Compare every byte so timing doesn't depend on where they differ.
    hash.len() == user.hash.len()
        && hash.bytes()
            .zip(user.hash.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b)) == 0
}

/// Whether a string could be a key issued by `generate_key()`.
///
/// Lets us skip a database round trip for garbage cookie values.
pub fn plausible_key(key: &str) -> bool {
    key.len() == KEY_LENGTH && key.chars().all(|c| c.is_ascii_alphanumeric())
}
