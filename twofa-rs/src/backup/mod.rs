//! Backup code manager
//!
//! Pre-generated single-use recovery codes substituting for a TOTP code.
//! Five codes per (re)issue, replaced wholesale on regeneration. Atomic
//! consumption lives in the credential store; the helpers here are pure.

use rand::Rng;

/// Codes issued per (re)generation.
pub const BACKUP_CODE_COUNT: usize = 5;

/// Length of each code.
const CODE_LEN: usize = 8;

const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Generate `count` distinct recovery codes.
pub fn generate(count: usize) -> Vec<String> {
    let mut codes: Vec<String> = Vec::with_capacity(count);
    while codes.len() < count {
        let code = generate_code();
        if !codes.contains(&code) {
            codes.push(code);
        }
    }
    codes
}

/// Generate a random 8-character uppercase alphanumeric code.
fn generate_code() -> String {
    let mut rng = rand::thread_rng();

    (0..CODE_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}

/// Remove `submitted` from `codes`, returning the remaining list, or
/// `None` when the code is not present. Removes exactly one entry.
pub fn remove_code(codes: &[String], submitted: &str) -> Option<Vec<String>> {
    let pos = codes.iter().position(|c| c == submitted)?;
    let mut remaining = codes.to_vec();
    remaining.remove(pos);
    Some(remaining)
}

/// Plain-text download artifact: one code per line.
pub fn artifact(codes: &[String]) -> String {
    codes.join("\n")
}
