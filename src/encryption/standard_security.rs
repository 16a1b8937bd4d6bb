//! Standard security handler, revisions 2-4 (ISO 32000-1 §7.6.3.3): RC4/MD5
//! key derivation, U/O computation and authentication, per-object keys.

use md5::{Digest, Md5};

use super::rc4;

/// The fixed 32-byte padding string used to pad/truncate passwords (Algorithm 2, step a).
pub const PADDING: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01, 0x08, 0x2E, 0x2E, 0x00,
    0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53, 0x69, 0x7A,
];

pub fn pad_password(password: &[u8]) -> [u8; 32] {
    let mut padded = [0u8; 32];
    let n = password.len().min(32);
    padded[..n].copy_from_slice(&password[..n]);
    padded[n..].copy_from_slice(&PADDING[..32 - n]);
    padded
}

/// Algorithm 2: compute the file encryption key from the (padded) user
/// password, the stored `O` entry, permission flags `P`, the first
/// document ID string, revision, and key length in bytes.
pub fn compute_encryption_key(
    password: &[u8], o: &[u8], p: i32, id0: &[u8], r: i64, key_len: usize, encrypt_metadata: bool,
) -> Vec<u8> {
    let padded = pad_password(password);
    let mut hasher = Md5::new();
    hasher.update(padded);
    hasher.update(o);
    hasher.update(p.to_le_bytes());
    hasher.update(id0);
    if r >= 4 && !encrypt_metadata {
        hasher.update([0xFF, 0xFF, 0xFF, 0xFF]);
    }
    let mut hash = hasher.finalize().to_vec();

    let n = if r == 2 { 5 } else { key_len.clamp(5, 16) };
    if r >= 3 {
        for _ in 0..50 {
            hash = Md5::digest(&hash[..n]).to_vec();
        }
    }
    hash.truncate(n);
    hash
}

/// Algorithm 4 (R2) / Algorithm 5 (R3-R4): compute the `U` value from the
/// file key and the first document ID string.
pub fn compute_u(file_key: &[u8], id0: &[u8], r: i64) -> Vec<u8> {
    if r == 2 {
        return rc4::apply(file_key, &PADDING);
    }

    let mut hasher = Md5::new();
    hasher.update(PADDING);
    hasher.update(id0);
    let mut hash = hasher.finalize().to_vec();

    for i in 0u8..20 {
        let round_key: Vec<u8> = file_key.iter().map(|&b| b ^ i).collect();
        hash = rc4::apply(&round_key, &hash);
    }
    hash
}

/// Authenticate a candidate user password against the stored `U` entry.
/// Only the first 16 bytes of `U` are meaningful for R3/R4 (the remainder is
/// arbitrary padding); R2's `U` is exactly 16 bytes of RC4 output already.
pub fn authenticate_user(
    password: &[u8], o: &[u8], u: &[u8], p: i32, id0: &[u8], r: i64, key_len: usize, encrypt_metadata: bool,
) -> Option<Vec<u8>> {
    let key = compute_encryption_key(password, o, p, id0, r, key_len, encrypt_metadata);
    let computed_u = compute_u(&key, id0, r);
    let n = if r == 2 { 16 } else { 16 };
    if u.len() >= n && computed_u[..n] == u[..n] {
        Some(key)
    } else {
        None
    }
}

/// Authenticate a candidate owner password (Algorithm 7): recover the
/// candidate user password from `O`, then run user authentication with it.
pub fn authenticate_owner(
    owner_password: &[u8], o: &[u8], u: &[u8], p: i32, id0: &[u8], r: i64, key_len: usize, encrypt_metadata: bool,
) -> Option<Vec<u8>> {
    let padded_owner = pad_password(owner_password);
    let mut hash = Md5::digest(padded_owner).to_vec();

    let n = if r == 2 { 5 } else { key_len.clamp(5, 16) };
    if r >= 3 {
        for _ in 0..50 {
            hash = Md5::digest(&hash[..n]).to_vec();
        }
    }
    hash.truncate(n);

    let recovered_user_password = if r == 2 {
        rc4::apply(&hash, o)
    } else {
        let mut data = o.to_vec();
        for i in (0u8..20).rev() {
            let round_key: Vec<u8> = hash.iter().map(|&b| b ^ i).collect();
            data = rc4::apply(&round_key, &data);
        }
        data
    };

    authenticate_user(&recovered_user_password, o, u, p, id0, r, key_len, encrypt_metadata)
}

/// Algorithm 1: per-object key derivation (V<5) from the file key, object
/// number, and generation; `for_aes` appends the `sAlT` salt per the spec's
/// note for AES-CBC crypt filters (Algorithm 1.A).
pub fn compute_object_key(file_key: &[u8], obj_num: u32, generation: u16, for_aes: bool) -> Vec<u8> {
    let mut hasher = Md5::new();
    hasher.update(file_key);
    hasher.update(&obj_num.to_le_bytes()[..3]);
    hasher.update(&generation.to_le_bytes()[..2]);
    if for_aes {
        hasher.update(b"sAlT");
    }
    let hash = hasher.finalize();
    let n = (file_key.len() + 5).min(16);
    hash[..n].to_vec()
}
