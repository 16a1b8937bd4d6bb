//! Revisions 5/6 (AES-256, ISO 32000-2 §7.6.4.3.4): the SHA-2 hashing cascade
//! of Algorithm 2.B and the AES-256 file-key unwrap of Algorithm 2.A.

use aes::cipher::block_padding::NoPadding;
use aes::cipher::{generic_array::GenericArray, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use sha2::{Digest, Sha256, Sha384, Sha512};

use crate::error::DecryptionError;

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Algorithm 2.B: hash `password ‖ salt [‖ udata]` through the iterative
/// SHA-256/384/512 cascade R6 introduced to slow down brute-force attacks.
/// R5 is just the first, single SHA-256 round.
pub fn hash(password: &[u8], salt: &[u8], udata: &[u8], r: i64) -> Vec<u8> {
    let mut k = {
        let mut h = Sha256::new();
        h.update(password);
        h.update(salt);
        h.update(udata);
        h.finalize().to_vec()
    };

    if r < 6 {
        return k;
    }

    let mut round = 0u32;
    loop {
        let mut k1 = Vec::with_capacity(64 * (password.len() + k.len() + udata.len()));
        for _ in 0..64 {
            k1.extend_from_slice(password);
            k1.extend_from_slice(&k);
            k1.extend_from_slice(udata);
        }

        let key = GenericArray::clone_from_slice(&k[0..16]);
        let iv = GenericArray::clone_from_slice(&k[16..32]);
        let e = Aes128CbcEnc::new(&key, &iv).encrypt_padded_vec_mut::<NoPadding>(&k1);

        let sum: u32 = e[0..16].iter().map(|&b| b as u32).sum();
        k = match sum % 3 {
            0 => Sha256::digest(&e).to_vec(),
            1 => Sha384::digest(&e).to_vec(),
            _ => Sha512::digest(&e).to_vec(),
        };

        round += 1;
        if round >= 64 && *e.last().unwrap() as u32 <= round - 32 {
            break;
        }
    }

    k.truncate(32);
    k
}

/// Algorithm 2.A: recover the 32-byte file key from `UE`/`OE` given the
/// intermediate key derived via [`hash`] (zero IV, no padding — the
/// ciphertext is exactly one AES-256 block's worth, 32 bytes).
pub fn unwrap_file_key(intermediate_key: &[u8], encrypted_key: &[u8]) -> Result<Vec<u8>, DecryptionError> {
    if encrypted_key.len() != 32 {
        return Err(DecryptionError::InvalidCiphertextLength);
    }
    let key = GenericArray::clone_from_slice(intermediate_key);
    let iv = GenericArray::default();
    let mut buf = encrypted_key.to_vec();
    Aes256CbcDec::new(&key, &iv)
        .decrypt_padded_mut::<NoPadding>(&mut buf)
        .map_err(|_| DecryptionError::InvalidPadding)?;
    buf.truncate(32);
    Ok(buf)
}
