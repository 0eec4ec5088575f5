//! Sealing helpers for tests. Production code only ever decrypts.

use aes::Aes256;
use base64::{engine::general_purpose::STANDARD, Engine};
use cbc::cipher::{block_padding::NoPadding, BlockEncryptMut, KeyIvInit};
use rand::RngCore;

use super::codec::{Codec, BLOCK_SIZE};
use super::envelope::{MAX_PAD_LEN, RANDOM_PREFIX_LEN};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;

/// Frame, pad and encrypt `content` the way the platform does.
pub fn seal(codec: &Codec, content: &[u8], tenant_id: &[u8]) -> String {
    let mut plain = vec![0u8; RANDOM_PREFIX_LEN];
    rand::thread_rng().fill_bytes(&mut plain);
    plain.extend_from_slice(&codec.byte_order().write_u32(content.len() as u32));
    plain.extend_from_slice(content);
    plain.extend_from_slice(tenant_id);

    let block = MAX_PAD_LEN as usize;
    let pad = block - plain.len() % block;
    plain.extend(std::iter::repeat(pad as u8).take(pad));

    seal_raw(codec, &plain)
}

/// Encrypt an already block-aligned buffer without adding padding.
pub fn seal_raw(codec: &Codec, plaintext: &[u8]) -> String {
    assert_eq!(plaintext.len() % BLOCK_SIZE, 0, "plaintext must be block aligned");

    let secret = codec.secret();
    let cipher = Aes256CbcEnc::new_from_slices(secret.key(), secret.iv()).unwrap();
    let mut buf = plaintext.to_vec();
    let len = buf.len();
    cipher.encrypt_padded_mut::<NoPadding>(&mut buf, len).unwrap();
    STANDARD.encode(buf)
}
