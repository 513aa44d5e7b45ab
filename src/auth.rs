//! VNC authentication (C5): DES key derivation from a password, and
//! DES-ECB encryption of the server's challenge.

use cipher::{BlockEncrypt, KeyInit};
use des::Des;

/// Derives the 8-byte DES key VNC authentication uses from a password.
///
/// The password is treated as ASCII, padded with NULs to at least 8
/// bytes, then truncated to exactly 8. Each of the 8 bytes then has its
/// bit order reversed (bit 0 <-> bit 7, bit 1 <-> bit 6, and so on),
/// matching how RFB servers store DES keys on the wire.
fn derive_key(password: &str) -> [u8; 8] {
    let mut key = [0u8; 8];
    for (slot, byte) in key.iter_mut().zip(password.as_bytes().iter().chain(std::iter::repeat(&0u8))) {
        *slot = byte.reverse_bits();
    }
    key
}

/// Computes the 16-byte VNC authentication response to a server
/// challenge: the bit-reversed password is the DES key, and the
/// response is that key's ECB encryption of the two 8-byte halves of
/// the challenge.
pub fn encrypt_challenge(password: &str, challenge: &[u8; 16]) -> [u8; 16] {
    let key = derive_key(password);
    let cipher = Des::new_from_slice(&key).expect("DES key is always 8 bytes");

    let mut response = *challenge;
    let (first, second) = response.split_at_mut(8);
    cipher.encrypt_block(first.into());
    cipher.encrypt_block(second.into());
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_key_matches_fixed_vector() {
        // "password" -> ASCII 70 61 73 73 77 6F 72 64, each byte with its
        // bit order reversed (bit0<->bit7, bit1<->bit6, bit2<->bit5,
        // bit3<->bit4), e.g. 0x70 = 0111_0000 -> 0000_1110 = 0x0E.
        assert_eq!(
            derive_key("password"),
            [0x0E, 0x86, 0xCE, 0xCE, 0xEE, 0xF6, 0x4E, 0x26]
        );
    }

    #[test]
    fn derive_key_pads_short_passwords() {
        let key = derive_key("ab");
        // 'a' = 0x61 = 0b0110_0001 -> reversed = 0b1000_0110 = 0x86
        // 'b' = 0x62 = 0b0110_0010 -> reversed = 0b0100_0110 = 0x46
        assert_eq!(key, [0x86, 0x46, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn derive_key_truncates_long_passwords() {
        let key = derive_key("ninecharss");
        assert_eq!(key.len(), 8);
        assert_eq!(key, derive_key("ninechar"));
    }

    #[test]
    fn challenge_encryption_is_deterministic_per_key() {
        let challenge: [u8; 16] = [0,1,2,3,4,5,6,7,8,9,10,11,12,13,14,15];
        let a = encrypt_challenge("password", &challenge);
        let b = encrypt_challenge("password", &challenge);
        assert_eq!(a, b);
        let c = encrypt_challenge("different", &challenge);
        assert_ne!(a, c);
    }
}
