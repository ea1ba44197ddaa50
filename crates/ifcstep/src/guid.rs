//! IFC globally unique ids: 128-bit UUIDs in the 22-character IFC base-64 form.

use uuid::Uuid;

const ALPHABET: &[u8; 64] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz_$";

/// A fresh random id in compressed form.
pub fn new_ifc_guid() -> String {
    compress_guid(Uuid::new_v4())
}

/// Compress a UUID into 22 characters.
///
/// The first character carries the top 2 bits, each following one 6 bits.
pub fn compress_guid(uuid: Uuid) -> String {
    let mut num = uuid.as_u128();
    let mut out = [b'0'; 22];
    for slot in out.iter_mut().rev() {
        *slot = ALPHABET[(num & 0x3f) as usize];
        num >>= 6;
    }
    out.iter().map(|&b| b as char).collect()
}

/// Expand a compressed id back into a UUID.
pub fn expand_guid(text: &str) -> Option<Uuid> {
    if text.len() != 22 {
        return None;
    }
    let mut num: u128 = 0;
    for (i, b) in text.bytes().enumerate() {
        let digit = ALPHABET.iter().position(|&a| a == b)? as u128;
        if i == 0 && digit > 3 {
            return None;
        }
        num = (num << 6) | digit;
    }
    Some(Uuid::from_u128(num))
}
