//! Per-record substruct shuffle and XOR cipher for the encrypted Pokémon body.
//!
//! The 48-byte encrypted body of a Gen-III Pokémon record (offsets
//! `0x20..0x50`) is organised as four 12-byte substructs (growth, attacks,
//! effort/condition, and misc/IVs), whose on-disk order is permuted by
//! `personality mod 24`, and whose contents are XORed with a key derived from
//! `personality ^ otId`. See spec.md §4.3 / §6.

use byteorder::{ByteOrder, LittleEndian};
use thiserror::Error;

/// Offset of the encrypted body within a Pokémon record.
pub const BODY_OFFSET: usize = 0x20;
/// Size in bytes of one substruct.
pub const SUBSTRUCT_SIZE: usize = 12;
/// Size in bytes of the full encrypted body (four substructs).
pub const BODY_SIZE: usize = SUBSTRUCT_SIZE * 4;
/// Minimum record length the cipher can operate on.
pub const MIN_RECORD_LEN: usize = BODY_OFFSET + BODY_SIZE;

/// Errors raised by the substruct cipher.
#[derive(Error, Debug)]
pub enum CipherError {
    /// The record buffer was shorter than [`MIN_RECORD_LEN`].
    #[error("record too short for cipher: expected at least {expected} bytes, found {found}")]
    InvalidLength { expected: usize, found: usize },

    /// A substruct index outside `0..=3` was requested.
    #[error("substruct index out of range: {0}")]
    OutOfRange(usize),
}

/// The four logical substructs of a Pokémon's encrypted body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Substruct {
    /// Species, held item, experience, PP bonuses, friendship.
    Growth,
    /// Moves and their remaining PP.
    Attacks,
    /// Effort values and contest condition bytes.
    Effort,
    /// Pokérus, met location, origins, IVs/egg/ability bit, ribbons.
    Misc,
}

/// `ORDER_TABLE[personality % 24]` gives the substruct occupying each of the
/// four 12-byte slots, in slot order. This is the standard Gen-III
/// permutation table driven by `personality mod 24`.
pub const ORDER_TABLE: [[Substruct; 4]; 24] = {
    use Substruct::*;
    [
        [Growth, Attacks, Effort, Misc],
        [Growth, Attacks, Misc, Effort],
        [Growth, Effort, Attacks, Misc],
        [Growth, Effort, Misc, Attacks],
        [Growth, Misc, Attacks, Effort],
        [Growth, Misc, Effort, Attacks],
        [Attacks, Growth, Effort, Misc],
        [Attacks, Growth, Misc, Effort],
        [Attacks, Effort, Growth, Misc],
        [Attacks, Effort, Misc, Growth],
        [Attacks, Misc, Growth, Effort],
        [Attacks, Misc, Effort, Growth],
        [Effort, Growth, Attacks, Misc],
        [Effort, Growth, Misc, Attacks],
        [Effort, Attacks, Growth, Misc],
        [Effort, Attacks, Misc, Growth],
        [Effort, Misc, Growth, Attacks],
        [Effort, Misc, Attacks, Growth],
        [Misc, Growth, Attacks, Effort],
        [Misc, Growth, Effort, Attacks],
        [Misc, Attacks, Growth, Effort],
        [Misc, Attacks, Effort, Growth],
        [Misc, Effort, Growth, Attacks],
        [Misc, Effort, Attacks, Growth],
    ]
};

/// Returns the substruct ordering for a given personality value.
pub fn order(personality: u32) -> [Substruct; 4] {
    ORDER_TABLE[(personality % 24) as usize]
}

/// Derives the 32-bit XOR key for a record from its personality and trainer id.
pub fn key(personality: u32, ot_id: u32) -> u32 {
    personality ^ ot_id
}

fn slot_offset(sub: Substruct, personality: u32) -> usize {
    let ord = order(personality);
    let slot = ord.iter().position(|s| *s == sub).expect("Substruct present in every ordering");
    BODY_OFFSET + slot * SUBSTRUCT_SIZE
}

fn check_len(record: &[u8]) -> Result<(), CipherError> {
    if record.len() < MIN_RECORD_LEN {
        return Err(CipherError::InvalidLength {
            expected: MIN_RECORD_LEN,
            found: record.len(),
        });
    }
    Ok(())
}

/// Decrypts and returns the 12 plaintext bytes of substruct `sub`.
///
/// The record buffer is not mutated; the result is a fresh 12-byte array.
pub fn read_sub(
    record: &[u8],
    personality: u32,
    ot_id: u32,
    sub: Substruct,
) -> Result<[u8; SUBSTRUCT_SIZE], CipherError> {
    check_len(record)?;
    let offset = slot_offset(sub, personality);
    let cipher_key = key(personality, ot_id);

    let mut out = [0u8; SUBSTRUCT_SIZE];
    for (i, chunk) in record[offset..offset + SUBSTRUCT_SIZE].chunks(4).enumerate() {
        let word = LittleEndian::read_u32(chunk) ^ cipher_key;
        LittleEndian::write_u32(&mut out[i * 4..i * 4 + 4], word);
    }
    Ok(out)
}

/// Encrypts `plain` and writes it back into `record` at substruct `sub`'s slot.
pub fn write_sub(
    record: &mut [u8],
    personality: u32,
    ot_id: u32,
    sub: Substruct,
    plain: &[u8; SUBSTRUCT_SIZE],
) -> Result<(), CipherError> {
    check_len(record)?;
    let offset = slot_offset(sub, personality);
    let cipher_key = key(personality, ot_id);

    for (i, chunk) in plain.chunks(4).enumerate() {
        let word = LittleEndian::read_u32(chunk) ^ cipher_key;
        LittleEndian::write_u32(&mut record[offset + i * 4..offset + i * 4 + 4], word);
    }
    Ok(())
}

/// Folds the unencrypted substruct bytes into the 16-bit record checksum
/// stored at offset `0x1C` of the record header.
pub fn checksum(record: &[u8], personality: u32, ot_id: u32) -> Result<u16, CipherError> {
    check_len(record)?;
    let mut sum: u16 = 0;
    for sub in [
        Substruct::Growth,
        Substruct::Attacks,
        Substruct::Effort,
        Substruct::Misc,
    ] {
        let plain = read_sub(record, personality, ot_id, sub)?;
        for chunk in plain.chunks(2) {
            sum = sum.wrapping_add(LittleEndian::read_u16(chunk));
        }
    }
    Ok(sum)
}
