//! ROM/RAM signature scanner: locates `gPlayerParty` and its count by
//! matching ARM/THUMB instruction patterns and resolving PC-relative
//! literal-pool loads (spec.md §4.7).
//!
//! There is no teacher precedent for this component (CMIW-pk_edit never
//! scans code); the pattern/resolver split and EWRAM bounds check are
//! grounded directly on spec.md §4.7's own description of the ARM/THUMB
//! `LDR` encodings, built in the bounds-checked-codec style of [`crate::codec`].

use thiserror::Error;

use crate::codec::{self, CodecError};
use crate::variant::Variant;

/// Start of the GBA's external work RAM, where all party data lives at runtime.
pub const EWRAM_BASE: u32 = 0x0200_0000;
/// One past the end of EWRAM.
pub const EWRAM_END: u32 = 0x0204_0000;

/// Errors raised by the signature scanner.
#[derive(Error, Debug)]
pub enum ScannerError {
    /// No candidate pattern produced a valid address.
    #[error("no matching signature found")]
    NoMatch,
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Instruction-set width a pattern is written against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// 4-byte aligned, 4 bytes per instruction.
    Arm,
    /// 2-byte aligned, 2 bytes per instruction.
    Thumb,
}

impl Mode {
    fn alignment(self) -> usize {
        match self {
            Mode::Arm => 4,
            Mode::Thumb => 2,
        }
    }
}

/// A single byte position in a [`Pattern`]: either a required value or a wildcard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternByte {
    Exact(u8),
    Wildcard,
}

/// A byte sequence to scan for, tagged with its instruction mode.
#[derive(Debug, Clone)]
pub struct Pattern {
    pub mode: Mode,
    pub bytes: Vec<PatternByte>,
}

impl Pattern {
    pub fn new(mode: Mode, bytes: Vec<PatternByte>) -> Self {
        Pattern { mode, bytes }
    }

    fn matches_at(&self, image: &[u8], offset: usize) -> bool {
        if offset + self.bytes.len() > image.len() {
            return false;
        }
        self.bytes
            .iter()
            .enumerate()
            .all(|(i, pb)| match pb {
                PatternByte::Wildcard => true,
                PatternByte::Exact(b) => image[offset + i] == *b,
            })
    }
}

/// Scans `image` for every offset at which `pattern` matches, respecting the
/// pattern mode's alignment (spec.md §4.7, "Matching").
pub fn find_all(image: &[u8], pattern: &Pattern) -> Vec<usize> {
    let stride = pattern.mode.alignment();
    let mut offsets = Vec::new();
    let mut offset = 0;
    while offset + pattern.bytes.len() <= image.len() {
        if pattern.matches_at(image, offset) {
            offsets.push(offset);
        }
        offset += stride;
    }
    offsets
}

/// Resolves an ARM `LDR Rt,[PC,#imm12]` literal load (opcode `0xE59F0000` in
/// the upper bits) found at `offset`, returning the 32-bit word stored in its
/// literal pool entry (spec.md §4.7).
pub fn resolve_arm_ldr(image: &[u8], offset: usize) -> Result<u32, ScannerError> {
    let word = codec::get_u32(image, offset)?;
    let imm12 = (word & 0xFFF) as usize;
    let pc_value = offset + 8;
    let literal_addr = pc_value + imm12;
    Ok(codec::get_u32(image, literal_addr)?)
}

/// Resolves a THUMB `LDR Rt,[PC,#imm8*4]` literal load (opcode
/// `0b01001xxx xxxxxxxx`) found at `offset` (spec.md §4.7).
pub fn resolve_thumb_ldr(image: &[u8], offset: usize) -> Result<u32, ScannerError> {
    let halfword = codec::get_u16(image, offset)?;
    let imm8 = (halfword & 0xFF) as usize;
    let pc_value = (offset & !1) + 4;
    let literal_addr = (pc_value & !3) + imm8 * 4;
    Ok(codec::get_u32(image, literal_addr)?)
}

/// True iff `opcode` is the ARM `LDR Rt,[PC,#imm12]` encoding.
pub fn is_arm_pc_relative_ldr(opcode: u32) -> bool {
    opcode & 0xFFFF_F000 == 0xE59F_0000
}

/// True iff `halfword` is the THUMB `LDR Rt,[PC,#imm8*4]` encoding.
pub fn is_thumb_pc_relative_ldr(halfword: u16) -> bool {
    halfword & 0xF800 == 0x4800
}

/// True iff `addr` is a 4-byte-aligned address within EWRAM.
pub fn is_valid_ewram_address(addr: u32) -> bool {
    addr >= EWRAM_BASE && addr < EWRAM_END && addr % 4 == 0
}

/// One scored address candidate accumulated while scanning.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    address: u32,
    first_offset: usize,
    score: u32,
}

/// How a matched pattern resolves to a candidate address.
#[derive(Debug, Clone, Copy)]
pub enum ResolveStrategy {
    /// The match itself is a PC-relative literal load; resolve it with the
    /// mode's own resolver.
    Direct,
    /// The match is a setup instruction (an immediate-size multiply, a
    /// party-count compare) that anchors a nearby literal load rather than
    /// loading an address itself. Scans forward up to `window` bytes, at the
    /// pattern's own mode alignment, for the first literal load and resolves
    /// that instead.
    NearbyLiteralLoad { window: usize },
}

/// A registered pattern plus the score contributed by each of its matches
/// and how a match resolves to a candidate address.
pub struct ScanEntry {
    pub pattern: Pattern,
    pub weight: u32,
    pub resolve: ResolveStrategy,
}

/// Scans forward starting at `offset` (the anchoring pattern's own match
/// does not itself decode as a literal load, so it is skipped naturally) up
/// to `window` bytes, at `mode`'s alignment, for the first PC-relative
/// literal load, and resolves it. Used by [`ResolveStrategy::NearbyLiteralLoad`].
fn resolve_nearby_literal_load(
    image: &[u8],
    offset: usize,
    window: usize,
    mode: Mode,
) -> Result<u32, ScannerError> {
    let stride = mode.alignment();
    let limit = (offset + window).min(image.len());
    let mut pos = offset;
    while pos + stride <= limit {
        let is_ldr = match mode {
            Mode::Arm => codec::get_u32(image, pos)
                .map(is_arm_pc_relative_ldr)
                .unwrap_or(false),
            Mode::Thumb => codec::get_u16(image, pos)
                .map(is_thumb_pc_relative_ldr)
                .unwrap_or(false),
        };
        if is_ldr {
            return match mode {
                Mode::Arm => resolve_arm_ldr(image, pos),
                Mode::Thumb => resolve_thumb_ldr(image, pos),
            };
        }
        pos += stride;
    }
    Err(ScannerError::NoMatch)
}

/// The concrete ARM/THUMB party-data signature catalogue (spec.md §4.7,
/// "Candidate selection"): literal-pool loads of the party base, the
/// `MOV Rd,#<pokemonSize>` immediate that feeds the per-slot multiply, and
/// the `CMP Rn,#6` party-count bound check.
pub fn gen3_party_patterns(variant: &Variant) -> Vec<ScanEntry> {
    let mut entries = vec![ScanEntry {
        pattern: Pattern::new(
            Mode::Arm,
            vec![
                PatternByte::Wildcard,
                PatternByte::Wildcard,
                PatternByte::Exact(0x9F),
                PatternByte::Exact(0xE5),
            ],
        ),
        weight: 2,
        resolve: ResolveStrategy::Direct,
    }];

    for rt in 0u8..8 {
        entries.push(ScanEntry {
            pattern: Pattern::new(
                Mode::Thumb,
                vec![PatternByte::Wildcard, PatternByte::Exact(0x48 + rt)],
            ),
            weight: 2,
            resolve: ResolveStrategy::Direct,
        });
    }

    entries.push(ScanEntry {
        pattern: Pattern::new(
            Mode::Arm,
            vec![
                PatternByte::Exact(variant.pokemon_size as u8),
                PatternByte::Wildcard,
                PatternByte::Exact(0xA0),
                PatternByte::Exact(0xE3),
            ],
        ),
        weight: 1,
        resolve: ResolveStrategy::NearbyLiteralLoad { window: 64 },
    });

    entries.push(ScanEntry {
        pattern: Pattern::new(
            Mode::Arm,
            vec![
                PatternByte::Exact(0x06),
                PatternByte::Exact(0x00),
                PatternByte::Wildcard,
                PatternByte::Exact(0xE3),
            ],
        ),
        weight: 1,
        resolve: ResolveStrategy::NearbyLiteralLoad { window: 64 },
    });

    entries
}

/// Runs every entry in `entries` over `image`, resolves each match to a
/// candidate EWRAM address, and returns the highest-scoring valid one
/// (spec.md §4.7, "Candidate selection"). Ties break on earliest match offset.
/// `fallback_bonus` adds extra score to any candidate matching a known
/// variant fallback address, per the variant-aware multiplier described
/// in the spec.
pub fn find_party_base(
    image: &[u8],
    entries: &[ScanEntry],
    fallback_address: Option<u32>,
    fallback_bonus: u32,
) -> Result<u32, ScannerError> {
    let mut candidates: Vec<Candidate> = Vec::new();

    for entry in entries {
        for offset in find_all(image, &entry.pattern) {
            let resolved = match entry.resolve {
                ResolveStrategy::Direct => match entry.pattern.mode {
                    Mode::Arm => resolve_arm_ldr(image, offset),
                    Mode::Thumb => resolve_thumb_ldr(image, offset),
                },
                ResolveStrategy::NearbyLiteralLoad { window } => {
                    resolve_nearby_literal_load(image, offset, window, entry.pattern.mode)
                }
            };
            let address = match resolved {
                Ok(addr) => addr,
                Err(_) => continue,
            };
            if !is_valid_ewram_address(address) {
                continue;
            }

            let mut bonus = entry.weight;
            if fallback_address == Some(address) {
                bonus += fallback_bonus;
            }

            if let Some(existing) = candidates.iter_mut().find(|c| c.address == address) {
                existing.score += bonus;
                existing.first_offset = existing.first_offset.min(offset);
            } else {
                candidates.push(Candidate {
                    address,
                    first_offset: offset,
                    score: bonus,
                });
            }
        }
    }

    candidates
        .into_iter()
        .max_by(|a, b| {
            a.score
                .cmp(&b.score)
                .then(b.first_offset.cmp(&a.first_offset))
        })
        .map(|c| c.address)
        .ok_or(ScannerError::NoMatch)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exact_pattern(mode: Mode, bytes: &[u8]) -> Pattern {
        Pattern::new(
            mode,
            bytes.iter().map(|&b| PatternByte::Exact(b)).collect(),
        )
    }

    /// S6: an ARM `LDR r0,[PC,#4]` at offset 0, literal pool word at offset 12.
    #[test]
    fn resolves_arm_literal_load() {
        let mut image = vec![0u8; 64];
        image[0..4].copy_from_slice(&0xE59F_0004u32.to_le_bytes());
        image[12..16].copy_from_slice(&0x0202_44ECu32.to_le_bytes());

        let addr = resolve_arm_ldr(&image, 0).unwrap();
        assert_eq!(addr, 0x0202_44EC);
    }

    /// S7: a THUMB `LDR r0,[PC,#4]` at offset 0, literal pool word at offset 8.
    #[test]
    fn resolves_thumb_literal_load() {
        let mut image = vec![0u8; 16];
        image[0..2].copy_from_slice(&[0x01, 0x48]);
        image[8..12].copy_from_slice(&0x0202_35B8u32.to_le_bytes());

        let addr = resolve_thumb_ldr(&image, 0).unwrap();
        assert_eq!(addr, 0x0202_35B8);
    }

    #[test]
    fn find_all_respects_alignment_and_wildcards() {
        let image = vec![0xAA, 0xE5, 0x9F, 0x00, 0xAA, 0xE5, 0x9F, 0x00];
        let pattern = Pattern::new(
            Mode::Arm,
            vec![
                PatternByte::Wildcard,
                PatternByte::Exact(0xE5),
                PatternByte::Exact(0x9F),
                PatternByte::Exact(0x00),
            ],
        );
        let offsets = find_all(&image, &pattern);
        assert_eq!(offsets, vec![0, 4]);
    }

    #[test]
    fn find_party_base_picks_highest_scoring_valid_address() {
        let mut image = vec![0u8; 64];
        image[0..4].copy_from_slice(&0xE59F_0004u32.to_le_bytes());
        image[12..16].copy_from_slice(&0x0202_44ECu32.to_le_bytes());

        let entries = vec![ScanEntry {
            pattern: exact_pattern(Mode::Arm, &0xE59F_0004u32.to_le_bytes()),
            weight: 1,
            resolve: ResolveStrategy::Direct,
        }];

        let addr = find_party_base(&image, &entries, None, 0).unwrap();
        assert_eq!(addr, 0x0202_44EC);
    }

    #[test]
    fn find_party_base_fails_with_no_match_on_empty_image() {
        let image = vec![0u8; 64];
        let entries = vec![ScanEntry {
            pattern: exact_pattern(Mode::Arm, &0xE59F_0004u32.to_le_bytes()),
            weight: 1,
            resolve: ResolveStrategy::Direct,
        }];

        assert!(matches!(
            find_party_base(&image, &entries, None, 0),
            Err(ScannerError::NoMatch)
        ));
    }

    /// Exercises the shipped catalogue end-to-end: an ARM literal load
    /// sitting a few instructions after the MOV-immediate and CMP
    /// corroborating instructions the multiply/compare patterns match.
    #[test]
    fn gen3_party_patterns_resolves_party_base_from_a_realistic_buffer() {
        let variant = Variant::vanilla_emerald();
        let mut image = vec![0u8; 128];

        // MOV r1, #100 (0xE3A01064), corroborates a 100-byte record stride.
        image[0..4].copy_from_slice(&0xE3A0_1064u32.to_le_bytes());
        // CMP r2, #6 (0xE3520006), corroborates the max-party-size bound check.
        image[4..8].copy_from_slice(&0xE352_0006u32.to_le_bytes());
        // ARM LDR r0,[PC,#4] at offset 8, literal pool word at offset 20.
        image[8..12].copy_from_slice(&0xE59F_0004u32.to_le_bytes());
        image[20..24].copy_from_slice(&0x0202_44ECu32.to_le_bytes());

        let entries = gen3_party_patterns(&variant);
        let addr = find_party_base(&image, &entries, Some(0x0202_44EC), 5).unwrap();
        assert_eq!(addr, 0x0202_44EC);
    }

    #[test]
    fn rejects_addresses_outside_ewram() {
        assert!(!is_valid_ewram_address(0x0300_0000));
        assert!(!is_valid_ewram_address(0x0200_0001));
        assert!(is_valid_ewram_address(0x0200_0130));
    }

    #[test]
    fn recognises_arm_and_thumb_opcodes() {
        assert!(is_arm_pc_relative_ldr(0xE59F_0004));
        assert!(!is_arm_pc_relative_ldr(0xE3A0_0000));
        assert!(is_thumb_pc_relative_ldr(0x4801));
        assert!(!is_thumb_pc_relative_ldr(0x2001));
    }
}
