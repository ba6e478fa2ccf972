//! Pokémon record view (spec.md §4.4, §6).
//!
//! A [`Pokemon`] is a non-owning view over a `pokemon_size`-byte slice of a
//! container's buffer (spec.md §9, "View aliasing"): it never copies the
//! record, and every setter mutates the underlying save image directly.
//! Fields inside the encrypted body are decrypted on read and re-encrypted
//! on write via [`crate::cipher`]; unencrypted header/trailer fields are
//! read and written directly.

use byteorder::{ByteOrder, LittleEndian};
use thiserror::Error;

use crate::charset;
use crate::cipher::{self, Substruct};
use crate::codec::{self, CodecError};
use crate::variant::{RadiantRule, ShinyRule, Variant};

/// Errors raised while reading or mutating a Pokémon record.
#[derive(Error, Debug)]
pub enum PokemonError {
    /// A requested nature index was not in `0..=24`.
    #[error("requested nature {0} out of range (expected 0..=24)")]
    OutOfRange(u8),
    #[error(transparent)]
    Cipher(#[from] cipher::CipherError),
    #[error(transparent)]
    Codec(#[from] CodecError),
}

const PERSONALITY_OFFSET: usize = 0x00;
const OT_ID_OFFSET: usize = 0x04;
const NICKNAME_OFFSET: usize = 0x08;
const LANGUAGE_OFFSET: usize = 0x12;
const MISC_FLAGS_OFFSET: usize = 0x13;
const OT_NAME_OFFSET: usize = 0x14;
const MARKINGS_OFFSET: usize = 0x1B;
const HEADER_CHECKSUM_OFFSET: usize = 0x1C;

const STATUS_OFFSET: usize = 0x50;
const LEVEL_OFFSET: usize = 0x54;
const MAIL_ID_OFFSET: usize = 0x55;
const CURRENT_HP_OFFSET: usize = 0x56;
const MAX_HP_OFFSET: usize = 0x58;
const ATTACK_OFFSET: usize = 0x5A;
const DEFENSE_OFFSET: usize = 0x5C;
const SPEED_OFFSET: usize = 0x5E;
const SP_ATTACK_OFFSET: usize = 0x60;
const SP_DEFENSE_OFFSET: usize = 0x62;

// Offsets within substruct Growth.
const G_SPECIES: usize = 0x00;
const G_ITEM: usize = 0x02;
const G_EXPERIENCE: usize = 0x04;
const G_PP_BONUSES: usize = 0x08;
const G_FRIENDSHIP: usize = 0x09;

// Offsets within substruct Attacks.
const A_MOVE: [usize; 4] = [0x00, 0x02, 0x04, 0x06];
const A_PP: [usize; 4] = [0x08, 0x09, 0x0A, 0x0B];

// Offsets within substruct Misc.
const M_POKERUS: usize = 0x00;
const M_MET_LOCATION: usize = 0x01;
const M_ORIGINS: usize = 0x02;
const M_IV_EGG_ABILITY: usize = 0x04;

const IV_EGG_FLAG_BIT: u32 = 1 << 30;
const IV_ABILITY_BIT: u32 = 1 << 31;

/// Nature names in `personality mod 25` order.
pub const NATURE: [&str; 25] = [
    "Hardy", "Lonely", "Brave", "Adamant", "Naughty", "Bold", "Docile", "Relaxed", "Impish", "Lax",
    "Timid", "Hasty", "Serious", "Jolly", "Naive", "Modest", "Mild", "Quiet", "Bashful", "Rash",
    "Calm", "Gentle", "Sassy", "Careful", "Quirky",
];

/// Pokérus infection state (spec.md §C.2, SPEC_FULL supplemented feature).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pokerus {
    None,
    Infected,
    Cured,
}

/// A non-owning view over one Pokémon's on-disk record.
pub struct Pokemon<'a> {
    record: &'a mut [u8],
    variant: &'a Variant,
}

impl<'a> Pokemon<'a> {
    /// Wraps `record` (exactly `variant.pokemon_size` bytes) as a Pokémon view.
    pub fn new(record: &'a mut [u8], variant: &'a Variant) -> Result<Self, PokemonError> {
        if record.len() < cipher::MIN_RECORD_LEN {
            return Err(PokemonError::Cipher(cipher::CipherError::InvalidLength {
                expected: cipher::MIN_RECORD_LEN,
                found: record.len(),
            }));
        }
        Ok(Pokemon { record, variant })
    }

    // -- unencrypted header/trailer fields --------------------------------

    pub fn personality(&self) -> u32 {
        LittleEndian::read_u32(&self.record[PERSONALITY_OFFSET..PERSONALITY_OFFSET + 4])
    }

    pub fn ot_id(&self) -> u32 {
        LittleEndian::read_u32(&self.record[OT_ID_OFFSET..OT_ID_OFFSET + 4])
    }

    pub fn nickname(&self) -> String {
        charset::decode(&self.record[NICKNAME_OFFSET..NICKNAME_OFFSET + self.variant.nickname_len])
    }

    pub fn set_nickname(&mut self, nickname: &str) {
        let encoded = charset::encode(nickname, self.variant.nickname_len);
        self.record[NICKNAME_OFFSET..NICKNAME_OFFSET + self.variant.nickname_len]
            .copy_from_slice(&encoded);
    }

    pub fn ot_name(&self) -> String {
        charset::decode(&self.record[OT_NAME_OFFSET..OT_NAME_OFFSET + self.variant.ot_name_len])
    }

    pub fn set_ot_name(&mut self, name: &str) {
        let encoded = charset::encode(name, self.variant.ot_name_len);
        self.record[OT_NAME_OFFSET..OT_NAME_OFFSET + self.variant.ot_name_len]
            .copy_from_slice(&encoded);
    }

    pub fn language(&self) -> u8 {
        self.record[LANGUAGE_OFFSET]
    }

    pub fn markings(&self) -> u8 {
        self.record[MARKINGS_OFFSET]
    }

    pub fn is_bad_egg(&self) -> bool {
        self.record[MISC_FLAGS_OFFSET] & 0b0000_0001 != 0
    }

    pub fn header_checksum(&self) -> u16 {
        LittleEndian::read_u16(&self.record[HEADER_CHECKSUM_OFFSET..HEADER_CHECKSUM_OFFSET + 2])
    }

    pub fn status(&self) -> u32 {
        LittleEndian::read_u32(&self.record[STATUS_OFFSET..STATUS_OFFSET + 4])
    }

    pub fn set_status(&mut self, status: u32) {
        LittleEndian::write_u32(&mut self.record[STATUS_OFFSET..STATUS_OFFSET + 4], status);
    }

    pub fn level(&self) -> u8 {
        self.record[LEVEL_OFFSET]
    }

    pub fn set_level(&mut self, level: u8) {
        self.record[LEVEL_OFFSET] = level;
    }

    pub fn mail_id(&self) -> u8 {
        self.record[MAIL_ID_OFFSET]
    }

    pub fn current_hp(&self) -> u16 {
        LittleEndian::read_u16(&self.record[CURRENT_HP_OFFSET..CURRENT_HP_OFFSET + 2])
    }

    pub fn set_current_hp(&mut self, hp: u16) {
        LittleEndian::write_u16(&mut self.record[CURRENT_HP_OFFSET..CURRENT_HP_OFFSET + 2], hp);
    }

    pub fn max_hp(&self) -> u16 {
        LittleEndian::read_u16(&self.record[MAX_HP_OFFSET..MAX_HP_OFFSET + 2])
    }

    pub fn attack(&self) -> u16 {
        LittleEndian::read_u16(&self.record[ATTACK_OFFSET..ATTACK_OFFSET + 2])
    }

    pub fn defense(&self) -> u16 {
        LittleEndian::read_u16(&self.record[DEFENSE_OFFSET..DEFENSE_OFFSET + 2])
    }

    pub fn speed(&self) -> u16 {
        LittleEndian::read_u16(&self.record[SPEED_OFFSET..SPEED_OFFSET + 2])
    }

    pub fn sp_attack(&self) -> u16 {
        LittleEndian::read_u16(&self.record[SP_ATTACK_OFFSET..SP_ATTACK_OFFSET + 2])
    }

    pub fn sp_defense(&self) -> u16 {
        LittleEndian::read_u16(&self.record[SP_DEFENSE_OFFSET..SP_DEFENSE_OFFSET + 2])
    }

    // -- encrypted-body fields ---------------------------------------------

    fn decrypt(&self, sub: Substruct) -> Result<[u8; 12], PokemonError> {
        Ok(cipher::read_sub(self.record, self.personality(), self.ot_id(), sub)?)
    }

    fn encrypt(&mut self, sub: Substruct, plain: &[u8; 12]) -> Result<(), PokemonError> {
        let (p, ot) = (self.personality(), self.ot_id());
        cipher::write_sub(self.record, p, ot, sub, plain)?;
        Ok(())
    }

    /// Raw (unmapped) species id as stored in substruct Growth.
    fn raw_species_id(&self) -> Result<u16, PokemonError> {
        let g = self.decrypt(Substruct::Growth)?;
        Ok(LittleEndian::read_u16(&g[G_SPECIES..G_SPECIES + 2]))
    }

    /// Mapped species id (spec.md §4.4: "pass through the variant's species … id map").
    pub fn species_id(&self) -> Result<u16, PokemonError> {
        Ok(self.variant.species_map.resolve(self.raw_species_id()?))
    }

    pub fn set_species_id(&mut self, species: u16) -> Result<(), PokemonError> {
        let mut g = self.decrypt(Substruct::Growth)?;
        LittleEndian::write_u16(&mut g[G_SPECIES..G_SPECIES + 2], species);
        self.encrypt(Substruct::Growth, &g)
    }

    pub fn item_id(&self) -> Result<u16, PokemonError> {
        let g = self.decrypt(Substruct::Growth)?;
        let raw = LittleEndian::read_u16(&g[G_ITEM..G_ITEM + 2]);
        Ok(self.variant.item_map.resolve(raw))
    }

    pub fn set_item_id(&mut self, item: u16) -> Result<(), PokemonError> {
        let mut g = self.decrypt(Substruct::Growth)?;
        LittleEndian::write_u16(&mut g[G_ITEM..G_ITEM + 2], item);
        self.encrypt(Substruct::Growth, &g)
    }

    pub fn experience(&self) -> Result<u32, PokemonError> {
        let g = self.decrypt(Substruct::Growth)?;
        Ok(LittleEndian::read_u32(&g[G_EXPERIENCE..G_EXPERIENCE + 4]))
    }

    pub fn set_experience(&mut self, experience: u32) -> Result<(), PokemonError> {
        let mut g = self.decrypt(Substruct::Growth)?;
        LittleEndian::write_u32(&mut g[G_EXPERIENCE..G_EXPERIENCE + 4], experience);
        self.encrypt(Substruct::Growth, &g)
    }

    pub fn friendship(&self) -> Result<u8, PokemonError> {
        let g = self.decrypt(Substruct::Growth)?;
        Ok(g[G_FRIENDSHIP])
    }

    pub fn set_friendship(&mut self, value: u8) -> Result<(), PokemonError> {
        let mut g = self.decrypt(Substruct::Growth)?;
        g[G_FRIENDSHIP] = value;
        self.encrypt(Substruct::Growth, &g)
    }

    pub fn pp_bonuses(&self) -> Result<u8, PokemonError> {
        let g = self.decrypt(Substruct::Growth)?;
        Ok(g[G_PP_BONUSES])
    }

    /// Raw move ids, in slot order (spec.md §4.4: "decode from substruct A", no id mapping).
    pub fn moves(&self) -> Result<[u16; 4], PokemonError> {
        let a = self.decrypt(Substruct::Attacks)?;
        let mut moves = [0u16; 4];
        for i in 0..4 {
            moves[i] = LittleEndian::read_u16(&a[A_MOVE[i]..A_MOVE[i] + 2]);
        }
        Ok(moves)
    }

    /// Current PP for each move slot. `pp[i]` is logically 0 whenever
    /// `moves()[i] == 0` (spec.md §3 invariant), even if the stored byte is stale.
    pub fn pp(&self) -> Result<[u8; 4], PokemonError> {
        let a = self.decrypt(Substruct::Attacks)?;
        let moves = self.moves()?;
        let mut pp = [0u8; 4];
        for i in 0..4 {
            pp[i] = if moves[i] == 0 { 0 } else { a[A_PP[i]] };
        }
        Ok(pp)
    }

    pub fn set_move(&mut self, slot: usize, move_id: u16, pp: u8) -> Result<(), PokemonError> {
        let mut a = self.decrypt(Substruct::Attacks)?;
        LittleEndian::write_u16(&mut a[A_MOVE[slot]..A_MOVE[slot] + 2], move_id);
        a[A_PP[slot]] = pp;
        self.encrypt(Substruct::Attacks, &a)
    }

    /// Effort values in `[HP, Atk, Def, Spe, SpA, SpD]` order.
    pub fn evs(&self) -> Result<[u8; 6], PokemonError> {
        let e = self.decrypt(Substruct::Effort)?;
        Ok([e[0], e[1], e[2], e[3], e[4], e[5]])
    }

    /// Clamps `value` to `[0, 255]` and stores it at EV index `i` (spec.md §8 property 5).
    pub fn set_ev(&mut self, i: usize, value: u8) -> Result<(), PokemonError> {
        let mut e = self.decrypt(Substruct::Effort)?;
        e[i] = value.min(255);
        self.encrypt(Substruct::Effort, &e)
    }

    /// Contest condition bytes, in the same slot order substruct E stores them.
    pub fn condition(&self) -> Result<[u8; 6], PokemonError> {
        let e = self.decrypt(Substruct::Effort)?;
        Ok([e[6], e[7], e[8], e[9], e[10], e[11]])
    }

    /// Individual values in `[HP, Atk, Def, Spe, SpA, SpD]` order, 5 bits each.
    pub fn ivs(&self) -> Result<[u8; 6], PokemonError> {
        let m = self.decrypt(Substruct::Misc)?;
        let word = LittleEndian::read_u32(&m[M_IV_EGG_ABILITY..M_IV_EGG_ABILITY + 4]);
        Ok([
            (word & 0x1F) as u8,
            ((word >> 5) & 0x1F) as u8,
            ((word >> 10) & 0x1F) as u8,
            ((word >> 15) & 0x1F) as u8,
            ((word >> 20) & 0x1F) as u8,
            ((word >> 25) & 0x1F) as u8,
        ])
    }

    /// Clamps `value` to `[0, 31]` and stores it at IV index `i`, leaving the
    /// egg flag and ability bit untouched (spec.md §8 property 5).
    pub fn set_iv(&mut self, i: usize, value: u8) -> Result<(), PokemonError> {
        let mut m = self.decrypt(Substruct::Misc)?;
        let mut word = LittleEndian::read_u32(&m[M_IV_EGG_ABILITY..M_IV_EGG_ABILITY + 4]);
        let clamped = value.min(31) as u32;
        let shift = i * 5;
        word &= !(0x1Fu32 << shift);
        word |= clamped << shift;
        LittleEndian::write_u32(&mut m[M_IV_EGG_ABILITY..M_IV_EGG_ABILITY + 4], word);
        self.encrypt(Substruct::Misc, &m)
    }

    pub fn is_egg(&self) -> Result<bool, PokemonError> {
        let m = self.decrypt(Substruct::Misc)?;
        let word = LittleEndian::read_u32(&m[M_IV_EGG_ABILITY..M_IV_EGG_ABILITY + 4]);
        Ok(word & IV_EGG_FLAG_BIT != 0)
    }

    /// Ability slot derived from the unencrypted trailing `status` field's
    /// bits `0x10` and `0x20` (spec.md §4.4): `0x20` set yields slot 2,
    /// else `0x10` set yields slot 1, else slot 0.
    pub fn ability_number(&self) -> u8 {
        let status = self.status();
        if status & 0x20 != 0 {
            2
        } else if status & 0x10 != 0 {
            1
        } else {
            0
        }
    }

    pub fn pokerus_status(&self) -> Result<Pokerus, PokemonError> {
        let m = self.decrypt(Substruct::Misc)?;
        let byte = m[M_POKERUS];
        let strain = byte >> 4;
        let days = byte & 0x0F;
        Ok(if strain > 0 && days == 0 {
            Pokerus::Cured
        } else if strain > 0 {
            Pokerus::Infected
        } else {
            Pokerus::None
        })
    }

    pub fn met_location(&self) -> Result<u8, PokemonError> {
        let m = self.decrypt(Substruct::Misc)?;
        Ok(m[M_MET_LOCATION])
    }

    pub fn origins(&self) -> Result<u16, PokemonError> {
        let m = self.decrypt(Substruct::Misc)?;
        Ok(LittleEndian::read_u16(&m[M_ORIGINS..M_ORIGINS + 2]))
    }

    pub fn ribbons(&self) -> Result<u32, PokemonError> {
        let m = self.decrypt(Substruct::Misc)?;
        Ok(LittleEndian::read_u32(&m[8..12]))
    }

    // -- derived / cross-cutting accessors ----------------------------------

    fn nature_index(&self) -> u8 {
        (self.personality() % 25) as u8
    }

    pub fn nature(&self) -> &'static str {
        NATURE[self.nature_index() as usize]
    }

    /// Sets the nature by rewriting `personality` to the nearest value with
    /// the requested `personality mod 25`, re-keying all four substructs in
    /// one atomic decrypt/modify/re-encrypt transaction (spec.md §4.4, §9).
    pub fn set_nature(&mut self, requested: u8) -> Result<(), PokemonError> {
        if requested > 24 {
            return Err(PokemonError::OutOfRange(requested));
        }
        let current = self.nature_index();
        if current == requested {
            return Ok(());
        }

        let old_p = self.personality();
        let ot = self.ot_id();
        let g = cipher::read_sub(self.record, old_p, ot, Substruct::Growth)?;
        let a = cipher::read_sub(self.record, old_p, ot, Substruct::Attacks)?;
        let e = cipher::read_sub(self.record, old_p, ot, Substruct::Effort)?;
        let m = cipher::read_sub(self.record, old_p, ot, Substruct::Misc)?;

        let base = old_p.wrapping_sub(current as u32);
        let new_p = base.wrapping_add(requested as u32);

        LittleEndian::write_u32(
            &mut self.record[PERSONALITY_OFFSET..PERSONALITY_OFFSET + 4],
            new_p,
        );

        cipher::write_sub(self.record, new_p, ot, Substruct::Growth, &g)?;
        cipher::write_sub(self.record, new_p, ot, Substruct::Attacks, &a)?;
        cipher::write_sub(self.record, new_p, ot, Substruct::Effort, &e)?;
        cipher::write_sub(self.record, new_p, ot, Substruct::Misc, &m)?;
        Ok(())
    }

    /// Rewrites `personality` directly, re-keying all four substructs in the
    /// same atomic decrypt/modify/re-encrypt transaction `set_nature` uses
    /// (spec.md §9: any personality change must go through this transaction,
    /// not a bare header write, since the substruct cipher key and order both
    /// depend on it).
    pub fn set_personality(&mut self, new_personality: u32) -> Result<(), PokemonError> {
        let old_p = self.personality();
        if old_p == new_personality {
            return Ok(());
        }
        let ot = self.ot_id();

        let g = cipher::read_sub(self.record, old_p, ot, Substruct::Growth)?;
        let a = cipher::read_sub(self.record, old_p, ot, Substruct::Attacks)?;
        let e = cipher::read_sub(self.record, old_p, ot, Substruct::Effort)?;
        let m = cipher::read_sub(self.record, old_p, ot, Substruct::Misc)?;

        LittleEndian::write_u32(
            &mut self.record[PERSONALITY_OFFSET..PERSONALITY_OFFSET + 4],
            new_personality,
        );

        cipher::write_sub(self.record, new_personality, ot, Substruct::Growth, &g)?;
        cipher::write_sub(self.record, new_personality, ot, Substruct::Attacks, &a)?;
        cipher::write_sub(self.record, new_personality, ot, Substruct::Effort, &e)?;
        cipher::write_sub(self.record, new_personality, ot, Substruct::Misc, &m)?;
        Ok(())
    }

    /// `shinyValue = otId_lo ^ otId_hi ^ personality_lo ^ personality_hi`
    /// for the vanilla rule (spec.md §3).
    fn gen3_shiny_value(&self) -> u16 {
        let p = self.personality();
        let ot = self.ot_id();
        let p_lo = (p & 0xFFFF) as u16;
        let p_hi = (p >> 16) as u16;
        let ot_lo = (ot & 0xFFFF) as u16;
        let ot_hi = (ot >> 16) as u16;
        ot_lo ^ ot_hi ^ p_lo ^ p_hi
    }

    fn personality_byte1(&self) -> u8 {
        ((self.personality() >> 8) & 0xFF) as u8
    }

    pub fn is_shiny(&self) -> bool {
        match self.variant.shiny_rule {
            ShinyRule::Gen3Xor => self.gen3_shiny_value() < 8,
            ShinyRule::PersonalityByte1 => self.personality_byte1() == 1,
        }
    }

    pub fn is_radiant(&self) -> bool {
        match self.variant.radiant_rule {
            RadiantRule::None => false,
            RadiantRule::PersonalityByte1Eq2 => self.personality_byte1() == 2,
        }
    }

    /// A record is "empty" iff its mapped species id is 0 (spec.md §4.4).
    pub fn is_empty(&self) -> bool {
        self.species_id().map_or(true, |id| id == 0)
    }

    /// Recomputes and stores the header checksum over the four plaintext
    /// substructs (spec.md §6, "checksum" header field).
    pub fn update_checksum(&mut self) -> Result<(), PokemonError> {
        let sum = cipher::checksum(self.record, self.personality(), self.ot_id())?;
        LittleEndian::write_u16(
            &mut self.record[HEADER_CHECKSUM_OFFSET..HEADER_CHECKSUM_OFFSET + 2],
            sum,
        );
        Ok(())
    }

    /// Raw record bytes, including any variant-specific trailing padding.
    pub fn raw_data(&self) -> &[u8] {
        self.record
    }
}
