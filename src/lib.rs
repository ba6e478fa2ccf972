//! Pokémon Generation III save file engine.
//!
//! Reads, edits, and rewrites Gen-III save files (Pokémon Emerald and
//! ROM-hack variants such as "Quetzal"), and can slice party data directly
//! out of a live emulator memory image once [`scanner`] or a variant's
//! fallback address has located it. The UI, HTTP species/move lookups, and
//! any emulator transport are a caller's concern; this crate exposes
//! synchronous byte-in / byte-out operations only.
//!
//! # Examples
//! ```rust no_run
//! use std::fs::File;
//! use std::io::{BufReader, Read};
//! use g3save::SaveContainer;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut buffer = Vec::new();
//!     let file = File::open("emerald.sav")?;
//!     BufReader::new(file).read_to_end(&mut buffer)?;
//!
//!     let mut save = SaveContainer::open(&buffer)?;
//!     let parsed = save.parse()?;
//!     println!("{} has {} Pokémon", parsed.player_name, parsed.party.len());
//!
//!     let mut party = save.party()?;
//!     party[0].set_level(100);
//!     let rebuilt = save.rebuild()?;
//!     Ok(())
//! }
//! ```

pub mod charset;
pub mod cipher;
pub mod codec;
pub mod pokemon;
pub mod save;
pub mod scanner;
pub mod variant;

pub use crate::pokemon::{Pokemon, PokemonError, Pokerus, NATURE};
pub use crate::save::{
    ActiveSlot, ParseWarning, ParsedSave, PartyMember, PlayTime, SaveContainer, SaveError,
};
pub use crate::scanner::{
    gen3_party_patterns, Mode, Pattern, PatternByte, ResolveStrategy, ScanEntry, ScannerError,
};
pub use crate::variant::{IdMap, MappedId, RadiantRule, ShinyRule, Variant, VariantError};
