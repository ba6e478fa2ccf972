//! End-to-end scenarios from spec.md §8 (S1-S7).

use byteorder::{ByteOrder, LittleEndian};

use g3save::save::{ActiveSlot, SaveContainer};
use g3save::scanner::{self, Mode, Pattern, PatternByte, ResolveStrategy, ScanEntry};
use g3save::variant::Variant;

const SECTOR_SIZE: usize = 4096;
const SECTOR_DATA_SIZE: usize = 3968;
const IMAGE_LEN: usize = SECTOR_SIZE * 32;

const FOOTER_ID_OFFSET: usize = SECTOR_DATA_SIZE;
const FOOTER_CHECKSUM_OFFSET: usize = SECTOR_DATA_SIZE + 2;
const FOOTER_SIGNATURE_OFFSET: usize = SECTOR_DATA_SIZE + 4;
const FOOTER_COUNTER_OFFSET: usize = SECTOR_DATA_SIZE + 8;

const TREECKO: [u8; 100] = [
    101, 231, 167, 198, 154, 166, 220, 6, 206, 201, 204, 189, 194, 195, 189, 255, 1, 0, 2, 2, 195,
    213, 226, 255, 255, 255, 255, 0, 49, 30, 0, 0, 255, 65, 123, 193, 255, 65, 123, 192, 255, 65,
    123, 192, 231, 64, 123, 192, 103, 65, 123, 192, 255, 7, 123, 192, 255, 81, 254, 225, 69, 32,
    147, 217, 255, 65, 123, 192, 245, 65, 86, 192, 255, 65, 123, 192, 220, 105, 123, 192, 0, 0, 0,
    0, 5, 255, 20, 0, 20, 0, 11, 0, 10, 0, 9, 0, 14, 0, 10, 0,
];

fn fold_checksum(data: &[u8]) -> u16 {
    let mut sum: u32 = 0;
    for chunk in data.chunks(4) {
        sum = sum.wrapping_add(LittleEndian::read_u32(chunk));
    }
    ((sum >> 16) as u16).wrapping_add((sum & 0xFFFF) as u16)
}

fn write_footer(sector: &mut [u8], id: u16, signature: u32, counter: u32) {
    LittleEndian::write_u16(&mut sector[FOOTER_ID_OFFSET..FOOTER_ID_OFFSET + 2], id);
    LittleEndian::write_u32(
        &mut sector[FOOTER_SIGNATURE_OFFSET..FOOTER_SIGNATURE_OFFSET + 4],
        signature,
    );
    LittleEndian::write_u32(
        &mut sector[FOOTER_COUNTER_OFFSET..FOOTER_COUNTER_OFFSET + 4],
        counter,
    );
    let checksum = fold_checksum(&sector[..SECTOR_DATA_SIZE]);
    LittleEndian::write_u16(
        &mut sector[FOOTER_CHECKSUM_OFFSET..FOOTER_CHECKSUM_OFFSET + 2],
        checksum,
    );
}

/// A vanilla Emerald image with slot A active (higher counter) carrying one
/// Treecko in party slot 0, used by S1-S4.
fn vanilla_save_with_treecko() -> Vec<u8> {
    let variant = Variant::vanilla_emerald();
    let mut image = vec![0u8; IMAGE_LEN];

    for (slot_start, counter) in [(0usize, 5u32), (14usize, 1u32)] {
        for i in 0..14u16 {
            let base = (slot_start + i as usize) * SECTOR_SIZE;
            let sector = &mut image[base..base + SECTOR_SIZE];
            if i == 1 {
                sector[variant.party_offset..variant.party_offset + 100]
                    .copy_from_slice(&TREECKO);
            }
            write_footer(sector, i, variant.signature, counter);
        }
    }

    image
}

#[test]
fn s1_parse_vanilla_emerald_save() {
    let image = vanilla_save_with_treecko();
    let mut save = SaveContainer::open(&image).unwrap();
    let parsed = save.parse().unwrap();

    assert_eq!(parsed.party.len(), 1);
    assert_eq!(parsed.party[0].species_id, 252);
    assert_eq!(parsed.party[0].level, 5);
    assert_eq!(parsed.party[0].nickname, "TREECKO");
}

#[test]
fn s2_round_trip_through_rebuild() {
    let image = vanilla_save_with_treecko();
    let mut save = SaveContainer::open(&image).unwrap();
    save.parse().unwrap();
    let rebuilt = save.rebuild().unwrap();
    assert_eq!(rebuilt.len(), IMAGE_LEN);

    let mut reopened = SaveContainer::open(&rebuilt).unwrap();
    let reparsed = reopened.parse().unwrap();
    assert_eq!(reparsed.party.len(), 1);
    assert_eq!(reparsed.party[0].species_id, 252);
    assert_eq!(reparsed.party[0].level, 5);
    assert_eq!(reparsed.party[0].nickname, "TREECKO");
}

#[test]
fn s3_ev_edit_survives_rebuild_and_reparse() {
    let image = vanilla_save_with_treecko();
    let mut save = SaveContainer::open(&image).unwrap();
    save.parse().unwrap();

    let other_evs_before = {
        let mut party = save.party().unwrap();
        let before = party[0].evs().unwrap();
        party[0].set_ev(0, 252).unwrap();
        before
    };

    let rebuilt = save.rebuild().unwrap();
    let mut reopened = SaveContainer::open(&rebuilt).unwrap();
    let mut party = reopened.party().unwrap();

    let evs = party[0].evs().unwrap();
    assert_eq!(evs[0], 252);
    assert_eq!(&evs[1..], &other_evs_before[1..]);
    assert_eq!(party[0].species_id().unwrap(), 252);
}

#[test]
fn s4_nature_change_leaves_other_fields_untouched() {
    let image = vanilla_save_with_treecko();
    let mut save = SaveContainer::open(&image).unwrap();
    save.parse().unwrap();

    let mut party = save.party().unwrap();
    let n0 = party[0].personality() % 25;
    let target = ((n0 + 1) % 25) as u8;

    let ivs_before = party[0].ivs().unwrap();
    let evs_before = party[0].evs().unwrap();
    let moves_before = party[0].moves().unwrap();
    let species_before = party[0].species_id().unwrap();
    let level_before = party[0].level();

    party[0].set_nature(target).unwrap();

    assert_eq!(party[0].nature(), g3save::NATURE[target as usize]);
    assert_eq!(party[0].ivs().unwrap(), ivs_before);
    assert_eq!(party[0].evs().unwrap(), evs_before);
    assert_eq!(party[0].moves().unwrap(), moves_before);
    assert_eq!(party[0].species_id().unwrap(), species_before);
    assert_eq!(party[0].level(), level_before);
}

#[test]
fn s5_reject_tiny_buffer() {
    let tiny = vec![0u8; 100];
    let result = SaveContainer::open(&tiny);
    assert!(result.is_err());
}

#[test]
fn s6_scanner_resolves_arm_literal() {
    let mut image = vec![0u8; 64];
    image[0..4].copy_from_slice(&0xE59F_0004u32.to_le_bytes());
    image[12..16].copy_from_slice(&0x0202_44ECu32.to_le_bytes());

    let addr = scanner::resolve_arm_ldr(&image, 0).unwrap();
    assert_eq!(addr, 0x0202_44EC);

    let pattern = Pattern::new(
        Mode::Arm,
        0xE59F_0004u32
            .to_le_bytes()
            .iter()
            .map(|&b| PatternByte::Exact(b))
            .collect(),
    );
    let entries = vec![ScanEntry {
        pattern,
        weight: 1,
        resolve: ResolveStrategy::Direct,
    }];
    let found = scanner::find_party_base(&image, &entries, None, 0).unwrap();
    assert_eq!(found, 0x0202_44EC);
}

#[test]
fn s7_scanner_resolves_thumb_literal() {
    let mut image = vec![0u8; 16];
    image[0..2].copy_from_slice(&[0x01, 0x48]);
    image[8..12].copy_from_slice(&0x0202_35B8u32.to_le_bytes());

    let addr = scanner::resolve_thumb_ldr(&image, 0).unwrap();
    assert_eq!(addr, 0x0202_35B8);
}

#[test]
fn active_slot_is_a_when_its_counter_sum_is_higher() {
    let image = vanilla_save_with_treecko();
    let mut save = SaveContainer::open(&image).unwrap();
    let parsed = save.parse().unwrap();
    assert_eq!(parsed.active_slot, ActiveSlot::A);
}
