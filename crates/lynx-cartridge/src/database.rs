//! CRC32-keyed game identification database.
//!
//! Headerless `.o`/`.lyx` dumps carry no rotation or EEPROM information, and
//! plenty of `.lnx` headers in circulation are simply wrong. The database
//! fills the gaps from No-Intro-verified values, keyed by the CRC32 of the
//! ROM payload with any LNX header stripped.

use emu_core::Rotation;

use crate::eeprom::EepromKind;

/// Known-good metadata for one game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameEntry {
    pub crc32: u32,
    pub name: &'static str,
    pub rotation: Rotation,
    pub eeprom: EepromKind,
    pub player_count: u8,
}

/// Look up a game by the CRC32 of its ROM payload (header excluded).
#[must_use]
pub fn lookup(prg_crc32: u32) -> Option<&'static GameEntry> {
    DATABASE.iter().find(|e| e.crc32 == prg_crc32)
}

const fn game(
    crc32: u32,
    name: &'static str,
    rotation: Rotation,
    eeprom: EepromKind,
    player_count: u8,
) -> GameEntry {
    GameEntry {
        crc32,
        name,
        rotation,
        eeprom,
        player_count,
    }
}

use EepromKind::Eeprom93c46 as C46;
use EepromKind::None as NoEeprom;
use Rotation::None as Flat;
use Rotation::Right;

#[rustfmt::skip]
const DATABASE: &[GameEntry] = &[
    // Commercial releases, No-Intro verified, alphabetical.
    game(0x5ad1_d1f5, "APB - All Points Bulletin", Flat, NoEeprom, 1),
    game(0x79e3_b6c8, "Awesome Golf", Right, NoEeprom, 1),
    game(0x8dcb_c49b, "Baseball Heroes", Right, NoEeprom, 2),
    game(0x56c3_3027, "Batman Returns", Flat, NoEeprom, 1),
    game(0x8d15_d475, "Basketbrawl", Right, NoEeprom, 4),
    game(0x9e6f_7bdd, "BattleWheels", Flat, NoEeprom, 2),
    game(0x2b2f_edc4, "Battlezone 2000", Flat, NoEeprom, 1),
    game(0x850d_c19d, "Bill & Ted's Excellent Adventure", Flat, NoEeprom, 1),
    game(0xbfe1_e00f, "Block Out", Flat, NoEeprom, 1),
    game(0xf84e_f526, "Blue Lightning", Flat, NoEeprom, 1),
    game(0x44ea_7b47, "Bubble Trouble", Flat, NoEeprom, 1),
    game(0x8b8d_e924, "California Games", Flat, NoEeprom, 4),
    game(0xe8d1_a22c, "Checkered Flag", Flat, NoEeprom, 6),
    game(0x1d0d_ab8a, "Chip's Challenge", Flat, NoEeprom, 1),
    game(0x8bbb_ca0d, "Crystal Mines II", Flat, NoEeprom, 1),
    game(0x15bb_b238, "Cyber Virus", Flat, NoEeprom, 1),
    game(0x5f80_a87f, "Desert Strike", Flat, NoEeprom, 1),
    game(0x03d6_53b0, "Dinolympics", Flat, NoEeprom, 1),
    game(0x0d38_e3e0, "Dirty Larry - Renegade Cop", Flat, NoEeprom, 1),
    game(0x3b83_4027, "Double Dragon", Flat, NoEeprom, 2),
    game(0x7f9b_3319, "Dracula the Undead", Flat, NoEeprom, 1),
    game(0x4dfe_876d, "Electrocop", Flat, NoEeprom, 1),
    game(0x7a25_826c, "European Soccer Challenge", Right, NoEeprom, 4),
    game(0xf5f7_f797, "Eye of the Beholder", Flat, NoEeprom, 1),
    game(0x83ed_3b73, "Fat Bobby", Flat, NoEeprom, 1),
    game(0xb9d4_62b2, "Fidelity Ultimate Chess Challenge", Flat, NoEeprom, 2),
    game(0x06ac_1a94, "Gauntlet - The Third Encounter", Flat, NoEeprom, 4),
    game(0x66ef_c04a, "Gates of Zendocon", Flat, NoEeprom, 1),
    game(0x5a08_a3f2, "Gordo 106 - The Mutated Lab Monkey", Flat, NoEeprom, 1),
    game(0xc38e_3a76, "Hard Drivin'", Flat, NoEeprom, 1),
    game(0x0f83_a5de, "Hockey", Right, NoEeprom, 2),
    game(0xf14f_4fb1, "Hydra", Flat, NoEeprom, 1),
    game(0xa41a_5c16, "Ishido - The Way of Stones", Flat, NoEeprom, 1),
    game(0x39e3_c38b, "Jimmy Connors' Tennis", Right, NoEeprom, 4),
    game(0xbe94_aa36, "Joust", Flat, NoEeprom, 2),
    game(0x5c5a_4aa4, "Klax", Right, NoEeprom, 2),
    game(0x0214_f80d, "Krazy Ace - Miniature Golf", Flat, NoEeprom, 4),
    game(0xbfe7_5421, "Kung Food", Flat, NoEeprom, 1),
    game(0xe7e3_7caa, "Lemmings", Flat, NoEeprom, 1),
    game(0x45ce_0898, "Lynx Casino", Flat, NoEeprom, 4),
    game(0x0fbd_3d2f, "Malibu Bikini Volleyball", Right, NoEeprom, 4),
    game(0x4fad_d4c2, "Marlboro Go!", Flat, NoEeprom, 1),
    game(0x36bd_9b42, "Ms. Pac-Man", Flat, NoEeprom, 1),
    game(0x9abb_2c41, "NFL Football", Right, NoEeprom, 2),
    game(0x7a36_f2c2, "Ninja Gaiden III", Flat, NoEeprom, 1),
    game(0xabc2_c8bf, "Ninja Gaiden", Flat, NoEeprom, 1),
    game(0x1c04_b2b1, "Pac-Land", Flat, NoEeprom, 1),
    game(0x13db_cb61, "Paperboy", Flat, NoEeprom, 1),
    game(0x58a3_a68d, "Pinball Jam", Right, NoEeprom, 1),
    game(0x53a6_7955, "Pit-Fighter", Flat, NoEeprom, 2),
    game(0xec54_9917, "Power Factor", Flat, NoEeprom, 1),
    game(0x38e5_7e42, "QIX", Flat, NoEeprom, 2),
    game(0xf8c5_3dd5, "Rampage", Flat, NoEeprom, 4),
    game(0x1d86_a0f2, "Rampart", Flat, NoEeprom, 2),
    game(0x0186_6a79, "Road Blasters", Flat, NoEeprom, 1),
    game(0x00c6_c6f8, "RoboSquash", Flat, NoEeprom, 2),
    game(0x6c5c_1e5c, "Robotron 2084", Flat, NoEeprom, 1),
    game(0xe8b3_b8d9, "Rygar", Flat, NoEeprom, 1),
    game(0x77ad_1b78, "S.T.U.N. Runner", Flat, NoEeprom, 1),
    game(0x95c6_0ee4, "Scrapyard Dog", Flat, NoEeprom, 1),
    game(0x06cf_b29b, "Shadow of the Beast", Flat, NoEeprom, 1),
    game(0x6f4b_6608, "Shanghai", Flat, NoEeprom, 1),
    game(0xe2bd_4f23, "Steel Talons", Flat, NoEeprom, 2),
    game(0x68e5_83c0, "Super Asteroids & Missile Command", Flat, NoEeprom, 2),
    game(0xbd30_82a8, "Super Off-Road", Flat, NoEeprom, 4),
    game(0x4c97_e35e, "Super Skweek", Flat, NoEeprom, 2),
    game(0x68a7_8537, "Switchblade II", Flat, NoEeprom, 1),
    game(0xc2c1_8d2b, "Todd's Adventures in Slime World", Flat, NoEeprom, 8),
    game(0x34d8_3ddd, "Toki", Flat, NoEeprom, 1),
    game(0x1cb2_3afe, "Tournament Cyberball 2072", Right, NoEeprom, 4),
    game(0x5cc6_8ec0, "Turbo Sub", Flat, NoEeprom, 2),
    game(0xa0de_9d68, "Viking Child", Flat, NoEeprom, 1),
    game(0x27cd_79f2, "Warbirds", Flat, NoEeprom, 2),
    game(0x91e0_db6f, "World Class Soccer", Right, NoEeprom, 4),
    game(0xb8bc_76fb, "Xenophobe", Flat, NoEeprom, 4),
    game(0xaac4_32e4, "Xybots", Flat, NoEeprom, 2),
    game(0xee7c_0a5c, "Zarlor Mercenary", Flat, NoEeprom, 4),

    // Homebrew with EEPROM saves.
    game(0xb0e9_4717, "Growing Ties", Flat, C46, 1),
    game(0xdc87_13ee, "Ynxa", Flat, C46, 1),
    game(0x0fa4_0782, "Raid on TriCity", Flat, C46, 1),
    game(0x4f2f_a617, "Star Blader", Flat, C46, 1),
];
