//! Atari Lynx cartridge emulation.
//!
//! Covers the `.lnx` container (64-byte header) and headerless `.o` images,
//! the cart port's address counter and strobe interface, the 93Cxx Microwire
//! EEPROM some carts carry for saves, and a CRC32-keyed database of known
//! games used to fill in what headers get wrong or omit.

mod cart;
mod database;
mod eeprom;
mod header;

pub use cart::{Cart, CartInfo};
pub use database::{GameEntry, lookup};
pub use eeprom::{Eeprom, EepromKind};
pub use header::LnxHeader;
