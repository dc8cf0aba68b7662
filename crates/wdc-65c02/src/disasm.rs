//! Table-driven 65C02 disassembler.
//!
//! Formats a single instruction into any [`fmt::Write`] sink, so tracers can
//! disassemble into reused line buffers without allocating.

use std::fmt;

use crate::cpu::{AddrMode, addr_mode};

#[rustfmt::skip]
const MNEMONICS: [&str; 256] = [
    // 0x00-0x0F
    "BRK", "ORA", "NOP", "NOP", "TSB", "ORA", "ASL", "NOP",
    "PHP", "ORA", "ASL", "NOP", "TSB", "ORA", "ASL", "NOP",
    // 0x10-0x1F
    "BPL", "ORA", "ORA", "NOP", "TRB", "ORA", "ASL", "NOP",
    "CLC", "ORA", "INC", "NOP", "TRB", "ORA", "ASL", "NOP",
    // 0x20-0x2F
    "JSR", "AND", "NOP", "NOP", "BIT", "AND", "ROL", "NOP",
    "PLP", "AND", "ROL", "NOP", "BIT", "AND", "ROL", "NOP",
    // 0x30-0x3F
    "BMI", "AND", "AND", "NOP", "BIT", "AND", "ROL", "NOP",
    "SEC", "AND", "DEC", "NOP", "BIT", "AND", "ROL", "NOP",
    // 0x40-0x4F
    "RTI", "EOR", "NOP", "NOP", "NOP", "EOR", "LSR", "NOP",
    "PHA", "EOR", "LSR", "NOP", "JMP", "EOR", "LSR", "NOP",
    // 0x50-0x5F
    "BVC", "EOR", "EOR", "NOP", "NOP", "EOR", "LSR", "NOP",
    "CLI", "EOR", "PHY", "NOP", "NOP", "EOR", "LSR", "NOP",
    // 0x60-0x6F
    "RTS", "ADC", "NOP", "NOP", "STZ", "ADC", "ROR", "NOP",
    "PLA", "ADC", "ROR", "NOP", "JMP", "ADC", "ROR", "NOP",
    // 0x70-0x7F
    "BVS", "ADC", "ADC", "NOP", "STZ", "ADC", "ROR", "NOP",
    "SEI", "ADC", "PLY", "NOP", "JMP", "ADC", "ROR", "NOP",
    // 0x80-0x8F
    "BRA", "STA", "NOP", "NOP", "STY", "STA", "STX", "NOP",
    "DEY", "BIT", "TXA", "NOP", "STY", "STA", "STX", "NOP",
    // 0x90-0x9F
    "BCC", "STA", "STA", "NOP", "STY", "STA", "STX", "NOP",
    "TYA", "STA", "TXS", "NOP", "STZ", "STA", "STZ", "NOP",
    // 0xA0-0xAF
    "LDY", "LDA", "LDX", "NOP", "LDY", "LDA", "LDX", "NOP",
    "TAY", "LDA", "TAX", "NOP", "LDY", "LDA", "LDX", "NOP",
    // 0xB0-0xBF
    "BCS", "LDA", "LDA", "NOP", "LDY", "LDA", "LDX", "NOP",
    "CLV", "LDA", "TSX", "NOP", "LDY", "LDA", "LDX", "NOP",
    // 0xC0-0xCF
    "CPY", "CMP", "NOP", "NOP", "CPY", "CMP", "DEC", "NOP",
    "INY", "CMP", "DEX", "WAI", "CPY", "CMP", "DEC", "NOP",
    // 0xD0-0xDF
    "BNE", "CMP", "CMP", "NOP", "NOP", "CMP", "DEC", "NOP",
    "CLD", "CMP", "PHX", "STP", "NOP", "CMP", "DEC", "NOP",
    // 0xE0-0xEF
    "CPX", "SBC", "NOP", "NOP", "CPX", "SBC", "INC", "NOP",
    "INX", "SBC", "NOP", "NOP", "CPX", "SBC", "INC", "NOP",
    // 0xF0-0xFF
    "BEQ", "SBC", "SBC", "NOP", "NOP", "SBC", "INC", "NOP",
    "SED", "SBC", "PLX", "NOP", "NOP", "SBC", "INC", "NOP",
];

/// Mnemonic for an opcode. Undefined opcodes read as `NOP`.
#[must_use]
pub const fn mnemonic(opcode: u8) -> &'static str {
    MNEMONICS[opcode as usize]
}

/// Instruction length in bytes, including the opcode.
#[must_use]
pub const fn op_size(opcode: u8) -> usize {
    match addr_mode(opcode) {
        AddrMode::None | AddrMode::Acc | AddrMode::Imp => 1,
        AddrMode::Imm
        | AddrMode::Rel
        | AddrMode::Zpg
        | AddrMode::ZpgX
        | AddrMode::ZpgY
        | AddrMode::IndX
        | AddrMode::IndY
        | AddrMode::IndYW
        | AddrMode::ZpgInd => 2,
        AddrMode::Abs
        | AddrMode::AbsX
        | AddrMode::AbsXW
        | AddrMode::AbsY
        | AddrMode::AbsYW
        | AddrMode::Ind
        | AddrMode::AbsIndX => 3,
    }
}

/// Disassemble one instruction into `out`.
///
/// `bytes` holds the instruction starting at its opcode; missing trailing
/// bytes read as zero. `pc` is the instruction's address and is only used to
/// resolve branch targets.
pub fn disassemble(out: &mut impl fmt::Write, pc: u16, bytes: &[u8]) -> fmt::Result {
    let opcode = byte_at(bytes, 0);
    let name = mnemonic(opcode);

    let b1 = byte_at(bytes, 1);
    let b2 = byte_at(bytes, 2);
    let word = u16::from(b1) | (u16::from(b2) << 8);

    match addr_mode(opcode) {
        AddrMode::None | AddrMode::Imp => write!(out, "{name}"),
        AddrMode::Acc => write!(out, "{name} A"),
        AddrMode::Imm => write!(out, "{name} #${b1:02X}"),
        AddrMode::Rel => {
            let target = pc.wrapping_add(2).wrapping_add(b1 as i8 as u16);
            write!(out, "{name} ${target:04X}")
        }
        AddrMode::Zpg => write!(out, "{name} ${b1:02X}"),
        AddrMode::ZpgX => write!(out, "{name} ${b1:02X},X"),
        AddrMode::ZpgY => write!(out, "{name} ${b1:02X},Y"),
        AddrMode::Abs => write!(out, "{name} ${word:04X}"),
        AddrMode::AbsX | AddrMode::AbsXW => write!(out, "{name} ${word:04X},X"),
        AddrMode::AbsY | AddrMode::AbsYW => write!(out, "{name} ${word:04X},Y"),
        AddrMode::Ind => write!(out, "{name} (${word:04X})"),
        AddrMode::IndX => write!(out, "{name} (${b1:02X},X)"),
        AddrMode::IndY | AddrMode::IndYW => write!(out, "{name} (${b1:02X}),Y"),
        AddrMode::ZpgInd => write!(out, "{name} (${b1:02X})"),
        AddrMode::AbsIndX => write!(out, "{name} (${word:04X},X)"),
    }
}

const fn byte_at(bytes: &[u8], index: usize) -> u8 {
    if index < bytes.len() { bytes[index] } else { 0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dis(pc: u16, bytes: &[u8]) -> String {
        let mut out = String::new();
        disassemble(&mut out, pc, bytes).unwrap();
        out
    }

    #[test]
    fn formats_each_mode() {
        assert_eq!(dis(0x0200, &[0xA9, 0x42]), "LDA #$42");
        assert_eq!(dis(0x0200, &[0x8D, 0x34, 0x12]), "STA $1234");
        assert_eq!(dis(0x0200, &[0xB1, 0x10]), "LDA ($10),Y");
        assert_eq!(dis(0x0200, &[0x12, 0x10]), "ORA ($10)");
        assert_eq!(dis(0x0200, &[0x7C, 0x00, 0xC0]), "JMP ($C000,X)");
        assert_eq!(dis(0x0200, &[0x0A]), "ASL A");
        assert_eq!(dis(0x0200, &[0xEA]), "NOP");
    }

    #[test]
    fn branch_targets_are_pc_relative() {
        // BNE +4 from $0200: next instruction at $0202, target $0206
        assert_eq!(dis(0x0200, &[0xD0, 0x04]), "BNE $0206");
        // BRA -2 loops back onto itself
        assert_eq!(dis(0x0200, &[0x80, 0xFE]), "BRA $0200");
    }

    #[test]
    fn op_sizes_follow_addressing_mode() {
        assert_eq!(op_size(0xEA), 1); // NOP
        assert_eq!(op_size(0xA9), 2); // LDA #
        assert_eq!(op_size(0x8D), 3); // STA abs
        assert_eq!(op_size(0x02), 2); // undefined two-byte NOP
        assert_eq!(op_size(0x5C), 3); // undefined three-byte NOP
        assert_eq!(op_size(0x03), 1); // undefined one-byte NOP
    }
}
