//! Gen-III character table and text decoding (spec.md §4.2).
//!
//! Decoding stops at the `0xFF` terminator or end of input. The table is
//! shared by every variant in this core (Gen-III ROM hacks reuse the same
//! character set, so it is not a per-variant concern).

/// Terminator byte for nickname/OT-name fields.
pub const TERMINATOR: u8 = 0xFF;

fn table() -> [&'static str; 256] {
    let mut t: [&str; 256] = [" "; 256];
    t[0x00] = " ";
    t[0x01] = "À";
    t[0x02] = "Á";
    t[0x03] = "Â";
    t[0x04] = "Ç";
    t[0x05] = "È";
    t[0x06] = "É";
    t[0x07] = "Ê";
    t[0x08] = "Ë";
    t[0x09] = "Ì";
    t[0x0B] = "Î";
    t[0x0C] = "Ï";
    t[0x0D] = "Ò";
    t[0x0E] = "Ó";
    t[0x0F] = "Ô";

    t[0x10] = "Œ";
    t[0x11] = "Ù";
    t[0x12] = "Ú";
    t[0x13] = "Û";
    t[0x14] = "Ñ";
    t[0x15] = "ß";
    t[0x16] = "à";
    t[0x17] = "á";
    t[0x19] = "ç";
    t[0x1A] = "è";
    t[0x1B] = "é";
    t[0x1C] = "ê";
    t[0x1D] = "ë";
    t[0x1E] = "ì";

    t[0x20] = "î";
    t[0x21] = "ï";
    t[0x22] = "ò";
    t[0x23] = "ó";
    t[0x24] = "ô";
    t[0x25] = "œ";
    t[0x26] = "ù";
    t[0x27] = "ú";
    t[0x28] = "û";
    t[0x29] = "ñ";
    t[0x2A] = "º";
    t[0x2B] = "ª";
    t[0x2C] = "ᵉʳ";
    t[0x2D] = "&";
    t[0x2E] = "+";

    t[0x34] = "Lv";
    t[0x35] = "=";
    t[0x36] = ";";

    t[0x50] = "▯";
    t[0x51] = "¿";
    t[0x52] = "¡";
    t[0x5A] = "Í";
    t[0x5B] = "%";
    t[0x5C] = "(";
    t[0x5D] = ")";
    t[0x5E] = " ";
    t[0x5F] = " ";

    t[0x68] = "â";
    t[0x6F] = "í";

    t[0x79] = "↑";
    t[0x7A] = "↓";
    t[0x7B] = "←";
    t[0x7C] = "→";
    t[0x7D] = "*";
    t[0x7E] = "*";
    t[0x7F] = "*";

    t[0x80] = "*";
    t[0x81] = "*";
    t[0x82] = "*";
    t[0x83] = "*";
    t[0x84] = "ᵉ";
    t[0x85] = "<";
    t[0x86] = ">";

    t[0xA0] = "ʳᵉ";
    t[0xA1] = "0";
    t[0xA2] = "1";
    t[0xA3] = "2";
    t[0xA4] = "3";
    t[0xA5] = "4";
    t[0xA6] = "5";
    t[0xA7] = "6";
    t[0xA8] = "7";
    t[0xA9] = "8";
    t[0xAA] = "9";
    t[0xAB] = "!";
    t[0xAC] = "?";
    t[0xAD] = ".";
    t[0xAE] = "-";
    t[0xAF] = "・";

    t[0xB0] = "…";
    t[0xB1] = "“";
    t[0xB2] = "”";
    t[0xB3] = "‘";
    t[0xB4] = "’";
    t[0xB5] = "♂";
    t[0xB6] = "♀";
    t[0xB7] = "$";
    t[0xB8] = ",";
    t[0xB9] = "×";
    t[0xBA] = "/";
    t[0xBB] = "A";
    t[0xBC] = "B";
    t[0xBD] = "C";
    t[0xBE] = "D";
    t[0xBF] = "E";

    t[0xC0] = "F";
    t[0xC1] = "G";
    t[0xC2] = "H";
    t[0xC3] = "I";
    t[0xC4] = "J";
    t[0xC5] = "K";
    t[0xC6] = "L";
    t[0xC7] = "M";
    t[0xC8] = "N";
    t[0xC9] = "O";
    t[0xCA] = "P";
    t[0xCB] = "Q";
    t[0xCC] = "R";
    t[0xCD] = "S";
    t[0xCE] = "T";
    t[0xCF] = "U";

    t[0xD0] = "V";
    t[0xD1] = "W";
    t[0xD2] = "X";
    t[0xD3] = "Y";
    t[0xD4] = "Z";
    t[0xD5] = "a";
    t[0xD6] = "b";
    t[0xD7] = "c";
    t[0xD8] = "d";
    t[0xD9] = "e";
    t[0xDA] = "f";
    t[0xDB] = "g";
    t[0xDC] = "h";
    t[0xDD] = "i";
    t[0xDE] = "j";
    t[0xDF] = "k";

    t[0xE0] = "l";
    t[0xE1] = "m";
    t[0xE2] = "n";
    t[0xE3] = "o";
    t[0xE4] = "p";
    t[0xE5] = "q";
    t[0xE6] = "r";
    t[0xE7] = "s";
    t[0xE8] = "t";
    t[0xE9] = "u";
    t[0xEA] = "v";
    t[0xEB] = "w";
    t[0xEC] = "x";
    t[0xED] = "y";
    t[0xEE] = "z";
    t[0xEF] = "►";

    t[0xF0] = ":";
    t[0xF1] = "Ä";
    t[0xF2] = "Ö";
    t[0xF3] = "Ü";
    t[0xF4] = "ä";
    t[0xF5] = "ö";
    t[0xF6] = "ü";

    t
}

/// Looks up the glyph for a single Gen-III character byte.
pub fn glyph(byte: u8) -> &'static str {
    table()[byte as usize]
}

/// Looks up the character byte for a single glyph, if present in the table.
pub fn code(glyph: &str) -> Option<u8> {
    table().iter().position(|&c| c == glyph).map(|i| i as u8)
}

/// Decodes a fixed-width Gen-III text field, stopping at [`TERMINATOR`] or
/// the end of `data`, trimming trailing whitespace.
pub fn decode(data: &[u8]) -> String {
    let t = table();
    let mut out = String::new();
    for &b in data {
        if b == TERMINATOR {
            break;
        }
        out.push_str(t[b as usize]);
    }
    out.trim_end().to_string()
}

/// Encodes `text` into `width` Gen-III character bytes, right-padded with
/// the terminator byte. Characters with no table entry encode as `0x00`
/// (the space glyph's primary code point).
pub fn encode(text: &str, width: usize) -> Vec<u8> {
    let mut out = vec![TERMINATOR; width];
    for (i, ch) in text.chars().take(width).enumerate() {
        out[i] = code(&ch.to_string()).unwrap_or(0x00);
    }
    out
}
