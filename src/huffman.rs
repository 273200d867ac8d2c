#![allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
//! Huffman table construction
//!
//! A DHT segment carries, per table, the number of codes of each length from
//! 1 to 16 and the symbol values laid out by increasing code length. Codes
//! are assigned canonically, counting upwards within a length and shifting
//! left when moving to the next length.
//!
//! Decoding itself lives in `bitstream.rs`; this module builds the two
//! structures it needs:
//!
//! - a 256 entry lookup table indexed by the next 8 bits of the stream, for
//!   codes of up to 8 bits. A slot holds `(value << 8) | (code_len + 1)`,
//!   zero marks a miss.
//! - `min_code`/`max_code`/`vals_base` arrays indexed by code length minus
//!   one, for walking longer codes a bit at a time.

use crate::errors::DecodeErrors;

/// Number of bits looked up at once in the fast path
pub(crate) const HUFF_LOOKAHEAD: usize = 8;

/// Longest code length the format permits
pub(crate) const MAX_CODE_LENGTH: usize = 16;

pub(crate) struct HuffmanTable {
    /// Total number of codes in the table, in `[1, 256]`
    pub n_codes: i32,
    /// Fast path lookup, `(value << 8) | (code_len + 1)` or 0 for a miss
    pub lookup: [u16; 1 << HUFF_LOOKAHEAD],
    /// Symbol values in order of increasing code length
    pub values: [u8; 256],
    /// Smallest code of each length, -1 where a length has no codes
    pub min_code: [i32; MAX_CODE_LENGTH],
    /// Largest code of each length, -1 where a length has no codes
    pub max_code: [i32; MAX_CODE_LENGTH],
    /// Index into `values` of the first code of each length, -1 sentinel
    pub vals_base: [i32; MAX_CODE_LENGTH],
}

impl HuffmanTable {
    /// Build a table from the `L1..L16` count array and the value list of a
    /// DHT segment.
    pub fn new(counts: &[u8; 16], values: &[u8]) -> Result<HuffmanTable, DecodeErrors> {
        let n_codes = counts.iter().map(|count| i32::from(*count)).sum::<i32>();

        if n_codes == 0 {
            return Err(DecodeErrors::HuffmanDecode(
                "Huffman table has zero length".to_string(),
            ));
        }

        if n_codes > 256 {
            return Err(DecodeErrors::HuffmanDecode(
                "Huffman table has excessive length".to_string(),
            ));
        }

        if values.len() != n_codes as usize {
            return Err(DecodeErrors::HuffmanDecode(format!(
                "Huffman table has {} codes but {} values",
                n_codes,
                values.len()
            )));
        }

        // a count array may describe more codes of some length than that
        // length can hold, reject those before they corrupt the tables below
        let mut code = 0_i32;

        for (i, count) in counts.iter().enumerate() {
            code += i32::from(*count);

            if code > (1 << (i + 1)) {
                return Err(DecodeErrors::HuffmanDecode(format!(
                    "Huffman table has too many codes of length {}",
                    i + 1
                )));
            }
            code <<= 1;
        }

        let mut table = HuffmanTable {
            n_codes,
            lookup: [0; 1 << HUFF_LOOKAHEAD],
            values: [0; 256],
            min_code: [-1; MAX_CODE_LENGTH],
            max_code: [-1; MAX_CODE_LENGTH],
            vals_base: [-1; MAX_CODE_LENGTH],
        };

        table.values[..values.len()].copy_from_slice(values);

        // fast path table, each 8 bit string prefixed by a code of length
        // i + 1 <= 8 decodes to that code's value
        let mut x = 0_usize;
        let mut code = 0_u16;

        for i in 0..HUFF_LOOKAHEAD {
            code <<= 1;

            for _ in 0..counts[i] {
                let base = (code as usize) << (7 - i);
                let slot = (u16::from(table.values[x]) << 8) | (i as u16 + 2);

                for k in 0..(1 << (7 - i)) {
                    table.lookup[base | k] = slot;
                }

                code += 1;
                x += 1;
            }
        }

        // slow path tables cover every length, the decoder only consults
        // them past 8 bits but keeping them complete costs nothing
        let mut code = 0_i32;
        let mut index = 0_i32;

        for i in 0..MAX_CODE_LENGTH {
            let count = i32::from(counts[i]);

            if count != 0 {
                table.min_code[i] = code;
                table.max_code[i] = code + count - 1;
                table.vals_base[i] = index;

                code += count;
                index += count;
            }
            code <<= 1;
        }

        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::HuffmanTable;

    // the Annex K luminance DC table, categories 0 to 11
    const DC_COUNTS: [u8; 16] = [0, 1, 5, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0, 0, 0];
    const DC_VALUES: [u8; 12] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];

    #[test]
    fn canonical_lookup_slots() {
        let table = HuffmanTable::new(&DC_COUNTS, &DC_VALUES).unwrap();

        // category 0 has code 00 of length 2, every 8 bit string starting
        // with 00 must map to it
        for prefix in 0..64 {
            assert_eq!(table.lookup[prefix], 3, "slot {prefix}");
        }
        // category 1 has code 010 of length 3
        for prefix in 0x40..0x60 {
            assert_eq!(table.lookup[prefix], (1 << 8) | 4);
        }
        // category 8 has code 111110 of length 6
        for prefix in 0xF8..0xFC {
            assert_eq!(table.lookup[prefix], (8 << 8) | 7);
        }
    }

    #[test]
    fn long_codes_use_slow_tables() {
        // a single 9 bit code, invisible to the lookup table
        let mut counts = [0; 16];
        counts[8] = 1;

        let table = HuffmanTable::new(&counts, &[42]).unwrap();

        assert!(table.lookup.iter().all(|slot| *slot == 0));
        assert_eq!(table.min_code[8], 0);
        assert_eq!(table.max_code[8], 0);
        assert_eq!(table.vals_base[8], 0);
        assert_eq!(table.values[0], 42);
    }

    #[test]
    fn rejects_empty_and_overfull() {
        assert!(HuffmanTable::new(&[0; 16], &[]).is_err());

        // three codes of length one cannot exist
        let mut counts = [0; 16];
        counts[0] = 3;
        assert!(HuffmanTable::new(&counts, &[1, 2, 3]).is_err());
    }

    #[test]
    fn value_count_must_match() {
        assert!(HuffmanTable::new(&DC_COUNTS, &DC_VALUES[..11]).is_err());
    }
}
