//! A collection of utility functions used throughout the library.

use fnv::{FnvHashMap, FnvHashSet};

/// Calculates the modulo 2 sum of the bits in the input.
pub fn parity(input: u64) -> u64 {
    u64::from(input.count_ones() & 1)
}

/// Finds the parity of `<input, alpha> ^ <output, beta>`, where `<_,_>` is the
/// inner product over GF(2).
pub fn parity_masks(input: u64, output: u64, alpha: u64, beta: u64) -> u64 {
    parity(input & alpha) ^ parity(output & beta)
}

/// Returns the position of the most significant set bit.
pub fn floor_log2(value: u64) -> usize {
    debug_assert!(value != 0);
    63 - value.leading_zeros() as usize
}

/// Parses a set of bit indices given as comma separated values, where `a-b`
/// denotes a contiguous span, e.g. "0,2,4-7". An empty string yields the
/// empty set.
pub fn parse_index_set(text: &str) -> Result<FnvHashSet<usize>, String> {
    let mut result = FnvHashSet::default();

    for token in text.split(',').filter(|t| !t.is_empty()) {
        match token.find('-') {
            Some(pos) => {
                let start: usize = token[..pos]
                    .parse()
                    .map_err(|_| format!("Invalid index '{}'.", &token[..pos]))?;
                let end: usize = token[pos + 1..]
                    .parse()
                    .map_err(|_| format!("Invalid index '{}'.", &token[pos + 1..]))?;

                if start > end {
                    return Err(format!("Invalid span '{}'.", token));
                }

                for i in start..=end {
                    result.insert(i);
                }
            }
            None => {
                let index: usize = token
                    .parse()
                    .map_err(|_| format!("Invalid index '{}'.", token))?;
                result.insert(index);
            }
        }
    }

    Ok(result)
}

/// Parses per-register bit selections of the form
/// `"name1=range;name2=range;..."`. An empty input yields the empty map; an
/// empty range selects no explicit indices, which callers interpret as every
/// bit of the register.
pub fn parse_bit_assignments(
    text: &str,
) -> Result<FnvHashMap<String, FnvHashSet<usize>>, String> {
    let mut result = FnvHashMap::default();

    for block in text.split(';').filter(|b| !b.is_empty()) {
        let pos = block
            .find('=')
            .ok_or_else(|| format!("Expected name=range, got '{}'.", block))?;
        let name = &block[..pos];

        if name.is_empty() {
            return Err(format!("Missing register name in '{}'.", block));
        }

        result.insert(name.to_string(), parse_index_set(&block[pos + 1..])?);
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parity_masks_inner_products() {
        assert_eq!(parity_masks(0b1011, 0b0001, 0b1010, 0b0001), 0);
        assert_eq!(parity_masks(0b1011, 0b0000, 0b0010, 0b0001), 1);
        assert_eq!(parity(0b1011), 1);
        assert_eq!(parity(0b1001), 0);
    }

    #[test]
    fn index_sets() {
        let set = parse_index_set("0,2,4-7").unwrap();
        let expected: Vec<usize> = vec![0, 2, 4, 5, 6, 7];
        assert_eq!(set.len(), expected.len());
        assert!(expected.iter().all(|i| set.contains(i)));

        assert!(parse_index_set("").unwrap().is_empty());
        assert!(parse_index_set("7-4").is_err());
        assert!(parse_index_set("x").is_err());
    }

    #[test]
    fn bit_assignments() {
        let map = parse_bit_assignments("iv=0-3;key=").unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map["iv"].len(), 4);
        assert!(map["key"].is_empty());

        assert!(parse_bit_assignments("").unwrap().is_empty());
        assert!(parse_bit_assignments("noequals").is_err());
    }
}
