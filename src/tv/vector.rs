use std::fmt;

use rand::Rng;

use crate::fault::FaultId;
use crate::value::{PackedVal, PackedVal3, Value3, ALL1, WORD_BITS};

/// Ternary assignment of the primary inputs
///
/// Positions are packed [`WORD_BITS`] at a time. Unused lanes of the last block are kept unknown.
/// A vector also carries the list of faults it has been recorded to detect.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestVector {
    input_num: usize,
    blocks: Vec<PackedVal3>,
    det_faults: Vec<FaultId>,
}

impl TestVector {
    /// Create a fully unknown vector
    pub fn new(input_num: usize) -> TestVector {
        TestVector {
            input_num,
            blocks: vec![PackedVal3::all_x(); nb_blocks(input_num)],
            det_faults: Vec::new(),
        }
    }

    /// Number of positions
    pub fn len(&self) -> usize {
        self.input_num
    }

    /// Returns true if the vector has no position
    pub fn is_empty(&self) -> bool {
        self.input_num == 0
    }

    /// Reset every position to unknown and forget the detected faults
    pub fn clear(&mut self) {
        for b in &mut self.blocks {
            *b = PackedVal3::all_x();
        }
        self.det_faults.clear();
    }

    /// Value at a position
    pub fn get(&self, pos: usize) -> Value3 {
        assert!(pos < self.input_num, "Position {pos} out of range");
        self.blocks[pos / WORD_BITS].get(pos % WORD_BITS)
    }

    /// Change the value at a position
    pub fn set(&mut self, pos: usize, v: Value3) {
        assert!(pos < self.input_num, "Position {pos} out of range");
        self.blocks[pos / WORD_BITS].set(pos % WORD_BITS, v);
    }

    /// Number of packed blocks
    pub fn nb_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Packed values for positions `i * WORD_BITS` onwards
    pub fn block(&self, i: usize) -> &PackedVal3 {
        &self.blocks[i]
    }

    /// Returns true if no position is unknown
    pub fn is_determined(&self) -> bool {
        self.nb_determined() == self.input_num
    }

    /// Number of positions set to 0 or 1
    pub fn nb_determined(&self) -> usize {
        self.blocks
            .iter()
            .map(|b| b.extract_determined().count_ones() as usize)
            .sum()
    }

    /// Assign a random binary value to every position
    pub fn fill_random<R: Rng>(&mut self, rng: &mut R) {
        for i in 0..self.blocks.len() {
            let mask = self.block_mask(i);
            let v = PackedVal3::from_binary(rng.gen::<PackedVal>());
            self.blocks[i] = PackedVal3::all_x();
            self.blocks[i].set_with_mask(&v, mask);
        }
    }

    /// Copy the determined positions of another vector, leaving the others untouched
    pub fn merge_from(&mut self, src: &TestVector) {
        assert_eq!(self.input_num, src.input_num);
        for (d, s) in self.blocks.iter_mut().zip(src.blocks.iter()) {
            d.set_with_mask(s, s.extract_determined());
        }
    }

    /// Faults this vector has been recorded to detect
    pub fn detected_faults(&self) -> &[FaultId] {
        &self.det_faults
    }

    /// Record that this vector detects a fault
    pub fn add_detected_fault(&mut self, f: FaultId) {
        self.det_faults.push(f);
    }

    /// Replace the list of detected faults
    pub fn set_detected_faults(&mut self, faults: Vec<FaultId>) {
        self.det_faults = faults;
    }

    /// Parse a hexadecimal string, one digit per four positions, lowest position first
    ///
    /// Short strings are padded with zeros and extra digits are ignored.
    /// Returns false if any character is not a hexadecimal digit, extra ones included;
    /// the vector is then left fully unknown.
    pub fn from_hex(&mut self, s: &str) -> bool {
        self.clear();
        if !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return false;
        }
        let mut digits = s.chars();
        for base in (0..self.input_num).step_by(4) {
            let d = match digits.next() {
                None => 0,
                Some(c) => c.to_digit(16).unwrap_or(0),
            };
            for b in 0..4 {
                if base + b < self.input_num {
                    self.set(base + b, Value3::from((d >> b) & 1 != 0));
                }
            }
        }
        true
    }

    /// Hexadecimal representation; unknown positions are written as 0
    pub fn to_hex(&self) -> String {
        let mut ret = String::with_capacity(self.input_num.div_ceil(4));
        for base in (0..self.input_num).step_by(4) {
            let mut d = 0;
            for b in 0..4 {
                if base + b < self.input_num && self.get(base + b) == Value3::One {
                    d |= 1 << b;
                }
            }
            ret.push(char::from_digit(d, 16).unwrap_or('0').to_ascii_uppercase());
        }
        ret
    }

    /// Parse a string of 0, 1 and X, one character per position
    ///
    /// Returns false if the length does not match or a character is invalid.
    pub fn parse_binary(&mut self, s: &str) -> bool {
        self.clear();
        if s.chars().count() != self.input_num {
            return false;
        }
        for (pos, c) in s.chars().enumerate() {
            match Value3::from_char(c) {
                Some(v) => self.set(pos, v),
                None => return false,
            }
        }
        true
    }

    /// Representation as 0, 1 and X, one character per position
    pub fn to_binary(&self) -> String {
        (0..self.input_num).map(|i| self.get(i).to_char()).collect()
    }

    /// Lanes of block i that correspond to actual positions
    fn block_mask(&self, i: usize) -> PackedVal {
        let rem = self.input_num - i * WORD_BITS;
        if rem >= WORD_BITS {
            ALL1
        } else {
            (1 << rem) - 1
        }
    }
}

fn nb_blocks(input_num: usize) -> usize {
    input_num.div_ceil(WORD_BITS).max(1)
}

impl fmt::Display for TestVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_binary())
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn test_get_set() {
        let mut tv = TestVector::new(130);
        assert_eq!(tv.nb_blocks(), 3);
        assert_eq!(tv.nb_determined(), 0);
        for pos in [0, 1, 63, 64, 100, 129] {
            for v in [Value3::X, Value3::Zero, Value3::One] {
                tv.set(pos, v);
                assert_eq!(tv.get(pos), v);
            }
        }
        assert_eq!(tv.nb_determined(), 6);
        tv.clear();
        assert_eq!(tv.nb_determined(), 0);
    }

    #[test]
    #[should_panic]
    fn test_out_of_range() {
        let tv = TestVector::new(5);
        tv.get(5);
    }

    #[test]
    fn test_fill_random() {
        let mut rng = SmallRng::seed_from_u64(1);
        let mut tv = TestVector::new(70);
        tv.fill_random(&mut rng);
        assert!(tv.is_determined());
        // Padding lanes stay unknown
        assert_eq!(tv.block(1).extract_determined(), 0x3f);
    }

    #[test]
    fn test_merge() {
        let mut src = TestVector::new(8);
        src.set(1, Value3::One);
        src.set(6, Value3::Zero);

        let mut dst = TestVector::new(8);
        dst.merge_from(&src);
        assert_eq!(dst, src);

        let mut dst = TestVector::new(8);
        dst.set(0, Value3::Zero);
        dst.set(1, Value3::Zero);
        dst.set(7, Value3::One);
        dst.merge_from(&src);
        assert_eq!(dst.to_binary(), "01XXXX01");
    }

    #[test]
    fn test_hex() {
        let mut tv = TestVector::new(8);
        assert!(tv.from_hex("5A"));
        assert_eq!(tv.to_binary(), "10100101");
        assert_eq!(tv.to_hex(), "5A");

        // Short input is padded, long input truncated
        assert!(tv.from_hex("F"));
        assert_eq!(tv.to_binary(), "11110000");
        assert!(tv.from_hex("123"));
        assert_eq!(tv.to_hex(), "12");

        assert!(!tv.from_hex("G0"));
        // Digits beyond the width are checked too
        assert!(!tv.from_hex("12G"));
        assert_eq!(tv.nb_determined(), 0);
    }

    #[test]
    fn test_hex_round_trip() {
        let mut rng = SmallRng::seed_from_u64(7);
        for width in [4, 12, 64, 100] {
            let mut tv = TestVector::new(width);
            tv.fill_random(&mut rng);
            let mut other = TestVector::new(width);
            assert!(other.from_hex(&tv.to_hex()));
            assert_eq!(tv, other);
        }
    }

    #[test]
    fn test_binary() {
        let mut tv = TestVector::new(5);
        assert!(tv.parse_binary("01x1X"));
        assert_eq!(tv.get(2), Value3::X);
        assert_eq!(format!("{tv}"), "01X1X");
        assert!(!tv.parse_binary("0101"));
        assert!(!tv.parse_binary("01021"));
    }
}
