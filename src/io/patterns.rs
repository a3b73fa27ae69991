//! IO for test pattern files
//!
//! This uses the same test pattern format as Atalanta, one vector per line with its index:
//! ```text
//!     1: 00011101
//!     2: 01110000
//! ```
//! Positions may also be written in hexadecimal, four positions per digit, lowest position first.

use std::io::{BufRead, BufReader, Read, Write};

use anyhow::{bail, Context, Result};

use crate::tv::TestVector;

/// Representation of the positions of a vector
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum PatternFormat {
    /// One character per position: 0, 1 or X
    #[default]
    Binary,
    /// One hexadecimal digit per four positions; unknown positions are written as 0
    Hex,
}

/// Read test vectors with the given number of positions
pub fn read_patterns<R: Read>(r: R, nb_inputs: usize, format: PatternFormat) -> Result<Vec<TestVector>> {
    let mut ret = Vec::new();
    for (lineno, l) in BufReader::new(r).lines().enumerate() {
        let s = l.context("Error during file IO")?;
        let t = s.trim();
        if t.is_empty() || t.starts_with('#') {
            continue;
        }
        let bits = match t.split_once(':') {
            Some((_, bits)) => bits.trim(),
            None => t,
        };
        let mut tv = TestVector::new(nb_inputs);
        let ok = match format {
            PatternFormat::Binary => tv.parse_binary(bits),
            PatternFormat::Hex => tv.from_hex(bits),
        };
        if !ok {
            bail!(
                "Line {}: invalid pattern {} for {} inputs",
                lineno + 1,
                bits,
                nb_inputs
            );
        }
        ret.push(tv);
    }
    Ok(ret)
}

/// Write test vectors, numbered from 1
pub fn write_patterns<'a, W: Write>(
    w: &mut W,
    vectors: impl IntoIterator<Item = &'a TestVector>,
    format: PatternFormat,
) -> Result<()> {
    for (i, tv) in vectors.into_iter().enumerate() {
        let bits = match format {
            PatternFormat::Binary => tv.to_binary(),
            PatternFormat::Hex => tv.to_hex(),
        };
        writeln!(w, "{}: {}", i + 1, bits)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary() {
        let text = "# Generated patterns\n1: 0011X\n2: 11111\n\n3:00000\n";
        let vectors = read_patterns(text.as_bytes(), 5, PatternFormat::Binary).unwrap();
        assert_eq!(vectors.len(), 3);
        assert_eq!(vectors[0].to_binary(), "0011X");
        assert_eq!(vectors[2].to_binary(), "00000");

        let mut buf = Vec::new();
        write_patterns(&mut buf, &vectors, PatternFormat::Binary).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "1: 0011X\n2: 11111\n3: 00000\n"
        );
    }

    #[test]
    fn test_hex() {
        let text = "1: A3\n2: F\n";
        let vectors = read_patterns(text.as_bytes(), 8, PatternFormat::Hex).unwrap();
        assert_eq!(vectors[0].to_binary(), "01011100");
        // Zero padded
        assert_eq!(vectors[1].to_binary(), "11110000");

        let mut buf = Vec::new();
        write_patterns(&mut buf, &vectors, PatternFormat::Hex).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "1: A3\n2: F0\n");
    }

    #[test]
    fn test_invalid() {
        assert!(read_patterns("1: 012\n".as_bytes(), 3, PatternFormat::Binary).is_err());
        assert!(read_patterns("1: 0101\n".as_bytes(), 3, PatternFormat::Binary).is_err());
        assert!(read_patterns("1: G0\n".as_bytes(), 8, PatternFormat::Hex).is_err());
    }
}
