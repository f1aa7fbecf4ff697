//! Text decoding for the `Specific Character Set (0008,0005)` attribute.
//!
//! Only the defined terms actually seen in interoperability testing are
//! wired up; anything else falls back to `ISO_IR 6` (plain ASCII /
//! ISO-8859-1 superset), which is a safe default for the overwhelming
//! majority of real-world datasets.

use encoding::all::{GBK, ISO_8859_1, UTF_8, WINDOWS_1252};
use encoding::{DecoderTrap, Encoding};

use crate::error::{DecodeError, Result};

/// A character repertoire selectable via `Specific Character Set`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecificCharacterSet {
    /// `ISO_IR 6` / default repertoire: ASCII.
    IsoIr6,
    /// `ISO_IR 100`: Latin alphabet No. 1 (ISO 8859-1).
    IsoIr100,
    /// `ISO_IR 192`: Unicode in UTF-8.
    IsoIr192,
    /// `GB18030`.
    Gb18030,
}

impl SpecificCharacterSet {
    /// Resolve a defined term from `(0008,0005)`, defaulting to `ISO_IR 6`
    /// for anything unrecognized rather than failing outright -- an unknown
    /// character set is far more likely to be a minor vendor quirk than
    /// reason to reject a dataset outright.
    pub fn from_defined_term(term: &str) -> Self {
        match term.trim() {
            "ISO_IR 100" | "ISO 2022 IR 100" => SpecificCharacterSet::IsoIr100,
            "ISO_IR 192" => SpecificCharacterSet::IsoIr192,
            "GB18030" => SpecificCharacterSet::Gb18030,
            _ => SpecificCharacterSet::IsoIr6,
        }
    }

    fn codec(self) -> &'static dyn Encoding {
        match self {
            SpecificCharacterSet::IsoIr6 => WINDOWS_1252 as &'static dyn Encoding,
            SpecificCharacterSet::IsoIr100 => ISO_8859_1 as &'static dyn Encoding,
            SpecificCharacterSet::IsoIr192 => UTF_8 as &'static dyn Encoding,
            SpecificCharacterSet::Gb18030 => GBK as &'static dyn Encoding,
        }
    }

    /// Decode a raw byte string into text using this character set.
    pub fn decode(self, bytes: &[u8]) -> Result<String> {
        self.codec()
            .decode(bytes, DecoderTrap::Replace)
            .map_err(|_| DecodeError::TextDecode {
                charset: self.name(),
            })
    }

    /// Encode text back to its wire representation. `ISO_IR 192` and
    /// `GB18030` data is always re-encoded as UTF-8/GBK respectively; other
    /// repertoires use their single-byte table.
    pub fn encode(self, text: &str) -> Vec<u8> {
        self.codec()
            .encode(text, encoding::EncoderTrap::Replace)
            .unwrap_or_else(|_| text.as_bytes().to_vec())
    }

    fn name(self) -> &'static str {
        match self {
            SpecificCharacterSet::IsoIr6 => "ISO_IR 6",
            SpecificCharacterSet::IsoIr100 => "ISO_IR 100",
            SpecificCharacterSet::IsoIr192 => "ISO_IR 192",
            SpecificCharacterSet::Gb18030 => "GB18030",
        }
    }
}

impl Default for SpecificCharacterSet {
    fn default() -> Self {
        SpecificCharacterSet::IsoIr6
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrecognized_defined_term_falls_back_to_default() {
        assert_eq!(
            SpecificCharacterSet::from_defined_term("ISO 2022 IR 149"),
            SpecificCharacterSet::IsoIr6
        );
    }

    #[test]
    fn utf8_round_trips_through_iso_ir_192() {
        let cs = SpecificCharacterSet::IsoIr192;
        let encoded = cs.encode("Müller^Jörg");
        let decoded = cs.decode(&encoded).unwrap();
        assert_eq!(decoded, "Müller^Jörg");
    }
}
