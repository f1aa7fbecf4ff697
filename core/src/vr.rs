//! Value Representation: the two-letter datatype code attached to every
//! data element, per PS3.5 chapter 6.2.

use std::fmt;
use std::str::FromStr;

/// The closed set of 34 value representations defined by the standard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum VR {
    AE,
    AS,
    AT,
    CS,
    DA,
    DS,
    DT,
    FL,
    FD,
    IS,
    LO,
    LT,
    OB,
    OD,
    OF,
    OL,
    OV,
    OW,
    PN,
    SH,
    SL,
    SQ,
    SS,
    ST,
    SV,
    TM,
    UC,
    UI,
    UL,
    UN,
    UR,
    US,
    UT,
    UV,
}

impl VR {
    /// The two-byte ASCII mnemonic as it appears on the wire in explicit-VR
    /// encoding.
    pub fn to_bytes(self) -> [u8; 2] {
        let s = self.to_string();
        let b = s.as_bytes();
        [b[0], b[1]]
    }

    /// Whether this VR uses the "extended" explicit-VR length encoding: two
    /// reserved bytes followed by a 4-byte length, rather than a plain
    /// 2-byte length.
    pub fn has_explicit_4byte_length(self) -> bool {
        matches!(
            self,
            VR::OB
                | VR::OD
                | VR::OF
                | VR::OL
                | VR::OV
                | VR::OW
                | VR::SQ
                | VR::UC
                | VR::UN
                | VR::UR
                | VR::UT
                | VR::UV
        )
    }

    /// Whether this VR is a string VR (space-padded to even length, except
    /// `UI` which is null-padded).
    pub fn is_string(self) -> bool {
        matches!(
            self,
            VR::AE
                | VR::AS
                | VR::CS
                | VR::DA
                | VR::DS
                | VR::DT
                | VR::IS
                | VR::LO
                | VR::LT
                | VR::PN
                | VR::SH
                | VR::ST
                | VR::TM
                | VR::UC
                | VR::UI
                | VR::UR
                | VR::UT
        )
    }

    /// Whether values of this VR are numeric and stored in a fixed-width
    /// binary representation.
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            VR::AT
                | VR::FL
                | VR::FD
                | VR::SL
                | VR::SS
                | VR::SV
                | VR::UL
                | VR::US
                | VR::UV
        )
    }

    /// The fixed binary width, in bytes, of a single value of this VR, for
    /// VRs with a fixed-width binary representation.
    pub fn byte_width(self) -> Option<u32> {
        match self {
            VR::AT | VR::FL | VR::SL | VR::UL => Some(4),
            VR::FD | VR::SV | VR::UV => Some(8),
            VR::SS | VR::US => Some(2),
            _ => None,
        }
    }

    /// Whether this is the sequence VR.
    pub fn is_sequence(self) -> bool {
        matches!(self, VR::SQ)
    }

    /// The padding byte used to bring a value of this VR up to even length.
    /// `UI` pads with NUL; other string VRs pad with space.
    pub fn padding_byte(self) -> u8 {
        if self == VR::UI {
            0
        } else {
            b' '
        }
    }
}

impl fmt::Display for VR {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VR::AE => "AE",
            VR::AS => "AS",
            VR::AT => "AT",
            VR::CS => "CS",
            VR::DA => "DA",
            VR::DS => "DS",
            VR::DT => "DT",
            VR::FL => "FL",
            VR::FD => "FD",
            VR::IS => "IS",
            VR::LO => "LO",
            VR::LT => "LT",
            VR::OB => "OB",
            VR::OD => "OD",
            VR::OF => "OF",
            VR::OL => "OL",
            VR::OV => "OV",
            VR::OW => "OW",
            VR::PN => "PN",
            VR::SH => "SH",
            VR::SL => "SL",
            VR::SQ => "SQ",
            VR::SS => "SS",
            VR::ST => "ST",
            VR::SV => "SV",
            VR::TM => "TM",
            VR::UC => "UC",
            VR::UI => "UI",
            VR::UL => "UL",
            VR::UN => "UN",
            VR::UR => "UR",
            VR::US => "US",
            VR::UT => "UT",
            VR::UV => "UV",
        };
        f.write_str(s)
    }
}

/// Error returned when parsing an unrecognized two-letter VR mnemonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownVRError;

impl fmt::Display for UnknownVRError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unrecognized value representation mnemonic")
    }
}

impl std::error::Error for UnknownVRError {}

impl FromStr for VR {
    type Err = UnknownVRError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "AE" => VR::AE,
            "AS" => VR::AS,
            "AT" => VR::AT,
            "CS" => VR::CS,
            "DA" => VR::DA,
            "DS" => VR::DS,
            "DT" => VR::DT,
            "FL" => VR::FL,
            "FD" => VR::FD,
            "IS" => VR::IS,
            "LO" => VR::LO,
            "LT" => VR::LT,
            "OB" => VR::OB,
            "OD" => VR::OD,
            "OF" => VR::OF,
            "OL" => VR::OL,
            "OV" => VR::OV,
            "OW" => VR::OW,
            "PN" => VR::PN,
            "SH" => VR::SH,
            "SL" => VR::SL,
            "SQ" => VR::SQ,
            "SS" => VR::SS,
            "ST" => VR::ST,
            "SV" => VR::SV,
            "TM" => VR::TM,
            "UC" => VR::UC,
            "UI" => VR::UI,
            "UL" => VR::UL,
            "UN" => VR::UN,
            "UR" => VR::UR,
            "US" => VR::US,
            "UT" => VR::UT,
            "UV" => VR::UV,
            _ => return Err(UnknownVRError),
        })
    }
}

/// The allowed value multiplicity range of a data element, expressed as a
/// closed range `[min, max]` where `max = None` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VM {
    pub min: u32,
    pub max: Option<u32>,
}

impl VM {
    pub const fn exact(n: u32) -> Self {
        VM {
            min: n,
            max: Some(n),
        }
    }

    pub const fn at_least(n: u32) -> Self {
        VM { min: n, max: None }
    }

    pub const fn range(min: u32, max: u32) -> Self {
        VM {
            min,
            max: Some(max),
        }
    }

    /// Single value, any multiple, or unbounded: `1-n`.
    pub const ONE_OR_MORE: VM = VM::at_least(1);
    /// Exactly one value.
    pub const ONE: VM = VM::exact(1);

    /// Whether `count` values satisfies this multiplicity range.
    pub fn accepts(self, count: u32) -> bool {
        count >= self.min && self.max.map(|max| count <= max).unwrap_or(true)
    }
}
