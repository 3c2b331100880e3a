//! TIFF field types and logical type ids

use log::warn;
use std::fmt;

use super::Group;

/// On-wire TIFF field type, a 16-bit code
///
/// The standard codes 1..=12 are named; anything else round-trips through
/// `Other` so unknown camera types survive a rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TiffType {
    /// 8-bit unsigned integer
    Byte,
    /// 7-bit ASCII, NUL-terminated
    Ascii,
    /// 16-bit unsigned integer
    Short,
    /// 32-bit unsigned integer
    Long,
    /// Two LONGs: numerator, denominator
    Rational,
    /// 8-bit signed integer
    SByte,
    /// Opaque 8-bit bytes
    Undefined,
    /// 16-bit signed integer
    SShort,
    /// 32-bit signed integer
    SLong,
    /// Two SLONGs: numerator, denominator
    SRational,
    /// 32-bit IEEE float
    Float,
    /// 64-bit IEEE float
    Double,
    /// Any other type code
    Other(u16),
}

impl TiffType {
    /// The 16-bit code written to the wire
    pub fn code(self) -> u16 {
        match self {
            TiffType::Byte => 1,
            TiffType::Ascii => 2,
            TiffType::Short => 3,
            TiffType::Long => 4,
            TiffType::Rational => 5,
            TiffType::SByte => 6,
            TiffType::Undefined => 7,
            TiffType::SShort => 8,
            TiffType::SLong => 9,
            TiffType::SRational => 10,
            TiffType::Float => 11,
            TiffType::Double => 12,
            TiffType::Other(code) => code,
        }
    }

    /// Byte size of one element, or 0 for unknown types
    pub fn size_in_bytes(self) -> usize {
        match self {
            TiffType::Byte | TiffType::Ascii | TiffType::SByte | TiffType::Undefined => 1,
            TiffType::Short | TiffType::SShort => 2,
            TiffType::Long | TiffType::SLong | TiffType::Float => 4,
            TiffType::Rational | TiffType::SRational | TiffType::Double => 8,
            TiffType::Other(_) => 0,
        }
    }

    /// Whether the type is one of the byte-sized families
    pub fn is_byte_family(self) -> bool {
        matches!(
            self,
            TiffType::Byte | TiffType::SByte | TiffType::Undefined
        )
    }
}

impl From<u16> for TiffType {
    fn from(code: u16) -> Self {
        match code {
            1 => TiffType::Byte,
            2 => TiffType::Ascii,
            3 => TiffType::Short,
            4 => TiffType::Long,
            5 => TiffType::Rational,
            6 => TiffType::SByte,
            7 => TiffType::Undefined,
            8 => TiffType::SShort,
            9 => TiffType::SLong,
            10 => TiffType::SRational,
            11 => TiffType::Float,
            12 => TiffType::Double,
            other => TiffType::Other(other),
        }
    }
}

impl fmt::Display for TiffType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TiffType::Byte => f.write_str("BYTE"),
            TiffType::Ascii => f.write_str("ASCII"),
            TiffType::Short => f.write_str("SHORT"),
            TiffType::Long => f.write_str("LONG"),
            TiffType::Rational => f.write_str("RATIONAL"),
            TiffType::SByte => f.write_str("SBYTE"),
            TiffType::Undefined => f.write_str("UNDEFINED"),
            TiffType::SShort => f.write_str("SSHORT"),
            TiffType::SLong => f.write_str("SLONG"),
            TiffType::SRational => f.write_str("SRATIONAL"),
            TiffType::Float => f.write_str("FLOAT"),
            TiffType::Double => f.write_str("DOUBLE"),
            TiffType::Other(code) => write!(f, "type {code}"),
        }
    }
}

/// Logical type of a value, refining [`TiffType`]
///
/// Mostly a mirror of the wire type; the extra `Comment` arm covers the
/// charset-prefixed text values that share the `UNDEFINED` wire type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeId {
    /// Plain wire type
    Tiff(TiffType),
    /// Charset-prefixed comment text (wire type UNDEFINED)
    Comment,
}

impl TypeId {
    /// Byte size of one element; unknown types count as 1 element per byte
    pub fn size(self) -> usize {
        match self {
            TypeId::Tiff(t) => t.size_in_bytes(),
            TypeId::Comment => 1,
        }
    }
}

// Tags whose UNDEFINED wire type actually holds charset-prefixed text.
const COMMENT_TAGS: [(u16, Group); 3] = [
    (0x9286, Group::Exif), // UserComment
    (0x001B, Group::Gps),  // GPSProcessingMethod
    (0x001C, Group::Gps),  // GPSAreaInformation
];

/// Resolve the logical type of a field from its wire type, tag and group.
///
/// Applies the same on-the-fly conversions cameras rely on: UNDEFINED
/// becomes a comment for the known text tags, and the Nikon AF fine tune
/// and Pentax temperature fields are reinterpreted as signed bytes.
pub fn to_type_id(tiff_type: TiffType, tag: u16, group: Group) -> TypeId {
    if tiff_type == TiffType::Undefined && COMMENT_TAGS.contains(&(tag, group)) {
        return TypeId::Comment;
    }
    if tiff_type == TiffType::Byte
        && ((tag == 0x0002 && group == Group::NikonAft) || (tag == 0x0047 && group == Group::Pentax))
    {
        return TypeId::Tiff(TiffType::SByte);
    }
    TypeId::Tiff(tiff_type)
}

/// Map a logical type back to its wire type.
///
/// Ids without a 16-bit representation fall back to UNDEFINED with a
/// diagnostic.
pub fn to_tiff_type(type_id: TypeId) -> TiffType {
    match type_id {
        TypeId::Tiff(TiffType::Other(code)) if code > 12 => {
            warn!("type code {code} is not a standard TIFF type");
            TiffType::Other(code)
        }
        TypeId::Tiff(t) => t,
        TypeId::Comment => TiffType::Undefined,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_codes_roundtrip() {
        for code in 1..=12u16 {
            assert_eq!(TiffType::from(code).code(), code);
        }
        assert_eq!(TiffType::from(0x1234).code(), 0x1234);
    }

    #[test]
    fn test_type_sizes() {
        assert_eq!(TiffType::Byte.size_in_bytes(), 1);
        assert_eq!(TiffType::Short.size_in_bytes(), 2);
        assert_eq!(TiffType::Long.size_in_bytes(), 4);
        assert_eq!(TiffType::Rational.size_in_bytes(), 8);
        assert_eq!(TiffType::Other(99).size_in_bytes(), 0);
    }

    #[test]
    fn test_comment_promotion() {
        assert_eq!(
            to_type_id(TiffType::Undefined, 0x9286, Group::Exif),
            TypeId::Comment
        );
        assert_eq!(
            to_type_id(TiffType::Undefined, 0x001B, Group::Gps),
            TypeId::Comment
        );
        // Same tag in another group stays undefined
        assert_eq!(
            to_type_id(TiffType::Undefined, 0x9286, Group::Ifd0),
            TypeId::Tiff(TiffType::Undefined)
        );
    }

    #[test]
    fn test_signed_byte_promotion() {
        assert_eq!(
            to_type_id(TiffType::Byte, 0x0002, Group::NikonAft),
            TypeId::Tiff(TiffType::SByte)
        );
        assert_eq!(
            to_type_id(TiffType::Byte, 0x0047, Group::Pentax),
            TypeId::Tiff(TiffType::SByte)
        );
        assert_eq!(
            to_type_id(TiffType::Byte, 0x0047, Group::Canon),
            TypeId::Tiff(TiffType::Byte)
        );
    }
}
