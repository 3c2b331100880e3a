//! Typed TIFF field values
//!
//! A [`Value`] owns the decoded payload of one IFD entry. Encoding back to
//! bytes always goes through [`Value::copy_to`] with an explicit byte
//! order, so the same tree can be flushed in either endianness.

use std::fmt;

use crate::types::{ByteOrder, TiffType, TypeId};

/// An unsigned rational number, a pair of 32-bit unsigned integers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rational {
    /// Numerator
    pub num: u32,
    /// Denominator
    pub denom: u32,
}

/// A signed rational number, a pair of 32-bit signed integers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SRational {
    /// Numerator
    pub num: i32,
    /// Denominator
    pub denom: i32,
}

/// Character set of a charset-prefixed comment value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentCharset {
    /// 7-bit ASCII
    Ascii,
    /// ISO-2022-JP
    Jis,
    /// UCS-2 in the byte order of the surrounding stream
    Unicode,
    /// Charset left undefined by the writer
    Undefined,
}

impl CommentCharset {
    /// The 8-byte charset marker that precedes the comment text
    pub fn marker(self) -> &'static [u8; 8] {
        match self {
            CommentCharset::Ascii => b"ASCII\0\0\0",
            CommentCharset::Jis => b"JIS\0\0\0\0\0",
            CommentCharset::Unicode => b"UNICODE\0",
            CommentCharset::Undefined => b"\0\0\0\0\0\0\0\0",
        }
    }

    /// Identify the charset from a marker, if recognized
    pub fn from_marker(marker: &[u8]) -> Option<CommentCharset> {
        if marker.len() < 8 {
            return None;
        }
        match &marker[..8] {
            b"ASCII\0\0\0" => Some(CommentCharset::Ascii),
            b"JIS\0\0\0\0\0" => Some(CommentCharset::Jis),
            b"UNICODE\0" => Some(CommentCharset::Unicode),
            b"\0\0\0\0\0\0\0\0" => Some(CommentCharset::Undefined),
            _ => None,
        }
    }
}

/// A charset-prefixed comment (UserComment and the GPS text tags)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    /// Character set of the encoded text
    pub charset: CommentCharset,
    /// The comment text
    pub text: String,
}

impl Comment {
    /// Create an ASCII comment
    pub fn ascii(text: impl Into<String>) -> Self {
        Comment {
            charset: CommentCharset::Ascii,
            text: text.into(),
        }
    }

    /// Create a Unicode comment
    pub fn unicode(text: impl Into<String>) -> Self {
        Comment {
            charset: CommentCharset::Unicode,
            text: text.into(),
        }
    }

    /// Decode a charset-prefixed byte run
    pub fn decode(bytes: &[u8], byte_order: ByteOrder) -> Option<Comment> {
        let charset = CommentCharset::from_marker(bytes)?;
        let payload = &bytes[8..];
        let text = match charset {
            CommentCharset::Ascii | CommentCharset::Undefined => {
                String::from_utf8_lossy(payload).into_owned()
            }
            CommentCharset::Jis => {
                let (text, _, _) = encoding_rs::ISO_2022_JP.decode(payload);
                text.into_owned()
            }
            CommentCharset::Unicode => {
                let enc = match byte_order {
                    ByteOrder::Big => encoding_rs::UTF_16BE,
                    _ => encoding_rs::UTF_16LE,
                };
                let (text, _, _) = enc.decode(payload);
                text.into_owned()
            }
        };
        Some(Comment { charset, text })
    }

    /// Encoded payload, marker excluded
    fn encode_payload(&self, byte_order: ByteOrder) -> Vec<u8> {
        match self.charset {
            CommentCharset::Ascii | CommentCharset::Undefined => self.text.as_bytes().to_vec(),
            CommentCharset::Jis => {
                let (bytes, _, _) = encoding_rs::ISO_2022_JP.encode(&self.text);
                bytes.into_owned()
            }
            CommentCharset::Unicode => {
                let mut out = Vec::with_capacity(self.text.len() * 2);
                for unit in self.text.encode_utf16() {
                    let mut buf = [0u8; 2];
                    byte_order.put_u16(&mut buf, unit);
                    out.extend_from_slice(&buf);
                }
                out
            }
        }
    }

    /// Total encoded size, marker included
    pub fn encoded_len(&self, byte_order: ByteOrder) -> usize {
        8 + self.encode_payload(byte_order).len()
    }
}

/// Typed value of a TIFF field
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Vector of 8-bit unsigned integers
    Byte(Vec<u8>),
    /// Vector of ASCII strings; the trailing NULs are not stored
    Ascii(Vec<Vec<u8>>),
    /// Vector of 16-bit unsigned integers
    Short(Vec<u16>),
    /// Vector of 32-bit unsigned integers
    Long(Vec<u32>),
    /// Vector of unsigned rationals
    Rational(Vec<Rational>),
    /// Vector of 8-bit signed integers
    SByte(Vec<i8>),
    /// Opaque bytes
    Undefined(Vec<u8>),
    /// Vector of 16-bit signed integers
    SShort(Vec<i16>),
    /// Vector of 32-bit signed integers
    SLong(Vec<i32>),
    /// Vector of signed rationals
    SRational(Vec<SRational>),
    /// Vector of 32-bit floats
    Float(Vec<f32>),
    /// Vector of 64-bit floats
    Double(Vec<f64>),
    /// Charset-prefixed comment text
    Comment(Comment),
}

impl Value {
    /// Create an ASCII value from a string, NUL appended on encode
    pub fn ascii(s: &str) -> Value {
        Value::Ascii(vec![s.as_bytes().to_vec()])
    }

    /// Logical type of the value
    pub fn type_id(&self) -> TypeId {
        match self {
            Value::Byte(_) => TypeId::Tiff(TiffType::Byte),
            Value::Ascii(_) => TypeId::Tiff(TiffType::Ascii),
            Value::Short(_) => TypeId::Tiff(TiffType::Short),
            Value::Long(_) => TypeId::Tiff(TiffType::Long),
            Value::Rational(_) => TypeId::Tiff(TiffType::Rational),
            Value::SByte(_) => TypeId::Tiff(TiffType::SByte),
            Value::Undefined(_) => TypeId::Tiff(TiffType::Undefined),
            Value::SShort(_) => TypeId::Tiff(TiffType::SShort),
            Value::SLong(_) => TypeId::Tiff(TiffType::SLong),
            Value::SRational(_) => TypeId::Tiff(TiffType::SRational),
            Value::Float(_) => TypeId::Tiff(TiffType::Float),
            Value::Double(_) => TypeId::Tiff(TiffType::Double),
            Value::Comment(_) => TypeId::Comment,
        }
    }

    /// Number of components as recorded in the IFD entry.
    ///
    /// For ASCII this counts bytes including the trailing NULs; for
    /// comments it counts the full encoded bytes including the marker.
    pub fn count(&self) -> usize {
        match self {
            Value::Byte(v) => v.len(),
            Value::Ascii(v) => v.iter().map(|s| s.len() + 1).sum(),
            Value::Short(v) => v.len(),
            Value::Long(v) => v.len(),
            Value::Rational(v) => v.len(),
            Value::SByte(v) => v.len(),
            Value::Undefined(v) => v.len(),
            Value::SShort(v) => v.len(),
            Value::SLong(v) => v.len(),
            Value::SRational(v) => v.len(),
            Value::Float(v) => v.len(),
            Value::Double(v) => v.len(),
            // Byte order only affects UCS-2 payloads, and both orders
            // produce the same length.
            Value::Comment(c) => c.encoded_len(ByteOrder::Little),
        }
    }

    /// Encoded byte length
    pub fn size(&self) -> usize {
        match self.type_id() {
            TypeId::Comment => self.count(),
            TypeId::Tiff(t) => self.count() * t.size_in_bytes().max(1),
        }
    }

    /// Unsigned integer at position `i`, if the value is an unsigned
    /// integer family (BYTE, SHORT or LONG)
    pub fn to_u32(&self, i: usize) -> Option<u32> {
        match self {
            Value::Byte(v) => v.get(i).map(|&x| x as u32),
            Value::Short(v) => v.get(i).map(|&x| x as u32),
            Value::Long(v) => v.get(i).copied(),
            _ => None,
        }
    }

    /// Signed widening of the integer at position `i`
    pub fn to_i64(&self, i: usize) -> Option<i64> {
        match self {
            Value::Byte(v) => v.get(i).map(|&x| x as i64),
            Value::Short(v) => v.get(i).map(|&x| x as i64),
            Value::Long(v) => v.get(i).map(|&x| x as i64),
            Value::SByte(v) => v.get(i).map(|&x| x as i64),
            Value::SShort(v) => v.get(i).map(|&x| x as i64),
            Value::SLong(v) => v.get(i).map(|&x| x as i64),
            Value::Undefined(v) => v.get(i).map(|&x| x as i64),
            _ => None,
        }
    }

    /// Encode the value into `buf`, which must hold at least
    /// [`Value::size`] bytes; returns the number of bytes written
    pub fn copy_to(&self, buf: &mut [u8], byte_order: ByteOrder) -> usize {
        let mut pos = 0;
        match self {
            Value::Byte(v) | Value::Undefined(v) => {
                buf[..v.len()].copy_from_slice(v);
                pos = v.len();
            }
            Value::SByte(v) => {
                for &x in v {
                    buf[pos] = x as u8;
                    pos += 1;
                }
            }
            Value::Ascii(v) => {
                for s in v {
                    buf[pos..pos + s.len()].copy_from_slice(s);
                    pos += s.len();
                    buf[pos] = 0;
                    pos += 1;
                }
            }
            Value::Short(v) => {
                for &x in v {
                    pos += byte_order.put_u16(&mut buf[pos..], x);
                }
            }
            Value::SShort(v) => {
                for &x in v {
                    pos += byte_order.put_i16(&mut buf[pos..], x);
                }
            }
            Value::Long(v) => {
                for &x in v {
                    pos += byte_order.put_u32(&mut buf[pos..], x);
                }
            }
            Value::SLong(v) => {
                for &x in v {
                    pos += byte_order.put_i32(&mut buf[pos..], x);
                }
            }
            Value::Rational(v) => {
                for r in v {
                    pos += byte_order.put_u32(&mut buf[pos..], r.num);
                    pos += byte_order.put_u32(&mut buf[pos..], r.denom);
                }
            }
            Value::SRational(v) => {
                for r in v {
                    pos += byte_order.put_i32(&mut buf[pos..], r.num);
                    pos += byte_order.put_i32(&mut buf[pos..], r.denom);
                }
            }
            Value::Float(v) => {
                for &x in v {
                    pos += byte_order.put_u32(&mut buf[pos..], x.to_bits());
                }
            }
            Value::Double(v) => {
                for &x in v {
                    let bits = x.to_bits();
                    match byte_order {
                        ByteOrder::Big => {
                            pos += byte_order.put_u32(&mut buf[pos..], (bits >> 32) as u32);
                            pos += byte_order.put_u32(&mut buf[pos..], bits as u32);
                        }
                        _ => {
                            pos += byte_order.put_u32(&mut buf[pos..], bits as u32);
                            pos += byte_order.put_u32(&mut buf[pos..], (bits >> 32) as u32);
                        }
                    }
                }
            }
            Value::Comment(c) => {
                buf[..8].copy_from_slice(c.charset.marker());
                pos = 8;
                let payload = c.encode_payload(byte_order);
                buf[pos..pos + payload.len()].copy_from_slice(&payload);
                pos += payload.len();
            }
        }
        pos
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Ascii(v) => {
                for (i, s) in v.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", String::from_utf8_lossy(s))?;
                }
                Ok(())
            }
            Value::Comment(c) => f.write_str(&c.text),
            Value::Byte(v) | Value::Undefined(v) => write!(f, "{} bytes", v.len()),
            Value::Short(v) => write_list(f, v),
            Value::Long(v) => write_list(f, v),
            Value::SShort(v) => write_list(f, v),
            Value::SLong(v) => write_list(f, v),
            Value::SByte(v) => write_list(f, v),
            Value::Float(v) => write_list(f, v),
            Value::Double(v) => write_list(f, v),
            Value::Rational(v) => {
                for (i, r) in v.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}/{}", r.num, r.denom)?;
                }
                Ok(())
            }
            Value::SRational(v) => {
                for (i, r) in v.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}/{}", r.num, r.denom)?;
                }
                Ok(())
            }
        }
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, x) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(" ")?;
        }
        write!(f, "{x}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_count_includes_nul() {
        let v = Value::ascii("X");
        assert_eq!(v.count(), 2);
        assert_eq!(v.size(), 2);
    }

    #[test]
    fn test_ascii_copy_appends_nul() {
        let v = Value::ascii("HelloWorld");
        let mut buf = vec![0u8; v.size()];
        let n = v.copy_to(&mut buf, ByteOrder::Little);
        assert_eq!(n, 11);
        assert_eq!(&buf, b"HelloWorld\0");
    }

    #[test]
    fn test_short_copy_little_endian() {
        let v = Value::Short(vec![0x1234, 0x5678]);
        let mut buf = vec![0u8; v.size()];
        v.copy_to(&mut buf, ByteOrder::Little);
        assert_eq!(buf, [0x34, 0x12, 0x78, 0x56]);
    }

    #[test]
    fn test_rational_size() {
        let v = Value::Rational(vec![Rational { num: 1, denom: 3 }]);
        assert_eq!(v.size(), 8);
        let mut buf = vec![0u8; 8];
        v.copy_to(&mut buf, ByteOrder::Big);
        assert_eq!(buf, [0, 0, 0, 1, 0, 0, 0, 3]);
    }

    #[test]
    fn test_to_u32() {
        let v = Value::Long(vec![100, 200]);
        assert_eq!(v.to_u32(1), Some(200));
        assert_eq!(v.to_u32(2), None);
        assert_eq!(Value::ascii("x").to_u32(0), None);
    }

    #[test]
    fn test_comment_roundtrip_ascii() {
        let c = Comment::ascii("charset test");
        let v = Value::Comment(c.clone());
        let mut buf = vec![0u8; v.size()];
        v.copy_to(&mut buf, ByteOrder::Little);
        assert_eq!(&buf[..8], b"ASCII\0\0\0");
        let back = Comment::decode(&buf, ByteOrder::Little).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn test_comment_roundtrip_unicode() {
        let c = Comment::unicode("caf\u{e9}");
        let v = Value::Comment(c.clone());
        let mut buf = vec![0u8; v.size()];
        v.copy_to(&mut buf, ByteOrder::Big);
        assert_eq!(&buf[..8], b"UNICODE\0");
        assert_eq!(buf.len(), 8 + 4 * 2);
        let back = Comment::decode(&buf, ByteOrder::Big).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn test_double_encoding() {
        let v = Value::Double(vec![1.0]);
        let mut buf = vec![0u8; 8];
        v.copy_to(&mut buf, ByteOrder::Little);
        assert_eq!(buf, 1.0f64.to_le_bytes());
        v.copy_to(&mut buf, ByteOrder::Big);
        assert_eq!(buf, 1.0f64.to_be_bytes());
    }
}
