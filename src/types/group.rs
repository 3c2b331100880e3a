//! Group namespaces for TIFF tags
//!
//! A tag number alone is ambiguous; the group names the directory (or
//! virtual directory) it lives in. The declaration order below is load
//! bearing: every group from `Mn` onwards belongs to a maker-note, and
//! directories in those groups are serialized in insertion order instead
//! of sorted order, because some cameras expect their maker-note entries
//! exactly as they wrote them.

use std::fmt;

/// Namespace of a TIFF tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Group {
    /// No group; placeholder for unaddressed nodes
    None,
    /// Primary image IFD
    Ifd0,
    /// Thumbnail IFD
    Ifd1,
    /// Second chained IFD (TIFF-based RAW formats)
    Ifd2,
    /// Third chained IFD (CR2 RAW data)
    Ifd3,
    /// First sub-image IFD below IFD0
    SubImage1,
    /// Second sub-image IFD below IFD0
    SubImage2,
    /// Third sub-image IFD below IFD0
    SubImage3,
    /// Fourth sub-image IFD below IFD0
    SubImage4,
    /// Exif IFD
    Exif,
    /// GPS info IFD
    Gps,
    /// Interoperability IFD
    Interop,
    /// Maker-note sentinel; the `MakerNote` entry itself
    Mn,
    /// Olympus maker-note IFD
    Olympus,
    /// Nikon maker-note IFD
    Nikon,
    /// Nikon AF fine tune binary array
    NikonAft,
    /// Pentax maker-note IFD
    Pentax,
    /// Canon maker-note IFD
    Canon,
    /// Canon camera settings binary array
    CanonCs,
    /// Sony maker-note IFD
    Sony,
    /// Sony camera settings binary array
    SonyCs,
    /// Sony camera settings binary array, second layout
    SonyCs2,
    /// Sony focus position binary array (enciphered)
    SonyFp,
}

impl Group {
    /// Whether entries of this group live inside a maker-note structure.
    ///
    /// Directories at or above the sentinel keep their insertion order on
    /// the wire; everything below is sorted by tag as TIFF requires.
    #[inline]
    pub fn is_makernote(self) -> bool {
        self >= Group::Mn
    }

    /// Whether this group is a directory embedded inside a maker-note.
    ///
    /// Image strips referenced from such groups are written into the
    /// maker-note's local data area so the maker-note stays self-contained;
    /// strips of ordinary groups go to the global image area.
    #[inline]
    pub fn in_makernote(self) -> bool {
        self > Group::Mn
    }

    /// Short name used in diagnostics
    pub fn name(self) -> &'static str {
        match self {
            Group::None => "(none)",
            Group::Ifd0 => "Ifd0",
            Group::Ifd1 => "Ifd1",
            Group::Ifd2 => "Ifd2",
            Group::Ifd3 => "Ifd3",
            Group::SubImage1 => "SubImage1",
            Group::SubImage2 => "SubImage2",
            Group::SubImage3 => "SubImage3",
            Group::SubImage4 => "SubImage4",
            Group::Exif => "Exif",
            Group::Gps => "Gps",
            Group::Interop => "Interop",
            Group::Mn => "MakerNote",
            Group::Olympus => "Olympus",
            Group::Nikon => "Nikon",
            Group::NikonAft => "NikonAft",
            Group::Pentax => "Pentax",
            Group::Canon => "Canon",
            Group::CanonCs => "CanonCs",
            Group::Sony => "Sony",
            Group::SonyCs => "SonyCs",
            Group::SonyCs2 => "SonyCs2",
            Group::SonyFp => "SonyFp",
        }
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_makernote_sentinel() {
        assert!(!Group::Ifd0.is_makernote());
        assert!(!Group::Gps.is_makernote());
        assert!(Group::Mn.is_makernote());
        assert!(Group::Canon.is_makernote());
    }

    #[test]
    fn test_in_makernote_excludes_sentinel() {
        assert!(!Group::Mn.in_makernote());
        assert!(Group::Sony.in_makernote());
        assert!(Group::CanonCs.in_makernote());
        assert!(!Group::Exif.in_makernote());
    }

    #[test]
    fn test_group_ordering() {
        assert!(Group::Ifd0 < Group::Exif);
        assert!(Group::SubImage1 < Group::SubImage2);
        assert!(Group::Exif < Group::Mn);
    }
}
