//! Master serializer test file — organized per tree feature.
//!
//! Each submodule covers one slice of the serializer:
//!
//!   cargo test --test write_tests
//!   cargo test --test write_tests makernotes

use tifftree::{registry, ByteOrder, Group, IoSink, TiffNode, Value, TAG_ROOT};

fn new_root() -> TiffNode {
    registry::create(TAG_ROOT, Group::Ifd0)
}

fn set_value(node: &mut TiffNode, value: Value) {
    node.entry_data_mut()
        .expect("entry-like node")
        .update_value(value, ByteOrder::Little);
}

fn serialize(root: &mut TiffNode) -> Vec<u8> {
    let mut sink = IoSink::plain(Vec::new());
    root.write_tree(&mut sink, ByteOrder::Little, 0).unwrap();
    sink.into_inner()
}

fn read_u32_le(bytes: &[u8], pos: usize) -> u32 {
    u32::from_le_bytes(bytes[pos..pos + 4].try_into().unwrap())
}

fn read_u16_le(bytes: &[u8], pos: usize) -> u16 {
    u16::from_le_bytes(bytes[pos..pos + 2].try_into().unwrap())
}

// ===========================================================================
// Minimal IFDs and value placement
// ===========================================================================

mod minimal_ifd {
    use super::*;

    #[test]
    fn test_single_inline_entry() {
        let mut root = new_root();
        let entry = root.add(0x010F, Group::Ifd0).unwrap();
        set_value(entry, Value::ascii("X"));

        let bytes = serialize(&mut root);
        // count, one 12-byte entry, zeroed next-IFD pointer
        assert_eq!(
            bytes,
            vec![
                0x01, 0x00, // 1 entry
                0x0F, 0x01, // tag 0x010F
                0x02, 0x00, // ASCII
                0x02, 0x00, 0x00, 0x00, // 2 components
                0x58, 0x00, 0x00, 0x00, // "X\0" right-padded
                0x00, 0x00, 0x00, 0x00, // no next IFD
            ]
        );
    }

    #[test]
    fn test_oversize_value_goes_to_value_area() {
        let mut root = new_root();
        let entry = root.add(0x010E, Group::Ifd0).unwrap();
        set_value(entry, Value::ascii("HelloWorld"));

        let bytes = serialize(&mut root);
        assert_eq!(bytes.len(), 30);
        // The pointer field holds the offset of the value area
        assert_eq!(read_u32_le(&bytes, 10), 18);
        assert_eq!(&bytes[18..29], b"HelloWorld\0");
        // One zero byte pads the value to a word boundary
        assert_eq!(bytes[29], 0);
    }

    #[test]
    fn test_empty_tree_writes_nothing() {
        let mut root = new_root();
        let bytes = serialize(&mut root);
        assert!(bytes.is_empty());
    }

    #[test]
    fn test_big_endian_record() {
        let mut root = new_root();
        let entry = root.add(0x0103, Group::Ifd0).unwrap();
        entry
            .entry_data_mut()
            .unwrap()
            .update_value(Value::Short(vec![6]), ByteOrder::Big);

        let mut sink = IoSink::plain(Vec::new());
        root.write_tree(&mut sink, ByteOrder::Big, 0).unwrap();
        let bytes = sink.into_inner();
        assert_eq!(&bytes[..2], &[0x00, 0x01]);
        assert_eq!(&bytes[2..4], &[0x01, 0x03]);
        assert_eq!(&bytes[10..12], &[0x00, 0x06]);
    }

    #[test]
    fn test_lazy_tiff_header() {
        let mut root = new_root();
        let entry = root.add(0x010F, Group::Ifd0).unwrap();
        set_value(entry, Value::ascii("X"));

        // A standalone TIFF: 8-byte header, IFD0 at offset 8
        let header = vec![0x49, 0x49, 0x2A, 0x00, 0x08, 0x00, 0x00, 0x00];
        let mut sink = IoSink::new(Vec::new(), Some(header));
        root.write_tree(&mut sink, ByteOrder::Little, 8).unwrap();
        let bytes = sink.into_inner();
        assert_eq!(&bytes[..4], b"II*\0");
        assert_eq!(read_u16_le(&bytes, 8), 1);
        assert_eq!(bytes.len(), 8 + 18);
    }

    #[test]
    fn test_chained_next_ifd() {
        let mut root = new_root();
        let e0 = root.add(0x010F, Group::Ifd0).unwrap();
        set_value(e0, Value::ascii("A"));
        let e1 = root.add(0x0103, Group::Ifd1).unwrap();
        set_value(e1, Value::Short(vec![6]));

        let bytes = serialize(&mut root);
        // Root: 2 + 12 + 4 = 18 bytes, then IFD1 at 18
        assert_eq!(read_u32_le(&bytes, 14), 18);
        assert_eq!(read_u16_le(&bytes, 18), 1);
        assert_eq!(bytes.len(), 18 + 18);
    }
}

// ===========================================================================
// Data areas (thumbnail-style offset/size pairs)
// ===========================================================================

mod data_areas {
    use super::*;
    use tifftree::ByteView;

    #[test]
    fn test_thumbnail_data_area_layout() {
        // Source buffer with the "thumbnail" at offset 100
        let mut source = vec![0u8; 120];
        source[100] = 0xAA;
        source[101] = 0xBB;
        source[102] = 0xCC;
        let source = ByteView::from_vec(source);
        let sizes = Value::Long(vec![3]);

        let mut root = new_root();
        let node = root.add(0x0201, Group::Ifd1).unwrap();
        set_value(node, Value::Long(vec![100]));
        match node {
            TiffNode::DataEntry(data_entry) => {
                data_entry.set_strips(&sizes, &source, 0);
                assert!(data_entry.data_area().is_some());
            }
            _ => panic!("0x0201 in IFD1 must be a data entry"),
        }
        let size_node = root.add(0x0202, Group::Ifd1).unwrap();
        set_value(size_node, Value::Long(vec![3]));

        let bytes = serialize(&mut root);
        // Root collapses to the bare next pointer chain: 2 + 0 + 4
        let ifd1 = 6;
        assert_eq!(read_u32_le(&bytes, 2), ifd1 as u32);
        assert_eq!(read_u16_le(&bytes, ifd1), 2);
        // IFD1 record is 2 + 24 + 4 = 30 bytes; the data area follows
        let area = ifd1 + 30;
        // The rewritten offset points at the rebased data area
        assert_eq!(read_u32_le(&bytes, ifd1 + 10), area as u32);
        assert_eq!(&bytes[area..area + 3], &[0xAA, 0xBB, 0xCC]);
        // Data area padded to a word boundary
        assert_eq!(bytes.len(), area + 4);
    }

    #[test]
    fn test_rejected_data_area_serializes_empty() {
        let source = ByteView::from_vec(vec![0u8; 50]);
        // Non-contiguous offsets are refused
        let sizes = Value::Long(vec![10, 10]);

        let mut root = new_root();
        let node = root.add(0x0201, Group::Ifd1).unwrap();
        set_value(node, Value::Long(vec![0, 30]));
        match node {
            TiffNode::DataEntry(data_entry) => {
                data_entry.set_strips(&sizes, &source, 0);
                assert!(data_entry.data_area().is_none());
            }
            _ => panic!("0x0201 in IFD1 must be a data entry"),
        }
        let size_node = root.add(0x0202, Group::Ifd1).unwrap();
        set_value(size_node, Value::Long(vec![10, 10]));

        // The tree still serializes; the data area is simply absent
        let bytes = serialize(&mut root);
        let ifd1 = 6;
        // 2 entries; offsets value (8 bytes) and sizes value (8 bytes)
        // follow the record, but no data area after them
        assert_eq!(bytes.len(), ifd1 + 30 + 16);
    }
}

// ===========================================================================
// Image strips
// ===========================================================================

mod image_strips {
    use super::*;
    use tifftree::ByteView;

    #[test]
    fn test_strips_go_to_image_area() {
        let source = ByteView::from_vec((0u8..32).collect());
        let sizes = Value::Long(vec![5, 4]);

        let mut root = new_root();
        let node = root.add(0x0111, Group::Ifd0).unwrap();
        set_value(node, Value::Long(vec![0, 16]));
        match node {
            TiffNode::ImageEntry(image_entry) => {
                image_entry.set_strips(&sizes, &source, 0);
                assert_eq!(image_entry.strips().len(), 2);
            }
            _ => panic!("0x0111 in IFD0 must be an image entry"),
        }
        let size_node = root.add(0x0117, Group::Ifd0).unwrap();
        set_value(size_node, Value::Long(vec![5, 4]));

        let bytes = serialize(&mut root);
        // Record 30 bytes + two 8-byte values; image area at 46
        assert_eq!(read_u32_le(&bytes, 30), 46);
        assert_eq!(read_u32_le(&bytes, 34), 52); // 46 + aligned 5
        assert_eq!(&bytes[46..51], &[0, 1, 2, 3, 4]);
        assert_eq!(bytes[51], 0); // pad
        assert_eq!(&bytes[52..56], &[16, 17, 18, 19]);
        assert_eq!(bytes.len(), 56);
    }
}

// ===========================================================================
// Sub-IFDs
// ===========================================================================

mod sub_ifds {
    use super::*;

    #[test]
    fn test_dangling_sub_ifd_is_not_added() {
        let mut root = new_root();
        assert!(root.add(0x8769, Group::Ifd0).is_none());
        match &root {
            TiffNode::Directory(dir) => assert!(dir.children().is_empty()),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_sub_ifd_children_sorted_by_group() {
        let mut root = new_root();
        // Populate sub-image 2 before sub-image 1
        let e2 = root.add(0x0100, Group::SubImage2).unwrap();
        set_value(e2, Value::Short(vec![2]));
        let e1 = root.add(0x0100, Group::SubImage1).unwrap();
        set_value(e1, Value::Short(vec![1]));

        let bytes = serialize(&mut root);
        // One 0x014A entry with two LONG offsets in the value area at 18
        assert_eq!(read_u16_le(&bytes, 0), 1);
        assert_eq!(read_u16_le(&bytes, 2), 0x014A);
        assert_eq!(read_u32_le(&bytes, 10), 18);
        let first = read_u32_le(&bytes, 18) as usize;
        let second = read_u32_le(&bytes, 22) as usize;
        assert!(first < second);
        // The first directory belongs to sub-image 1
        assert_eq!(read_u16_le(&bytes, first + 10), 1);
        assert_eq!(read_u16_le(&bytes, second + 10), 2);
    }

    #[test]
    fn test_exif_directory_nesting() {
        let mut root = new_root();
        let entry = root.add(0x9000, Group::Exif).unwrap();
        set_value(entry, Value::Undefined(vec![0x30, 0x32, 0x33, 0x31]));

        let bytes = serialize(&mut root);
        // The Exif pointer is a LONG with the directory offset inline
        assert_eq!(read_u16_le(&bytes, 2), 0x8769);
        assert_eq!(read_u16_le(&bytes, 4), 4);
        let exif = read_u32_le(&bytes, 10) as usize;
        assert_eq!(exif, 18);
        assert_eq!(read_u16_le(&bytes, exif), 1);
        assert_eq!(read_u16_le(&bytes, exif + 2), 0x9000);
        assert_eq!(&bytes[exif + 10..exif + 14], b"0231");
    }
}

// ===========================================================================
// Maker-notes
// ===========================================================================

mod makernotes {
    use super::*;

    #[test]
    fn test_olympus_offsets_relative_to_makernote() {
        let mut root = new_root();
        let entry = root.add(0x0200, Group::Olympus).unwrap();
        set_value(entry, Value::Short(vec![1, 2, 3]));

        let bytes = serialize(&mut root);
        // Root holds the Exif pointer; Exif holds the maker-note
        let exif = read_u32_le(&bytes, 10) as usize;
        assert_eq!(read_u16_le(&bytes, exif + 2), 0x927C);
        let mn = read_u32_le(&bytes, exif + 10) as usize;
        assert_eq!(&bytes[mn..mn + 8], b"OLYMPUS\0");
        // The embedded IFD starts after the 12-byte header; its value
        // pointer is relative to the maker-note, not to the stream
        let ifd = mn + 12;
        assert_eq!(read_u16_le(&bytes, ifd), 1);
        // 2 + 12 with no next pointer, plus the 12-byte header
        assert_eq!(read_u32_le(&bytes, ifd + 10), 12 + 14);
        let value = mn + 12 + 14;
        assert_eq!(&bytes[value..value + 6], &[1, 0, 2, 0, 3, 0]);
        // Maker-note count is its byte size: header + 14 + 6
        assert_eq!(read_u32_le(&bytes, exif + 6), 32);
    }

    #[test]
    fn test_nikon_embedded_tiff_header_and_byte_order() {
        let mut root = new_root();
        let entry = root.add(0x0004, Group::Nikon).unwrap();
        // The value is encoded with the maker-note's own byte order at
        // write time; Nikon defaults to the image order here
        set_value(entry, Value::Short(vec![0x0102]));

        let bytes = serialize(&mut root);
        let exif = read_u32_le(&bytes, 10) as usize;
        let mn = read_u32_le(&bytes, exif + 10) as usize;
        assert_eq!(&bytes[mn..mn + 6], b"Nikon\0");
        assert_eq!(&bytes[mn + 10..mn + 12], b"II");
        assert_eq!(read_u16_le(&bytes, mn + 12), 42);
        // First IFD directly after the embedded TIFF header
        assert_eq!(read_u32_le(&bytes, mn + 14), 8);
        let ifd = mn + 18;
        assert_eq!(read_u16_le(&bytes, ifd), 1);
        assert_eq!(read_u16_le(&bytes, ifd + 2), 0x0004);
        // Inline value, encoded little endian
        assert_eq!(&bytes[ifd + 10..ifd + 12], &[0x02, 0x01]);
    }

    #[test]
    fn test_headerless_canon_makernote() {
        let mut root = new_root();
        let entry = root.add(0x0006, Group::Canon).unwrap();
        set_value(entry, Value::ascii("IMG"));

        let bytes = serialize(&mut root);
        let exif = read_u32_le(&bytes, 10) as usize;
        let mn = read_u32_le(&bytes, exif + 10) as usize;
        // No header: the IFD starts right at the maker-note position and
        // its internal offsets stay stream-absolute
        assert_eq!(read_u16_le(&bytes, mn), 1);
        assert_eq!(read_u16_le(&bytes, mn + 2), 0x0006);
    }

    #[test]
    fn test_unknown_makernote_group_is_refused() {
        assert!(registry::create_makernote(0x927C, Group::Exif, Group::Gps).is_none());
    }
}

// ===========================================================================
// Binary arrays
// ===========================================================================

mod binary_arrays {
    use super::*;

    #[test]
    fn test_canon_array_with_size_prefix_and_gap() {
        let mut root = new_root();
        let e1 = root.add(0x0001, Group::CanonCs).unwrap();
        set_value(e1, Value::Short(vec![0x1111]));
        let e3 = root.add(0x0003, Group::CanonCs).unwrap();
        set_value(e3, Value::Short(vec![0x3333]));

        let bytes = serialize(&mut root);
        let exif = read_u32_le(&bytes, 10) as usize;
        let mn = read_u32_le(&bytes, exif + 10) as usize;
        // Headerless Canon maker-note IFD with the array entry
        assert_eq!(read_u16_le(&bytes, mn + 2), 0x0001);
        let array = read_u32_le(&bytes, mn + 10) as usize;
        // Leading size, element at stride 2, zero gap, element at stride 6
        assert_eq!(read_u16_le(&bytes, array), 8);
        assert_eq!(read_u16_le(&bytes, array + 2), 0x1111);
        assert_eq!(read_u16_le(&bytes, array + 4), 0);
        assert_eq!(read_u16_le(&bytes, array + 6), 0x3333);
    }

    #[test]
    fn test_array_count_reflects_virtual_elements() {
        let mut root = new_root();
        let e3 = root.add(0x0003, Group::CanonCs).unwrap();
        set_value(e3, Value::Short(vec![7]));

        let bytes = serialize(&mut root);
        let exif = read_u32_le(&bytes, 10) as usize;
        let mn = read_u32_le(&bytes, exif + 10) as usize;
        // Array spans 4 shorts (tags 0..=3), so the entry count is 4
        assert_eq!(read_u32_le(&bytes, mn + 6), 4);
    }

    #[test]
    fn test_sony_ciphered_array_roundtrips() {
        use tifftree::nodes::sony_tag_cipher;

        let mut root = new_root();
        let e = root.add(0x0004, Group::SonyFp).unwrap();
        set_value(e, Value::SByte(vec![25]));

        let bytes = serialize(&mut root);
        let exif = read_u32_le(&bytes, 10) as usize;
        let mn = read_u32_le(&bytes, exif + 10) as usize;
        // Sony maker-note: 12-byte signature, then the IFD
        assert_eq!(&bytes[mn..mn + 4], b"SONY");
        let ifd = mn + 12;
        assert_eq!(read_u16_le(&bytes, ifd + 2), 0x9402);
        // 5 enciphered bytes: four gap bytes and the temperature
        let array_offset = read_u32_le(&bytes, ifd + 10) as usize;
        let packed = &bytes[array_offset..array_offset + 5];
        let plain = sony_tag_cipher(0x9402, packed, false).unwrap();
        assert_eq!(plain, vec![0, 0, 0, 0, 25]);
    }
}

// ===========================================================================
// Universal properties
// ===========================================================================

mod properties {
    use super::*;
    use tifftree::{Directory, Entry, TiffError};

    #[test]
    fn test_planned_size_matches_written_bytes() {
        let mut root = new_root();
        for (tag, text) in [(0x010Fu32, "make"), (0x0110, "model string"), (0x0131, "s")] {
            let entry = root.add(tag, Group::Ifd0).unwrap();
            set_value(entry, Value::ascii(text));
        }
        let planned = root.size();
        let bytes = serialize(&mut root);
        assert_eq!(bytes.len(), planned);
    }

    #[test]
    fn test_children_emitted_sorted_by_tag() {
        let mut root = new_root();
        for tag in [0x0131u32, 0x010F, 0x0110] {
            let entry = root.add(tag, Group::Ifd0).unwrap();
            set_value(entry, Value::Short(vec![1]));
        }
        let bytes = serialize(&mut root);
        let tags: Vec<u16> = (0..3).map(|i| read_u16_le(&bytes, 2 + 12 * i)).collect();
        assert_eq!(tags, vec![0x010F, 0x0110, 0x0131]);
    }

    #[test]
    fn test_directory_overflow_fails() {
        let mut dir = Directory::new(0, Group::Ifd0);
        for i in 0..=0xFFFFu32 {
            dir.add_child(TiffNode::Entry(Entry::new((i & 0xFFFF) as u16, Group::Ifd0)));
        }
        let mut root = TiffNode::Directory(dir);
        let mut sink = IoSink::plain(Vec::new());
        let err = root.write_tree(&mut sink, ByteOrder::Little, 0);
        assert!(matches!(err, Err(TiffError::TooManyDirEntries { .. })));
    }

    #[test]
    fn test_visitor_pruning_skips_second_sibling() {
        use tifftree::{GoFlags, Phase, TiffVisitor};

        struct StopAfterFirst {
            flags: GoFlags,
            visited: usize,
        }

        impl TiffVisitor for StopAfterFirst {
            fn go(&self, phase: Phase) -> bool {
                self.flags.get(phase)
            }

            fn visit_entry(&mut self, _entry: &mut Entry) {
                self.visited += 1;
                self.flags.set(Phase::TRAVERSE, false);
            }
        }

        let mut root = new_root();
        let _ = root.add(0x010F, Group::Ifd0);
        let _ = root.add(0x0110, Group::Ifd0);

        let mut visitor = StopAfterFirst {
            flags: GoFlags::new(),
            visited: 0,
        };
        root.accept(&mut visitor);
        assert_eq!(visitor.visited, 1);
    }

    #[test]
    fn test_unknown_makernote_is_discarded_by_visitor() {
        use tifftree::{GoFlags, MnEntry, Phase, TiffVisitor};

        struct RejectMakernote {
            flags: GoFlags,
        }

        impl TiffVisitor for RejectMakernote {
            fn go(&self, phase: Phase) -> bool {
                self.flags.get(phase)
            }

            fn visit_mn_entry(&mut self, _entry: &mut MnEntry) {
                self.flags.set(Phase::KNOWN_MAKERNOTE, false);
            }
        }

        let mut root = new_root();
        let _ = root.add(0x0200, Group::Olympus);
        let mut visitor = RejectMakernote {
            flags: GoFlags::new(),
        };
        root.accept(&mut visitor);

        // The maker-note entry survives but its identified tree is gone
        let mn_entry = root.add(0x927C, Group::Exif).unwrap();
        match mn_entry {
            TiffNode::MnEntry(entry) => assert!(entry.makernote().is_none()),
            _ => panic!("maker-note entry expected"),
        }
    }

    #[test]
    fn test_finder_stops_traversal() {
        use tifftree::TiffFinder;

        let mut root = new_root();
        let _ = root.add(0x010F, Group::Ifd0);
        let mut finder = TiffFinder::new(0x010F, Group::Ifd0);
        root.accept(&mut finder);
        assert!(finder.found());

        let mut finder = TiffFinder::new(0xDEAD, Group::Gps);
        root.accept(&mut finder);
        assert!(!finder.found());
    }
}
