//! # tifftree
//!
//! An in-memory, mutable representation of a TIFF/EXIF metadata
//! hierarchy, together with a serializer that writes the tree back to a
//! byte stream in a layout compatible with TIFF readers, including the
//! quirks of camera maker-notes.
//!
//! ## Features
//!
//! - Polymorphic composite tree of IFDs, entries, sub-IFDs, maker-notes
//!   and packed binary arrays
//! - Three-pass serializer reconciling entry records, oversize values,
//!   data areas, next-IFD chains and image strips before a byte is written
//! - Maker-note support with vendor headers, private byte orders and
//!   private base offsets (Olympus, Nikon, Sony, headerless Canon)
//! - Binary arrays with size prefixes, zero fillers and the Sony tag
//!   cipher
//! - Path-based tree building from a static structure table
//! - Visitor traversal for external encoders and printers
//!
//! ## Quick Start
//!
//! ```rust
//! use tifftree::{registry, ByteOrder, Group, IoSink, Value, TAG_ROOT};
//!
//! // Build a tree with one entry in IFD0
//! let mut root = registry::create(TAG_ROOT, Group::Ifd0);
//! let entry = root.add(0x010F, Group::Ifd0).unwrap();
//! entry
//!     .entry_data_mut()
//!     .unwrap()
//!     .update_value(Value::ascii("ACME"), ByteOrder::Little);
//!
//! // Serialize it
//! let mut sink = IoSink::plain(Vec::new());
//! root.write_tree(&mut sink, ByteOrder::Little, 0).unwrap();
//! let bytes = sink.into_inner();
//! assert_eq!(&bytes[..2], &[1, 0]); // one directory entry
//! ```
//!
//! ## Architecture
//!
//! The tree is a tagged sum, [`TiffNode`], over ten node kinds; shared
//! behavior lives in the [`nodes::Node`] trait. Byte-order codecs, typed
//! values and the creator registry are separate modules so a parser or
//! encoder can be layered on top without touching the tree internals.

#![allow(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod error;
pub mod io;
pub mod nodes;
pub mod path;
pub mod registry;
pub mod types;
pub mod value;
pub mod visitor;

pub use error::{Result, TiffError};
pub use io::{IoSink, OffsetTarget};
pub use nodes::{
    ArrayCfg, ArrayDef, ArraySet, BinaryArray, BinaryElement, DataEntry, Directory, Entry,
    EntryData, IfdMakernote, ImageEntry, MnEntry, MnHeader, Node, SizeEntry, SubIfdEntry,
    TiffNode,
};
pub use path::{TiffPath, TiffPathItem, TAG_ALL, TAG_NEXT, TAG_ROOT};
pub use types::{ByteOrder, ByteView, Group, TiffType, TypeId};
pub use value::{Comment, CommentCharset, Rational, SRational, Value};
pub use visitor::{GoFlags, Phase, TiffFinder, TiffVisitor};
