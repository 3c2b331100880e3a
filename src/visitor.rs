//! Visitor dispatch over the composite tree
//!
//! External encoders, printers and finders walk the tree through the
//! [`TiffVisitor`] trait. Nodes call back the method matching their kind
//! in document order; the phase flags let a visitor prune the walk
//! between nodes.

use bitflags::bitflags;

use crate::nodes::{
    BinaryArray, BinaryElement, DataEntry, Directory, Entry, IfdMakernote, ImageEntry, MnEntry,
    Node, SizeEntry, SubIfdEntry,
};
use crate::types::Group;

bitflags! {
    /// Traversal phases a visitor can switch off
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Phase: u8 {
        /// Keep walking the tree
        const TRAVERSE = 0b01;
        /// The current maker-note is understood; clearing this while
        /// visiting an `MnEntry` discards the attached maker-note
        const KNOWN_MAKERNOTE = 0b10;
    }
}

/// Mutable phase state for visitors; starts with every phase enabled
#[derive(Debug, Clone)]
pub struct GoFlags(Phase);

impl GoFlags {
    /// All phases enabled
    pub fn new() -> Self {
        GoFlags(Phase::all())
    }

    /// Query a phase
    #[inline]
    pub fn get(&self, phase: Phase) -> bool {
        self.0.contains(phase)
    }

    /// Enable or disable a phase
    pub fn set(&mut self, phase: Phase, on: bool) {
        self.0.set(phase, on);
    }
}

impl Default for GoFlags {
    fn default() -> Self {
        Self::new()
    }
}

/// Double-dispatch hooks called while walking the tree
///
/// All hooks default to no-ops so visitors only implement what they care
/// about. `go` defaults to "keep going".
#[allow(unused_variables)]
pub trait TiffVisitor {
    /// Whether the walk should continue in the given phase
    fn go(&self, phase: Phase) -> bool {
        true
    }

    /// Called for a plain entry
    fn visit_entry(&mut self, entry: &mut Entry) {}

    /// Called for an offsets entry with an attached data area
    fn visit_data_entry(&mut self, entry: &mut DataEntry) {}

    /// Called for an image strips entry
    fn visit_image_entry(&mut self, entry: &mut ImageEntry) {}

    /// Called for a size entry
    fn visit_size_entry(&mut self, entry: &mut SizeEntry) {}

    /// Called for a directory, before its children
    fn visit_directory(&mut self, dir: &mut Directory) {}

    /// Called after a directory's children, before the next-IFD chain
    fn visit_directory_next(&mut self, dir: &mut Directory) {}

    /// Called after a directory's next-IFD chain
    fn visit_directory_end(&mut self, dir: &mut Directory) {}

    /// Called for a sub-IFD entry, before its child directories
    fn visit_sub_ifd(&mut self, entry: &mut SubIfdEntry) {}

    /// Called for the maker-note entry
    fn visit_mn_entry(&mut self, entry: &mut MnEntry) {}

    /// Called for an identified maker-note, before its embedded IFD
    fn visit_ifd_makernote(&mut self, mn: &mut IfdMakernote) {}

    /// Called after an identified maker-note's embedded IFD
    fn visit_ifd_makernote_end(&mut self, mn: &mut IfdMakernote) {}

    /// Called for a binary array, before its elements
    fn visit_binary_array(&mut self, array: &mut BinaryArray) {}

    /// Called after a binary array's elements
    fn visit_binary_array_end(&mut self, array: &mut BinaryArray) {}

    /// Called for one element of a binary array
    fn visit_binary_element(&mut self, element: &mut BinaryElement) {}
}

/// Searches the tree for the first node with a given tag and group and
/// stops the traversal once it is found
pub struct TiffFinder {
    tag: u16,
    group: Group,
    flags: GoFlags,
    found: bool,
}

impl TiffFinder {
    /// Create a finder for `(tag, group)`
    pub fn new(tag: u16, group: Group) -> Self {
        TiffFinder {
            tag,
            group,
            flags: GoFlags::new(),
            found: false,
        }
    }

    /// Whether the node was found
    pub fn found(&self) -> bool {
        self.found
    }

    fn check(&mut self, tag: u16, group: Group) {
        if tag == self.tag && group == self.group {
            self.found = true;
            self.flags.set(Phase::TRAVERSE, false);
        }
    }
}

impl TiffVisitor for TiffFinder {
    fn go(&self, phase: Phase) -> bool {
        self.flags.get(phase)
    }

    fn visit_entry(&mut self, entry: &mut Entry) {
        self.check(entry.tag(), entry.group());
    }

    fn visit_data_entry(&mut self, entry: &mut DataEntry) {
        self.check(entry.tag(), entry.group());
    }

    fn visit_image_entry(&mut self, entry: &mut ImageEntry) {
        self.check(entry.tag(), entry.group());
    }

    fn visit_size_entry(&mut self, entry: &mut SizeEntry) {
        self.check(entry.tag(), entry.group());
    }

    fn visit_directory(&mut self, dir: &mut Directory) {
        self.check(dir.tag(), dir.group());
    }

    fn visit_sub_ifd(&mut self, entry: &mut SubIfdEntry) {
        self.check(entry.tag(), entry.group());
    }

    fn visit_mn_entry(&mut self, entry: &mut MnEntry) {
        self.check(entry.tag(), entry.group());
    }

    fn visit_binary_array(&mut self, array: &mut BinaryArray) {
        self.check(array.tag(), array.group());
    }

    fn visit_binary_element(&mut self, element: &mut BinaryElement) {
        self.check(element.tag(), element.group());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_go_flags_default_on() {
        let flags = GoFlags::new();
        assert!(flags.get(Phase::TRAVERSE));
        assert!(flags.get(Phase::KNOWN_MAKERNOTE));
    }

    #[test]
    fn test_go_flags_toggle() {
        let mut flags = GoFlags::new();
        flags.set(Phase::TRAVERSE, false);
        assert!(!flags.get(Phase::TRAVERSE));
        assert!(flags.get(Phase::KNOWN_MAKERNOTE));
        flags.set(Phase::TRAVERSE, true);
        assert!(flags.get(Phase::TRAVERSE));
    }
}
