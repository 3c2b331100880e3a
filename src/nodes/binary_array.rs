//! Binary arrays: packed byte runs interpreted as virtual IFDs
//!
//! Several maker-notes pack a fixed struct-like layout into a single
//! entry. A [`BinaryArray`] exposes such a run as virtual tags at fixed
//! byte strides, described by a static [`ArrayCfg`] and element
//! definitions. Some arrays carry a leading size field, trailing filler
//! bytes, or a byte-substitution cipher over the packed region.

use std::io::Write;

use log::warn;

use crate::error::Result;
use crate::io::IoSink;
use crate::registry;
use crate::types::{to_type_id, ByteOrder, ByteView, Group, TiffType};
use crate::visitor::{Phase, TiffVisitor};

use super::entry::EntryData;
use super::{cmp_tag, Node, TiffNode};

/// Byte-wise transform over a packed array region.
///
/// `encipher` selects the writing direction; parsing uses the inverse.
/// Returns `None` when the input is left unchanged.
pub type CryptFct = fn(tag: u16, bytes: &[u8], encipher: bool) -> Option<Vec<u8>>;

/// Selector choosing one of several array shapes from the raw content
pub type CfgSelFct = fn(tag: u16, bytes: &[u8]) -> Option<usize>;

/// Configuration of one binary array layout
#[derive(Debug)]
pub struct ArrayCfg {
    /// Group of the virtual tags inside the array
    pub group: Group,
    /// Byte order of the packed data; `Invalid` inherits the stream order
    pub byte_order: ByteOrder,
    /// Default TIFF type of the elements, also the type of the size field
    pub el_tiff_type: TiffType,
    /// Byte stride between consecutive virtual tags
    pub tag_step: usize,
    /// Whether the packed region starts with its own total size
    pub has_size: bool,
    /// Whether the region is zero-padded to the end of the last
    /// declared element
    pub has_fillers: bool,
    /// Optional cipher over the whole packed region
    pub crypt_fct: Option<CryptFct>,
}

/// Definition of one element inside a binary array
#[derive(Debug, Clone, Copy)]
pub struct ArrayDef {
    /// Byte offset of the element inside the array
    pub idx: usize,
    /// TIFF type of the element
    pub tiff_type: TiffType,
    /// Number of components
    pub count: usize,
}

impl ArrayDef {
    /// Encoded size of the element, honoring per-tag type promotions
    pub fn size(&self, tag: u16, group: Group) -> usize {
        self.count * to_type_id(self.tiff_type, tag, group).size()
    }
}

/// One array shape of a complex binary array
#[derive(Debug)]
pub struct ArraySet {
    /// The layout configuration
    pub cfg: ArrayCfg,
    /// The declared elements
    pub defs: &'static [ArrayDef],
}

/// One virtual tag inside a binary array
#[derive(Debug, Clone)]
pub struct BinaryElement {
    pub(crate) common: EntryData,
    pub(crate) el_def: ArrayDef,
    pub(crate) el_byte_order: ByteOrder,
}

impl BinaryElement {
    /// Create an element; definition and byte order are set when the
    /// element is placed into an array
    pub fn new(tag: u16, group: Group) -> Self {
        BinaryElement {
            common: EntryData::new(tag, group, TiffType::Undefined),
            el_def: ArrayDef {
                idx: 0,
                tiff_type: TiffType::Undefined,
                count: 0,
            },
            el_byte_order: ByteOrder::Invalid,
        }
    }

    /// Shared entry data
    pub fn common(&self) -> &EntryData {
        &self.common
    }

    /// Shared entry data, mutable
    pub fn common_mut(&mut self) -> &mut EntryData {
        &mut self.common
    }

    /// The element definition
    pub fn el_def(&self) -> &ArrayDef {
        &self.el_def
    }

    /// Set the element definition
    pub fn set_el_def(&mut self, def: ArrayDef) {
        self.el_def = def;
    }

    /// The element's byte-order override from the array configuration
    pub fn el_byte_order(&self) -> ByteOrder {
        self.el_byte_order
    }

    /// Set the element's byte order
    pub fn set_el_byte_order(&mut self, order: ByteOrder) {
        self.el_byte_order = order;
    }

    pub(crate) fn write<W: Write>(
        &mut self,
        sink: &mut IoSink<W>,
        byte_order: ByteOrder,
    ) -> Result<usize> {
        self.common.write_value(sink, byte_order)
    }
}

impl Node for BinaryElement {
    fn tag(&self) -> u16 {
        self.common.tag
    }

    fn group(&self) -> Group {
        self.common.group
    }

    fn idx(&self) -> u32 {
        self.common.idx
    }

    fn count(&self) -> usize {
        self.el_def.count
    }

    fn size(&self) -> usize {
        self.common.value.as_ref().map(|v| v.size()).unwrap_or(0)
    }
}

/// A packed byte run interpreted as many virtual tags
///
/// A simple array is born with its configuration; a complex array owns a
/// set of candidate shapes and picks one by group or by content.
#[derive(Debug)]
pub struct BinaryArray {
    pub(crate) common: EntryData,
    set: Option<&'static [ArraySet]>,
    cfg_sel: Option<CfgSelFct>,
    cfg: Option<&'static ArrayCfg>,
    defs: &'static [ArrayDef],
    pub(crate) elements: Vec<TiffNode>,
    orig_data: ByteView,
    decoded: bool,
}

impl BinaryArray {
    /// Create a simple array with a fixed configuration
    pub fn new(tag: u16, group: Group, cfg: &'static ArrayCfg, defs: &'static [ArrayDef]) -> Self {
        BinaryArray {
            common: EntryData::new(tag, group, cfg.el_tiff_type),
            set: None,
            cfg_sel: None,
            cfg: Some(cfg),
            defs,
            elements: Vec::new(),
            orig_data: ByteView::new(),
            decoded: false,
        }
    }

    /// Create a complex array; the shape is bound later by
    /// [`BinaryArray::initialize`] or [`BinaryArray::initialize_from_content`]
    pub fn new_complex(
        tag: u16,
        group: Group,
        set: &'static [ArraySet],
        cfg_sel: CfgSelFct,
    ) -> Self {
        BinaryArray {
            common: EntryData::new(tag, group, TiffType::Undefined),
            set: Some(set),
            cfg_sel: Some(cfg_sel),
            cfg: None,
            defs: &[],
            elements: Vec::new(),
            orig_data: ByteView::new(),
            decoded: false,
        }
    }

    /// Shared entry data
    pub fn common(&self) -> &EntryData {
        &self.common
    }

    /// Shared entry data, mutable
    pub fn common_mut(&mut self) -> &mut EntryData {
        &mut self.common
    }

    /// The bound configuration, if any
    pub fn cfg(&self) -> Option<&'static ArrayCfg> {
        self.cfg
    }

    /// The bound element definitions
    pub fn defs(&self) -> &'static [ArrayDef] {
        self.defs
    }

    /// The decoded elements
    pub fn elements(&self) -> &[TiffNode] {
        &self.elements
    }

    /// Whether any element has been attached
    pub fn decoded(&self) -> bool {
        self.decoded
    }

    /// Bind the shape whose configuration matches `group`.
    ///
    /// A simple or already-bound array reports success immediately.
    pub fn initialize(&mut self, group: Group) -> bool {
        if self.cfg.is_some() {
            return true;
        }
        let set = match self.set {
            Some(set) => set,
            None => return false,
        };
        for shape in set {
            if shape.cfg.group == group {
                self.cfg = Some(&shape.cfg);
                self.defs = shape.defs;
                return true;
            }
        }
        false
    }

    /// Bind the shape chosen by the content selector, evaluated over the
    /// raw bytes of the array
    pub fn initialize_from_content(&mut self) -> bool {
        let sel = match self.cfg_sel {
            Some(sel) => sel,
            None => return true, // not a complex array
        };
        let set = match self.set {
            Some(set) => set,
            None => return false,
        };
        match sel(self.common.tag, self.common.data.as_slice()) {
            Some(i) if i < set.len() => {
                self.cfg = Some(&set[i].cfg);
                self.defs = set[i].defs;
                true
            }
            _ => false,
        }
    }

    /// Copy of the array carrying configuration and raw bytes but no
    /// decoded elements
    pub(crate) fn clone_config(&self) -> BinaryArray {
        BinaryArray {
            common: self.common.clone(),
            set: self.set,
            cfg_sel: self.cfg_sel,
            cfg: self.cfg,
            defs: self.defs,
            elements: Vec::new(),
            orig_data: self.orig_data.clone(),
            decoded: false,
        }
    }

    /// Remember the raw bytes as originally parsed
    pub fn ini_orig_buf(&mut self) {
        self.orig_data = self.common.data.clone();
    }

    /// Overwrite the remembered original bytes; sizes must match
    pub fn upd_orig_buf(&mut self, bytes: &[u8]) -> bool {
        if self.orig_data.len() != bytes.len() {
            return false;
        }
        self.orig_data.to_mut().copy_from_slice(bytes);
        true
    }

    /// Create an element at byte offset `idx` with definition `def`,
    /// clamped to the array bounds; returns the element's byte size
    pub fn add_element(&mut self, idx: usize, def: &ArrayDef) -> usize {
        let cfg = match self.cfg {
            Some(cfg) => cfg,
            None => return 0,
        };
        let tag = (idx / cfg.tag_step) as u16;
        let sz = def
            .size(tag, cfg.group)
            .min(self.common.size.saturating_sub(idx));
        let mut element = match registry::create(tag as u32, cfg.group) {
            TiffNode::BinaryElement(element) => element,
            _ => {
                // The group is not configured as a binary array group in
                // the creator table
                warn!(
                    "no binary element creator for tag {tag:#06x} in {}",
                    cfg.group
                );
                return 0;
            }
        };
        element.common.set_data(self.common.data.slice(idx, sz));
        element.set_el_def(*def);
        element.set_el_byte_order(cfg.byte_order);
        self.add_child(TiffNode::BinaryElement(element));
        sz
    }

    /// Attach an element and mark the array as decoded
    pub fn add_child(&mut self, node: TiffNode) -> &mut TiffNode {
        self.elements.push(node);
        self.decoded = true;
        // Just pushed, cannot fail
        self.elements.last_mut().unwrap()
    }

    pub(crate) fn add_path_array(
        &mut self,
        tag: u16,
        path: &mut crate::path::TiffPath,
        mut object: Option<TiffNode>,
    ) -> Option<&mut TiffNode> {
        path.pop();
        let tpi = path.top()?;
        self.initialize(tpi.group());
        // Only look for an existing element while composite items remain;
        // duplicates are not allowed above the terminal level
        let mut pos = None;
        if path.len() > 1 {
            pos = self
                .elements
                .iter()
                .position(|e| e.tag() == tpi.tag() && e.group() == tpi.group());
        }
        let pos = match pos {
            Some(p) => p,
            None => {
                let node = match object.take() {
                    Some(obj) if path.len() == 1 => obj,
                    other => {
                        object = other;
                        registry::create(tpi.ext_tag(), tpi.group())
                    }
                };
                self.add_child(node);
                self.common.count = self.elements.len();
                self.elements.len() - 1
            }
        };
        self.elements[pos].add_path(tag, path, object)
    }

    pub(crate) fn accept(&mut self, visitor: &mut dyn TiffVisitor) {
        visitor.visit_binary_array(self);
        for element in &mut self.elements {
            if !visitor.go(Phase::TRAVERSE) {
                break;
            }
            element.accept(visitor);
        }
        if visitor.go(Phase::TRAVERSE) {
            visitor.visit_binary_array_end(self);
        }
    }

    /// Serialize the packed region through a scratch buffer: optional
    /// size field, elements at their strides with zero-filled gaps,
    /// optional trailing fillers, optional cipher over the whole region
    pub(crate) fn write<W: Write>(
        &mut self,
        sink: &mut IoSink<W>,
        byte_order: ByteOrder,
        offset: i64,
        value_idx: u32,
        data_idx: u32,
        image_idx: &mut u32,
    ) -> Result<usize> {
        let cfg = match self.cfg {
            Some(cfg) if self.decoded => cfg,
            // An undecoded array round-trips like a plain entry
            _ => return self.common.write_value(sink, byte_order),
        };
        let byte_order = if cfg.byte_order.is_valid() {
            cfg.byte_order
        } else {
            byte_order
        };
        let total_size = self.size();
        self.elements.sort_by(cmp_tag);

        let mut idx = 0usize;
        let mut scratch = IoSink::plain(Vec::new());
        // Some arrays keep their total size in the first element
        if cfg.has_size {
            let el_size = to_type_id(cfg.el_tiff_type, 0, cfg.group).size();
            let mut buf = [0u8; 4];
            match el_size {
                2 => idx += byte_order.put_u16(&mut buf, total_size as u16),
                4 => idx += byte_order.put_u32(&mut buf, total_size as u32),
                _ => {}
            }
            scratch.write(&buf[..el_size.min(4)])?;
        }
        for element in &mut self.elements {
            // Skip the manufactured size tag, if present
            if cfg.has_size && element.tag() == 0 {
                continue;
            }
            let new_idx = element.tag() as usize * cfg.tag_step;
            idx += fill_gap(&mut scratch, idx, new_idx)?;
            idx += element.write(
                &mut scratch,
                byte_order,
                offset + new_idx as i64,
                value_idx,
                data_idx,
                image_idx,
            )?;
        }
        if cfg.has_fillers && !self.defs.is_empty() {
            let last = &self.defs[self.defs.len() - 1];
            let last_tag = (last.idx / cfg.tag_step) as u16;
            idx += fill_gap(&mut scratch, idx, last.idx + last.size(last_tag, cfg.group))?;
        }

        let mut bytes = scratch.into_inner();
        if let Some(crypt) = cfg.crypt_fct {
            if let Some(transformed) = crypt(self.common.tag, &bytes, true) {
                bytes = transformed;
            }
        }
        sink.write(&bytes)?;
        Ok(idx)
    }
}

impl Node for BinaryArray {
    fn tag(&self) -> u16 {
        self.common.tag
    }

    fn group(&self) -> Group {
        self.common.group
    }

    fn idx(&self) -> u32 {
        self.common.idx
    }

    fn count(&self) -> usize {
        let type_size = match self.cfg {
            Some(_) if self.decoded => {
                to_type_id(self.common.tiff_type, self.common.tag, self.common.group).size()
            }
            _ => return self.common.count,
        };
        if self.elements.is_empty() {
            return 0;
        }
        let type_size = if type_size == 0 {
            warn!(
                "Directory {}, entry {:#06x} has unknown TIFF type {}; setting type size 1",
                self.common.group, self.common.tag, self.common.tiff_type
            );
            1
        } else {
            type_size
        };
        (self.size() + type_size / 2) / type_size
    }

    fn size(&self) -> usize {
        let cfg = match self.cfg {
            Some(cfg) if self.decoded => cfg,
            _ => return self.common.size,
        };
        if self.elements.is_empty() {
            return 0;
        }
        // Elements must not overlap and tags must be unique; the end of
        // the highest-tagged element bounds the array
        let mut last_tag = 0usize;
        let mut last_size = cfg.tag_step;
        for element in &self.elements {
            if element.tag() as usize > last_tag {
                last_tag = element.tag() as usize;
                last_size = element.size();
            }
        }
        let mut end = last_tag * cfg.tag_step + last_size;
        if cfg.has_fillers && !self.defs.is_empty() {
            let last = &self.defs[self.defs.len() - 1];
            let tag = (last.idx / cfg.tag_step) as u16;
            end = end.max(last.idx + last.size(tag, cfg.group));
        }
        end
    }
}

/// Zero-fill from `curr` to `tobe`; returns the number of filler bytes
fn fill_gap<W: Write>(sink: &mut IoSink<W>, curr: usize, tobe: usize) -> Result<usize> {
    if curr < tobe {
        sink.write(&vec![0u8; tobe - curr])?;
        Ok(tobe - curr)
    } else {
        Ok(0)
    }
}

/// The Sony tag cipher: a byte-substitution over the packed region.
///
/// The substitution maps `i` to `i^3 mod 249` for bytes below 249 and
/// leaves the rest alone; deciphering applies the inverse table.
pub fn sony_tag_cipher(_tag: u16, bytes: &[u8], encipher: bool) -> Option<Vec<u8>> {
    if bytes.is_empty() {
        return None;
    }
    let mut code = [0u8; 256];
    for i in 0..249u32 {
        let c = ((i * i * i) % 249) as u8;
        if encipher {
            code[i as usize] = c;
        } else {
            code[c as usize] = i as u8;
        }
    }
    for (i, slot) in code.iter_mut().enumerate().skip(249) {
        *slot = i as u8;
    }
    Some(bytes.iter().map(|&b| code[b as usize]).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    static TEST_CFG: ArrayCfg = ArrayCfg {
        group: Group::CanonCs,
        byte_order: ByteOrder::Invalid,
        el_tiff_type: TiffType::Short,
        tag_step: 2,
        has_size: true,
        has_fillers: true,
        crypt_fct: None,
    };

    static TEST_DEFS: [ArrayDef; 2] = [
        ArrayDef {
            idx: 2,
            tiff_type: TiffType::Short,
            count: 1,
        },
        ArrayDef {
            idx: 6,
            tiff_type: TiffType::Short,
            count: 1,
        },
    ];

    fn element_with_value(tag: u16, value: u16) -> TiffNode {
        let mut element = BinaryElement::new(tag, Group::CanonCs);
        element
            .common_mut()
            .update_value(Value::Short(vec![value]), ByteOrder::Little);
        TiffNode::BinaryElement(element)
    }

    #[test]
    fn test_size_spans_to_last_element() {
        let mut array = BinaryArray::new(0x0001, Group::Canon, &TEST_CFG, &TEST_DEFS);
        array.add_child(element_with_value(1, 7));
        array.add_child(element_with_value(3, 9));
        // Highest tag 3 at stride 2 plus its two bytes
        assert_eq!(array.size(), 8);
    }

    #[test]
    fn test_count_rounds_by_element_size() {
        let mut array = BinaryArray::new(0x0001, Group::Canon, &TEST_CFG, &TEST_DEFS);
        array.add_child(element_with_value(1, 7));
        array.add_child(element_with_value(3, 9));
        assert_eq!(array.count(), 4);
    }

    #[test]
    fn test_undecoded_array_keeps_raw_count() {
        let mut array = BinaryArray::new(0x0001, Group::Canon, &TEST_CFG, &TEST_DEFS);
        array
            .common_mut()
            .update_value(Value::Undefined(vec![1, 2, 3]), ByteOrder::Little);
        assert!(!array.decoded());
        assert_eq!(array.count(), 3);
        assert_eq!(array.size(), 3);
    }

    #[test]
    fn test_sony_cipher_roundtrip() {
        let plain: Vec<u8> = (0u8..=255).collect();
        let ciphered = sony_tag_cipher(0x9402, &plain, true).unwrap();
        assert_ne!(ciphered, plain);
        let back = sony_tag_cipher(0x9402, &ciphered, false).unwrap();
        assert_eq!(back, plain);
    }

    #[test]
    fn test_sony_cipher_fixed_point_above_249() {
        let plain = vec![250u8, 255];
        let ciphered = sony_tag_cipher(0x9402, &plain, true).unwrap();
        assert_eq!(ciphered, plain);
    }

    #[test]
    fn test_add_element_clamps_to_array() {
        let mut array = BinaryArray::new(0x0001, Group::Canon, &TEST_CFG, &TEST_DEFS);
        array
            .common_mut()
            .set_data(ByteView::from_vec(vec![0; 7]));
        let def = ArrayDef {
            idx: 6,
            tiff_type: TiffType::Short,
            count: 1,
        };
        // Two bytes declared but only one remains past offset 6
        assert_eq!(array.add_element(6, &def), 1);
        assert_eq!(array.elements().len(), 1);
        assert_eq!(array.elements()[0].tag(), 3);
    }
}
