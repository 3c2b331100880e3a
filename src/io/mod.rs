//! I/O support for serializing TIFF trees

mod sink;

pub use sink::{IoSink, OffsetTarget};
