//! Maps kernel virtual addresses to offsets within the vmcore.
use super::{Bytes, Image, LoadSegment, Offset, SegmentTable, Stream, VirtualAddr};
use crate::error::DumpError;

/// Result of a translation. segment should be handed back in as the cached segment
/// for the next translation: reads tend to cluster (e.g. the ring buffer variables
/// are all in the kernel's data section) so this saves re-reading program headers.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Translation {
    pub offset: Offset,
    pub segment: LoadSegment,
}

pub struct AddressTranslator {
    table: SegmentTable,
}

impl AddressTranslator {
    pub fn new(table: SegmentTable) -> Self {
        AddressTranslator { table }
    }

    /// Returns the offset of the first of size bytes at vaddr. All size bytes are
    /// guaranteed to be within one LOAD segment.
    pub fn translate(
        &self,
        image: &dyn Image,
        cached: Option<LoadSegment>,
        vaddr: VirtualAddr,
        size: u64,
    ) -> Result<Translation, DumpError> {
        let request = Bytes::<VirtualAddr>::from_raw(vaddr.0, size);
        if size == 0 {
            return Err(DumpError::MissingSegment {
                kind: "LOAD",
                vbytes: Some(request),
            });
        }

        let segment = match cached {
            Some(segment) if segment.covers(&request) => segment,
            _ => self.table.find_load(image, &request)?,
        };
        let offset = segment.to_offset(vaddr).ok_or(DumpError::MissingSegment {
            kind: "LOAD",
            vbytes: Some(request),
        })?;
        Ok(Translation { offset, segment })
    }

    /// Copies size bytes of kernel memory starting at vaddr. cache is updated with the
    /// segment the bytes came from.
    pub fn read_bytes(
        &self,
        image: &dyn Image,
        cache: &mut Option<LoadSegment>,
        vaddr: VirtualAddr,
        size: usize,
    ) -> Result<Vec<u8>, DumpError> {
        let translation = self.translate(image, *cache, vaddr, size as u64)?;
        *cache = Some(translation.segment);
        image.read(translation.offset, size)
    }

    /// Reads a pointer or unsigned long.
    pub fn read_u64(
        &self,
        image: &dyn Image,
        cache: &mut Option<LoadSegment>,
        vaddr: VirtualAddr,
    ) -> Result<u64, DumpError> {
        let bytes = self.read_bytes(image, cache, vaddr, 8)?;
        Stream::new(&bytes, vaddr.0).read_xword()
    }

    /// Reads an unsigned int.
    pub fn read_u32(
        &self,
        image: &dyn Image,
        cache: &mut Option<LoadSegment>,
        vaddr: VirtualAddr,
    ) -> Result<u32, DumpError> {
        let bytes = self.read_bytes(image, cache, vaddr, 4)?;
        Stream::new(&bytes, vaddr.0).read_word()
    }

    /// Reads an int.
    pub fn read_i32(
        &self,
        image: &dyn Image,
        cache: &mut Option<LoadSegment>,
        vaddr: VirtualAddr,
    ) -> Result<i32, DumpError> {
        let bytes = self.read_bytes(image, cache, vaddr, 4)?;
        Stream::new(&bytes, vaddr.0).read_int()
    }
}
