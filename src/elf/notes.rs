//! The NOTE segment of a vmcore is a sequence of note records: one PRSTATUS note per
//! cpu and a VMCOREINFO note with the kernel symbols needed to make sense of memory.
use super::{Bytes, Image, NoteSegment, Offset, Stream};
use crate::error::DumpError;
use crate::utils;
use crate::vmcoreinfo::Vmcoreinfo;

/// n_namesz, n_descsz, and n_type.
pub const NOTE_HEADER_SIZE: u64 = 12;

/// The kernel writes VMCOREINFO with a zero note type, see crash_save_vmcoreinfo().
pub const VMCOREINFO_NOTE_TYPE: u32 = 0;

/// The kernel reserves a page for VMCOREINFO.
pub const MAX_VMCOREINFO_SIZE: usize = 4096;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NoteRecord {
    /// Where the note header starts.
    pub offset: Offset,
    pub ntype: u32,

    /// The descriptor (payload) of the note, n_descsz bytes starting after the padded
    /// name.
    pub desc: Bytes<Offset>,
}

/// Iterates over the note records within the NOTE segment. Iteration stops at the end
/// of the segment or after the first error.
pub struct NoteWalker<'a> {
    image: &'a dyn Image,
    segment: NoteSegment,
    cursor: u64,
    failed: bool,
}

impl<'a> NoteWalker<'a> {
    pub fn new(image: &'a dyn Image, segment: NoteSegment) -> Self {
        NoteWalker {
            image,
            segment,
            cursor: segment.obytes.start.0,
            failed: false,
        }
    }

    fn read_record(&mut self) -> Result<NoteRecord, DumpError> {
        let offset = Offset(self.cursor);
        let corrupt = |reason: &str| DumpError::CorruptNote {
            offset,
            reason: reason.to_string(),
        };

        let header = Bytes::<Offset>::from_raw(self.cursor, NOTE_HEADER_SIZE);
        if !self.segment.obytes.end().is_some_and(|end| {
            header.end().is_some_and(|header_end| header_end <= end)
        }) {
            return Err(corrupt("header runs past the end of the NOTE segment"));
        }

        let bytes = self.image.read(offset, NOTE_HEADER_SIZE as usize)?;
        let mut s = Stream::new(&bytes, offset.0);
        let name_size = s.read_word()?;
        let desc_size = s.read_word()?;
        let ntype = s.read_word()?;

        let desc_start = self.cursor + NOTE_HEADER_SIZE + utils::align_to_word(name_size);
        let next = desc_start
            .checked_add(utils::align_to_word(desc_size))
            .ok_or_else(|| corrupt("note size overflows"))?;
        self.cursor = next;

        Ok(NoteRecord {
            offset,
            ntype,
            desc: Bytes::from_raw(desc_start, desc_size as u64),
        })
    }
}

impl Iterator for NoteWalker<'_> {
    type Item = Result<NoteRecord, DumpError>;

    fn next(&mut self) -> Option<Self::Item> {
        let end = self.segment.obytes.end()?;
        if self.failed || self.cursor >= end.0 {
            return None;
        }
        let result = self.read_record();
        self.failed = result.is_err();
        Some(result)
    }
}

/// Returns the descriptor of the first VMCOREINFO note.
pub fn find_vmcoreinfo(image: &dyn Image, segment: NoteSegment) -> Result<Vmcoreinfo, DumpError> {
    for record in NoteWalker::new(image, segment) {
        let record = record?;
        if record.ntype != VMCOREINFO_NOTE_TYPE {
            continue;
        }

        let corrupt = |reason: String| DumpError::CorruptNote {
            offset: record.offset,
            reason,
        };
        if record.desc.size == 0 {
            return Err(corrupt("VMCOREINFO is empty".to_string()));
        }
        let in_segment = match (record.desc.end(), segment.obytes.end()) {
            (Some(desc_end), Some(end)) => desc_end <= end,
            _ => false,
        };
        if !in_segment {
            return Err(corrupt(format!(
                "VMCOREINFO at {} with size 0x{:x} runs past the end of the NOTE segment",
                record.desc.start, record.desc.size
            )));
        }
        if record.desc.size > MAX_VMCOREINFO_SIZE as u64 {
            return Err(DumpError::TooLarge {
                size: record.desc.size,
                max: MAX_VMCOREINFO_SIZE,
            });
        }

        let bytes = image.read(record.desc.start, record.desc.size as usize)?;
        return Ok(Vmcoreinfo::new(bytes, record.desc.start));
    }
    Err(DumpError::MissingSegment {
        kind: "VMCOREINFO note",
        vbytes: None,
    })
}
