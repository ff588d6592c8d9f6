//! Program headers describe the segments in the vmcore. For a vmcore there is one
//! NOTE segment (VMCOREINFO plus per-cpu register state) followed by LOAD segments
//! covering the kernel's memory.
use super::{Bytes, ElfCoreHeader, Image, Offset, PROGRAM_HEADER_SIZE, Stream, VirtualAddr};
use crate::error::DumpError;

const EXECUTE_FLAG: u32 = 0x1;
const WRITE_FLAG: u32 = 0x2;
const READ_FLAG: u32 = 0x4;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SegmentType {
    /// Not to be used: either it's a segment that is intended to be not used or one
    /// that is not recognized.
    Null,

    /// Memory of the crashed kernel, described by p_filesz and p_memsz.
    Load,

    /// Specifies dynamic linking information.
    Dynamic,

    /// Location and size of a null-terminated path name to invoke as an interpreter.
    Interpreter,

    /// The location and size of auxiliary information.
    Note,

    /// Reserved but has unspecified semantics.
    Shlib,

    /// The location and size of the program header table itself.
    Phdr,

    // The Thread-Local Storage template.
    Tls,
}

impl SegmentType {
    pub fn from_u32(value: u32) -> Self {
        match value {
            1 => SegmentType::Load,
            2 => SegmentType::Dynamic,
            3 => SegmentType::Interpreter,
            4 => SegmentType::Note,
            5 => SegmentType::Shlib,
            6 => SegmentType::Phdr,
            7 => SegmentType::Tls,
            _ => SegmentType::Null, // includes OS and processor specific types
        }
    }
}

/// The parts of an Elf64_Phdr that a vmcore lookup needs. Usually LoadSegment or
/// NoteSegment will be used instead of this.
#[derive(Clone, Debug)]
pub struct ProgramHeader {
    pub stype: SegmentType,

    /// Read/Write/Execute flags.
    pub flags: u32,

    /// Offset to the first byte of the segment.
    pub offset: u64,

    /// Virtual address of the first byte in the segment.
    pub vaddr: u64,

    /// Number of bytes in the segment in the vmcore.
    pub file_size: u64,
}

impl ProgramHeader {
    pub fn parse(bytes: &[u8], base: u64) -> Result<Self, DumpError> {
        let mut s = Stream::new(bytes, base);
        let stype = SegmentType::from_u32(s.read_word()?);
        let flags = s.read_word()?;
        let offset = s.read_xword()?;
        let vaddr = s.read_xword()?;
        s.skip(8)?; // p_paddr
        let file_size = s.read_xword()?;
        Ok(ProgramHeader {
            stype,
            flags,
            offset,
            vaddr,
            file_size,
        })
    }

    /// Where the segment's bytes live in the vmcore.
    pub fn obytes(&self) -> Bytes<Offset> {
        Bytes::from_raw(self.offset, self.file_size)
    }

    /// The part of the kernel's address space that is present in the vmcore.
    pub fn vbytes(&self) -> Bytes<VirtualAddr> {
        Bytes::from_raw(self.vaddr, self.file_size)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LoadSegment {
    /// Addressing for the bytes in the segment using offsets from the start of the vmcore.
    pub obytes: Bytes<Offset>,

    /// Addressing for the bytes in the segment using kernel virtual addresses.
    pub vbytes: Bytes<VirtualAddr>,

    /// Readable, writeable, and/or executable.
    pub flags: u32,
}

impl LoadSegment {
    /// True if all of request can be read from this segment.
    pub fn covers(&self, request: &Bytes<VirtualAddr>) -> bool {
        self.vbytes.strictly_contains(request)
    }

    pub fn to_offset(&self, vaddr: VirtualAddr) -> Option<Offset> {
        if self.vbytes.contains(vaddr) {
            let delta = vaddr.0 - self.vbytes.start.0;
            Some(Offset(self.obytes.start.0 + delta))
        } else {
            None
        }
    }

    /// e.g. "-wr"
    pub fn flags(&self) -> String {
        let mut result = String::new();
        result.push(if self.flags & EXECUTE_FLAG != 0 { 'x' } else { '-' });
        result.push(if self.flags & WRITE_FLAG != 0 { 'w' } else { '-' });
        result.push(if self.flags & READ_FLAG != 0 { 'r' } else { '-' });
        result
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct NoteSegment {
    pub obytes: Bytes<Offset>,
}

/// The program header table. Entries are read from the vmcore as they are needed:
/// even a large vmcore has a small number of program headers so it's OK to re-iterate
/// over them.
#[derive(Clone, Copy, Debug)]
pub struct SegmentTable {
    pub obytes: Bytes<Offset>,
    pub count: u16,
}

impl SegmentTable {
    /// Header should have already been validated.
    pub fn new(image: &dyn Image, header: &ElfCoreHeader) -> Result<Self, DumpError> {
        let size = PROGRAM_HEADER_SIZE as u64 * header.num_ph_entries as u64;
        let obytes = Bytes::<Offset>::from_raw(header.ph_offset, size);
        if !obytes.fits_within(image.len()) {
            return Err(DumpError::CorruptSegment {
                kind: "program header table",
                obytes,
                file_size: image.len(),
            });
        }
        Ok(SegmentTable {
            obytes,
            count: header.num_ph_entries,
        })
    }

    pub fn entry(&self, image: &dyn Image, index: u16) -> Result<ProgramHeader, DumpError> {
        let offset = self.obytes.start.0 + index as u64 * PROGRAM_HEADER_SIZE as u64;
        let bytes = image.read(Offset(offset), PROGRAM_HEADER_SIZE as usize)?;
        ProgramHeader::parse(&bytes, offset)
    }

    /// Returns the first NOTE segment.
    pub fn find_note(&self, image: &dyn Image) -> Result<NoteSegment, DumpError> {
        for index in 0..self.count {
            let ph = self.entry(image, index)?;
            if ph.stype == SegmentType::Note {
                let obytes = ph.obytes();
                if !obytes.fits_within(image.len()) {
                    return Err(DumpError::CorruptSegment {
                        kind: "NOTE segment",
                        obytes,
                        file_size: image.len(),
                    });
                }
                return Ok(NoteSegment { obytes });
            }
        }
        Err(DumpError::MissingSegment {
            kind: "NOTE segment",
            vbytes: None,
        })
    }

    /// Returns the first LOAD segment that covers all of request.
    pub fn find_load(
        &self,
        image: &dyn Image,
        request: &Bytes<VirtualAddr>,
    ) -> Result<LoadSegment, DumpError> {
        for index in 0..self.count {
            let ph = self.entry(image, index)?;
            if ph.stype != SegmentType::Load {
                continue;
            }

            let obytes = ph.obytes();
            if !obytes.fits_within(image.len()) {
                return Err(DumpError::CorruptSegment {
                    kind: "LOAD segment",
                    obytes,
                    file_size: image.len(),
                });
            }

            let load = LoadSegment {
                obytes,
                vbytes: ph.vbytes(),
                flags: ph.flags,
            };
            if load.covers(request) {
                return Ok(load);
            }
        }
        Err(DumpError::MissingSegment {
            kind: "LOAD",
            vbytes: Some(*request),
        })
    }
}
