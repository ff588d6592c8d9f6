//! Synthetic vmcores for unit tests.
use super::{Bytes, ELF_HEADER_SIZE, Image, Offset, PROGRAM_HEADER_SIZE};
use crate::elf::notes::VMCOREINFO_NOTE_TYPE;
use std::io;
use std::path::{Path, PathBuf};

const PT_LOAD: u32 = 1;
const PT_NOTE: u32 = 4;
const PF_W: u32 = 0x2;
const PF_R: u32 = 0x4;

/// Address of the (fake) kernel data section holding the ring buffer variables.
pub const VARS_ADDR: u64 = 0xffffffff81a00000;

/// Address of the (fake) ring buffer.
pub const LOG_BUF_ADDR: u64 = 0xffff880000100000;

pub struct MemImage {
    path: PathBuf,
    bytes: Vec<u8>,
}

impl MemImage {
    pub fn new(bytes: Vec<u8>) -> Self {
        MemImage {
            path: PathBuf::from("test.vmcore"),
            bytes,
        }
    }
}

impl Image for MemImage {
    fn path(&self) -> &Path {
        &self.path
    }

    fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn read_unchecked(&self, offset: Offset, buffer: &mut [u8]) -> io::Result<()> {
        let start = offset.0 as usize;
        buffer.copy_from_slice(&self.bytes[start..start + buffer.len()]);
        Ok(())
    }
}

/// Writes bytes to a file in the temp directory.
pub fn scratch_file(name: &str, bytes: &[u8]) -> PathBuf {
    let mut path = std::env::temp_dir();
    path.push(format!("crashdmesg-{}-{name}.vmcore", std::process::id()));
    std::fs::write(&path, bytes).unwrap();
    path
}

/// Builds a vmcore laid out as: ELF header, program headers (NOTE first if there are
/// any notes, then the LOADs in the order they were added), note records, and then
/// the bytes for each LOAD segment.
#[derive(Clone, Default)]
pub struct CoreBuilder {
    notes: Vec<(String, u32, Vec<u8>)>,
    loads: Vec<(u64, Vec<u8>)>,
}

impl CoreBuilder {
    pub fn new() -> Self {
        CoreBuilder::default()
    }

    pub fn note(mut self, name: &str, ntype: u32, desc: Vec<u8>) -> Self {
        self.notes.push((name.to_string(), ntype, desc));
        self
    }

    pub fn vmcoreinfo(self, text: &str) -> Self {
        self.note("VMCOREINFO", VMCOREINFO_NOTE_TYPE, text.as_bytes().to_vec())
    }

    pub fn load(mut self, vaddr: u64, bytes: Vec<u8>) -> Self {
        self.loads.push((vaddr, bytes));
        self
    }

    pub fn image(&self) -> MemImage {
        MemImage::new(self.build())
    }

    /// Where the NOTE segment will be placed.
    pub fn note_obytes(&self) -> Bytes<Offset> {
        let notes_size: usize = self.notes.iter().map(|(n, _, d)| note_size(n, d)).sum();
        Bytes::from_raw(self.data_offset() as u64, notes_size as u64)
    }

    /// Offset of a field within the index'th program header.
    pub fn ph_field_offset(&self, index: usize, field: usize) -> usize {
        ELF_HEADER_SIZE + index * PROGRAM_HEADER_SIZE as usize + field
    }

    pub fn build(&self) -> Vec<u8> {
        let num_ph = self.num_ph();
        let mut bytes = elf_header(num_ph as u16);

        let notes = self.note_obytes();
        let mut offset = notes.start.0 + notes.size;
        if !self.notes.is_empty() {
            bytes.extend(phdr(PT_NOTE, 0, notes.start.0, 0, notes.size));
        }
        for (vaddr, data) in self.loads.iter() {
            bytes.extend(phdr(PT_LOAD, PF_R | PF_W, offset, *vaddr, data.len() as u64));
            offset += data.len() as u64;
        }

        for (name, ntype, desc) in self.notes.iter() {
            bytes.extend(note(name, *ntype, desc));
        }
        for (_, data) in self.loads.iter() {
            bytes.extend(data);
        }
        bytes
    }

    fn num_ph(&self) -> usize {
        self.loads.len() + if self.notes.is_empty() { 0 } else { 1 }
    }

    fn data_offset(&self) -> usize {
        ELF_HEADER_SIZE + self.num_ph() * PROGRAM_HEADER_SIZE as usize
    }
}

/// The kernel state the ring buffer reconstruction needs. buffer holds log_buf_len
/// bytes.
pub struct KernelLog {
    pub buffer: Vec<u8>,
    pub log_buf_len: i32,
    pub log_end: u32,
    pub logged_chars: u32,
}

impl KernelLog {
    /// A vmcore with VMCOREINFO, a data section with the four ring buffer variables,
    /// and a segment for the buffer itself.
    pub fn core(&self) -> CoreBuilder {
        let text = format!(
            "OSRELEASE=2.6.32-71.el6.x86_64\n\
             PAGESIZE=4096\n\
             SYMBOL(log_buf)={:016x}\n\
             SYMBOL(log_end)={:016x}\n\
             SYMBOL(log_buf_len)={:016x}\n\
             SYMBOL(logged_chars)={:016x}\n\
             CRASHTIME=1300000000\n",
            VARS_ADDR,
            VARS_ADDR + 0x10,
            VARS_ADDR + 0x20,
            VARS_ADDR + 0x30,
        );

        let mut vars = vec![0u8; 0x40];
        vars[0x00..0x08].copy_from_slice(&LOG_BUF_ADDR.to_le_bytes());
        vars[0x10..0x14].copy_from_slice(&self.log_end.to_le_bytes());
        vars[0x20..0x24].copy_from_slice(&self.log_buf_len.to_le_bytes());
        vars[0x30..0x34].copy_from_slice(&self.logged_chars.to_le_bytes());

        // Lookups never hand out the last byte of a segment so add some slop.
        let mut buffer = self.buffer.clone();
        buffer.extend([0u8; 16]);

        CoreBuilder::new()
            .note("CORE", 1, vec![0; 336])
            .vmcoreinfo(&text)
            .load(VARS_ADDR, vars)
            .load(LOG_BUF_ADDR, buffer)
    }
}

fn elf_header(num_ph: u16) -> Vec<u8> {
    let mut hdr = vec![0u8; ELF_HEADER_SIZE];
    hdr[0..16].copy_from_slice(&super::CORE_IDENT);
    hdr[16..18].copy_from_slice(&super::ET_CORE.to_le_bytes());
    hdr[18..20].copy_from_slice(&super::EM_X86_64.to_le_bytes());
    hdr[20..24].copy_from_slice(&super::EV_CURRENT.to_le_bytes());
    hdr[32..40].copy_from_slice(&(ELF_HEADER_SIZE as u64).to_le_bytes()); // e_phoff
    hdr[52..54].copy_from_slice(&(ELF_HEADER_SIZE as u16).to_le_bytes()); // e_ehsize
    hdr[54..56].copy_from_slice(&PROGRAM_HEADER_SIZE.to_le_bytes());
    hdr[56..58].copy_from_slice(&num_ph.to_le_bytes());
    hdr
}

fn phdr(ptype: u32, flags: u32, offset: u64, vaddr: u64, size: u64) -> Vec<u8> {
    let mut phdr = vec![0u8; PROGRAM_HEADER_SIZE as usize];
    phdr[0..4].copy_from_slice(&ptype.to_le_bytes());
    phdr[4..8].copy_from_slice(&flags.to_le_bytes());
    phdr[8..16].copy_from_slice(&offset.to_le_bytes());
    phdr[16..24].copy_from_slice(&vaddr.to_le_bytes());
    phdr[32..40].copy_from_slice(&size.to_le_bytes()); // p_filesz
    phdr[40..48].copy_from_slice(&size.to_le_bytes()); // p_memsz
    phdr
}

fn note_size(name: &str, desc: &[u8]) -> usize {
    12 + align4(name.len() + 1) + align4(desc.len())
}

fn note(name: &str, ntype: u32, desc: &[u8]) -> Vec<u8> {
    let name_size = name.len() + 1; // includes the NUL
    let mut note = vec![0u8; note_size(name, desc)];
    note[0..4].copy_from_slice(&(name_size as u32).to_le_bytes());
    note[4..8].copy_from_slice(&(desc.len() as u32).to_le_bytes());
    note[8..12].copy_from_slice(&ntype.to_le_bytes());
    note[12..12 + name.len()].copy_from_slice(name.as_bytes());
    let desc_offset = 12 + align4(name_size);
    note[desc_offset..desc_offset + desc.len()].copy_from_slice(desc);
    note
}

fn align4(n: usize) -> usize {
    (n + 3) & !3
}
