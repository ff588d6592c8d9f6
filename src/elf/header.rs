//! The ELF header at the start of the vmcore. See
//! https://en.wikipedia.org/wiki/Executable_and_Linkable_Format#ELF_header
use super::{Image, Offset, Stream};
use crate::error::DumpError;
use crate::utils;

pub const ELF_HEADER_SIZE: usize = 64;
pub const PROGRAM_HEADER_SIZE: u16 = 56;

/// Magic, 64-bit, little endian, version 1, System V ABI, and zero padding.
pub const CORE_IDENT: [u8; 16] = [
    0x7f, b'E', b'L', b'F', 2, 1, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0,
];

pub const ET_CORE: u16 = 4;
pub const EM_X86_64: u16 = 62;
pub const EV_CURRENT: u32 = 1;

/// The Elf64_Ehdr fields needed to validate a vmcore and find its program headers,
/// see https://llvm.org/doxygen/BinaryFormat_2ELF_8h_source.html
#[derive(Clone, Debug)]
pub struct ElfCoreHeader {
    pub ident: [u8; 16],
    pub etype: u16,
    pub machine: u16,
    pub version: u32,
    pub entry: u64,

    /// Offset to the program header table.
    pub ph_offset: u64,
    pub ph_entry_size: u16,
    pub num_ph_entries: u16,
}

impl ElfCoreHeader {
    /// Reads the header from the start of the vmcore and checks that it's something we
    /// can handle.
    pub fn read(image: &dyn Image) -> Result<Self, DumpError> {
        let bytes = image.read(Offset(0), ELF_HEADER_SIZE)?;
        let header = ElfCoreHeader::parse(&bytes)?;
        header.validate()?;
        Ok(header)
    }

    pub fn parse(bytes: &[u8]) -> Result<Self, DumpError> {
        let mut s = Stream::new(bytes, 0);
        let ident = s.read_bytes()?;
        let etype = s.read_half()?;
        let machine = s.read_half()?;
        let version = s.read_word()?;
        let entry = s.read_xword()?;
        let ph_offset = s.read_xword()?;
        s.skip(8 + 4 + 2)?; // e_shoff, e_flags, e_ehsize
        let ph_entry_size = s.read_half()?;
        let num_ph_entries = s.read_half()?;
        Ok(ElfCoreHeader {
            ident,
            etype,
            machine,
            version,
            entry,
            ph_offset,
            ph_entry_size,
            num_ph_entries,
        })
    }

    pub fn validate(&self) -> Result<(), DumpError> {
        fn invalid(reason: String) -> impl FnOnce() -> DumpError {
            move || DumpError::InvalidFormat(reason)
        }

        utils::require(
            self.ident[0..4] == CORE_IDENT[0..4],
            invalid("bad magic".to_string()),
        )?;
        utils::require(
            self.ident == CORE_IDENT,
            invalid(format!("unsupported ident {:02x?}", self.ident)),
        )?;
        utils::require(
            self.etype == ET_CORE,
            invalid(format!("type is {} not a core file", self.stype())),
        )?;
        utils::require(
            self.machine == EM_X86_64,
            invalid(format!("machine is {} not x86-64", self.machine())),
        )?;
        utils::require(
            self.version == EV_CURRENT,
            invalid(format!("bad elf version: {}", self.version)),
        )?;
        utils::require(
            self.entry == 0,
            invalid(format!("core files have no entry point but found {:#x}", self.entry)),
        )?;
        utils::require(
            self.ph_offset != 0,
            invalid("there is no program header table".to_string()),
        )?;
        utils::require(
            self.ph_entry_size == PROGRAM_HEADER_SIZE,
            invalid(format!(
                "program headers are {} bytes, expected {PROGRAM_HEADER_SIZE}",
                self.ph_entry_size
            )),
        )?;
        utils::require(
            self.num_ph_entries != 0,
            invalid("there are no program headers".to_string()),
        )
    }

    pub fn stype(&self) -> &'static str {
        match self.etype {
            0 => "none",
            1 => "relocatable",
            2 => "executable",
            3 => "shared object",
            4 => "core",
            _ => "unknown",
        }
    }

    pub fn machine(&self) -> &'static str {
        match self.machine {
            0x03 => "x86",
            0x28 => "Arm",
            0x3E => "x86-64",
            0xB7 => "Arm 64-bit",
            0xF3 => "RISC-V",
            _ => "unknown",
        }
    }
}
