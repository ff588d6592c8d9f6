//! VMCOREINFO is a text table the kernel saves for crash tools. It looks like:
//! ```text
//! OSRELEASE=5.10.0-28-amd64
//! PAGESIZE=4096
//! SYMBOL(init_uts_ns)=ffffffff82613400
//! SYMBOL(log_buf)=ffffffff82a2c6e8
//! SIZE(page)=64
//! CRASHTIME=1704067200
//! ```
//! Symbol values are always 16 lowercase hex digits.
use crate::elf::{Offset, VirtualAddr};
use crate::error::DumpError;

const ADDR_DIGITS: usize = 16;

#[derive(Debug)]
pub struct Vmcoreinfo {
    bytes: Vec<u8>,

    /// Where the text starts in the vmcore.
    offset: Offset,
}

impl Vmcoreinfo {
    pub fn new(bytes: Vec<u8>, offset: Offset) -> Self {
        Vmcoreinfo { bytes, offset }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn offset(&self) -> Offset {
        self.offset
    }

    /// Returns the address of a `SYMBOL(name)=` entry. A zero address is treated as
    /// missing: none of the symbols we need can legitimately be at zero.
    pub fn symbol(&self, name: &str) -> Result<VirtualAddr, DumpError> {
        let target = format!("SYMBOL({name})=");
        self.candidates(target.as_bytes())
            .find_map(parse_address)
            .map(VirtualAddr)
            .ok_or_else(|| DumpError::SymbolNotFound(format!("SYMBOL({name})")))
    }

    /// Returns the value of a `KEY=value` line, e.g. OSRELEASE. Empty values are treated
    /// as missing.
    pub fn value(&self, key: &str) -> Result<String, DumpError> {
        let target = format!("{key}=");
        self.candidates(target.as_bytes())
            .filter(|&(start, _)| start == 0 || self.bytes[start - 1] == b'\n')
            .find_map(|(_, rest)| {
                let value = &rest[..line_len(rest)];
                (!value.is_empty()).then(|| String::from_utf8_lossy(value).into_owned())
            })
            .ok_or_else(|| DumpError::SymbolNotFound(key.to_string()))
    }

    /// Like value but for decimal values such as CRASHTIME.
    pub fn number(&self, key: &str) -> Result<u64, DumpError> {
        let value = self.value(key)?;
        value.trim().parse().map_err(|_| {
            DumpError::InvalidFormat(format!("{key} should be a number but is {value:?}"))
        })
    }

    /// Single forward scan returning (start, text after target) for each occurrence of
    /// target.
    fn candidates<'a>(&'a self, target: &'a [u8]) -> impl Iterator<Item = (usize, &'a [u8])> + 'a {
        let first = target[0];
        self.bytes
            .iter()
            .enumerate()
            .filter(move |&(_, &b)| b == first)
            .filter_map(move |(start, _)| {
                self.bytes[start..]
                    .strip_prefix(target)
                    .map(|rest| (start, rest))
            })
    }
}

/// Values end at a newline, a NUL (the kernel pads the note), or the end of the text.
fn line_len(text: &[u8]) -> usize {
    text.iter()
        .position(|&b| b == b'\n' || b == 0)
        .unwrap_or(text.len())
}

fn parse_address((_, rest): (usize, &[u8])) -> Option<u64> {
    let digits = rest.get(..ADDR_DIGITS)?;
    if !digits
        .iter()
        .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(b))
    {
        return None;
    }
    if line_len(&rest[ADDR_DIGITS..]) != 0 {
        return None; // too many digits or trailing junk
    }

    let digits = std::str::from_utf8(digits).ok()?;
    match u64::from_str_radix(digits, 16) {
        Ok(0) | Err(_) => None,
        Ok(addr) => Some(addr),
    }
}
