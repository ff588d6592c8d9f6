//! Decoding of the fixed-size little-endian structures (headers, program headers,
//! note headers) after they've been read from the Image.
use crate::error::DumpError;

/// Cursor over a buffer that was read from the vmcore. base is the file offset the
/// buffer was read from and is only used for error messages.
pub struct Stream<'a> {
    bytes: &'a [u8],
    base: u64,
    pub offset: usize,
}

impl<'a> Stream<'a> {
    pub fn new(bytes: &'a [u8], base: u64) -> Self {
        Stream {
            bytes,
            base,
            offset: 0,
        }
    }

    pub fn read_bytes<const N: usize>(&mut self) -> Result<[u8; N], DumpError> {
        let end = self.offset + N;
        let bytes = self
            .bytes
            .get(self.offset..end)
            .ok_or_else(|| self.truncated())?;
        self.offset = end;

        let mut result = [0; N];
        result.copy_from_slice(bytes);
        Ok(result)
    }

    /// Steps over fields we don't care about.
    pub fn skip(&mut self, count: usize) -> Result<(), DumpError> {
        if self.offset + count > self.bytes.len() {
            return Err(self.truncated());
        }
        self.offset += count;
        Ok(())
    }

    pub fn read_half(&mut self) -> Result<u16, DumpError> {
        Ok(u16::from_le_bytes(self.read_bytes()?))
    }

    pub fn read_word(&mut self) -> Result<u32, DumpError> {
        Ok(u32::from_le_bytes(self.read_bytes()?))
    }

    pub fn read_int(&mut self) -> Result<i32, DumpError> {
        Ok(i32::from_le_bytes(self.read_bytes()?))
    }

    pub fn read_xword(&mut self) -> Result<u64, DumpError> {
        Ok(u64::from_le_bytes(self.read_bytes()?))
    }

    fn truncated(&self) -> DumpError {
        DumpError::InvalidFormat(format!(
            "structure at {:#x} is truncated",
            self.base + self.offset as u64
        ))
    }
}
