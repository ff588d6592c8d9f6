//! The kernel's log buffer (the one dmesg prints). Older kernels write log text into
//! a circular buffer of log_buf_len bytes:
//! * log_buf points to the buffer.
//! * log_end is the index of the next byte to write. It keeps counting past
//!   log_buf_len so it has to be masked to get an index into the buffer.
//! * logged_chars is the number of bytes written so far, capped at log_buf_len.
//!
//! Until the buffer fills up the text is simply the first logged_chars bytes. Once it
//! has wrapped the oldest text starts at log_end and runs to the end of the buffer,
//! and the newest text runs from the start of the buffer up to log_end.
use crate::elf::{AddressTranslator, Bytes, Image, LoadSegment, Offset, VirtualAddr};
use crate::error::DumpError;
use crate::vmcoreinfo::Vmcoreinfo;

/// Larger log_buf_len values are assumed to be garbage.
pub const MAX_LOG_BUF_LEN: i32 = 1024 * 1024;

/// Where the ring buffer variables live in the crashed kernel.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RingBufferSymbols {
    pub log_buf: VirtualAddr,
    pub log_end: VirtualAddr,
    pub log_buf_len: VirtualAddr,
    pub logged_chars: VirtualAddr,
}

impl RingBufferSymbols {
    pub fn find(info: &Vmcoreinfo) -> Result<Self, DumpError> {
        Ok(RingBufferSymbols {
            log_buf: info.symbol("log_buf")?,
            log_end: info.symbol("log_end")?,
            log_buf_len: info.symbol("log_buf_len")?,
            logged_chars: info.symbol("logged_chars")?,
        })
    }
}

/// The values of the ring buffer variables.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RingBufferDescriptor {
    /// `char *log_buf`
    pub log_buf: VirtualAddr,

    /// `unsigned log_end`
    pub log_end: u32,

    /// `int log_buf_len`
    pub log_buf_len: i32,

    /// `unsigned logged_chars`
    pub logged_chars: u32,
}

impl RingBufferDescriptor {
    pub fn read(
        image: &dyn Image,
        translator: &AddressTranslator,
        cache: &mut Option<LoadSegment>,
        symbols: &RingBufferSymbols,
    ) -> Result<Self, DumpError> {
        Ok(RingBufferDescriptor {
            log_buf: VirtualAddr(translator.read_u64(image, cache, symbols.log_buf)?),
            log_end: translator.read_u32(image, cache, symbols.log_end)?,
            log_buf_len: translator.read_i32(image, cache, symbols.log_buf_len)?,
            logged_chars: translator.read_u32(image, cache, symbols.logged_chars)?,
        })
    }

    /// Returns log_buf_len once it's known to be usable as a mask.
    pub fn capacity(&self) -> Result<u32, DumpError> {
        let len = self.log_buf_len;
        if len <= 0 {
            return Err(DumpError::ReconstructionFailed(format!(
                "log_buf_len is {len}"
            )));
        }
        if len > MAX_LOG_BUF_LEN {
            return Err(DumpError::ReconstructionFailed(format!(
                "log_buf_len is 0x{len:x} but at most 0x{MAX_LOG_BUF_LEN:x} is supported"
            )));
        }
        let len = len as u32;
        if !len.is_power_of_two() {
            return Err(DumpError::ReconstructionFailed(format!(
                "log_buf_len 0x{len:x} isn't a power of two"
            )));
        }
        Ok(len)
    }

    /// True if the kernel has written at least log_buf_len bytes.
    pub fn wrapped(&self) -> Result<bool, DumpError> {
        Ok(self.logged_chars >= self.capacity()?)
    }

    /// Returns the one or two ranges of kernel memory that hold the log text, oldest
    /// first. Ranges may be empty.
    pub fn regions(&self) -> Result<Vec<Bytes<VirtualAddr>>, DumpError> {
        let capacity = self.capacity()?;
        if self.logged_chars < capacity {
            return Ok(vec![Bytes::from_raw(
                self.log_buf.0,
                self.logged_chars as u64,
            )]);
        }

        let head = self.log_end & (capacity - 1);
        let oldest_start = self.log_buf.0.checked_add(head as u64).ok_or_else(|| {
            DumpError::ReconstructionFailed(format!(
                "log_buf {} + 0x{head:x} overflows",
                self.log_buf
            ))
        })?;
        let oldest = Bytes::<VirtualAddr>::from_raw(oldest_start, (capacity - head) as u64);
        let newest = Bytes::<VirtualAddr>::from_raw(self.log_buf.0, head as u64);

        let total = oldest.size + newest.size;
        if total != capacity as u64 || total > MAX_LOG_BUF_LEN as u64 {
            return Err(DumpError::ReconstructionFailed(format!(
                "parts add up to 0x{total:x} bytes, expected 0x{capacity:x}"
            )));
        }
        Ok(vec![oldest, newest])
    }
}

/// One contiguous piece of the ring buffer.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Part {
    pub vbytes: Bytes<VirtualAddr>,

    /// None for empty parts which aren't read.
    pub offset: Option<Offset>,

    /// The LOAD segment the part was read from.
    pub segment: Option<LoadSegment>,
}

/// The ring buffer contents in chronological order.
#[derive(Debug)]
pub struct RingBuffer {
    pub parts: Vec<Part>,
    pub text: Vec<u8>,
}

/// Copies the log text out of the vmcore. Nothing is read (or allocated) unless the
/// descriptor is sane.
pub fn reconstruct(
    image: &dyn Image,
    translator: &AddressTranslator,
    cache: &mut Option<LoadSegment>,
    descriptor: &RingBufferDescriptor,
) -> Result<RingBuffer, DumpError> {
    let regions = descriptor.regions()?;
    let total: u64 = regions.iter().map(|r| r.size).sum();

    let mut parts = Vec::with_capacity(regions.len());
    let mut text = Vec::with_capacity(total as usize);
    for region in regions {
        if region.size == 0 {
            parts.push(Part {
                vbytes: region,
                offset: None,
                segment: None,
            });
            continue;
        }

        let translation = translator.translate(image, *cache, region.start, region.size)?;
        *cache = Some(translation.segment);
        text.extend(image.read(translation.offset, region.size as usize)?);
        parts.push(Part {
            vbytes: region,
            offset: Some(translation.offset),
            segment: Some(translation.segment),
        });
    }
    Ok(RingBuffer { parts, text })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elf::testing::{KernelLog, LOG_BUF_ADDR, MemImage};
    use crate::elf::{ElfCoreHeader, SegmentTable};

    fn descriptor(log_buf_len: i32, log_end: u32, logged_chars: u32) -> RingBufferDescriptor {
        RingBufferDescriptor {
            log_buf: VirtualAddr(0xffff880000100000),
            log_end,
            log_buf_len,
            logged_chars,
        }
    }

    fn translator(image: &MemImage) -> AddressTranslator {
        let header = ElfCoreHeader::read(image).unwrap();
        AddressTranslator::new(SegmentTable::new(image, &header).unwrap())
    }

    fn dump(log: &KernelLog) -> Result<RingBuffer, DumpError> {
        let image = log.core().image();
        let translator = translator(&image);
        let mut cache = None;
        let desc = descriptor(log.log_buf_len, log.log_end, log.logged_chars);
        reconstruct(&image, &translator, &mut cache, &desc)
    }

    #[test]
    fn unwrapped_regions() {
        let desc = descriptor(1024, 100, 100);
        assert!(!desc.wrapped().unwrap());
        assert_eq!(
            desc.regions().unwrap(),
            vec![Bytes::from_raw(0xffff880000100000, 100)]
        );
    }

    #[test]
    fn wrapped_regions() {
        let desc = descriptor(1024, 1300, 1024);
        assert!(desc.wrapped().unwrap());
        let regions = desc.regions().unwrap();
        assert_eq!(
            regions,
            vec![
                Bytes::from_raw(0xffff880000100000 + 276, 748),
                Bytes::from_raw(0xffff880000100000, 276),
            ]
        );
        assert_eq!(regions.iter().map(|r| r.size).sum::<u64>(), 1024);
    }

    #[test]
    fn wrapped_exactly_at_the_end() {
        let regions = descriptor(1024, 2048, 1024).regions().unwrap();
        assert_eq!(
            regions,
            vec![
                Bytes::from_raw(0xffff880000100000, 1024),
                Bytes::from_raw(0xffff880000100000, 0),
            ]
        );
    }

    #[test]
    fn bad_capacities() {
        for len in [0, -4096, MAX_LOG_BUF_LEN * 2, 1000, 3 << 10] {
            let err = descriptor(len, 10, 10).regions().unwrap_err();
            assert!(
                matches!(err, DumpError::ReconstructionFailed(_)),
                "{len} gave {err}"
            );
        }
        let err = descriptor(1000, 1300, 1000).regions().unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"can't reconstruct ring buffer: log_buf_len 0x3e8 isn't a power of two");

        assert!(descriptor(MAX_LOG_BUF_LEN, 10, 10).regions().is_ok());
    }

    #[test]
    fn oversized_buffer_is_rejected_before_reading() {
        // There is no LOAD segment at all for the buffer so any read would fail with
        // MissingSegment.
        let image = crate::elf::testing::CoreBuilder::new()
            .vmcoreinfo("OSRELEASE=6.1.0\n")
            .image();
        let translator = translator(&image);
        let mut cache = None;
        let desc = descriptor(MAX_LOG_BUF_LEN + 1, 0, u32::MAX);
        let err = reconstruct(&image, &translator, &mut cache, &desc).unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"can't reconstruct ring buffer: log_buf_len is 0x100001 but at most 0x100000 is supported");
    }

    #[test]
    fn unwrapped_text() {
        let mut buffer = b"<6>Linux version 2.6.32\n<4>Kernel panic\n".to_vec();
        let used = buffer.len() as u32;
        buffer.resize(1024, 0);
        let log = KernelLog {
            buffer,
            log_buf_len: 1024,
            log_end: used,
            logged_chars: used,
        };

        let ring = dump(&log).unwrap();
        insta::assert_snapshot!(String::from_utf8(ring.text).unwrap(), @r"
        <6>Linux version 2.6.32
        <4>Kernel panic
        ");
        assert_eq!(ring.parts.len(), 1);
        assert_eq!(ring.parts[0].vbytes.start, VirtualAddr(LOG_BUF_ADDR));
    }

    #[test]
    fn wrapped_text() {
        // After writing 1300 bytes into a 1024 byte buffer: bytes 1024..1300 have
        // overwritten the start of the buffer.
        let written: Vec<u8> = (0..1300u32).map(|i| b'a' + (i % 26) as u8).collect();
        let mut buffer = vec![0u8; 1024];
        for (i, byte) in written.iter().enumerate() {
            buffer[i % 1024] = *byte;
        }
        let log = KernelLog {
            buffer,
            log_buf_len: 1024,
            log_end: 1300,
            logged_chars: 1024,
        };

        let ring = dump(&log).unwrap();
        assert_eq!(ring.text.len(), 1024);
        assert_eq!(ring.text, written[1300 - 1024..].to_vec());

        let sizes: Vec<u64> = ring.parts.iter().map(|p| p.vbytes.size).collect();
        assert_eq!(sizes, vec![748, 276]);
        let first = ring.parts[0].offset.unwrap();
        let second = ring.parts[1].offset.unwrap();
        assert_eq!(first.0, second.0 + 276);
        let segment = ring.parts[0].segment.unwrap();
        assert_eq!(segment.vbytes.start, VirtualAddr(LOG_BUF_ADDR));
        assert_eq!(segment.flags(), "-wr");
        assert_eq!(Some(segment), ring.parts[1].segment);
    }

    #[test]
    fn empty_log() {
        let log = KernelLog {
            buffer: vec![0; 4096],
            log_buf_len: 4096,
            log_end: 0,
            logged_chars: 0,
        };
        let ring = dump(&log).unwrap();
        assert!(ring.text.is_empty());
        assert_eq!(ring.parts[0].offset, None);
        assert_eq!(ring.parts[0].segment, None);
    }

    #[test]
    fn buffer_outside_the_vmcore() {
        // logged_chars says more was written than the LOAD segment holds
        let log = KernelLog {
            buffer: vec![b'x'; 256],
            log_buf_len: 256,
            log_end: 10,
            logged_chars: 10,
        };
        let image = log.core().image();
        let translator = translator(&image);
        let mut cache = None;
        let mut desc = descriptor(4096, 4000, 4000);
        desc.log_buf = VirtualAddr(LOG_BUF_ADDR);
        let err = reconstruct(&image, &translator, &mut cache, &desc).unwrap_err();
        assert!(matches!(err, DumpError::MissingSegment { .. }));
    }
}
