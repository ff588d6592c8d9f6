//! The vmcore file itself. Everything else in the crate reads the vmcore through the
//! Image trait so that reads are always bounds checked against the file size.
use super::{Bytes, Offset};
use crate::error::DumpError;
use memmap2::Mmap;
use std::fs::File;
use std::io;
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

pub trait Image {
    fn path(&self) -> &Path;

    /// Size of the file in bytes.
    fn len(&self) -> u64;

    /// Copy size bytes starting at offset into buffer. Only called after the range
    /// has been checked against len().
    fn read_unchecked(&self, offset: Offset, buffer: &mut [u8]) -> io::Result<()>;

    /// Returns exactly size bytes or an error: this never does a short read.
    fn read(&self, offset: Offset, size: usize) -> Result<Vec<u8>, DumpError> {
        let range = Bytes::<Offset>::from_raw(offset.0, size as u64);
        if !range.fits_within(self.len()) {
            return Err(DumpError::io(
                self.path(),
                format!("couldn't read 0x{size:x} bytes at {offset} from"),
                io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("read area overflowed file size 0x{:x}", self.len()),
                ),
            ));
        }

        let mut buffer = vec![0; size];
        self.read_unchecked(offset, &mut buffer).map_err(|err| {
            DumpError::io(
                self.path(),
                format!("couldn't read 0x{size:x} bytes at {offset} from"),
                err,
            )
        })?;
        Ok(buffer)
    }
}

/// Uses positioned reads so only the bytes we care about are pulled in. This is the
/// usual choice for /proc/vmcore which can be as large as physical memory.
pub struct FileImage {
    path: PathBuf,
    file: File,
    size: u64,
}

impl FileImage {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, DumpError> {
        let path = path.into();
        let file = File::open(&path).map_err(|err| DumpError::io(&path, "couldn't open", err))?;
        let size = file
            .metadata()
            .map_err(|err| DumpError::io(&path, "couldn't stat", err))?
            .len();
        Ok(FileImage { path, file, size })
    }
}

impl Image for FileImage {
    fn path(&self) -> &Path {
        &self.path
    }

    fn len(&self) -> u64 {
        self.size
    }

    fn read_unchecked(&self, offset: Offset, buffer: &mut [u8]) -> io::Result<()> {
        self.file.read_exact_at(buffer, offset.0)
    }
}

/// Maps the whole vmcore into memory.
pub struct MappedImage {
    path: PathBuf,
    bytes: Mmap,
}

impl MappedImage {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, DumpError> {
        let path = path.into();
        let file = File::open(&path).map_err(|err| DumpError::io(&path, "couldn't open", err))?;

        // This is unsafe because it has undefined behavior if the underlying file is
        // modified while the memory map is in use. vmcores are snapshots so that
        // shouldn't happen.
        let bytes =
            unsafe { Mmap::map(&file) }.map_err(|err| DumpError::io(&path, "couldn't mmap", err))?;
        Ok(MappedImage { path, bytes })
    }
}

impl Image for MappedImage {
    fn path(&self) -> &Path {
        &self.path
    }

    fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn read_unchecked(&self, offset: Offset, buffer: &mut [u8]) -> io::Result<()> {
        let start = offset.0 as usize;
        match self.bytes.get(start..start + buffer.len()) {
            Some(bytes) => {
                buffer.copy_from_slice(bytes);
                Ok(())
            }
            None => Err(io::ErrorKind::UnexpectedEof.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elf::testing::{MemImage, scratch_file};

    #[test]
    fn reads_are_exact() {
        let image = MemImage::new((0..=255).collect());
        assert_eq!(image.read(Offset(0x10), 4).unwrap(), vec![0x10, 0x11, 0x12, 0x13]);
        assert_eq!(image.read(Offset(0xfc), 4).unwrap(), vec![0xfc, 0xfd, 0xfe, 0xff]);
    }

    #[test]
    fn reads_past_the_end_fail() {
        let image = MemImage::new(vec![0; 0x100]);
        let err = image.read(Offset(0xfd), 4).unwrap_err();
        assert!(matches!(err, DumpError::Io { .. }));
        insta::assert_snapshot!(err.to_string(), @"couldn't read 0x4 bytes at 0xfd from test.vmcore: read area overflowed file size 0x100");

        let err = image.read(Offset(u64::MAX - 1), 4).unwrap_err();
        assert!(matches!(err, DumpError::Io { .. }));
    }

    #[test]
    fn file_and_mapped_agree() {
        let bytes: Vec<u8> = (0..4096u32).map(|i| (i % 251) as u8).collect();
        let path = scratch_file("file_and_mapped_agree", &bytes);

        let file = FileImage::open(&path).unwrap();
        let mapped = MappedImage::open(&path).unwrap();
        assert_eq!(file.len(), 4096);
        assert_eq!(mapped.len(), 4096);
        assert_eq!(
            file.read(Offset(1000), 100).unwrap(),
            mapped.read(Offset(1000), 100).unwrap()
        );
        assert_eq!(file.read(Offset(1000), 100).unwrap(), bytes[1000..1100].to_vec());
        assert!(file.read(Offset(4000), 100).is_err());
        assert!(mapped.read(Offset(4000), 100).is_err());

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn missing_file() {
        let err = FileImage::open("/nonexistent/vmcore").err().unwrap();
        assert!(matches!(err, DumpError::Io { .. }));
        assert!(err.to_string().starts_with("couldn't open /nonexistent/vmcore: "));
    }
}
