//! Just enough ELF to find things in a vmcore. A vmcore is an ELF core file the
//! kernel writes out for the crashed kernel (/proc/vmcore in the capture kernel).
//! Quick ELF reference: https://gist.github.com/x0nu11byt3/bcb35c3de461e5fb66173071a2379779
//!
//! vmcores start with an ELF header which includes:
//! * A magic number to identify the file as an ELF file.
//! * The architecture, always x86-64 here.
//! * The offset to and number of program headers.
//!
//! Program headers identify segments. A vmcore has two kinds:
//! * Note - a list of records. One of these is VMCOREINFO which has the addresses of
//! kernel symbols that crash tools care about.
//! * Load - a chunk of the crashed kernel's memory along with the virtual address it
//! was mapped at.
//!
//! There are no section headers.
pub mod header;
pub mod image;
pub mod io;
pub mod notes;
pub mod primitives;
pub mod segments;
pub mod translate;

#[cfg(test)]
pub mod testing;

pub use header::*;
pub use image::*;
pub use io::*;
pub use notes::*;
pub use primitives::*;
pub use segments::*;
pub use translate::*;
