//! Runs the steps needed to get from a vmcore to the ring buffer text.
use crate::elf::{
    AddressTranslator, ElfCoreHeader, Image, LoadSegment, SegmentTable, find_vmcoreinfo,
};
use crate::error::DumpError;
use crate::ringbuf::{self, RingBuffer, RingBufferDescriptor, RingBufferSymbols};
use crate::vmcoreinfo::Vmcoreinfo;
use std::error::Error;
use std::fmt;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Step {
    Open,
    ValidateHeader,
    SearchNote,
    SearchSymbols,
    ReadValues,
    CalculateDumpArea,
    Dump,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Step::Open => "Open vmcore",
            Step::ValidateHeader => "Validate vmcore ELF header",
            Step::SearchNote => "Search NOTE segment for VMCOREINFO",
            Step::SearchSymbols => "Search symbols for the ring buffer",
            Step::ReadValues => "Read LOAD segments containing the ring buffer variables",
            Step::CalculateDumpArea => "Calculate dump area",
            Step::Dump => "Dump ring buffer",
        };
        f.write_str(s)
    }
}

/// A DumpError along with the step that produced it.
#[derive(Debug)]
pub struct Failure {
    pub step: Step,
    pub error: DumpError,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.step, self.error)
    }
}

impl Error for Failure {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.error)
    }
}

pub trait InStep<T> {
    fn in_step(self, step: Step) -> Result<T, Failure>;
}

impl<T> InStep<T> for Result<T, DumpError> {
    fn in_step(self, step: Step) -> Result<T, Failure> {
        self.map_err(|error| Failure { step, error })
    }
}

/// Told about each step as the session runs. All of these do nothing by default.
pub trait Reporter {
    fn step(&mut self, _step: Step) {}
    fn warn(&mut self, _mesg: &str) {}
    fn header(&mut self, _image: &dyn Image, _header: &ElfCoreHeader) {}
    fn vmcoreinfo(
        &mut self,
        _info: &Vmcoreinfo,
        _os_release: Option<&str>,
        _crash_time: Option<u64>,
    ) {
    }
    fn symbols(&mut self, _symbols: &RingBufferSymbols) {}
    fn descriptor(&mut self, _descriptor: &RingBufferDescriptor) {}
    fn ring_buffer(&mut self, _ring: &RingBuffer) {}
}

/// State for one run over one vmcore. The header has been validated by the time a
/// Session exists.
pub struct Session<I: Image> {
    image: I,
    translator: AddressTranslator,
    table: SegmentTable,

    /// The LOAD segment used for the last translation.
    cache: Option<LoadSegment>,
}

impl<I: Image> Session<I> {
    pub fn open(image: I, reporter: &mut dyn Reporter) -> Result<Self, Failure> {
        reporter.step(Step::ValidateHeader);
        let header = ElfCoreHeader::read(&image).in_step(Step::ValidateHeader)?;
        let table = SegmentTable::new(&image, &header).in_step(Step::ValidateHeader)?;
        reporter.header(&image, &header);

        Ok(Session {
            image,
            translator: AddressTranslator::new(table),
            table,
            cache: None,
        })
    }

    /// Returns the ring buffer text. Everything else that was found along the way
    /// goes to reporter.
    pub fn dump(&mut self, reporter: &mut dyn Reporter) -> Result<RingBuffer, Failure> {
        reporter.step(Step::SearchNote);
        let note = self.table.find_note(&self.image).in_step(Step::SearchNote)?;
        let info = find_vmcoreinfo(&self.image, note).in_step(Step::SearchNote)?;
        let os_release = optional(info.value("OSRELEASE"), reporter);
        let crash_time = optional(info.number("CRASHTIME"), reporter);
        reporter.vmcoreinfo(&info, os_release.as_deref(), crash_time);

        reporter.step(Step::SearchSymbols);
        let symbols = RingBufferSymbols::find(&info).in_step(Step::SearchSymbols)?;
        reporter.symbols(&symbols);

        reporter.step(Step::ReadValues);
        let descriptor =
            RingBufferDescriptor::read(&self.image, &self.translator, &mut self.cache, &symbols)
                .in_step(Step::ReadValues)?;
        reporter.descriptor(&descriptor);

        reporter.step(Step::CalculateDumpArea);
        let ring = ringbuf::reconstruct(
            &self.image,
            &self.translator,
            &mut self.cache,
            &descriptor,
        )
        .in_step(Step::CalculateDumpArea)?;
        reporter.ring_buffer(&ring);
        Ok(ring)
    }
}

// OSRELEASE and CRASHTIME are nice to have but not all kernels provide them.
fn optional<T>(result: Result<T, DumpError>, reporter: &mut dyn Reporter) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            reporter.warn(&err.to_string());
            None
        }
    }
}
