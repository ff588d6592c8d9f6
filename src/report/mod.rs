//! Human readable output. Progress and tables go to stderr, the dump itself goes to
//! stdout so that it can be redirected to a file.
mod tables;

use crate::elf::{ElfCoreHeader, Image};
use crate::ringbuf::{RingBuffer, RingBufferDescriptor, RingBufferSymbols};
use crate::session::{Reporter, Step};
use crate::utils::{self, Styling, uwriteln};
use crate::vmcoreinfo::Vmcoreinfo;
use std::io::{self, Write};
use tables::{SimpleTableBuilder, TableBuilder, add_field, add_simple};

pub const START_BANNER: &str = ">>>>>>>>>>[ START kernel ring buffer ]>>>>>>>>>>>>>>>>>";
pub const END_BANNER: &str = "<<<<<<<<<<[ END kernel ring buffer   ]<<<<<<<<<<<<<<<<<";

/// Writes the ring buffer text framed by banners. The text is written as is: the
/// kernel's text normally ends with a newline but if it doesn't the end banner
/// follows the last line.
pub fn write_dump(mut out: impl Write, text: &[u8]) -> io::Result<()> {
    writeln!(out, "{START_BANNER}")?;
    out.write_all(text)?;
    writeln!(out, "{END_BANNER}")?;
    out.flush()
}

/// Narrates a Session on out (normally stderr).
pub struct Progress<W: Write> {
    out: W,

    /// Add field explanations under the tables.
    explain: bool,

    /// Only warnings are written.
    quiet: bool,
}

impl<W: Write> Progress<W> {
    pub fn new(out: W, explain: bool, quiet: bool) -> Self {
        Progress {
            out,
            explain,
            quiet,
        }
    }

    /// Called once the dump has been written.
    pub fn done(&mut self) {
        if !self.quiet {
            utils::progress(&mut self.out, "Dump complete.");
        }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Reporter for Progress<W> {
    fn step(&mut self, step: Step) {
        if !self.quiet {
            utils::progress(&mut self.out, &format!("{step}."));
        }
    }

    fn warn(&mut self, mesg: &str) {
        uwriteln!(self.out, "{}", mesg.warn());
    }

    fn header(&mut self, image: &dyn Image, header: &ElfCoreHeader) {
        if self.quiet {
            return;
        }
        let mut builder = SimpleTableBuilder::new();
        add_simple!(builder, "path", image.path().display(), "the vmcore being read");
        add_simple!(builder, "size", "0x{:x}", image.len(), "number of bytes in the vmcore");
        add_simple!(builder, "type", header.stype(), "vmcores are ELF core files");
        add_simple!(builder, "machine", header.machine(), "architecture of the crashed kernel");
        add_simple!(
            builder,
            "program headers",
            header.num_ph_entries,
            "number of NOTE and LOAD segments (and any others)"
        );
        builder.writeln(&mut self.out, self.explain);
    }

    fn vmcoreinfo(&mut self, info: &Vmcoreinfo, os_release: Option<&str>, crash_time: Option<u64>) {
        if self.quiet {
            return;
        }
        let mut builder = SimpleTableBuilder::new();
        add_simple!(builder, "VMCOREINFO", info.offset(), "offset of the VMCOREINFO text");
        add_simple!(
            builder,
            "VMCOREINFO size",
            "0x{:x}",
            info.as_bytes().len(),
            "number of bytes in the VMCOREINFO text"
        );
        if let Some(release) = os_release {
            add_simple!(builder, "OS release", release, "version of the crashed kernel");
        }
        if let Some(time) = crash_time {
            add_simple!(
                builder,
                "crash time",
                time,
                "when the kernel crashed, in seconds since the Unix epoch"
            );
        }
        builder.writeln(&mut self.out, self.explain);
    }

    fn symbols(&mut self, symbols: &RingBufferSymbols) {
        if self.quiet {
            return;
        }
        let mut builder = TableBuilder::new();
        builder.add_col_l("symbol", "name of a kernel variable used by the ring buffer");
        builder.add_col_r("address", "where the variable is in the crashed kernel");
        for (name, addr) in [
            ("log_buf", symbols.log_buf),
            ("log_end", symbols.log_end),
            ("log_buf_len", symbols.log_buf_len),
            ("logged_chars", symbols.logged_chars),
        ] {
            add_field!(builder, "symbol", name);
            add_field!(builder, "address", addr);
        }
        builder.writeln(&mut self.out, true, self.explain);
    }

    fn descriptor(&mut self, descriptor: &RingBufferDescriptor) {
        if self.quiet {
            return;
        }
        let mut builder = TableBuilder::new();
        builder.add_col_l("variable", "name of a kernel variable used by the ring buffer");
        builder.add_col_r("value", "value of the variable when the kernel crashed");
        builder.add_col_l("meaning", "how the value is used");
        let rows = [
            ("log_buf", descriptor.log_buf.to_string(), "start of the buffer"),
            ("log_end", descriptor.log_end.to_string(), "index of the next byte to write"),
            ("log_buf_len", descriptor.log_buf_len.to_string(), "capacity of the buffer"),
            (
                "logged_chars",
                descriptor.logged_chars.to_string(),
                "number of bytes written",
            ),
        ];
        for (name, value, meaning) in rows {
            add_field!(builder, "variable", name);
            add_field!(builder, "value", value);
            add_field!(builder, "meaning", meaning);
        }
        builder.writeln(&mut self.out, true, self.explain);

        if self.explain {
            let text = match descriptor.wrapped() {
                Ok(true) => "the buffer has filled up so the oldest text starts at log_end",
                Ok(false) => "the text is the first logged_chars bytes of the buffer",
                Err(_) => "log_buf_len isn't a usable buffer size",
            };
            utils::explain(&mut self.out, "wrapped", text);
            uwriteln!(self.out);
        }
    }

    fn ring_buffer(&mut self, ring: &RingBuffer) {
        if self.quiet {
            return;
        }
        let mut builder = TableBuilder::new();
        builder.add_col_l("part", "pieces of the buffer in the order they were written");
        builder.add_col_r("vaddr", "where the piece is in the crashed kernel");
        builder.add_col_r("offset", "where the piece is in the vmcore");
        builder.add_col_r("size", "number of bytes in the piece");
        builder.add_col_l("flags", "permissions of the LOAD segment the piece was read from");
        let count = ring.parts.len();
        for (i, part) in ring.parts.iter().enumerate() {
            add_field!(builder, "part", "{}", format!("{}/{count}", i + 1));
            add_field!(builder, "vaddr", part.vbytes.start);
            match part.offset {
                Some(offset) => {
                    add_field!(builder, "offset", offset);
                }
                None => {
                    add_field!(builder, "offset", "-");
                }
            }
            add_field!(builder, "size", "0x{:x}", part.vbytes.size);
            match part.segment {
                Some(segment) => {
                    add_field!(builder, "flags", segment.flags());
                }
                None => {
                    add_field!(builder, "flags", "-");
                }
            }
        }
        builder.writeln(&mut self.out, true, self.explain);
    }
}
