//! Helpers for building tables using the tabled crate.
use crate::utils::{self, Styling, uwriteln};
use std::io::Write;
use tabled::{
    Table,
    builder::Builder,
    settings::{Alignment, Padding, Style, object::Columns},
};

struct TableCol {
    header: String,
    align: Alignment,
    help: String,
    fields: Vec<String>,
}

/// Table with a header row and any number of columns, e.g. the symbols table:
/// ```text
/// symbol        address
/// ------        -------
/// log_buf       0xffffffff81a00000
/// log_end       0xffffffff81a00010
///
/// symbol: name of a kernel variable used by the ring buffer
/// address: where the variable is in the crashed kernel
/// ```
/// The explanations at the bottom are only written with --explain.
pub struct TableBuilder {
    cols: Vec<TableCol>,
}

impl TableBuilder {
    pub fn new() -> TableBuilder {
        TableBuilder { cols: Vec::new() }
    }

    pub fn add_col_l(&mut self, header: &str, help: &str) {
        self.add_col(header, help, Alignment::left());
    }

    pub fn add_col_r(&mut self, header: &str, help: &str) {
        self.add_col(header, help, Alignment::right());
    }

    /// Typically add_field! is used instead.
    pub fn add_str_field(&mut self, header: &str, value: String) {
        let Some(col) = self.cols.iter_mut().find(|c| c.header == header) else {
            debug_assert!(false, "no {header} column");
            return;
        };
        // tabled drops the row formatting for empty cells
        let value = if value.is_empty() { " ".table_field() } else { value };
        col.fields.push(value);
    }

    pub fn writeln(&self, out: impl Write, titles: bool, explain: bool) {
        let helps = self.cols.iter().map(|c| (c.header.as_str(), c.help.as_str()));
        finish(out, self.table(titles), explain.then_some(helps));
    }

    fn add_col(&mut self, header: &str, help: &str, align: Alignment) {
        debug_assert!(!self.cols.iter().any(|c| c.header == header));
        self.cols.push(TableCol {
            header: header.to_string(),
            align,
            help: help.to_string(),
            fields: Vec::new(),
        });
    }

    fn table(&self, titles: bool) -> Table {
        // columns normally have the same number of fields, a short one truncates the table
        let height = self.cols.iter().map(|c| c.fields.len()).min().unwrap_or(0);
        let mut builder = Builder::with_capacity(height + 2, self.cols.len());
        if titles {
            builder.push_record(self.cols.iter().map(|c| c.header.table_header()));
            builder.push_record(self.cols.iter().map(|c| "-".repeat(c.header.len()).table_sep()));
        }
        for row in 0..height {
            builder.push_record(self.cols.iter().map(|c| c.fields[row].clone()));
        }

        let mut table = builder.build();
        for (i, col) in self.cols.iter().enumerate() {
            table.modify(Columns::one(i), col.align);
        }
        table
    }
}

macro_rules! add_field {
    ($builder:ident, $header:literal, $value:expr) => {
        $builder.add_str_field($header, format!("{}", $value).table_field());
    };
    ($builder:ident, $header:literal, $format:literal, $value:expr) => {
        $builder.add_str_field($header, format!($format, $value).table_field());
    };
}
pub(crate) use add_field;

struct SimpleRow {
    name: String,
    value: String,
    help: String,
}

/// Name/value pairs without titles, e.g. the header table:
/// ```text
/// path      /proc/vmcore
/// machine   x86-64
/// ```
pub struct SimpleTableBuilder {
    rows: Vec<SimpleRow>,
}

impl SimpleTableBuilder {
    pub fn new() -> SimpleTableBuilder {
        SimpleTableBuilder { rows: Vec::new() }
    }

    /// Typically add_simple! is used instead.
    pub fn add_str_row(&mut self, name: &str, value: String, help: &str) {
        self.rows.push(SimpleRow {
            name: name.to_string(),
            value,
            help: help.to_string(),
        });
    }

    pub fn writeln(&self, out: impl Write, explain: bool) {
        let mut builder = Builder::with_capacity(self.rows.len(), 2);
        for row in self.rows.iter() {
            builder.push_record([row.name.clone(), row.value.clone()]);
        }
        let mut table = builder.build();
        table.modify(Columns::new(..), Alignment::left());

        let helps = self.rows.iter().map(|r| (r.name.as_str(), r.help.as_str()));
        finish(out, table, explain.then_some(helps));
    }
}

macro_rules! add_simple {
    ($builder:ident, $name:literal, $value:expr, $help:expr) => {
        $builder.add_str_row($name, format!("{}", $value).table_field(), $help);
    };
    ($builder:ident, $name:literal, $format:literal, $value:expr, $help:expr) => {
        $builder.add_str_row($name, format!($format, $value).table_field(), $help);
    };
}
pub(crate) use add_simple;

/// Both kinds of table are borderless with a space between columns and are
/// optionally followed by a "name: help" line per column or row.
fn finish<'a>(
    mut out: impl Write,
    mut table: Table,
    helps: Option<impl Iterator<Item = (&'a str, &'a str)>>,
) {
    table.modify(Columns::first(), Padding::new(0, 1, 0, 0));
    table.with(Style::empty());
    uwriteln!(out, "{table}");

    if let Some(helps) = helps {
        uwriteln!(out);
        for (title, help) in helps {
            utils::explain(&mut out, title, help);
        }
        uwriteln!(out);
    }
}
