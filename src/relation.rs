//! Sources of rows for discovery.
//!
//! The engine only needs a forward-only walk over the rows, so that's all [`Relation`] asks for.

use crate::error::{Error, Result};
use csv_core::{ReadFieldResult, Reader, ReaderBuilder};
use std::io;
use std::str;

/// One row of cells, where `None` is a null.
pub type Row = Vec<Option<String>>;

/// A table that can be scanned once, front to back.
pub trait Relation {
    /// The name of the relation, used when qualifying column names in output.
    fn name(&self) -> &str;

    /// The column names, in the order cells appear in each row.
    fn columns(&self) -> &[String];

    /// Returns the next row, or `None` once the relation is exhausted.
    fn next_row(&mut self) -> Result<Option<Row>>;
}

/// A relation whose rows are already in memory.
#[derive(Clone, Debug)]
pub struct InMemoryRelation {
    name: String,
    columns: Vec<String>,
    rows: std::vec::IntoIter<Row>,
}

impl InMemoryRelation {
    /// Creates a relation from owned rows.
    pub fn new(name: impl Into<String>, columns: Vec<String>, rows: Vec<Row>) -> Self {
        InMemoryRelation {
            name: name.into(),
            columns,
            rows: rows.into_iter(),
        }
    }

    /// Creates a relation from string literals. Cells equal to `null_token` become nulls.
    ///
    /// ```
    /// use fdhunter::{InMemoryRelation, Relation};
    ///
    /// let mut r = InMemoryRelation::from_strs("r", &["A", "B"], &[&["1", "-"]], Some("-"));
    /// assert_eq!(r.columns(), &["A".to_string(), "B".to_string()]);
    /// assert_eq!(r.next_row().unwrap(), Some(vec![Some("1".to_string()), None]));
    /// assert_eq!(r.next_row().unwrap(), None);
    /// ```
    pub fn from_strs(
        name: &str,
        columns: &[&str],
        rows: &[&[&str]],
        null_token: Option<&str>,
    ) -> Self {
        let rows = rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|cell| {
                        if Some(*cell) == null_token {
                            None
                        } else {
                            Some(cell.to_string())
                        }
                    })
                    .collect()
            })
            .collect();
        InMemoryRelation::new(
            name,
            columns.iter().map(|c| c.to_string()).collect(),
            rows,
        )
    }
}

impl Relation for InMemoryRelation {
    fn name(&self) -> &str {
        &self.name
    }

    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn next_row(&mut self) -> Result<Option<Row>> {
        Ok(self.rows.next())
    }
}

/// How to interpret delimited text.
#[derive(Clone, Debug)]
pub struct TsvOptions {
    /// Name reported for the relation.
    pub name: String,
    /// Field separator.
    pub delimiter: u8,
    /// Whether the first record holds the column names.
    pub has_header: bool,
    /// Cells with exactly this text are nulls. `None` means no cell is ever null.
    pub null_token: Option<String>,
}

impl Default for TsvOptions {
    fn default() -> Self {
        TsvOptions {
            name: "relation".to_string(),
            delimiter: b'\t',
            has_header: true,
            null_token: Some(String::new()),
        }
    }
}

/// A relation streamed from delimited text, tab-separated by default.
pub struct TsvRelation<I> {
    input: I,
    parser: Reader,
    inputbuf: Box<[u8]>,
    start: usize,
    end: usize,
    eof: bool,
    fieldbuf: Vec<u8>,
    name: String,
    columns: Vec<String>,
    null_token: Option<String>,
    pending: Option<Vec<String>>,
}

impl<I: io::Read> TsvRelation<I> {
    /// Wraps `input`, reading the header (or the first record, to learn the width) right away.
    pub fn new(input: I, options: TsvOptions) -> Result<Self> {
        let mut relation = TsvRelation {
            input,
            parser: ReaderBuilder::new().delimiter(options.delimiter).build(),
            inputbuf: vec![0; 16384].into_boxed_slice(),
            start: 0,
            end: 0,
            eof: false,
            fieldbuf: vec![0; 1024],
            name: options.name,
            columns: Vec::new(),
            null_token: options.null_token,
            pending: None,
        };

        let first = relation.read_record()?;
        if options.has_header {
            relation.columns = first.unwrap_or_default();
        } else if let Some(record) = first {
            relation.columns = (1..=record.len())
                .map(|i| format!("column{}", i))
                .collect();
            relation.pending = Some(record);
        }
        Ok(relation)
    }

    fn read_record(&mut self) -> Result<Option<Vec<String>>> {
        let mut record = Vec::new();
        let mut fieldlen = 0;
        loop {
            if self.start == self.end && !self.eof {
                self.start = 0;
                self.end = self.input.read(&mut self.inputbuf)?;
                self.eof = self.end == 0;
            }

            let bytes = &self.inputbuf[self.start..self.end];
            let (result, nin, nout) = self
                .parser
                .read_field(bytes, &mut self.fieldbuf[fieldlen..]);
            self.start += nin;
            fieldlen += nout;
            match result {
                ReadFieldResult::InputEmpty => {}
                ReadFieldResult::OutputFull => {
                    let grown = self.fieldbuf.len() * 2;
                    self.fieldbuf.resize(grown, 0);
                }
                ReadFieldResult::Field { record_end } => {
                    let field = str::from_utf8(&self.fieldbuf[..fieldlen]).map_err(|e| {
                        Error::invalid_data(format!("line {}: {}", self.parser.line(), e))
                    })?;
                    record.push(field.to_string());
                    fieldlen = 0;
                    if record_end {
                        return Ok(Some(record));
                    }
                }
                ReadFieldResult::End => return Ok(None),
            }
        }
    }
}

impl<I: io::Read> Relation for TsvRelation<I> {
    fn name(&self) -> &str {
        &self.name
    }

    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn next_row(&mut self) -> Result<Option<Row>> {
        let record = match self.pending.take() {
            Some(record) => record,
            None => match self.read_record()? {
                Some(record) => record,
                None => return Ok(None),
            },
        };
        let null_token = self.null_token.as_deref();
        Ok(Some(
            record
                .into_iter()
                .map(|cell| {
                    if Some(cell.as_str()) == null_token {
                        None
                    } else {
                        Some(cell)
                    }
                })
                .collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain<R: Relation>(mut relation: R) -> Vec<Row> {
        let mut rows = Vec::new();
        while let Some(row) = relation.next_row().unwrap() {
            rows.push(row);
        }
        rows
    }

    fn cells(values: &[Option<&str>]) -> Row {
        values.iter().map(|v| v.map(str::to_string)).collect()
    }

    #[test]
    fn reads_header_and_rows() {
        let text = "A\tB\n1\t\n2\tx\n";
        let relation = TsvRelation::new(text.as_bytes(), TsvOptions::default()).unwrap();
        assert_eq!(relation.columns(), &["A".to_string(), "B".to_string()]);
        assert_eq!(
            drain(relation),
            vec![cells(&[Some("1"), None]), cells(&[Some("2"), Some("x")])]
        );
    }

    #[test]
    fn headerless_input_keeps_first_row() {
        let options = TsvOptions {
            has_header: false,
            delimiter: b',',
            null_token: Some("NULL".to_string()),
            ..TsvOptions::default()
        };
        let relation = TsvRelation::new("a,NULL\nb,c".as_bytes(), options).unwrap();
        assert_eq!(
            relation.columns(),
            &["column1".to_string(), "column2".to_string()]
        );
        assert_eq!(
            drain(relation),
            vec![cells(&[Some("a"), None]), cells(&[Some("b"), Some("c")])]
        );
    }

    #[test]
    fn long_fields_grow_the_buffer() {
        let long = "v".repeat(5000);
        let text = format!("A\n{}\n", long);
        let relation = TsvRelation::new(text.as_bytes(), TsvOptions::default()).unwrap();
        assert_eq!(drain(relation), vec![cells(&[Some(long.as_str())])]);
    }

    #[test]
    fn empty_input_has_no_columns() {
        let relation = TsvRelation::new(io::empty(), TsvOptions::default()).unwrap();
        assert!(relation.columns().is_empty());
        assert!(drain(relation).is_empty());
    }
}
