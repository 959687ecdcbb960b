//! Minimal RFC 4180 CSV writer for admin exports.
//!
//! Fields containing a comma, double quote, CR or LF are quoted and embedded
//! quotes doubled. Lines end with CRLF.

/// Accumulates CSV rows into a string.
#[derive(Debug, Clone, Default)]
pub struct CsvWriter {
    buf: String,
    columns: Option<usize>,
    rows: usize,
}

impl CsvWriter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a document with a header row.
    #[must_use]
    pub fn with_header<I, S>(header: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut writer = Self::new();
        writer.write_row(header);
        writer
    }

    /// Append one row.
    ///
    /// Rows shorter than the first row are padded with empty fields so every
    /// line has the same number of columns.
    pub fn write_row<I, S>(&mut self, fields: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut count = 0;
        for field in fields {
            if count > 0 {
                self.buf.push(',');
            }
            push_field(&mut self.buf, field.as_ref());
            count += 1;
        }
        match self.columns {
            Some(expected) if count < expected => {
                for _ in count..expected {
                    self.buf.push(',');
                }
            }
            None => self.columns = Some(count),
            _ => {}
        }
        self.buf.push_str("\r\n");
        self.rows += 1;
    }

    /// Number of data rows written after the first row.
    #[must_use]
    pub fn body_rows(&self) -> usize {
        self.rows.saturating_sub(1)
    }

    /// The CSV document.
    #[must_use]
    pub fn finish(self) -> String {
        self.buf
    }
}

fn push_field(buf: &mut String, field: &str) {
    let needs_quotes = field.contains([',', '"', '\r', '\n']);
    if needs_quotes {
        buf.push('"');
        for c in field.chars() {
            if c == '"' {
                buf.push('"');
            }
            buf.push(c);
        }
        buf.push('"');
    } else {
        buf.push_str(field);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_fields() {
        let mut csv = CsvWriter::with_header(["id", "name"]);
        csv.write_row(["1", "Widget"]);
        assert_eq!(csv.finish(), "id,name\r\n1,Widget\r\n");
    }

    #[test]
    fn test_quotes_special_characters() {
        let mut csv = CsvWriter::new();
        csv.write_row(["a,b", "say \"hi\"", "line\nbreak", "plain"]);
        assert_eq!(
            csv.finish(),
            "\"a,b\",\"say \"\"hi\"\"\",\"line\nbreak\",plain\r\n"
        );
    }

    #[test]
    fn test_pads_short_rows() {
        let mut csv = CsvWriter::with_header(["a", "b", "c"]);
        csv.write_row(["1"]);
        assert_eq!(csv.body_rows(), 1);
        assert_eq!(csv.finish(), "a,b,c\r\n1,,\r\n");
    }

    #[test]
    fn test_empty_field() {
        let mut csv = CsvWriter::new();
        csv.write_row(["", "x"]);
        assert_eq!(csv.finish(), ",x\r\n");
    }

    #[test]
    fn test_body_rows_ignores_embedded_line_breaks() {
        let mut csv = CsvWriter::with_header(["id", "notes"]);
        csv.write_row(["1", "first line\r\nsecond line"]);
        csv.write_row(["2", "a\nb"]);
        assert_eq!(csv.body_rows(), 2);
    }
}
