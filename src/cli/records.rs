//! Delimited records with a header row.
//!
//! Fields are separated by a single delimiter character and may be quoted
//! with `"`; a doubled `""` inside quotes is a literal quote. Blank lines are
//! skipped. A record whose field count differs from the header is an error
//! for that record only.

use std::io::{self, BufRead};

use log::error;
use thiserror::Error;

use super::CliError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// 1-based input line number
    pub line: u64,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("line {line}: expected {expected} fields, found {found}")]
    FieldCount {
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error("line {line}: {message}")]
    Decode { line: u64, message: String },
}

pub struct RecordReader<R> {
    input: R,
    delimiter: char,
    header: Vec<String>,
    line: u64,
    done: bool,
}

impl<R: BufRead> RecordReader<R> {
    /// Reads the header row. A missing or unreadable header is fatal.
    pub fn new(mut input: R, delimiter: char) -> Result<Self, CliError> {
        let mut line = 0;
        let header = loop {
            let mut buf = String::new();
            if input.read_line(&mut buf)? == 0 {
                return Err(CliError::MissingHeader);
            }
            line += 1;
            let text = trim_line_end(&buf);
            if text.trim().is_empty() {
                continue;
            }
            break split_fields(text, delimiter).map_err(|message| {
                CliError::Io(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("header on line {}: {}", line, message),
                ))
            })?;
        };
        Ok(RecordReader {
            input,
            delimiter,
            header: header.into_iter().map(|h| h.trim().to_string()).collect(),
            line,
            done: false,
        })
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }
}

impl<R: BufRead> Iterator for RecordReader<R> {
    type Item = Result<Record, RecordError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let mut buf = String::new();
            let read = self.input.read_line(&mut buf);
            self.line += 1;
            let line = self.line;
            match read {
                Ok(0) => self.done = true,
                Ok(_) => {
                    let text = trim_line_end(&buf);
                    if text.trim().is_empty() {
                        continue;
                    }
                    return Some(self.decode(line, text));
                }
                // Invalid UTF-8; the bytes are consumed, so the next line is readable
                Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                    return Some(Err(RecordError::Decode {
                        line,
                        message: e.to_string(),
                    }));
                }
                Err(e) => {
                    error!("Stopped reading input at line {}: {}", line, e);
                    self.done = true;
                }
            }
        }
        None
    }
}

impl<R> RecordReader<R> {
    fn decode(&self, line: u64, text: &str) -> Result<Record, RecordError> {
        let fields = split_fields(text, self.delimiter)
            .map_err(|message| RecordError::Decode { line, message })?;
        if fields.len() != self.header.len() {
            return Err(RecordError::FieldCount {
                line,
                expected: self.header.len(),
                found: fields.len(),
            });
        }
        Ok(Record { line, fields })
    }
}

fn trim_line_end(line: &str) -> &str {
    line.trim_end_matches(['\n', '\r'])
}

/// Splits one line into fields.
pub fn split_fields(line: &str, delimiter: char) -> Result<Vec<String>, String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut chars = line.chars().peekable();
    let mut quoted = false;

    while let Some(ch) = chars.next() {
        match ch {
            '"' if quoted => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    quoted = false;
                }
            }
            '"' if field.is_empty() => quoted = true,
            c if c == delimiter && !quoted => fields.push(std::mem::take(&mut field)),
            c => field.push(c),
        }
    }
    if quoted {
        return Err("unterminated quoted field".to_string());
    }
    fields.push(field);
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_quoted() {
        assert_eq!(
            split_fields(r#"a,"b,c","say ""hi""",,"#, ',').unwrap(),
            vec!["a", "b,c", "say \"hi\"", "", ""]
        );
        assert!(split_fields(r#"a,"open"#, ',').is_err());
        assert_eq!(split_fields("a\tb", '\t').unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_reader() {
        let input = "name,age\r\nada,36\n\nbob\ncy,\"4\"\n";
        let mut reader = RecordReader::new(input.as_bytes(), ',').unwrap();
        assert_eq!(reader.header(), &["name".to_string(), "age".to_string()]);

        let record = reader.next().unwrap().unwrap();
        assert_eq!(record.line, 2);
        assert_eq!(record.fields, vec!["ada", "36"]);
        assert_eq!(
            reader.next().unwrap().unwrap_err(),
            RecordError::FieldCount {
                line: 4,
                expected: 2,
                found: 1
            }
        );
        assert_eq!(reader.next().unwrap().unwrap().fields, vec!["cy", "4"]);
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_missing_header() {
        assert!(matches!(
            RecordReader::new("\n\n".as_bytes(), ','),
            Err(CliError::MissingHeader)
        ));
    }
}
