//! Record source: delimited text with a header row, read lazily.
//!
//! Encoding and delimiter are sniffed from the first block of the input unless
//! configured. Rows are streamed one at a time; nothing is buffered beyond the
//! current row, so arbitrarily large files load in constant memory.
//!
//! A row with fewer fields than the header yields a record with missing keys;
//! a row with more fields keeps the extras under positional names (`_8`, `_9`,
//! ...). Neither is rejected here: the query builder surfaces the mismatch.

mod transcode;

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use encoding_rs::{Encoding, UTF_8};
use serde::Serialize;

use crate::error::{SourceError, SourceResult};
use crate::models::{Record, Schema};

pub use transcode::TranscodingReader;

/// Bytes inspected for encoding and delimiter detection.
pub const SAMPLE_SIZE: usize = 64 * 1024;

/// Candidate delimiters, in order of preference on ties.
pub const DELIMITERS: [char; 4] = [';', ',', '\t', '|'];

/// Prefix for fields beyond the header width.
pub const EXTRA_FIELD_PREFIX: &str = "_";

/// How to read the input.
#[derive(Debug, Clone, Default)]
pub struct SourceOptions {
    /// Field delimiter (auto-detect if not specified)
    pub delimiter: Option<char>,
    /// Encoding label (auto-detect if not specified)
    pub encoding: Option<String>,
}

/// What was detected (or configured) for an opened source.
#[derive(Debug, Clone, Serialize)]
pub struct SourceInfo {
    pub encoding: String,
    pub delimiter: char,
    pub headers: Vec<String>,
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0.to_lowercase();

    if charset.is_empty() || charset == "ascii" || charset.contains("utf-8") || charset.contains("utf8") {
        return "utf-8".to_string();
    }
    match charset.as_str() {
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Map an encoding label to a decoder, falling back to UTF-8.
pub fn encoding_for(label: &str) -> &'static Encoding {
    Encoding::for_label(label.trim().as_bytes()).unwrap_or(UTF_8)
}

/// Detect the delimiter by counting occurrences in the header line
pub fn detect_delimiter(header_line: &str) -> char {
    let mut best_sep = DELIMITERS[0];
    let mut best_count = 0;

    for &sep in &DELIMITERS {
        let count = header_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Lazy sequence of [`Record`]s read from delimited text.
///
/// Restart by opening the source again; there is no rewind.
pub struct RecordSource {
    reader: csv::Reader<Box<dyn Read>>,
    info: SourceInfo,
    row: csv::ByteRecord,
}

impl RecordSource {
    /// Open a file.
    pub fn open(path: impl AsRef<Path>, options: &SourceOptions) -> SourceResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| SourceError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(file, options)
    }

    /// Read from any byte stream (stdin, an in-memory buffer, ...).
    pub fn from_reader<R: Read + 'static>(reader: R, options: &SourceOptions) -> SourceResult<Self> {
        let mut buffered = BufReader::with_capacity(SAMPLE_SIZE, reader);
        let sample = buffered.fill_buf().map_err(|e| SourceError::Read {
            line: 1,
            message: e.to_string(),
        })?;
        if sample.is_empty() {
            return Err(SourceError::NoHeaders);
        }

        let encoding = options
            .encoding
            .clone()
            .unwrap_or_else(|| detect_encoding(sample));
        let decoder = encoding_for(&encoding);
        let delimiter = match options.delimiter {
            Some(d) => d,
            None => {
                let (text, _, _) = decoder.decode(sample);
                detect_delimiter(text.lines().next().unwrap_or(""))
            }
        };
        let delimiter_byte = u8::try_from(delimiter)
            .ok()
            .filter(u8::is_ascii)
            .ok_or(SourceError::InvalidDelimiter(delimiter))?;

        let input: Box<dyn Read> = if decoder == UTF_8 {
            Box::new(buffered)
        } else {
            Box::new(TranscodingReader::new(buffered, decoder))
        };

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter_byte)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(input);

        let headers: Vec<String> = reader
            .byte_headers()
            .map_err(SourceError::from_csv)?
            .iter()
            .map(|h| {
                String::from_utf8_lossy(h)
                    .trim_start_matches('\u{feff}')
                    .trim()
                    .to_string()
            })
            .collect();

        if headers.iter().all(String::is_empty) {
            return Err(SourceError::NoHeaders);
        }

        Ok(Self {
            reader,
            info: SourceInfo {
                encoding: decoder.name().to_lowercase(),
                delimiter,
                headers,
            },
            row: csv::ByteRecord::new(),
        })
    }

    pub fn info(&self) -> &SourceInfo {
        &self.info
    }

    pub fn headers(&self) -> &[String] {
        &self.info.headers
    }

    /// Data columns of `schema` that the header row does not name.
    pub fn missing_columns(&self, schema: &Schema) -> Vec<String> {
        schema
            .data_columns()
            .filter(|c| !self.info.headers.contains(&c.name))
            .map(|c| c.name.clone())
            .collect()
    }

    fn to_record(&self) -> Record {
        let line = self.row.position().map(|p| p.line()).unwrap_or(0);
        let fields = self
            .row
            .iter()
            .enumerate()
            .map(|(i, value)| {
                let name = match self.info.headers.get(i) {
                    Some(header) => header.clone(),
                    None => format!("{}{}", EXTRA_FIELD_PREFIX, i + 1),
                };
                (name, String::from_utf8_lossy(value).into_owned())
            })
            .collect();
        Record::new(line, fields)
    }
}

impl Iterator for RecordSource {
    type Item = SourceResult<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.reader.read_byte_record(&mut self.row) {
            Ok(false) => None,
            Ok(true) => Some(Ok(self.to_record())),
            Err(e) => Some(Err(SourceError::from_csv(e))),
        }
    }
}
