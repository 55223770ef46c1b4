use encoding_rs::{Encoding, GBK, UTF_8, WINDOWS_1252};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),
    #[error("file could not be decoded as UTF-8, GBK or Latin-1")]
    Encoding,
    #[error("file has no header row")]
    NoColumns,
    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("line {line}: expected {expected} fields, saw {found}")]
    TooManyFields {
        line: u64,
        expected: usize,
        found: usize,
    },
}

/// One cell of the uploaded table.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Empty cells and zero are falsy; everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            CellValue::Empty => false,
            CellValue::Text(s) => !s.is_empty() && s.trim().parse::<f64>().map_or(true, |n| n != 0.0),
            CellValue::Integer(n) => *n != 0,
            CellValue::Float(f) => *f != 0.0,
            CellValue::Bool(b) => *b,
        }
    }

    /// Text form of the cell, `None` when empty.
    pub fn as_text(&self) -> Option<String> {
        if self.is_empty() {
            None
        } else {
            Some(self.to_string())
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            CellValue::Empty => serde_json::Value::String(String::new()),
            CellValue::Text(s) => serde_json::Value::String(s.clone()),
            CellValue::Integer(n) => serde_json::Value::from(*n),
            CellValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or_else(|| serde_json::Value::String(f.to_string())),
            CellValue::Bool(b) => serde_json::Value::Bool(*b),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Text(s) => f.write_str(s),
            CellValue::Integer(n) => write!(f, "{n}"),
            CellValue::Float(v) if v.fract() == 0.0 && v.is_finite() => write!(f, "{v:.1}"),
            CellValue::Float(v) => write!(f, "{v}"),
            CellValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// One parsed row, keyed by column name and kept in column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonitorRecord {
    cells: Vec<(String, CellValue)>,
}

impl MonitorRecord {
    pub fn get(&self, column: &str) -> &CellValue {
        static EMPTY: CellValue = CellValue::Empty;
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map_or(&EMPTY, |(_, cell)| cell)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.cells.iter().any(|(name, _)| name == column)
    }

    /// Non-empty text of a column.
    pub fn text(&self, column: &str) -> Option<String> {
        self.get(column).as_text()
    }
}

impl Serialize for MonitorRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cells.len()))?;
        for (name, cell) in &self.cells {
            map.serialize_entry(name, cell)?;
        }
        map.end()
    }
}

impl<K: Into<String>> FromIterator<(K, CellValue)> for MonitorRecord {
    fn from_iter<I: IntoIterator<Item = (K, CellValue)>>(iter: I) -> Self {
        Self {
            cells: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Table {
    pub columns: Vec<String>,
    pub records: Vec<MonitorRecord>,
}

impl Table {
    pub fn total_rows(&self) -> usize {
        self.records.len()
    }

    pub fn preview(&self, rows: usize) -> &[MonitorRecord] {
        &self.records[..rows.min(self.records.len())]
    }
}

pub async fn read_table(path: &Path) -> Result<Table, ParseError> {
    let bytes = tokio::fs::read(path).await?;
    parse_table(&bytes)
}

pub fn parse_table(bytes: &[u8]) -> Result<Table, ParseError> {
    let text = decode(bytes)?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    if headers.is_empty() || headers.iter().all(|h| h.trim().is_empty()) && headers.len() == 1 {
        return Err(ParseError::NoColumns);
    }
    let columns = unique_columns(headers.iter());

    let mut raw_rows: Vec<Vec<String>> = Vec::new();
    for result in reader.records() {
        let record = result?;
        if record.len() == 1 && record.get(0).is_some_and(|f| f.trim().is_empty()) {
            continue;
        }
        if record.len() > columns.len() {
            return Err(ParseError::TooManyFields {
                line: record.position().map_or(0, |p| p.line()),
                expected: columns.len(),
                found: record.len(),
            });
        }
        let mut row: Vec<String> = record.iter().map(str::to_string).collect();
        row.resize(columns.len(), String::new());
        raw_rows.push(row);
    }

    let kinds: Vec<ColumnKind> = (0..columns.len())
        .map(|i| ColumnKind::infer(raw_rows.iter().map(|row| row[i].as_str())))
        .collect();

    let records: Vec<MonitorRecord> = raw_rows
        .into_iter()
        .map(|row| {
            row.into_iter()
                .enumerate()
                .map(|(i, raw)| (columns[i].clone(), kinds[i].cell(raw)))
                .collect::<MonitorRecord>()
        })
        .collect();

    debug!(columns = columns.len(), "Parsed uploaded table");
    Ok(Table { columns, records })
}

/// Tries UTF-8, then GBK, then Latin-1. encoding_rs treats ISO-8859-1 as
/// windows-1252, which accepts every byte, so the last attempt never fails.
fn decode(bytes: &[u8]) -> Result<String, ParseError> {
    let encodings: [&'static Encoding; 3] = [UTF_8, GBK, WINDOWS_1252];
    for encoding in encodings {
        let decoded = if encoding == UTF_8 {
            let without_bom = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
            encoding.decode_without_bom_handling_and_without_replacement(without_bom)
        } else {
            encoding.decode_without_bom_handling_and_without_replacement(bytes)
        };
        if let Some(text) = decoded {
            debug!(encoding = encoding.name(), "Decoded uploaded file");
            return Ok(text.into_owned());
        }
    }
    Err(ParseError::Encoding)
}

/// Blank headers become `Unnamed: <i>`, repeats get `.1`, `.2`, ...
fn unique_columns<'a>(headers: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut columns = Vec::new();
    for (i, header) in headers.enumerate() {
        let base = if header.trim().is_empty() {
            format!("Unnamed: {i}")
        } else {
            header.to_string()
        };
        let mut name = base.clone();
        while seen.contains(&name) {
            let count = counts.entry(base.clone()).or_insert(0);
            *count += 1;
            name = format!("{base}.{count}");
        }
        seen.insert(name.clone());
        columns.push(name);
    }
    columns
}

/// Cell texts that stand for a missing value, as pandas reads them.
const MISSING_MARKERS: [&str; 18] = [
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

fn is_missing(cell: &str) -> bool {
    let cell = cell.trim();
    cell.is_empty() || MISSING_MARKERS.contains(&cell)
}

/// Cell type shared by a whole column, decided from its non-empty cells.
#[derive(Debug, Clone, Copy, PartialEq)]
enum ColumnKind {
    Integer,
    Float,
    Bool,
    Text,
}

impl ColumnKind {
    fn infer<'a>(cells: impl Iterator<Item = &'a str>) -> Self {
        let mut ints = true;
        let mut floats = true;
        let mut bools = true;
        let mut any = false;
        for cell in cells.filter(|c| !is_missing(c)).map(str::trim) {
            any = true;
            ints &= cell.parse::<i64>().is_ok();
            floats &= cell.parse::<f64>().is_ok();
            bools &= parse_bool(cell).is_some();
        }
        match (any, ints, floats, bools) {
            (false, ..) => ColumnKind::Text,
            (true, true, ..) => ColumnKind::Integer,
            (true, false, true, _) => ColumnKind::Float,
            (true, false, false, true) => ColumnKind::Bool,
            _ => ColumnKind::Text,
        }
    }

    fn cell(self, raw: String) -> CellValue {
        if is_missing(&raw) {
            return CellValue::Empty;
        }
        let trimmed = raw.trim();
        match self {
            ColumnKind::Integer => trimmed.parse().map(CellValue::Integer).unwrap_or(CellValue::Text(raw)),
            ColumnKind::Float => trimmed.parse().map(CellValue::Float).unwrap_or(CellValue::Text(raw)),
            ColumnKind::Bool => parse_bool(trimmed).map(CellValue::Bool).unwrap_or(CellValue::Text(raw)),
            ColumnKind::Text => CellValue::Text(raw),
        }
    }
}

fn parse_bool(cell: &str) -> Option<bool> {
    if cell.eq_ignore_ascii_case("true") {
        Some(true)
    } else if cell.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}
