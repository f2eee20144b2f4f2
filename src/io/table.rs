// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The columnar table container behind the data-level writer and reader:
//! named tables with typed columns, per-row appends and indexed reads,
//! serialized to a little-endian binary file (magic `LACTDF01`) that may be
//! gzip- or zstd-wrapped by suffix.

use std::io::{Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use indexmap::IndexMap;
use thiserror::Error;

use super::compression::{open_input, OutputStream};

const MAGIC: &[u8; 8] = b"LACTDF01";

#[derive(Error, Debug)]
pub enum TableError {
    #[error("Table '{table}' has no column '{column}'")]
    NoSuchColumn { table: String, column: String },

    #[error("Row value {index} has the wrong type for column '{column}'")]
    TypeMismatch { column: String, index: usize },

    #[error("Expected {expected} values for table '{table}', got {got}")]
    WrongRowLength {
        table: String,
        expected: usize,
        got: usize,
    },

    #[error("Row {row} is out of range for table '{table}' ({rows} rows)")]
    RowOutOfRange {
        table: String,
        row: usize,
        rows: usize,
    },

    #[error("Not a LACT data file: bad magic")]
    BadMagic,

    #[error("Unknown column type tag {0}")]
    UnknownColumnType(u8),

    #[error("Malformed string in file: {0}")]
    BadString(#[from] std::string::FromUtf8Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Column data types supported by the container.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnType {
    I32,
    I64,
    U64,
    F64,
    Bool,
    Str,
    ListI32,
    ListU16,
    ListU32,
    ListF64,
}

impl ColumnType {
    fn tag(self) -> u8 {
        match self {
            ColumnType::I32 => 0,
            ColumnType::I64 => 1,
            ColumnType::U64 => 2,
            ColumnType::F64 => 3,
            ColumnType::Bool => 4,
            ColumnType::Str => 5,
            ColumnType::ListI32 => 6,
            ColumnType::ListU16 => 7,
            ColumnType::ListU32 => 8,
            ColumnType::ListF64 => 9,
        }
    }

    fn from_tag(tag: u8) -> Result<ColumnType, TableError> {
        Ok(match tag {
            0 => ColumnType::I32,
            1 => ColumnType::I64,
            2 => ColumnType::U64,
            3 => ColumnType::F64,
            4 => ColumnType::Bool,
            5 => ColumnType::Str,
            6 => ColumnType::ListI32,
            7 => ColumnType::ListU16,
            8 => ColumnType::ListU32,
            9 => ColumnType::ListF64,
            other => return Err(TableError::UnknownColumnType(other)),
        })
    }
}

/// One typed column.
#[derive(Clone, Debug, PartialEq)]
pub enum Column {
    I32(Vec<i32>),
    I64(Vec<i64>),
    U64(Vec<u64>),
    F64(Vec<f64>),
    Bool(Vec<bool>),
    Str(Vec<String>),
    ListI32(Vec<Vec<i32>>),
    ListU16(Vec<Vec<u16>>),
    ListU32(Vec<Vec<u32>>),
    ListF64(Vec<Vec<f64>>),
}

impl Column {
    fn empty(column_type: ColumnType) -> Column {
        match column_type {
            ColumnType::I32 => Column::I32(Vec::new()),
            ColumnType::I64 => Column::I64(Vec::new()),
            ColumnType::U64 => Column::U64(Vec::new()),
            ColumnType::F64 => Column::F64(Vec::new()),
            ColumnType::Bool => Column::Bool(Vec::new()),
            ColumnType::Str => Column::Str(Vec::new()),
            ColumnType::ListI32 => Column::ListI32(Vec::new()),
            ColumnType::ListU16 => Column::ListU16(Vec::new()),
            ColumnType::ListU32 => Column::ListU32(Vec::new()),
            ColumnType::ListF64 => Column::ListF64(Vec::new()),
        }
    }

    fn column_type(&self) -> ColumnType {
        match self {
            Column::I32(_) => ColumnType::I32,
            Column::I64(_) => ColumnType::I64,
            Column::U64(_) => ColumnType::U64,
            Column::F64(_) => ColumnType::F64,
            Column::Bool(_) => ColumnType::Bool,
            Column::Str(_) => ColumnType::Str,
            Column::ListI32(_) => ColumnType::ListI32,
            Column::ListU16(_) => ColumnType::ListU16,
            Column::ListU32(_) => ColumnType::ListU32,
            Column::ListF64(_) => ColumnType::ListF64,
        }
    }

    fn len(&self) -> usize {
        match self {
            Column::I32(v) => v.len(),
            Column::I64(v) => v.len(),
            Column::U64(v) => v.len(),
            Column::F64(v) => v.len(),
            Column::Bool(v) => v.len(),
            Column::Str(v) => v.len(),
            Column::ListI32(v) => v.len(),
            Column::ListU16(v) => v.len(),
            Column::ListU32(v) => v.len(),
            Column::ListF64(v) => v.len(),
        }
    }

    fn push(&mut self, value: Value) -> Result<(), ()> {
        match (self, value) {
            (Column::I32(v), Value::I32(x)) => v.push(x),
            (Column::I64(v), Value::I64(x)) => v.push(x),
            (Column::U64(v), Value::U64(x)) => v.push(x),
            (Column::F64(v), Value::F64(x)) => v.push(x),
            (Column::Bool(v), Value::Bool(x)) => v.push(x),
            (Column::Str(v), Value::Str(x)) => v.push(x),
            (Column::ListI32(v), Value::ListI32(x)) => v.push(x),
            (Column::ListU16(v), Value::ListU16(x)) => v.push(x),
            (Column::ListU32(v), Value::ListU32(x)) => v.push(x),
            (Column::ListF64(v), Value::ListF64(x)) => v.push(x),
            _ => return Err(()),
        }
        Ok(())
    }

    fn value(&self, row: usize) -> Value {
        match self {
            Column::I32(v) => Value::I32(v[row]),
            Column::I64(v) => Value::I64(v[row]),
            Column::U64(v) => Value::U64(v[row]),
            Column::F64(v) => Value::F64(v[row]),
            Column::Bool(v) => Value::Bool(v[row]),
            Column::Str(v) => Value::Str(v[row].clone()),
            Column::ListI32(v) => Value::ListI32(v[row].clone()),
            Column::ListU16(v) => Value::ListU16(v[row].clone()),
            Column::ListU32(v) => Value::ListU32(v[row].clone()),
            Column::ListF64(v) => Value::ListF64(v[row].clone()),
        }
    }
}

/// One cell value, used for row appends and indexed reads.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    I32(i32),
    I64(i64),
    U64(u64),
    F64(f64),
    Bool(bool),
    Str(String),
    ListI32(Vec<i32>),
    ListU16(Vec<u16>),
    ListU32(Vec<u32>),
    ListF64(Vec<f64>),
}

impl Value {
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::I32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::U64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_list_i32(self) -> Option<Vec<i32>> {
        match self {
            Value::ListI32(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_list_u16(self) -> Option<Vec<u16>> {
        match self {
            Value::ListU16(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_list_u32(self) -> Option<Vec<u32>> {
        match self {
            Value::ListU32(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_list_f64(self) -> Option<Vec<f64>> {
        match self {
            Value::ListF64(v) => Some(v),
            _ => None,
        }
    }
}

/// A named table: an ordered set of equal-length typed columns.
#[derive(Clone, Debug, PartialEq)]
pub struct Table {
    pub name: String,
    columns: IndexMap<String, Column>,
    n_rows: usize,
}

impl Table {
    pub fn new(name: &str, schema: &[(&str, ColumnType)]) -> Table {
        let columns = schema
            .iter()
            .map(|&(column, ty)| (column.to_string(), Column::empty(ty)))
            .collect();
        Table {
            name: name.to_string(),
            columns,
            n_rows: 0,
        }
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.keys().map(String::as_str).collect()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }

    /// Append one row; the values must match the schema in order and type.
    pub fn push_row(&mut self, values: Vec<Value>) -> Result<(), TableError> {
        if values.len() != self.columns.len() {
            return Err(TableError::WrongRowLength {
                table: self.name.clone(),
                expected: self.columns.len(),
                got: values.len(),
            });
        }
        for (index, (value, (column, data))) in
            values.into_iter().zip(self.columns.iter_mut()).enumerate()
        {
            data.push(value).map_err(|_| TableError::TypeMismatch {
                column: column.clone(),
                index,
            })?;
        }
        self.n_rows += 1;
        Ok(())
    }

    /// Read one cell.
    pub fn value(&self, column: &str, row: usize) -> Result<Value, TableError> {
        let data = self
            .columns
            .get(column)
            .ok_or_else(|| TableError::NoSuchColumn {
                table: self.name.clone(),
                column: column.to_string(),
            })?;
        if row >= self.n_rows {
            return Err(TableError::RowOutOfRange {
                table: self.name.clone(),
                row,
                rows: self.n_rows,
            });
        }
        Ok(data.value(row))
    }

    pub fn column(&self, column: &str) -> Option<&Column> {
        self.columns.get(column)
    }

    /// Rows where `event_id` matches, in table order. Used by the
    /// event-level joins.
    pub fn rows_for_event(&self, event_id: u64) -> Vec<usize> {
        match self.columns.get("event_id") {
            Some(Column::U64(ids)) => ids
                .iter()
                .enumerate()
                .filter(|(_, &id)| id == event_id)
                .map(|(row, _)| row)
                .collect(),
            _ => Vec::new(),
        }
    }

    /// The `(event_id, tel_id) -> row` secondary index built at close time
    /// for per-telescope tables.
    pub fn build_event_tel_index(&self) -> Vec<(u64, i32, u64)> {
        let event_ids = match self.columns.get("event_id") {
            Some(Column::U64(v)) => v,
            _ => return Vec::new(),
        };
        let tel_ids = match self.columns.get("tel_id") {
            Some(Column::I32(v)) => v,
            _ => return Vec::new(),
        };
        let mut index: Vec<(u64, i32, u64)> = event_ids
            .iter()
            .zip(tel_ids)
            .enumerate()
            .map(|(row, (&event_id, &tel_id))| (event_id, tel_id, row as u64))
            .collect();
        index.sort_unstable();
        index
    }
}

/// An in-memory collection of tables addressed by a slash-separated path,
/// with the on-disk serialization.
#[derive(Clone, Debug, Default)]
pub struct TableFile {
    pub tables: IndexMap<String, Table>,
}

impl TableFile {
    pub fn new() -> TableFile {
        TableFile::default()
    }

    pub fn insert(&mut self, table: Table) {
        self.tables.insert(table.name.clone(), table);
    }

    pub fn get(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.tables.get_mut(name)
    }

    /// Table names under a path prefix, e.g. `events/dl2/geometry/`.
    pub fn names_with_prefix(&self, prefix: &str) -> Vec<&str> {
        self.tables
            .keys()
            .filter(|name| name.starts_with(prefix))
            .map(String::as_str)
            .collect()
    }

    pub fn write_to(&self, path: &Path, url_prefix: &str) -> Result<(), TableError> {
        let mut out = OutputStream::create(path, url_prefix)?;
        out.write_all(MAGIC)?;
        out.write_u32::<LittleEndian>(self.tables.len() as u32)?;
        for table in self.tables.values() {
            write_str(&mut out, &table.name)?;
            out.write_u64::<LittleEndian>(table.n_rows as u64)?;
            out.write_u32::<LittleEndian>(table.columns.len() as u32)?;
            for (column, data) in &table.columns {
                write_str(&mut out, column)?;
                out.write_u8(data.column_type().tag())?;
                write_column(&mut out, data)?;
            }
        }
        out.finish()?;
        Ok(())
    }

    pub fn read_from(path: &Path, url_prefix: &str) -> Result<TableFile, TableError> {
        let (mut input, _) = open_input(path, url_prefix)?;
        let mut magic = [0u8; 8];
        input.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(TableError::BadMagic);
        }
        let n_tables = input.read_u32::<LittleEndian>()?;
        let mut file = TableFile::new();
        for _ in 0..n_tables {
            let name = read_str(&mut input)?;
            let n_rows = input.read_u64::<LittleEndian>()? as usize;
            let n_columns = input.read_u32::<LittleEndian>()?;
            let mut columns = IndexMap::with_capacity(n_columns as usize);
            for _ in 0..n_columns {
                let column = read_str(&mut input)?;
                let ty = ColumnType::from_tag(input.read_u8()?)?;
                let data = read_column(&mut input, ty, n_rows)?;
                columns.insert(column, data);
            }
            file.tables.insert(
                name.clone(),
                Table {
                    name,
                    columns,
                    n_rows,
                },
            );
        }
        Ok(file)
    }
}

fn write_str<W: Write>(out: &mut W, s: &str) -> Result<(), TableError> {
    out.write_u32::<LittleEndian>(s.len() as u32)?;
    out.write_all(s.as_bytes())?;
    Ok(())
}

fn read_str<R: Read>(input: &mut R) -> Result<String, TableError> {
    let len = input.read_u32::<LittleEndian>()? as usize;
    let mut buf = vec![0u8; len];
    input.read_exact(&mut buf)?;
    Ok(String::from_utf8(buf)?)
}

fn write_column<W: Write>(out: &mut W, column: &Column) -> Result<(), TableError> {
    match column {
        Column::I32(v) => {
            for &x in v {
                out.write_i32::<LittleEndian>(x)?;
            }
        }
        Column::I64(v) => {
            for &x in v {
                out.write_i64::<LittleEndian>(x)?;
            }
        }
        Column::U64(v) => {
            for &x in v {
                out.write_u64::<LittleEndian>(x)?;
            }
        }
        Column::F64(v) => {
            for &x in v {
                out.write_f64::<LittleEndian>(x)?;
            }
        }
        Column::Bool(v) => {
            for &x in v {
                out.write_u8(u8::from(x))?;
            }
        }
        Column::Str(v) => {
            for x in v {
                write_str(out, x)?;
            }
        }
        Column::ListI32(v) => {
            for list in v {
                out.write_u32::<LittleEndian>(list.len() as u32)?;
                for &x in list {
                    out.write_i32::<LittleEndian>(x)?;
                }
            }
        }
        Column::ListU16(v) => {
            for list in v {
                out.write_u32::<LittleEndian>(list.len() as u32)?;
                for &x in list {
                    out.write_u16::<LittleEndian>(x)?;
                }
            }
        }
        Column::ListU32(v) => {
            for list in v {
                out.write_u32::<LittleEndian>(list.len() as u32)?;
                for &x in list {
                    out.write_u32::<LittleEndian>(x)?;
                }
            }
        }
        Column::ListF64(v) => {
            for list in v {
                out.write_u32::<LittleEndian>(list.len() as u32)?;
                for &x in list {
                    out.write_f64::<LittleEndian>(x)?;
                }
            }
        }
    }
    Ok(())
}

fn read_column<R: Read>(
    input: &mut R,
    ty: ColumnType,
    n_rows: usize,
) -> Result<Column, TableError> {
    Ok(match ty {
        ColumnType::I32 => {
            let mut v = Vec::with_capacity(n_rows);
            for _ in 0..n_rows {
                v.push(input.read_i32::<LittleEndian>()?);
            }
            Column::I32(v)
        }
        ColumnType::I64 => {
            let mut v = Vec::with_capacity(n_rows);
            for _ in 0..n_rows {
                v.push(input.read_i64::<LittleEndian>()?);
            }
            Column::I64(v)
        }
        ColumnType::U64 => {
            let mut v = Vec::with_capacity(n_rows);
            for _ in 0..n_rows {
                v.push(input.read_u64::<LittleEndian>()?);
            }
            Column::U64(v)
        }
        ColumnType::F64 => {
            let mut v = Vec::with_capacity(n_rows);
            for _ in 0..n_rows {
                v.push(input.read_f64::<LittleEndian>()?);
            }
            Column::F64(v)
        }
        ColumnType::Bool => {
            let mut v = Vec::with_capacity(n_rows);
            for _ in 0..n_rows {
                v.push(input.read_u8()? != 0);
            }
            Column::Bool(v)
        }
        ColumnType::Str => {
            let mut v = Vec::with_capacity(n_rows);
            for _ in 0..n_rows {
                v.push(read_str(input)?);
            }
            Column::Str(v)
        }
        ColumnType::ListI32 => {
            let mut v = Vec::with_capacity(n_rows);
            for _ in 0..n_rows {
                let len = input.read_u32::<LittleEndian>()? as usize;
                let mut list = Vec::with_capacity(len);
                for _ in 0..len {
                    list.push(input.read_i32::<LittleEndian>()?);
                }
                v.push(list);
            }
            Column::ListI32(v)
        }
        ColumnType::ListU16 => {
            let mut v = Vec::with_capacity(n_rows);
            for _ in 0..n_rows {
                let len = input.read_u32::<LittleEndian>()? as usize;
                let mut list = Vec::with_capacity(len);
                for _ in 0..len {
                    list.push(input.read_u16::<LittleEndian>()?);
                }
                v.push(list);
            }
            Column::ListU16(v)
        }
        ColumnType::ListU32 => {
            let mut v = Vec::with_capacity(n_rows);
            for _ in 0..n_rows {
                let len = input.read_u32::<LittleEndian>()? as usize;
                let mut list = Vec::with_capacity(len);
                for _ in 0..len {
                    list.push(input.read_u32::<LittleEndian>()?);
                }
                v.push(list);
            }
            Column::ListU32(v)
        }
        ColumnType::ListF64 => {
            let mut v = Vec::with_capacity(n_rows);
            for _ in 0..n_rows {
                let len = input.read_u32::<LittleEndian>()? as usize;
                let mut list = Vec::with_capacity(len);
                for _ in 0..len {
                    list.push(input.read_f64::<LittleEndian>()?);
                }
                v.push(list);
            }
            Column::ListF64(v)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> Table {
        let mut table = Table::new(
            "events/dl0",
            &[
                ("event_id", ColumnType::U64),
                ("tel_id", ColumnType::I32),
                ("image", ColumnType::ListF64),
                ("good", ColumnType::Bool),
            ],
        );
        for (event, tel) in [(1u64, 1i32), (1, 2), (2, 1)] {
            table
                .push_row(vec![
                    Value::U64(event),
                    Value::I32(tel),
                    Value::ListF64(vec![event as f64, tel as f64]),
                    Value::Bool(tel == 1),
                ])
                .unwrap();
        }
        table
    }

    #[test]
    fn push_and_read_rows() {
        let table = sample_table();
        assert_eq!(table.n_rows(), 3);
        assert_eq!(table.value("tel_id", 1).unwrap(), Value::I32(2));
        assert_eq!(
            table.value("image", 2).unwrap(),
            Value::ListF64(vec![2.0, 1.0])
        );
        assert!(matches!(
            table.value("bogus", 0),
            Err(TableError::NoSuchColumn { .. })
        ));
        assert!(matches!(
            table.value("tel_id", 7),
            Err(TableError::RowOutOfRange { .. })
        ));
    }

    #[test]
    fn type_checked_appends() {
        let mut table = sample_table();
        assert!(matches!(
            table.push_row(vec![
                Value::U64(3),
                Value::F64(1.0),
                Value::ListF64(vec![]),
                Value::Bool(false)
            ]),
            Err(TableError::TypeMismatch { .. })
        ));
        assert!(matches!(
            table.push_row(vec![Value::U64(3)]),
            Err(TableError::WrongRowLength { .. })
        ));
    }

    #[test]
    fn event_tel_index() {
        let table = sample_table();
        let index = table.build_event_tel_index();
        assert_eq!(index, vec![(1, 1, 0), (1, 2, 1), (2, 1, 2)]);
        assert_eq!(table.rows_for_event(1), vec![0, 1]);
    }

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["tables.lact", "tables.lact.gz", "tables.lact.zst"] {
            let mut file = TableFile::new();
            file.insert(sample_table());
            let mut strings = Table::new("cfg/metadata", &[("key", ColumnType::Str)]);
            strings
                .push_row(vec![Value::Str("créé".to_string())])
                .unwrap();
            file.insert(strings);

            let path = dir.path().join(name);
            file.write_to(&path, "").unwrap();
            let restored = TableFile::read_from(&path, "").unwrap();
            assert_eq!(restored.tables, file.tables);
        }
    }

    #[test]
    fn prefix_discovery() {
        let mut file = TableFile::new();
        file.insert(Table::new("events/dl2/geometry/HillasReconstructor", &[]));
        file.insert(Table::new("events/dl2/tels", &[]));
        assert_eq!(
            file.names_with_prefix("events/dl2/geometry/"),
            vec!["events/dl2/geometry/HillasReconstructor"]
        );
    }
}
