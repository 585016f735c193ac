//! Builds catalog databases page by page.
//!
//! The output follows the on-disk layout the page engine reads: a 100-byte
//! header on page 1, the schema table rooted at page 1, and one table tree
//! per declared table. Trees that do not fit one page get as many interior
//! levels as needed over their leaves; payloads that exceed the local
//! limit spill into overflow chains.

use semlens_common::constants::{CATALOG_DB_HEADER_SIZE, CATALOG_DB_MAGIC};
use semlens_storage::page::{encode_varint, local_payload_size, varint_len};

const LEAF_TABLE: u8 = 0x0D;
const INTERIOR_TABLE: u8 = 0x05;
const LEAF_HEADER: usize = 8;
const INTERIOR_HEADER: usize = 12;

/// A value stored in a catalog record.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// NULL.
    Null,
    /// Integer, stored at the narrowest serial width.
    Int(i64),
    /// 8-byte float.
    Real(f64),
    /// UTF-8 text.
    Text(String),
    /// Raw bytes.
    Blob(Vec<u8>),
    /// Constant 0 or 1 (serial types 8 and 9).
    Bool(bool),
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

impl SqlValue {
    fn serial_type(&self) -> u64 {
        match self {
            Self::Null => 0,
            Self::Int(v) => match *v {
                v if i8::try_from(v).is_ok() => 1,
                v if i16::try_from(v).is_ok() => 2,
                v if (-(1 << 23)..(1 << 23)).contains(&v) => 3,
                v if i32::try_from(v).is_ok() => 4,
                v if (-(1 << 47)..(1 << 47)).contains(&v) => 5,
                _ => 6,
            },
            Self::Real(_) => 7,
            Self::Bool(false) => 8,
            Self::Bool(true) => 9,
            Self::Blob(b) => 12 + 2 * b.len() as u64,
            Self::Text(s) => 13 + 2 * s.len() as u64,
        }
    }

    fn write_body(&self, out: &mut Vec<u8>) {
        match self {
            Self::Null | Self::Bool(_) => {}
            Self::Int(v) => {
                let width = match self.serial_type() {
                    1 => 1,
                    2 => 2,
                    3 => 3,
                    4 => 4,
                    5 => 6,
                    _ => 8,
                };
                out.extend_from_slice(&v.to_be_bytes()[8 - width..]);
            }
            Self::Real(v) => out.extend_from_slice(&v.to_be_bytes()),
            Self::Blob(b) => out.extend_from_slice(b),
            Self::Text(s) => out.extend_from_slice(s.as_bytes()),
        }
    }
}

/// Encodes values as a record: header length, serial types, bodies.
pub fn encode_record(values: &[SqlValue]) -> Vec<u8> {
    let types: Vec<u64> = values.iter().map(SqlValue::serial_type).collect();
    let types_len: usize = types.iter().map(|&t| varint_len(t)).sum();

    // The header length counts its own varint
    let mut header_len = types_len + 1;
    while types_len + varint_len(header_len as u64) != header_len {
        header_len = types_len + varint_len(header_len as u64);
    }

    let mut out = Vec::new();
    encode_varint(header_len as u64, &mut out);
    for &t in &types {
        encode_varint(t, &mut out);
    }
    for value in values {
        value.write_body(&mut out);
    }
    out
}

#[derive(Debug, Clone)]
struct TableDef {
    name: String,
    sql: String,
    rows: Vec<(i64, Vec<SqlValue>)>,
}

/// Builds a catalog database.
#[derive(Debug, Clone)]
pub struct CatalogDbBuilder {
    page_size: usize,
    tables: Vec<TableDef>,
}

impl Default for CatalogDbBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogDbBuilder {
    /// Creates a builder with 4 KiB pages.
    pub fn new() -> Self {
        Self {
            page_size: 4096,
            tables: Vec::new(),
        }
    }

    /// Sets the page size (a power of two, 512 to 65536).
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        assert!(page_size.is_power_of_two() && (512..=65536).contains(&page_size));
        self.page_size = page_size;
        self
    }

    /// Returns the page size.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Declares a table with its `CREATE TABLE` statement.
    pub fn create_table(&mut self, name: &str, sql: &str) -> &mut Self {
        self.tables.push(TableDef {
            name: name.to_string(),
            sql: sql.to_string(),
            rows: Vec::new(),
        });
        self
    }

    /// Appends a row to a declared table.
    ///
    /// A rowid alias column should be passed as `SqlValue::Null`; its value
    /// is the rowid.
    pub fn insert(&mut self, table: &str, rowid: i64, values: Vec<SqlValue>) -> &mut Self {
        let def = self
            .tables
            .iter_mut()
            .find(|t| t.name == table)
            .unwrap_or_else(|| panic!("table {table} not declared"));
        def.rows.push((rowid, values));
        self
    }

    /// Returns true if a table is declared.
    pub fn has_table(&self, name: &str) -> bool {
        self.tables.iter().any(|t| t.name == name)
    }

    /// Lays out the database.
    pub fn build(&self) -> Vec<u8> {
        let mut pages = Pages {
            page_size: self.page_size,
            pages: vec![vec![0; self.page_size]],
        };

        let mut schema_rows = Vec::with_capacity(self.tables.len());
        for (i, table) in self.tables.iter().enumerate() {
            let root = pages.allocate();
            pages.write_tree(root, &table.rows);
            schema_rows.push((
                i as i64 + 1,
                vec![
                    SqlValue::from("table"),
                    SqlValue::from(table.name.as_str()),
                    SqlValue::from(table.name.as_str()),
                    SqlValue::Int(i64::from(root)),
                    SqlValue::from(table.sql.as_str()),
                ],
            ));
        }
        pages.write_tree(1, &schema_rows);

        let page_count = pages.pages.len() as u32;
        let mut out: Vec<u8> = pages.pages.concat();
        write_header(&mut out, self.page_size, page_count);
        out
    }
}

fn write_header(out: &mut [u8], page_size: usize, page_count: u32) {
    let header = &mut out[..CATALOG_DB_HEADER_SIZE];
    header[..16].copy_from_slice(CATALOG_DB_MAGIC);
    let raw_size = if page_size == 65536 { 1 } else { page_size as u16 };
    header[16..18].copy_from_slice(&raw_size.to_be_bytes());
    header[18] = 1;
    header[19] = 1;
    header[20] = 0;
    header[21] = 64;
    header[22] = 32;
    header[23] = 32;
    header[28..32].copy_from_slice(&page_count.to_be_bytes());
    header[44..48].copy_from_slice(&4u32.to_be_bytes());
    header[56..60].copy_from_slice(&1u32.to_be_bytes());
}

struct Pages {
    page_size: usize,
    pages: Vec<Vec<u8>>,
}

impl Pages {
    fn allocate(&mut self) -> u32 {
        self.pages.push(vec![0; self.page_size]);
        self.pages.len() as u32
    }

    fn page_mut(&mut self, n: u32) -> &mut Vec<u8> {
        &mut self.pages[n as usize - 1]
    }

    fn base(n: u32) -> usize {
        if n == 1 {
            CATALOG_DB_HEADER_SIZE
        } else {
            0
        }
    }

    /// Builds a leaf cell, spilling the payload tail into overflow pages.
    fn leaf_cell(&mut self, rowid: i64, payload: &[u8]) -> Vec<u8> {
        let usable = self.page_size;
        let local = local_payload_size(payload.len(), usable);

        let mut cell = Vec::new();
        encode_varint(payload.len() as u64, &mut cell);
        encode_varint(rowid as u64, &mut cell);
        cell.extend_from_slice(&payload[..local]);

        if local < payload.len() {
            let chunks: Vec<&[u8]> = payload[local..].chunks(usable - 4).collect();
            let numbers: Vec<u32> = chunks.iter().map(|_| self.allocate()).collect();
            for (i, chunk) in chunks.iter().enumerate() {
                let next = numbers.get(i + 1).copied().unwrap_or(0);
                let page = self.page_mut(numbers[i]);
                page[..4].copy_from_slice(&next.to_be_bytes());
                page[4..4 + chunk.len()].copy_from_slice(chunk);
            }
            cell.extend_from_slice(&numbers[0].to_be_bytes());
        }
        cell
    }

    fn write_tree(&mut self, root: u32, rows: &[(i64, Vec<SqlValue>)]) {
        let mut sorted: Vec<&(i64, Vec<SqlValue>)> = rows.iter().collect();
        sorted.sort_by_key(|(rowid, _)| *rowid);
        let cells: Vec<(i64, Vec<u8>)> = sorted
            .into_iter()
            .map(|(rowid, values)| (*rowid, self.leaf_cell(*rowid, &encode_record(values))))
            .collect();

        let root_capacity = self.page_size - Self::base(root) - LEAF_HEADER;
        let total: usize = cells.iter().map(|(_, c)| c.len() + 2).sum();
        if total <= root_capacity {
            self.write_leaf(root, &cells);
            return;
        }

        let leaf_capacity = self.page_size - LEAF_HEADER;
        let mut level = Vec::new();
        for group in pack(cells, leaf_capacity, |(_, cell)| cell.len() + 2) {
            let page = self.allocate();
            self.write_leaf(page, &group);
            let max_rowid = group.last().map_or(0, |(rowid, _)| *rowid);
            level.push((page, max_rowid));
        }

        // Stack interior levels until the remaining children fit the root
        let interior_root_capacity = self.page_size - Self::base(root) - INTERIOR_HEADER;
        let interior_capacity = self.page_size - INTERIOR_HEADER;
        while interior_size(&level) > interior_root_capacity {
            let mut parents = Vec::new();
            for mut group in pack_interior(level, interior_capacity) {
                let Some((right_most, max_rowid)) = group.pop() else {
                    continue;
                };
                let page = self.allocate();
                self.write_interior(page, &group, right_most);
                parents.push((page, max_rowid));
            }
            level = parents;
        }

        let Some((right_most, _)) = level.pop() else {
            return;
        };
        self.write_interior(root, &level, right_most);
    }

    fn write_leaf(&mut self, n: u32, cells: &[(i64, Vec<u8>)]) {
        let base = Self::base(n);
        let page_size = self.page_size;
        let page = self.page_mut(n);
        page[base] = LEAF_TABLE;
        page[base + 3..base + 5].copy_from_slice(&(cells.len() as u16).to_be_bytes());

        let mut content = page_size;
        for (i, (_, cell)) in cells.iter().enumerate() {
            content -= cell.len();
            page[content..content + cell.len()].copy_from_slice(cell);
            let pointer = base + LEAF_HEADER + 2 * i;
            page[pointer..pointer + 2].copy_from_slice(&(content as u16).to_be_bytes());
        }
        assert!(
            base + LEAF_HEADER + 2 * cells.len() <= content,
            "leaf page {n} overfull"
        );
        let start = if content == 65536 { 0 } else { content as u16 };
        page[base + 5..base + 7].copy_from_slice(&start.to_be_bytes());
    }

    fn write_interior(&mut self, n: u32, children: &[(u32, i64)], right_most: u32) {
        let base = Self::base(n);
        let page_size = self.page_size;
        let page = self.page_mut(n);
        page[base] = INTERIOR_TABLE;
        page[base + 3..base + 5].copy_from_slice(&(children.len() as u16).to_be_bytes());
        page[base + 8..base + 12].copy_from_slice(&right_most.to_be_bytes());

        let mut content = page_size;
        for (i, (child, rowid)) in children.iter().enumerate() {
            let mut cell = child.to_be_bytes().to_vec();
            encode_varint(*rowid as u64, &mut cell);
            content -= cell.len();
            page[content..content + cell.len()].copy_from_slice(&cell);
            let pointer = base + INTERIOR_HEADER + 2 * i;
            page[pointer..pointer + 2].copy_from_slice(&(content as u16).to_be_bytes());
        }
        assert!(
            base + INTERIOR_HEADER + 2 * children.len() <= content,
            "interior page {n} overfull"
        );
        let start = if content == 65536 { 0 } else { content as u16 };
        page[base + 5..base + 7].copy_from_slice(&start.to_be_bytes());
    }
}

/// Bytes an interior entry takes as a cell plus its pointer.
fn interior_entry_size(entry: &(u32, i64)) -> usize {
    4 + varint_len(entry.1 as u64) + 2
}

/// Bytes an interior page needs for `children`, the last of which is the
/// right-most pointer in the header.
fn interior_size(children: &[(u32, i64)]) -> usize {
    children
        .split_last()
        .map_or(0, |(_, cells)| cells.iter().map(interior_entry_size).sum())
}

/// Splits `items` into consecutive groups whose sizes fit `capacity`.
fn pack<T>(items: Vec<T>, capacity: usize, size: impl Fn(&T) -> usize) -> Vec<Vec<T>> {
    let mut groups: Vec<Vec<T>> = vec![Vec::new()];
    let mut used = 0;
    for item in items {
        let item_size = size(&item);
        if used + item_size > capacity && groups.last().is_some_and(|g| !g.is_empty()) {
            groups.push(Vec::new());
            used = 0;
        }
        used += item_size;
        if let Some(group) = groups.last_mut() {
            group.push(item);
        }
    }
    groups
}

/// Groups interior entries into pages. Each group's last entry becomes the
/// right-most pointer, which needs no cell, so a trailing single entry can
/// join the previous group and no page is left without cells.
fn pack_interior(entries: Vec<(u32, i64)>, capacity: usize) -> Vec<Vec<(u32, i64)>> {
    let mut groups = pack(entries, capacity, interior_entry_size);
    if groups.len() > 1 && groups.last().is_some_and(|g| g.len() == 1) {
        if let Some(last) = groups.pop() {
            if let Some(previous) = groups.last_mut() {
                previous.extend(last);
            }
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_header_and_widths() {
        let record = encode_record(&[
            SqlValue::Null,
            SqlValue::Int(300),
            SqlValue::from("ab"),
            SqlValue::Bool(true),
        ]);
        // header 5 bytes: len, 0, 2, 17, 9
        assert_eq!(&record[..5], &[5, 0, 2, 17, 9]);
        assert_eq!(&record[5..], &[0x01, 0x2C, b'a', b'b']);
    }

    /// Levels from the root of a tree down to its right-most leaf.
    fn depth(db: &[u8], page_size: usize, root: u32) -> usize {
        let mut levels = 1;
        let mut page = root;
        loop {
            let start = (page as usize - 1) * page_size + Pages::base(page);
            if db[start] != INTERIOR_TABLE {
                return levels;
            }
            page = u32::from_be_bytes([
                db[start + 8],
                db[start + 9],
                db[start + 10],
                db[start + 11],
            ]);
            levels += 1;
        }
    }

    #[test]
    fn test_large_table_builds_three_levels() {
        let mut builder = CatalogDbBuilder::new().with_page_size(512);
        builder.create_table("T", "CREATE TABLE T (v TEXT)");
        for rowid in 1..=5000 {
            builder.insert("T", rowid, vec![SqlValue::Text(format!("value-{rowid:08}"))]);
        }
        let db = builder.build();
        assert!(depth(&db, 512, 2) >= 3);

        let engine = semlens_storage::PageEngine::open(bytes::Bytes::from(db)).unwrap();
        let scan = engine.read_table(2).unwrap();
        assert!(scan.rejected.is_empty());
        assert_eq!(scan.rows.len(), 5000);
        assert!(scan.rows.windows(2).all(|w| w[0].rowid < w[1].rowid));
        assert_eq!(scan.rows[4999].value(0).and_then(|v| v.as_str()), Some("value-00005000"));
    }

    #[test]
    fn test_pack_interior_keeps_cells_on_every_page() {
        let entries: Vec<(u32, i64)> = (1..=9).map(|i| (i, i64::from(i))).collect();
        // Seven-byte entries, three per page, with a trailing single entry
        let groups = pack_interior(entries, 21);
        let sizes: Vec<usize> = groups.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![3, 3, 3]);

        let entries: Vec<(u32, i64)> = (1..=10).map(|i| (i, i64::from(i))).collect();
        let sizes: Vec<usize> = pack_interior(entries, 21).iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![3, 3, 4]);
    }

    #[test]
    fn test_header_fields() {
        let db = CatalogDbBuilder::new().with_page_size(512).build();
        assert_eq!(db.len(), 512);
        assert_eq!(&db[..16], CATALOG_DB_MAGIC);
        assert_eq!(u16::from_be_bytes([db[16], db[17]]), 512);
        assert_eq!(db[100], LEAF_TABLE);
    }
}
