//! Table B-tree traversal.
//!
//! [`PageEngine`] walks one table tree from its root page and returns every
//! row it holds. The walk uses an explicit worklist so that deep or
//! malicious trees cannot exhaust the call stack, and tracks visited pages
//! so that cycles are reported instead of looping.

use std::collections::HashSet;

use bytes::Bytes;
use semlens_common::{LensError, LensResult};
use tracing::{debug, trace};

use super::cell::{InteriorCell, LeafCell};
use super::header::{DbHeader, PageRef};
use super::record::{decode_record, CatalogRow};
use super::types::PageType;

/// A row that was found in the tree but could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowRejection {
    /// Row id of the rejected cell.
    pub rowid: i64,
    /// Leaf page holding the cell.
    pub page: u32,
    /// Why the row was dropped.
    pub reason: String,
}

/// Result of reading one table tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableScan {
    /// Decoded rows in key order.
    pub rows: Vec<CatalogRow>,
    /// Rows that were dropped.
    pub rejected: Vec<RowRejection>,
}

/// Read-only engine over a catalog database slice.
///
/// # Example
///
/// ```rust,ignore
/// let engine = PageEngine::open(catalog_bytes)?;
/// let master = engine.read_table(1)?;
/// for row in &master.rows {
///     println!("{} {:?}", row.rowid, row.value(1));
/// }
/// ```
#[derive(Debug, Clone)]
pub struct PageEngine {
    data: Bytes,
    header: DbHeader,
    page_count: u32,
}

impl PageEngine {
    /// Opens a database slice and validates its header.
    ///
    /// # Errors
    ///
    /// Returns `PageFormat` if the header is invalid or the slice holds
    /// less than one page.
    pub fn open(data: Bytes) -> LensResult<Self> {
        let header = DbHeader::parse(&data)?;
        let pages = data.len() / header.page_size;
        if pages == 0 {
            return Err(LensError::page_format(
                1,
                format!(
                    "slice of {} bytes is shorter than one {}-byte page",
                    data.len(),
                    header.page_size
                ),
            ));
        }
        let page_count = u32::try_from(pages)
            .map_err(|_| LensError::page_format(0, "too many pages"))?;

        debug!(
            page_size = header.page_size,
            usable = header.usable_size(),
            page_count,
            "opened catalog database"
        );

        Ok(Self {
            data,
            header,
            page_count,
        })
    }

    /// Returns the database header.
    #[inline]
    pub fn header(&self) -> &DbHeader {
        &self.header
    }

    /// Returns the number of whole pages in the slice.
    #[inline]
    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    /// Returns the usable area of page `n` (1-indexed).
    fn usable_page(&self, n: u32) -> LensResult<&[u8]> {
        if n == 0 || n > self.page_count {
            return Err(LensError::page_format(
                n,
                format!("page number out of range 1..={}", self.page_count),
            ));
        }
        let start = (n as usize - 1) * self.header.page_size;
        Ok(&self.data[start..start + self.header.usable_size()])
    }

    /// Reads the header and cell pointers of page `n`.
    ///
    /// # Errors
    ///
    /// Returns `PageFormat` if the page does not exist or is malformed.
    pub fn page(&self, n: u32) -> LensResult<PageRef> {
        let usable = self.usable_page(n)?;
        PageRef::parse(n, usable, usable.len())
    }

    /// Reads every row of the table tree rooted at `root`.
    ///
    /// Children of an interior page are visited in order, then its
    /// right-most child, so rows come back in key order.
    ///
    /// # Errors
    ///
    /// Returns `PageFormat` if a page is reached twice, is out of range,
    /// is an index page, or is otherwise malformed. Rows that fail to
    /// decode are not errors; they are listed in [`TableScan::rejected`].
    pub fn read_table(&self, root: u32) -> LensResult<TableScan> {
        let mut scan = TableScan::default();
        let mut visited = HashSet::new();
        let mut worklist = vec![root];

        while let Some(page_number) = worklist.pop() {
            if !visited.insert(page_number) {
                return Err(LensError::page_format(
                    page_number,
                    format!("page reached twice in tree rooted at {root}"),
                ));
            }
            let page = self.page(page_number)?;
            let usable = self.usable_page(page_number)?;

            match page.page_type {
                PageType::InteriorTable => {
                    let right_most = page.right_most_child.unwrap_or(0);
                    worklist.push(right_most);
                    for &pointer in page.cell_pointers.iter().rev() {
                        let cell = InteriorCell::parse(page_number, usable, usize::from(pointer))?;
                        worklist.push(cell.left_child);
                    }
                }
                PageType::LeafTable => {
                    for &pointer in &page.cell_pointers {
                        self.read_leaf_cell(page_number, usable, usize::from(pointer), &mut scan)?;
                    }
                }
                other => {
                    return Err(LensError::page_format(
                        page_number,
                        format!("{other} page inside table tree rooted at {root}"),
                    ));
                }
            }
        }

        debug!(
            root,
            pages = visited.len(),
            rows = scan.rows.len(),
            rejected = scan.rejected.len(),
            "read catalog table"
        );
        Ok(scan)
    }

    fn read_leaf_cell(
        &self,
        page_number: u32,
        usable: &[u8],
        offset: usize,
        scan: &mut TableScan,
    ) -> LensResult<()> {
        let cell = LeafCell::parse(page_number, usable, offset)?;
        let decoded = self
            .assemble_payload(page_number, &cell)
            .and_then(|payload| decode_record(cell.rowid, &payload, self.header.text_encoding));

        match decoded {
            Ok(fields) => scan.rows.push(CatalogRow {
                rowid: cell.rowid,
                fields,
            }),
            Err(e) if !e.is_fatal() => {
                trace!(rowid = cell.rowid, page = page_number, error = %e, "rejected row");
                scan.rejected.push(RowRejection {
                    rowid: cell.rowid,
                    page: page_number,
                    reason: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }

    /// Reconstructs a full payload from its local part and overflow chain.
    ///
    /// A chain that ends before the declared length yields a `RecordDecode`
    /// error (row-scoped). An overflow page outside the slice or a chain
    /// that loops is a `PageFormat` error.
    pub fn assemble_payload(&self, page_number: u32, cell: &LeafCell<'_>) -> LensResult<Vec<u8>> {
        let mut payload = Vec::with_capacity(cell.payload_len.min(self.data.len()));
        payload.extend_from_slice(cell.local);

        let Some(first) = cell.first_overflow else {
            return Ok(payload);
        };

        let capacity = self.header.usable_size() - 4;
        let mut next = first;
        let mut chain = HashSet::new();

        while payload.len() < cell.payload_len {
            if next == 0 {
                return Err(LensError::record_decode(
                    cell.rowid,
                    format!(
                        "overflow chain from page {page_number} ended after {} of {} bytes",
                        payload.len(),
                        cell.payload_len
                    ),
                ));
            }
            if !chain.insert(next) {
                return Err(LensError::page_format(
                    next,
                    format!("overflow chain of row {} loops", cell.rowid),
                ));
            }
            let overflow = self.usable_page(next)?;
            let take = capacity.min(cell.payload_len - payload.len());
            payload.extend_from_slice(&overflow[4..4 + take]);
            next = u32::from_be_bytes([overflow[0], overflow[1], overflow[2], overflow[3]]);
        }

        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::cell::local_payload_size;
    use crate::page::record::RecordValue;
    use crate::page::varint::encode_varint;
    use semlens_common::constants::{CATALOG_DB_HEADER_SIZE, CATALOG_DB_MAGIC};
    use semlens_common::ErrorCode;

    const PAGE: usize = 512;

    fn database(pages: usize) -> Vec<u8> {
        let mut data = vec![0u8; PAGE * pages];
        data[..16].copy_from_slice(CATALOG_DB_MAGIC);
        data[16..18].copy_from_slice(&(PAGE as u16).to_be_bytes());
        data[56..60].copy_from_slice(&1u32.to_be_bytes());
        data
    }

    fn page_mut(data: &mut [u8], n: usize) -> &mut [u8] {
        &mut data[(n - 1) * PAGE..n * PAGE]
    }

    fn header_offset(n: usize) -> usize {
        if n == 1 {
            CATALOG_DB_HEADER_SIZE
        } else {
            0
        }
    }

    /// Writes a leaf page whose cells are placed from the end of the page.
    fn write_leaf(data: &mut [u8], n: usize, cells: &[Vec<u8>]) {
        let base = header_offset(n);
        let page = page_mut(data, n);
        page[base] = 0x0D;
        page[base + 3..base + 5].copy_from_slice(&(cells.len() as u16).to_be_bytes());
        let mut content = PAGE;
        for (i, cell) in cells.iter().enumerate() {
            content -= cell.len();
            page[content..content + cell.len()].copy_from_slice(cell);
            let ptr = base + 8 + i * 2;
            page[ptr..ptr + 2].copy_from_slice(&(content as u16).to_be_bytes());
        }
    }

    fn write_interior(data: &mut [u8], n: usize, children: &[(u32, i64)], right_most: u32) {
        let base = header_offset(n);
        let page = page_mut(data, n);
        page[base] = 0x05;
        page[base + 3..base + 5].copy_from_slice(&(children.len() as u16).to_be_bytes());
        page[base + 8..base + 12].copy_from_slice(&right_most.to_be_bytes());
        let mut content = PAGE;
        for (i, (child, key)) in children.iter().enumerate() {
            let mut cell = child.to_be_bytes().to_vec();
            encode_varint(*key as u64, &mut cell);
            content -= cell.len();
            page[content..content + cell.len()].copy_from_slice(&cell);
            let ptr = base + 12 + i * 2;
            page[ptr..ptr + 2].copy_from_slice(&(content as u16).to_be_bytes());
        }
    }

    fn int_record(value: u8) -> Vec<u8> {
        vec![2, 1, value]
    }

    fn leaf_cell(rowid: i64, payload: &[u8]) -> Vec<u8> {
        let mut cell = Vec::new();
        encode_varint(payload.len() as u64, &mut cell);
        encode_varint(rowid as u64, &mut cell);
        cell.extend_from_slice(payload);
        cell
    }

    fn ints(scan: &TableScan) -> Vec<(i64, i64)> {
        scan.rows
            .iter()
            .map(|r| (r.rowid, r.value(0).and_then(RecordValue::as_i64).unwrap()))
            .collect()
    }

    #[test]
    fn test_single_leaf_root() {
        let mut data = database(2);
        write_leaf(&mut data, 2, &[leaf_cell(1, &int_record(10)), leaf_cell(2, &int_record(20))]);
        let engine = PageEngine::open(Bytes::from(data)).unwrap();
        assert_eq!(engine.page_count(), 2);

        let scan = engine.read_table(2).unwrap();
        assert_eq!(ints(&scan), vec![(1, 10), (2, 20)]);
        assert!(scan.rejected.is_empty());
    }

    #[test]
    fn test_interior_order() {
        let mut data = database(5);
        write_interior(&mut data, 2, &[(3, 1), (4, 2)], 5);
        write_leaf(&mut data, 3, &[leaf_cell(1, &int_record(1))]);
        write_leaf(&mut data, 4, &[leaf_cell(2, &int_record(2))]);
        write_leaf(&mut data, 5, &[leaf_cell(3, &int_record(3))]);
        let engine = PageEngine::open(Bytes::from(data)).unwrap();

        let scan = engine.read_table(2).unwrap();
        assert_eq!(ints(&scan), vec![(1, 1), (2, 2), (3, 3)]);
    }

    #[test]
    fn test_leaf_on_page_one() {
        let mut data = database(1);
        write_leaf(&mut data, 1, &[leaf_cell(7, &int_record(70))]);
        let engine = PageEngine::open(Bytes::from(data)).unwrap();
        assert_eq!(ints(&engine.read_table(1).unwrap()), vec![(7, 70)]);
    }

    #[test]
    fn test_cycle_is_fatal() {
        let mut data = database(3);
        write_interior(&mut data, 2, &[(3, 1)], 2);
        write_leaf(&mut data, 3, &[leaf_cell(1, &int_record(1))]);
        let engine = PageEngine::open(Bytes::from(data)).unwrap();

        let err = engine.read_table(2).unwrap_err();
        assert_eq!(err.code(), ErrorCode::PageFormat);
        assert!(err.is_fatal());
    }

    #[test]
    fn test_out_of_range_child() {
        let mut data = database(2);
        write_interior(&mut data, 2, &[(0, 1)], 9);
        let engine = PageEngine::open(Bytes::from(data)).unwrap();
        assert_eq!(engine.read_table(2).unwrap_err().code(), ErrorCode::PageFormat);
    }

    #[test]
    fn test_index_page_in_table_tree() {
        let mut data = database(2);
        page_mut(&mut data, 2)[0] = 0x0A;
        let engine = PageEngine::open(Bytes::from(data)).unwrap();
        let err = engine.read_table(2).unwrap_err();
        assert!(err.to_string().contains("LeafIndex"));
    }

    #[test]
    fn test_undecodable_row_is_rejected() {
        let mut data = database(2);
        // Header claims a 10-byte text field with a 1-byte body
        let bad = vec![2, 13 + 20, b'x'];
        write_leaf(&mut data, 2, &[leaf_cell(1, &int_record(5)), leaf_cell(2, &bad)]);
        let engine = PageEngine::open(Bytes::from(data)).unwrap();

        let scan = engine.read_table(2).unwrap();
        assert_eq!(ints(&scan), vec![(1, 5)]);
        assert_eq!(scan.rejected.len(), 1);
        assert_eq!(scan.rejected[0].rowid, 2);
    }

    fn spilled_database(payload: &[u8], chain: &[u32], links: &[u32]) -> Vec<u8> {
        let usable = PAGE;
        let local = local_payload_size(payload.len(), usable);
        let pages = 2 + chain.len();
        let mut data = database(pages);

        let mut cell = Vec::new();
        encode_varint(payload.len() as u64, &mut cell);
        encode_varint(1, &mut cell);
        cell.extend_from_slice(&payload[..local]);
        cell.extend_from_slice(&chain[0].to_be_bytes());
        write_leaf(&mut data, 2, &[cell]);

        let mut rest = &payload[local..];
        for (i, &n) in chain.iter().enumerate() {
            let page = page_mut(&mut data, n as usize);
            page[..4].copy_from_slice(&links[i].to_be_bytes());
            let take = rest.len().min(usable - 4);
            page[4..4 + take].copy_from_slice(&rest[..take]);
            rest = &rest[take..];
        }
        data
    }

    fn text_payload(len: usize) -> Vec<u8> {
        let body: Vec<u8> = (0..len).map(|i| b'a' + (i % 26) as u8).collect();
        let mut header = Vec::new();
        encode_varint((13 + 2 * len) as u64, &mut header);
        let mut out = vec![(header.len() + 1) as u8];
        out.extend_from_slice(&header);
        out.extend_from_slice(&body);
        out
    }

    #[test]
    fn test_overflow_chain() {
        let payload = text_payload(1200);
        let data = spilled_database(&payload, &[3, 4, 5], &[4, 5, 0]);
        let engine = PageEngine::open(Bytes::from(data)).unwrap();

        let scan = engine.read_table(2).unwrap();
        assert_eq!(scan.rows.len(), 1);
        let text = scan.rows[0].value(0).and_then(RecordValue::as_str).unwrap();
        assert_eq!(text.len(), 1200);
        assert!(text.starts_with("abcdefghijklmnopqrstuvwxyzab"));
    }

    #[test]
    fn test_short_overflow_chain_rejects_row() {
        let payload = text_payload(1200);
        // Chain stops after the first overflow page
        let data = spilled_database(&payload, &[3, 4, 5], &[0, 5, 0]);
        let engine = PageEngine::open(Bytes::from(data)).unwrap();

        let scan = engine.read_table(2).unwrap();
        assert!(scan.rows.is_empty());
        assert_eq!(scan.rejected.len(), 1);
        assert!(scan.rejected[0].reason.contains("overflow chain"));
    }

    #[test]
    fn test_overflow_out_of_range_is_fatal() {
        let payload = text_payload(1200);
        let data = spilled_database(&payload, &[3, 4, 5], &[99, 5, 0]);
        let engine = PageEngine::open(Bytes::from(data)).unwrap();
        assert_eq!(engine.read_table(2).unwrap_err().code(), ErrorCode::PageFormat);
    }

    #[test]
    fn test_open_rejects_short_slice() {
        let data = database(1);
        assert!(PageEngine::open(Bytes::from(data[..200].to_vec())).is_err());
    }
}
