//! Snapshot files for indexes.
//!
//! An index is stored as `<dir>/<name>.idx`: a fixed file header frame followed by
//! `page_size` frames, each holding a page header and the leaf entries in key order.
use super::btree::BPlusTree;
use super::column::{ColumnType, ColumnValue};
use super::key::IndexKey;
use super::node::Offset;
use crate::errors::Error;
use bincode::{config, Decode, Encode};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Encode, Decode, Debug)]
pub struct IndexHeader {
    /// Identifies a snapshot file.
    pub magic: u32,
    /// Key type tag of the index.
    pub key_type: u8,
    /// Fan-out the tree was built with.
    pub degree: u32,
    /// Size of every page frame after the header.
    pub page_size: u32,
    /// Number of records in the index.
    pub index_n_recs: u32,
    /// Number of page frames.
    pub index_n_pages: u32,
}

#[derive(Encode, Decode, Debug)]
pub struct PageHeader {
    /// Number of records in the page.
    pub page_n_recs: u16,
    /// Next page number, 0 for the last page.
    pub page_next: u32,
}

pub const MAGIC: u32 = 0x4d44_5831;
pub const INDEX_HEADER_SIZE: usize = 64;
pub const PAGE_HEADER_SIZE: usize = 16;
pub const INDEX_EXTENSION: &str = "idx";

pub fn index_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.{}", name, INDEX_EXTENSION))
}

/// Creates the backing directory when absent.
pub fn ensure_store(dir: &Path) -> Result<(), Error> {
    if !dir.exists() {
        std::fs::create_dir_all(dir)?;
        info!(path = %dir.display(), "Created index store.");
    }
    Ok(())
}

/// Lists the names of all indexes stored in `dir`.
pub fn list_stores(dir: &Path) -> Result<Vec<String>, Error> {
    let mut names = Vec::new();
    if !dir.exists() {
        return Ok(names);
    }
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(INDEX_EXTENSION) {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            names.push(stem.to_string());
        }
    }
    names.sort();
    Ok(names)
}

/// Deletes the snapshot of `name`. Returns whether there was one.
pub fn remove(dir: &Path, name: &str) -> Result<bool, Error> {
    let path = index_path(dir, name);
    if !path.exists() {
        return Ok(false);
    }
    std::fs::remove_file(&path)?;
    debug!(index = name, "Removed snapshot.");
    Ok(true)
}

/// Reads only the header of a stored index.
pub fn read_header(dir: &Path, name: &str) -> Result<Option<IndexHeader>, Error> {
    let path = index_path(dir, name);
    if !path.exists() {
        return Ok(None);
    }
    let bytes = std::fs::read(&path)?;
    Ok(Some(parse_header(name, &bytes)?))
}

/// Key type of a stored index.
pub fn stored_type(dir: &Path, name: &str) -> Result<Option<ColumnType>, Error> {
    match read_header(dir, name)? {
        Some(header) => Ok(Some(ColumnType::from_tag(header.key_type)?)),
        None => Ok(None),
    }
}

fn parse_header(name: &str, bytes: &[u8]) -> Result<IndexHeader, Error> {
    if bytes.len() < INDEX_HEADER_SIZE {
        return Err(err!(Encoding, "Snapshot of '{}' is truncated.", name));
    }
    let header: IndexHeader = decode_header(&bytes[..INDEX_HEADER_SIZE])?;
    if header.magic != MAGIC {
        return Err(err!(Encoding, "'{}' is not an index snapshot.", name));
    }
    Ok(header)
}

/// Writes the leaf chain of `tree` to `<dir>/<name>.idx`. Returns the number of pages written.
pub fn dump<K: IndexKey>(
    tree: &BPlusTree<K>,
    dir: &Path,
    page_size: usize,
) -> Result<usize, Error> {
    let capacity = page_size
        .checked_sub(PAGE_HEADER_SIZE)
        .filter(|c| *c > 0)
        .ok_or_else(|| err!(Config, "Page size {} cannot hold a page header.", page_size))?;

    // Records never cross page boundaries.
    let mut pages: Vec<(u16, Vec<u8>)> = vec![(0, Vec::with_capacity(capacity))];
    for (key, offset) in tree.iter() {
        let record = bincode::encode_to_vec((key.to_value(), offset), config::standard())?;
        if record.len() > capacity {
            return Err(err!(
                Encoding,
                "Record {} of {} bytes does not fit a page of {} bytes.",
                key,
                record.len(),
                page_size
            ));
        }
        let full = match pages.last() {
            Some((n, body)) => body.len() + record.len() > capacity || *n == u16::MAX,
            None => true,
        };
        if full {
            pages.push((0, Vec::with_capacity(capacity)));
        }
        if let Some((n, body)) = pages.last_mut() {
            *n += 1;
            body.extend_from_slice(&record);
        }
    }

    ensure_store(dir)?;
    let path = index_path(dir, tree.name());
    let mut file = File::create(&path)?;

    let header: [u8; INDEX_HEADER_SIZE] = encode_header(&IndexHeader {
        magic: MAGIC,
        key_type: K::COLUMN_TYPE.tag(),
        degree: tree.degree() as u32,
        page_size: page_size as u32,
        index_n_recs: tree.len() as u32,
        index_n_pages: pages.len() as u32,
    })?;
    file.write_all(&header)?;

    let total = pages.len();
    let mut frame = vec![0u8; page_size];
    for (i, (n_recs, body)) in pages.iter().enumerate() {
        let page_header: [u8; PAGE_HEADER_SIZE] = encode_header(&PageHeader {
            page_n_recs: *n_recs,
            page_next: if i + 1 < total { (i + 1) as u32 } else { 0 },
        })?;
        frame.fill(0);
        frame[..PAGE_HEADER_SIZE].copy_from_slice(&page_header);
        frame[PAGE_HEADER_SIZE..PAGE_HEADER_SIZE + body.len()].copy_from_slice(body);
        file.write_all(&frame)?;
    }
    file.flush()?;
    info!(index = tree.name(), keys = tree.len(), pages = total, "Flushed index.");
    Ok(total)
}

/// Rebuilds the index `name` from its snapshot in `dir`.
///
/// Returns `Ok(None)` if there is no snapshot.
///
/// # Errors
/// Returns `Error::TypeMismatch` if the snapshot holds keys of another type and
/// `Error::Encoding` if the file is damaged.
pub fn load<K: IndexKey>(dir: &Path, name: &str) -> Result<Option<BPlusTree<K>>, Error> {
    let path = index_path(dir, name);
    if !path.exists() {
        return Ok(None);
    }
    let bytes = std::fs::read(&path)?;
    let header = parse_header(name, &bytes)?;

    let stored = ColumnType::from_tag(header.key_type)?;
    if stored != K::COLUMN_TYPE {
        return Err(err!(
            TypeMismatch,
            "Index '{}' holds {} keys, {} requested.",
            name,
            stored,
            K::COLUMN_TYPE
        ));
    }

    let page_size = header.page_size as usize;
    if page_size <= PAGE_HEADER_SIZE {
        return Err(err!(Encoding, "Snapshot of '{}' has page size {}.", name, page_size));
    }

    let mut tree = BPlusTree::new(name, header.degree as usize)?;
    let mut page_num = 0usize;
    for _ in 0..header.index_n_pages {
        let start = INDEX_HEADER_SIZE + page_num * page_size;
        let frame = bytes
            .get(start..start + page_size)
            .ok_or_else(|| err!(Encoding, "Page {} of '{}' is missing.", page_num, name))?;
        let page_header: PageHeader = decode_header(&frame[..PAGE_HEADER_SIZE])?;

        let mut body = &frame[PAGE_HEADER_SIZE..];
        for _ in 0..page_header.page_n_recs {
            let ((value, offset), used): ((ColumnValue, Offset), usize) =
                bincode::decode_from_slice(body, config::standard())?;
            body = &body[used..];
            tree.insert(K::from_value(&value)?, offset)?;
        }

        if page_header.page_next == 0 {
            break;
        }
        page_num = page_header.page_next as usize;
    }

    if tree.len() != header.index_n_recs as usize {
        return Err(err!(
            Encoding,
            "Snapshot of '{}' declares {} records, found {}.",
            name,
            header.index_n_recs,
            tree.len()
        ));
    }
    info!(index = name, keys = tree.len(), "Loaded index.");
    Ok(Some(tree))
}

fn decode_header<T: Decode<()>>(bytes: &[u8]) -> Result<T, Error> {
    let (decoded, _): (T, usize) = bincode::decode_from_slice(bytes, config::standard())
        .map_err(|e| Error::Encoding(format!("Failed to decode header. {}", e)))?;
    Ok(decoded)
}

fn encode_header<T: Encode, const N: usize>(header: &T) -> Result<[u8; N], Error> {
    let encoded = bincode::encode_to_vec(header, config::standard())
        .map_err(|e| Error::Encoding(format!("Failed to encode header. {}", e)))?;

    if encoded.len() > N {
        return Err(Error::Encoding(format!(
            "Header size ({}) does not fit within the frame ({}).",
            encoded.len(),
            N
        )));
    }

    let mut header = [0u8; N];
    header[..encoded.len()].copy_from_slice(&encoded);
    Ok(header)
}
