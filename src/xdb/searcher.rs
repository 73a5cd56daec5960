//! xdb searcher with three memory-residency modes.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use memmap2::Mmap;

use super::format::{
    Header, SegmentIndexBlock, VectorIndexBlock, HEADER_INFO_LENGTH, REGION_POOL_OFFSET,
    SEGMENT_INDEX_BLOCK_SIZE, VECTOR_INDEX_COLS, VECTOR_INDEX_LENGTH, VECTOR_INDEX_SIZE,
};
use crate::error::{Error, Result};
use crate::ip::ip2long;

/// Result of one lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    /// Region payload, `None` when no segment contains the ip.
    pub region: Option<String>,
    /// Number of positioned file reads the lookup performed.
    pub io_count: u32,
    /// Wall-clock lookup time on a monotonic clock.
    pub took: Duration,
}

/// Fully-resident database image: owned bytes or a shared mapping.
enum Content {
    Owned(Vec<u8>),
    Mapped(Mmap),
}

impl AsRef<[u8]> for Content {
    fn as_ref(&self) -> &[u8] {
        match self {
            Content::Owned(data) => data,
            Content::Mapped(mmap) => mmap,
        }
    }
}

/// Residency mode: which part of the file lives in memory.
enum Store {
    /// Everything fetched from the file on demand.
    FileOnly { path: PathBuf },
    /// Vector index table resident; segment index and region pool on demand.
    VectorIndex {
        path: PathBuf,
        vector_index: Vec<u8>,
    },
    /// Whole file resident; lookups never touch the filesystem.
    Buffer { content: Content },
}

/// Per-call byte fetcher. File-backed modes get a handle of their own for
/// every search, so concurrent calls never share a read position.
enum Fetch<'a> {
    File { file: File, io_count: u32 },
    Mem { data: &'a [u8] },
}

impl Fetch<'_> {
    fn read_exact_at(&mut self, offset: u64, out: &mut [u8]) -> Result<()> {
        match self {
            Fetch::Mem { data } => {
                let start = offset as usize;
                let end = start + out.len();
                if end > data.len() {
                    return Err(Error::Truncated {
                        offset,
                        expected: out.len(),
                        actual: data.len().saturating_sub(start),
                    });
                }
                out.copy_from_slice(&data[start..end]);
                Ok(())
            }
            Fetch::File { file, io_count } => {
                *io_count += 1;
                file.seek(SeekFrom::Start(offset))?;
                file.read_exact(out)?;
                Ok(())
            }
        }
    }

    fn io_count(&self) -> u32 {
        match self {
            Fetch::File { io_count, .. } => *io_count,
            Fetch::Mem { .. } => 0,
        }
    }
}

/// Read-only point-lookup handle over one xdb database.
///
/// A `Searcher` is immutable after construction and safe to share across
/// threads; every [`search`](Searcher::search) call is independent.
pub struct Searcher {
    store: Store,
    header: Header,
}

impl Searcher {
    /// Open in file-only mode: every fetch is a positioned read.
    pub fn with_file_only(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let header = read_header(&path)?;
        Ok(Self {
            store: Store::FileOnly { path },
            header,
        })
    }

    /// Open with the vector index table pre-loaded into memory.
    pub fn with_vector_index(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let header = read_header(&path)?;
        let vector_index = load_vector_index_from_file(&path)?;
        Ok(Self {
            store: Store::VectorIndex { path, vector_index },
            header,
        })
    }

    /// Open over a fully-loaded in-memory image.
    pub fn with_buffer(data: Vec<u8>) -> Result<Self> {
        Self::with_content(Content::Owned(data))
    }

    /// Open over a memory-mapped file (full-buffer residency without the
    /// up-front copy).
    pub fn with_mmap(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };
        Self::with_content(Content::Mapped(mmap))
    }

    fn with_content(content: Content) -> Result<Self> {
        let header = Header::decode(content.as_ref())?;
        header.validate()?;
        Ok(Self {
            store: Store::Buffer { content },
            header,
        })
    }

    /// The database header read at construction time.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Look up the region for a dotted-quad IPv4 address.
    ///
    /// A miss is a valid result (`region: None`), not an error; malformed
    /// input fails before any storage access.
    pub fn search(&self, ip: &str) -> Result<SearchResult> {
        let started = Instant::now();
        let ip_int = ip2long(ip).ok_or_else(|| Error::InvalidIp(ip.to_string()))?;

        let mut fetch = match &self.store {
            Store::FileOnly { path } | Store::VectorIndex { path, .. } => Fetch::File {
                file: File::open(path)?,
                io_count: 0,
            },
            Store::Buffer { content } => Fetch::Mem {
                data: content.as_ref(),
            },
        };

        // Stage 1: the bucket for the top two octets.
        let idx = ((ip_int >> 24) & 0xff) as usize * VECTOR_INDEX_COLS * VECTOR_INDEX_SIZE
            + ((ip_int >> 16) & 0xff) as usize * VECTOR_INDEX_SIZE;
        let bucket = match &self.store {
            Store::VectorIndex { vector_index, .. } => {
                let mut raw = [0u8; VECTOR_INDEX_SIZE];
                raw.copy_from_slice(&vector_index[idx..idx + VECTOR_INDEX_SIZE]);
                VectorIndexBlock::decode(&raw)
            }
            _ => {
                let mut raw = [0u8; VECTOR_INDEX_SIZE];
                fetch.read_exact_at((HEADER_INFO_LENGTH + idx) as u64, &mut raw)?;
                VectorIndexBlock::decode(&raw)
            }
        };

        // Stage 2: binary search the bucket's 14-byte records. An untouched
        // bucket has first_ptr == last_ptr and is a miss without any probe.
        let mut region = None;
        if bucket.first_ptr != bucket.last_ptr {
            debug_assert!(bucket.first_ptr >= REGION_POOL_OFFSET as u32);
            let entries = (bucket.last_ptr - bucket.first_ptr) as i64
                / SEGMENT_INDEX_BLOCK_SIZE as i64;
            let mut l: i64 = 0;
            let mut h: i64 = entries - 1;
            while l <= h {
                let m = (l + h) >> 1;
                let p = bucket.first_ptr as u64 + m as u64 * SEGMENT_INDEX_BLOCK_SIZE as u64;
                let mut raw = [0u8; SEGMENT_INDEX_BLOCK_SIZE];
                fetch.read_exact_at(p, &mut raw)?;
                let entry = SegmentIndexBlock::decode(&raw);

                if ip_int < entry.start_ip {
                    h = m - 1;
                } else if ip_int > entry.end_ip {
                    l = m + 1;
                } else {
                    let mut data = vec![0u8; entry.data_len as usize];
                    fetch.read_exact_at(entry.data_ptr as u64, &mut data)?;
                    region = Some(String::from_utf8_lossy(&data).into_owned());
                    break;
                }
            }
        }

        Ok(SearchResult {
            region,
            io_count: fetch.io_count(),
            took: started.elapsed(),
        })
    }
}

fn read_header(path: &Path) -> Result<Header> {
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();
    if len < HEADER_INFO_LENGTH as u64 {
        return Err(Error::Truncated {
            offset: 0,
            expected: HEADER_INFO_LENGTH,
            actual: len as usize,
        });
    }
    let mut buf = [0u8; HEADER_INFO_LENGTH];
    file.read_exact(&mut buf)?;
    let header = Header::decode(&buf)?;
    header.validate()?;
    Ok(header)
}

/// Load the 524288-byte vector index table from an xdb file.
pub fn load_vector_index_from_file(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();
    if len < (HEADER_INFO_LENGTH + VECTOR_INDEX_LENGTH) as u64 {
        return Err(Error::Truncated {
            offset: HEADER_INFO_LENGTH as u64,
            expected: VECTOR_INDEX_LENGTH,
            actual: (len as usize).saturating_sub(HEADER_INFO_LENGTH),
        });
    }
    file.seek(SeekFrom::Start(HEADER_INFO_LENGTH as u64))?;
    let mut buf = vec![0u8; VECTOR_INDEX_LENGTH];
    file.read_exact(&mut buf)?;
    Ok(buf)
}

/// Load a whole xdb file into memory, for [`Searcher::with_buffer`].
pub fn load_content_from_file(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    File::open(path)?.read_to_end(&mut buf)?;
    Ok(buf)
}
