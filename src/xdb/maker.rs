//! xdb file builder.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use ahash::AHashMap;

use super::format::{
    Header, IndexPolicy, SegmentIndexBlock, VectorIndexBlock, HEADER_INFO_LENGTH,
    REGION_POOL_OFFSET, SEGMENT_INDEX_BLOCK_SIZE, VECTOR_INDEX_COLS, VECTOR_INDEX_ROWS,
    VECTOR_INDEX_SIZE,
};
use crate::error::{Error, Result};
use crate::ip::long2ip;
use crate::segment::Segment;

/// Pooled location of one region string.
#[derive(Debug, Clone, Copy)]
struct RegionPtr {
    data_len: u16,
    data_pos: u32,
}

/// Injected transform applied to every raw input line before parsing.
///
/// This is the seam for upstream region normalization: total line in,
/// transformed line out. The builder depends on nothing else about it.
pub type LineHandler = Box<dyn Fn(&str) -> String + Send + Sync>;

/// One-shot builder turning sorted `start|end|region` lines into an xdb file.
///
/// Input segments must be ordered by start ip and non-overlapping. Adjacent
/// segments with identical region and contiguous ranges are merged before
/// anything is written; every distinct region string lands in the pool
/// exactly once.
pub struct Maker {
    index_policy: IndexPolicy,
    src_file: PathBuf,
    dst_file: PathBuf,
    segments: Vec<Segment>,
    /// Flat bucket table addressed by `byte0 * 256 + byte1`.
    vector_index: Vec<VectorIndexBlock>,
    region_pool: AHashMap<String, RegionPtr>,
    line_handler: Option<LineHandler>,
}

impl Maker {
    pub fn new(
        index_policy: IndexPolicy,
        src_file: impl Into<PathBuf>,
        dst_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            index_policy,
            src_file: src_file.into(),
            dst_file: dst_file.into(),
            segments: Vec::new(),
            vector_index: vec![VectorIndexBlock::default(); VECTOR_INDEX_ROWS * VECTOR_INDEX_COLS],
            region_pool: AHashMap::new(),
            line_handler: None,
        }
    }

    /// Install a line transform applied before parsing each input line.
    pub fn with_line_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.line_handler = Some(Box::new(handler));
        self
    }

    /// Build the database: load and merge the source segments, serialize,
    /// and flush to the destination file.
    pub fn gen(&mut self) -> Result<()> {
        let started = Instant::now();
        self.load_segments()?;
        let data = self.write()?;

        let mut fdb = File::create(&self.dst_file)?;
        fdb.write_all(&data)?;
        log::info!(
            "wrote {} bytes to {}, elapsed: {:?}",
            data.len(),
            self.dst_file.display(),
            started.elapsed()
        );
        Ok(())
    }

    fn load_segments(&mut self) -> Result<()> {
        log::info!("try to load the segments ...");
        let started = Instant::now();

        let reader = BufReader::new(File::open(&self.src_file)?);
        for line in reader.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let line = match &self.line_handler {
                Some(handler) => handler(line),
                None => line.to_string(),
            };
            let seg = Segment::from_line(&line)?;
            self.push_segment(seg)?;
        }

        log::info!(
            "all segments loaded (after merge), length: {}, elapsed: {:?}",
            self.segments.len(),
            started.elapsed()
        );
        Ok(())
    }

    /// Append one segment, merging it into the previous one when the ranges
    /// are contiguous and the regions identical.
    ///
    /// Rejects inverted ranges and anything overlapping or out of order with
    /// the previously pushed segment.
    pub fn push_segment(&mut self, seg: Segment) -> Result<()> {
        if seg.start_ip > seg.end_ip {
            return Err(Error::InvertedSegment {
                start: long2ip(seg.start_ip),
                end: long2ip(seg.end_ip),
            });
        }
        if let Some(last) = self.segments.last_mut() {
            if seg.start_ip <= last.end_ip {
                return Err(Error::OutOfOrderSegment(seg.to_string()));
            }
            if last.end_ip.checked_add(1) == Some(seg.start_ip) && last.region == seg.region {
                last.end_ip = seg.end_ip;
                return Ok(());
            }
        }
        self.segments.push(seg);
        Ok(())
    }

    /// Number of segments currently loaded (after merging).
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Serialize the loaded segments into a complete xdb image.
    pub fn write(&mut self) -> Result<Vec<u8>> {
        if self.segments.is_empty() {
            return Err(Error::EmptySegmentList);
        }

        // Header and vector index space first; the region pool starts at the
        // fixed offset right behind them.
        let mut buf = vec![0u8; REGION_POOL_OFFSET];

        log::info!("try to write the data block ...");
        let mut ptrs: Vec<RegionPtr> = Vec::with_capacity(self.segments.len());
        for s in &self.segments {
            let rp = match self.region_pool.get(&s.region) {
                Some(rp) => *rp,
                None => {
                    let bytes = s.region.as_bytes();
                    if bytes.len() > 0xffff {
                        return Err(Error::RegionTooLong(s.region.clone()));
                    }
                    let rp = RegionPtr {
                        data_len: bytes.len() as u16,
                        data_pos: buf.len() as u32,
                    };
                    buf.extend_from_slice(bytes);
                    self.region_pool.insert(s.region.clone(), rp);
                    rp
                }
            };
            ptrs.push(rp);
        }

        log::info!("try to write the segment index block ...");
        let mut counter = 0usize;
        let mut start_index_ptr = 0u32;
        let mut end_index_ptr = 0u32;
        for (sg, rp) in self.segments.iter().zip(&ptrs) {
            for s in sg.split() {
                let ptr = buf.len() as u32;
                // entry offsets always land beyond the fixed prefix, so 0
                // stays unambiguous as the untouched-bucket marker
                debug_assert!(ptr >= REGION_POOL_OFFSET as u32);

                let entry = SegmentIndexBlock {
                    start_ip: s.start_ip,
                    end_ip: s.end_ip,
                    data_len: rp.data_len,
                    data_ptr: rp.data_pos,
                };
                buf.extend_from_slice(&entry.encode());

                let row = ((s.start_ip >> 24) & 0xff) as usize;
                let col = ((s.start_ip >> 16) & 0xff) as usize;
                let vi = &mut self.vector_index[row * VECTOR_INDEX_COLS + col];
                if vi.first_ptr == 0 {
                    vi.first_ptr = ptr;
                }
                vi.last_ptr = ptr + SEGMENT_INDEX_BLOCK_SIZE as u32;

                if start_index_ptr == 0 {
                    start_index_ptr = ptr;
                }
                end_index_ptr = ptr;
                counter += 1;
            }
        }

        log::info!("try to write the vector index block ...");
        for (i, vi) in self.vector_index.iter().enumerate() {
            let off = HEADER_INFO_LENGTH + i * VECTOR_INDEX_SIZE;
            buf[off..off + VECTOR_INDEX_SIZE].copy_from_slice(&vi.encode());
        }

        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as u32;
        let mut header = Header::new(self.index_policy, created_at);
        header.start_index_ptr = start_index_ptr;
        header.end_index_ptr = end_index_ptr;
        buf[..HEADER_INFO_LENGTH].copy_from_slice(&header.encode());

        log::info!(
            "done, {} segments, {} index entries, index span [{}, {}]",
            self.segments.len(),
            counter,
            start_index_ptr,
            end_index_ptr
        );
        Ok(buf)
    }
}
