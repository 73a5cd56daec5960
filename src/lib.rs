//! ipxdb - compact read-only IPv4 region lookup databases.
//!
//! This crate builds and queries "xdb" files: a write-once binary format
//! mapping IPv4 ranges to opaque region strings through a two-level index
//! (coarse per-bucket vector index + fine sorted segment index) over a
//! deduplicated string pool.
//!
//! # Features
//!
//! - **One-shot builder**: sorted `start|end|region` text lines in, single
//!   binary file out, with mandatory merging of adjacent same-region ranges
//!   and region string deduplication
//! - **Three residency modes**: file-only, vector-index-cached, or fully
//!   buffered (owned bytes or memory-mapped) lookups over the same file
//! - **Lookup telemetry**: every search reports its positioned-read count
//!   and microsecond-level latency
//! - **Thread-safe reads**: a searcher is immutable after construction and
//!   shareable across threads without locking
//!
//! # Quick Start
//!
//! ```ignore
//! use ipxdb::{IndexPolicy, Maker, Searcher};
//!
//! // Build an xdb file from sorted segment lines.
//! let mut maker = Maker::new(IndexPolicy::Vector, "ip.txt", "ip.xdb");
//! maker.gen()?;
//!
//! // Query it with the whole file buffered in memory.
//! let searcher = Searcher::with_mmap("ip.xdb")?;
//! let result = searcher.search("1.0.0.10")?;
//! println!("{:?} ({} IO, {}us)",
//!     result.region, result.io_count, result.took.as_micros());
//! ```

pub mod error;
pub mod ip;
pub mod segment;
pub mod xdb;

// Re-export core types
pub use error::{Error, Result};
pub use ip::{ip2long, is_valid_ip, long2ip};
pub use segment::Segment;
pub use xdb::{
    load_content_from_file, load_vector_index_from_file, IndexPolicy, Maker, SearchResult,
    Searcher,
};
