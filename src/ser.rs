//! Flat binary geometry artifact: writer and shape-validating reader.
//!
//! Layout, all fields fixed-width little-endian:
//!
//! | field                  | type  | meaning                                   |
//! |------------------------|-------|-------------------------------------------|
//! | bucket_count_plus_one  | `u32` | number of buckets plus one                |
//! | offsets[bucket_count]  | `u32` | prefix sum of bucket lengths              |
//! | sentinel_offset        | `u32` | total waypoint count, closes the array    |
//! | total_waypoint_count   | `u32` | explicit duplicate of the sentinel        |
//! | waypoints[total]       | 12 B  | node `u32`, forward `i32`, reverse `i32`  |
//!
//! Buckets are emitted in slot order, waypoints in chain order; slots
//! emptied by merges appear as zero-length ranges. The layout is a durable
//! contract shared with load-time consumers.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::arena::{BucketArena, EdgeBucket};
use crate::error::{GeometryError, Result};
use crate::model::{NodeId, Waypoint, Weight};

const WAYPOINT_RECORD_LEN: u64 = 12;

struct CountingWriter<W> {
    inner: W,
    path: PathBuf,
    offset: u64,
}

impl<W: Write> CountingWriter<W> {
    fn new(inner: W, path: PathBuf) -> Self {
        Self {
            inner,
            path,
            offset: 0,
        }
    }

    fn put_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner
            .write_all(bytes)
            .map_err(|source| GeometryError::Io {
                path: self.path.clone(),
                offset: self.offset,
                source,
            })?;
        self.offset += bytes.len() as u64;
        Ok(())
    }

    fn put_u32(&mut self, value: u32) -> Result<()> {
        self.put_bytes(&value.to_le_bytes())
    }

    fn put_i32(&mut self, value: i32) -> Result<()> {
        self.put_bytes(&value.to_le_bytes())
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush().map_err(|source| GeometryError::Io {
            path: self.path.clone(),
            offset: self.offset,
            source,
        })
    }
}

struct CountingReader<R> {
    inner: R,
    path: PathBuf,
    offset: u64,
}

impl<R: Read> CountingReader<R> {
    fn new(inner: R, path: PathBuf) -> Self {
        Self {
            inner,
            path,
            offset: 0,
        }
    }

    fn fill(&mut self, buf: &mut [u8]) -> Result<()> {
        match self.inner.read_exact(buf) {
            Ok(()) => {
                self.offset += buf.len() as u64;
                Ok(())
            }
            Err(source) if source.kind() == io::ErrorKind::UnexpectedEof => {
                Err(GeometryError::Corruption(format!(
                    "unexpected end of file at byte {}",
                    self.offset
                )))
            }
            Err(source) => Err(GeometryError::Io {
                path: self.path.clone(),
                offset: self.offset,
                source,
            }),
        }
    }

    fn get_u32(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.fill(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    fn get_i32(&mut self) -> Result<i32> {
        let mut buf = [0u8; 4];
        self.fill(&mut buf)?;
        Ok(i32::from_le_bytes(buf))
    }
}

/// Flattens every bucket of `arena` to `path`.
///
/// A running per-bucket length sum is compared against the prefix-sum total
/// before the writer returns; a mismatch can only come from an arena bug and
/// is reported as [`GeometryError::StructuralInconsistency`].
pub fn write_geometry<P: AsRef<Path>>(arena: &BucketArena, path: P) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|source| GeometryError::Io {
        path: path.to_path_buf(),
        offset: 0,
        source,
    })?;
    let mut out = CountingWriter::new(BufWriter::new(file), path.to_path_buf());

    let bucket_count_plus_one = u32::try_from(arena.slot_count())
        .ok()
        .and_then(|count| count.checked_add(1))
        .ok_or(GeometryError::CapacityOverflow("bucket count"))?;
    out.put_u32(bucket_count_plus_one)?;

    let mut prefix_sum: u32 = 0;
    for bucket in arena.iter() {
        out.put_u32(prefix_sum)?;
        let len = u32::try_from(bucket.len())
            .map_err(|_| GeometryError::CapacityOverflow("bucket length"))?;
        prefix_sum = prefix_sum
            .checked_add(len)
            .ok_or(GeometryError::CapacityOverflow("total waypoint count"))?;
    }
    // Sentinel closing the offsets array, then the same value once more as
    // an explicit count for the reader.
    out.put_u32(prefix_sum)?;
    out.put_u32(prefix_sum)?;

    let mut control_sum: u32 = 0;
    for bucket in arena.iter() {
        control_sum = control_sum
            .checked_add(bucket.len() as u32)
            .ok_or(GeometryError::CapacityOverflow("total waypoint count"))?;
        for waypoint in bucket {
            out.put_u32(waypoint.node.0)?;
            out.put_i32(waypoint.forward_weight.0)?;
            out.put_i32(waypoint.reverse_weight.0)?;
        }
    }
    if control_sum != prefix_sum {
        return Err(GeometryError::StructuralInconsistency(format!(
            "waypoint control sum {control_sum} does not match prefix total {prefix_sum}"
        )));
    }
    out.flush()
}

/// Parses an artifact written by [`write_geometry`], reproducing every
/// bucket — including zero-length ones — in slot order.
pub fn read_geometry<P: AsRef<Path>>(path: P) -> Result<Vec<EdgeBucket>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| GeometryError::Io {
        path: path.to_path_buf(),
        offset: 0,
        source,
    })?;
    let file_len = file
        .metadata()
        .map_err(|source| GeometryError::Io {
            path: path.to_path_buf(),
            offset: 0,
            source,
        })?
        .len();
    let mut input = CountingReader::new(BufReader::new(file), path.to_path_buf());

    let bucket_count_plus_one = input.get_u32()?;
    if bucket_count_plus_one == 0 {
        return Err(GeometryError::Corruption(
            "bucket count field is zero".into(),
        ));
    }
    let bucket_count = (bucket_count_plus_one - 1) as usize;

    // Bound the claimed bucket count by the actual file size before
    // allocating for it; the offsets array alone needs four bytes per
    // bucket plus the sentinel and duplicate total.
    let header_len = 4 + 4 * (bucket_count as u64 + 2);
    if file_len < header_len {
        return Err(GeometryError::Corruption(format!(
            "file length {file_len} cannot hold {bucket_count} bucket offsets"
        )));
    }

    let mut offsets = Vec::with_capacity(bucket_count + 1);
    let mut previous = 0u32;
    for index in 0..bucket_count {
        let offset = input.get_u32()?;
        if index == 0 && offset != 0 {
            return Err(GeometryError::Corruption(format!(
                "first bucket offset is {offset}, expected 0"
            )));
        }
        if offset < previous {
            return Err(GeometryError::Corruption(format!(
                "bucket offsets regress at index {index}"
            )));
        }
        previous = offset;
        offsets.push(offset);
    }
    let sentinel = input.get_u32()?;
    if sentinel < previous {
        return Err(GeometryError::Corruption(
            "sentinel offset below last bucket offset".into(),
        ));
    }
    if bucket_count == 0 && sentinel != 0 {
        return Err(GeometryError::Corruption(
            "waypoints present but no bucket to hold them".into(),
        ));
    }
    offsets.push(sentinel);

    let total = input.get_u32()?;
    if total != sentinel {
        return Err(GeometryError::Corruption(format!(
            "waypoint total {total} does not match sentinel offset {sentinel}"
        )));
    }

    // Validating the file length up front also bounds the allocation below.
    let expected_len = input.offset + u64::from(total) * WAYPOINT_RECORD_LEN;
    if file_len != expected_len {
        return Err(GeometryError::Corruption(format!(
            "file length {file_len} does not match expected {expected_len}"
        )));
    }

    let mut waypoints = Vec::with_capacity(total as usize);
    for _ in 0..total {
        let node = NodeId(input.get_u32()?);
        let forward_weight = Weight(input.get_i32()?);
        let reverse_weight = Weight(input.get_i32()?);
        waypoints.push(Waypoint {
            node,
            forward_weight,
            reverse_weight,
        });
    }

    let mut buckets = Vec::with_capacity(bucket_count);
    for pair in offsets.windows(2) {
        let (start, end) = (pair[0] as usize, pair[1] as usize);
        buckets.push(waypoints[start..end].to_vec());
    }
    Ok(buckets)
}
