//! Pooled gzip compression
//!
//! Archive uploads gzip every body they write, so the deflate cores are
//! pooled and reused across calls instead of being allocated per call. The
//! gzip framing (header, CRC-32 and length trailer) is written around the
//! raw deflate stream.

use std::io::{self, Read};
use std::sync::Mutex;

use flate2::read::GzDecoder;
use flate2::{Compress, Compression, FlushCompress, Status};

/// Fixed gzip member header: magic, deflate method, no flags, no mtime,
/// unknown OS.
const GZIP_HEADER: [u8; 10] = [0x1f, 0x8b, 0x08, 0, 0, 0, 0, 0, 0, 0xff];

/// Output is grown in steps of this size while the deflate stream drains.
const GROW_CHUNK: usize = 32 * 1024;

/// Thread-safe pool of reusable deflate cores.
///
/// `compress` checks a core out of the pool, resets it, runs the stream to
/// completion and returns the core for the next caller. A core is dropped
/// instead of returned if compression failed.
pub struct GzipPool {
    cores: Mutex<Vec<Compress>>,
}

impl GzipPool {
    #[must_use]
    pub fn new() -> Self {
        Self {
            cores: Mutex::new(Vec::new()),
        }
    }

    /// Gzip-compress `data` using a pooled deflate core.
    pub fn compress(&self, data: &[u8]) -> io::Result<Vec<u8>> {
        let mut core = self
            .cores
            .lock()
            .expect("gzip pool lock poisoned")
            .pop()
            .unwrap_or_else(|| Compress::new(Compression::default(), false));
        core.reset();

        let mut out = Vec::with_capacity(GZIP_HEADER.len() + data.len() / 2 + 64);
        out.extend_from_slice(&GZIP_HEADER);

        let mut consumed = 0usize;
        loop {
            if out.len() == out.capacity() {
                out.reserve(GROW_CHUNK);
            }
            let before = core.total_in();
            let status = core
                .compress_vec(&data[consumed..], &mut out, FlushCompress::Finish)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
            consumed += (core.total_in() - before) as usize;
            match status {
                Status::StreamEnd => break,
                Status::Ok | Status::BufError => continue,
            }
        }

        let mut crc = crc32fast::Hasher::new();
        crc.update(data);
        out.extend_from_slice(&crc.finalize().to_le_bytes());
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());

        self.cores
            .lock()
            .expect("gzip pool lock poisoned")
            .push(core);
        Ok(out)
    }

    /// Number of idle cores currently held.
    #[must_use]
    pub fn idle(&self) -> usize {
        self.cores.lock().expect("gzip pool lock poisoned").len()
    }
}

impl Default for GzipPool {
    fn default() -> Self {
        Self::new()
    }
}

/// Decompress a gzip member. Used by tests and debugging tools; the worker
/// itself only ever writes.
pub fn gunzip(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut out = Vec::new();
    GzDecoder::new(data).read_to_end(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let pool = GzipPool::new();
        let input = b"<html><body>Hello, crawler</body></html>".repeat(100);
        let compressed = pool.compress(&input).unwrap();
        assert!(compressed.len() < input.len());
        assert_eq!(gunzip(&compressed).unwrap(), input);
    }

    #[test]
    fn test_round_trip_empty() {
        let pool = GzipPool::new();
        let compressed = pool.compress(b"").unwrap();
        assert_eq!(gunzip(&compressed).unwrap(), b"");
    }

    #[test]
    fn test_gzip_magic_bytes() {
        let pool = GzipPool::new();
        let compressed = pool.compress(b"x").unwrap();
        assert_eq!(&compressed[..2], &[0x1f, 0x8b]);
        assert_eq!(compressed[2], 0x08);
    }

    #[test]
    fn test_core_is_reused() {
        let pool = GzipPool::new();
        assert_eq!(pool.idle(), 0);
        let first = pool.compress(b"first payload first payload").unwrap();
        assert_eq!(pool.idle(), 1);
        let second = pool.compress(b"second payload").unwrap();
        assert_eq!(pool.idle(), 1);

        assert_eq!(gunzip(&first).unwrap(), b"first payload first payload");
        assert_eq!(gunzip(&second).unwrap(), b"second payload");
    }

    #[test]
    fn test_incompressible_data_grows_output() {
        let pool = GzipPool::new();
        let input: Vec<u8> = (0..200_000u32)
            .map(|i| i.wrapping_mul(2_654_435_761) as u8)
            .collect();
        let compressed = pool.compress(&input).unwrap();
        assert_eq!(gunzip(&compressed).unwrap(), input);
    }
}
