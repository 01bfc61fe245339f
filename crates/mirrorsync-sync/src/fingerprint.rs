//! Content fingerprinting and change detection
//!
//! Every common file is hashed in full on every pass. There is no hash cache
//! and no modification-time shortcut: a length mismatch is the only way to
//! skip hashing, and it can only ever conclude "modified". A replica entry that
//! is a symbolic link always counts as modified, so it gets replaced by a
//! regular file and its target is never read.

use mirrorsync_types::{
    BufferSize, ContentFingerprint, Error, FingerprintAlgorithm, RelativePath, Result,
};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use tracing::trace;

/// Decides whether a replica file differs from its source counterpart
#[derive(Debug, Clone, Copy)]
pub struct ChangeDetector {
    algorithm: FingerprintAlgorithm,
    buffer_size: BufferSize,
}

impl ChangeDetector {
    /// Create a detector
    pub fn new(algorithm: FingerprintAlgorithm, buffer_size: BufferSize) -> Self {
        Self {
            algorithm,
            buffer_size,
        }
    }

    /// The configured algorithm
    pub fn algorithm(&self) -> FingerprintAlgorithm {
        self.algorithm
    }

    /// Whether `source_root/path` and `replica_root/path` hold different bytes
    pub fn is_modified(
        &self,
        source_root: &Path,
        replica_root: &Path,
        path: &RelativePath,
    ) -> Result<bool> {
        let source = path.join_to(source_root);
        let replica = path.join_to(replica_root);

        let replica_metadata =
            std::fs::symlink_metadata(&replica).map_err(|e| Error::read(&replica, e))?;
        if replica_metadata.file_type().is_symlink() {
            trace!("{}: replica is a symbolic link", path);
            return Ok(true);
        }

        let source_len = file_len(&source)?;
        let replica_len = file_len(&replica)?;
        if source_len != replica_len {
            trace!("{}: size {} != {}", path, source_len, replica_len);
            return Ok(true);
        }

        let source_hash = self.fingerprint_file(&source)?;
        let replica_hash = self.fingerprint_file(&replica)?;
        trace!(
            "{}: {} vs {}",
            path,
            source_hash.to_hex(),
            replica_hash.to_hex()
        );
        Ok(source_hash != replica_hash)
    }

    /// Fingerprint the file at `path`
    pub fn fingerprint_file(&self, path: &Path) -> Result<ContentFingerprint> {
        let file = File::open(path).map_err(|e| Error::read(path, e))?;
        self.fingerprint_reader(file)
            .map_err(|e| Error::read(path, e))
    }

    /// Fingerprint everything `reader` yields
    pub fn fingerprint_reader<R: Read>(&self, mut reader: R) -> io::Result<ContentFingerprint> {
        let mut buffer = vec![0u8; self.buffer_size.get()];

        match self.algorithm {
            FingerprintAlgorithm::Blake3 => {
                let mut hasher = blake3::Hasher::new();
                loop {
                    let read = read_chunk(&mut reader, &mut buffer)?;
                    if read == 0 {
                        break;
                    }
                    hasher.update(&buffer[..read]);
                }
                Ok(ContentFingerprint::Blake3(*hasher.finalize().as_bytes()))
            }
            FingerprintAlgorithm::Xxh3 => {
                let mut hasher = xxhash_rust::xxh3::Xxh3::new();
                loop {
                    let read = read_chunk(&mut reader, &mut buffer)?;
                    if read == 0 {
                        break;
                    }
                    hasher.update(&buffer[..read]);
                }
                Ok(ContentFingerprint::Xxh3(hasher.digest128()))
            }
        }
    }
}

impl Default for ChangeDetector {
    fn default() -> Self {
        Self::new(FingerprintAlgorithm::default(), BufferSize::default())
    }
}

/// Fingerprint an in-memory buffer
pub fn fingerprint_bytes(algorithm: FingerprintAlgorithm, data: &[u8]) -> ContentFingerprint {
    match algorithm {
        FingerprintAlgorithm::Blake3 => ContentFingerprint::Blake3(*blake3::hash(data).as_bytes()),
        FingerprintAlgorithm::Xxh3 => ContentFingerprint::Xxh3(xxhash_rust::xxh3::xxh3_128(data)),
    }
}

fn read_chunk<R: Read>(reader: &mut R, buffer: &mut [u8]) -> io::Result<usize> {
    loop {
        match reader.read(buffer) {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            result => return result,
        }
    }
}

fn file_len(path: &Path) -> Result<u64> {
    std::fs::metadata(path)
        .map(|metadata| metadata.len())
        .map_err(|e| Error::read(path, e))
}
