//! On-disk artifact formats
//!
//! A base path `P` owns a family of `P.wm.<suffix>` files. Every file starts
//! with a 4-byte schema fingerprint, then a per-format magic, then
//! little-endian packed data, then a CRC-64 footer. Writers go through a
//! temporary file and rename into place so failed runs leave no partial
//! artifacts; readers recompute the checksum while consuming the payload and
//! reject the file when the footer disagrees.

pub mod ebg;
pub mod ebg_nodes;
pub mod enw;
pub mod geometry;
pub mod hsgr;
pub mod names;
pub mod properties;
pub mod restrictions;
pub mod rtree;
pub mod timestamp;

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crc::{Crc, CRC_64_GO_ISO};

use crate::error::ArtifactError;

/// Bumping this invalidates every artifact.
pub const SCHEMA_VERSION: u16 = 1;

const CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_GO_ISO);

/// Artifact suffixes, in regeneration order.
pub mod suffix {
    pub const EBG: &str = "ebg";
    pub const EBG_NODES: &str = "ebg_nodes";
    pub const GEOMETRY: &str = "geometry";
    pub const ENW: &str = "enw";
    pub const HSGR: &str = "hsgr";
    pub const RAM_INDEX: &str = "ramIndex";
    pub const FILE_INDEX: &str = "fileIndex";
    pub const RESTRICTIONS: &str = "restrictions";
    pub const NAMES: &str = "names";
    pub const PROPERTIES: &str = "properties";
    pub const TIMESTAMP: &str = "timestamp";

    /// Files emitted by the extractor.
    pub const EXTRACT_SET: &[&str] = &[
        EBG, EBG_NODES, GEOMETRY, ENW, RAM_INDEX, FILE_INDEX, RESTRICTIONS, NAMES, PROPERTIES,
        TIMESTAMP,
    ];
    /// Files emitted by the contractor.
    pub const CONTRACT_SET: &[&str] = &[HSGR, ENW];
}

/// `P` -> `P.wm.<suffix>`
pub fn artifact_path(base: &Path, suffix: &str) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(".wm.");
    name.push(suffix);
    PathBuf::from(name)
}

fn fingerprint() -> [u8; 4] {
    let v = SCHEMA_VERSION.to_le_bytes();
    [b'W', b'M', v[0], v[1]]
}

fn io_err(path: &Path, source: std::io::Error) -> ArtifactError {
    ArtifactError::Io {
        path: path.to_owned(),
        source,
    }
}

/// Buffered, checksummed artifact writer with write-rename discipline.
pub struct ArtifactWriter {
    out: BufWriter<File>,
    crc: crc::Digest<'static, u64>,
    tmp: PathBuf,
    path: PathBuf,
}

impl ArtifactWriter {
    pub fn create(path: &Path, magic: u32) -> Result<Self, ArtifactError> {
        let mut tmp_name = path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp = PathBuf::from(tmp_name);
        let file = File::create(&tmp).map_err(|e| io_err(path, e))?;
        let mut writer = Self {
            out: BufWriter::new(file),
            crc: CRC64.digest(),
            tmp,
            path: path.to_owned(),
        };
        writer.bytes(&fingerprint())?;
        writer.u32(magic)?;
        Ok(writer)
    }

    pub fn bytes(&mut self, data: &[u8]) -> Result<(), ArtifactError> {
        self.crc.update(data);
        self.out
            .write_all(data)
            .map_err(|e| io_err(&self.path, e))
    }

    pub fn u8(&mut self, v: u8) -> Result<(), ArtifactError> {
        self.bytes(&[v])
    }

    pub fn u16(&mut self, v: u16) -> Result<(), ArtifactError> {
        self.bytes(&v.to_le_bytes())
    }

    pub fn u32(&mut self, v: u32) -> Result<(), ArtifactError> {
        self.bytes(&v.to_le_bytes())
    }

    pub fn u64(&mut self, v: u64) -> Result<(), ArtifactError> {
        self.bytes(&v.to_le_bytes())
    }

    pub fn i32(&mut self, v: i32) -> Result<(), ArtifactError> {
        self.bytes(&v.to_le_bytes())
    }

    pub fn f64(&mut self, v: f64) -> Result<(), ArtifactError> {
        self.bytes(&v.to_le_bytes())
    }

    /// Append the CRC footer, flush and move the file into place.
    pub fn finish(mut self) -> Result<(), ArtifactError> {
        let sum = self.crc.finalize();
        self.out
            .write_all(&sum.to_le_bytes())
            .and_then(|_| self.out.flush())
            .map_err(|e| io_err(&self.path, e))?;
        drop(self.out);
        std::fs::rename(&self.tmp, &self.path).map_err(|e| io_err(&self.path, e))
    }
}

/// Buffered artifact reader; validates fingerprint, schema version and magic,
/// and recomputes the body checksum as it goes. Callers finish with
/// [`ArtifactReader::verify`] once the payload is consumed.
pub struct ArtifactReader {
    input: BufReader<File>,
    crc: crc::Digest<'static, u64>,
    path: PathBuf,
}

impl std::fmt::Debug for ArtifactReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactReader")
            .field("path", &self.path)
            .finish()
    }
}

impl ArtifactReader {
    pub fn open(path: &Path, magic: u32) -> Result<Self, ArtifactError> {
        let file = File::open(path).map_err(|e| io_err(path, e))?;
        let mut reader = Self {
            input: BufReader::new(file),
            crc: CRC64.digest(),
            path: path.to_owned(),
        };

        let head = reader.bytes_array::<4>()?;
        if head[0] != b'W' || head[1] != b'M' {
            return Err(ArtifactError::Fingerprint {
                path: reader.path.clone(),
            });
        }
        let found = u16::from_le_bytes([head[2], head[3]]);
        if found != SCHEMA_VERSION {
            let suffix = path
                .extension()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            return Err(ArtifactError::VersionMismatch {
                path: reader.path.clone(),
                found,
                expected: SCHEMA_VERSION,
                regenerate: vec![suffix],
            });
        }
        let tag = reader.u32()?;
        if tag != magic {
            return Err(ArtifactError::FormatTag {
                path: reader.path.clone(),
                found: tag,
            });
        }
        Ok(reader)
    }

    pub fn corrupt(&self, detail: impl Into<String>) -> ArtifactError {
        ArtifactError::Corrupt {
            path: self.path.clone(),
            detail: detail.into(),
        }
    }

    /// Read the CRC footer and compare it against the recomputed body
    /// checksum. Must run after the whole payload has been consumed.
    pub fn verify(mut self) -> Result<(), ArtifactError> {
        let mut footer = [0u8; 8];
        self.input
            .read_exact(&mut footer)
            .map_err(|e| io_err(&self.path, e))?;
        let stored = u64::from_le_bytes(footer);
        let computed = self.crc.finalize();
        if computed != stored {
            return Err(ArtifactError::Corrupt {
                path: self.path,
                detail: format!("checksum mismatch: stored {stored:016x}, computed {computed:016x}"),
            });
        }
        Ok(())
    }

    fn bytes_array<const N: usize>(&mut self) -> Result<[u8; N], ArtifactError> {
        let mut buf = [0u8; N];
        self.input
            .read_exact(&mut buf)
            .map_err(|e| io_err(&self.path, e))?;
        self.crc.update(&buf);
        Ok(buf)
    }

    pub fn bytes(&mut self, n: usize) -> Result<Vec<u8>, ArtifactError> {
        let mut buf = vec![0u8; n];
        self.input
            .read_exact(&mut buf)
            .map_err(|e| io_err(&self.path, e))?;
        self.crc.update(&buf);
        Ok(buf)
    }

    pub fn u8(&mut self) -> Result<u8, ArtifactError> {
        Ok(self.bytes_array::<1>()?[0])
    }

    pub fn u16(&mut self) -> Result<u16, ArtifactError> {
        Ok(u16::from_le_bytes(self.bytes_array::<2>()?))
    }

    pub fn u32(&mut self) -> Result<u32, ArtifactError> {
        Ok(u32::from_le_bytes(self.bytes_array::<4>()?))
    }

    pub fn u64(&mut self) -> Result<u64, ArtifactError> {
        Ok(u64::from_le_bytes(self.bytes_array::<8>()?))
    }

    pub fn i32(&mut self) -> Result<i32, ArtifactError> {
        Ok(i32::from_le_bytes(self.bytes_array::<4>()?))
    }

    pub fn f64(&mut self) -> Result<f64, ArtifactError> {
        Ok(f64::from_le_bytes(self.bytes_array::<8>()?))
    }
}

/// Verify the CRC footer of a fully in-memory artifact image, for readers
/// that bypass the buffered reader (memory-mapped files).
pub(crate) fn verify_image(path: &Path, image: &[u8]) -> Result<(), ArtifactError> {
    if image.len() < 8 {
        return Err(ArtifactError::Corrupt {
            path: path.to_owned(),
            detail: "shorter than the checksum footer".to_owned(),
        });
    }
    let (body, footer) = image.split_at(image.len() - 8);
    let stored = u64::from_le_bytes([
        footer[0], footer[1], footer[2], footer[3], footer[4], footer[5], footer[6], footer[7],
    ]);
    let computed = CRC64.checksum(body);
    if computed != stored {
        return Err(ArtifactError::Corrupt {
            path: path.to_owned(),
            detail: format!("checksum mismatch: stored {stored:016x}, computed {computed:016x}"),
        });
    }
    Ok(())
}

/// Identity of the edge file a hierarchy was built from: the first four
/// bytes of its SHA-256, little-endian, plus a hex prefix for logging. The
/// contractor embeds the short form in `.hsgr`; the dataset loader recomputes
/// it to reject hierarchies from a different extraction.
pub fn ebg_checksum(path: &Path) -> Result<(u32, String), ArtifactError> {
    use sha2::{Digest, Sha256};

    let bytes = std::fs::read(path).map_err(|e| io_err(path, e))?;
    let digest = Sha256::digest(&bytes);
    let short = u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]]);
    Ok((short, hex::encode(&digest[..8])))
}

/// A memory-mapped artifact region. Unmaps and closes on drop, on every exit
/// path, so dataset swaps release their files deterministically.
pub struct ScopedMmap {
    map: memmap2::Mmap,
    path: PathBuf,
}

impl ScopedMmap {
    pub fn open(path: &Path) -> Result<Self, ArtifactError> {
        let file = File::open(path).map_err(|e| io_err(path, e))?;
        // Read-only mapping of an artifact we own
        let map = unsafe { memmap2::Mmap::map(&file) }.map_err(|e| io_err(path, e))?;
        Ok(Self {
            map,
            path: path.to_owned(),
        })
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.map
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for ScopedMmap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedMmap")
            .field("path", &self.path)
            .field("len", &self.map.len())
            .finish()
    }
}
