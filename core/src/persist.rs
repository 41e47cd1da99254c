//! Two-tier on-disk layout.
//!
//! ```text
//! <root>/
//!   postings-<sha1 prefix>.bin   posting lists back to back, no separators
//!   lexicon.bin                  "ZLEX" | version: u16 | bincode(Directory)
//!   meta.json                    build summary
//! ```
//!
//! A posting is a fixed 17-byte little-endian record:
//! `doc_id: u32 | term_freq: u32 | importance: u8 | tf_idf: f64`.
//! The directory maps each term to the absolute `(offset, len)` of its
//! region in the blob, so a lookup is one positioned, bounded read.
//!
//! The blob is fully written and synced under a temporary name before it is
//! renamed into place, and the directory naming it is published last.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::collections::HashMap;
use std::fs::{self, create_dir_all, File};
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::PostingsError;
use crate::index::{DocId, Importance, InvertedIndex, Posting};
use crate::tokenizer::Analyzer;

pub const DIRECTORY_MAGIC: [u8; 4] = *b"ZLEX";
pub const FORMAT_VERSION: u16 = 1;
pub const POSTING_RECORD_LEN: usize = 17;

#[derive(Debug, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: u32,
    pub num_terms: u64,
    pub duplicates_rejected: u32,
    pub blob_bytes: u64,
    pub created_at: String,
    pub version: u32,
}

#[derive(Debug, Clone)]
pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn directory(&self) -> PathBuf { self.root.join("lexicon.bin") }
    pub fn meta(&self) -> PathBuf { self.root.join("meta.json") }
    pub fn blob(&self, name: &str) -> PathBuf { self.root.join(name) }
    fn blob_tmp(&self) -> PathBuf { self.root.join("postings.bin.tmp") }
    fn directory_tmp(&self) -> PathBuf { self.root.join("lexicon.bin.tmp") }
}

/// Location of one term's posting region inside the blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermLocation {
    pub offset: u64,
    pub len: u32,
}

/// Everything a query engine keeps in memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Directory {
    pub num_docs: u32,
    /// File name of the blob, relative to the index root.
    pub blob_file: String,
    pub blob_len: u64,
    /// Hex SHA-1 of the whole blob.
    pub blob_sha1: String,
    pub analyzer: Analyzer,
    pub terms: HashMap<String, TermLocation>,
    /// Doc id to url, indexed by doc id.
    pub urls: Vec<String>,
}

impl Directory {
    pub fn url(&self, doc_id: DocId) -> Option<&str> {
        self.urls.get(doc_id as usize).map(String::as_str)
    }
}

#[derive(Debug, Clone)]
pub struct WriteSummary {
    pub num_terms: usize,
    pub blob_file: String,
    pub blob_bytes: u64,
}

pub fn encode_postings(postings: &[Posting], out: &mut Vec<u8>) {
    out.reserve(postings.len() * POSTING_RECORD_LEN);
    for p in postings {
        out.extend_from_slice(&p.doc_id.to_le_bytes());
        out.extend_from_slice(&p.term_freq.to_le_bytes());
        out.push(p.importance.get());
        out.extend_from_slice(&p.tf_idf.to_le_bytes());
    }
}

pub fn decode_postings(bytes: &[u8]) -> Result<Vec<Posting>, PostingsError> {
    if bytes.len() % POSTING_RECORD_LEN != 0 {
        return Err(PostingsError::Misaligned { len: bytes.len() });
    }
    let mut postings = Vec::with_capacity(bytes.len() / POSTING_RECORD_LEN);
    for rec in bytes.chunks_exact(POSTING_RECORD_LEN) {
        let doc_id = u32::from_le_bytes([rec[0], rec[1], rec[2], rec[3]]);
        let term_freq = u32::from_le_bytes([rec[4], rec[5], rec[6], rec[7]]);
        let importance = Importance::from_u8(rec[8])
            .ok_or(PostingsError::InvalidImportance { value: rec[8] })?;
        let mut score = [0u8; 8];
        score.copy_from_slice(&rec[9..17]);
        postings.push(Posting { doc_id, term_freq, importance, tf_idf: f64::from_le_bytes(score) });
    }
    Ok(postings)
}

/// Read and decode one term's region from an open blob.
pub fn read_term_postings<R: Read + Seek>(
    blob: &mut R,
    loc: TermLocation,
    blob_len: u64,
) -> Result<Vec<Posting>, PostingsError> {
    check_region(loc, blob_len)?;
    blob.seek(SeekFrom::Start(loc.offset))?;
    let mut buf = vec![0u8; loc.len as usize];
    blob.read_exact(&mut buf)?;
    decode_postings(&buf)
}

/// Like [`read_term_postings`], but reads at an absolute position without
/// touching the file cursor, so one handle can serve concurrent readers.
pub fn read_term_postings_at(
    blob: &File,
    loc: TermLocation,
    blob_len: u64,
) -> Result<Vec<Posting>, PostingsError> {
    check_region(loc, blob_len)?;
    let mut buf = vec![0u8; loc.len as usize];
    read_exact_at(blob, &mut buf, loc.offset)?;
    decode_postings(&buf)
}

fn check_region(loc: TermLocation, blob_len: u64) -> Result<(), PostingsError> {
    let end = loc.offset.checked_add(loc.len as u64);
    if end.map_or(true, |end| end > blob_len) {
        return Err(PostingsError::OutOfBounds { offset: loc.offset, len: loc.len, blob_len });
    }
    Ok(())
}

#[cfg(unix)]
fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, offset)
}

#[cfg(windows)]
fn read_exact_at(file: &File, mut buf: &mut [u8], mut offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !buf.is_empty() {
        match file.seek_read(buf, offset) {
            Ok(0) => return Err(io::ErrorKind::UnexpectedEof.into()),
            Ok(n) => {
                buf = &mut buf[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

fn sync_and_publish(file: File, tmp: &Path, dest: &Path) -> Result<()> {
    file.sync_all().with_context(|| format!("syncing {}", tmp.display()))?;
    drop(file);
    fs::rename(tmp, dest)
        .with_context(|| format!("renaming {} to {}", tmp.display(), dest.display()))?;
    Ok(())
}

/// Write the blob, then the directory, then the meta file.
pub fn write_index(paths: &IndexPaths, index: &InvertedIndex) -> Result<WriteSummary> {
    create_dir_all(&paths.root)
        .with_context(|| format!("creating index dir {}", paths.root.display()))?;

    let tmp = paths.blob_tmp();
    let mut out = BufWriter::new(File::create(&tmp)?);
    let mut hasher = Sha1::new();
    let mut terms: HashMap<String, TermLocation> = HashMap::with_capacity(index.postings.len());
    let mut offset = 0u64;
    let mut buf = Vec::new();
    for (term, plist) in &index.postings {
        buf.clear();
        encode_postings(plist, &mut buf);
        let len = u32::try_from(buf.len())
            .with_context(|| format!("posting list for {term:?} exceeds 4 GiB"))?;
        out.write_all(&buf)?;
        hasher.update(&buf);
        terms.insert(term.clone(), TermLocation { offset, len });
        offset += len as u64;
    }
    let file = out.into_inner().map_err(|e| e.into_error())?;
    let blob_sha1 = format!("{:x}", hasher.finalize());
    let blob_file = format!("postings-{}.bin", &blob_sha1[..16]);
    sync_and_publish(file, &tmp, &paths.blob(&blob_file))?;

    let directory = Directory {
        num_docs: index.num_docs(),
        blob_file: blob_file.clone(),
        blob_len: offset,
        blob_sha1,
        analyzer: index.analyzer,
        terms,
        urls: index.urls.clone(),
    };
    save_directory(paths, &directory)?;

    let meta = MetaFile {
        num_docs: index.num_docs(),
        num_terms: index.num_terms() as u64,
        duplicates_rejected: index.duplicates_rejected,
        blob_bytes: offset,
        created_at: time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_default(),
        version: FORMAT_VERSION as u32,
    };
    save_meta(paths, &meta)?;

    remove_stale_blobs(paths, &blob_file);
    tracing::info!(num_terms = directory.terms.len(), blob_bytes = offset, blob = %blob_file, "index written");
    Ok(WriteSummary { num_terms: directory.terms.len(), blob_file, blob_bytes: offset })
}

fn remove_stale_blobs(paths: &IndexPaths, keep: &str) {
    let Ok(entries) = fs::read_dir(&paths.root) else { return };
    for entry in entries.filter_map(|e| e.ok()) {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name != keep && name.starts_with("postings-") && name.ends_with(".bin") {
            if let Err(e) = fs::remove_file(entry.path()) {
                tracing::warn!(file = %name, error = %e, "could not remove stale blob");
            }
        }
    }
}

pub fn save_directory(paths: &IndexPaths, directory: &Directory) -> Result<()> {
    let tmp = paths.directory_tmp();
    let mut f = File::create(&tmp)?;
    f.write_all(&DIRECTORY_MAGIC)?;
    f.write_all(&FORMAT_VERSION.to_le_bytes())?;
    let bytes = bincode::serialize(directory)?;
    f.write_all(&bytes)?;
    sync_and_publish(f, &tmp, &paths.directory())
}

pub fn load_directory(paths: &IndexPaths) -> Result<Directory> {
    let path = paths.directory();
    let mut f = File::open(&path).with_context(|| format!("opening {}", path.display()))?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)?;
    if buf.len() < 6 || buf[..4] != DIRECTORY_MAGIC {
        bail!("{} is not an index directory", path.display());
    }
    let version = u16::from_le_bytes([buf[4], buf[5]]);
    if version != FORMAT_VERSION {
        bail!("unsupported index format version {version} (expected {FORMAT_VERSION})");
    }
    let directory: Directory = bincode::deserialize(&buf[6..])
        .with_context(|| format!("decoding {}", path.display()))?;
    Ok(directory)
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut f = File::create(paths.meta())?;
    let json = serde_json::to_string_pretty(meta)?;
    f.write_all(json.as_bytes())?;
    Ok(())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let mut f = File::open(paths.meta())?;
    let mut buf = String::new();
    f.read_to_string(&mut buf)?;
    let meta: MetaFile = serde_json::from_str(&buf)?;
    Ok(meta)
}

#[derive(Debug, Default)]
pub struct VerifyReport {
    pub terms_checked: usize,
    pub corrupt_terms: Vec<(String, PostingsError)>,
}

/// Re-hash the whole blob against the directory and decode every region.
pub fn verify_snapshot(paths: &IndexPaths) -> Result<VerifyReport> {
    let directory = load_directory(paths)?;
    let blob_path = paths.blob(&directory.blob_file);
    let mut blob = File::open(&blob_path)
        .with_context(|| format!("opening {}", blob_path.display()))?;

    let mut hasher = Sha1::new();
    let mut chunk = vec![0u8; 64 * 1024];
    loop {
        let n = blob.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        hasher.update(&chunk[..n]);
    }
    let actual = format!("{:x}", hasher.finalize());
    if actual != directory.blob_sha1 {
        bail!("blob checksum mismatch: directory has {}, file has {actual}", directory.blob_sha1);
    }

    let mut report = VerifyReport::default();
    for (term, loc) in &directory.terms {
        report.terms_checked += 1;
        if let Err(e) = read_term_postings(&mut blob, *loc, directory.blob_len) {
            report.corrupt_terms.push((term.clone(), e));
        }
    }
    Ok(report)
}
