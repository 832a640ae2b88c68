//! Low-level writers for the history file.
//!
//! New files and full rewrites go through a sibling `.tmp` file and a rename.
//! Single appends patch the tail of the existing array in place: the last
//! significant byte of a JSON array is always its closing `]`, so locating it
//! only needs a backward scan over whitespace.

use crate::error::{HistoryError, Result};
use crate::record::{History, Record};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

const INDENT: &[u8] = b"    ";
const SCAN_BLOCK: u64 = 4096;

/// On-disk layout of a full rewrite
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Four-space indentation, one field per line
    Pretty,
    /// No insignificant whitespace
    Compact,
}

impl Layout {
    /// Compact once the history grows past `threshold` records.
    pub fn for_len(len: usize, threshold: usize) -> Self {
        if len > threshold {
            Layout::Compact
        } else {
            Layout::Pretty
        }
    }
}

/// Encode a history, or the raw entries of one, as a full file body.
pub fn encode_history<T: Serialize + ?Sized>(history: &T, layout: Layout) -> Result<Vec<u8>> {
    let mut out = match layout {
        Layout::Pretty => to_pretty(history)?,
        Layout::Compact => serde_json::to_vec(history)?,
    };
    out.push(b'\n');
    Ok(out)
}

fn to_pretty<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut ser =
        serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(INDENT));
    value.serialize(&mut ser)?;
    Ok(out)
}

/// A record rendered as one pretty array element (every line indented once).
fn encode_element(record: &Record) -> Result<Vec<u8>> {
    let body = to_pretty(record)?;
    let mut out = Vec::with_capacity(body.len() + 64);
    for (idx, line) in body.split(|b| *b == b'\n').enumerate() {
        if idx > 0 {
            out.push(b'\n');
        }
        out.extend_from_slice(INDENT);
        out.extend_from_slice(line);
    }
    Ok(out)
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut raw = path.as_os_str().to_owned();
    raw.push(".tmp");
    PathBuf::from(raw)
}

/// Replace `path` with `bytes` via a temporary sibling and a rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| HistoryError::io("create", parent, e))?;
    }
    let tmp = tmp_path(path);
    std::fs::write(&tmp, bytes).map_err(|e| HistoryError::io("write", &tmp, e))?;
    if let Err(err) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(HistoryError::io("replace", path, err));
    }
    Ok(())
}

fn is_json_ws(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\r')
}

/// Position and value of the first significant byte at or after `start`.
fn scan_forward(file: &mut File, start: u64, end: u64) -> io::Result<Option<(u64, u8)>> {
    let mut buf = [0u8; SCAN_BLOCK as usize];
    let mut lo = start;
    while lo < end {
        let n = (end - lo).min(SCAN_BLOCK) as usize;
        file.seek(SeekFrom::Start(lo))?;
        file.read_exact(&mut buf[..n])?;
        if let Some(idx) = buf[..n].iter().position(|b| !is_json_ws(*b)) {
            return Ok(Some((lo + idx as u64, buf[idx])));
        }
        lo += n as u64;
    }
    Ok(None)
}

/// Position and value of the last significant byte strictly before `end`.
fn scan_back(file: &mut File, end: u64) -> io::Result<Option<(u64, u8)>> {
    let mut buf = [0u8; SCAN_BLOCK as usize];
    let mut hi = end;
    while hi > 0 {
        let lo = hi.saturating_sub(SCAN_BLOCK);
        let n = (hi - lo) as usize;
        file.seek(SeekFrom::Start(lo))?;
        file.read_exact(&mut buf[..n])?;
        if let Some(idx) = buf[..n].iter().rposition(|b| !is_json_ws(*b)) {
            return Ok(Some((lo + idx as u64, buf[idx])));
        }
        hi = lo;
    }
    Ok(None)
}

/// Where the next element goes in an existing array file.
#[derive(Debug, PartialEq, Eq)]
struct Splice {
    /// First byte after the last significant byte that stays in place
    at: u64,
    /// Whether the array already holds elements
    has_elements: bool,
}

fn locate_splice(file: &mut File, len: u64) -> Result<Option<Splice>> {
    let scan_err = |e: io::Error| HistoryError::Parse(format!("cannot scan history file: {e}"));

    let Some((open_pos, open)) = scan_forward(file, 0, len).map_err(scan_err)? else {
        return Ok(None);
    };
    if open != b'[' {
        return Err(HistoryError::parse(format!(
            "expected '[' at byte {open_pos}, found {:?}",
            char::from(open)
        )));
    }
    let Some((close_pos, close)) = scan_back(file, len).map_err(scan_err)? else {
        return Ok(None);
    };
    if close != b']' || close_pos == open_pos {
        return Err(HistoryError::parse(format!(
            "history array is not closed (last byte {:?} at {close_pos})",
            char::from(close)
        )));
    }
    let Some((prev_pos, _)) = scan_back(file, close_pos).map_err(scan_err)? else {
        return Ok(None);
    };

    Ok(Some(Splice {
        at: prev_pos + 1,
        has_elements: prev_pos != open_pos,
    }))
}

/// Append `record` to the array at `path` without rewriting earlier elements.
///
/// A missing or blank file becomes a one-element array. On a failed write the
/// original tail is put back on a best-effort basis and the error is returned.
pub fn append_in_place(path: &Path, record: &Record) -> Result<()> {
    let mut file = match OpenOptions::new().read(true).write(true).open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return write_fresh(path, record);
        }
        Err(err) => return Err(HistoryError::io("open", path, err)),
    };
    let len = file
        .metadata()
        .map_err(|e| HistoryError::io("inspect", path, e))?
        .len();

    let Some(splice) = locate_splice(&mut file, len)? else {
        drop(file);
        return write_fresh(path, record);
    };

    let mut chunk = Vec::new();
    chunk.extend_from_slice(if splice.has_elements { b",\n" } else { b"\n" });
    chunk.extend_from_slice(&encode_element(record)?);
    chunk.extend_from_slice(b"\n]\n");

    let mut tail = Vec::new();
    file.seek(SeekFrom::Start(splice.at))
        .and_then(|_| file.read_to_end(&mut tail))
        .map_err(|e| HistoryError::io("read", path, e))?;

    let written = file
        .seek(SeekFrom::Start(splice.at))
        .and_then(|_| file.write_all(&chunk))
        .and_then(|()| file.set_len(splice.at + chunk.len() as u64));
    if let Err(err) = written {
        log::error!("Append to {} failed: {err}; restoring tail", path.display());
        let restored = file
            .set_len(splice.at)
            .and_then(|()| file.seek(SeekFrom::Start(splice.at)))
            .and_then(|_| file.write_all(&tail));
        if let Err(restore_err) = restored {
            log::error!(
                "Could not restore {} after failed append: {restore_err}",
                path.display()
            );
        }
        return Err(HistoryError::io("append to", path, err));
    }
    Ok(())
}

fn write_fresh(path: &Path, record: &Record) -> Result<()> {
    let history = History::from(vec![record.clone()]);
    write_atomic(path, &encode_history(&history, Layout::Pretty)?)
}
