//! Binary search over a sorted `title.basics.tsv`, keyed by `tconst`.
//!
//! The search operates on byte offsets into the file, not record indices:
//! each probe seeks to a midpoint, scans backward to the nearest newline to
//! find the enclosing line's start, and reads forward to the next newline.
//! Every lookup opens its own file handle, so concurrent searches never
//! share a cursor.

use std::cmp::Ordering;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use streamforge_core::models::TitleBasics;
use tokio::sync::RwLock;

/// Binary-search accessor over the local IMDb `title.basics.tsv` file, with
/// an in-process memoization cache keyed by `tconst` (hits and misses alike).
pub struct TitleIndex {
    tsv_path: PathBuf,
    cache: Arc<RwLock<std::collections::HashMap<String, Option<TitleBasics>>>>,
}

impl TitleIndex {
    pub fn new(tsv_path: impl Into<PathBuf>) -> Self {
        Self {
            tsv_path: tsv_path.into(),
            cache: Arc::new(RwLock::new(std::collections::HashMap::new())),
        }
    }

    /// Resolve `tconst` to its title metadata. Filesystem errors degrade
    /// silently to `None` rather than propagating.
    pub async fn lookup(&self, tconst: &str) -> Option<TitleBasics> {
        if let Some(cached) = self.cache.read().await.get(tconst) {
            return cached.clone();
        }

        let path = self.tsv_path.clone();
        let target = tconst.to_string();
        let result = tokio::task::spawn_blocking(move || binary_search_tsv(&path, &target))
            .await
            .unwrap_or(None);

        self.cache
            .write()
            .await
            .insert(tconst.to_string(), result.clone());
        result
    }
}

fn binary_search_tsv(path: &Path, target: &str) -> Option<TitleBasics> {
    let mut file = std::fs::File::open(path).ok()?;
    let len = file.metadata().ok()?.len();

    // Discard the header row up-front; everything after it is the data region.
    let (_, data_start) = read_line(&mut file, 0).ok()?;

    let mut low = data_start;
    let mut high = len;

    loop {
        if low >= high {
            return None;
        }
        let mid = low + (high - low) / 2;
        let line_start = scan_back_to_line_start(&mut file, mid, data_start).ok()?;
        let (line, line_end) = read_line(&mut file, line_start).ok()?;

        if line.is_empty() {
            if line_start <= low {
                return None;
            }
            high = line_start;
            continue;
        }

        let key = line.split('\t').next().unwrap_or("");
        match key.cmp(target) {
            Ordering::Equal => return parse_basics(&line),
            Ordering::Less => {
                if line_end <= low {
                    return None;
                }
                low = line_end;
            }
            Ordering::Greater => {
                if line_start >= high {
                    return None;
                }
                high = line_start;
            }
        }
    }
}

/// Scan backward byte-by-byte from `offset` to the start of its enclosing
/// line, clamping to `floor` (the data region start, past the header).
fn scan_back_to_line_start(
    file: &mut std::fs::File,
    offset: u64,
    floor: u64,
) -> std::io::Result<u64> {
    let mut pos = offset.max(floor);
    let mut buf = [0u8; 1];
    while pos > floor {
        file.seek(SeekFrom::Start(pos - 1))?;
        file.read_exact(&mut buf)?;
        if buf[0] == b'\n' {
            return Ok(pos);
        }
        pos -= 1;
    }
    Ok(floor)
}

/// Read one line starting at `start`, returning the line (without trailing
/// `\r\n`/`\n`) and the offset of the byte following the newline (or EOF).
fn read_line(file: &mut std::fs::File, start: u64) -> std::io::Result<(String, u64)> {
    file.seek(SeekFrom::Start(start))?;
    let mut raw = Vec::new();
    let mut buf = [0u8; 1];
    let mut pos = start;
    loop {
        match file.read(&mut buf)? {
            0 => break,
            _ => {
                pos += 1;
                if buf[0] == b'\n' {
                    break;
                }
                raw.push(buf[0]);
            }
        }
    }
    if raw.last() == Some(&b'\r') {
        raw.pop();
    }
    Ok((String::from_utf8_lossy(&raw).into_owned(), pos))
}

fn parse_basics(line: &str) -> Option<TitleBasics> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < 9 {
        return None;
    }
    let opt = |s: &str| if s == "\\N" || s.is_empty() { None } else { Some(s) };

    Some(TitleBasics {
        tconst: fields[0].to_string(),
        title_type: fields[1].to_string(),
        primary_title: fields[2].to_string(),
        original_title: fields[3].to_string(),
        is_adult: fields[4] == "1",
        start_year: opt(fields[5]).and_then(|s| s.parse().ok()),
        end_year: opt(fields[6]).and_then(|s| s.parse().ok()),
        runtime_minutes: opt(fields[7]).and_then(|s| s.parse().ok()),
        genres: opt(fields[8])
            .map(|s| s.split(',').map(str::to_string).collect())
            .unwrap_or_default(),
    })
}
