//! On-disk layout of one SSTable directory.
//!
//! A table is a directory named `C{level}_SST_{id}` holding five logical
//! regions — DATA, INDEX, SUMMARY, FILTER, MERKLE — in one of two physical
//! shapes:
//!
//! * **multi-file** — one file per region plus `TOC.csv` listing them;
//! * **single-file** — a lone `SST.db` whose first 40 bytes are five
//!   little-endian `u64` region offsets (data, index, summary, filter,
//!   merkle), regions following in that order.
//!
//! `TOC.csv` is always written last; a directory without one is an
//! unpublished orphan and is swept away.

use anyhow::{bail, Context, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

pub const DATA_NAME: &str = "SST_Data.db";
pub const INDEX_NAME: &str = "SST_Index.db";
pub const SUMMARY_NAME: &str = "SST_Summary.db";
pub const FILTER_NAME: &str = "SST_Filter.db";
pub const MERKLE_NAME: &str = "SST_Merkle.db";
pub const SINGLE_NAME: &str = "SST.db";
pub const TOC_NAME: &str = "TOC.csv";
pub const DICT_NAME: &str = "SST_Dictionary.json";

/// Width of one offset slot in the single-file header.
pub const OFFSET_LEN: u64 = 8;
/// The single-file header: five region offsets.
pub const SINGLE_HEADER_LEN: u64 = 5 * OFFSET_LEN;

/// The five logical regions, in on-disk order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Data,
    Index,
    Summary,
    Filter,
    Merkle,
}

impl Region {
    pub fn file_name(&self) -> &'static str {
        match self {
            Region::Data => DATA_NAME,
            Region::Index => INDEX_NAME,
            Region::Summary => SUMMARY_NAME,
            Region::Filter => FILTER_NAME,
            Region::Merkle => MERKLE_NAME,
        }
    }

    fn ordinal(&self) -> usize {
        match self {
            Region::Data => 0,
            Region::Index => 1,
            Region::Summary => 2,
            Region::Filter => 3,
            Region::Merkle => 4,
        }
    }
}

/// Physical shape of a table directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    MultiFile,
    SingleFile,
}

/// A parsed `C{level}_SST_{id}` directory name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TableName {
    pub level: u32,
    pub id: u64,
}

impl TableName {
    pub fn new(level: u32, id: u64) -> Self {
        Self { level, id }
    }

    /// Parses a directory name of the form `C{level}_SST_{id}`.
    pub fn parse(name: &str) -> Option<Self> {
        let rest = name.strip_prefix('C')?;
        let (level, rest) = rest.split_once('_')?;
        let id = rest.strip_prefix("SST_")?;
        Some(Self {
            level: level.parse().ok()?,
            id: id.parse().ok()?,
        })
    }

    pub fn dir_name(&self) -> String {
        format!("C{}_SST_{}", self.level, self.id)
    }
}

impl std::fmt::Display for TableName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.dir_name())
    }
}

/// Writes the table-of-contents line, publishing the directory.
pub fn write_toc(dir: &Path, shape: Shape) -> Result<()> {
    let line = match shape {
        Shape::MultiFile => format!(
            "{},{},{},{},{}",
            DATA_NAME, INDEX_NAME, SUMMARY_NAME, FILTER_NAME, MERKLE_NAME
        ),
        Shape::SingleFile => SINGLE_NAME.to_string(),
    };
    std::fs::write(dir.join(TOC_NAME), line)
        .with_context(|| format!("writing TOC in {}", dir.display()))?;
    Ok(())
}

/// Reads the table-of-contents and infers the physical shape.
pub fn read_toc(dir: &Path) -> Result<Shape> {
    let content = std::fs::read_to_string(dir.join(TOC_NAME))
        .with_context(|| format!("reading TOC in {}", dir.display()))?;
    let names: Vec<&str> = content.trim().split(',').collect();
    match names.len() {
        1 if names[0] == SINGLE_NAME => Ok(Shape::SingleFile),
        5 => Ok(Shape::MultiFile),
        _ => bail!("malformed TOC in {}", dir.display()),
    }
}

/// `true` once the directory has a published TOC.
pub fn is_published(dir: &Path) -> bool {
    dir.join(TOC_NAME).is_file()
}

/// An open handle onto one region: a file positioned at the region start
/// plus the region's absolute `[start, end)` bounds within that file.
pub struct RegionHandle {
    pub file: File,
    pub start: u64,
    pub end: u64,
}

impl RegionHandle {
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    /// Seeks to `rel` bytes past the region start.
    pub fn seek_to(&mut self, rel: u64) -> Result<()> {
        self.file.seek(SeekFrom::Start(self.start + rel))?;
        Ok(())
    }

    /// Current position relative to the region start.
    pub fn position(&mut self) -> Result<u64> {
        Ok(self.file.stream_position()? - self.start)
    }

    /// Reads the whole region into memory.
    pub fn read_all(&mut self) -> Result<Vec<u8>> {
        self.seek_to(0)?;
        let mut buf = vec![0u8; self.len() as usize];
        self.file.read_exact(&mut buf)?;
        Ok(buf)
    }
}

/// Opens `region` of the table in `dir` for the given shape.
pub fn open_region(dir: &Path, shape: Shape, region: Region) -> Result<RegionHandle> {
    match shape {
        Shape::MultiFile => {
            let path = dir.join(region.file_name());
            let file = File::open(&path)
                .with_context(|| format!("opening region {}", path.display()))?;
            let end = file.metadata()?.len();
            Ok(RegionHandle {
                file,
                start: 0,
                end,
            })
        }
        Shape::SingleFile => {
            let path = dir.join(SINGLE_NAME);
            let mut file = File::open(&path)
                .with_context(|| format!("opening region {}", path.display()))?;
            let file_len = file.metadata()?.len();
            if file_len < SINGLE_HEADER_LEN {
                bail!("single-file table too small: {}", path.display());
            }

            let mut offsets = [0u64; 5];
            for slot in offsets.iter_mut() {
                *slot = file.read_u64::<LittleEndian>()?;
            }

            let ord = region.ordinal();
            let start = offsets[ord];
            let end = if ord + 1 < offsets.len() {
                offsets[ord + 1]
            } else {
                file_len
            };
            if start > end || end > file_len {
                bail!("corrupt region offsets in {}", path.display());
            }

            file.seek(SeekFrom::Start(start))?;
            Ok(RegionHandle { file, start, end })
        }
    }
}

/// Total byte size of every file in a table directory.
pub fn dir_size(dir: &Path) -> Result<u64> {
    let mut size = 0;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            size += entry.metadata()?.len();
        }
    }
    Ok(size)
}

/// Lists published table directories under `root`, sorted by (level, id).
pub fn list_tables(root: &Path) -> Result<Vec<(TableName, PathBuf)>> {
    let mut tables = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if let Some(parsed) = TableName::parse(name) {
            if is_published(&path) {
                tables.push((parsed, path));
            }
        }
    }
    tables.sort_by_key(|(name, _)| (name.level, name.id));
    Ok(tables)
}
