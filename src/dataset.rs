//! Deterministic OHLCV datasets at named size classes.
//!
//! Two synthetic generators are provided. The linear generator advances every column by a
//! fixed increment from a fixed start, so identical size classes are bit-for-bit identical
//! across runs and across implementations. The random-walk generator derives one ChaCha8
//! stream per bar from a master seed, which keeps it reproducible regardless of how rayon
//! splits the work.
//!
//! # Binary Format
//!
//! ```text
//! Header:
//!   magic: [u8; 8]  = b"TAOHLCV1"
//!   version: u32    = 1
//!   bars: u64       = number of rows
//!   source: u8      = 0 linear, 1 random walk
//!   seed: u64       = random-walk seed (0 for linear)
//!   reserved: [u8; 16] = zeros (future use)
//!
//! Body:
//!   bincode-encoded `Dataset`
//! ```

use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use clap::ValueEnum;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::DatasetError;

/// Magic bytes identifying the dataset format.
const MAGIC: &[u8; 8] = b"TAOHLCV1";

/// Current format version.
const FORMAT_VERSION: u32 = 1;

const TIME_START: i64 = 1_313_625_600;
const TIME_INCREMENT: i64 = 1_000;
const VALUE_START: f64 = 0.01;
const VALUE_INCREMENT: f64 = 0.01;

const WALK_START_PRICE: f64 = 100.0;
const WALK_MIN_PRICE: f64 = 0.01;

/// Named dataset sizes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, ValueEnum)]
pub enum SizeClass {
    Small,
    Large,
}

impl SizeClass {
    pub fn bars(&self) -> usize {
        match self {
            SizeClass::Small => 10_000,
            SizeClass::Large => 100_000,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SizeClass::Small => "small",
            SizeClass::Large => "large",
        }
    }
}

impl fmt::Display for SizeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SizeClass {
    type Err = DatasetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "small" => Ok(SizeClass::Small),
            "large" => Ok(SizeClass::Large),
            _ => Err(DatasetError::UnknownSizeClass(s.to_string())),
        }
    }
}

/// Where a dataset comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DatasetSource {
    Linear,
    RandomWalk { seed: u64 },
    /// Previously written dataset files, one `<size>.ohlcv` per size class.
    File { dir: PathBuf },
}

/// Columnar OHLCV table.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub time: Vec<i64>,
    pub open: Vec<f64>,
    pub high: Vec<f64>,
    pub low: Vec<f64>,
    pub close: Vec<f64>,
    pub volume: Vec<f64>,
}

impl Dataset {
    pub fn with_capacity(bars: usize) -> Self {
        Self {
            time: Vec::with_capacity(bars),
            open: Vec::with_capacity(bars),
            high: Vec::with_capacity(bars),
            low: Vec::with_capacity(bars),
            close: Vec::with_capacity(bars),
            volume: Vec::with_capacity(bars),
        }
    }

    /// Number of rows.
    pub fn bars(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// True when every column has the same length.
    pub fn is_rectangular(&self) -> bool {
        let n = self.time.len();
        [&self.open, &self.high, &self.low, &self.close, &self.volume]
            .iter()
            .all(|c| c.len() == n)
    }
}

/// Dataset metadata from the file header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetMeta {
    pub bars: u64,
    pub source: DatasetSource,
}

/// Generate `bars` rows by fixed linear increments.
pub fn generate_linear(bars: usize) -> Dataset {
    let mut ds = Dataset::with_capacity(bars);
    for i in 0..bars {
        let value = VALUE_START + i as f64 * VALUE_INCREMENT;
        ds.time.push(TIME_START + i as i64 * TIME_INCREMENT);
        ds.open.push(value);
        ds.high.push(value);
        ds.low.push(value);
        ds.close.push(value);
        ds.volume.push(value);
    }
    ds
}

#[derive(Clone, Copy, Debug)]
struct BarNoise {
    step: f64,
    gap: f64,
    wick_up: f64,
    wick_down: f64,
    volume: f64,
}

fn per_bar_seed(master_seed: u64, index: usize) -> u64 {
    master_seed
        .wrapping_add(index as u64)
        .wrapping_mul(0x517cc1b727220a95)
}

fn bar_noise(seed: u64, index: usize) -> BarNoise {
    let mut rng = ChaCha8Rng::seed_from_u64(per_bar_seed(seed, index));
    BarNoise {
        step: rng.gen_range(-0.5..0.5),
        gap: rng.gen_range(-0.05..0.05),
        wick_up: rng.gen_range(0.0..0.25),
        wick_down: rng.gen_range(0.0..0.25),
        volume: rng.gen_range(100.0..1_000.0),
    }
}

/// Generate a seeded random-walk dataset.
///
/// Noise for every bar is drawn in parallel, then the walk is accumulated sequentially so
/// the output does not depend on the thread count.
pub fn generate_random_walk(bars: usize, seed: u64) -> Dataset {
    let noise: Vec<BarNoise> = (0..bars)
        .into_par_iter()
        .map(|i| bar_noise(seed, i))
        .collect();

    let mut ds = Dataset::with_capacity(bars);
    let mut prev_close = WALK_START_PRICE;
    for (i, n) in noise.iter().enumerate() {
        let open = (prev_close + n.gap).max(WALK_MIN_PRICE);
        let close = (open + n.step).max(WALK_MIN_PRICE);
        let high = open.max(close) + n.wick_up;
        let low = (open.min(close) - n.wick_down).max(WALK_MIN_PRICE);

        ds.time.push(TIME_START + i as i64 * TIME_INCREMENT);
        ds.open.push(open);
        ds.high.push(high);
        ds.low.push(low);
        ds.close.push(close);
        ds.volume.push(n.volume);
        prev_close = close;
    }
    ds
}

/// Produce the dataset for a size class.
pub fn get_dataset(size: SizeClass, source: &DatasetSource) -> Result<Dataset, DatasetError> {
    match source {
        DatasetSource::Linear => Ok(generate_linear(size.bars())),
        DatasetSource::RandomWalk { seed } => Ok(generate_random_walk(size.bars(), *seed)),
        DatasetSource::File { dir } => {
            let (_meta, ds) = load_dataset(dataset_path(dir, size))?;
            Ok(ds)
        }
    }
}

/// Conventional file location of a size class inside a dataset directory.
pub fn dataset_path(dir: &Path, size: SizeClass) -> PathBuf {
    dir.join(format!("{}.ohlcv", size.as_str()))
}

/// Hex SHA-256 over every column's little-endian bytes, in column order.
pub fn fingerprint(ds: &Dataset) -> String {
    let mut hasher = Sha256::new();
    for t in &ds.time {
        hasher.update(t.to_le_bytes());
    }
    for column in [&ds.open, &ds.high, &ds.low, &ds.close, &ds.volume] {
        for v in column {
            hasher.update(v.to_le_bytes());
        }
    }
    let digest: [u8; 32] = hasher.finalize().into();
    let mut s = String::with_capacity(64);
    for b in digest {
        s.push_str(&format!("{:02x}", b));
    }
    s
}

fn source_header(source: &DatasetSource) -> (u8, u64) {
    match source {
        DatasetSource::RandomWalk { seed } => (1, *seed),
        _ => (0, 0),
    }
}

fn invalid(path: &Path, reason: impl Into<String>) -> DatasetError {
    DatasetError::InvalidFile {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

/// Write a dataset to a binary file.
pub fn write_dataset<P: AsRef<Path>>(
    path: P,
    ds: &Dataset,
    source: &DatasetSource,
) -> Result<(), DatasetError> {
    let path = path.as_ref();
    if !ds.is_rectangular() {
        return Err(invalid(path, "columns have different lengths"));
    }

    let file = File::create(path)?;
    let mut writer = BufWriter::with_capacity(64 * 1024, file);

    let (kind, seed) = source_header(source);
    writer.write_all(MAGIC)?;
    writer.write_all(&FORMAT_VERSION.to_le_bytes())?;
    writer.write_all(&(ds.bars() as u64).to_le_bytes())?;
    writer.write_all(&[kind])?;
    writer.write_all(&seed.to_le_bytes())?;
    writer.write_all(&[0u8; 16])?; // reserved

    bincode::serialize_into(&mut writer, ds)?;
    writer.flush()?;
    Ok(())
}

fn read_header<R: Read>(reader: &mut R, path: &Path) -> Result<DatasetMeta, DatasetError> {
    let mut magic = [0u8; 8];
    reader.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(invalid(
            path,
            format!("invalid magic bytes: expected {:?}, got {:?}", MAGIC, magic),
        ));
    }

    let mut buf1 = [0u8; 1];
    let mut buf4 = [0u8; 4];
    let mut buf8 = [0u8; 8];

    reader.read_exact(&mut buf4)?;
    let version = u32::from_le_bytes(buf4);
    if version != FORMAT_VERSION {
        return Err(invalid(path, format!("unsupported format version: {}", version)));
    }

    reader.read_exact(&mut buf8)?;
    let bars = u64::from_le_bytes(buf8);

    reader.read_exact(&mut buf1)?;
    reader.read_exact(&mut buf8)?;
    let seed = u64::from_le_bytes(buf8);
    let source = match buf1[0] {
        0 => DatasetSource::Linear,
        1 => DatasetSource::RandomWalk { seed },
        other => return Err(invalid(path, format!("unknown source tag: {}", other))),
    };

    let mut reserved = [0u8; 16];
    reader.read_exact(&mut reserved)?;

    Ok(DatasetMeta { bars, source })
}

/// Read dataset metadata from a file header.
pub fn read_dataset_meta<P: AsRef<Path>>(path: P) -> Result<DatasetMeta, DatasetError> {
    let path = path.as_ref();
    let mut reader = BufReader::new(File::open(path)?);
    read_header(&mut reader, path)
}

/// Load a dataset from a binary file.
pub fn load_dataset<P: AsRef<Path>>(path: P) -> Result<(DatasetMeta, Dataset), DatasetError> {
    let path = path.as_ref();
    let mut reader = BufReader::with_capacity(64 * 1024, File::open(path)?);
    let meta = read_header(&mut reader, path)?;
    let ds: Dataset = bincode::deserialize_from(&mut reader)?;

    if !ds.is_rectangular() {
        return Err(invalid(path, "columns have different lengths"));
    }
    if ds.bars() as u64 != meta.bars {
        return Err(invalid(
            path,
            format!("header declares {} bars, body has {}", meta.bars, ds.bars()),
        ));
    }

    Ok((meta, ds))
}
