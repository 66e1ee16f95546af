use crate::core::example::{LabelingImage, TrainingRecord};
use crate::types::{GeoPatchError, GeoResult};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use flate2::Crc;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

/// Consumer of serialized training records.
pub trait RecordSink {
    fn write(&mut self, record: &TrainingRecord) -> GeoResult<()>;
    fn finish(&mut self) -> GeoResult<()>;
}

/// Consumer of labeling images.
pub trait ImageSink {
    fn write(&mut self, image: &LabelingImage) -> GeoResult<()>;
}

/// Writes the record stream round-robin across a fixed number of shard
/// files named `<prefix>-NNNNN-of-MMMMM<suffix>`.
///
/// Each record is framed as a little-endian u64 payload length, a CRC32
/// of the payload, and the payload itself, so a truncated shard is
/// detectable on read.
pub struct ShardedRecordWriter {
    writers: Vec<BufWriter<File>>,
    next_shard: usize,
    written: u64,
}

impl ShardedRecordWriter {
    pub fn create<P: AsRef<Path>>(prefix: P, suffix: &str, num_shards: usize) -> GeoResult<Self> {
        if num_shards == 0 {
            return Err(GeoPatchError::Validation(
                "shard count must be at least 1".to_string(),
            ));
        }
        if let Some(parent) = prefix.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        let mut writers = Vec::with_capacity(num_shards);
        for index in 0..num_shards {
            let path = shard_path(prefix.as_ref(), suffix, index, num_shards);
            log::debug!("Creating shard: {}", path.display());
            writers.push(BufWriter::new(File::create(path)?));
        }
        Ok(Self {
            writers,
            next_shard: 0,
            written: 0,
        })
    }
}

fn shard_path(prefix: &Path, suffix: &str, index: usize, num_shards: usize) -> PathBuf {
    let name = format!(
        "{}-{:05}-of-{:05}{}",
        prefix.file_name().map(|n| n.to_string_lossy()).unwrap_or_default(),
        index,
        num_shards,
        suffix
    );
    match prefix.parent() {
        Some(parent) => parent.join(name),
        None => PathBuf::from(name),
    }
}

impl RecordSink for ShardedRecordWriter {
    fn write(&mut self, record: &TrainingRecord) -> GeoResult<()> {
        let payload = record.to_bytes()?;
        let mut crc = Crc::new();
        crc.update(&payload);

        let writer = &mut self.writers[self.next_shard];
        writer.write_u64::<LittleEndian>(payload.len() as u64)?;
        writer.write_u32::<LittleEndian>(crc.sum())?;
        writer.write_all(&payload)?;

        self.next_shard = (self.next_shard + 1) % self.writers.len();
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> GeoResult<()> {
        for writer in &mut self.writers {
            writer.flush()?;
        }
        log::info!(
            "Wrote {} records across {} shards",
            self.written,
            self.writers.len()
        );
        Ok(())
    }
}

/// Read every record back from one shard file, verifying frame
/// checksums.
pub fn read_shard<P: AsRef<Path>>(path: P) -> GeoResult<Vec<TrainingRecord>> {
    let mut reader = BufReader::new(File::open(path.as_ref())?);
    let mut records = Vec::new();
    loop {
        let length = match reader.read_u64::<LittleEndian>() {
            Ok(length) => length as usize,
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        };
        let expected_crc = reader.read_u32::<LittleEndian>()?;
        let mut payload = vec![0u8; length];
        reader.read_exact(&mut payload)?;

        let mut crc = Crc::new();
        crc.update(&payload);
        if crc.sum() != expected_crc {
            return Err(GeoPatchError::Validation(format!(
                "corrupt record frame in {}",
                path.as_ref().display()
            )));
        }
        records.push(TrainingRecord::from_bytes(&payload)?);
    }
    Ok(records)
}

/// Writes each labeling image as an individual file in a directory,
/// named by its encoded-coordinate key.
pub struct LabelingImageDir {
    dir: PathBuf,
}

impl LabelingImageDir {
    pub fn create<P: AsRef<Path>>(dir: P) -> GeoResult<Self> {
        fs::create_dir_all(dir.as_ref())?;
        Ok(Self {
            dir: dir.as_ref().to_path_buf(),
        })
    }
}

impl ImageSink for LabelingImageDir {
    fn write(&mut self, image: &LabelingImage) -> GeoResult<()> {
        let path = self.dir.join(&image.name);
        fs::write(&path, &image.png)?;
        log::debug!("Wrote labeling image: {}", path.display());
        Ok(())
    }
}
