//! Per-partition append-only log
//!
//! One file per partition at `<data_dir>/<topic>-<partition_id>/log.bin`.
//! Each record on disk is framed as:
//!
//! ```text
//! [record_size: u32][offset: i64][key: string][value: bytes]
//! ```
//!
//! where `record_size` counts everything after itself. An in-memory index
//! maps offset to file position so reads can seek directly instead of
//! scanning; offsets are dense from zero, so the index is a plain
//! `Vec<u64>` keyed by offset.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{debug, info};

use sentra_common::error::{Result, StorageError};
use sentra_common::types::{Offset, PartitionId, Record};
use sentra_protocol::wire::{ByteReader, ByteWriter};

/// Name of the log file inside a partition directory
const LOG_FILE: &str = "log.bin";

/// An append-only log file on disk plus its in-memory offset index
pub struct PartitionLog {
    topic: String,
    partition_id: PartitionId,
    log_path: PathBuf,
    state: Mutex<LogState>,
}

/// Mutable state guarded by the partition lock: the kept-open append
/// handle, the offset index, and the committed end of the file. Appends
/// must update all three atomically against concurrent producers.
struct LogState {
    writer: BufWriter<File>,
    /// `index[offset]` is the file position of that record's size prefix
    index: Vec<u64>,
    /// File length covered by complete records
    end_pos: u64,
}

impl PartitionLog {
    /// Open (or create) the partition log, replaying the file to rebuild
    /// the index. A torn trailing record from a crash is truncated away so
    /// it is never re-read; a corrupt record before the tail is fatal.
    pub fn open(data_dir: &Path, topic: &str, partition_id: PartitionId) -> Result<Self> {
        let dir = data_dir.join(format!("{}-{}", topic, partition_id));
        std::fs::create_dir_all(&dir)?;
        let log_path = dir.join(LOG_FILE);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&log_path)?;

        let (index, end_pos) = recover(&file, topic, partition_id)?;

        // Discard trailing bytes of a torn write so the next append starts
        // at a record boundary.
        if file.metadata()?.len() > end_pos {
            file.set_len(end_pos)?;
        }

        let append = OpenOptions::new().append(true).open(&log_path)?;

        info!(
            topic,
            partition = partition_id,
            records = index.len(),
            "recovered partition"
        );

        Ok(Self {
            topic: topic.to_string(),
            partition_id,
            log_path,
            state: Mutex::new(LogState {
                writer: BufWriter::new(append),
                index,
                end_pos,
            }),
        })
    }

    /// Append a record, returning its assigned offset.
    ///
    /// Thread-safe: offset reservation, the file write and the index update
    /// happen under one lock. On a write failure neither the index nor the
    /// next offset advances. Data is flushed to the OS before the offset is
    /// published.
    pub fn append(&self, key: &str, value: &[u8]) -> Result<Offset> {
        let mut state = self.state.lock();

        let offset = state.index.len() as Offset;
        let mut payload = ByteWriter::with_capacity(8 + 2 + key.len() + 4 + value.len());
        payload.write_i64(offset).write_string(key).write_bytes(value);
        let payload = payload.into_bytes();

        let position = state.end_pos;
        if let Err(e) = write_entry(&mut state.writer, &payload) {
            return Err(StorageError::WriteFailed(format!(
                "{}-{}: {}",
                self.topic, self.partition_id, e
            ))
            .into());
        }

        state.index.push(position);
        state.end_pos += 4 + payload.len() as u64;

        debug!(
            topic = %self.topic,
            partition = self.partition_id,
            offset,
            "appended record"
        );
        Ok(offset)
    }

    /// Read up to `max_records` records starting at `start_offset`.
    ///
    /// An offset past the end (or otherwise absent from the index) yields
    /// an empty result rather than an error. Reads stop early on a short
    /// read, so a fetch racing an in-flight append only ever sees whole
    /// records.
    pub fn read(&self, start_offset: Offset, max_records: i32) -> Result<Vec<Record>> {
        if max_records <= 0 {
            return Ok(Vec::new());
        }

        let (position, available) = {
            let state = self.state.lock();
            let next = state.index.len() as Offset;
            if start_offset < 0 || start_offset >= next {
                return Ok(Vec::new());
            }
            (state.index[start_offset as usize], next - start_offset)
        };

        let limit = available.min(Offset::from(max_records)) as usize;

        let mut file = BufReader::new(File::open(&self.log_path)?);
        file.seek(SeekFrom::Start(position))?;

        let mut records = Vec::with_capacity(limit);
        for _ in 0..limit {
            match read_record(&mut file)? {
                Some(record) => records.push(record),
                None => break,
            }
        }
        Ok(records)
    }

    /// Offset the next append will receive; equals the record count.
    pub fn next_offset(&self) -> Offset {
        self.state.lock().index.len() as Offset
    }

    /// Number of records in the log
    pub fn len(&self) -> usize {
        self.state.lock().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Force appended data to stable storage (fsync). Appends themselves
    /// only flush to the OS.
    pub fn sync(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.writer.flush()?;
        state.writer.get_ref().sync_all()?;
        Ok(())
    }
}

/// Write one size-prefixed entry and flush it to the OS
fn write_entry(writer: &mut BufWriter<File>, payload: &[u8]) -> std::io::Result<()> {
    writer.write_all(&(payload.len() as u32).to_be_bytes())?;
    writer.write_all(payload)?;
    writer.flush()
}

/// Walk the log file from position zero, rebuilding the offset index.
/// Stops at the first incomplete record (torn tail) and returns the file
/// length covered by complete records.
fn recover(file: &File, topic: &str, partition_id: PartitionId) -> Result<(Vec<u64>, u64)> {
    let mut reader = BufReader::new(file);
    reader.seek(SeekFrom::Start(0))?;

    let mut index = Vec::new();
    let mut pos: u64 = 0;

    loop {
        let mut size_buf = [0u8; 4];
        if read_fully(&mut reader, &mut size_buf)?.is_none() {
            break;
        }
        let record_size = u32::from_be_bytes(size_buf) as usize;

        let mut body = vec![0u8; record_size];
        if read_fully(&mut reader, &mut body)?.is_none() {
            break;
        }

        // Only the offset prefix is parsed during recovery; the rest of
        // the record is validated lazily on read.
        let offset = ByteReader::new(Bytes::from(body)).read_i64()?;
        if offset != index.len() as Offset {
            return Err(StorageError::CorruptLog(format!(
                "{}-{}: expected offset {} at position {}, found {}",
                topic,
                partition_id,
                index.len(),
                pos,
                offset
            ))
            .into());
        }

        index.push(pos);
        pos += 4 + record_size as u64;
    }

    Ok((index, pos))
}

/// Read exactly `buf.len()` bytes; `None` means the file ended first
/// (complete records before that point remain valid).
fn read_fully<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<Option<()>> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(Some(())),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Decode one framed record, or `None` on a clean short read.
fn read_record<R: Read>(reader: &mut R) -> Result<Option<Record>> {
    let mut size_buf = [0u8; 4];
    if read_fully(reader, &mut size_buf)?.is_none() {
        return Ok(None);
    }
    let record_size = u32::from_be_bytes(size_buf) as usize;

    let mut body = vec![0u8; record_size];
    if read_fully(reader, &mut body)?.is_none() {
        return Ok(None);
    }

    let mut buf = ByteReader::new(Bytes::from(body));
    let offset = buf.read_i64()?;
    let key = buf.read_string()?;
    let value = buf.read_bytes()?;
    Ok(Some(Record { offset, key, value }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_log(dir: &TempDir) -> PartitionLog {
        PartitionLog::open(dir.path(), "transactions", 0).expect("open partition")
    }

    #[test]
    fn append_assigns_dense_offsets() {
        let dir = TempDir::new().unwrap();
        let log = open_log(&dir);

        for expected in 0..5 {
            let offset = log.append("a", b"payload").unwrap();
            assert_eq!(offset, expected);
        }
        assert_eq!(log.next_offset(), 5);
        assert_eq!(log.len(), 5);
    }

    #[test]
    fn read_returns_appended_triples() {
        let dir = TempDir::new().unwrap();
        let log = open_log(&dir);

        log.append("k0", b"v0").unwrap();
        log.append("", b"").unwrap();
        log.append("k2", b"{\"amount\": 99}").unwrap();

        let records = log.read(0, 10).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0], Record::new(0, "k0", Bytes::from_static(b"v0")));
        assert_eq!(records[1], Record::new(1, "", Bytes::new()));
        assert_eq!(
            records[2],
            Record::new(2, "k2", Bytes::from_static(b"{\"amount\": 99}"))
        );
    }

    #[test]
    fn read_honors_start_and_limit() {
        let dir = TempDir::new().unwrap();
        let log = open_log(&dir);

        for i in 0..5 {
            log.append("a", format!("v{}", i).as_bytes()).unwrap();
        }

        let records = log.read(2, 100).unwrap();
        let offsets: Vec<Offset> = records.iter().map(|r| r.offset).collect();
        assert_eq!(offsets, vec![2, 3, 4]);

        let records = log.read(1, 2).unwrap();
        let offsets: Vec<Offset> = records.iter().map(|r| r.offset).collect();
        assert_eq!(offsets, vec![1, 2]);
    }

    #[test]
    fn read_past_end_is_empty() {
        let dir = TempDir::new().unwrap();
        let log = open_log(&dir);
        log.append("a", b"v").unwrap();

        assert!(log.read(1, 10).unwrap().is_empty());
        assert!(log.read(100, 10).unwrap().is_empty());
        assert!(log.read(-1, 10).unwrap().is_empty());
        assert!(log.read(0, 0).unwrap().is_empty());
    }

    #[test]
    fn reopen_recovers_index_and_next_offset() {
        let dir = TempDir::new().unwrap();
        {
            let log = open_log(&dir);
            log.append("k0", b"v0").unwrap();
            log.append("k1", b"v1").unwrap();
            log.append("k2", b"v2").unwrap();
        }

        let log = open_log(&dir);
        assert_eq!(log.next_offset(), 3);

        let records = log.read(0, 10).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[2], Record::new(2, "k2", Bytes::from_static(b"v2")));

        assert_eq!(log.append("k3", b"v3").unwrap(), 3);
    }

    #[test]
    fn truncation_at_any_byte_recovers_complete_prefix() {
        let seed = TempDir::new().unwrap();
        let boundaries;
        {
            let log = open_log(&seed);
            log.append("alpha", b"first").unwrap();
            log.append("beta", b"second record").unwrap();
            log.append("gamma", b"third").unwrap();
            let state = log.state.lock();
            let mut b: Vec<u64> = state.index.clone();
            b.push(state.end_pos);
            boundaries = b;
        }
        let full = std::fs::read(seed.path().join("transactions-0").join(LOG_FILE)).unwrap();
        assert_eq!(full.len() as u64, boundaries[3]);

        for cut in 0..=full.len() {
            let dir = TempDir::new().unwrap();
            let partition_dir = dir.path().join("transactions-0");
            std::fs::create_dir_all(&partition_dir).unwrap();
            std::fs::write(partition_dir.join(LOG_FILE), &full[..cut]).unwrap();

            let log = open_log(&dir);
            let survivors = boundaries
                .iter()
                .skip(1)
                .filter(|&&end| end <= cut as u64)
                .count() as Offset;
            assert_eq!(log.next_offset(), survivors, "cut at byte {}", cut);

            // Appending after recovery lands on a record boundary and the
            // new record reads back.
            let offset = log.append("delta", b"fresh").unwrap();
            assert_eq!(offset, survivors);
            let records = log.read(offset, 1).unwrap();
            assert_eq!(records[0].key, "delta");
        }
    }

    #[test]
    fn torn_tail_never_resurfaces_after_restart() {
        let dir = TempDir::new().unwrap();
        {
            let log = open_log(&dir);
            log.append("k0", b"v0").unwrap();
        }
        let path = dir.path().join("transactions-0").join(LOG_FILE);
        let mut raw = std::fs::read(&path).unwrap();
        // fake a torn write: size prefix present, body cut short
        raw.extend_from_slice(&100u32.to_be_bytes());
        raw.extend_from_slice(b"partial");
        std::fs::write(&path, &raw).unwrap();

        {
            let log = open_log(&dir);
            assert_eq!(log.next_offset(), 1);
            assert_eq!(log.append("k1", b"v1").unwrap(), 1);
        }

        // A second restart still sees exactly two clean records.
        let log = open_log(&dir);
        assert_eq!(log.next_offset(), 2);
        let records = log.read(0, 10).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1], Record::new(1, "k1", Bytes::from_static(b"v1")));
    }

    #[test]
    fn concurrent_appends_keep_offsets_dense() {
        let dir = TempDir::new().unwrap();
        let log = std::sync::Arc::new(open_log(&dir));

        let mut handles = Vec::new();
        for t in 0..4 {
            let log = log.clone();
            handles.push(std::thread::spawn(move || {
                for i in 0..25 {
                    log.append(&format!("t{}-{}", t, i), b"x").unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(log.next_offset(), 100);
        let records = log.read(0, 1000).unwrap();
        assert_eq!(records.len(), 100);
        for (i, record) in records.iter().enumerate() {
            assert_eq!(record.offset, i as Offset);
        }
    }
}
