//! Incremental zip writer.
//!
//! Entries are stored uncompressed and their sizes and checksums follow the
//! payload in a data descriptor, so no entry ever has to be buffered or
//! seeked back into. Written bytes accumulate in an output buffer that the
//! caller drains with [`ZipStreamWriter::take_output`].

use bytes::{BufMut, Bytes, BytesMut};
use chrono::{Datelike, NaiveDateTime, Timelike};
use tracing::debug;

use crate::error::{PackError, PackResult};

const LOCAL_HEADER: u32 = 0x0403_4b50;
const DATA_DESCRIPTOR: u32 = 0x0807_4b50;
const CENTRAL_HEADER: u32 = 0x0201_4b50;
const END_OF_CENTRAL_DIRECTORY: u32 = 0x0605_4b50;

const VERSION: u16 = 20;
/// Sizes in data descriptor, UTF-8 names.
const FLAGS: u16 = 0x0008 | 0x0800;
const STORED: u16 = 0;

struct OpenEntry {
    name: String,
    header_offset: u64,
    hasher: crc32fast::Hasher,
    size: u64,
}

struct CentralRecord {
    name: String,
    crc: u32,
    size: u32,
    header_offset: u32,
}

pub struct ZipStreamWriter {
    out: BytesMut,
    flushed: u64,
    entries: Vec<CentralRecord>,
    open: Option<OpenEntry>,
    dos_time: u16,
    dos_date: u16,
}

impl Default for ZipStreamWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ZipStreamWriter {
    /// A writer stamping entries with the DOS epoch (1980-01-01 00:00).
    pub fn new() -> Self {
        Self {
            out: BytesMut::new(),
            flushed: 0,
            entries: Vec::new(),
            open: None,
            dos_time: 0,
            dos_date: (1 << 5) | 1,
        }
    }

    pub fn with_modified(mut self, modified: NaiveDateTime) -> Self {
        (self.dos_time, self.dos_date) = dos_timestamp(modified);
        self
    }

    /// Bytes produced so far, drained or not.
    pub fn bytes_written(&self) -> u64 {
        self.flushed + self.out.len() as u64
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_entry_open(&self) -> bool {
        self.open.is_some()
    }

    /// Open a new entry. Only one entry can be open at a time.
    pub fn start_entry(&mut self, name: &str) -> PackResult<()> {
        if let Some(open) = &self.open {
            return Err(PackError::EntryAlreadyOpen(open.name.clone()));
        }
        let name_len = u16::try_from(name.len())
            .map_err(|_| PackError::TooLarge(format!("entry name {name}")))?;
        let header_offset = self.bytes_written();

        self.out.put_u32_le(LOCAL_HEADER);
        self.out.put_u16_le(VERSION);
        self.out.put_u16_le(FLAGS);
        self.out.put_u16_le(STORED);
        self.out.put_u16_le(self.dos_time);
        self.out.put_u16_le(self.dos_date);
        // crc and sizes are deferred to the data descriptor
        self.out.put_u32_le(0);
        self.out.put_u32_le(0);
        self.out.put_u32_le(0);
        self.out.put_u16_le(name_len);
        self.out.put_u16_le(0);
        self.out.put_slice(name.as_bytes());

        debug!(entry = name, offset = header_offset, "opened zip entry");
        self.open = Some(OpenEntry {
            name: name.to_string(),
            header_offset,
            hasher: crc32fast::Hasher::new(),
            size: 0,
        });
        Ok(())
    }

    /// Append payload bytes to the open entry.
    pub fn write(&mut self, data: &[u8]) -> PackResult<()> {
        let open = self.open.as_mut().ok_or(PackError::NoOpenEntry)?;
        open.size += data.len() as u64;
        if open.size > u64::from(u32::MAX) {
            return Err(PackError::TooLarge(format!("entry {}", open.name)));
        }
        open.hasher.update(data);
        self.out.put_slice(data);
        Ok(())
    }

    /// Close the open entry, returning its size.
    pub fn finish_entry(&mut self) -> PackResult<u64> {
        let open = self.open.take().ok_or(PackError::NoOpenEntry)?;
        let crc = open.hasher.finalize();
        // write() keeps the size within u32
        let size = open.size as u32;
        let header_offset = u32::try_from(open.header_offset)
            .map_err(|_| PackError::TooLarge("archive".into()))?;

        self.out.put_u32_le(DATA_DESCRIPTOR);
        self.out.put_u32_le(crc);
        self.out.put_u32_le(size);
        self.out.put_u32_le(size);

        debug!(entry = %open.name, size = open.size, crc, "closed zip entry");
        self.entries.push(CentralRecord {
            name: open.name,
            crc,
            size,
            header_offset,
        });
        Ok(open.size)
    }

    /// Drain everything written since the last call.
    pub fn take_output(&mut self) -> Bytes {
        let out = self.out.split().freeze();
        self.flushed += out.len() as u64;
        out
    }

    /// Write the central directory and return the remaining output.
    pub fn finish(mut self) -> PackResult<Bytes> {
        if let Some(open) = &self.open {
            return Err(PackError::EntryAlreadyOpen(open.name.clone()));
        }
        let count = u16::try_from(self.entries.len())
            .map_err(|_| PackError::TooLarge("entry count".into()))?;
        let directory_offset = self.bytes_written();

        for record in &self.entries {
            self.out.put_u32_le(CENTRAL_HEADER);
            self.out.put_u16_le(VERSION);
            self.out.put_u16_le(VERSION);
            self.out.put_u16_le(FLAGS);
            self.out.put_u16_le(STORED);
            self.out.put_u16_le(self.dos_time);
            self.out.put_u16_le(self.dos_date);
            self.out.put_u32_le(record.crc);
            self.out.put_u32_le(record.size);
            self.out.put_u32_le(record.size);
            // names were checked in start_entry
            self.out.put_u16_le(record.name.len() as u16);
            self.out.put_u16_le(0);
            self.out.put_u16_le(0);
            self.out.put_u16_le(0);
            self.out.put_u16_le(0);
            self.out.put_u32_le(0);
            self.out.put_u32_le(record.header_offset);
            self.out.put_slice(record.name.as_bytes());
        }

        let directory_size = self.bytes_written() - directory_offset;
        let too_large = || PackError::TooLarge("archive".into());
        let directory_offset = u32::try_from(directory_offset).map_err(|_| too_large())?;
        let directory_size = u32::try_from(directory_size).map_err(|_| too_large())?;

        self.out.put_u32_le(END_OF_CENTRAL_DIRECTORY);
        self.out.put_u16_le(0);
        self.out.put_u16_le(0);
        self.out.put_u16_le(count);
        self.out.put_u16_le(count);
        self.out.put_u32_le(directory_size);
        self.out.put_u32_le(directory_offset);
        self.out.put_u16_le(0);

        Ok(self.out.split().freeze())
    }
}

/// MS-DOS time and date fields. Dates before 1980 clamp to the epoch.
fn dos_timestamp(at: NaiveDateTime) -> (u16, u16) {
    if at.year() < 1980 {
        return (0, (1 << 5) | 1);
    }
    let time = (at.hour() << 11) | (at.minute() << 5) | (at.second() / 2);
    let year = (at.year() - 1980).min(127) as u32;
    let date = (year << 9) | (at.month() << 5) | at.day();
    (time as u16, date as u16)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};

    fn read_back(bytes: Vec<u8>) -> ::zip::ZipArchive<Cursor<Vec<u8>>> {
        ::zip::ZipArchive::new(Cursor::new(bytes)).unwrap()
    }

    #[test]
    fn empty_archive_is_just_the_end_record() {
        let writer = ZipStreamWriter::new();
        let out = writer.finish().unwrap();
        assert_eq!(out.len(), 22);
        assert_eq!(&out[..4], &END_OF_CENTRAL_DIRECTORY.to_le_bytes());
        assert_eq!(read_back(out.to_vec()).len(), 0);
    }

    #[test]
    fn entries_written_in_pieces_read_back() {
        let mut writer = ZipStreamWriter::new();
        let mut archive = Vec::new();

        writer.start_entry("ro-crate-metadata.json").unwrap();
        writer.write(b"{\"@graph\": ").unwrap();
        archive.extend_from_slice(&writer.take_output());
        writer.write(b"[]}").unwrap();
        assert_eq!(writer.finish_entry().unwrap(), 14);

        writer.start_entry("data/ümlaut.txt").unwrap();
        writer.write(b"hello world").unwrap();
        writer.finish_entry().unwrap();
        assert_eq!(writer.entry_count(), 2);
        archive.extend_from_slice(&writer.take_output());
        archive.extend_from_slice(&writer.finish().unwrap());

        let mut zip = read_back(archive);
        assert_eq!(zip.len(), 2);
        let mut text = String::new();
        zip.by_name("data/ümlaut.txt")
            .unwrap()
            .read_to_string(&mut text)
            .unwrap();
        assert_eq!(text, "hello world");
        let mut metadata = String::new();
        zip.by_index(0).unwrap().read_to_string(&mut metadata).unwrap();
        assert_eq!(metadata, "{\"@graph\": []}");
    }

    #[test]
    fn one_entry_at_a_time() {
        let mut writer = ZipStreamWriter::new();
        assert!(matches!(writer.write(b"x"), Err(PackError::NoOpenEntry)));
        writer.start_entry("a").unwrap();
        assert!(matches!(
            writer.start_entry("b"),
            Err(PackError::EntryAlreadyOpen(name)) if name == "a"
        ));
        assert!(matches!(writer.finish(), Err(PackError::EntryAlreadyOpen(_))));
    }

    #[test]
    fn bytes_written_tracks_drained_output() {
        let mut writer = ZipStreamWriter::new();
        writer.start_entry("a").unwrap();
        let header = writer.take_output();
        assert_eq!(header.len(), 31);
        writer.write(&[0u8; 100]).unwrap();
        assert_eq!(writer.bytes_written(), 131);
        assert!(writer.is_entry_open());
    }

    #[test]
    fn dos_timestamps() {
        let at = chrono::NaiveDate::from_ymd_opt(2024, 11, 23)
            .unwrap()
            .and_hms_opt(14, 30, 10)
            .unwrap();
        let (time, date) = dos_timestamp(at);
        assert_eq!(time, (14 << 11) | (30 << 5) | 5);
        assert_eq!(date, (44 << 9) | (11 << 5) | 23);

        let early = chrono::NaiveDate::from_ymd_opt(1970, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(dos_timestamp(early), (0, 33));
    }
}
