// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! `FileSet`: a time-rolled series of archive files named by a
//! strftime-style template. No index file is maintained — read-side
//! ordering is purely lexicographic, which is why names must be
//! timestamp-prefixed (§4.10, §9 "Persisted state layout").

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use bzip2::write::BzEncoder;
use chrono::{TimeZone, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::Error;

/// Compression applied to each rolled file. Drop-in replacements for each
/// other via polymorphism over the same naming/rolling contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileSetCompression {
    None,
    Gzip,
    Bzip2,
}

impl FileSetCompression {
    fn extension(self) -> &'static str {
        match self {
            FileSetCompression::None => "dat",
            FileSetCompression::Gzip => "dat.gz",
            FileSetCompression::Bzip2 => "dat.bz2",
        }
    }
}

enum Writer {
    Plain(BufWriter<File>),
    Gzip(GzEncoder<File>),
    Bzip2(BzEncoder<File>),
}

impl Write for Writer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Writer::Plain(w) => w.write(buf),
            Writer::Gzip(w) => w.write(buf),
            Writer::Bzip2(w) => w.write(buf),
        }
    }
    fn flush(&mut self) -> io::Result<()> {
        match self {
            Writer::Plain(w) => w.flush(),
            Writer::Gzip(w) => w.flush(),
            Writer::Bzip2(w) => w.flush(),
        }
    }
}

/// A write-side `FileSet`: generates a new file path from `strftime_template`
/// and the sample timetag presented to [`Self::path_for`], rolling to a
/// fresh file whenever the wall-clock crosses `roll_interval`.
pub struct FileSet {
    directory: PathBuf,
    strftime_template: String,
    compression: FileSetCompression,
    roll_interval: Duration,
    current: Option<(PathBuf, Writer)>,
    current_opened_at_us: i64,
    bytes_written_current: u64,
}

impl FileSet {
    pub fn new(
        directory: impl Into<PathBuf>,
        strftime_template: impl Into<String>,
        compression: FileSetCompression,
        roll_interval: Duration,
    ) -> Self {
        FileSet {
            directory: directory.into(),
            strftime_template: strftime_template.into(),
            compression,
            roll_interval,
            current: None,
            current_opened_at_us: 0,
            bytes_written_current: 0,
        }
    }

    /// Render the file name for `timetag_us` via the configured strftime
    /// template, with the compression's extension appended.
    pub fn path_for(&self, timetag_us: i64) -> PathBuf {
        let secs = timetag_us.div_euclid(1_000_000);
        let dt = Utc.timestamp_opt(secs, 0).single().unwrap_or_else(|| Utc.timestamp_opt(0, 0).unwrap());
        let stem = dt.format(&self.strftime_template).to_string();
        self.directory.join(format!("{stem}.{}", self.compression.extension()))
    }

    fn open_for(&self, path: &Path) -> Result<Writer, Error> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(match self.compression {
            FileSetCompression::None => Writer::Plain(BufWriter::new(file)),
            FileSetCompression::Gzip => Writer::Gzip(GzEncoder::new(file, Compression::default())),
            FileSetCompression::Bzip2 => Writer::Bzip2(BzEncoder::new(file, bzip2::Compression::default())),
        })
    }

    /// Roll to a new file if crossing `roll_interval` since the current
    /// file was opened, or if no file is open yet. Opens the file named
    /// for `timetag_us`.
    pub fn write_sample(&mut self, timetag_us: i64, bytes: &[u8]) -> Result<(), Error> {
        let needs_roll = match &self.current {
            None => true,
            Some(_) => {
                let elapsed_us = timetag_us.saturating_sub(self.current_opened_at_us);
                elapsed_us < 0 || elapsed_us as u64 >= self.roll_interval.as_micros() as u64
            }
        };
        if needs_roll {
            self.roll(timetag_us)?;
        }
        if let Some((_, writer)) = self.current.as_mut() {
            writer.write_all(bytes)?;
            self.bytes_written_current += bytes.len() as u64;
        }
        Ok(())
    }

    fn roll(&mut self, timetag_us: i64) -> Result<(), Error> {
        if let Some((_, mut writer)) = self.current.take() {
            writer.flush()?;
        }
        let path = self.path_for(timetag_us);
        let writer = self.open_for(&path)?;
        self.current = Some((path, writer));
        self.current_opened_at_us = timetag_us;
        self.bytes_written_current = 0;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), Error> {
        if let Some((_, writer)) = self.current.as_mut() {
            writer.flush()?;
        }
        Ok(())
    }

    pub fn current_path(&self) -> Option<&Path> {
        self.current.as_ref().map(|(p, _)| p.as_path())
    }

    /// Read-side: list files under `directory` matching `glob_suffix`
    /// (e.g. `".dat"`), in lexicographic (therefore chronological, given a
    /// timestamp-prefixed naming scheme) order. No index file is
    /// consulted — ordering is purely by name.
    pub fn list_sorted(directory: impl AsRef<Path>, suffix: &str) -> Result<Vec<PathBuf>, Error> {
        let mut entries: Vec<PathBuf> = fs::read_dir(directory.as_ref())?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.to_string_lossy().ends_with(suffix))
            .collect();
        entries.sort();
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn rolls_a_new_file_after_the_interval_elapses() {
        let dir = tempdir().unwrap();
        let mut fileset = FileSet::new(
            dir.path(),
            "%Y%m%d_%H%M%S",
            FileSetCompression::None,
            Duration::from_secs(60),
        );

        let base = 1_700_000_000_000_000i64;
        fileset.write_sample(base, b"first").unwrap();
        let first_path = fileset.current_path().unwrap().to_path_buf();

        fileset.write_sample(base + 120_000_000, b"second").unwrap();
        let second_path = fileset.current_path().unwrap().to_path_buf();

        assert_ne!(first_path, second_path);
    }

    #[test]
    fn stays_in_the_same_file_within_the_interval() {
        let dir = tempdir().unwrap();
        let mut fileset = FileSet::new(
            dir.path(),
            "%Y%m%d_%H%M%S",
            FileSetCompression::None,
            Duration::from_secs(3600),
        );
        let base = 1_700_000_000_000_000i64;
        fileset.write_sample(base, b"a").unwrap();
        let first = fileset.current_path().unwrap().to_path_buf();
        fileset.write_sample(base + 10_000_000, b"b").unwrap();
        let second = fileset.current_path().unwrap().to_path_buf();
        assert_eq!(first, second);
    }

    #[test]
    fn list_sorted_returns_lexicographic_order() {
        let dir = tempdir().unwrap();
        for name in ["20260102_000000.dat", "20260101_000000.dat", "20260103_000000.dat"] {
            File::create(dir.path().join(name)).unwrap();
        }
        let listed = FileSet::list_sorted(dir.path(), ".dat").unwrap();
        let names: Vec<_> = listed.iter().map(|p| p.file_name().unwrap().to_str().unwrap()).collect();
        assert_eq!(names, vec!["20260101_000000.dat", "20260102_000000.dat", "20260103_000000.dat"]);
    }

    #[test]
    fn gzip_variant_writes_a_gzip_stream() {
        let dir = tempdir().unwrap();
        let mut fileset = FileSet::new(dir.path(), "%Y%m%d_%H%M%S", FileSetCompression::Gzip, Duration::from_secs(60));
        fileset.write_sample(1_700_000_000_000_000, b"compressed payload").unwrap();
        fileset.flush().unwrap();
        let path = fileset.current_path().unwrap();
        assert!(path.to_string_lossy().ends_with(".dat.gz"));
        let bytes = fs::read(path).unwrap();
        assert_eq!(&bytes[0..2], &[0x1f, 0x8b], "gzip magic bytes");
    }
}
