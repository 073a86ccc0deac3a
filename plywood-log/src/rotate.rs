//! A size-rotated log file.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::{Log, Metadata, Record};
use parking_lot::Mutex;

struct State {
    file: File,
    size: u64,
}

/// A log file rolled over once it grows over a size.
///
/// When writing a record would make the file reach `max_bytes`, the file is renamed to
/// `<name>.1` (the older backups are shifted to `<name>.2` and so on, the oldest one over
/// `backup_count` is dropped) and a fresh file is started. With `backup_count` of 0 the file is
/// just truncated. With `max_bytes` of 0 the file never rolls.
///
/// Records are written whole and flushed right away.
///
/// It acts as a [`Log`] sink that writes the already formatted message of each record on its own
/// line, so it can be chained into a [`fern::Dispatch`].
pub struct RotatingFile {
    path: PathBuf,
    max_bytes: u64,
    backup_count: u32,
    state: Mutex<State>,
}

impl RotatingFile {
    /// Opens (or creates) the file for appending, creating the parent directories if needed.
    pub fn open<P: Into<PathBuf>>(path: P, max_bytes: u64, backup_count: u32) -> io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            path,
            max_bytes,
            backup_count,
            state: Mutex::new(State { file, size }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the n-th backup (`<path>.<index>`).
    pub fn backup_path(&self, index: u32) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(format!(".{}", index));
        PathBuf::from(name)
    }

    /// Writes one already terminated line, rolling the file over first if needed.
    pub fn write_record(&self, line: &str) -> io::Result<()> {
        let mut state = self.state.lock();
        let len = line.len() as u64;
        if self.max_bytes > 0 && state.size > 0 && state.size + len >= self.max_bytes {
            self.roll(&mut state)?;
        }
        state.file.write_all(line.as_bytes())?;
        state.file.flush()?;
        state.size += len;
        Ok(())
    }

    fn roll(&self, state: &mut State) -> io::Result<()> {
        state.file.flush()?;
        if self.backup_count > 0 {
            for index in (1..self.backup_count).rev() {
                let src = self.backup_path(index);
                if src.exists() {
                    let dst = self.backup_path(index + 1);
                    if dst.exists() {
                        fs::remove_file(&dst)?;
                    }
                    fs::rename(&src, &dst)?;
                }
            }
            let first = self.backup_path(1);
            if first.exists() {
                fs::remove_file(&first)?;
            }
            fs::rename(&self.path, &first)?;
        }
        state.file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        state.size = 0;
        Ok(())
    }
}

impl Log for RotatingFile {
    fn enabled(&self, _: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        let line = format!("{}\n", record.args());
        if let Err(e) = self.write_record(&line) {
            eprintln!("Failed to write to log file {}: {}", self.path.display(), e);
        }
    }

    fn flush(&self) {
        let _ = self.state.lock().file.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(n: usize) -> String {
        // 20 bytes with the newline
        format!("record number {:05}\n", n)
    }

    fn lines_of(path: &Path) -> Vec<String> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(str::to_owned)
            .collect()
    }

    #[test]
    fn rolls_and_keeps_backups() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("app.log");
        let file = RotatingFile::open(&path, 50, 2).unwrap();
        for n in 1..=7 {
            assert_eq!(20, line(n).len());
            file.write_record(&line(n)).unwrap();
        }

        assert_eq!(vec!["record number 00007"], lines_of(&path));
        assert_eq!(
            vec!["record number 00005", "record number 00006"],
            lines_of(&file.backup_path(1))
        );
        assert_eq!(
            vec!["record number 00003", "record number 00004"],
            lines_of(&file.backup_path(2))
        );
        assert!(!file.backup_path(3).exists());
    }

    #[test]
    fn no_backups_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        let file = RotatingFile::open(&path, 30, 0).unwrap();
        file.write_record(&line(1)).unwrap();
        file.write_record(&line(2)).unwrap();
        assert_eq!(vec!["record number 00002"], lines_of(&path));
        assert!(!file.backup_path(1).exists());
    }

    #[test]
    fn zero_size_never_rolls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        let file = RotatingFile::open(&path, 0, 3).unwrap();
        for n in 0..10 {
            file.write_record(&line(n)).unwrap();
        }
        assert_eq!(10, lines_of(&path).len());
        assert!(!file.backup_path(1).exists());
    }

    /// Reopening continues with the size already on disk.
    #[test]
    fn reopen_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        RotatingFile::open(&path, 50, 1)
            .unwrap()
            .write_record(&line(1))
            .unwrap();
        let file = RotatingFile::open(&path, 50, 1).unwrap();
        file.write_record(&line(2)).unwrap();
        file.write_record(&line(3)).unwrap();
        assert_eq!(vec!["record number 00003"], lines_of(&path));
        assert_eq!(2, lines_of(&file.backup_path(1)).len());
    }
}
