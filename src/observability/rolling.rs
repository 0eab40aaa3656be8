//! Size- and age-rotated log file.
//!
//! # Responsibilities
//! - Append log lines to `<directory>/<file_name>`
//! - Rotate when the file exceeds `max_bytes` or is older than `max_age`
//! - Gzip rotated files and delete ones past the retention window
//!
//! # Design Decisions
//! - Runs behind `tracing_appender::non_blocking`, so rotation and
//!   compression happen on the writer thread, never on a request task
//! - A rotation failure keeps writing to the current file

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use flate2::write::GzEncoder;
use flate2::Compression;

/// Rotation policy.
#[derive(Debug, Clone)]
pub struct RotationPolicy {
    /// Rotate once the active file reaches this size.
    pub max_bytes: u64,
    /// Rotate once the active file is this old. `None` disables age rotation.
    pub max_age: Option<Duration>,
    /// Delete rotated files older than this.
    pub retention: Duration,
    /// Gzip rotated files.
    pub compress: bool,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            max_bytes: 10 * 1024 * 1024,
            max_age: None,
            retention: Duration::from_secs(7 * 24 * 3600),
            compress: true,
        }
    }
}

/// Append-only writer with rotation.
pub struct RollingFile {
    directory: PathBuf,
    file_name: String,
    policy: RotationPolicy,
    file: File,
    written: u64,
    opened_at: SystemTime,
}

impl RollingFile {
    pub fn open(directory: impl AsRef<Path>, file_name: &str, policy: RotationPolicy) -> io::Result<Self> {
        let directory = directory.as_ref().to_path_buf();
        fs::create_dir_all(&directory)?;
        let (file, written) = open_active(&directory.join(file_name))?;
        Ok(Self {
            directory,
            file_name: file_name.to_owned(),
            policy,
            file,
            written,
            opened_at: SystemTime::now(),
        })
    }

    fn active_path(&self) -> PathBuf {
        self.directory.join(&self.file_name)
    }

    fn should_rotate(&self, incoming: usize) -> bool {
        if self.written == 0 {
            return false;
        }
        if self.written + incoming as u64 > self.policy.max_bytes {
            return true;
        }
        match self.policy.max_age {
            Some(max_age) => self.opened_at.elapsed().map(|age| age >= max_age).unwrap_or(false),
            None => false,
        }
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;

        let stamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S%.6f");
        let (stem, ext) = split_name(&self.file_name);
        let rotated = self.directory.join(format!("{stem}.{stamp}.{ext}"));
        fs::rename(self.active_path(), &rotated)?;

        let (file, written) = open_active(&self.active_path())?;
        self.file = file;
        self.written = written;
        self.opened_at = SystemTime::now();

        if self.policy.compress {
            compress(&rotated)?;
        }
        self.prune()
    }

    /// Delete rotated files older than the retention window.
    fn prune(&self) -> io::Result<()> {
        let (stem, _) = split_name(&self.file_name);
        let prefix = format!("{stem}.");
        let now = SystemTime::now();

        for entry in fs::read_dir(&self.directory)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name == self.file_name.as_str() || !name.starts_with(&prefix) {
                continue;
            }
            let modified = entry.metadata()?.modified()?;
            let expired = now
                .duration_since(modified)
                .map(|age| age > self.policy.retention)
                .unwrap_or(false);
            if expired {
                fs::remove_file(entry.path())?;
            }
        }
        Ok(())
    }
}

impl Write for RollingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.should_rotate(buf.len()) {
            if let Err(e) = self.rotate() {
                eprintln!("log rotation failed for {}: {}", self.active_path().display(), e);
            }
        }
        let n = self.file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

fn open_active(path: &Path) -> io::Result<(File, u64)> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let len = file.metadata()?.len();
    Ok((file, len))
}

fn split_name(file_name: &str) -> (&str, &str) {
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, ext),
        _ => (file_name, "log"),
    }
}

fn compress(path: &Path) -> io::Result<()> {
    let mut gz_name = path.as_os_str().to_owned();
    gz_name.push(".gz");
    let gz_path = PathBuf::from(gz_name);

    let mut input = BufReader::new(File::open(path)?);
    let output = BufWriter::new(File::create(&gz_path)?);
    let mut encoder = GzEncoder::new(output, Compression::default());
    io::copy(&mut input, &mut encoder)?;
    encoder.finish()?.flush()?;

    fs::remove_file(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_rotates_on_size_and_compresses() {
        let dir = tempfile::tempdir().unwrap();
        let policy = RotationPolicy {
            max_bytes: 16,
            ..RotationPolicy::default()
        };
        let mut file = RollingFile::open(dir.path(), "app.log", policy).unwrap();

        file.write_all(b"0123456789\n").unwrap();
        file.write_all(b"abcdefghij\n").unwrap();
        file.flush().unwrap();

        let names = entries(dir.path());
        assert_eq!(names.len(), 2, "{names:?}");
        assert!(names.contains(&"app.log".to_string()));
        assert!(names.iter().any(|n| n.starts_with("app.") && n.ends_with(".log.gz")));
        assert_eq!(fs::read_to_string(dir.path().join("app.log")).unwrap(), "abcdefghij\n");
    }

    #[test]
    fn test_without_compression_keeps_plain_file() {
        let dir = tempfile::tempdir().unwrap();
        let policy = RotationPolicy {
            max_bytes: 4,
            compress: false,
            ..RotationPolicy::default()
        };
        let mut file = RollingFile::open(dir.path(), "app.log", policy).unwrap();
        file.write_all(b"first\n").unwrap();
        file.write_all(b"second\n").unwrap();

        let names = entries(dir.path());
        assert!(names.iter().any(|n| n.starts_with("app.") && n.ends_with(".log") && n != "app.log"));
    }

    #[test]
    fn test_prune_removes_expired_rotations() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("app.old.log.gz"), b"x").unwrap();
        fs::write(dir.path().join("other.txt"), b"x").unwrap();
        let policy = RotationPolicy {
            retention: Duration::ZERO,
            ..RotationPolicy::default()
        };
        let file = RollingFile::open(dir.path(), "app.log", policy).unwrap();
        std::thread::sleep(Duration::from_millis(10));
        file.prune().unwrap();

        assert_eq!(entries(dir.path()), vec!["app.log".to_string(), "other.txt".to_string()]);
    }

    #[test]
    fn test_split_name() {
        assert_eq!(split_name("app.log"), ("app", "log"));
        assert_eq!(split_name("service"), ("service", "log"));
    }
}
