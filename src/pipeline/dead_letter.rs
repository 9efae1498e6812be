use super::types::LogRecord;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum DeadLetterError {
    Io(std::io::Error),
    Serialization(serde_json::Error),
}

impl From<std::io::Error> for DeadLetterError {
    fn from(err: std::io::Error) -> Self {
        DeadLetterError::Io(err)
    }
}

impl From<serde_json::Error> for DeadLetterError {
    fn from(err: serde_json::Error) -> Self {
        DeadLetterError::Serialization(err)
    }
}

impl std::fmt::Display for DeadLetterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeadLetterError::Io(e) => write!(f, "IO error: {}", e),
            DeadLetterError::Serialization(e) => write!(f, "Serialization error: {}", e),
        }
    }
}

impl std::error::Error for DeadLetterError {}

/// Rotating JSONL sink for batches the search store refused
pub struct DeadLetterWriter {
    file: BufWriter<File>,
    current_size: u64,
    max_size: u64,
    base_path: PathBuf,
    rotation_count: u32,
    max_rotations: u32,
}

impl DeadLetterWriter {
    pub fn new(path: impl AsRef<Path>, max_size_mb: u64, max_rotations: u32) -> Result<Self, DeadLetterError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;

        let current_size = file.metadata()?.len();

        Ok(Self {
            file: BufWriter::new(file),
            current_size,
            max_size: max_size_mb.max(1) * 1024 * 1024,
            base_path: path.to_path_buf(),
            rotation_count: 0,
            max_rotations: max_rotations.max(1),
        })
    }

    /// Append every record of a failed batch, one JSON object per line
    pub fn write_batch(&mut self, records: &[LogRecord]) -> Result<(), DeadLetterError> {
        for record in records {
            let json = serde_json::to_string(record)?;
            writeln!(self.file, "{}", json)?;
            self.current_size += (json.len() + 1) as u64;
        }
        self.file.flush()?;

        if self.current_size >= self.max_size {
            self.rotate()?;
        }

        Ok(())
    }

    fn rotate(&mut self) -> Result<(), DeadLetterError> {
        self.file.flush()?;

        let oldest = self.rotated_path(self.max_rotations);
        if oldest.exists() {
            std::fs::remove_file(&oldest)?;
        }

        for i in (1..self.max_rotations).rev() {
            let old_path = self.rotated_path(i);
            if old_path.exists() {
                std::fs::rename(&old_path, self.rotated_path(i + 1))?;
            }
        }

        if self.base_path.exists() {
            std::fs::rename(&self.base_path, self.rotated_path(1))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.base_path)?;

        self.file = BufWriter::new(file);
        self.current_size = 0;
        self.rotation_count += 1;

        log::info!("📄 Rotated dead-letter file (rotation #{})", self.rotation_count);

        Ok(())
    }

    fn rotated_path(&self, n: u32) -> PathBuf {
        self.base_path.with_extension(format!("jsonl.{}", n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;
    use tempfile::tempdir;

    fn make_record(i: usize) -> LogRecord {
        LogRecord {
            event: "play".to_string(),
            user_id: format!("User-{}", i),
            video_title: "x".repeat(1024),
            processed_at: i as i64,
            extra: Map::new(),
        }
    }

    #[test]
    fn test_write_batch_appends_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dlq/failed.jsonl");

        let mut writer = DeadLetterWriter::new(&path, 1, 3).unwrap();
        writer.write_batch(&[make_record(1), make_record(2)]).unwrap();
        writer.write_batch(&[make_record(3)]).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let users: Vec<String> = content
            .lines()
            .map(|l| serde_json::from_str::<LogRecord>(l).unwrap().user_id)
            .collect();
        assert_eq!(users, vec!["User-1", "User-2", "User-3"]);
    }

    #[test]
    fn test_rotation_when_size_exceeded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("failed.jsonl");

        let mut writer = DeadLetterWriter::new(&path, 1, 2).unwrap();
        let batch: Vec<LogRecord> = (0..1100).map(make_record).collect();
        writer.write_batch(&batch).unwrap();

        assert!(path.with_extension("jsonl.1").exists());
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);

        writer.write_batch(&batch).unwrap();
        writer.write_batch(&batch).unwrap();
        assert!(path.with_extension("jsonl.2").exists());
        assert!(!path.with_extension("jsonl.3").exists());
    }
}
