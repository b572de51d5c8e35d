use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::board::{BoardDescriptor, BoardKind};
use crate::error::StreamError;

const METADATA_FILE: &str = "metadata.csv";

/// Patient/session information stored beside the record files.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub name: String,
    pub surname: String,
    pub description: String,
}

/// Creates a fresh session directory named after the current unix time.
pub fn create_session_dir(output_dir: &Path) -> Result<PathBuf, StreamError> {
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let dir = output_dir.join(format!("session_{stamp}"));
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

pub fn save_metadata(session_dir: &Path, metadata: &SessionMetadata) -> Result<(), StreamError> {
    let mut writer = csv::Writer::from_path(session_dir.join(METADATA_FILE))?;
    writer.write_record(["Name", "Surname", "Description"])?;
    writer.write_record([&metadata.name, &metadata.surname, &metadata.description])?;
    writer.flush()?;
    Ok(())
}

/// Reads the metadata file next to a record. A missing file is not an error.
pub fn load_metadata(session_dir: &Path) -> Result<Option<SessionMetadata>, StreamError> {
    let path = session_dir.join(METADATA_FILE);
    if !path.exists() {
        return Ok(None);
    }
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)?;
    let mut record = csv::StringRecord::new();
    if !reader.read_record(&mut record)? {
        return Ok(None);
    }
    Ok(Some(SessionMetadata {
        name: record.get(0).unwrap_or_default().to_owned(),
        surname: record.get(1).unwrap_or_default().to_owned(),
        description: record.get(2).unwrap_or_default().to_owned(),
    }))
}

/// Appends the rows a live session reads to a numbered record file.
///
/// Format: row 1 is the board identity code, row 2 the column headers, every
/// following row one sample. The writer owns the file exclusively and closes
/// it exactly once.
pub struct RecordingWriter {
    writer: Option<csv::Writer<File>>,
    path: PathBuf,
}

impl RecordingWriter {
    pub fn create(
        session_dir: &Path,
        descriptor: &BoardDescriptor,
    ) -> Result<Self, StreamError> {
        let record_num = next_record_number(session_dir)?;
        let path = session_dir.join(format!("{record_num}.csv"));
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_path(&path)?;
        writer.write_record([descriptor.kind.id().to_string()])?;
        writer.write_record(header_row(descriptor))?;
        Ok(Self {
            writer: Some(writer),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&mut self, rows: &[Vec<f64>]) -> Result<(), StreamError> {
        let writer = self.writer.as_mut().ok_or(StreamError::RecorderClosed)?;
        for row in rows {
            if row.is_empty() {
                continue;
            }
            writer.write_record(row.iter().map(|v| v.to_string()))?;
        }
        Ok(())
    }

    pub fn finish(&mut self) -> Result<(), StreamError> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        Ok(())
    }
}

impl Drop for RecordingWriter {
    fn drop(&mut self) {
        let _ = self.finish();
    }
}

fn next_record_number(session_dir: &Path) -> Result<usize, StreamError> {
    let records = fs::read_dir(session_dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name() != METADATA_FILE)
        .count();
    Ok(records + 1)
}

fn header_row(descriptor: &BoardDescriptor) -> Vec<String> {
    let mut headers = vec!["Packet Num".to_owned()];
    headers.extend(descriptor.exg_rows.iter().map(|ch| format!("EXG Channel {ch}")));
    headers.extend(
        descriptor
            .accel_rows
            .iter()
            .map(|ch| format!("Accel Channel {ch}")),
    );
    let padding = descriptor
        .row_width
        .saturating_sub(3 + descriptor.exg_rows.len() + descriptor.accel_rows.len()
            + descriptor.analog_rows.len());
    headers.extend(std::iter::repeat_with(|| "Other".to_owned()).take(padding));
    headers.extend(
        descriptor
            .analog_rows
            .iter()
            .map(|ch| format!("Analog Channel {ch}")),
    );
    headers.push("Timestamp".to_owned());
    headers.push("Other".to_owned());
    headers
}

/// Sequential reader over a recorded session file.
pub struct RecordingReader {
    path: PathBuf,
    reader: csv::Reader<File>,
    board: BoardKind,
    row_width: usize,
    exhausted: bool,
}

impl RecordingReader {
    pub fn open(path: &Path) -> Result<Self, StreamError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)?;
        let mut record = csv::StringRecord::new();
        if !reader.read_record(&mut record)? {
            return Err(StreamError::MissingBoardIdentity);
        }
        let id: i32 = record
            .get(0)
            .and_then(|field| field.trim().parse().ok())
            .ok_or(StreamError::MissingBoardIdentity)?;
        let board = BoardKind::from_id(id)?;
        // Column header row; a recording with no data rows is just exhausted.
        let exhausted = !reader.read_record(&mut record)?;
        Ok(Self {
            path: path.to_owned(),
            reader,
            board,
            row_width: board.descriptor().row_width,
            exhausted,
        })
    }

    pub fn board_kind(&self) -> BoardKind {
        self.board
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Reads up to `max_rows` sample rows. A short (or empty) result means
    /// the recording ran out; a row that does not parse as numbers, or whose
    /// field count does not match the board layout, ends the data the same
    /// way instead of raising.
    pub fn read_rows(&mut self, max_rows: usize) -> Result<Vec<Vec<f64>>, StreamError> {
        let mut rows = Vec::with_capacity(max_rows.min(1024));
        if self.exhausted {
            return Ok(rows);
        }
        let mut record = csv::StringRecord::new();
        for _ in 0..max_rows {
            match self.reader.read_record(&mut record) {
                Ok(true) => {}
                Ok(false) => {
                    self.exhausted = true;
                    break;
                }
                Err(err) => {
                    log::warn!("recording read failed, treating as end of data: {err}");
                    self.exhausted = true;
                    break;
                }
            }
            let parsed: Option<Vec<f64>> = record
                .iter()
                .map(|field| field.trim().parse::<f64>().ok())
                .collect();
            match parsed {
                Some(row) if row.len() == self.row_width => rows.push(row),
                Some(row) => {
                    log::warn!(
                        "row with {} fields in a {}-column recording, treating as end of data",
                        row.len(),
                        self.row_width
                    );
                    self.exhausted = true;
                    break;
                }
                None => {
                    self.exhausted = true;
                    break;
                }
            }
        }
        Ok(rows)
    }

    /// Reopens the file from the top so playback can restart.
    pub fn rewind(&mut self) -> Result<(), StreamError> {
        *self = Self::open(&self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_session_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "exgscope_recording_{tag}_{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn sample_rows(descriptor: &BoardDescriptor, count: usize) -> Vec<Vec<f64>> {
        (0..count)
            .map(|i| {
                (0..descriptor.row_width)
                    .map(|col| (i * 100 + col) as f64)
                    .collect()
            })
            .collect()
    }

    #[test]
    fn written_rows_come_back_in_order() {
        let dir = temp_session_dir("roundtrip");
        let descriptor = BoardKind::CytonDaisy.descriptor();
        let rows = sample_rows(&descriptor, 5);

        let mut writer = RecordingWriter::create(&dir, &descriptor).unwrap();
        writer.append(&rows[..2]).unwrap();
        writer.append(&rows[2..]).unwrap();
        writer.finish().unwrap();

        let mut reader = RecordingReader::open(&dir.join("1.csv")).unwrap();
        assert_eq!(reader.board_kind(), BoardKind::CytonDaisy);
        let first = reader.read_rows(3).unwrap();
        assert_eq!(first, rows[..3].to_vec());
        let rest = reader.read_rows(10).unwrap();
        assert_eq!(rest, rows[3..].to_vec());
        assert!(reader.is_exhausted());
        assert!(reader.read_rows(10).unwrap().is_empty());
    }

    #[test]
    fn rewind_restarts_from_the_top() {
        let dir = temp_session_dir("rewind");
        let descriptor = BoardKind::Cyton.descriptor();
        let rows = sample_rows(&descriptor, 3);
        let mut writer = RecordingWriter::create(&dir, &descriptor).unwrap();
        writer.append(&rows).unwrap();
        writer.finish().unwrap();

        let mut reader = RecordingReader::open(&dir.join("1.csv")).unwrap();
        let pass_one = reader.read_rows(usize::MAX).unwrap();
        reader.rewind().unwrap();
        let pass_two = reader.read_rows(usize::MAX).unwrap();
        assert_eq!(pass_one, pass_two);
    }

    #[test]
    fn malformed_row_ends_the_data() {
        let dir = temp_session_dir("malformed");
        let descriptor = BoardKind::Cyton.descriptor();
        let mut writer = RecordingWriter::create(&dir, &descriptor).unwrap();
        writer.append(&sample_rows(&descriptor, 2)).unwrap();
        writer.finish().unwrap();
        let path = dir.join("1.csv");
        let mut file = fs::OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "not,a,number").unwrap();
        drop(file);

        let mut reader = RecordingReader::open(&path).unwrap();
        let rows = reader.read_rows(10).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(reader.is_exhausted());
    }

    #[test]
    fn truncated_numeric_row_ends_the_data() {
        let dir = temp_session_dir("truncated");
        let descriptor = BoardKind::CytonDaisy.descriptor();
        let rows = sample_rows(&descriptor, 10);
        let mut writer = RecordingWriter::create(&dir, &descriptor).unwrap();
        writer.append(&rows).unwrap();
        writer.finish().unwrap();
        let path = dir.join("1.csv");
        let mut file = fs::OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "1.0,2.0,3.0").unwrap();
        drop(file);

        let mut reader = RecordingReader::open(&path).unwrap();
        let read = reader.read_rows(usize::MAX).unwrap();
        assert_eq!(read, rows);
        assert!(reader.is_exhausted());
        assert!(reader.read_rows(10).unwrap().is_empty());
    }

    #[test]
    fn record_files_are_numbered() {
        let dir = temp_session_dir("numbered");
        let descriptor = BoardKind::Cyton.descriptor();
        let first = RecordingWriter::create(&dir, &descriptor).unwrap();
        assert!(first.path().ends_with("1.csv"));
        let second = RecordingWriter::create(&dir, &descriptor).unwrap();
        assert!(second.path().ends_with("2.csv"));
    }

    #[test]
    fn metadata_is_optional() {
        let dir = temp_session_dir("metadata");
        assert!(load_metadata(&dir).unwrap().is_none());
        let metadata = SessionMetadata {
            name: "Ada".to_owned(),
            surname: "Lovelace".to_owned(),
            description: "baseline run".to_owned(),
        };
        save_metadata(&dir, &metadata).unwrap();
        assert_eq!(load_metadata(&dir).unwrap(), Some(metadata));
    }

    #[test]
    fn missing_identity_row_is_rejected() {
        let dir = temp_session_dir("no_identity");
        let path = dir.join("broken.csv");
        fs::write(&path, "garbage,header\n").unwrap();
        assert!(matches!(
            RecordingReader::open(&path),
            Err(StreamError::MissingBoardIdentity)
        ));
    }
}
