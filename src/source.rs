use std::path::Path;

use crate::board::{BoardDescriptor, BoardDriver, BoardKind};
use crate::error::StreamError;
use crate::recording::{load_metadata, RecordingReader, RecordingWriter, SessionMetadata};

/// Something the pipeline can pull sample rows from: a streaming board or a
/// recorded session. `start`/`stop` are idempotent; `read` never blocks and
/// may legitimately return nothing.
pub trait DataSource {
    fn start(&mut self) -> Result<(), StreamError>;
    fn stop(&mut self) -> Result<(), StreamError>;
    /// Up to `samples` new rows, in acquisition order.
    fn read(&mut self, samples: usize) -> Result<Vec<Vec<f64>>, StreamError>;
    fn is_streaming(&self) -> bool;
    /// True only when a recording has been fully replayed.
    fn is_finished(&self) -> bool;
    fn descriptor(&self) -> &BoardDescriptor;
    /// Restart from the beginning; only playback sources support this.
    fn rewind(&mut self) -> Result<(), StreamError> {
        Err(StreamError::RewindUnsupported)
    }
}

/// Live acquisition through a board driver. Every batch handed out by
/// `read` is appended to this session's record file, in the same order and
/// exactly once; the file is closed on `stop`.
pub struct LiveSource<D: BoardDriver> {
    driver: D,
    descriptor: BoardDescriptor,
    recorder: Option<RecordingWriter>,
    streaming: bool,
}

impl<D: BoardDriver> LiveSource<D> {
    pub fn new(driver: D, kind: BoardKind, session_dir: &Path) -> Result<Self, StreamError> {
        let descriptor = kind.descriptor();
        let recorder = RecordingWriter::create(session_dir, &descriptor)?;
        Ok(Self {
            driver,
            descriptor,
            recorder: Some(recorder),
            streaming: false,
        })
    }

    pub fn record_path(&self) -> Option<&Path> {
        self.recorder.as_ref().map(RecordingWriter::path)
    }
}

impl<D: BoardDriver> DataSource for LiveSource<D> {
    fn start(&mut self) -> Result<(), StreamError> {
        if !self.streaming {
            self.driver.start_stream()?;
            self.streaming = true;
            log::info!("live stream started ({:?})", self.descriptor.kind);
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), StreamError> {
        if self.streaming {
            if let Err(err) = self.driver.stop_stream() {
                log::warn!("failed to stop board stream: {err}");
            }
            self.streaming = false;
        }
        if let Some(mut recorder) = self.recorder.take() {
            recorder.finish()?;
            log::info!("session record closed: {}", recorder.path().display());
        }
        Ok(())
    }

    fn read(&mut self, samples: usize) -> Result<Vec<Vec<f64>>, StreamError> {
        if !self.streaming || samples == 0 {
            return Ok(Vec::new());
        }
        // Driver hiccups are transient: log and report an empty batch.
        let mut rows = match self.driver.read_current(samples) {
            Ok(rows) => rows,
            Err(err) => {
                log::warn!("board read failed, skipping tick: {err}");
                return Ok(Vec::new());
            }
        };
        // Drivers are asked for `samples` rows but not trusted to stop there.
        rows.truncate(samples);
        if !rows.is_empty() {
            if let Some(recorder) = self.recorder.as_mut() {
                recorder.append(&rows)?;
            }
        }
        Ok(rows)
    }

    fn is_streaming(&self) -> bool {
        self.streaming
    }

    fn is_finished(&self) -> bool {
        false
    }

    fn descriptor(&self) -> &BoardDescriptor {
        &self.descriptor
    }
}

/// Replays a recorded session row by row, bounded by the end of the file.
pub struct PlaybackSource {
    reader: RecordingReader,
    descriptor: BoardDescriptor,
    metadata: Option<SessionMetadata>,
    streaming: bool,
}

impl PlaybackSource {
    pub fn open(path: &Path) -> Result<Self, StreamError> {
        let reader = RecordingReader::open(path)?;
        let descriptor = reader.board_kind().descriptor();
        let metadata = match path.parent() {
            Some(dir) => load_metadata(dir)?,
            None => None,
        };
        Ok(Self {
            reader,
            descriptor,
            metadata,
            streaming: false,
        })
    }

    pub fn metadata(&self) -> Option<&SessionMetadata> {
        self.metadata.as_ref()
    }
}

impl DataSource for PlaybackSource {
    fn start(&mut self) -> Result<(), StreamError> {
        self.streaming = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), StreamError> {
        self.streaming = false;
        Ok(())
    }

    fn read(&mut self, samples: usize) -> Result<Vec<Vec<f64>>, StreamError> {
        if !self.streaming || samples == 0 {
            return Ok(Vec::new());
        }
        self.reader.read_rows(samples)
    }

    fn is_streaming(&self) -> bool {
        self.streaming
    }

    fn is_finished(&self) -> bool {
        self.reader.is_exhausted()
    }

    fn descriptor(&self) -> &BoardDescriptor {
        &self.descriptor
    }

    fn rewind(&mut self) -> Result<(), StreamError> {
        self.reader.rewind()
    }
}

/// In-memory source for tests and deterministic feeds.
pub struct ManualSource {
    descriptor: BoardDescriptor,
    rows: Vec<Vec<f64>>,
    cursor: usize,
    streaming: bool,
}

impl ManualSource {
    pub fn new(kind: BoardKind, rows: Vec<Vec<f64>>) -> Self {
        Self {
            descriptor: kind.descriptor(),
            rows,
            cursor: 0,
            streaming: false,
        }
    }
}

impl DataSource for ManualSource {
    fn start(&mut self) -> Result<(), StreamError> {
        self.streaming = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), StreamError> {
        self.streaming = false;
        Ok(())
    }

    fn read(&mut self, samples: usize) -> Result<Vec<Vec<f64>>, StreamError> {
        if !self.streaming {
            return Ok(Vec::new());
        }
        let end = (self.cursor + samples).min(self.rows.len());
        let batch = self.rows[self.cursor..end].to_vec();
        self.cursor = end;
        Ok(batch)
    }

    fn is_streaming(&self) -> bool {
        self.streaming
    }

    fn is_finished(&self) -> bool {
        self.cursor >= self.rows.len()
    }

    fn descriptor(&self) -> &BoardDescriptor {
        &self.descriptor
    }

    fn rewind(&mut self) -> Result<(), StreamError> {
        self.cursor = 0;
        Ok(())
    }
}
