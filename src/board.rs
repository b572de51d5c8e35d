use std::collections::BTreeMap;

use anyhow::Result;
use once_cell::sync::Lazy;

use crate::error::StreamError;

/// Supported amplifier boards. The numeric ids match the identity code
/// written as the first row of every recorded session file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoardKind {
    Cyton,
    Ganglion,
    CytonDaisy,
    GanglionWifi,
    CytonWifi,
    CytonDaisyWifi,
}

impl BoardKind {
    pub fn id(self) -> i32 {
        match self {
            BoardKind::Cyton => 0,
            BoardKind::Ganglion => 1,
            BoardKind::CytonDaisy => 2,
            BoardKind::GanglionWifi => 4,
            BoardKind::CytonWifi => 5,
            BoardKind::CytonDaisyWifi => 6,
        }
    }

    pub fn from_id(id: i32) -> Result<Self, StreamError> {
        match id {
            0 => Ok(BoardKind::Cyton),
            1 => Ok(BoardKind::Ganglion),
            2 => Ok(BoardKind::CytonDaisy),
            4 => Ok(BoardKind::GanglionWifi),
            5 => Ok(BoardKind::CytonWifi),
            6 => Ok(BoardKind::CytonDaisyWifi),
            other => Err(StreamError::UnknownBoard(other)),
        }
    }

    pub fn descriptor(self) -> BoardDescriptor {
        match self {
            BoardKind::Cyton | BoardKind::CytonWifi => BoardDescriptor::eight_channel(self),
            BoardKind::CytonDaisy | BoardKind::CytonDaisyWifi => {
                BoardDescriptor::sixteen_channel(self)
            }
            BoardKind::Ganglion | BoardKind::GanglionWifi => BoardDescriptor::ganglion(self),
        }
    }
}

/// Display name -> board kind, mirroring the board chooser entries.
pub static BOARD_NAMES: Lazy<BTreeMap<&'static str, BoardKind>> = Lazy::new(|| {
    BTreeMap::from([
        ("CYTON BOARD [8CH]", BoardKind::Cyton),
        ("CYTON WIFI BOARD [8CH]", BoardKind::CytonWifi),
        ("CYTON DAISY BOARD [16CH]", BoardKind::CytonDaisy),
        ("CYTON DAISY WIFI BOARD [16CH]", BoardKind::CytonDaisyWifi),
        ("GANGLION BOARD", BoardKind::Ganglion),
        ("GANGLION WIFI BOARD", BoardKind::GanglionWifi),
    ])
});

/// Fixed per-board layout: which row of a sample carries what.
/// Obtained once at session start and immutable afterwards.
#[derive(Clone, Debug)]
pub struct BoardDescriptor {
    pub kind: BoardKind,
    pub sampling_rate: f64,
    /// Total values per sample row in the stream and in recordings.
    pub row_width: usize,
    pub packet_row: usize,
    /// Row indices of the EXG (bioelectric) channels, in channel order.
    pub exg_rows: Vec<usize>,
    /// Positions inside `exg_rows` reserved for cardiac display.
    pub ecg_positions: Vec<usize>,
    pub accel_rows: Vec<usize>,
    pub analog_rows: Vec<usize>,
    pub timestamp_row: usize,
}

impl BoardDescriptor {
    fn eight_channel(kind: BoardKind) -> Self {
        Self {
            kind,
            sampling_rate: 250.0,
            row_width: 24,
            packet_row: 0,
            exg_rows: (1..=8).collect(),
            ecg_positions: Vec::new(),
            accel_rows: (9..=11).collect(),
            analog_rows: (19..=21).collect(),
            timestamp_row: 22,
        }
    }

    fn sixteen_channel(kind: BoardKind) -> Self {
        Self {
            kind,
            sampling_rate: 125.0,
            row_width: 32,
            packet_row: 0,
            exg_rows: (1..=16).collect(),
            // EXG channels 9-11 drive the cardiac plots on 16-channel setups.
            ecg_positions: vec![8, 9, 10],
            accel_rows: (17..=19).collect(),
            analog_rows: (27..=29).collect(),
            timestamp_row: 30,
        }
    }

    fn ganglion(kind: BoardKind) -> Self {
        Self {
            kind,
            sampling_rate: 200.0,
            row_width: 15,
            packet_row: 0,
            exg_rows: (1..=4).collect(),
            ecg_positions: Vec::new(),
            accel_rows: (5..=7).collect(),
            analog_rows: Vec::new(),
            timestamp_row: 13,
        }
    }

    pub fn channel_count(&self) -> usize {
        self.exg_rows.len()
    }

    pub fn is_ecg_position(&self, position: usize) -> bool {
        self.ecg_positions.contains(&position)
    }
}

/// Cyton channel select codes, first 8 on the main board, last 8 on the daisy.
const CHANNEL_CODES: [char; 16] = [
    '1', '2', '3', '4', '5', '6', '7', '8', 'Q', 'W', 'E', 'R', 'T', 'Y', 'U', 'I',
];
const CHANNEL_ON_CODES: [char; 16] = [
    '!', '@', '#', '$', '%', '^', '&', '*', 'Q', 'W', 'E', 'R', 'T', 'Y', 'U', 'I',
];
const CHANNEL_OFF_CODES: [char; 16] = [
    '1', '2', '3', '4', '5', '6', '7', '8', 'q', 'w', 'e', 'r', 't', 'y', 'u', 'i',
];

/// Wire command toggling the impedance-check drive signal on one channel.
pub fn impedance_command(channel: usize, enable: bool) -> Option<String> {
    let code = CHANNEL_CODES.get(channel)?;
    let flag = if enable { '1' } else { '0' };
    Some(format!("z{code}{flag}{flag}Z"))
}

/// Wire command powering one acquisition channel on or off.
pub fn power_command(channel: usize, enable: bool) -> Option<String> {
    let table = if enable {
        &CHANNEL_ON_CODES
    } else {
        &CHANNEL_OFF_CODES
    };
    table.get(channel).map(|code| code.to_string())
}

/// Capability boundary to the physical amplifier. The real protocol stack
/// lives behind this trait; errors out of it are opaque to the pipeline.
pub trait BoardDriver {
    fn start_stream(&mut self) -> Result<()>;
    fn stop_stream(&mut self) -> Result<()>;
    /// Returns whatever rows the driver has buffered, up to `max_rows`.
    /// Non-blocking; an empty batch is a normal answer.
    fn read_current(&mut self, max_rows: usize) -> Result<Vec<Vec<f64>>>;
    fn send_command(&mut self, command: &str) -> Result<()>;
}
