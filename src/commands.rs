use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};

use crate::board::{impedance_command, power_command};

/// Hardware configuration requests. These mutate device state but return no
/// data the pipeline consumes, so they run off the tick path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BoardCommand {
    ToggleImpedance { channel: usize, enable: bool },
    SetChannelPower { channel: usize, enable: bool },
}

impl BoardCommand {
    pub fn wire_string(&self) -> Option<String> {
        match *self {
            BoardCommand::ToggleImpedance { channel, enable } => {
                impedance_command(channel, enable)
            }
            BoardCommand::SetChannelPower { channel, enable } => power_command(channel, enable),
        }
    }
}

/// Sink for rendered command strings, typically backed by the board driver.
pub trait CommandPort: Send {
    fn dispatch(&mut self, command: &str) -> anyhow::Result<()>;
}

/// Worker thread that forwards commands to a port so a slow or failing
/// device never stalls the tick loop. Failures are logged, not surfaced.
pub struct CommandDispatcher {
    tx: Option<Sender<BoardCommand>>,
    worker: Option<JoinHandle<()>>,
}

impl CommandDispatcher {
    pub fn spawn<P: CommandPort + 'static>(mut port: P) -> Self {
        let (tx, rx) = mpsc::channel::<BoardCommand>();
        let worker = thread::spawn(move || {
            while let Ok(command) = rx.recv() {
                let Some(wire) = command.wire_string() else {
                    log::warn!("dropping command for out-of-range channel: {command:?}");
                    continue;
                };
                if let Err(err) = port.dispatch(&wire) {
                    log::warn!("board command {command:?} failed: {err}");
                }
            }
        });
        Self {
            tx: Some(tx),
            worker: Some(worker),
        }
    }

    /// Fire and forget.
    pub fn send(&self, command: BoardCommand) {
        if let Some(tx) = &self.tx {
            if tx.send(command).is_err() {
                log::warn!("command worker has shut down");
            }
        }
    }
}

impl Drop for CommandDispatcher {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop.
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
