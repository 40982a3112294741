// src/sink/hardware.rs

//! Serial sink driving the physical controller board.
//!
//! The board answers every command with one or more lines, the last of which
//! contains the acknowledgement token (`"ok"`). An empty read means the read
//! timed out and the device is considered dropped.
//!
//! Serial access goes through [`SerialConnector`] / [`SerialLink`] so tests
//! can script the board's replies; production uses [`SerialPortConnector`].

use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, error, info, trace, warn};

use crate::command::Command;
use crate::config::SerialSection;
use crate::errors::{DrawbotError, Result};

use super::guard::ExclusiveAccessGuard;
use super::OutputSink;

/// Everything needed to open and talk to the board.
#[derive(Debug, Clone, PartialEq)]
pub struct SerialSettings {
    pub port: String,
    pub baud: u32,
    pub timeout: Duration,
    pub lock_path: PathBuf,
    pub ack_token: String,
}

impl From<&SerialSection> for SerialSettings {
    fn from(s: &SerialSection) -> Self {
        Self {
            port: s.port.clone(),
            baud: s.baud,
            timeout: s.timeout(),
            lock_path: s.lock_path.clone(),
            ack_token: s.ack_token.clone(),
        }
    }
}

/// An open, line-oriented serial connection.
pub trait SerialLink: Send {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Read one line including its terminator. An empty string means the
    /// read timed out with nothing received.
    fn read_line(&mut self) -> io::Result<String>;

    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Opens serial links.
pub trait SerialConnector: Send + Sync {
    fn open(&self, settings: &SerialSettings) -> io::Result<Box<dyn SerialLink>>;
}

/// Real serial ports via the `serialport` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialPortConnector;

impl SerialConnector for SerialPortConnector {
    fn open(&self, settings: &SerialSettings) -> io::Result<Box<dyn SerialLink>> {
        let port = serialport::new(&settings.port, settings.baud)
            .timeout(settings.timeout)
            .open()
            .map_err(io::Error::from)?;
        Ok(Box::new(PortLink {
            reader: BufReader::new(port),
        }))
    }
}

struct PortLink {
    reader: BufReader<Box<dyn serialport::SerialPort>>,
}

impl SerialLink for PortLink {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        let port = self.reader.get_mut();
        port.write_all(bytes)?;
        port.flush()
    }

    fn read_line(&mut self) -> io::Result<String> {
        let mut buf = Vec::new();
        match self.reader.read_until(b'\n', &mut buf) {
            Ok(_) => {}
            // Whatever arrived before the timeout is the line.
            Err(e) if e.kind() == io::ErrorKind::TimedOut => {}
            Err(e) => return Err(e),
        }
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

/// Sink that streams commands to the board.
pub struct HardwareSink {
    settings: SerialSettings,
    connector: Box<dyn SerialConnector>,
    link: Option<Box<dyn SerialLink>>,
    guard: Option<ExclusiveAccessGuard>,
}

impl std::fmt::Debug for HardwareSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HardwareSink")
            .field("settings", &self.settings)
            .field("connected", &self.link.is_some())
            .field("locked", &self.guard.is_some())
            .finish()
    }
}

impl HardwareSink {
    pub fn new(settings: SerialSettings) -> Self {
        Self::with_connector(settings, Box::new(SerialPortConnector))
    }

    pub fn with_connector(settings: SerialSettings, connector: Box<dyn SerialConnector>) -> Self {
        Self {
            settings,
            connector,
            link: None,
            guard: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    pub fn holds_lock(&self) -> bool {
        self.guard.as_ref().is_some_and(ExclusiveAccessGuard::is_held)
    }

    fn close_link(&mut self) {
        if let Some(mut link) = self.link.take() {
            debug!(port = %self.settings.port, "closing serial");
            if let Err(e) = link.close() {
                warn!(port = %self.settings.port, error = %e, "closing serial failed");
            }
        }
    }

    fn read_response(&mut self, command: &Command) -> Result<String> {
        let mut all_lines = String::new();
        loop {
            let line = match self.link.as_mut() {
                Some(link) => link
                    .read_line()
                    .map_err(|e| DrawbotError::SinkIo(format!("serial read: {e}")))?,
                None => {
                    return Err(DrawbotError::SinkIo(
                        "serial connection closed while reading".to_string(),
                    ));
                }
            };

            if line.is_empty() {
                error!(port = %self.settings.port, command = %command, "timeout on serial read");
                self.close_link();
                return Err(DrawbotError::DeviceTimeout {
                    command: command.text().to_string(),
                });
            }

            trace!("<- {}", line.trim_end());
            all_lines.push_str(&line);
            if line.contains(&self.settings.ack_token) {
                return Ok(all_lines);
            }
        }
    }
}

impl OutputSink for HardwareSink {
    fn name(&self) -> &str {
        "hardware"
    }

    fn start_block(&mut self) -> Result<()> {
        let guard = ExclusiveAccessGuard::acquire(&self.settings.lock_path)?;

        match self.connector.open(&self.settings) {
            Ok(link) => {
                info!(
                    port = %self.settings.port,
                    baud = self.settings.baud,
                    "serial connection opened"
                );
                self.link = Some(link);
                self.guard = Some(guard);
                Ok(())
            }
            Err(source) => {
                // `guard` is dropped here, releasing the lock before the
                // error reaches the caller.
                error!(port = %self.settings.port, error = %source, "robot not connected?");
                drop(guard);
                Err(DrawbotError::SerialOpen {
                    port: self.settings.port.clone(),
                    source,
                })
            }
        }
    }

    fn write_command(&mut self, command: &Command) -> Result<String> {
        let link = self.link.as_mut().ok_or_else(|| {
            DrawbotError::SinkIo("serial connection is not open".to_string())
        })?;

        trace!("-> {}", command);
        let mut bytes = command.text().as_bytes().to_vec();
        bytes.push(b'\n');
        link.write_all(&bytes)
            .map_err(|e| DrawbotError::SinkIo(format!("serial write: {e}")))?;

        self.read_response(command)
    }

    fn finish_block(&mut self) -> Result<()> {
        self.close_link();
        if let Some(mut guard) = self.guard.take() {
            guard.release();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    struct Scripted {
        replies: Arc<Mutex<VecDeque<String>>>,
        sent: Arc<Mutex<Vec<String>>>,
    }

    impl SerialLink for Scripted {
        fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push(String::from_utf8_lossy(bytes).into_owned());
            Ok(())
        }

        fn read_line(&mut self) -> io::Result<String> {
            Ok(self.replies.lock().unwrap().pop_front().unwrap_or_default())
        }
    }

    struct ScriptedConnector {
        replies: Arc<Mutex<VecDeque<String>>>,
        sent: Arc<Mutex<Vec<String>>>,
    }

    impl SerialConnector for ScriptedConnector {
        fn open(&self, _: &SerialSettings) -> io::Result<Box<dyn SerialLink>> {
            Ok(Box::new(Scripted {
                replies: self.replies.clone(),
                sent: self.sent.clone(),
            }))
        }
    }

    fn settings(dir: &tempfile::TempDir) -> SerialSettings {
        SerialSettings {
            port: "/dev/null-bot".to_string(),
            baud: 57600,
            timeout: Duration::from_millis(10),
            lock_path: dir.path().join("bot.lock"),
            ack_token: "ok".to_string(),
        }
    }

    #[test]
    fn collects_lines_until_ack() {
        let dir = tempfile::tempdir().unwrap();
        let replies = Arc::new(Mutex::new(VecDeque::from(vec![
            "moving\n".to_string(),
            "ok\n".to_string(),
        ])));
        let sent = Arc::new(Mutex::new(Vec::new()));
        let mut sink = HardwareSink::with_connector(
            settings(&dir),
            Box::new(ScriptedConnector {
                replies,
                sent: sent.clone(),
            }),
        );

        sink.start_block().unwrap();
        assert!(sink.holds_lock());
        let ack = sink.write_command(&Command::parse("g1,2")).unwrap();
        assert_eq!(ack, "moving\nok\n");
        assert_eq!(*sent.lock().unwrap(), vec!["g1,2\n".to_string()]);

        sink.finish_block().unwrap();
        assert!(!sink.holds_lock());
        assert!(!sink.is_connected());
    }

    #[test]
    fn empty_read_is_a_device_timeout_and_closes_link() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = HardwareSink::with_connector(
            settings(&dir),
            Box::new(ScriptedConnector {
                replies: Arc::new(Mutex::new(VecDeque::from(vec!["busy\n".to_string()]))),
                sent: Arc::new(Mutex::new(Vec::new())),
            }),
        );

        sink.start_block().unwrap();
        let err = sink.write_command(&Command::parse("d1")).unwrap_err();
        assert!(matches!(err, DrawbotError::DeviceTimeout { ref command } if command == "d1"));
        assert!(!sink.is_connected());
        // Still locked until finish_block.
        assert!(sink.holds_lock());

        assert!(matches!(
            sink.write_command(&Command::pen_up()),
            Err(DrawbotError::SinkIo(_))
        ));
        sink.finish_block().unwrap();
        assert!(!sink.holds_lock());
    }

    #[test]
    fn finish_without_start_is_harmless() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = HardwareSink::new(settings(&dir));
        sink.finish_block().unwrap();
        sink.finish_block().unwrap();
    }
}
