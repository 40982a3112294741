use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};

use drawbot::sink::{SerialConnector, SerialLink, SerialSettings};

/// How the fake board answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardMode {
    /// Echo the command, then "ok".
    Ack,
    /// Echo the command, never acknowledge.
    Dropped,
    /// Acknowledge the first `n` commands, then behave like `Dropped`.
    DropAfter(usize),
    /// Refuse to open.
    Unplugged,
}

#[derive(Debug, Default)]
struct BoardState {
    opened: usize,
    sent: Vec<String>,
    replies: VecDeque<String>,
}

/// A scripted controller board. Clones share state.
#[derive(Debug, Clone)]
pub struct FakeBoard {
    mode: BoardMode,
    state: Arc<Mutex<BoardState>>,
}

impl FakeBoard {
    pub fn new(mode: BoardMode) -> Self {
        Self {
            mode,
            state: Arc::new(Mutex::new(BoardState::default())),
        }
    }

    /// How many times a connection was opened.
    pub fn opened(&self) -> usize {
        self.state.lock().unwrap().opened
    }

    /// Command lines received, without the trailing newline.
    pub fn sent(&self) -> Vec<String> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn connector(&self) -> Box<dyn SerialConnector> {
        Box::new(self.clone())
    }
}

impl SerialConnector for FakeBoard {
    fn open(&self, _settings: &SerialSettings) -> io::Result<Box<dyn SerialLink>> {
        if self.mode == BoardMode::Unplugged {
            return Err(io::Error::new(io::ErrorKind::NotFound, "no such device"));
        }
        self.state.lock().unwrap().opened += 1;
        Ok(Box::new(FakeLink {
            mode: self.mode,
            state: Arc::clone(&self.state),
        }))
    }
}

struct FakeLink {
    mode: BoardMode,
    state: Arc<Mutex<BoardState>>,
}

impl SerialLink for FakeLink {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        let line = String::from_utf8_lossy(bytes).trim_end().to_string();
        let mut state = self.state.lock().unwrap();
        state.sent.push(line.clone());
        state.replies.push_back(format!("{line}\n"));

        let acks = match self.mode {
            BoardMode::Ack => true,
            BoardMode::DropAfter(n) => state.sent.len() <= n,
            BoardMode::Dropped | BoardMode::Unplugged => false,
        };
        if acks {
            state.replies.push_back("ok\n".to_string());
        }
        Ok(())
    }

    fn read_line(&mut self) -> io::Result<String> {
        Ok(self.state.lock().unwrap().replies.pop_front().unwrap_or_default())
    }
}
