//! Console endpoint over the board UART.
//!
//! The UART receive interrupt hands bytes to a queue; this type assembles
//! them into lines for the interpreter and single keys for the interactive
//! menus, and serializes every writer onto the transmit side so a logical
//! message is never interleaved with another task's output.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{mpsc, Mutex};

/// Maximum accepted line length, matching the UART receive buffer.
pub const LINE_CAPACITY: usize = 128;

/// Sink for console output.
pub trait ConsoleOutput: Send {
    fn write(&mut self, text: &str);
}

/// Writes console output to the process stdout.
pub struct StdoutSink;

impl ConsoleOutput for StdoutSink {
    fn write(&mut self, text: &str) {
        use std::io::Write;
        let mut stdout = std::io::stdout();
        let _ = stdout.write_all(text.as_bytes());
        let _ = stdout.flush();
    }
}

/// Captures console output in memory; used by tests and the session log.
#[derive(Clone, Default)]
pub struct CaptureSink {
    buf: Arc<StdMutex<String>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns everything written so far.
    pub fn contents(&self) -> String {
        self.buf.lock().unwrap().clone()
    }

    /// Returns and clears everything written so far.
    pub fn take(&self) -> String {
        std::mem::take(&mut *self.buf.lock().unwrap())
    }
}

impl ConsoleOutput for CaptureSink {
    fn write(&mut self, text: &str) {
        self.buf.lock().unwrap().push_str(text);
    }
}

/// The console endpoint shared by every task that talks to the user.
pub struct Console {
    rx: Mutex<mpsc::Receiver<u8>>,
    out: StdMutex<Box<dyn ConsoleOutput>>,
    echo: AtomicBool,
    password_mask: AtomicBool,
}

impl Console {
    /// Creates a console over a byte queue and an output sink.
    pub fn new(rx: mpsc::Receiver<u8>, out: Box<dyn ConsoleOutput>) -> Self {
        Console {
            rx: Mutex::new(rx),
            out: StdMutex::new(out),
            echo: AtomicBool::new(true),
            password_mask: AtomicBool::new(false),
        }
    }

    /// Creates a console whose input is fed by the returned sender and whose
    /// output lands in the returned capture sink.
    pub fn piped() -> (Arc<Console>, mpsc::Sender<u8>, CaptureSink) {
        let (tx, rx) = mpsc::channel(LINE_CAPACITY * 4);
        let capture = CaptureSink::new();
        let console = Arc::new(Console::new(rx, Box::new(capture.clone())));
        (console, tx, capture)
    }

    /// Writes one logical message, holding the transmit side throughout.
    pub fn write(&self, text: &str) {
        self.out.lock().unwrap().write(text);
    }

    /// Enables or disables input echo.
    pub fn set_echo(&self, on: bool) {
        self.echo.store(on, Ordering::Relaxed);
    }

    /// While set, echoed input is replaced by a masking character.
    pub fn set_password_mask(&self, on: bool) {
        self.password_mask.store(on, Ordering::Relaxed);
    }

    /// Reads one raw key without echoing it. Returns `None` when the input
    /// side has been closed.
    pub async fn read_key(&self) -> Option<u8> {
        self.rx.lock().await.recv().await
    }

    /// Reads a full input line, echoing per the current echo/mask settings.
    ///
    /// A line ends on CR or LF; input beyond the line capacity is discarded.
    /// Returns `None` when the input side has been closed.
    pub async fn read_line(&self) -> Option<String> {
        let mut rx = self.rx.lock().await;
        let mut line = String::new();
        loop {
            let byte = rx.recv().await?;
            match byte {
                b'\r' | b'\n' => {
                    if self.echo.load(Ordering::Relaxed) {
                        self.write("\n");
                    }
                    return Some(line);
                }
                0x08 | 0x7F => {
                    if line.pop().is_some() && self.echo.load(Ordering::Relaxed) {
                        self.write("\x08 \x08");
                    }
                }
                _ => {
                    if line.len() < LINE_CAPACITY {
                        let ch = byte as char;
                        line.push(ch);
                        if self.echo.load(Ordering::Relaxed) {
                            if self.password_mask.load(Ordering::Relaxed) {
                                self.write("*");
                            } else {
                                self.write(&ch.to_string());
                            }
                        }
                    }
                }
            }
        }
    }
}
