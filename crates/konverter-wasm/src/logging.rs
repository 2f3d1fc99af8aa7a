//! Routes `tracing` output to the browser console.
//!
//! `wasm32-unknown-unknown` has no stdout and no wall clock, so the fmt
//! subscriber is built without timestamps and with a writer that buffers one
//! formatted event and hands it to `console.{debug,log,warn,error}` on drop.

use std::io;

use tracing::{Level, Metadata};
use tracing_subscriber::fmt::MakeWriter;
use wasm_bindgen::JsValue;

/// Console method matching an event level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleMethod {
    Debug,
    Log,
    Warn,
    Error,
}

impl ConsoleMethod {
    pub fn for_level(level: &Level) -> Self {
        match *level {
            Level::ERROR => ConsoleMethod::Error,
            Level::WARN => ConsoleMethod::Warn,
            Level::INFO => ConsoleMethod::Log,
            _ => ConsoleMethod::Debug,
        }
    }

    fn emit(self, line: &str) {
        let value = JsValue::from_str(line);
        match self {
            ConsoleMethod::Debug => web_sys::console::debug_1(&value),
            ConsoleMethod::Log => web_sys::console::log_1(&value),
            ConsoleMethod::Warn => web_sys::console::warn_1(&value),
            ConsoleMethod::Error => web_sys::console::error_1(&value),
        }
    }
}

/// Buffers one formatted event.
pub struct ConsoleWriter {
    method: ConsoleMethod,
    buffer: Vec<u8>,
}

impl io::Write for ConsoleWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for ConsoleWriter {
    fn drop(&mut self) {
        let line = String::from_utf8_lossy(&self.buffer);
        let line = line.trim_end();
        if !line.is_empty() {
            self.method.emit(line);
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MakeConsoleWriter;

impl<'a> MakeWriter<'a> for MakeConsoleWriter {
    type Writer = ConsoleWriter;

    fn make_writer(&'a self) -> Self::Writer {
        ConsoleWriter {
            method: ConsoleMethod::Log,
            buffer: Vec::new(),
        }
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        ConsoleWriter {
            method: ConsoleMethod::for_level(meta.level()),
            buffer: Vec::new(),
        }
    }
}

/// Install the console subscriber. Later calls are no-ops.
pub fn install(max_level: Level) {
    let result = tracing_subscriber::fmt()
        .with_max_level(max_level)
        .without_time()
        .with_ansi(false)
        .with_target(false)
        .with_writer(MakeConsoleWriter)
        .compact()
        .try_init();
    if result.is_ok() {
        tracing::debug!(%max_level, "Console logging installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_mapping() {
        assert_eq!(ConsoleMethod::for_level(&Level::ERROR), ConsoleMethod::Error);
        assert_eq!(ConsoleMethod::for_level(&Level::WARN), ConsoleMethod::Warn);
        assert_eq!(ConsoleMethod::for_level(&Level::INFO), ConsoleMethod::Log);
        assert_eq!(ConsoleMethod::for_level(&Level::DEBUG), ConsoleMethod::Debug);
        assert_eq!(ConsoleMethod::for_level(&Level::TRACE), ConsoleMethod::Debug);
    }
}
