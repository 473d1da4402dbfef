//! Console output for notices.

use std::io::Write;
use std::sync::Mutex;

use tracing::warn;

use crate::application::notify::{Notice, NoticeListener};

/// Prints each notice on its own line(s) to a writer (stdout by default).
pub struct ConsoleNoticeListener<W: Write + Send = std::io::Stdout> {
    out: Mutex<W>,
}

impl ConsoleNoticeListener {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> ConsoleNoticeListener<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    /// Returns the writer, e.g. to inspect a buffer in tests.
    pub fn into_inner(self) -> W {
        self.out
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl<W: Write + Send> NoticeListener for ConsoleNoticeListener<W> {
    fn on_notice(&self, notice: &Notice) {
        let mut out = self
            .out
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Err(e) = writeln!(out, "{notice}").and_then(|()| out.flush()) {
            warn!("console write failed: {e}");
        }
    }
}
