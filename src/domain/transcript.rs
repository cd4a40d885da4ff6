use chrono::{DateTime, Local};
use parking_lot::{Mutex, MutexGuard};

/// One timestamped unit of recognized text from a single model invocation.
/// Immutable after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptEntry {
    timestamp: DateTime<Local>,
    text: String,
}

impl TranscriptEntry {
    pub fn new(timestamp: DateTime<Local>, text: impl Into<String>) -> Self {
        Self {
            timestamp,
            text: text.into(),
        }
    }

    /// Create an entry stamped with the current wall-clock time.
    pub fn now(text: impl Into<String>) -> Self {
        Self::new(Local::now(), text)
    }

    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// The display and persistence format, one line per entry.
    pub fn format_line(&self) -> String {
        format!("{} - {}", self.timestamp.format("%Y-%m-%d %H:%M:%S"), self.text)
    }
}

/// Append-only ordered sequence of transcript entries.
///
/// The display worker is the sole appender while the pipeline runs; the
/// controller reads the log at stop time to persist it. Entry order is
/// production order end-to-end (single producer, single consumer).
#[derive(Debug, Default)]
pub struct TranscriptLog {
    entries: Vec<TranscriptEntry>,
}

impl TranscriptLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: TranscriptEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Formatted lines in entry order, as written to the output file.
    pub fn lines(&self) -> Vec<String> {
        self.entries.iter().map(TranscriptEntry::format_line).collect()
    }
}

/// Mutable view state of the transcript pad.
#[derive(Debug)]
pub struct SurfaceState {
    /// The visible text buffer. The GUI edits this directly when the surface
    /// is editable; edits never flow back into the TranscriptLog.
    pub text: String,
    /// Whether the pad currently accepts user edits.
    pub editable: bool,
    scroll_pending: bool,
}

impl SurfaceState {
    /// Take the pending auto-scroll request, if any. The GUI calls this once
    /// per frame and scrolls to the newest entry when it returns true.
    pub fn take_scroll_request(&mut self) -> bool {
        std::mem::take(&mut self.scroll_pending)
    }
}

/// The visible transcript surface shared between the display worker and the
/// GUI. Starts read-only; `toggle_editable` flips the flag without touching
/// the text, and a programmatic append never changes the flag.
#[derive(Debug)]
pub struct TranscriptSurface {
    state: Mutex<SurfaceState>,
}

impl Default for TranscriptSurface {
    fn default() -> Self {
        Self {
            state: Mutex::new(SurfaceState {
                text: String::new(),
                editable: false,
                scroll_pending: false,
            }),
        }
    }
}

impl TranscriptSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one line of text and request an auto-scroll to it.
    pub fn append_line(&self, line: &str) {
        let mut state = self.state.lock();
        state.text.push_str(line);
        state.text.push('\n');
        state.scroll_pending = true;
    }

    /// Flip the editable flag, returning the new value.
    pub fn toggle_editable(&self) -> bool {
        let mut state = self.state.lock();
        state.editable = !state.editable;
        state.editable
    }

    pub fn is_editable(&self) -> bool {
        self.state.lock().editable
    }

    pub fn text(&self) -> String {
        self.state.lock().text.clone()
    }

    /// Lock the surface for one GUI frame.
    pub fn lock(&self) -> MutexGuard<'_, SurfaceState> {
        self.state.lock()
    }
}
