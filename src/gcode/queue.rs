// src/gcode/queue.rs - Fixed-capacity G-code command ring buffer
use std::fmt;

/// Number of command slots in the firmware command queue.
pub const BUFSIZE: usize = 8;

/// Maximum stored length of a single command line, in bytes.
pub const MAX_CMD_SIZE: usize = 96;

/// The queue instance the firmware runs with.
pub type CommandQueue = RingBuffer<BUFSIZE>;

/// One queued command line plus its acknowledgment flag.
///
/// The text lives in an inline buffer so a queue never allocates. Lines
/// longer than [`MAX_CMD_SIZE`] are cut at the last character boundary
/// that fits.
#[derive(Clone, Copy)]
pub struct CommandLine {
    buffer: [u8; MAX_CMD_SIZE],
    len: usize,
    /// When true no "ok" is sent back to the host for this line.
    pub skip_ok: bool,
}

impl CommandLine {
    pub const EMPTY: CommandLine = CommandLine {
        buffer: [0; MAX_CMD_SIZE],
        len: 0,
        skip_ok: false,
    };

    pub fn new(text: &str, skip_ok: bool) -> Self {
        let mut line = Self::EMPTY;
        line.set(text, skip_ok);
        line
    }

    fn set(&mut self, text: &str, skip_ok: bool) {
        let mut end = text.len().min(MAX_CMD_SIZE);
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        if end < text.len() {
            tracing::warn!("Command truncated to {} bytes: {}", end, text);
        }
        self.buffer[..end].copy_from_slice(&text.as_bytes()[..end]);
        self.len = end;
        self.skip_ok = skip_ok;
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.buffer[..self.len]).unwrap_or("")
    }
}

impl Default for CommandLine {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl PartialEq for CommandLine {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str() && self.skip_ok == other.skip_ok
    }
}

impl fmt::Debug for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandLine")
            .field("text", &self.as_str())
            .field("skip_ok", &self.skip_ok)
            .finish()
    }
}

/// Circular FIFO of command lines with capacity `N`.
///
/// Invariant: `length <= N`; both indices wrap modulo `N`.
#[derive(Debug, Clone)]
pub struct RingBuffer<const N: usize> {
    commands: [CommandLine; N],
    length: usize,
    index_r: usize,
    index_w: usize,
}

impl<const N: usize> Default for RingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> RingBuffer<N> {
    pub fn new() -> Self {
        Self {
            commands: [CommandLine::EMPTY; N],
            length: 0,
            index_r: 0,
            index_w: 0,
        }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn index_r(&self) -> usize {
        self.index_r
    }

    pub fn index_w(&self) -> usize {
        self.index_w
    }

    /// Reset length and indices. Old payload bytes stay in place but are
    /// unreachable once length is zero.
    pub fn clear(&mut self) {
        self.length = 0;
        self.index_r = 0;
        self.index_w = 0;
    }

    fn next_index(p: usize) -> usize {
        if p + 1 >= N { 0 } else { p + 1 }
    }

    /// Commit the slot at the write index.
    pub fn advance_w(&mut self) {
        if self.length >= N {
            tracing::error!("advance_w on a full command queue ignored");
            debug_assert!(self.length < N, "command queue overflow");
            return;
        }
        self.index_w = Self::next_index(self.index_w);
        self.length += 1;
    }

    /// Drop the head entry. No-op when empty.
    pub fn advance_r(&mut self) {
        if self.length == 0 {
            return;
        }
        self.index_r = Self::next_index(self.index_r);
        self.length -= 1;
    }

    /// Append a command. Fails without touching the buffer when it is full
    /// or the line is only a comment.
    pub fn enqueue(&mut self, cmd: &str, skip_ok: bool) -> bool {
        if cmd.trim_start().starts_with(';') || self.is_full(1) {
            return false;
        }
        self.commands[self.index_w].set(cmd, skip_ok);
        self.advance_w();
        true
    }

    /// Append a preserved line as-is, keeping its ack flag.
    pub fn enqueue_line(&mut self, line: &CommandLine) -> bool {
        self.enqueue(line.as_str(), line.skip_ok)
    }

    /// True when fewer than `needed` slots remain.
    pub fn is_full(&self, needed: usize) -> bool {
        self.length + needed > N
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn peek_head(&self) -> Option<&CommandLine> {
        if self.is_empty() {
            None
        } else {
            Some(&self.commands[self.index_r])
        }
    }

    pub fn peek_head_str(&self) -> Option<&str> {
        self.peek_head().map(CommandLine::as_str)
    }

    /// Pop the head entry, copying it out.
    pub fn dequeue(&mut self) -> Option<CommandLine> {
        let line = self.peek_head().copied();
        self.advance_r();
        line
    }

    /// Queued entries in FIFO order, starting at the read index.
    pub fn iter(&self) -> impl Iterator<Item = &CommandLine> + '_ {
        (0..self.length).map(move |i| &self.commands[(self.index_r + i) % N])
    }
}

/// Fixed-capacity copy of queued commands taken while a print is paused.
#[derive(Debug, Clone)]
pub struct CommandSnapshot<const N: usize> {
    lines: [CommandLine; N],
    count: usize,
}

impl<const N: usize> Default for CommandSnapshot<N> {
    fn default() -> Self {
        Self {
            lines: [CommandLine::EMPTY; N],
            count: 0,
        }
    }
}

impl<const N: usize> CommandSnapshot<N> {
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Store a copy of `line`. Returns false when the snapshot is full.
    pub fn push(&mut self, line: &CommandLine) -> bool {
        if self.count >= N {
            return false;
        }
        self.lines[self.count] = *line;
        self.count += 1;
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = &CommandLine> + '_ {
        self.lines[..self.count].iter()
    }

    pub fn clear(&mut self) {
        self.count = 0;
    }
}
