//! Reassembly of BLE notification chunks into module-tagged log lines.
//!
//! Everything in this module is pure logic with no I/O: [`LineAssembler`]
//! carries the only cross-notification state (the partial-line buffer), and
//! [`classify_module`] is a stateless string function. Both are safe to call
//! from any async or sync context.

use crate::protocol::UNKNOWN_MODULE;

// ── Line reassembly ───────────────────────────────────────────────────────────

/// Incrementally reassembles notification byte chunks into complete log lines.
///
/// The peripheral chunks its log stream at `ATT_MTU − 3` bytes, so chunk
/// boundaries fall anywhere: mid-line, mid-CRLF, even mid-code-point. The
/// assembler buffers bytes across calls and only releases text once a line
/// terminator has arrived, which makes the emitted lines independent of how
/// the stream was split ("chunking invariance").
///
/// # Usage
///
/// ```
/// # use blelog_rs::parse::LineAssembler;
/// let mut asm = LineAssembler::new();
/// assert!(asm.feed(b"as6221_demo: t=").is_empty());        // incomplete
/// let lines = asm.feed(b"25.4\r\n");                       // terminator → line
/// assert_eq!(lines, vec!["as6221_demo: t=25.4"]);
/// ```
///
/// # Decode errors
///
/// Chunks are decoded lossily: malformed UTF-8 (typically a multi-byte code
/// point cut by a chunk boundary) becomes U+FFFD replacement characters and
/// processing continues. A bad byte sequence can therefore mangle one line
/// but never poisons the lines before or after it.
#[derive(Debug, Default)]
pub struct LineAssembler {
    /// Text received but not yet terminated by a newline. Never contains a
    /// line feed once `feed` has returned.
    buf: String,
}

impl LineAssembler {
    /// Create a new, empty assembler.
    pub fn new() -> Self {
        Self { buf: String::new() }
    }

    /// Append one notification chunk and return every line it completes.
    ///
    /// All line-ending conventions (`\r\n`, lone `\r`, lone `\n`) are
    /// normalized to a single line feed before extraction. Each completed
    /// line is trimmed of surrounding whitespace; lines that are empty after
    /// trimming are dropped and produce no output. Any trailing partial
    /// segment stays buffered for the next call.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.push_str(&String::from_utf8_lossy(chunk));

        // Normalize over the whole buffer so a CR buffered by the previous
        // call still collapses correctly. A lone trailing CR becomes a line
        // feed immediately; if an LF follows in the next chunk the resulting
        // empty segment is trimmed away below.
        if self.buf.contains('\r') {
            self.buf = self.buf.replace("\r\n", "\n").replace('\r', "\n");
        }

        let mut lines = Vec::new();
        while let Some(pos) = self.buf.find('\n') {
            let line = self.buf[..pos].trim().to_owned();
            self.buf.drain(..=pos);
            if !line.is_empty() {
                lines.push(line);
            }
        }
        lines
    }

    /// Clear the buffer.
    ///
    /// Called on every connect and teardown so partial fragments never leak
    /// between sessions. A reset assembler behaves identically to a freshly
    /// constructed one.
    pub fn reset(&mut self) {
        self.buf.clear();
    }

    /// `true` when no partial line is buffered.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

// ── Module classification ─────────────────────────────────────────────────────

/// Derive the module tag for a completed line.
///
/// The tag is the text before the first `:`, trimmed; lines with no colon map
/// to [`UNKNOWN_MODULE`]. The tag content is not validated — the firmware is
/// free to emit arbitrary prefixes and they group as-is.
///
/// ```
/// # use blelog_rs::parse::classify_module;
/// assert_eq!(classify_module("as6221_demo: value=12"), "as6221_demo");
/// assert_eq!(classify_module("no colon here"), "Unknown");
/// ```
pub fn classify_module(line: &str) -> &str {
    match line.split_once(':') {
        Some((module, _)) => module.trim(),
        None => UNKNOWN_MODULE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_line_in_one_chunk() {
        let mut asm = LineAssembler::new();
        assert_eq!(asm.feed(b"abc\ndef\n"), vec!["abc", "def"]);
        assert!(asm.is_empty());
    }

    #[test]
    fn line_split_across_chunks() {
        let mut asm = LineAssembler::new();
        assert!(asm.feed(b"abc").is_empty());
        assert_eq!(asm.feed(b"def\n"), vec!["abcdef"]);
    }

    #[test]
    fn chunking_invariance() {
        // Any split of the same byte stream yields the same single line.
        let payload = b"lsm6dso_app: acc=[0.01, -0.98, 0.12]\r\n";
        for split in 1..payload.len() - 1 {
            let mut asm = LineAssembler::new();
            let mut lines = asm.feed(&payload[..split]);
            lines.extend(asm.feed(&payload[split..]));
            assert_eq!(
                lines,
                vec!["lsm6dso_app: acc=[0.01, -0.98, 0.12]"],
                "failed for split at byte {split}"
            );
            assert!(asm.is_empty());
        }
    }

    #[test]
    fn crlf_and_lone_cr_normalize() {
        let mut asm = LineAssembler::new();
        assert_eq!(asm.feed(b"a\r\nb\rc\n"), vec!["a", "b", "c"]);
    }

    #[test]
    fn crlf_split_between_chunks() {
        let mut asm = LineAssembler::new();
        assert_eq!(asm.feed(b"one\r"), vec!["one"]);
        // the LF half of the pair arrives next and must not make a blank line
        assert!(asm.feed(b"\ntwo").is_empty());
        assert_eq!(asm.feed(b"\n"), vec!["two"]);
    }

    #[test]
    fn lines_are_trimmed() {
        let mut asm = LineAssembler::new();
        assert_eq!(asm.feed(b"  padded: line  \n"), vec!["padded: line"]);
    }

    #[test]
    fn blank_lines_are_dropped() {
        let mut asm = LineAssembler::new();
        assert!(asm.feed(b"   \n").is_empty());
        assert!(asm.feed(b"\r\n\r\n").is_empty());
        assert!(asm.is_empty());
    }

    #[test]
    fn invalid_bytes_do_not_poison_neighbors() {
        let mut asm = LineAssembler::new();
        let lines = asm.feed(b"good: 1\n\xff\xfe\ngood: 2\n");
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "good: 1");
        assert!(lines[1].contains('\u{FFFD}'));
        assert_eq!(lines[2], "good: 2");
    }

    #[test]
    fn multibyte_code_point_split_across_chunks() {
        // '✅' = e2 9c 85; a split inside it degrades that line only.
        let bytes = "ok: ✅ done\n".as_bytes();
        let mut asm = LineAssembler::new();
        let mut lines = asm.feed(&bytes[..5]);
        lines.extend(asm.feed(&bytes[5..]));
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("ok:"));

        // a following clean line is unaffected
        assert_eq!(asm.feed(b"next: fine\n"), vec!["next: fine"]);
    }

    #[test]
    fn reset_leaves_no_residue() {
        let mut asm = LineAssembler::new();
        asm.feed(b"partial fragment with no newline");
        asm.reset();
        assert!(asm.is_empty());
        // behaves like a fresh assembler afterwards
        assert_eq!(asm.feed(b"clean: line\n"), vec!["clean: line"]);
        asm.reset();
        asm.reset(); // idempotent
        assert!(asm.is_empty());
    }

    #[test]
    fn classify_extracts_prefix_before_first_colon() {
        assert_eq!(classify_module("as6221_demo: value=12"), "as6221_demo");
        assert_eq!(
            classify_module("max30101_demo: spo2: 98%"), // only the first colon counts
            "max30101_demo"
        );
        assert_eq!(classify_module("  spaced : x"), "spaced");
    }

    #[test]
    fn classify_without_colon_is_unknown() {
        assert_eq!(classify_module("no colon here"), "Unknown");
        assert_eq!(classify_module("[DROPPED=7]"), "Unknown");
    }
}
