/// File content held as lines that keep their own terminators.
///
/// Joining the lines back together reproduces the input byte for byte, so
/// anything outside a patched span is written out untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLines {
    lines: Vec<String>,
    newline: &'static str,
}

impl SourceLines {
    pub fn from_text(text: &str) -> Self {
        let lines: Vec<String> = text.split_inclusive('\n').map(str::to_string).collect();
        let newline = lines
            .iter()
            .find(|line| line.ends_with('\n'))
            .map_or("\n", |line| {
                if line.ends_with("\r\n") {
                    "\r\n"
                } else {
                    "\n"
                }
            });
        Self { lines, newline }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Terminator used for freshly encoded lines.
    pub fn newline(&self) -> &'static str {
        self.newline
    }

    pub fn ends_without_newline(&self) -> bool {
        self.lines.last().is_some_and(|line| !line.ends_with('\n'))
    }

    /// Appends a terminator to each encoded line.
    ///
    /// With `at_eof` set and the file lacking a final terminator, the last
    /// emitted line is left bare so the file's ending is unchanged.
    pub fn terminate(&self, encoded: Vec<String>, at_eof: bool) -> Vec<String> {
        let bare_tail = at_eof && self.ends_without_newline();
        let count = encoded.len();
        encoded
            .into_iter()
            .enumerate()
            .map(|(i, mut line)| {
                if !(bare_tail && i + 1 == count) {
                    line.push_str(self.newline);
                }
                line
            })
            .collect()
    }

    pub fn from_lines(lines: Vec<String>, newline: &'static str) -> Self {
        Self { lines, newline }
    }

    pub fn to_text(&self) -> String {
        self.lines.concat()
    }
}
