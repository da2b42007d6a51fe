//! Indented line writer for C source.

/// Accumulates C source one line at a time.
#[derive(Debug, Default)]
pub struct CWriter {
    out: String,
    indent: usize,
    lines: u32,
}

impl CWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write one line at the current indentation.
    pub fn line(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if !text.is_empty() {
            for _ in 0..self.indent {
                self.out.push_str("    ");
            }
            self.out.push_str(text);
        }
        self.out.push('\n');
        self.lines += 1;
    }

    pub fn blank(&mut self) {
        self.line("");
    }

    /// Write `header {` and indent.
    pub fn open(&mut self, header: impl AsRef<str>) {
        self.line(format!("{} {{", header.as_ref()));
        self.indent += 1;
    }

    /// Dedent and write `}`.
    pub fn close(&mut self) {
        self.close_with("}");
    }

    /// Dedent and write `text`; indents again when `text` opens a block
    /// (e.g. `} else {`).
    pub fn close_with(&mut self, text: &str) {
        self.indent = self.indent.saturating_sub(1);
        self.line(text);
        if text.ends_with('{') {
            self.indent += 1;
        }
    }

    /// 1-based number of the next line to be written.
    pub fn next_line(&self) -> u32 {
        self.lines + 1
    }

    pub fn finish(self) -> String {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nesting_and_line_numbers() {
        let mut w = CWriter::new();
        w.open("if (a)");
        w.line("b = 1;");
        w.close_with("} else {");
        w.line("b = 2;");
        w.close();
        assert_eq!(w.next_line(), 6);
        assert_eq!(
            w.finish(),
            "if (a) {\n    b = 1;\n} else {\n    b = 2;\n}\n"
        );
    }
}
