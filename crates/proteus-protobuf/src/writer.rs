//! Indentation-tracking writer shared by the schema and facade emitters.

/// Accumulates generated source text, indenting the start of every line
/// by the current level.
pub struct CodeWriter {
    out: String,
    indent_string: String,
    indent_level: usize,
    at_line_start: bool,
}

impl CodeWriter {
    /// A writer using the given string for one indentation level.
    pub fn new(indent_string: impl Into<String>) -> Self {
        CodeWriter {
            out: String::new(),
            indent_string: indent_string.into(),
            indent_level: 0,
            at_line_start: true,
        }
    }

    /// Write text without a newline, indenting if at the start of a line.
    pub fn write(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if self.at_line_start {
            for _ in 0..self.indent_level {
                self.out.push_str(&self.indent_string);
            }
            self.at_line_start = false;
        }
        self.out.push_str(text);
    }

    /// Write a full line.
    pub fn writeln(&mut self, text: &str) {
        self.write(text);
        self.out.push('\n');
        self.at_line_start = true;
    }

    /// Write an empty line, never indented.
    pub fn blank_line(&mut self) {
        self.out.push('\n');
        self.at_line_start = true;
    }

    /// Write each documentation line as a `// ` comment.
    pub fn doc_comment(&mut self, lines: &[String]) {
        for line in lines {
            if line.is_empty() {
                self.writeln("//");
            } else {
                self.writeln(&format!("// {}", line));
            }
        }
    }

    /// Run `body` with the indentation level raised by one.
    pub fn indented(&mut self, body: impl FnOnce(&mut Self)) {
        self.indent_level += 1;
        body(self);
        self.indent_level -= 1;
    }

    /// Write `header {`, the indented body, and the closing `}` line.
    pub fn block(&mut self, header: &str, body: impl FnOnce(&mut Self)) {
        self.writeln(&format!("{} {{", header));
        self.indented(body);
        self.writeln("}");
    }

    pub fn into_string(self) -> String {
        self.out
    }
}
