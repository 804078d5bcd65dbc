/// Indentation applied to every script line placed inside the generated
/// function body.
pub const BODY_INDENT: &str = "  ";

/// Prefix every line of `script` with `indent`.
///
/// Line boundaries are kept exactly: `n` input lines give `n` output lines,
/// including blank and trailing ones.
pub fn prefix_lines(script: &str, indent: &str) -> String {
    script
        .split('\n')
        .map(|line| format!("{}{}", indent, line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Generated source text for one invocation.
///
/// Built from a preamble (which already holds the embedded input), the
/// indented user script and an epilogue. It is consumed when turned into an
/// invocation, so a program is never run twice.
#[derive(Debug)]
pub struct WrappedProgram {
    source: String,
    body_line_offset: usize,
    body_lines: usize,
}

impl WrappedProgram {
    /// `preamble` must end with a newline and `epilogue` should start with
    /// one, so the script body occupies whole lines.
    pub(crate) fn assemble(preamble: &str, script: &str, epilogue: &str) -> Self {
        let body = prefix_lines(script, BODY_INDENT);

        let mut source = String::with_capacity(preamble.len() + body.len() + epilogue.len());
        source.push_str(preamble);
        source.push_str(&body);
        source.push_str(epilogue);

        Self {
            source,
            body_line_offset: preamble.matches('\n').count(),
            body_lines: script.split('\n').count(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn into_source(self) -> String {
        self.source
    }

    /// Number of generated lines before the first script line.
    pub fn body_line_offset(&self) -> usize {
        self.body_line_offset
    }

    /// Map a 1-based line number reported by the interpreter back to the
    /// 1-based line in the original script. `None` for wrapper lines.
    pub fn script_line(&self, generated_line: usize) -> Option<usize> {
        let first = self.body_line_offset + 1;
        let last = self.body_line_offset + self.body_lines;
        (first..=last)
            .contains(&generated_line)
            .then(|| generated_line - self.body_line_offset)
    }
}
