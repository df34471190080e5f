// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Compiler and linker log parsing.

Drivers format their info logs differently.  The formats recognized here are:

| Vendor      | Format                      |
|-------------|-----------------------------|
| Nvidia      | `0(12) : error C1008: ...`  |
| ATI / Intel | `ERROR: 0:12: ...`          |
| Nouveau     | `0:12(5): error: ...`       |

Log lines in any other format are kept as-is, without a line number.

```
use buffers_and_bindings::images::diagnostics::parse;

let source = "void main() {\n    gl_FragColor = vec4(1.0)\n}\n";
let diagnostics = parse("ERROR: 0:2: '}' : syntax error", source);
assert_eq!(diagnostics[0].line, Some(2));
assert_eq!(diagnostics[0].source_line.as_deref(), Some("gl_FragColor = vec4(1.0)"));
```
*/

use std::fmt::{Display, Formatter};

/// One message from a compile or link log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// 1-based source line, when the log names one.
    pub line: Option<usize>,
    pub message: String,
    /// The offending source line, trimmed.
    pub source_line: Option<String>,
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.line {
            Some(line) => write!(f, "on line {line}: {}", self.message)?,
            None => write!(f, "{}", self.message)?,
        }
        if let Some(source_line) = &self.source_line {
            write!(f, "\n  {source_line}")?;
        }
        Ok(())
    }
}

/// Splits a leading run of ASCII digits off `s`.
fn digits(s: &str) -> Option<(usize, &str)> {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    if end == 0 {
        return None;
    }
    Some((s[..end].parse().ok()?, &s[end..]))
}

/// `N(L) : msg`
fn nvidia(line: &str) -> Option<(usize, &str)> {
    let (_, rest) = digits(line)?;
    let rest = rest.strip_prefix('(')?;
    let (line_number, rest) = digits(rest)?;
    let rest = rest.strip_prefix(')')?.trim_start();
    let message = rest.strip_prefix(':')?;
    Some((line_number, message.trim()))
}

/// `ERROR: N:L: msg`
fn ati(line: &str) -> Option<(usize, &str)> {
    let rest = line.strip_prefix("ERROR:")?.trim_start();
    let (_, rest) = digits(rest)?;
    let rest = rest.strip_prefix(':')?;
    let (line_number, rest) = digits(rest)?;
    let message = rest.strip_prefix(':')?;
    Some((line_number, message.trim()))
}

/// `N:L(C): msg`
fn nouveau(line: &str) -> Option<(usize, &str)> {
    let (_, rest) = digits(line)?;
    let rest = rest.strip_prefix(':')?;
    let (line_number, rest) = digits(rest)?;
    let rest = rest.strip_prefix('(')?;
    let (_column, rest) = digits(rest)?;
    let message = rest.strip_prefix("):")?;
    Some((line_number, message.trim()))
}

/// Splits one log line into a line number and a message.
pub fn parse_line(line: &str) -> (Option<usize>, &str) {
    let line = line.trim();
    match nvidia(line).or_else(|| ati(line)).or_else(|| nouveau(line)) {
        Some((number, message)) => (Some(number), message),
        None => (None, line),
    }
}

/// Parses a whole log, attaching the offending line of `source` where one is named.
pub fn parse(log: &str, source: &str) -> Vec<Diagnostic> {
    let source_lines: Vec<&str> = source.lines().collect();
    log.lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| {
            let (line, message) = parse_line(l);
            let source_line = line
                .filter(|&n| n > 0)
                .and_then(|n| source_lines.get(n - 1))
                .map(|s| s.trim().to_string());
            Diagnostic {
                line,
                message: message.to_string(),
                source_line,
            }
        })
        .collect()
}
