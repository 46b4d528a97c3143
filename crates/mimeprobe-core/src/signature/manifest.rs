//! JAR manifest (`META-INF/MANIFEST.MF`) parsing.

use std::io::Cursor;

use crate::cursor::ByteCursor;
use crate::error::{ProbeError, ProbeResult};

type Attributes = Vec<(String, String)>;

/// Main attributes and per-entry sections of a JAR manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JarManifest {
    main: Attributes,
    sections: Vec<Attributes>,
}

impl JarManifest {
    /// Parse manifest bytes.
    ///
    /// Lines end in `\n`, `\r` or `\r\n`; a line starting with a single space
    /// continues the previous value; a blank line ends a section. A non-blank
    /// line that is neither a continuation nor `Name: value` is malformed.
    pub fn parse(data: &[u8]) -> ProbeResult<Self> {
        let mut cursor = ByteCursor::new(Cursor::new(data));
        let mut manifest = JarManifest::default();
        let mut current: Attributes = Vec::new();
        let mut in_main = true;
        let mut offset = 0;

        while let Some(line) = next_line(&mut cursor, &mut offset)? {
            if line.is_empty() {
                manifest.finish_section(&mut current, &mut in_main);
                continue;
            }
            let text = String::from_utf8_lossy(&line);
            if let Some(continued) = text.strip_prefix(' ') {
                let Some((_, value)) = current.last_mut() else {
                    return Err(ProbeError::malformed(
                        "manifest",
                        "continuation line without attribute",
                    ));
                };
                value.push_str(continued);
                continue;
            }
            let Some((name, value)) = text.split_once(':') else {
                return Err(ProbeError::malformed(
                    "manifest",
                    format!("missing ':' in line {text:?}"),
                ));
            };
            if name.is_empty() {
                return Err(ProbeError::malformed("manifest", "empty attribute name"));
            }
            let value = value.strip_prefix(' ').unwrap_or(value);
            current.push((name.to_string(), value.to_string()));
        }
        manifest.finish_section(&mut current, &mut in_main);
        Ok(manifest)
    }

    fn finish_section(&mut self, current: &mut Attributes, in_main: &mut bool) {
        if *in_main {
            self.main.append(current);
            *in_main = false;
        } else if !current.is_empty() {
            self.sections.push(std::mem::take(current));
        }
    }

    /// Main-section attribute, looked up case-insensitively.
    pub fn main_attribute(&self, name: &str) -> Option<&str> {
        lookup(&self.main, name)
    }

    pub fn main_attributes(&self) -> &[(String, String)] {
        &self.main
    }

    /// Attributes of the per-entry section whose `Name` is `entry`.
    pub fn section(&self, entry: &str) -> Option<&[(String, String)]> {
        self.sections
            .iter()
            .find(|s| lookup(s, "Name") == Some(entry))
            .map(Vec::as_slice)
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }
}

fn lookup<'a>(attributes: &'a [(String, String)], name: &str) -> Option<&'a str> {
    attributes
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Next line starting at `offset`, treating `\r\n` as one terminator and
/// returning a final unterminated line as a line.
fn next_line<R: std::io::Read>(
    cursor: &mut ByteCursor<R>,
    offset: &mut usize,
) -> ProbeResult<Option<Vec<u8>>> {
    let start = *offset;
    match cursor.read_line_at(start)? {
        Some(line) => {
            let mut next = cursor.position();
            if cursor.read_byte_at(next - 1)? == b'\r'
                && matches!(cursor.read_byte_at(next), Ok(b'\n'))
            {
                next += 1;
            }
            *offset = next;
            Ok(Some(line))
        }
        None => {
            let end = cursor.position();
            *offset = end;
            if end > start {
                Ok(Some(cursor.read_at(start, end - start)?.to_vec()))
            } else {
                Ok(None)
            }
        }
    }
}
