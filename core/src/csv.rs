//! Column extraction for comma delimited lines with optional double quote escaping.
//!
//! The builder uses this to pull the key out of each record and the reader uses it to pull the
//! secondary filter field, both MUST go through the same function or keys and filters diverge.
//!
//! Rules:
//! - Columns are 0 based and separated by `,`.
//! - An unquoted field runs to the next `,` or line end (`\n` or `\r`) and is trimmed.
//! - A field starting with `"` is quoted, it may contain `,` and line breaks, `""` decodes to one
//!   `"` and the field ends at the first unescaped `"`.  Anything between the closing quote and the
//!   next `,` is dropped.  The decoded value is trimmed.
//! - A line without the requested column yields `None`.

const SEPARATOR: u8 = b',';
const QUOTE: u8 = b'"';

/// Extract column (0 based) from line.  Returns None if the line is too short.
pub fn extract_column(line: &str, column: usize) -> Option<String> {
    let bytes = line.as_bytes();
    let mut pos = 0;
    let mut current = 0;
    loop {
        if current == column {
            return read_field(bytes, pos).map(|field| {
                String::from_utf8_lossy(&field).trim().to_string()
            });
        }
        pos = skip_field(bytes, pos)?;
        current += 1;
    }
}

/// True if the byte ends an unquoted field's line.
fn is_line_end(byte: u8) -> bool {
    byte == b'\n' || byte == b'\r'
}

/// Decode the field starting at pos.  None if pos is already at the end of the line.
fn read_field(bytes: &[u8], pos: usize) -> Option<Vec<u8>> {
    if pos > bytes.len() {
        return None;
    }
    if pos == bytes.len() || is_line_end(bytes[pos]) {
        // Nothing left on the line, but a separator just moved us here so the field exists.
        return if pos > 0 && bytes[pos - 1] == SEPARATOR {
            Some(Vec::new())
        } else {
            None
        };
    }
    let mut field = Vec::new();
    if bytes[pos] == QUOTE {
        let mut i = pos + 1;
        while i < bytes.len() {
            if bytes[i] == QUOTE {
                if bytes.get(i + 1) == Some(&QUOTE) {
                    field.push(QUOTE);
                    i += 2;
                    continue;
                }
                break;
            }
            field.push(bytes[i]);
            i += 1;
        }
    } else {
        let end = bytes[pos..]
            .iter()
            .position(|b| *b == SEPARATOR || is_line_end(*b))
            .map(|len| pos + len)
            .unwrap_or(bytes.len());
        field.extend_from_slice(&bytes[pos..end]);
    }
    Some(field)
}

/// Move past the field starting at pos and its separator.  Returns the start of the next field
/// or None if the line ends first.
fn skip_field(bytes: &[u8], pos: usize) -> Option<usize> {
    let mut i = pos;
    if bytes.get(i) == Some(&QUOTE) {
        i += 1;
        while i < bytes.len() {
            if bytes[i] == QUOTE {
                if bytes.get(i + 1) == Some(&QUOTE) {
                    i += 2;
                    continue;
                }
                i += 1;
                break;
            }
            i += 1;
        }
    }
    while i < bytes.len() {
        match bytes[i] {
            SEPARATOR => return Some(i + 1),
            b if is_line_end(b) => return None,
            _ => i += 1,
        }
    }
    None
}
