//! Fixed size request/response frames exchanged with a search worker.
//!
//! A request frame is two (field name, value) pairs, a response frame is the newline separated
//! matching records or `NA`.  Every string is zero padded to its field size and always keeps at
//! least one trailing zero byte.

/// Bytes in a request field name.
pub const FIELD_NAME_SIZE: usize = 64;
/// Bytes in a request value.
pub const VALUE_SIZE: usize = 256;
/// Bytes in an encoded request.
pub const REQUEST_SIZE: usize = 2 * (FIELD_NAME_SIZE + VALUE_SIZE);
/// Bytes in an encoded response.
pub const RESPONSE_SIZE: usize = 2048;
/// Response text when there is no title or nothing matched.
pub const NO_RESULTS: &str = "NA";

const TITLE_FIELD: &str = "title";
const UPDATE_DATE_FIELDS: [&str; 3] = ["update_date", "updatedate", "update-date"];
// Longest update date value used from a request.
const UPDATE_DATE_MAX: usize = 63;

fn copy_zero_padded(dest: &mut [u8], value: &str) {
    dest.fill(0);
    let bytes = value.as_bytes();
    let len = bytes.len().min(dest.len() - 1);
    dest[..len].copy_from_slice(&bytes[..len]);
}

fn zero_terminated(src: &[u8]) -> String {
    let len = src.iter().position(|b| *b == 0).unwrap_or(src.len());
    String::from_utf8_lossy(&src[..len]).into_owned()
}

/// A search request: two named fields, one of which should be `title`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Request {
    field_name1: [u8; FIELD_NAME_SIZE],
    value1: [u8; VALUE_SIZE],
    field_name2: [u8; FIELD_NAME_SIZE],
    value2: [u8; VALUE_SIZE],
}

impl Request {
    /// Request with the two given (name, value) pairs, truncated to fit the frame.
    pub fn with_fields(first: (&str, &str), second: (&str, &str)) -> Self {
        let mut request = Self {
            field_name1: [0; FIELD_NAME_SIZE],
            value1: [0; VALUE_SIZE],
            field_name2: [0; FIELD_NAME_SIZE],
            value2: [0; VALUE_SIZE],
        };
        copy_zero_padded(&mut request.field_name1, first.0);
        copy_zero_padded(&mut request.value1, first.1);
        copy_zero_padded(&mut request.field_name2, second.0);
        copy_zero_padded(&mut request.value2, second.1);
        request
    }

    /// Request for title, optionally filtered by update date.
    pub fn new(title: &str, update_date: Option<&str>) -> Self {
        match update_date {
            Some(date) => Self::with_fields((TITLE_FIELD, title), (UPDATE_DATE_FIELDS[0], date)),
            None => Self::with_fields((TITLE_FIELD, title), ("", "")),
        }
    }

    /// Decode a request frame.
    pub fn decode(frame: &[u8; REQUEST_SIZE]) -> Self {
        let mut request = Self::with_fields(("", ""), ("", ""));
        let mut pos = 0;
        request
            .field_name1
            .copy_from_slice(&frame[pos..pos + FIELD_NAME_SIZE]);
        pos += FIELD_NAME_SIZE;
        request.value1.copy_from_slice(&frame[pos..pos + VALUE_SIZE]);
        pos += VALUE_SIZE;
        request
            .field_name2
            .copy_from_slice(&frame[pos..pos + FIELD_NAME_SIZE]);
        pos += FIELD_NAME_SIZE;
        request.value2.copy_from_slice(&frame[pos..pos + VALUE_SIZE]);
        request
    }

    /// Encode this request as a frame.
    pub fn encode(&self) -> [u8; REQUEST_SIZE] {
        let mut frame = [0_u8; REQUEST_SIZE];
        let mut pos = 0;
        frame[pos..pos + FIELD_NAME_SIZE].copy_from_slice(&self.field_name1);
        pos += FIELD_NAME_SIZE;
        frame[pos..pos + VALUE_SIZE].copy_from_slice(&self.value1);
        pos += VALUE_SIZE;
        frame[pos..pos + FIELD_NAME_SIZE].copy_from_slice(&self.field_name2);
        pos += FIELD_NAME_SIZE;
        frame[pos..pos + VALUE_SIZE].copy_from_slice(&self.value2);
        frame
    }

    /// Trimmed value of the first field whose (trimmed) name matches one of names, ignoring
    /// case.  Empty values count as missing.
    fn field(&self, names: &[&str]) -> Option<String> {
        [
            (&self.field_name1[..], &self.value1[..]),
            (&self.field_name2[..], &self.value2[..]),
        ]
        .iter()
        .find(|(name, _)| {
            let name = zero_terminated(name);
            names.iter().any(|n| name.trim().eq_ignore_ascii_case(n))
        })
        .map(|(_, value)| zero_terminated(value).trim().to_string())
        .filter(|value| !value.is_empty())
    }

    /// The title value, if the request has a non empty `title` field.
    pub fn title(&self) -> Option<String> {
        self.field(&[TITLE_FIELD])
    }

    /// The update date value (field `update_date`, `updatedate` or `update-date`), if any.
    pub fn update_date(&self) -> Option<String> {
        self.field(&UPDATE_DATE_FIELDS).map(|mut date| {
            if date.len() > UPDATE_DATE_MAX {
                let mut end = UPDATE_DATE_MAX;
                while !date.is_char_boundary(end) {
                    end -= 1;
                }
                date.truncate(end);
            }
            date
        })
    }
}

/// Search worker response, the matched records one per line or `NA`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    result: [u8; RESPONSE_SIZE],
}

impl Response {
    /// The `NA` response.
    pub fn no_results() -> Self {
        let mut result = [0_u8; RESPONSE_SIZE];
        copy_zero_padded(&mut result, NO_RESULTS);
        Self { result }
    }

    /// Response listing records, each newline terminated and in order.  Stops at the first record
    /// that would not fit (the text always keeps a trailing zero byte).  If nothing fits this is
    /// the `NA` response.
    pub fn from_records<R: AsRef<str>>(records: &[R]) -> Self {
        let mut result = [0_u8; RESPONSE_SIZE];
        let mut used = 0;
        for record in records {
            let record = record.as_ref().as_bytes();
            let line_len = record.len() + 1;
            if used + line_len + 1 > RESPONSE_SIZE {
                break;
            }
            result[used..used + record.len()].copy_from_slice(record);
            result[used + record.len()] = b'\n';
            used += line_len;
        }
        if used == 0 {
            Self::no_results()
        } else {
            Self { result }
        }
    }

    /// Decode a response frame.
    pub fn decode(frame: &[u8; RESPONSE_SIZE]) -> Self {
        Self { result: *frame }
    }

    /// The encoded frame.
    pub fn as_bytes(&self) -> &[u8; RESPONSE_SIZE] {
        &self.result
    }

    /// Response text up to the first zero byte.
    pub fn text(&self) -> String {
        zero_terminated(&self.result)
    }

    /// True for the `NA` response.
    pub fn is_no_results(&self) -> bool {
        self.text() == NO_RESULTS
    }

    /// The records in this response.
    pub fn records(&self) -> Vec<String> {
        if self.is_no_results() {
            Vec::new()
        } else {
            self.text().lines().map(str::to_string).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_frame() {
        let request = Request::new("Deep Learning", Some("2020-01-01"));
        let frame = request.encode();
        assert_eq!(frame.len(), 640);
        assert_eq!(&frame[0..5], b"title");
        assert_eq!(frame[5], 0);
        assert_eq!(&frame[64..77], b"Deep Learning");
        assert_eq!(&frame[320..331], b"update_date");
        assert_eq!(&frame[384..394], b"2020-01-01");
        let decoded = Request::decode(&frame);
        assert_eq!(decoded, request);
        assert_eq!(decoded.title().as_deref(), Some("Deep Learning"));
        assert_eq!(decoded.update_date().as_deref(), Some("2020-01-01"));
    }

    #[test]
    fn test_field_lookup() {
        let request = Request::with_fields((" UpdateDate ", " 2021-06-30 "), ("TITLE", "  deep "));
        assert_eq!(request.title().as_deref(), Some("deep"));
        assert_eq!(request.update_date().as_deref(), Some("2021-06-30"));
        let request = Request::with_fields(("update-date", "2021"), ("author", "x"));
        assert_eq!(request.title(), None);
        assert_eq!(request.update_date().as_deref(), Some("2021"));
        let request = Request::new("   ", None);
        assert_eq!(request.title(), None);
        assert_eq!(request.update_date(), None);
    }

    #[test]
    fn test_long_values_truncated() {
        let request = Request::new(&"t".repeat(300), Some(&"9".repeat(100)));
        assert_eq!(request.title().unwrap().len(), VALUE_SIZE - 1);
        assert_eq!(request.update_date().unwrap().len(), 63);
    }

    #[test]
    fn test_response_records() {
        let response = Response::from_records(&["one", "two"]);
        assert_eq!(response.text(), "one\ntwo\n");
        assert_eq!(response.records(), vec!["one", "two"]);
        assert!(!response.is_no_results());
        let empty: [&str; 0] = [];
        assert!(Response::from_records(&empty).is_no_results());
        assert!(Response::no_results().records().is_empty());
        let decoded = Response::decode(response.as_bytes());
        assert_eq!(decoded, response);
    }

    #[test]
    fn test_response_capacity() {
        let line = "x".repeat(1000);
        // Two 1001 byte lines fit in 2048 with room for the terminator, a third does not and
        // collection stops there.
        let response =
            Response::from_records(&[line.as_str(), line.as_str(), line.as_str(), "short"]);
        assert_eq!(response.records().len(), 2);
        assert_eq!(response.as_bytes()[RESPONSE_SIZE - 1], 0);
        let huge = "y".repeat(RESPONSE_SIZE);
        assert!(Response::from_records(&[huge]).is_no_results());
        // Exactly fills the frame minus the terminator.
        let exact = "z".repeat(RESPONSE_SIZE - 2);
        assert_eq!(Response::from_records(&[exact]).records().len(), 1);
    }
}
