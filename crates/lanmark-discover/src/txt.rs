//! TXT metadata records.
//!
//! Wire layout: a run of entries, each a single length byte followed by that
//! many bytes of `key` or `key=value`. Keys are printable ASCII without `=`
//! and compare case-insensitively. The whole record fits in 65535 bytes.

use thiserror::Error;

/// Largest encoded record the native facility accepts.
pub const MAX_RECORD_LEN: usize = u16::MAX as usize;

/// Largest single entry (`key=value`), bounded by its length byte.
pub const MAX_ENTRY_LEN: usize = u8::MAX as usize;

/// Errors building or parsing a TXT record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TxtError {
    #[error("invalid TXT key {0:?}")]
    InvalidKey(String),

    #[error("TXT entry for key {key:?} is {len} bytes, limit is 255")]
    EntryTooLong { key: String, len: usize },

    #[error("TXT record is {0} bytes, limit is 65535")]
    RecordTooLong(usize),

    #[error("TXT record truncated at offset {offset}")]
    Truncated { offset: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    key: String,
    value: Option<Vec<u8>>,
}

impl Entry {
    fn encoded_len(&self) -> usize {
        self.key.len() + self.value.as_ref().map_or(0, |v| v.len() + 1)
    }
}

/// An ordered set of TXT key/value attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxtRecord {
    entries: Vec<Entry>,
}

impl TxtRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace `key=value`.
    pub fn insert(&mut self, key: &str, value: impl AsRef<[u8]>) -> Result<(), TxtError> {
        self.put(key, Some(value.as_ref().to_vec()))
    }

    /// Insert or replace a boolean attribute (a bare `key` with no `=`).
    pub fn insert_flag(&mut self, key: &str) -> Result<(), TxtError> {
        self.put(key, None)
    }

    fn put(&mut self, key: &str, value: Option<Vec<u8>>) -> Result<(), TxtError> {
        validate_key(key.as_bytes())?;
        let entry = Entry {
            key: key.to_string(),
            value,
        };
        let len = entry.encoded_len();
        if len > MAX_ENTRY_LEN {
            return Err(TxtError::EntryTooLong {
                key: entry.key,
                len,
            });
        }

        let replaced_len = self.position(key).map(|i| self.entries[i].encoded_len() + 1);
        let total = self.encoded_len() - replaced_len.unwrap_or(0) + entry.encoded_len() + 1;
        if total > MAX_RECORD_LEN {
            return Err(TxtError::RecordTooLong(total));
        }

        match self.position(key) {
            Some(i) => self.entries[i] = entry,
            None => self.entries.push(entry),
        }
        Ok(())
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.key.eq_ignore_ascii_case(key))
    }

    /// Value bytes for `key`. A bare flag yields an empty slice.
    pub fn get_bytes(&self, key: &str) -> Option<&[u8]> {
        self.position(key)
            .map(|i| self.entries[i].value.as_deref().unwrap_or(&[]))
    }

    /// Value for `key` as UTF-8 text, lossily converted.
    pub fn get(&self, key: &str) -> Option<String> {
        self.get_bytes(key)
            .map(|v| String::from_utf8_lossy(v).into_owned())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    pub fn remove(&mut self, key: &str) -> bool {
        match self.position(key) {
            Some(i) => {
                self.entries.remove(i);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate `(key, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&[u8]>)> {
        self.entries
            .iter()
            .map(|e| (e.key.as_str(), e.value.as_deref()))
    }

    fn encoded_len(&self) -> usize {
        self.entries.iter().map(|e| e.encoded_len() + 1).sum()
    }

    /// Encode to wire bytes. An empty record encodes to no bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        for entry in &self.entries {
            // encoded_len() was checked against MAX_ENTRY_LEN on insert
            out.push(entry.encoded_len() as u8);
            out.extend_from_slice(entry.key.as_bytes());
            if let Some(ref value) = entry.value {
                out.push(b'=');
                out.extend_from_slice(value);
            }
        }
        out
    }

    /// Parse and validate wire bytes.
    ///
    /// Zero-length entries are skipped, so the single zero byte the native
    /// facility uses for an empty record parses as an empty record. Only the
    /// first occurrence of a repeated key is kept.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TxtError> {
        if bytes.len() > MAX_RECORD_LEN {
            return Err(TxtError::RecordTooLong(bytes.len()));
        }

        let mut record = TxtRecord::new();
        let mut offset = 0;
        while offset < bytes.len() {
            let len = bytes[offset] as usize;
            let start = offset + 1;
            let end = start + len;
            if end > bytes.len() {
                return Err(TxtError::Truncated { offset });
            }
            offset = end;
            if len == 0 {
                continue;
            }

            let raw = &bytes[start..end];
            let (key, value) = match raw.iter().position(|b| *b == b'=') {
                Some(eq) => (&raw[..eq], Some(raw[eq + 1..].to_vec())),
                None => (raw, None),
            };
            validate_key(key)?;
            // validate_key guarantees ASCII
            let key = String::from_utf8_lossy(key).into_owned();
            if !record.contains_key(&key) {
                record.entries.push(Entry { key, value });
            }
        }
        Ok(record)
    }
}

impl From<TxtRecord> for Vec<u8> {
    fn from(record: TxtRecord) -> Self {
        record.to_bytes()
    }
}

fn validate_key(key: &[u8]) -> Result<(), TxtError> {
    let valid = !key.is_empty() && key.iter().all(|b| (0x20..=0x7e).contains(b) && *b != b'=');
    if valid {
        Ok(())
    } else {
        Err(TxtError::InvalidKey(String::from_utf8_lossy(key).into_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encodes_length_prefixed_entries() {
        let mut txt = TxtRecord::new();
        txt.insert("path", "/api").unwrap();
        txt.insert_flag("secure").unwrap();
        assert_eq!(txt.to_bytes(), b"\x09path=/api\x06secure".to_vec());
    }

    #[test]
    fn test_parses_values_and_flags() {
        let txt = TxtRecord::from_bytes(b"\x0bversion=1.2\x04auth\x06empty=").unwrap();
        assert_eq!(txt.get("version").as_deref(), Some("1.2"));
        assert_eq!(txt.get_bytes("auth"), Some(&b""[..]));
        assert_eq!(txt.get_bytes("empty"), Some(&b""[..]));
        assert_eq!(txt.len(), 3);
    }

    #[test]
    fn test_keys_compare_case_insensitively() {
        let mut txt = TxtRecord::new();
        txt.insert("Model", "a").unwrap();
        txt.insert("model", "b").unwrap();
        assert_eq!(txt.len(), 1);
        assert_eq!(txt.get("MODEL").as_deref(), Some("b"));
        assert!(txt.remove("mOdEl"));
        assert!(txt.is_empty());
    }

    #[test]
    fn test_first_duplicate_wins_on_parse() {
        let txt = TxtRecord::from_bytes(b"\x03a=1\x03A=2").unwrap();
        assert_eq!(txt.get("a").as_deref(), Some("1"));
        assert_eq!(txt.len(), 1);
    }

    #[test]
    fn test_single_zero_byte_is_empty_record() {
        let txt = TxtRecord::from_bytes(&[0]).unwrap();
        assert!(txt.is_empty());
        assert!(TxtRecord::new().to_bytes().is_empty());
    }

    #[test]
    fn test_rejects_invalid_keys() {
        let mut txt = TxtRecord::new();
        assert!(matches!(txt.insert("", "x"), Err(TxtError::InvalidKey(_))));
        assert!(matches!(txt.insert("a=b", "x"), Err(TxtError::InvalidKey(_))));
        assert!(matches!(
            txt.insert("tab\there", "x"),
            Err(TxtError::InvalidKey(_))
        ));
        assert!(matches!(
            TxtRecord::from_bytes(b"\x02=x"),
            Err(TxtError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_rejects_truncated_entry() {
        assert_eq!(
            TxtRecord::from_bytes(b"\x05abc"),
            Err(TxtError::Truncated { offset: 0 })
        );
        assert_eq!(
            TxtRecord::from_bytes(b"\x02ab\x09abc"),
            Err(TxtError::Truncated { offset: 3 })
        );
    }

    #[test]
    fn test_rejects_oversized_entry() {
        let mut txt = TxtRecord::new();
        let value = vec![b'x'; 254];
        assert!(matches!(
            txt.insert("k", &value),
            Err(TxtError::EntryTooLong { ref key, len: 256 }) if key == "k"
        ));
        assert_eq!(
            txt.insert_flag(&"f".repeat(256)),
            Err(TxtError::EntryTooLong {
                key: "f".repeat(256),
                len: 256
            })
        );
        assert!(txt.insert("k", &value[..253]).is_ok());
    }

    #[test]
    fn test_rejects_oversized_record() {
        let mut txt = TxtRecord::new();
        let value = vec![b'v'; 240];
        let mut result = Ok(());
        for i in 0..300 {
            result = txt.insert(&format!("key{i}"), &value);
            if result.is_err() {
                break;
            }
        }
        assert!(matches!(result, Err(TxtError::RecordTooLong(_))));
        assert!(txt.to_bytes().len() <= MAX_RECORD_LEN);

        let huge = vec![0u8; MAX_RECORD_LEN + 1];
        assert_eq!(
            TxtRecord::from_bytes(&huge),
            Err(TxtError::RecordTooLong(MAX_RECORD_LEN + 1))
        );
    }

    #[test]
    fn test_iter_preserves_insertion_order() {
        let mut txt = TxtRecord::new();
        txt.insert("b", "2").unwrap();
        txt.insert("a", "1").unwrap();
        let keys: Vec<&str> = txt.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["b", "a"]);
    }
}
