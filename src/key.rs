//! Comparison keys for word records.

use crate::models::WordRecord;
use unicode_normalization::UnicodeNormalization;

/// Joins feature values inside a key. ASCII unit separator, never part of the text.
pub const KEY_SEPARATOR: char = '\u{1F}';

/// Build the comparison key for a word from the named features, in order.
///
/// Each value is NFC-normalized so precomposed and combining accent forms
/// compare equal. Absent features contribute an empty string.
pub fn build_key<W: WordRecord + ?Sized>(record: &W, feature_names: &[String]) -> String {
    let mut key = String::new();
    for (i, name) in feature_names.iter().enumerate() {
        if i > 0 {
            key.push(KEY_SEPARATOR);
        }
        if let Some(value) = record.feature(name) {
            let text: &str = &value;
            key.extend(text.nfc());
        }
    }
    key
}

/// Keys for a whole verse.
pub fn build_keys<W: WordRecord>(records: &[W], feature_names: &[String]) -> Vec<String> {
    records
        .iter()
        .map(|r| build_key(r, feature_names))
        .collect()
}
