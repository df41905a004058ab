//! Canonical, byte-stable JSON encoding.
//!
//! Object keys are always emitted in byte order, independent of how the map was built or whether
//! `serde_json` preserves insertion order. Strings are escaped the way web-safe JSON encoders do
//! (`<`, `>`, `&`, U+2028 and U+2029 become `\u` escapes) so identities derived from the bytes match
//! those produced by earlier deployments.

use std::collections::BTreeMap;
use std::io;

use serde::{Serialize, Serializer};
use serde_json::Value;
use serde_json::ser::{CharEscape, Formatter};
use wfgate_types::ArgumentSet;

/// Canonical bytes of an argument set: a compact JSON object with sorted keys.
pub fn canonical_arguments(args: &ArgumentSet) -> Vec<u8> {
    let sorted: BTreeMap<&str, &str> = args.iter().map(|(key, value)| (key.as_str(), value.as_str())).collect();
    encode(&sorted)
}

/// [`canonical_arguments`] as a `String`, for storage next to cache rows.
pub fn canonical_arguments_string(args: &ArgumentSet) -> String {
    // The encoder only ever writes valid UTF-8.
    String::from_utf8_lossy(&canonical_arguments(args)).into_owned()
}

/// Canonical bytes of an arbitrary JSON value.
pub fn canonical_value(value: &Value) -> Vec<u8> {
    encode(&SortedKeys(value))
}

fn encode<T: Serialize + ?Sized>(value: &T) -> Vec<u8> {
    let mut serializer = serde_json::Serializer::with_formatter(Vec::new(), WebSafeFormatter);
    match value.serialize(&mut serializer) {
        Ok(()) => serializer.into_inner(),
        // Strings and maps serialized into memory have no failure path.
        Err(_) => Vec::new(),
    }
}

/// Serializes a [`Value`] with every object's keys in byte order, whatever map `serde_json` uses.
struct SortedKeys<'a>(&'a Value);

impl Serialize for SortedKeys<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Value::Array(items) => serializer.collect_seq(items.iter().map(SortedKeys)),
            Value::Object(object) => {
                let sorted: BTreeMap<&str, SortedKeys<'_>> =
                    object.iter().map(|(key, value)| (key.as_str(), SortedKeys(value))).collect();
                serializer.collect_map(sorted)
            }
            scalar => scalar.serialize(serializer),
        }
    }
}

/// Compact formatter that also escapes `<`, `>`, `&`, U+2028 and U+2029, and writes control
/// characters other than `\n`, `\r` and `\t` as `\u00XX`.
struct WebSafeFormatter;

impl Formatter for WebSafeFormatter {
    fn write_string_fragment<W: ?Sized + io::Write>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()> {
        let mut start = 0;
        for (index, character) in fragment.char_indices() {
            let escape = match character {
                '<' => "\\u003c",
                '>' => "\\u003e",
                '&' => "\\u0026",
                '\u{2028}' => "\\u2028",
                '\u{2029}' => "\\u2029",
                _ => continue,
            };
            writer.write_all(fragment[start..index].as_bytes())?;
            writer.write_all(escape.as_bytes())?;
            start = index + character.len_utf8();
        }
        writer.write_all(fragment[start..].as_bytes())
    }

    fn write_char_escape<W: ?Sized + io::Write>(&mut self, writer: &mut W, char_escape: CharEscape) -> io::Result<()> {
        let byte = match char_escape {
            CharEscape::Quote => return writer.write_all(b"\\\""),
            CharEscape::ReverseSolidus => return writer.write_all(b"\\\\"),
            CharEscape::Solidus => return writer.write_all(b"\\/"),
            CharEscape::LineFeed => return writer.write_all(b"\\n"),
            CharEscape::CarriageReturn => return writer.write_all(b"\\r"),
            CharEscape::Tab => return writer.write_all(b"\\t"),
            CharEscape::Backspace => 0x08,
            CharEscape::FormFeed => 0x0c,
            CharEscape::AsciiControl(byte) => byte,
        };
        const HEX: &[u8; 16] = b"0123456789abcdef";
        writer.write_all(&[b'\\', b'u', b'0', b'0', HEX[usize::from(byte >> 4)], HEX[usize::from(byte & 0xf)]])
    }
}
