//! Ringtone index plist codec (spec §6.4): `Ringtones.plist` is a small,
//! fixed-shape slice of Apple's XML property-list format — a `dict`
//! keyed by remote filename, each value itself a `dict` of `Name`,
//! `Total Time`, `PID`, `Protected Content` and `GUID`. This is not a
//! general plist parser; it only understands the one shape this catalog
//! ever writes, the same way [`crate::catalog::ringtone`] only understands
//! one row shape.
//!
//! Grounded on the XSPF decoder's `quick_xml::Reader` event loop and
//! path-stack matching.

use std::collections::BTreeMap;
use std::io::Cursor;

use quick_xml::escape::unescape;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::RingtonePlistError;

/// One ringtone's entry in the index, keyed by remote filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingtonePlistEntry {
    pub name: String,
    pub total_time_ms: i64,
    pub pid: i64,
    pub guid: i64,
}

/// Temporary storage while a `dict` entry is still being read.
#[derive(Debug, Default)]
struct PendingEntry {
    name: Option<String>,
    total_time_ms: Option<i64>,
    pid: Option<i64>,
    guid: Option<i64>,
}

impl PendingEntry {
    fn try_into_entry(self) -> Option<RingtonePlistEntry> {
        Some(RingtonePlistEntry {
            name: self.name?,
            total_time_ms: self.total_time_ms?,
            pid: self.pid?,
            guid: self.guid?,
        })
    }
}

/// The full `Ringtones.plist` contents: a map from remote filename to its
/// entry. A `BTreeMap` keeps re-encoding deterministic, which matters
/// since this file is rewritten on every merge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RingtonePlist {
    entries: BTreeMap<String, RingtonePlistEntry>,
}

fn parse_int(field: &'static str, text: &str) -> Result<i64, RingtonePlistError> {
    text.trim()
        .parse::<i64>()
        .map_err(|source| RingtonePlistError::InvalidInteger { field, source })
}

impl RingtonePlist {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, remote_filename: &str) -> Option<&RingtonePlistEntry> {
        self.entries.get(remote_filename)
    }

    pub fn upsert(&mut self, remote_filename: String, entry: RingtonePlistEntry) {
        self.entries.insert(remote_filename, entry);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Decode an existing `Ringtones.plist`. An absent key inside an
    /// entry `dict` (malformed device state) drops that one entry rather
    /// than failing the whole file — ghosts in the ringtone index are no
    /// worse than ghosts in the catalog.
    pub fn decode(xml: &str) -> Result<Self, RingtonePlistError> {
        let mut entries = BTreeMap::new();

        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);
        let mut xml_stack: Vec<String> = Vec::with_capacity(6);
        let mut buf = Vec::new();
        let decoder = reader.decoder();

        // Depths: plist(1) / dict(2, root) / dict(3, keyed by remote
        // filename) / dict(4, one ringtone's fields).
        let mut pending_key: Option<String> = None;
        let mut current_filename: Option<String> = None;
        let mut current_entry = PendingEntry::default();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(ref e) => {
                    xml_stack.push(decoder.decode(e.name().as_ref())?.to_lowercase());
                }
                Event::End(_) => {
                    let path = xml_stack.join("/");
                    if path == "plist/dict/dict/dict" {
                        if let Some(filename) = current_filename.take() {
                            if let Some(entry) = std::mem::take(&mut current_entry).try_into_entry() {
                                entries.insert(filename, entry);
                            } else {
                                warn!("ringtone plist entry for {filename} missing required fields, dropping it");
                            }
                        }
                        current_entry = PendingEntry::default();
                    }
                    xml_stack.pop();
                }
                Event::Text(e) => {
                    let path = xml_stack.join("/");
                    let decoded = decoder.decode(&e)?;
                    let text = unescape(&decoded)
                        .map_err(|err| RingtonePlistError::Malformed(format!("bad xml entity: {err}")))?
                        .to_string();
                    match path.as_str() {
                        "plist/dict/dict/key" => current_filename = Some(text),
                        "plist/dict/dict/dict/key" => pending_key = Some(text),
                        "plist/dict/dict/dict/string" => {
                            if pending_key.take().as_deref() == Some("Name") {
                                current_entry.name = Some(text);
                            }
                        }
                        "plist/dict/dict/dict/integer" => match pending_key.take().as_deref() {
                            Some("Total Time") => {
                                current_entry.total_time_ms = Some(parse_int("Total Time", &text)?);
                            }
                            Some("PID") => current_entry.pid = Some(parse_int("PID", &text)?),
                            Some("GUID") => current_entry.guid = Some(parse_int("GUID", &text)?),
                            _ => {}
                        },
                        _ => {}
                    }
                }
                Event::Eof => break,
                _ => (),
            }
            buf.clear();
        }

        Ok(Self { entries })
    }

    /// Re-encode to the same fixed shape [`Self::decode`] reads.
    pub fn encode(&self) -> Result<String, RingtonePlistError> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

        write_start(&mut writer, "plist")?;
        write_start(&mut writer, "dict")?;
        write_key(&mut writer, "Ringtones")?;
        write_start(&mut writer, "dict")?;

        for (filename, entry) in &self.entries {
            write_key(&mut writer, filename)?;
            write_start(&mut writer, "dict")?;
            write_key(&mut writer, "Name")?;
            write_string(&mut writer, &entry.name)?;
            write_key(&mut writer, "Total Time")?;
            write_integer(&mut writer, entry.total_time_ms)?;
            write_key(&mut writer, "PID")?;
            write_integer(&mut writer, entry.pid)?;
            write_key(&mut writer, "Protected Content")?;
            writer.write_event(Event::Empty(BytesStart::new("false")))?;
            write_key(&mut writer, "GUID")?;
            write_integer(&mut writer, entry.guid)?;
            write_end(&mut writer, "dict")?;
        }

        write_end(&mut writer, "dict")?;
        write_end(&mut writer, "dict")?;
        write_end(&mut writer, "plist")?;

        let bytes = writer.into_inner().into_inner();
        String::from_utf8(bytes)
            .map_err(|err| RingtonePlistError::Malformed(format!("non-utf8 plist output: {err}")))
    }
}

fn write_start(writer: &mut Writer<Cursor<Vec<u8>>>, name: &str) -> Result<(), RingtonePlistError> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    Ok(())
}

fn write_end(writer: &mut Writer<Cursor<Vec<u8>>>, name: &str) -> Result<(), RingtonePlistError> {
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn write_key(writer: &mut Writer<Cursor<Vec<u8>>>, text: &str) -> Result<(), RingtonePlistError> {
    write_start(writer, "key")?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    write_end(writer, "key")
}

fn write_string(writer: &mut Writer<Cursor<Vec<u8>>>, text: &str) -> Result<(), RingtonePlistError> {
    write_start(writer, "string")?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    write_end(writer, "string")
}

fn write_integer(writer: &mut Writer<Cursor<Vec<u8>>>, value: i64) -> Result<(), RingtonePlistError> {
    write_start(writer, "integer")?;
    writer.write_event(Event::Text(BytesText::new(&value.to_string())))?;
    write_end(writer, "integer")
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{RingtonePlist, RingtonePlistEntry};

    fn sample_xml() -> &'static str {
        r#"<?xml version="1.0" encoding="UTF-8"?>
<plist version="1.0">
<dict>
    <key>Ringtones</key>
    <dict>
        <key>ABCD.m4r</key>
        <dict>
            <key>Name</key>
            <string>Alarm</string>
            <key>Total Time</key>
            <integer>30000</integer>
            <key>PID</key>
            <integer>1234567890123456789</integer>
            <key>Protected Content</key>
            <false/>
            <key>GUID</key>
            <integer>9876543210987654321</integer>
        </dict>
    </dict>
</dict>
</plist>"#
    }

    #[test]
    fn decode_reads_single_entry() {
        let plist = RingtonePlist::decode(sample_xml()).unwrap();
        assert_eq!(plist.len(), 1);
        let entry = plist.get("ABCD.m4r").unwrap();
        assert_eq!(entry.name, "Alarm");
        assert_eq!(entry.total_time_ms, 30_000);
        assert_eq!(entry.pid, 1_234_567_890_123_456_789);
        assert_eq!(entry.guid, 9_876_543_210_987_654_321);
    }

    #[test]
    fn encode_then_decode_roundtrips_entries() {
        let mut plist = RingtonePlist::new();
        plist.upsert(
            "WXYZ.m4r".to_string(),
            RingtonePlistEntry {
                name: "Marimba".to_string(),
                total_time_ms: 21_000,
                pid: 1_000_000_000_000_000_001,
                guid: 2_000_000_000_000_000_002,
            },
        );

        let xml = plist.encode().unwrap();
        let decoded = RingtonePlist::decode(&xml).unwrap();
        assert_eq!(decoded, plist);
    }

    #[test]
    fn empty_plist_round_trips() {
        let plist = RingtonePlist::new();
        let xml = plist.encode().unwrap();
        let decoded = RingtonePlist::decode(&xml).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn upsert_overwrites_existing_entry() {
        let mut plist = RingtonePlist::new();
        plist.upsert(
            "ABCD.m4r".to_string(),
            RingtonePlistEntry {
                name: "Old".to_string(),
                total_time_ms: 1,
                pid: 1,
                guid: 1,
            },
        );
        plist.upsert(
            "ABCD.m4r".to_string(),
            RingtonePlistEntry {
                name: "New".to_string(),
                total_time_ms: 2,
                pid: 2,
                guid: 2,
            },
        );
        assert_eq!(plist.len(), 1);
        assert_eq!(plist.get("ABCD.m4r").unwrap().name, "New");
    }
}
