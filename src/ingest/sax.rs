//! Push-style event interface over the `quick-xml` pull reader.
//!
//! The driver owns document-level well-formedness (single root, nothing but
//! whitespace outside it, every element closed, prolog-only declarations,
//! legal names and characters, predefined entities only). Handlers only ever
//! see a well-formed prefix of the document; the first malformation stops the
//! drive with `IngestError::Parse`.

use std::io::BufRead;

use quick_xml::escape;
use quick_xml::events::{BytesRef, BytesStart, Event};
use quick_xml::Reader;

use super::xmlchar::{check_attribute_syntax, find_illegal_char, is_name, is_xml_char};
use crate::error::IngestError;

/// Receiver of document events, one call per event, in document order
pub trait ContentHandler {
    /// An element opened. `attributes` holds unescaped `(name, value)` pairs in
    /// the order they appear in the start tag.
    fn start_element(&mut self, name: &str, attributes: &[(String, String)]) -> Result<(), IngestError>;

    /// The innermost open element closed
    fn end_element(&mut self, name: &str) -> Result<(), IngestError>;

    /// Character data inside the root element
    fn characters(&mut self, _text: &str) -> Result<(), IngestError> {
        Ok(())
    }
}

/// Stream `source` through `handler` in a single pass.
///
/// Memory use is bounded by the largest single event, not the document.
pub fn drive<R: BufRead, H: ContentHandler>(source: R, handler: &mut H) -> Result<(), IngestError> {
    let mut reader = Reader::from_reader(source);
    reader.config_mut().expand_empty_elements = true;
    reader.config_mut().check_end_names = true;

    let mut buf = Vec::with_capacity(4096);
    let mut attributes: Vec<(String, String)> = Vec::new();
    let mut depth: usize = 0;
    let mut seen_root = false;
    let mut seen_doctype = false;
    let mut at_start = true;

    loop {
        let event = reader.read_event_into(&mut buf).map_err(|e| {
            IngestError::Parse(format!("{} (at byte {})", e, reader.buffer_position()))
        })?;

        match event {
            Event::Start(e) => {
                if depth == 0 && seen_root {
                    return Err(parse_error(&reader, "junk after document element"));
                }
                let name = element_name(&e, &reader)?;
                check_attribute_syntax(e.attributes_raw()).map_err(|msg| parse_error(&reader, msg))?;
                read_attributes(&e, &reader, &mut attributes)?;
                handler.start_element(&name, &attributes)?;
                seen_root = true;
                depth += 1;
            }
            Event::End(e) => {
                if depth == 0 {
                    return Err(parse_error(&reader, "end tag outside the document element"));
                }
                let qname = e.name();
                let name = std::str::from_utf8(qname.as_ref())
                    .map_err(|err| IngestError::Parse(format!("invalid UTF-8 in element name: {}", err)))?;
                handler.end_element(name)?;
                depth -= 1;
            }
            Event::Text(e) => {
                let text = e
                    .decode()
                    .map_err(|err| parse_error(&reader, &format!("invalid text: {}", err)))?;
                check_chars(&reader, &text)?;
                text_event(&reader, depth, &text, handler)?;
            }
            Event::CData(e) => {
                if depth == 0 {
                    return Err(parse_error(&reader, "CDATA outside the document element"));
                }
                let text = e
                    .decode()
                    .map_err(|err| parse_error(&reader, &format!("invalid CDATA: {}", err)))?;
                check_chars(&reader, &text)?;
                handler.characters(&text)?;
            }
            Event::GeneralRef(e) => {
                if depth == 0 {
                    return Err(parse_error(&reader, "reference outside the document element"));
                }
                let text = resolve_reference(&e, &reader)?;
                handler.characters(&text)?;
            }
            Event::Decl(_) => {
                if !at_start {
                    return Err(parse_error(&reader, "XML declaration not at start of document"));
                }
            }
            Event::DocType(_) => {
                if seen_root || seen_doctype {
                    return Err(parse_error(&reader, "DOCTYPE must appear once, before the document element"));
                }
                seen_doctype = true;
            }
            Event::PI(e) => {
                if e.target().eq_ignore_ascii_case(b"xml") {
                    return Err(parse_error(&reader, "reserved processing instruction target"));
                }
            }
            Event::Eof => break,
            // Comments carry no structure; empty elements arrive expanded.
            Event::Comment(_) | Event::Empty(_) => {}
        }
        at_start = false;
        buf.clear();
    }

    if !seen_root {
        return Err(IngestError::Parse("no element found".to_string()));
    }
    if depth > 0 {
        return Err(IngestError::Parse(format!(
            "unexpected end of document: {} element(s) not closed",
            depth
        )));
    }
    Ok(())
}

fn text_event<R, H: ContentHandler>(
    reader: &Reader<R>,
    depth: usize,
    text: &str,
    handler: &mut H,
) -> Result<(), IngestError> {
    if depth > 0 {
        return handler.characters(text);
    }
    // A UTF-8 byte order mark may surface as text before the prolog
    if !text.trim_start_matches('\u{feff}').trim().is_empty() {
        return Err(parse_error(reader, "text outside the document element"));
    }
    Ok(())
}

fn check_chars<R>(reader: &Reader<R>, text: &str) -> Result<(), IngestError> {
    match find_illegal_char(text) {
        Some(c) => Err(parse_error(reader, &format!("illegal character U+{:04X}", c as u32))),
        None => Ok(()),
    }
}

/// Character references and the five predefined entities. Entities declared in
/// a DOCTYPE are not expanded and count as undefined.
fn resolve_reference<R>(reference: &BytesRef<'_>, reader: &Reader<R>) -> Result<String, IngestError> {
    if reference.is_char_ref() {
        let resolved = reference
            .resolve_char_ref()
            .map_err(|e| parse_error(reader, &format!("bad character reference: {}", e)))?;
        return match resolved {
            Some(c) if is_xml_char(c) => Ok(c.to_string()),
            _ => Err(parse_error(reader, "reference to illegal character")),
        };
    }
    let name = reference
        .decode()
        .map_err(|e| parse_error(reader, &format!("invalid entity name: {}", e)))?;
    escape::resolve_predefined_entity(&name)
        .map(str::to_string)
        .ok_or_else(|| parse_error(reader, &format!("undefined entity '{}'", name)))
}

fn element_name<R>(start: &BytesStart<'_>, reader: &Reader<R>) -> Result<String, IngestError> {
    let qname = start.name();
    let name = std::str::from_utf8(qname.as_ref())
        .map_err(|e| IngestError::Parse(format!("invalid UTF-8 in element name: {}", e)))?;
    if !is_name(name) {
        return Err(parse_error(reader, &format!("invalid element name '{}'", name)));
    }
    Ok(name.to_string())
}

/// Decode the attributes of `start` into `out`, replacing its contents.
/// Duplicate names and unknown entities are rejected by `quick-xml`.
fn read_attributes<R>(
    start: &BytesStart<'_>,
    reader: &Reader<R>,
    out: &mut Vec<(String, String)>,
) -> Result<(), IngestError> {
    out.clear();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| parse_error(reader, &format!("bad attribute: {}", e)))?;
        let name = std::str::from_utf8(attr.key.as_ref())
            .map_err(|e| IngestError::Parse(format!("invalid UTF-8 in attribute name: {}", e)))?
            .to_string();
        if !is_name(&name) {
            return Err(parse_error(reader, &format!("invalid attribute name '{}'", name)));
        }
        let value = attr
            .decode_and_unescape_value(reader.decoder())
            .map_err(|e| parse_error(reader, &format!("bad value for attribute '{}': {}", name, e)))?
            .into_owned();
        if let Some(c) = find_illegal_char(&value) {
            return Err(parse_error(
                reader,
                &format!("illegal character U+{:04X} in attribute '{}'", c as u32, name),
            ));
        }
        out.push((name, value));
    }
    Ok(())
}

fn parse_error<R>(reader: &Reader<R>, message: &str) -> IngestError {
    IngestError::Parse(format!("{} (at byte {})", message, reader.buffer_position()))
}
