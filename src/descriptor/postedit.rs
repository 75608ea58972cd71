// src/descriptor/postedit.rs

//! Post-build structural edit of the generated descriptor
//!
//! After the external build succeeds the descriptor is reshaped for
//! co-simulation-only delivery: the model-exchange capability element is
//! dropped, input variables lose their `initial` attribute, and output
//! variables are forced to `initial="calculated"` with the `start`
//! attribute stripped from their type element. Everything else passes
//! through untouched, whitespace included. Any parse or write failure is
//! fatal; packaging cannot continue without a valid descriptor.

use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::Causality;

/// Edit the descriptor file in place.
pub fn post_edit_descriptor(path: &Path) -> Result<()> {
    let text = std::fs::read_to_string(path)?;
    let edited = edit_descriptor_text(&text)?;
    std::fs::write(path, edited)?;
    debug!(path = %path.display(), "descriptor post-edit complete");
    Ok(())
}

/// Apply the co-simulation reshaping rules to a descriptor document.
///
/// Fails if the document is not well-formed or carries no model-exchange
/// element to remove.
pub fn edit_descriptor_text(text: &str) -> Result<String> {
    let mut reader = Reader::from_reader(text.as_bytes());
    let mut writer = Writer::new(Vec::new());
    let mut buf = Vec::new();

    let mut removed_model_exchange = false;
    // causality of the enclosing ScalarVariable, while inside one
    let mut causality: Option<Causality> = None;

    loop {
        let event = reader.read_event_into(&mut buf).map_err(|e| {
            Error::DescriptorEdit(format!(
                "parse error at byte {}: {}",
                reader.buffer_position(),
                e
            ))
        })?;
        match event {
            Event::Start(e) if e.name().as_ref() == b"ModelExchange" => {
                skip_subtree(&mut reader, b"ModelExchange")?;
                removed_model_exchange = true;
            }
            Event::Empty(e) if e.name().as_ref() == b"ModelExchange" => {
                removed_model_exchange = true;
            }
            Event::Start(ref e) if e.name().as_ref() == b"ScalarVariable" => {
                causality = read_causality(e)?;
                write_variable_start(&mut writer, e, causality, false)?;
            }
            Event::Empty(ref e) if e.name().as_ref() == b"ScalarVariable" => {
                let c = read_causality(e)?;
                write_variable_start(&mut writer, e, c, true)?;
            }
            Event::End(ref e) if e.name().as_ref() == b"ScalarVariable" => {
                causality = None;
                write_event(&mut writer, Event::End(e.to_owned()))?;
            }
            Event::Start(ref e)
                if causality == Some(Causality::Output) && is_type_element(e.name().as_ref()) =>
            {
                write_edited_start(&mut writer, e, b"start", None, false)?;
            }
            Event::Empty(ref e)
                if causality == Some(Causality::Output) && is_type_element(e.name().as_ref()) =>
            {
                write_edited_start(&mut writer, e, b"start", None, true)?;
            }
            Event::Eof => break,
            other => write_event(&mut writer, other)?,
        }
        buf.clear();
    }

    if !removed_model_exchange {
        return Err(Error::DescriptorEdit(
            "descriptor has no ModelExchange element to remove".to_string(),
        ));
    }

    String::from_utf8(writer.into_inner())
        .map_err(|e| Error::DescriptorEdit(format!("edited descriptor is not UTF-8: {}", e)))
}

fn write_variable_start(
    writer: &mut Writer<Vec<u8>>,
    e: &BytesStart<'_>,
    causality: Option<Causality>,
    empty: bool,
) -> Result<()> {
    match causality {
        Some(Causality::Input) => write_edited_start(writer, e, b"initial", None, empty),
        Some(Causality::Output) => {
            write_edited_start(writer, e, b"initial", Some(("initial", "calculated")), empty)
        }
        _ => {
            let event = if empty {
                Event::Empty(e.to_owned())
            } else {
                Event::Start(e.to_owned())
            };
            write_event(writer, event)
        }
    }
}

/// Rewrite a start tag with one attribute dropped and, optionally, one
/// appended. The remaining attributes keep their original order and raw
/// (still escaped) values.
fn write_edited_start(
    writer: &mut Writer<Vec<u8>>,
    e: &BytesStart<'_>,
    drop_attr: &[u8],
    set_attr: Option<(&str, &str)>,
    empty: bool,
) -> Result<()> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut elem = BytesStart::new(name);
    for attr in e.attributes() {
        let attr = attr.map_err(|err| {
            Error::DescriptorEdit(format!("malformed attribute in descriptor: {}", err))
        })?;
        if attr.key.as_ref() == drop_attr {
            continue;
        }
        if let Some((set_key, _)) = set_attr {
            if attr.key.as_ref() == set_key.as_bytes() {
                continue;
            }
        }
        elem.push_attribute(attr);
    }
    if let Some(pair) = set_attr {
        elem.push_attribute(pair);
    }

    let event = if empty {
        Event::Empty(elem)
    } else {
        Event::Start(elem)
    };
    write_event(writer, event)
}

fn write_event(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|e| Error::DescriptorEdit(format!("failed to write descriptor: {}", e)))
}

fn read_causality(e: &BytesStart<'_>) -> Result<Option<Causality>> {
    for attr in e.attributes() {
        let attr = attr.map_err(|err| {
            Error::DescriptorEdit(format!("malformed attribute in descriptor: {}", err))
        })?;
        if attr.key.as_ref() == b"causality" {
            let value = String::from_utf8_lossy(&attr.value);
            return value
                .parse::<Causality>()
                .map(Some)
                .map_err(|_| Error::DescriptorEdit(format!("unknown causality '{}'", value)));
        }
    }
    Ok(None)
}

fn is_type_element(name: &[u8]) -> bool {
    matches!(name, b"Real" | b"Integer" | b"Boolean" | b"String")
}

/// Consume events up to and including the matching end tag.
fn skip_subtree(reader: &mut Reader<&[u8]>, tag: &[u8]) -> Result<()> {
    let mut depth = 1usize;
    let mut buf = Vec::new();
    while depth > 0 {
        match reader.read_event_into(&mut buf).map_err(|e| {
            Error::DescriptorEdit(format!("parse error inside skipped element: {}", e))
        })? {
            Event::Start(e) if e.name().as_ref() == tag => depth += 1,
            Event::End(e) if e.name().as_ref() == tag => depth -= 1,
            Event::Eof => {
                return Err(Error::DescriptorEdit(format!(
                    "descriptor ended inside <{}>",
                    String::from_utf8_lossy(tag)
                )));
            }
            _ => {}
        }
        buf.clear();
    }
    Ok(())
}
