//! FMU archive introspection.
//!
//! Opens a packaged `.fmu`, extracts its descriptor and reads the declared
//! variables back into model form. Only input and output variables are
//! carried over: introspection answers "what does this FMU consume and
//! produce", which feeds the `inspect` command and the complement-model
//! synthesis. Value references are reset to the automatic sentinel since a
//! regenerated model renumbers them anyway.

use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::debug;
use zip::ZipArchive;

use crate::descriptor::DESCRIPTOR_FILE_NAME;
use crate::error::{Error, Result};
use crate::model::{
    AUTO_VALUE_REF, Causality, Initial, ModelSpec, ScalarVariable, VarType, Variability,
};

/// Read the variable model out of an existing FMU archive.
pub fn read_model(path: &Path) -> Result<ModelSpec> {
    if !path.is_file() {
        return Err(Error::MissingInput(path.display().to_string()));
    }
    let file = std::fs::File::open(path)?;
    let mut archive = ZipArchive::new(file)
        .map_err(|e| Error::ArchiveAssembly(format!("cannot open {}: {}", path.display(), e)))?;
    let mut descriptor = archive.by_name(DESCRIPTOR_FILE_NAME).map_err(|e| {
        Error::ArchiveAssembly(format!(
            "{} has no {}: {}",
            path.display(),
            DESCRIPTOR_FILE_NAME,
            e
        ))
    })?;
    let mut text = String::new();
    descriptor.read_to_string(&mut text)?;
    drop(descriptor);

    let model = parse_descriptor(&text)?;
    debug!(
        fmu = %path.display(),
        variables = model.variables.len(),
        "read model description"
    );
    Ok(model)
}

/// Parse a model description document into model form.
///
/// Keeps input and output variables only. Foreign descriptors are taken
/// as found: absent `variability` means continuous, absent `initial` means
/// none, absent `start` falls back to `"0"`. A type element other than the
/// four scalar kinds is something this generator cannot express and is
/// reported as [`Error::UnknownType`].
pub fn parse_descriptor(text: &str) -> Result<ModelSpec> {
    let mut reader = Reader::from_reader(text.as_bytes());
    let mut buf = Vec::new();

    let mut model_name: Option<String> = None;
    let mut description = String::new();
    let mut variables = Vec::new();
    // attributes of the enclosing ScalarVariable, while inside a kept one
    let mut pending: Option<PendingVariable> = None;

    loop {
        let event = reader.read_event_into(&mut buf).map_err(|e| {
            Error::MalformedInput(format!(
                "invalid model description at byte {}: {}",
                reader.buffer_position(),
                e
            ))
        })?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e)
                if e.name().as_ref() == b"fmiModelDescription" =>
            {
                model_name = Some(attr_value(e, b"modelName")?.ok_or_else(|| {
                    Error::MalformedInput("fmiModelDescription has no modelName".to_string())
                })?);
                description = attr_value(e, b"description")?.unwrap_or_default();
            }
            Event::Start(ref e) if e.name().as_ref() == b"ScalarVariable" => {
                pending = PendingVariable::from_attributes(e)?;
            }
            Event::Empty(ref e) if e.name().as_ref() == b"ScalarVariable" => {
                if let Some(var) = PendingVariable::from_attributes(e)? {
                    return Err(Error::MalformedInput(format!(
                        "variable '{}' has no type element",
                        var.name
                    )));
                }
            }
            Event::End(ref e) if e.name().as_ref() == b"ScalarVariable" => {
                if let Some(var) = pending.take() {
                    variables.push(var.finish()?);
                }
            }
            Event::Start(ref e)
                if pending.is_some() && e.name().as_ref() == b"Annotations" =>
            {
                skip_subtree(&mut reader, b"Annotations")?;
            }
            Event::Empty(ref e)
                if pending.is_some() && e.name().as_ref() == b"Annotations" => {}
            Event::Start(ref e) | Event::Empty(ref e) if pending.is_some() => {
                if let Some(var) = pending.as_mut() {
                    var.apply_type_element(e)?;
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    let model_name = model_name.ok_or_else(|| {
        Error::MalformedInput("document has no fmiModelDescription element".to_string())
    })?;
    Ok(ModelSpec {
        model_name,
        description,
        variables,
    })
}

/// A ScalarVariable being read, before its type element is known.
struct PendingVariable {
    name: String,
    causality: Causality,
    variability: Variability,
    initial: Option<Initial>,
    description: String,
    var_type: Option<VarType>,
    start_value: Option<String>,
    unit: String,
}

impl PendingVariable {
    /// Capture a ScalarVariable start tag. Returns `None` when the
    /// variable is neither an input nor an output.
    fn from_attributes(e: &BytesStart<'_>) -> Result<Option<Self>> {
        let causality = match attr_value(e, b"causality")?.as_deref() {
            Some("input") => Causality::Input,
            Some("output") => Causality::Output,
            _ => return Ok(None),
        };
        let name = attr_value(e, b"name")?.ok_or_else(|| {
            Error::MalformedInput("ScalarVariable without a name".to_string())
        })?;
        let variability = match attr_value(e, b"variability")? {
            Some(text) => Variability::from_str(&text).map_err(|_| {
                Error::MalformedInput(format!(
                    "variable '{}' has unknown variability '{}'",
                    name, text
                ))
            })?,
            None => Variability::Continuous,
        };
        let initial = match attr_value(e, b"initial")? {
            Some(text) if !text.is_empty() => Some(Initial::from_str(&text).map_err(|_| {
                Error::MalformedInput(format!(
                    "variable '{}' has unknown initial '{}'",
                    name, text
                ))
            })?),
            _ => None,
        };
        let description = attr_value(e, b"description")?.unwrap_or_default();
        Ok(Some(Self {
            name,
            causality,
            variability,
            initial,
            description,
            var_type: None,
            start_value: None,
            unit: String::new(),
        }))
    }

    /// Record the nested type element.
    fn apply_type_element(&mut self, e: &BytesStart<'_>) -> Result<()> {
        let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
        let var_type = VarType::from_str(&name).map_err(|_| Error::UnknownType(name))?;
        self.var_type = Some(var_type);
        self.start_value = attr_value(e, b"start")?;
        if var_type == VarType::Real {
            self.unit = attr_value(e, b"unit")?.unwrap_or_default();
        }
        Ok(())
    }

    fn finish(self) -> Result<ScalarVariable> {
        let var_type = self.var_type.ok_or_else(|| {
            Error::MalformedInput(format!("variable '{}' has no type element", self.name))
        })?;
        Ok(ScalarVariable {
            name: self.name,
            value_ref: AUTO_VALUE_REF,
            variability: self.variability,
            causality: self.causality,
            initial: self.initial,
            var_type,
            start_value: self.start_value.unwrap_or_else(|| "0".to_string()),
            description: self.description,
            unit: self.unit,
        })
    }
}

fn attr_value(e: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>> {
    for attr in e.attributes() {
        let attr = attr.map_err(|err| {
            Error::MalformedInput(format!("malformed attribute in model description: {}", err))
        })?;
        if attr.key.as_ref() == key {
            let value = attr.unescape_value().map_err(|err| {
                Error::MalformedInput(format!("malformed attribute value: {}", err))
            })?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

/// Consume events up to and including the matching end tag.
fn skip_subtree(reader: &mut Reader<&[u8]>, tag: &[u8]) -> Result<()> {
    let mut depth = 1usize;
    let mut buf = Vec::new();
    while depth > 0 {
        match reader.read_event_into(&mut buf).map_err(|e| {
            Error::MalformedInput(format!("invalid model description: {}", e))
        })? {
            Event::Start(e) if e.name().as_ref() == tag => depth += 1,
            Event::End(e) if e.name().as_ref() == tag => depth -= 1,
            Event::Eof => {
                return Err(Error::MalformedInput(format!(
                    "document ended inside <{}>",
                    String::from_utf8_lossy(tag)
                )));
            }
            _ => {}
        }
        buf.clear();
    }
    Ok(())
}
