// src/template.rs

//! Placeholder substitution over template trees
//!
//! Template files carry `$$token$$` placeholders from a closed vocabulary.
//! Substitution is literal text replacement, split in two layers:
//!
//! - a global rename that replaces every occurrence of the template's base
//!   name (in file contents) with the model name, applied to every file
//! - per-file passes that compile the file against the [`Token`] vocabulary
//!   and render it with a prepared [`TokenValues`] table
//!
//! Compilation rejects unknown tokens instead of leaving them behind, so a
//! typo in a template surfaces as an error rather than as `$$garbage$$` in
//! generated output. Rendering is strictly single-pass: token values are
//! emitted verbatim and never re-scanned.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use strum_macros::{Display, EnumIter, EnumString};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Delimiter on both sides of a placeholder.
pub const TOKEN_MARKER: &str = "$$";

/// The closed placeholder vocabulary.
///
/// Descriptor templates use the identity and row tokens; source templates
/// use the code fragment tokens. `GUID` and `modelName` appear in both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
pub enum Token {
    #[strum(serialize = "dateandtime")]
    DateAndTime,
    #[strum(serialize = "GUID")]
    Guid,
    #[strum(serialize = "description")]
    Description,
    #[strum(serialize = "modelName")]
    ModelName,
    #[strum(serialize = "version")]
    Version,
    #[strum(serialize = "author")]
    Author,
    #[strum(serialize = "copyright")]
    Copyright,
    #[strum(serialize = "license")]
    License,
    #[strum(serialize = "scalarVariables")]
    ScalarVariables,
    #[strum(serialize = "outputDependencies")]
    OutputDependencies,
    #[strum(serialize = "variables")]
    Variables,
    #[strum(serialize = "initialization")]
    Initialization,
    #[strum(serialize = "funcArgs")]
    FuncArgs,
    #[strum(serialize = "funcArgs2")]
    FuncArgs2,
    #[strum(serialize = "sendBufferSection")]
    SendBufferSection,
    #[strum(serialize = "recvBufferSection")]
    RecvBufferSection,
    #[strum(serialize = "input_number")]
    InputNumber,
    #[strum(serialize = "output_number")]
    OutputNumber,
    #[strum(serialize = "initialStatesME")]
    InitialStatesMe,
    #[strum(serialize = "initialStatesCS")]
    InitialStatesCs,
    #[strum(serialize = "getInputVars")]
    GetInputVars,
    #[strum(serialize = "setOutputVars")]
    SetOutputVars,
}

/// Values for one substitution pass, keyed by token.
#[derive(Debug, Clone, Default)]
pub struct TokenValues {
    values: HashMap<Token, String>,
}

impl TokenValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Chainable insert, for building a full table in one expression.
    pub fn with(mut self, token: Token, value: impl Into<String>) -> Self {
        self.values.insert(token, value.into());
        self
    }

    pub fn insert(&mut self, token: Token, value: impl Into<String>) {
        self.values.insert(token, value.into());
    }

    pub fn get(&self, token: Token) -> Option<&str> {
        self.values.get(&token).map(|s| s.as_str())
    }

    pub fn contains(&self, token: Token) -> bool {
        self.values.contains_key(&token)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
struct Span {
    start: usize,
    end: usize,
    token: Token,
}

/// A template text compiled against the token vocabulary.
///
/// Compilation records every `$$token$$` span. Marker pairs whose body is
/// not a bare word (empty, whitespace, punctuation, newlines) are ordinary
/// text; marker pairs whose body is a word outside the vocabulary are a
/// compile error.
#[derive(Debug, Clone)]
pub struct Template {
    text: String,
    spans: Vec<Span>,
}

impl Template {
    pub fn compile(text: &str) -> Result<Self> {
        let mut spans = Vec::new();
        let mut pos = 0;
        while let Some(rel) = text[pos..].find(TOKEN_MARKER) {
            let open = pos + rel;
            let body_start = open + TOKEN_MARKER.len();
            let Some(rel_close) = text[body_start..].find(TOKEN_MARKER) else {
                // unpaired trailing marker stays literal
                break;
            };
            let close = body_start + rel_close;
            let body = &text[body_start..close];
            if !body.is_empty() && body.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                let token =
                    Token::from_str(body).map_err(|_| Error::UnknownToken(body.to_string()))?;
                spans.push(Span {
                    start: open,
                    end: close + TOKEN_MARKER.len(),
                    token,
                });
                pos = close + TOKEN_MARKER.len();
            } else {
                // the opening marker is literal text; the closing candidate
                // may still open a real token, so rescan from it
                pos = body_start;
            }
        }
        Ok(Self {
            text: text.to_string(),
            spans,
        })
    }

    /// Tokens in occurrence order, repeats included.
    pub fn tokens(&self) -> impl Iterator<Item = Token> + '_ {
        self.spans.iter().map(|s| s.token)
    }

    pub fn has_tokens(&self) -> bool {
        !self.spans.is_empty()
    }

    /// Replace every recorded span with its value. Fails if any token in
    /// the template has no entry in `values`.
    pub fn render(&self, values: &TokenValues) -> Result<String> {
        let mut out = String::with_capacity(self.text.len());
        let mut last = 0;
        for span in &self.spans {
            out.push_str(&self.text[last..span.start]);
            let value = values
                .get(span.token)
                .ok_or_else(|| Error::UnresolvedToken(span.token.to_string()))?;
            out.push_str(value);
            last = span.end;
        }
        out.push_str(&self.text[last..]);
        Ok(out)
    }
}

/// One per-file substitution pass: which file name it applies to and the
/// token values rendered into it.
#[derive(Debug, Clone)]
pub struct FilePass {
    pub file_name: String,
    pub values: TokenValues,
}

/// Substitution over a whole copied template tree.
///
/// Walks every file under the root, applies the global base-name rename to
/// the contents, and runs the matching [`FilePass`] (if any) on top. Files
/// without a pass keep their placeholders untouched.
#[derive(Debug, Clone)]
pub struct TreeSubstitution {
    base_name: String,
    model_name: String,
    passes: Vec<FilePass>,
}

impl TreeSubstitution {
    pub fn new(base_name: impl Into<String>, model_name: impl Into<String>) -> Self {
        Self {
            base_name: base_name.into(),
            model_name: model_name.into(),
            passes: Vec::new(),
        }
    }

    /// Register a per-file pass, matched by bare file name anywhere in the
    /// tree.
    pub fn pass(mut self, file_name: impl Into<String>, values: TokenValues) -> Self {
        self.passes.push(FilePass {
            file_name: file_name.into(),
            values,
        });
        self
    }

    /// Rewrite every file under `root` in place.
    ///
    /// Template trees are text by contract; a file that is not valid UTF-8
    /// fails the run with a template I/O error.
    pub fn apply(&self, root: &Path) -> Result<()> {
        for entry in WalkDir::new(root) {
            let entry = entry.map_err(std::io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let original = std::fs::read_to_string(path).map_err(|e| Error::TemplateIo {
                path: path.to_path_buf(),
                source: e,
            })?;

            let mut text = original.replace(&self.base_name, &self.model_name);

            let file_name = entry.file_name().to_string_lossy();
            if let Some(pass) = self.passes.iter().find(|p| p.file_name == file_name) {
                let template = Template::compile(&text)?;
                debug!(
                    file = %path.display(),
                    tokens = template.spans.len(),
                    "rendering template pass"
                );
                text = template.render(&pass.values)?;
            }

            if text != original {
                std::fs::write(path, text).map_err(|e| Error::TemplateIo {
                    path: path.to_path_buf(),
                    source: e,
                })?;
            }
        }
        Ok(())
    }
}
