//! # Code Emitter
//!
//! Renders the header and source files from a [`TemplateContext`]. Every
//! value the templates print is computed before rendering; the templates
//! only lay text out. The two templates are compiled into the binary.

use std::collections::HashMap;

use pal_settings_core::SettingsError;
use serde::Serialize;
use tera::{Context, Tera, Value};

use crate::normalize::{PreparedConstant, PreparedEnum, PreparedSetting, PreparedTag, SettingEntry};

/// Registry scope used by PAL reads when a setting declares none.
pub const DEFAULT_PAL_SCOPE: &str = "PrivatePalKey";

const HEADER_TEMPLATE: &str = "settings.h";
const SOURCE_TEMPLATE: &str = "settings.cpp";

/// Everything the templates can reference.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TemplateContext {
    pub component_name: String,
    pub component_name_lower: String,
    pub class_name: String,
    pub namespaces: Vec<String>,
    pub is_pal_settings: bool,
    pub include_headers: Vec<String>,
    /// File name of the generated header, `g_<name>.h`.
    pub code_gen_header: String,
    /// Hand-written header declaring [`Self::class_name`].
    pub settings_header: String,
    pub is_encoded: bool,
    pub magic_offset: u32,
    pub magic_buffer_id: u32,
    /// Comma-joined blob bytes.
    pub settings_blob: String,
    pub settings_blob_size: usize,
    pub settings_blob_hash: u64,
    pub num_settings: usize,
    pub enums: Vec<PreparedEnum>,
    pub constants: Vec<PreparedConstant>,
    pub settings: Vec<SettingEntry>,
    /// Every leaf of [`Self::settings`] in declaration order.
    pub all_settings: Vec<LeafSetting>,
    pub tags: Vec<PreparedTag>,
    pub skip_registry: bool,
    pub is_experiments: bool,
}

/// A leaf setting with the data needed to address it outside its struct.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct LeafSetting {
    #[serde(flatten)]
    pub setting: PreparedSetting,
    /// C++ identifier fragment, `Struct_Field` for structure fields.
    pub hash_name: String,
    /// Guard of the enclosing structure.
    pub parent_guard: Option<String>,
    pub registry_scope: String,
}

/// Flatten entries into leaves, in declaration order.
pub fn flatten_settings(entries: &[SettingEntry]) -> Vec<LeafSetting> {
    let leaf = |s: &PreparedSetting, hash_name: String, parent_guard: Option<&String>| LeafSetting {
        registry_scope: s
            .scope
            .clone()
            .unwrap_or_else(|| DEFAULT_PAL_SCOPE.to_string()),
        setting: s.clone(),
        hash_name,
        parent_guard: parent_guard.cloned(),
    };
    entries
        .iter()
        .flat_map(|entry| match entry {
            SettingEntry::Setting(s) => vec![leaf(s, s.name.clone(), None)],
            SettingEntry::Structure {
                name,
                build_guard,
                fields,
                ..
            } => fields
                .iter()
                .map(|f| leaf(f, format!("{name}_{}", f.name), build_guard.as_ref()))
                .collect(),
            SettingEntry::Group { subsettings, .. } => subsettings
                .iter()
                .map(|s| leaf(s, s.name.clone(), None))
                .collect(),
        })
        .collect()
}

/// Rendered output of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedFiles {
    pub header: String,
    pub source: String,
}

/// Template engine holding the two compiled templates.
pub struct Emitter {
    tera: Tera,
}

impl Emitter {
    /// Compile the built-in templates.
    ///
    /// # Errors
    ///
    /// `Render` if a template fails to parse.
    pub fn new() -> Result<Self, SettingsError> {
        Self::from_sources(
            include_str!("../templates/settings.h.tera"),
            include_str!("../templates/settings.cpp.tera"),
        )
    }

    /// Compile caller-supplied header and source templates.
    ///
    /// # Errors
    ///
    /// `Render` if a template fails to parse.
    pub fn from_sources(header: &str, source: &str) -> Result<Self, SettingsError> {
        let mut tera = Tera::default();
        // Output is C++, not HTML.
        tera.autoescape_on(Vec::new());
        tera.register_filter("comment", comment_filter);
        tera.add_raw_templates(vec![(HEADER_TEMPLATE, header), (SOURCE_TEMPLATE, source)])
            .map_err(render_error)?;
        Ok(Self { tera })
    }

    /// # Errors
    ///
    /// `Render` if either template fails.
    pub fn render(&self, ctx: &TemplateContext) -> Result<RenderedFiles, SettingsError> {
        let context = Context::from_serialize(ctx).map_err(render_error)?;
        let header = self
            .tera
            .render(HEADER_TEMPLATE, &context)
            .map_err(render_error)?;
        let source = self
            .tera
            .render(SOURCE_TEMPLATE, &context)
            .map_err(render_error)?;
        Ok(RenderedFiles { header, source })
    }
}

/// `{{ text | comment(indent=4) }}`: one `///` line per line of `text`,
/// each ending in a newline. Null renders as nothing.
fn comment_filter(value: &Value, args: &HashMap<String, Value>) -> tera::Result<Value> {
    let Some(text) = value.as_str() else {
        return Ok(Value::String(String::new()));
    };
    let pad = " ".repeat(args.get("indent").and_then(Value::as_u64).unwrap_or(0) as usize);
    let mut out = String::new();
    for line in text.trim().lines() {
        let line = line.trim_end();
        out.push_str(&pad);
        out.push_str("///");
        if !line.is_empty() {
            out.push(' ');
            out.push_str(line);
        }
        out.push('\n');
    }
    Ok(Value::String(out))
}

/// Tera keeps the useful part of a failure in the source chain.
fn render_error(err: tera::Error) -> SettingsError {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(&err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    SettingsError::Render(message)
}
