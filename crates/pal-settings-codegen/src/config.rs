//! Generation options.
//!
//! Everything a run needs beyond the input document, collected by the CLI
//! and passed explicitly through the pipeline.

use std::path::PathBuf;

use pal_settings_core::SettingsError;

/// Options for one generation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodegenConfig {
    /// Settings document (JSON or YAML).
    pub input: PathBuf,
    /// Output base name; `g_<name>.h` and `g_<name>.cpp` are written.
    pub generated_filename: String,
    /// Hand-written header declaring the settings base class.
    pub settings_filename: String,
    pub outdir: PathBuf,
    /// Defaults to `<ComponentName>SettingsLoader`.
    pub class_name: Option<String>,
    /// PAL component: `Pal` namespace, PAL includes, PAL registry reads.
    pub pal: bool,
    pub magic_buffer: Option<PathBuf>,
    /// Embed the blob as plaintext even when a magic buffer is given.
    pub unencoded: bool,
    /// Replaces both the default and the document's namespace list.
    pub namespaces: Vec<String>,
    pub includes: Vec<String>,
    /// Schema file overriding the embedded one.
    pub schema: Option<PathBuf>,
    /// Force legacy migration instead of detecting it.
    pub legacy: bool,
    pub skip_registry: bool,
    pub experiments: bool,
    /// Seed for the rotation offset; time-seeded when absent.
    pub seed: Option<u64>,
}

impl CodegenConfig {
    /// Check options that do not depend on the document.
    ///
    /// # Errors
    ///
    /// `Naming` for an empty or extension-carrying generated file name.
    pub fn validate(&self) -> Result<(), SettingsError> {
        let name = self.generated_filename.as_str();
        if name.is_empty() {
            return Err(SettingsError::Naming(
                "generated file name must not be empty".to_string(),
            ));
        }
        if name.ends_with(".h") || name.ends_with(".cpp") {
            return Err(SettingsError::Naming(format!(
                "generated file name \"{name}\" must not carry a .h or .cpp extension"
            )));
        }
        Ok(())
    }

    pub fn header_file_name(&self) -> String {
        format!("g_{}.h", self.generated_filename)
    }

    pub fn source_file_name(&self) -> String {
        format!("g_{}.cpp", self.generated_filename)
    }

    pub fn header_path(&self) -> PathBuf {
        self.outdir.join(self.header_file_name())
    }

    pub fn source_path(&self) -> PathBuf {
        self.outdir.join(self.source_file_name())
    }

    /// Namespace list for `component`: CLI list, then document list, then
    /// `Pal` or the component name.
    pub fn resolve_namespaces(&self, document: &[String], component: &str) -> Vec<String> {
        if !self.namespaces.is_empty() {
            self.namespaces.clone()
        } else if !document.is_empty() {
            document.to_vec()
        } else if self.pal {
            vec!["Pal".to_string()]
        } else {
            vec![component.to_string()]
        }
    }

    pub fn resolve_class_name(&self, component: &str) -> String {
        self.class_name
            .clone()
            .unwrap_or_else(|| format!("{component}SettingsLoader"))
    }
}
