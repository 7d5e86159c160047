use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::ConvertError;

pub const DEFAULT_CONFIG_FILE: &str = "edge2ged.toml";

/// Flavour of the GEDCOM output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Standard,
    /// Ancestry.com import: lower-case date keywords, notes moved into empty events.
    Ancestry,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Submitter {
    pub id: Option<String>,
    pub name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub fax: Option<String>,
    pub www: Option<String>,
}

impl Submitter {
    pub fn pointer(&self) -> String {
        format!("@{}@", self.id.as_deref().unwrap_or("SUBM1"))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub person_file: PathBuf,
    pub family_file: PathBuf,
    pub format: OutputFormat,
    pub charset: String,
    pub max_line_length: usize,
    pub submitter: Option<Submitter>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            person_file: PathBuf::from("person.doc"),
            family_file: PathBuf::from("family.doc"),
            format: OutputFormat::Standard,
            charset: "UTF-8".to_string(),
            max_line_length: 80,
            submitter: None,
        }
    }
}

impl Settings {
    /// Layer the TOML file (if any) under `EDGE2GED_*` environment variables.
    ///
    /// An explicitly named file must exist; the default one is optional.
    pub fn load(path: Option<&Path>) -> Result<Settings, ConvertError> {
        let (path, required) = match path {
            Some(path) => (path, true),
            None => (Path::new(DEFAULT_CONFIG_FILE), false),
        };
        let settings = Config::builder()
            .add_source(File::from(path).required(required))
            .add_source(
                Environment::with_prefix("EDGE2GED")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        Ok(settings.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_file() {
        let settings = Settings::load(None).unwrap();
        assert_eq!(settings.max_line_length, 80);
        assert_eq!(settings.format, OutputFormat::Standard);
        assert_eq!(settings.person_file, PathBuf::from("person.doc"));
        assert!(settings.submitter.is_none());
    }

    #[test]
    fn explicit_file_must_exist() {
        let err = Settings::load(Some(Path::new("tests/fixtures/no-such-file.toml"))).unwrap_err();
        assert!(matches!(err, ConvertError::Config(_)));
    }

    #[test]
    fn reads_toml_file() {
        let settings = Settings::load(Some(Path::new("tests/fixtures/edge2ged.toml"))).unwrap();
        assert_eq!(settings.format, OutputFormat::Ancestry);
        assert_eq!(settings.charset, "UTF-8");
        let submitter = settings.submitter.unwrap();
        assert_eq!(submitter.name.as_deref(), Some("Jane Researcher"));
        assert_eq!(submitter.pointer(), "@SUBM1@");
    }
}
