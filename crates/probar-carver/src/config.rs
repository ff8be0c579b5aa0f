//! Carver configuration

use crate::emit::JUnitSettings;
use crate::error::{CarverError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Java keywords that cannot be used as identifiers
const JAVA_KEYWORDS: &[&str] = &[
    "abstract", "assert", "boolean", "break", "byte", "case", "catch", "char", "class", "const",
    "continue", "default", "do", "double", "else", "enum", "extends", "false", "final",
    "finally", "float", "for", "goto", "if", "implements", "import", "instanceof", "int",
    "interface", "long", "native", "new", "null", "package", "private", "protected", "public",
    "return", "short", "static", "strictfp", "super", "switch", "synchronized", "this", "throw",
    "throws", "transient", "true", "try", "void", "volatile", "while",
];

/// Generation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CarverConfig {
    /// Package of the generated test (empty for the default package)
    pub package: String,
    /// Simple name of the generated test class
    pub class_name: String,
    /// Name of the generated test method
    pub test_method: String,
    /// Classes whose instances are carved
    pub target_classes: Vec<String>,
    /// Class collecting failing record numbers in the scaffolded pass
    pub collector_class: String,
    /// Serializer class used for objects that were not observed
    pub deserializer: String,
    /// Reject classes missing from the type table
    pub strict_types: bool,
    /// Stop after this many statements
    pub max_statements: Option<usize>,
}

impl Default for CarverConfig {
    fn default() -> Self {
        let junit = JUnitSettings::default();
        Self {
            package: junit.package,
            class_name: junit.class_name,
            test_method: junit.test_method,
            target_classes: Vec::new(),
            collector_class: junit.collector_class,
            deserializer: junit.deserializer_class,
            strict_types: false,
            max_statements: None,
        }
    }
}

impl CarverConfig {
    /// Create new default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the package
    #[must_use]
    pub fn with_package(mut self, package: impl Into<String>) -> Self {
        self.package = package.into();
        self
    }

    /// Set the test class name
    #[must_use]
    pub fn with_class_name(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = class_name.into();
        self
    }

    /// Set the test method name
    #[must_use]
    pub fn with_test_method(mut self, test_method: impl Into<String>) -> Self {
        self.test_method = test_method.into();
        self
    }

    /// Add a target class
    #[must_use]
    pub fn with_target(mut self, class: impl Into<String>) -> Self {
        self.target_classes.push(class.into());
        self
    }

    /// Set the collector class
    #[must_use]
    pub fn with_collector_class(mut self, class: impl Into<String>) -> Self {
        self.collector_class = class.into();
        self
    }

    /// Set the deserializer class
    #[must_use]
    pub fn with_deserializer(mut self, class: impl Into<String>) -> Self {
        self.deserializer = class.into();
        self
    }

    /// Enable or disable strict type resolution
    #[must_use]
    pub const fn with_strict_types(mut self, strict: bool) -> Self {
        self.strict_types = strict;
        self
    }

    /// Set the statement limit
    #[must_use]
    pub const fn with_max_statements(mut self, limit: Option<usize>) -> Self {
        self.max_statements = limit;
        self
    }

    /// Parse and validate a YAML configuration
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a `.yaml`/`.yml`/`.json` configuration file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let config: Self = load_structured(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }

    /// Check that all names can appear in Java source
    pub fn validate(&self) -> Result<()> {
        if self.class_name.is_empty() {
            return Err(CarverError::config("class_name must not be empty"));
        }
        check_identifier("class_name", &self.class_name)?;
        check_identifier("test_method", &self.test_method)?;
        if !self.package.is_empty() {
            check_qualified("package", &self.package)?;
        }
        check_qualified("collector_class", &self.collector_class)?;
        check_qualified("deserializer", &self.deserializer)?;
        for class in &self.target_classes {
            check_qualified("target_classes", &class.replace('$', "."))?;
        }
        if self.max_statements == Some(0) {
            return Err(CarverError::config("max_statements must be positive"));
        }
        Ok(())
    }

    /// Output settings for the JUnit emitter
    #[must_use]
    pub fn junit_settings(&self) -> JUnitSettings {
        JUnitSettings {
            package: self.package.clone(),
            class_name: self.class_name.clone(),
            test_method: self.test_method.clone(),
            collector_class: self.collector_class.clone(),
            deserializer_class: self.deserializer.clone(),
        }
    }
}

/// Whether `name` is a legal Java identifier
#[must_use]
pub fn is_java_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_alphabetic() || first == '_' || first == '$')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
        && !JAVA_KEYWORDS.contains(&name)
}

fn check_identifier(key: &str, name: &str) -> Result<()> {
    if is_java_identifier(name) {
        Ok(())
    } else {
        Err(CarverError::config(format!(
            "{key}: '{name}' is not a valid Java identifier"
        )))
    }
}

fn check_qualified(key: &str, name: &str) -> Result<()> {
    if name.split('.').all(is_java_identifier) {
        Ok(())
    } else {
        Err(CarverError::config(format!(
            "{key}: '{name}' is not a valid qualified name"
        )))
    }
}

/// Read a YAML or JSON document, chosen by file extension
pub(crate) fn load_structured<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("yaml" | "yml") => {
            let text = std::fs::read_to_string(path)?;
            Ok(serde_yaml_ng::from_str(&text)?)
        }
        Some("json") => {
            let text = std::fs::read_to_string(path)?;
            Ok(serde_json::from_str(&text)?)
        }
        _ => Err(CarverError::config(format!(
            "unsupported file type: {} (expected .yaml, .yml or .json)",
            path.display()
        ))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Write;

    mod config_tests {
        use super::*;

        #[test]
        fn test_default_is_valid() {
            let config = CarverConfig::default();
            assert!(config.validate().is_ok());
            assert_eq!(config.class_name, "CarvedTest");
            assert_eq!(config.collector_class, "org.evosuite.testcarver.codegen.PostProcessor");
        }

        #[test]
        fn test_builders() {
            let config = CarverConfig::new()
                .with_package("com.example")
                .with_class_name("PersonTest")
                .with_test_method("testCarved")
                .with_target("com.example.Person")
                .with_strict_types(true)
                .with_max_statements(Some(50));
            assert!(config.validate().is_ok());
            assert_eq!(config.target_classes, vec!["com.example.Person"]);
            let settings = config.junit_settings();
            assert_eq!(settings.package, "com.example");
            assert_eq!(settings.test_method, "testCarved");
        }

        #[test]
        fn test_from_yaml_partial() {
            let config = CarverConfig::from_yaml(
                "class_name: PersonTest\ntarget_classes:\n  - com.example.Person\n",
            )
            .unwrap();
            assert_eq!(config.class_name, "PersonTest");
            assert_eq!(config.test_method, "test");
            assert!(!config.strict_types);
        }
    }

    mod validation_tests {
        use super::*;

        #[test]
        fn test_rejects_keyword_class_name() {
            let err = CarverConfig::new().with_class_name("class").validate();
            assert!(matches!(err, Err(CarverError::Config { .. })));
        }

        #[test]
        fn test_rejects_empty_class_name() {
            let err = CarverConfig::new().with_class_name("").validate().unwrap_err();
            assert!(err.to_string().contains("class_name"));
        }

        #[test]
        fn test_rejects_bad_package() {
            assert!(CarverConfig::new().with_package("com..x").validate().is_err());
            assert!(CarverConfig::new().with_package("com.1x").validate().is_err());
        }

        #[test]
        fn test_nested_target_class() {
            let config = CarverConfig::new().with_target("com.example.Outer$Inner");
            assert!(config.validate().is_ok());
        }

        #[test]
        fn test_zero_limit() {
            assert!(CarverConfig::new()
                .with_max_statements(Some(0))
                .validate()
                .is_err());
        }

        #[test]
        fn test_identifiers() {
            assert!(is_java_identifier("var0"));
            assert!(is_java_identifier("$x"));
            assert!(!is_java_identifier("0var"));
            assert!(!is_java_identifier("a-b"));
            assert!(!is_java_identifier(""));
        }
    }

    mod file_tests {
        use super::*;

        #[test]
        fn test_load_json_file() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("carver.json");
            let mut file = std::fs::File::create(&path).unwrap();
            write!(file, r#"{{"class_name": "JsonTest", "max_statements": 10}}"#).unwrap();
            let config = CarverConfig::from_path(&path).unwrap();
            assert_eq!(config.class_name, "JsonTest");
            assert_eq!(config.max_statements, Some(10));
        }

        #[test]
        fn test_load_yaml_file_validates() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("carver.yml");
            std::fs::write(&path, "test_method: \"not valid\"\n").unwrap();
            assert!(matches!(
                CarverConfig::from_path(&path),
                Err(CarverError::Config { .. })
            ));
        }

        #[test]
        fn test_unknown_extension() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("carver.toml");
            std::fs::write(&path, "").unwrap();
            let err = CarverConfig::from_path(&path).unwrap_err();
            assert!(err.to_string().contains("unsupported file type"));
        }

        #[test]
        fn test_missing_file() {
            let err = CarverConfig::from_path("/nonexistent/carver.yaml").unwrap_err();
            assert!(matches!(err, CarverError::Io(_)));
        }
    }
}
