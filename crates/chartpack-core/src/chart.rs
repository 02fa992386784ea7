//! Chart object model
//!
//! A [`Chart`] is the in-memory form of a chart tree as produced by a loader:
//! the `Chart.yaml` metadata, an optional `Chart.lock`, an optional values
//! schema, raw/template/static files and fully materialized sub-charts.
//! The packaging code in this crate only reads it.

use chrono::{DateTime, Utc};
use regex::Regex;
use semver::Version;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

use crate::error::{CoreError, Result};

/// Chart metadata filename
pub const CHARTFILE_NAME: &str = "Chart.yaml";

/// Lock document filename
pub const LOCKFILE_NAME: &str = "Chart.lock";

/// Default values filename
pub const VALUES_FILE_NAME: &str = "values.yaml";

/// Values schema filename
pub const SCHEMA_FILE_NAME: &str = "values.schema.json";

/// Directory holding dependency charts
pub const CHARTS_DIR: &str = "charts";

static ALIAS_NAME_FORMAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]+$").expect("valid alias regex"));

/// A single file carried by a chart
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct File {
    /// Path relative to the chart root, e.g. `templates/deployment.yaml`
    pub name: String,
    pub data: Vec<u8>,
}

impl File {
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }
}

/// Chart.yaml contents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    /// API version of the chart format
    pub api_version: String,

    /// Chart name (required, single path segment)
    pub name: String,

    /// Chart version (required, SemVer 2)
    pub version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kube_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// `application` or `library`; empty means application
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub chart_type: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deprecated: bool,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub maintainers: Vec<Maintainer>,

    /// Declared dependencies (requirements, not the loaded sub-charts)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<ChartDependency>,
}

impl Metadata {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            api_version: "v3".to_string(),
            name: name.into(),
            version: version.into(),
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<()> {
        if self.api_version.is_empty() {
            return Err(CoreError::validation("chart.metadata.apiVersion is required"));
        }
        if self.name.is_empty() {
            return Err(CoreError::validation("chart.metadata.name is required"));
        }
        if self.version.is_empty() {
            return Err(CoreError::validation("chart.metadata.version is required"));
        }
        if Version::parse(&self.version).is_err() {
            return Err(CoreError::validation(format!(
                "chart.metadata.version {:?} is invalid",
                self.version
            )));
        }
        if let Some(kind) = &self.chart_type {
            if !matches!(kind.as_str(), "" | "application" | "library") {
                return Err(CoreError::validation(format!(
                    "chart.metadata.type {:?} must be application or library",
                    kind
                )));
            }
        }
        for maintainer in &self.maintainers {
            if maintainer.name.is_empty() {
                return Err(CoreError::validation(
                    "each maintainer requires a name",
                ));
            }
        }
        for dep in &self.dependencies {
            dep.validate()?;
        }
        Ok(())
    }
}

/// Maintainer information
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Maintainer {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// A dependency requirement declared in Chart.yaml or recorded in Chart.lock
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartDependency {
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub repository: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl ChartDependency {
    fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(CoreError::validation("dependencies must have a name"));
        }
        if let Some(alias) = &self.alias {
            if !ALIAS_NAME_FORMAT.is_match(alias) {
                return Err(CoreError::validation(format!(
                    "dependency {:?} has disallowed characters in the alias",
                    self.name
                )));
            }
        }
        Ok(())
    }
}

/// Chart.lock contents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lock {
    /// When the lock was generated
    pub generated: DateTime<Utc>,

    /// Digest of the requirements the lock was resolved from
    pub digest: String,

    /// Resolved dependencies
    #[serde(default)]
    pub dependencies: Vec<ChartDependency>,
}

/// A loaded chart tree
#[derive(Debug, Clone, Default)]
pub struct Chart {
    pub metadata: Metadata,

    pub lock: Option<Lock>,

    /// Raw `values.schema.json` bytes, if the chart ships one
    pub schema: Option<Vec<u8>>,

    /// Raw files read from the chart root; includes `values.yaml`
    pub raw: Vec<File>,

    pub templates: Vec<File>,

    /// Everything that is neither metadata, values, schema nor a template
    pub files: Vec<File>,

    /// Loaded sub-charts, in declaration order
    pub dependencies: Vec<Chart>,
}

impl Chart {
    pub fn new(metadata: Metadata) -> Self {
        Self {
            metadata,
            ..Self::default()
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    #[inline]
    pub fn version(&self) -> &str {
        &self.metadata.version
    }

    /// The raw `values.yaml` file, if present
    pub fn values_file(&self) -> Option<&File> {
        self.raw.iter().find(|f| f.name == VALUES_FILE_NAME)
    }

    pub fn with_lock(mut self, lock: Lock) -> Self {
        self.lock = Some(lock);
        self
    }

    pub fn with_schema(mut self, schema: impl Into<Vec<u8>>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn with_values(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.raw.push(File::new(VALUES_FILE_NAME, data));
        self
    }

    pub fn with_template(mut self, name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        self.templates.push(File::new(name, data));
        self
    }

    pub fn with_file(mut self, name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        self.files.push(File::new(name, data));
        self
    }

    pub fn with_dependency(mut self, chart: Chart) -> Self {
        self.dependencies.push(chart);
        self
    }

    /// Structural check of the whole tree
    ///
    /// Path-shape of names is not checked here; see [`crate::validate_name`].
    pub fn validate(&self) -> Result<()> {
        self.metadata.validate()?;
        for dep in &self.dependencies {
            dep.validate().map_err(|e| match e {
                CoreError::Validation { message } => CoreError::Validation {
                    message: format!("{}: {}", dep.name(), message),
                },
                other => other,
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chart(name: &str, version: &str) -> Chart {
        Chart::new(Metadata::new(name, version))
    }

    #[test]
    fn test_valid_chart() {
        let c = chart("myapp", "1.0.0")
            .with_values("replicas: 1\n")
            .with_dependency(chart("redis", "7.2.0"));
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_missing_name() {
        let err = chart("", "1.0.0").validate().unwrap_err();
        assert!(err.to_string().contains("chart.metadata.name is required"));
    }

    #[test]
    fn test_missing_api_version() {
        let mut c = chart("myapp", "1.0.0");
        c.metadata.api_version.clear();
        assert!(matches!(c.validate(), Err(CoreError::Validation { .. })));
    }

    #[test]
    fn test_invalid_version() {
        let err = chart("myapp", "not-a-version").validate().unwrap_err();
        assert!(err.to_string().contains("\"not-a-version\" is invalid"));
    }

    #[test]
    fn test_invalid_type() {
        let mut c = chart("myapp", "1.0.0");
        c.metadata.chart_type = Some("plugin".to_string());
        assert!(matches!(c.validate(), Err(CoreError::Validation { .. })));

        c.metadata.chart_type = Some("library".to_string());
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_maintainer_requires_name() {
        let mut c = chart("myapp", "1.0.0");
        c.metadata.maintainers.push(Maintainer {
            name: String::new(),
            email: Some("ops@example.com".to_string()),
            url: None,
        });
        assert!(matches!(c.validate(), Err(CoreError::Validation { .. })));
    }

    #[test]
    fn test_dependency_alias_format() {
        let mut c = chart("myapp", "1.0.0");
        c.metadata.dependencies.push(ChartDependency {
            name: "redis".to_string(),
            alias: Some("cache/primary".to_string()),
            ..ChartDependency::default()
        });
        assert!(matches!(c.validate(), Err(CoreError::Validation { .. })));

        c.metadata.dependencies[0].alias = Some("cache_primary-1".to_string());
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_nested_chart_failure_names_dependency() {
        let c = chart("myapp", "1.0.0").with_dependency(chart("redis", "latest"));
        let err = c.validate().unwrap_err();
        assert!(err.to_string().contains("redis: chart.metadata.version"));
    }

    #[test]
    fn test_validate_ignores_name_shape() {
        assert!(chart("../evil", "1.0.0").validate().is_ok());
    }

    #[test]
    fn test_values_file_lookup() {
        let c = chart("myapp", "1.0.0")
            .with_file("README.md", "docs")
            .with_values("a: 1\n");
        assert_eq!(c.values_file().map(|f| f.data.as_slice()), Some(&b"a: 1\n"[..]));
        assert!(chart("bare", "1.0.0").values_file().is_none());
    }

    #[test]
    fn test_metadata_serialization_omits_empty_fields() {
        let mut md = Metadata::new("myapp", "1.2.3");
        md.description = Some("My application".to_string());
        let yaml = serde_yaml::to_string(&md).unwrap();
        assert_eq!(
            yaml,
            "apiVersion: v3\nname: myapp\nversion: 1.2.3\ndescription: My application\n"
        );

        let parsed: Metadata = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, md);
    }

    #[test]
    fn test_lock_deserialize() {
        let yaml = r#"
generated: "2024-03-01T10:00:00Z"
digest: sha256:abc
dependencies:
  - name: redis
    version: 7.2.0
    repository: https://charts.example.com
"#;
        let lock: Lock = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(lock.digest, "sha256:abc");
        assert_eq!(lock.dependencies.len(), 1);
        assert_eq!(lock.dependencies[0].name, "redis");
    }
}
