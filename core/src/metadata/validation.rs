//! Descriptor validation.
//!
//! Validation works on the raw JSON document so that records the typed model
//! cannot even represent (missing keys, wrong types) are reported field by
//! field. Every violation is collected; nothing short-circuits.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use chrono::DateTime;
use serde_json::Map;
use serde_json::Value;

use super::schema::ArchiveOperation;
use super::schema::METADATA_FILENAME;
use super::schema::Metadata;
use super::schema::SCHEMA_VERSION;
use crate::category::normalize_relative;
use crate::error::Operation;
use crate::error::ResetError;
use crate::error::Result;

/// One defect in a descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Dotted path of the offending field, e.g. `contents.files.total`.
    pub field: String,
    pub kind: ViolationKind,
}

impl Violation {
    pub fn new(field: impl Into<String>, kind: ViolationKind) -> Self {
        Self {
            field: field.into(),
            kind,
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.kind)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViolationKind {
    Missing,
    WrongType { expected: &'static str },
    InvalidTimestamp(String),
    UnknownOperation(String),
    UnsupportedVersion(String),
    UnsafePath(String),
    Inconsistent(String),
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViolationKind::Missing => f.write_str("is missing"),
            ViolationKind::WrongType { expected } => write!(f, "must be {expected}"),
            ViolationKind::InvalidTimestamp(value) => {
                write!(f, "'{value}' is not an RFC 3339 timestamp")
            }
            ViolationKind::UnknownOperation(value) => write!(f, "has unknown value '{value}'"),
            ViolationKind::UnsupportedVersion(value) => {
                write!(f, "'{value}' is not a supported schema version")
            }
            ViolationKind::UnsafePath(value) => {
                write!(f, "'{value}' is not a safe workspace-relative path")
            }
            ViolationKind::Inconsistent(reason) => f.write_str(reason),
        }
    }
}

/// Outcome of validating a descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    Valid,
    Invalid(Vec<Violation>),
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Valid)
    }

    pub fn violations(&self) -> &[Violation] {
        match self {
            Validation::Valid => &[],
            Validation::Invalid(violations) => violations,
        }
    }

    /// Turn an invalid outcome into a tagged error for `operation`.
    pub fn into_result(self, operation: Operation) -> Result<()> {
        match self {
            Validation::Valid => Ok(()),
            Validation::Invalid(violations) => Err(ResetError::MetadataValidation {
                operation,
                violations,
            }),
        }
    }
}

/// Validate a typed descriptor.
pub fn validate(metadata: &Metadata) -> Validation {
    match serde_json::to_value(metadata) {
        Ok(document) => validate_document(&document),
        Err(err) => Validation::Invalid(vec![Violation::new(
            "$",
            ViolationKind::Inconsistent(format!("cannot be serialized: {err}")),
        )]),
    }
}

/// Validate a parsed JSON document against the descriptor schema.
pub fn validate_document(document: &Value) -> Validation {
    let mut checker = Checker::default();
    checker.check_root(document);
    if checker.violations.is_empty() {
        Validation::Valid
    } else {
        Validation::Invalid(checker.violations)
    }
}

#[derive(Default)]
struct Checker {
    violations: Vec<Violation>,
}

impl Checker {
    fn push(&mut self, field: impl Into<String>, kind: ViolationKind) {
        self.violations.push(Violation::new(field, kind));
    }

    fn check_root(&mut self, document: &Value) {
        let Some(root) = document.as_object() else {
            self.push("$", ViolationKind::WrongType { expected: "an object" });
            return;
        };

        if let Some(version) = self.string(root, "", "version") {
            let major = version.split('.').next().unwrap_or_default();
            let supported = SCHEMA_VERSION.split('.').next().unwrap_or_default();
            if major != supported {
                self.push(
                    "version",
                    ViolationKind::UnsupportedVersion(version.to_string()),
                );
            }
        }

        if let Some(created) = self.string(root, "", "created") {
            if DateTime::parse_from_rfc3339(created).is_err() {
                self.push("created", ViolationKind::InvalidTimestamp(created.to_string()));
            }
        }

        if let Some(operation) = self.string(root, "", "operation") {
            if operation.parse::<ArchiveOperation>().is_err() {
                self.push(
                    "operation",
                    ViolationKind::UnknownOperation(operation.to_string()),
                );
            }
        }

        if let Some(source) = self.object(root, "", "source") {
            for key in ["path", "vcsRevision", "vcsBranch", "user", "platform"] {
                self.string(source, "source", key);
            }
        }

        if let Some(contents) = self.object(root, "", "contents") {
            self.check_contents(contents);
        }

        if let Some(restoration) = self.object(root, "", "restoration") {
            self.string_list(restoration, "restoration", "compatible");
            self.string_list(restoration, "restoration", "requirements");
        }
    }

    fn check_contents(&mut self, contents: &Map<String, Value>) {
        let directories = self.string_list(contents, "contents", "directories");
        if let Some(directories) = &directories {
            for (index, directory) in directories.iter().enumerate() {
                let safe = normalize_relative(Path::new(directory), Operation::ReadMetadata)
                    .is_ok_and(|path| !path.starts_with(METADATA_FILENAME));
                if !safe {
                    self.push(
                        format!("contents.directories[{index}]"),
                        ViolationKind::UnsafePath(directory.clone()),
                    );
                }
            }
        }

        self.count(contents, "contents", "totalSize");

        let Some(files) = self.object(contents, "contents", "files") else {
            return;
        };
        let total = self.count(files, "contents.files", "total");
        let Some(categories) = self.object(files, "contents.files", "categories") else {
            return;
        };

        let mut counts = BTreeMap::new();
        let mut all_counted = true;
        for key in categories.keys() {
            match self.count(categories, "contents.files.categories", key) {
                Some(count) => {
                    counts.insert(key.as_str(), count);
                }
                None => all_counted = false,
            }
        }

        if let (Some(total), true) = (total, all_counted) {
            let sum: u64 = counts.values().sum();
            if sum != total {
                self.push(
                    "contents.files.total",
                    ViolationKind::Inconsistent(format!(
                        "is {total} but the categories sum to {sum}"
                    )),
                );
            }
        }

        if let Some(directories) = &directories {
            for (category, count) in &counts {
                if *count > 0 && !directories.iter().any(|dir| dir == category) {
                    self.push(
                        format!("contents.files.categories.{category}"),
                        ViolationKind::Inconsistent(format!(
                            "claims {count} file(s) but is not listed in contents.directories"
                        )),
                    );
                }
            }
        }
    }

    fn field<'a>(
        &mut self,
        parent: &'a Map<String, Value>,
        prefix: &str,
        key: &str,
    ) -> Option<&'a Value> {
        let value = parent.get(key);
        if value.is_none() {
            self.push(join(prefix, key), ViolationKind::Missing);
        }
        value
    }

    fn string<'a>(
        &mut self,
        parent: &'a Map<String, Value>,
        prefix: &str,
        key: &str,
    ) -> Option<&'a str> {
        let value = self.field(parent, prefix, key)?;
        let text = value.as_str();
        if text.is_none() {
            self.push(join(prefix, key), ViolationKind::WrongType { expected: "a string" });
        }
        text
    }

    fn object<'a>(
        &mut self,
        parent: &'a Map<String, Value>,
        prefix: &str,
        key: &str,
    ) -> Option<&'a Map<String, Value>> {
        let value = self.field(parent, prefix, key)?;
        let object = value.as_object();
        if object.is_none() {
            self.push(join(prefix, key), ViolationKind::WrongType { expected: "an object" });
        }
        object
    }

    fn count(&mut self, parent: &Map<String, Value>, prefix: &str, key: &str) -> Option<u64> {
        let value = self.field(parent, prefix, key)?;
        let count = value.as_u64();
        if count.is_none() {
            self.push(
                join(prefix, key),
                ViolationKind::WrongType {
                    expected: "a non-negative integer",
                },
            );
        }
        count
    }

    fn string_list(
        &mut self,
        parent: &Map<String, Value>,
        prefix: &str,
        key: &str,
    ) -> Option<Vec<String>> {
        let value = self.field(parent, prefix, key)?;
        let Some(items) = value.as_array() else {
            self.push(join(prefix, key), ViolationKind::WrongType { expected: "a list" });
            return None;
        };
        let mut strings = Vec::with_capacity(items.len());
        let mut ok = true;
        for (index, item) in items.iter().enumerate() {
            match item.as_str() {
                Some(text) => strings.push(text.to_string()),
                None => {
                    ok = false;
                    self.push(
                        format!("{}[{index}]", join(prefix, key)),
                        ViolationKind::WrongType { expected: "a string" },
                    );
                }
            }
        }
        ok.then_some(strings)
    }
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn valid_document() -> Value {
        json!({
            "version": "1.0",
            "created": "2026-01-15T12:00:00Z",
            "operation": "light",
            "source": {
                "path": "/work/project",
                "vcsRevision": "unknown",
                "vcsBranch": "unknown",
                "user": "dev",
                "platform": "linux-x86_64"
            },
            "contents": {
                "directories": ["docs/plans", "docs/reports"],
                "files": { "categories": { "docs/plans": 2, "docs/reports": 0 }, "total": 2 },
                "totalSize": 42
            },
            "restoration": { "compatible": ["wskit"], "requirements": [] }
        })
    }

    fn fields(validation: &Validation) -> Vec<String> {
        validation
            .violations()
            .iter()
            .map(|v| v.field.clone())
            .collect()
    }

    #[test]
    fn well_formed_document_is_valid() {
        assert_eq!(validate_document(&valid_document()), Validation::Valid);
    }

    #[test]
    fn non_object_is_rejected() {
        let validation = validate_document(&json!([1, 2]));
        assert_eq!(fields(&validation), vec!["$"]);
    }

    #[test]
    fn reports_every_violation_in_one_pass() {
        let mut doc = valid_document();
        let root = doc.as_object_mut().unwrap();
        root.remove("version");
        root.insert("created".into(), json!("yesterday"));
        root.insert("operation".into(), json!("nuke"));
        root["contents"]["directories"] = json!("docs/plans");
        root["restoration"]["compatible"] = json!([1]);

        let validation = validate_document(&doc);
        assert_eq!(
            fields(&validation),
            vec![
                "version",
                "created",
                "operation",
                "contents.directories",
                "restoration.compatible[0]",
            ]
        );
        assert_eq!(
            validation.violations()[1].kind,
            ViolationKind::InvalidTimestamp("yesterday".into())
        );
    }

    #[test]
    fn nested_fields_are_reported_with_dotted_paths() {
        let mut doc = valid_document();
        doc["source"].as_object_mut().unwrap().remove("vcsBranch");
        doc["contents"]["totalSize"] = json!(-1);
        let validation = validate_document(&doc);
        assert_eq!(
            fields(&validation),
            vec!["source.vcsBranch", "contents.totalSize"]
        );
    }

    #[test]
    fn category_counts_must_sum_to_total() {
        let mut doc = valid_document();
        doc["contents"]["files"]["total"] = json!(5);
        let validation = validate_document(&doc);
        assert_eq!(fields(&validation), vec!["contents.files.total"]);
        assert!(validation.violations()[0].to_string().contains("sum to 2"));
    }

    #[test]
    fn counted_category_must_be_listed() {
        let mut doc = valid_document();
        doc["contents"]["directories"] = json!(["docs/reports"]);
        let validation = validate_document(&doc);
        assert_eq!(
            fields(&validation),
            vec!["contents.files.categories.docs/plans"]
        );
    }

    #[test]
    fn unsafe_directories_are_rejected() {
        let mut doc = valid_document();
        doc["contents"]["directories"] = json!(["docs/plans", "../escape", "/abs"]);
        doc["contents"]["files"]["categories"] = json!({ "docs/plans": 2 });
        let validation = validate_document(&doc);
        assert_eq!(
            fields(&validation),
            vec!["contents.directories[1]", "contents.directories[2]"]
        );
    }

    #[test]
    fn future_major_version_is_unsupported() {
        let mut doc = valid_document();
        doc["version"] = json!("2.0");
        let validation = validate_document(&doc);
        assert_eq!(
            validation.violations()[0].kind,
            ViolationKind::UnsupportedVersion("2.0".into())
        );
        doc["version"] = json!("1.3");
        assert!(validate_document(&doc).is_valid());
    }

    #[test]
    fn into_result_maps_to_tagged_error() {
        let err = validate_document(&json!({}))
            .into_result(Operation::CreateArchive)
            .unwrap_err();
        match err {
            ResetError::MetadataValidation {
                operation,
                violations,
            } => {
                assert_eq!(operation, Operation::CreateArchive);
                assert_eq!(violations.len(), 6);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
