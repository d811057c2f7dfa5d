//! Entity schemas enforced by the in-memory store.
//!
//! A schema is optional. When one is registered for an entity type every
//! insert and update of that type is checked against it, and a mismatch is
//! reported as [`StoreError::ConstraintViolation`].

use crate::error::{StoreError, StoreResult};
use crate::record::{FieldValue, Fields};
use std::collections::BTreeMap;

/// Type of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Boolean field.
    Bool,
    /// Integer field.
    Int,
    /// Float field. Integers are accepted.
    Float,
    /// Text field with an optional maximum length in characters.
    Text {
        /// Maximum number of characters.
        max_len: Option<usize>,
    },
}

/// Definition of a single field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Field type.
    pub kind: FieldKind,
    /// Whether `Null` (or omission on insert) is allowed.
    pub nullable: bool,
}

/// Schema of an entity type.
///
/// # Example
///
/// ```rust
/// use savepoint_store::EntitySchema;
///
/// let student = EntitySchema::new("Student").text("name", 20);
/// assert_eq!(student.name(), "Student");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySchema {
    name: String,
    fields: BTreeMap<String, FieldSpec>,
}

impl EntitySchema {
    /// Creates an empty schema for an entity type.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Adds a field.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, kind: FieldKind, nullable: bool) -> Self {
        self.fields.insert(name.into(), FieldSpec { kind, nullable });
        self
    }

    /// Adds a required text field with a maximum length.
    #[must_use]
    pub fn text(self, name: impl Into<String>, max_len: usize) -> Self {
        self.field(
            name,
            FieldKind::Text {
                max_len: Some(max_len),
            },
            false,
        )
    }

    /// Adds a required integer field.
    #[must_use]
    pub fn int(self, name: impl Into<String>) -> Self {
        self.field(name, FieldKind::Int, false)
    }

    /// Adds a required boolean field.
    #[must_use]
    pub fn bool(self, name: impl Into<String>) -> Self {
        self.field(name, FieldKind::Bool, false)
    }

    /// Returns the entity type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns a field spec by name.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&FieldSpec> {
        self.fields.get(field)
    }

    /// Validates a complete set of fields, as written by an insert.
    pub fn validate_insert(&self, fields: &Fields) -> StoreResult<()> {
        for (name, spec) in &self.fields {
            if !spec.nullable && !fields.contains_key(name) {
                return Err(StoreError::constraint_violation(
                    &self.name,
                    name,
                    "required field is missing",
                ));
            }
        }
        self.validate_present(fields)
    }

    /// Validates only the fields present, as written by an update.
    pub fn validate_update(&self, fields: &Fields) -> StoreResult<()> {
        self.validate_present(fields)
    }

    fn validate_present(&self, fields: &Fields) -> StoreResult<()> {
        for (name, value) in fields {
            let spec = self.fields.get(name).ok_or_else(|| {
                StoreError::constraint_violation(&self.name, name, "unknown field")
            })?;
            self.check_value(name, spec, value)?;
        }
        Ok(())
    }

    fn check_value(&self, name: &str, spec: &FieldSpec, value: &FieldValue) -> StoreResult<()> {
        let ok = match (spec.kind, value) {
            (_, FieldValue::Null) => spec.nullable,
            (FieldKind::Bool, FieldValue::Bool(_)) => true,
            (FieldKind::Int, FieldValue::Int(_)) => true,
            (FieldKind::Float, FieldValue::Float(_) | FieldValue::Int(_)) => true,
            (FieldKind::Text { max_len }, FieldValue::Text(s)) => {
                if let Some(max) = max_len {
                    let len = s.chars().count();
                    if len > max {
                        return Err(StoreError::constraint_violation(
                            &self.name,
                            name,
                            format!("text of {len} characters exceeds max length {max}"),
                        ));
                    }
                }
                true
            }
            _ => false,
        };

        if ok {
            Ok(())
        } else {
            Err(StoreError::constraint_violation(
                &self.name,
                name,
                format!("expected {:?}, got {}", spec.kind, value.type_name()),
            ))
        }
    }
}
