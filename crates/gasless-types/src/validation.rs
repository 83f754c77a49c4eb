//! Schema validation for backend configuration tables.
//!
//! Each pluggable backend (cache, queue, indexer) describes the shape of its
//! `implementations.<name>` table with a [`Schema`]; the config loader runs it
//! before any backend is constructed.

use alloy::primitives::Address;
use thiserror::Error;

/// Errors that can occur while validating a backend configuration table.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
	/// Error that occurs when a required field is missing.
	#[error("Missing required field: {0}")]
	MissingField(String),
	/// Error that occurs when a field has an invalid value.
	#[error("Invalid value for field '{field}': {message}")]
	InvalidValue { field: String, message: String },
	/// Error that occurs when a field has the wrong TOML type.
	#[error("Type mismatch for field '{field}': expected {expected}, got {actual}")]
	TypeMismatch {
		field: String,
		expected: String,
		actual: String,
	},
	/// Error that occurs when a table cannot be deserialized into its config type.
	#[error("Failed to deserialize config: {0}")]
	DeserializationError(String),
}

impl ValidationError {
	/// Qualifies the offending field with the name of its parent table.
	fn nested_under(self, parent: &str) -> Self {
		match self {
			ValidationError::MissingField(field) => {
				ValidationError::MissingField(format!("{}.{}", parent, field))
			}
			ValidationError::InvalidValue { field, message } => ValidationError::InvalidValue {
				field: format!("{}.{}", parent, field),
				message,
			},
			ValidationError::TypeMismatch {
				field,
				expected,
				actual,
			} => ValidationError::TypeMismatch {
				field: format!("{}.{}", parent, field),
				expected,
				actual,
			},
			other => other,
		}
	}
}

/// Type of a configuration field.
#[derive(Debug)]
pub enum FieldType {
	String,
	/// `http://` or `https://` URL; `redis://` and `rediss://` are accepted too.
	Url,
	/// 20-byte hex address.
	Address,
	/// Integer with optional inclusive bounds.
	Integer {
		min: Option<i64>,
		max: Option<i64>,
	},
	Boolean,
	Array(Box<FieldType>),
	/// Nested table checked against its own schema.
	Table(Schema),
}

/// Type alias for field validator functions.
pub type FieldValidator = Box<dyn Fn(&toml::Value) -> Result<(), String> + Send + Sync>;

/// A field definition with name, type and optional extra check.
pub struct Field {
	pub name: String,
	pub field_type: FieldType,
	pub validator: Option<FieldValidator>,
}

impl std::fmt::Debug for Field {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Field")
			.field("name", &self.name)
			.field("field_type", &self.field_type)
			.field("validator", &self.validator.is_some())
			.finish()
	}
}

impl Field {
	/// Creates a new field with the given name and type.
	pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
		Self {
			name: name.into(),
			field_type,
			validator: None,
		}
	}

	/// Attaches an extra check run after the type check succeeds.
	pub fn with_validator<F>(mut self, validator: F) -> Self
	where
		F: Fn(&toml::Value) -> Result<(), String> + Send + Sync + 'static,
	{
		self.validator = Some(Box::new(validator));
		self
	}

	fn check(&self, value: &toml::Value) -> Result<(), ValidationError> {
		check_type(&self.name, value, &self.field_type)?;
		if let Some(validator) = &self.validator {
			validator(value).map_err(|message| ValidationError::InvalidValue {
				field: self.name.clone(),
				message,
			})?;
		}
		Ok(())
	}
}

/// Required and optional fields of a configuration table.
#[derive(Debug)]
pub struct Schema {
	pub required: Vec<Field>,
	pub optional: Vec<Field>,
}

impl Schema {
	/// Creates a new schema with required and optional fields.
	pub fn new(required: Vec<Field>, optional: Vec<Field>) -> Self {
		Self { required, optional }
	}

	/// Validates a TOML value against this schema.
	///
	/// Required fields must be present. Optional fields are checked only
	/// when set, and keys the schema does not name are ignored.
	pub fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let table = config
			.as_table()
			.ok_or_else(|| mismatch("root", "table", config))?;

		for field in &self.required {
			let value = table
				.get(&field.name)
				.ok_or_else(|| ValidationError::MissingField(field.name.clone()))?;
			field.check(value)?;
		}

		for field in &self.optional {
			if let Some(value) = table.get(&field.name) {
				field.check(value)?;
			}
		}

		Ok(())
	}
}

fn mismatch(field: &str, expected: &str, value: &toml::Value) -> ValidationError {
	ValidationError::TypeMismatch {
		field: field.to_string(),
		expected: expected.to_string(),
		actual: value.type_str().to_string(),
	}
}

fn invalid(field: &str, message: String) -> ValidationError {
	ValidationError::InvalidValue {
		field: field.to_string(),
		message,
	}
}

/// Validates that a value matches the expected field type.
fn check_type(field: &str, value: &toml::Value, expected: &FieldType) -> Result<(), ValidationError> {
	match expected {
		FieldType::String => {
			value.as_str().ok_or_else(|| mismatch(field, "string", value))?;
		}
		FieldType::Url => {
			let url = value.as_str().ok_or_else(|| mismatch(field, "url", value))?;
			const SCHEMES: [&str; 4] = ["http://", "https://", "redis://", "rediss://"];
			if !SCHEMES.iter().any(|scheme| url.starts_with(scheme)) {
				return Err(invalid(field, format!("'{}' is not a supported URL", url)));
			}
		}
		FieldType::Address => {
			let raw = value
				.as_str()
				.ok_or_else(|| mismatch(field, "address", value))?;
			raw.parse::<Address>()
				.map_err(|e| invalid(field, format!("'{}' is not an address: {}", raw, e)))?;
		}
		FieldType::Integer { min, max } => {
			let int_val = value
				.as_integer()
				.ok_or_else(|| mismatch(field, "integer", value))?;

			if let Some(min_val) = min {
				if int_val < *min_val {
					return Err(invalid(
						field,
						format!("Value {} is less than minimum {}", int_val, min_val),
					));
				}
			}
			if let Some(max_val) = max {
				if int_val > *max_val {
					return Err(invalid(
						field,
						format!("Value {} is greater than maximum {}", int_val, max_val),
					));
				}
			}
		}
		FieldType::Boolean => {
			if !value.is_bool() {
				return Err(mismatch(field, "boolean", value));
			}
		}
		FieldType::Array(inner) => {
			let items = value
				.as_array()
				.ok_or_else(|| mismatch(field, "array", value))?;
			for (i, item) in items.iter().enumerate() {
				check_type(&format!("{}[{}]", field, i), item, inner)?;
			}
		}
		FieldType::Table(schema) => {
			schema.validate(value).map_err(|e| e.nested_under(field))?;
		}
	}

	Ok(())
}

/// Implemented by every backend to describe its configuration table.
pub trait ConfigSchema: Send + Sync {
	/// Validates a TOML configuration value against this schema.
	///
	/// Implementations check that required fields are present, that field
	/// types are correct and that values meet their constraints.
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError>;
}
