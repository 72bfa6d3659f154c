//! Key validators over merged documents.
//!
//! Both validators walk each classified document against the field table in
//! [`crate::types`], descending into attribute maps, category maps, enum
//! members, and nested records. `$include` entries of a record map are
//! skipped.

use serde_json::Value;

use crate::error::{Collector, Result, ValidationError};
use crate::reader::Reader;
use crate::type_mapping::TypeMapping;
use crate::types::{Field, INCLUDE_KEY, Shape, field, fields};

/// Report every required key absent from a document or one of its records.
pub fn validate_required_keys(
    reader: &Reader,
    types: &TypeMapping,
    collector: &mut Collector,
) -> Result<()> {
    for (path, kind) in types.iter() {
        if let Some(document) = reader.get(path) {
            Walk::new(path, collector).required(document, Shape::Document(kind))?;
        }
    }
    Ok(())
}

/// Report every key not declared for its document kind or record shape.
pub fn validate_no_unknown_keys(
    reader: &Reader,
    types: &TypeMapping,
    collector: &mut Collector,
) -> Result<()> {
    for (path, kind) in types.iter() {
        if let Some(document) = reader.get(path) {
            Walk::new(path, collector).unknown(document, Shape::Document(kind))?;
        }
    }
    Ok(())
}

struct Walk<'a> {
    file: &'a str,
    collector: &'a mut Collector,
    trail: Vec<String>,
}

impl<'a> Walk<'a> {
    fn new(file: &'a str, collector: &'a mut Collector) -> Self {
        Self {
            file,
            collector,
            trail: Vec::new(),
        }
    }

    fn required(&mut self, data: &Value, shape: Shape) -> Result<()> {
        let Value::Object(record) = data else {
            return Ok(());
        };
        for decl in fields(shape) {
            match record.get(decl.name) {
                None if decl.required => {
                    self.collector.handle(ValidationError::MissingRequiredKey {
                        key: decl.name.to_string(),
                        file: self.file.to_string(),
                        shape,
                        trail: self.trail.clone(),
                    })?;
                }
                None => {}
                Some(value) => self.descend(decl, value, Self::required)?,
            }
        }
        Ok(())
    }

    fn unknown(&mut self, data: &Value, shape: Shape) -> Result<()> {
        let Value::Object(record) = data else {
            return Ok(());
        };
        for (key, value) in record {
            match field(shape, key) {
                None => {
                    self.collector.handle(ValidationError::UnknownKey {
                        key: key.clone(),
                        file: self.file.to_string(),
                        shape,
                        trail: self.trail.clone(),
                    })?;
                }
                Some(decl) => self.descend(decl, value, Self::unknown)?,
            }
        }
        Ok(())
    }

    /// Apply `check` to the records held by a field's value.
    fn descend(
        &mut self,
        decl: &Field,
        value: &Value,
        check: fn(&mut Self, &Value, Shape) -> Result<()>,
    ) -> Result<()> {
        if let Some(shape) = decl.entries {
            let Value::Object(entries) = value else {
                return Ok(());
            };
            for (name, entry) in entries {
                if name == INCLUDE_KEY {
                    continue;
                }
                self.trail.push(decl.name.to_string());
                self.trail.push(name.clone());
                let result = check(self, entry, shape);
                self.trail.truncate(self.trail.len() - 2);
                result?;
            }
        } else if let Some(shape) = decl.nested {
            self.trail.push(decl.name.to_string());
            let result = check(self, value, shape);
            self.trail.pop();
            result?;
        }
        Ok(())
    }
}
