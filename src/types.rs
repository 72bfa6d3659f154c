//! Schema kinds and the static field ownership table.
//!
//! Every schema document is classified as one [`SchemaKind`]. The table in
//! this module lists, for each kind and for each nested record shape, the
//! fields that may appear, whether they are required, and what their values
//! contain:
//!
//! | Field property | Meaning |
//! |----------------|---------|
//! | `required` | Must be present after merging |
//! | `entries`  | Value is a map of name → record of this shape (e.g. `attributes`) |
//! | `nested`   | Value is a single record of this shape (e.g. `@deprecated`) |
//!
//! The merge engine consults the table for two things: which field of a kind
//! holds attribute definitions, and which fields a target owns that a source
//! kind does not declare (those are excluded when merging the target in).

use std::fmt;

use serde::Serialize;

/// Classification of a schema document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaKind {
    Dictionary,
    Version,
    Categories,
    Include,
    Profile,
    Object,
    Event,
    Extension,
}

impl SchemaKind {
    pub const ALL: [SchemaKind; 8] = [
        SchemaKind::Dictionary,
        SchemaKind::Version,
        SchemaKind::Categories,
        SchemaKind::Include,
        SchemaKind::Profile,
        SchemaKind::Object,
        SchemaKind::Event,
        SchemaKind::Extension,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SchemaKind::Dictionary => "dictionary",
            SchemaKind::Version => "version",
            SchemaKind::Categories => "categories",
            SchemaKind::Include => "include",
            SchemaKind::Profile => "profile",
            SchemaKind::Object => "object",
            SchemaKind::Event => "event",
            SchemaKind::Extension => "extension",
        }
    }

    /// Fields declared for documents of this kind.
    pub fn fields(self) -> &'static [Field] {
        fields(Shape::Document(self))
    }

    /// Whether this kind declares `name` as a field.
    pub fn declares(self, name: &str) -> bool {
        self.fields().iter().any(|f| f.name == name)
    }

    /// The field holding attribute definitions, if this kind has one.
    pub fn attribute_map(self) -> Option<&'static str> {
        self.fields()
            .iter()
            .find(|f| f.is_attribute_map())
            .map(|f| f.name)
    }

    /// `"object | event"`-style rendering of a set of kinds.
    pub fn describe_any(kinds: &[SchemaKind]) -> String {
        kinds
            .iter()
            .map(|k| k.as_str())
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

impl fmt::Display for SchemaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The shape of a record: a whole document of some kind, or a record nested
/// inside one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    Document(SchemaKind),
    Attribute,
    Category,
    EnumMember,
    Deprecation,
    DictionaryTypes,
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Document(kind) => write!(f, "{kind}"),
            Shape::Attribute => f.write_str("attribute"),
            Shape::Category => f.write_str("category"),
            Shape::EnumMember => f.write_str("enum_member"),
            Shape::Deprecation => f.write_str("deprecation"),
            Shape::DictionaryTypes => f.write_str("dictionary_types"),
        }
    }
}

/// One declared field of a record shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub required: bool,
    /// Value is a map whose entries are records of this shape.
    pub entries: Option<Shape>,
    /// Value is a single record of this shape.
    pub nested: Option<Shape>,
}

impl Field {
    const fn required(name: &'static str) -> Self {
        Self {
            name,
            required: true,
            entries: None,
            nested: None,
        }
    }

    const fn optional(name: &'static str) -> Self {
        Self {
            name,
            required: false,
            entries: None,
            nested: None,
        }
    }

    const fn entries(self, shape: Shape) -> Self {
        Self {
            entries: Some(shape),
            ..self
        }
    }

    const fn nested(self, shape: Shape) -> Self {
        Self {
            nested: Some(shape),
            ..self
        }
    }

    /// Whether the value maps attribute names to attribute definitions.
    pub fn is_attribute_map(&self) -> bool {
        self.entries == Some(Shape::Attribute)
    }
}

pub const INCLUDE_KEY: &str = "$include";
pub const EXTENDS_KEY: &str = "extends";
pub const PROFILES_KEY: &str = "profiles";
pub const ATTRIBUTES_KEY: &str = "attributes";
pub const DEPRECATED_KEY: &str = "@deprecated";

const ATTRIBUTE_FIELDS: &[Field] = &[
    Field::optional(INCLUDE_KEY),
    Field::optional("caption"),
    Field::optional("default"),
    Field::optional("description"),
    Field::optional("enum").entries(Shape::EnumMember),
    Field::optional("group"),
    Field::optional("is_array"),
    Field::optional("max_len"),
    Field::optional("name"),
    Field::optional("notes"),
    Field::optional("observable"),
    Field::optional("range"),
    Field::optional("regex"),
    Field::optional("requirement"),
    Field::optional("sibling"),
    Field::optional("type"),
    Field::optional("type_name"),
    Field::optional("profile"),
    Field::optional("values"),
    Field::optional(DEPRECATED_KEY).nested(Shape::Deprecation),
];

const ENUM_MEMBER_FIELDS: &[Field] = &[
    Field::required("caption"),
    Field::optional("description"),
    Field::optional("notes"),
];

const DEPRECATION_FIELDS: &[Field] = &[Field::required("message"), Field::required("since")];

const CATEGORY_FIELDS: &[Field] = &[
    Field::required("caption"),
    Field::required("description"),
    Field::required("uid"),
];

const DICTIONARY_TYPES_FIELDS: &[Field] = &[
    Field::required(ATTRIBUTES_KEY).entries(Shape::Attribute),
    Field::required("caption"),
    Field::required("description"),
];

const DICTIONARY_FIELDS: &[Field] = &[
    Field::required(ATTRIBUTES_KEY).entries(Shape::Attribute),
    Field::required("caption"),
    Field::required("description"),
    Field::required("name"),
    Field::optional("types").nested(Shape::DictionaryTypes),
];

const VERSION_FIELDS: &[Field] = &[Field::required("version")];

const CATEGORIES_FIELDS: &[Field] = &[
    Field::required(ATTRIBUTES_KEY).entries(Shape::Category),
    Field::required("caption"),
    Field::required("description"),
    Field::required("name"),
];

const INCLUDE_FIELDS: &[Field] = &[
    Field::required("caption"),
    Field::required(ATTRIBUTES_KEY).entries(Shape::Attribute),
    Field::optional("description"),
    Field::optional("annotations"),
];

const PROFILE_FIELDS: &[Field] = &[
    Field::required("caption"),
    Field::required("description"),
    Field::required("meta"),
    Field::required("name"),
    Field::required("annotations"),
    Field::required(ATTRIBUTES_KEY).entries(Shape::Attribute),
];

const OBJECT_FIELDS: &[Field] = &[
    Field::required("caption"),
    Field::required("description"),
    Field::required("name"),
    Field::required(ATTRIBUTES_KEY).entries(Shape::Attribute),
    Field::optional(EXTENDS_KEY),
    Field::optional("observable"),
    Field::optional(PROFILES_KEY),
    Field::optional("constraints"),
    Field::optional(INCLUDE_KEY),
    Field::optional(DEPRECATED_KEY).nested(Shape::Deprecation),
];

const EVENT_FIELDS: &[Field] = &[
    Field::required(ATTRIBUTES_KEY).entries(Shape::Attribute),
    Field::required("caption"),
    Field::required("name"),
    Field::optional("uid"),
    Field::optional("category"),
    Field::optional("description"),
    Field::optional(EXTENDS_KEY),
    Field::optional(PROFILES_KEY),
    Field::optional("associations"),
    Field::optional("constraints"),
    Field::optional(INCLUDE_KEY),
    Field::optional(DEPRECATED_KEY).nested(Shape::Deprecation),
];

const EXTENSION_FIELDS: &[Field] = &[
    Field::required("uid"),
    Field::required("name"),
    Field::required("path"),
    Field::required("caption"),
    Field::optional("version"),
    Field::optional("description"),
];

/// Declared fields of a record shape.
pub fn fields(shape: Shape) -> &'static [Field] {
    match shape {
        Shape::Document(SchemaKind::Dictionary) => DICTIONARY_FIELDS,
        Shape::Document(SchemaKind::Version) => VERSION_FIELDS,
        Shape::Document(SchemaKind::Categories) => CATEGORIES_FIELDS,
        Shape::Document(SchemaKind::Include) => INCLUDE_FIELDS,
        Shape::Document(SchemaKind::Profile) => PROFILE_FIELDS,
        Shape::Document(SchemaKind::Object) => OBJECT_FIELDS,
        Shape::Document(SchemaKind::Event) => EVENT_FIELDS,
        Shape::Document(SchemaKind::Extension) => EXTENSION_FIELDS,
        Shape::Attribute => ATTRIBUTE_FIELDS,
        Shape::Category => CATEGORY_FIELDS,
        Shape::EnumMember => ENUM_MEMBER_FIELDS,
        Shape::Deprecation => DEPRECATION_FIELDS,
        Shape::DictionaryTypes => DICTIONARY_TYPES_FIELDS,
    }
}

/// Look up a single field declaration.
pub fn field(shape: Shape, name: &str) -> Option<&'static Field> {
    fields(shape).iter().find(|f| f.name == name)
}

/// Fields owned by `target` that `source` does not declare.
///
/// Merging a target document into a source skips these, so that e.g. a
/// profile's `meta` never leaks into the event that uses the profile.
pub fn excluded_fields(source: SchemaKind, target: SchemaKind) -> Vec<&'static str> {
    target
        .fields()
        .iter()
        .map(|f| f.name)
        .filter(|name| !source.declares(name))
        .collect()
}
