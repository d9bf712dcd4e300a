use std::collections::BTreeMap;

use crate::EdmType;

/// A declared property of a [`Schema`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    /// Type the property is read as when the wire carries no type tag.
    pub edm_type: EdmType,
    /// Decoding fails when a required property is absent.
    pub required: bool,
}

/// The shape a record is decoded into.
///
/// A dynamic schema declares nothing: every property is read with its tagged
/// or inferred type. Declared properties take their type from the schema when
/// the wire carries no tag; undeclared properties are kept as they are.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    fields: BTreeMap<String, Field>,
}

impl Schema {
    /// A schema without declared properties.
    pub fn dynamic() -> Self {
        Self::default()
    }

    /// Declare a required property.
    pub fn field(mut self, name: impl Into<String>, edm_type: EdmType) -> Self {
        self.fields.insert(
            name.into(),
            Field {
                edm_type,
                required: true,
            },
        );
        self
    }

    /// Declare an optional property.
    pub fn optional(mut self, name: impl Into<String>, edm_type: EdmType) -> Self {
        self.fields.insert(
            name.into(),
            Field {
                edm_type,
                required: false,
            },
        );
        self
    }

    /// Look up a declared property.
    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    /// Names of the required properties.
    pub fn required(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|(_, f)| f.required)
            .map(|(name, _)| name.as_str())
    }

    /// Whether this schema declares no property.
    pub fn is_dynamic(&self) -> bool {
        self.fields.is_empty()
    }

    /// Names of every declared property, for `$select`.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}
