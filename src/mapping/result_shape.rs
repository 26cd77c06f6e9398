use crate::reflection::TypeKey;
use crate::types::ScalarKind;

/// Explicit `column -> property` assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultMapping {
    pub column: String,
    pub property: String,
    pub kind: Option<ScalarKind>,
}

/// A column passed to the result type's constructor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstructorArg {
    pub column: String,
    pub kind: ScalarKind,
}

/// How rows of a select are turned into objects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultShape {
    pub type_key: TypeKey,
    pub mappings: Vec<ResultMapping>,
    pub constructor_args: Vec<ConstructorArg>,
    pub auto_mapping: bool,
}

impl Default for ResultShape {
    fn default() -> Self {
        Self::of(TypeKey::Map)
    }
}

impl ResultShape {
    #[must_use]
    pub fn of(type_key: TypeKey) -> Self {
        Self {
            type_key,
            mappings: Vec::new(),
            constructor_args: Vec::new(),
            auto_mapping: true,
        }
    }

    #[must_use]
    pub fn scalar(kind: ScalarKind) -> Self {
        Self::of(TypeKey::Scalar(kind))
    }

    #[must_use]
    pub fn bean(type_name: impl Into<String>) -> Self {
        Self::of(TypeKey::Named(type_name.into()))
    }

    #[must_use]
    pub fn map(mut self, column: impl Into<String>, property: impl Into<String>) -> Self {
        self.mappings.push(ResultMapping {
            column: column.into(),
            property: property.into(),
            kind: None,
        });
        self
    }

    #[must_use]
    pub fn map_as(
        mut self,
        column: impl Into<String>,
        property: impl Into<String>,
        kind: ScalarKind,
    ) -> Self {
        self.mappings.push(ResultMapping {
            column: column.into(),
            property: property.into(),
            kind: Some(kind),
        });
        self
    }

    #[must_use]
    pub fn constructor_arg(mut self, column: impl Into<String>, kind: ScalarKind) -> Self {
        self.constructor_args.push(ConstructorArg {
            column: column.into(),
            kind,
        });
        self
    }

    #[must_use]
    pub fn auto_mapping(mut self, enabled: bool) -> Self {
        self.auto_mapping = enabled;
        self
    }

    /// Whether `column` is the source of an explicit mapping or a constructor argument.
    #[must_use]
    pub fn is_mapped(&self, column: &str) -> bool {
        self.mappings
            .iter()
            .any(|m| m.column.eq_ignore_ascii_case(column))
            || self
                .constructor_args
                .iter()
                .any(|a| a.column.eq_ignore_ascii_case(column))
    }
}
