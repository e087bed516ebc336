//! Per-operation visibility of types and fields.

use indexmap::IndexMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeFilter {
    /// The type is hidden as a whole.
    Disallowed,
    /// Field name to visibility. Missing fields are visible.
    Fields(IndexMap<String, bool>),
}

/// Type name to [`TypeFilter`]. A missing type is unrestricted.
///
/// Updates follow AND semantics: once something is disallowed, no later update
/// makes it visible again.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterMap {
    types: IndexMap<String, TypeFilter>,
}

impl FilterMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn disallow_type(&mut self, type_name: &str) {
        self.types
            .insert(type_name.to_string(), TypeFilter::Disallowed);
    }

    pub fn set_field(&mut self, type_name: &str, field_name: &str, allowed: bool) {
        let entry = self
            .types
            .entry(type_name.to_string())
            .or_insert_with(|| TypeFilter::Fields(IndexMap::new()));

        if let TypeFilter::Fields(fields) = entry {
            let visible = fields.entry(field_name.to_string()).or_insert(true);
            *visible &= allowed;
        }
    }

    pub fn get(&self, type_name: &str) -> Option<&TypeFilter> {
        self.types.get(type_name)
    }

    pub fn is_type_disallowed(&self, type_name: &str) -> bool {
        matches!(self.types.get(type_name), Some(TypeFilter::Disallowed))
    }

    /// `false` when either the field or its whole type is hidden.
    pub fn is_field_allowed(&self, type_name: &str, field_name: &str) -> bool {
        match self.types.get(type_name) {
            Some(TypeFilter::Disallowed) => false,
            Some(TypeFilter::Fields(fields)) => fields.get(field_name).copied().unwrap_or(true),
            None => true,
        }
    }

    /// Whether any field of `type_name` is explicitly hidden.
    pub fn has_disallowed_field(&self, type_name: &str) -> bool {
        match self.types.get(type_name) {
            Some(TypeFilter::Fields(fields)) => fields.values().any(|allowed| !allowed),
            _ => false,
        }
    }

    /// `true` when nothing is hidden.
    pub fn is_all_allowed(&self) -> bool {
        self.types.values().all(|filter| match filter {
            TypeFilter::Disallowed => false,
            TypeFilter::Fields(fields) => fields.values().all(|allowed| *allowed),
        })
    }

    pub fn disallowed_count(&self) -> usize {
        self.types
            .values()
            .map(|filter| match filter {
                TypeFilter::Disallowed => 1,
                TypeFilter::Fields(fields) => fields.values().filter(|allowed| !**allowed).count(),
            })
            .sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &TypeFilter)> {
        self.types.iter()
    }

    /// Folds `other` into `self`.
    pub fn merge(&mut self, other: FilterMap) {
        for (type_name, filter) in other.types {
            match filter {
                TypeFilter::Disallowed => self.disallow_type(&type_name),
                TypeFilter::Fields(fields) => {
                    for (field_name, allowed) in fields {
                        self.set_field(&type_name, &field_name, allowed);
                    }
                }
            }
        }
    }
}
