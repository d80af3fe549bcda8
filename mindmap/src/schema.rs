//! The ordered top-level category taxonomy.

use serde::{Deserialize, Serialize};

/// Ordered, case-insensitively unique list of top-level category names.
///
/// The schema only grows: names are appended, never renamed or removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategorySchema {
    names: Vec<String>,
}

impl CategorySchema {
    /// Create a schema from names, dropping blanks and case-insensitive duplicates.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut schema = Self::default();
        for name in names {
            schema.ensure(&name.into());
        }
        schema
    }

    /// The category names in order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Position of a category, matched case-insensitively.
    pub fn position(&self, name: &str) -> Option<usize> {
        let name = name.trim();
        self.names.iter().position(|n| n.eq_ignore_ascii_case(name))
    }

    /// Whether the schema contains a category, matched case-insensitively.
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// The schema's own spelling of a category name.
    pub fn canonical(&self, name: &str) -> Option<&str> {
        self.position(name).map(|i| self.names[i].as_str())
    }

    /// Return the schema's spelling of `name`, appending it if absent.
    ///
    /// The boolean is `true` when the name was appended.
    pub fn ensure(&mut self, name: &str) -> (String, bool) {
        let name = name.trim();
        if let Some(existing) = self.canonical(name) {
            return (existing.to_string(), false);
        }
        if name.is_empty() {
            return (String::new(), false);
        }
        self.names.push(name.to_string());
        (name.to_string(), true)
    }

    /// Union of schemas in first-seen order.
    pub fn union<'a>(schemas: impl IntoIterator<Item = &'a CategorySchema>) -> Self {
        let mut unified = Self::default();
        for schema in schemas {
            for name in &schema.names {
                unified.ensure(name);
            }
        }
        unified
    }
}

impl<S: Into<String>> FromIterator<S> for CategorySchema {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_dedups_case_insensitively() {
        let schema = CategorySchema::new(["Economic", "economic", " ", "Social"]);
        assert_eq!(schema.names(), &["Economic".to_string(), "Social".to_string()]);
    }

    #[test]
    fn test_ensure_appends_at_end() {
        let mut schema = CategorySchema::new(["Technological"]);
        assert_eq!(schema.ensure("technological"), ("Technological".to_string(), false));
        assert_eq!(schema.ensure("DeepTech"), ("DeepTech".to_string(), true));
        assert_eq!(schema.names().last().map(String::as_str), Some("DeepTech"));
    }

    #[test]
    fn test_union_keeps_first_seen_order() {
        let a = CategorySchema::new(["Technological", "Economic"]);
        let b = CategorySchema::new(["Legal", "economic", "Social"]);
        let unified = CategorySchema::union([&a, &b]);
        assert_eq!(
            unified.names(),
            &["Technological", "Economic", "Legal", "Social"].map(String::from)
        );
    }
}
