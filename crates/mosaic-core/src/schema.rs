//! Field sets and the aggregated schema description.
//!
//! A [`FieldSet`] is an insertion-ordered map from field name to an
//! engine-defined field definition. Sets contributed by several handlers
//! are combined with [`FieldSet::merge`]: a later definition replaces an
//! earlier one of the same name, and the field keeps the position where
//! it first appeared.

use indexmap::IndexMap;

/// Name of the query root object.
pub const QUERY_ROOT: &str = "Query";

/// Name of the mutation root object.
pub const MUTATION_ROOT: &str = "Mutation";

/// Insertion-ordered mapping from field name to field definition.
///
/// # Example
///
/// ```
/// use mosaic_core::FieldSet;
///
/// let mut merged = FieldSet::new().with("ping", "a").with("users", "a");
/// merged.merge(FieldSet::new().with("ping", "b").with("orders", "b"));
///
/// let names: Vec<_> = merged.names().collect();
/// assert_eq!(names, ["ping", "users", "orders"]);
/// assert_eq!(merged.get("ping"), Some(&"b"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSet<F> {
    fields: IndexMap<String, F>,
}

impl<F> FieldSet<F> {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self {
            fields: IndexMap::new(),
        }
    }

    /// Adds a field, returning the set (builder style).
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, field: F) -> Self {
        self.insert(name, field);
        self
    }

    /// Adds or replaces a field, returning the replaced definition.
    ///
    /// A replaced field keeps its original position.
    pub fn insert(&mut self, name: impl Into<String>, field: F) -> Option<F> {
        self.fields.insert(name.into(), field)
    }

    /// Merges `other` into `self`, last write wins.
    pub fn merge(&mut self, other: FieldSet<F>) {
        self.fields.extend(other.fields);
    }

    /// Looks up a field definition.
    pub fn get(&self, name: &str) -> Option<&F> {
        self.fields.get(name)
    }

    /// Returns `true` if the field exists.
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Field names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// `(name, definition)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &F)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if no fields are defined.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<F> Default for FieldSet<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F, K: Into<String>> FromIterator<(K, F)> for FieldSet<F> {
    fn from_iter<I: IntoIterator<Item = (K, F)>>(iter: I) -> Self {
        let mut set = Self::new();
        for (name, field) in iter {
            set.insert(name, field);
        }
        set
    }
}

impl<F> IntoIterator for FieldSet<F> {
    type Item = (String, F);
    type IntoIter = indexmap::map::IntoIter<String, F>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

/// A named root object.
#[derive(Debug, Clone)]
pub struct ObjectConfig<F> {
    /// Object type name.
    pub name: String,
    /// Fields of the object.
    pub fields: FieldSet<F>,
}

impl<F> ObjectConfig<F> {
    /// Creates a root object.
    pub fn new(name: impl Into<String>, fields: FieldSet<F>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }
}

/// Schema description handed to the query engine.
///
/// A root is present only when at least one field was contributed to it.
#[derive(Debug, Clone)]
pub struct SchemaConfig<F> {
    /// Query root.
    pub query: Option<ObjectConfig<F>>,
    /// Mutation root.
    pub mutation: Option<ObjectConfig<F>>,
}

impl<F> SchemaConfig<F> {
    /// Builds a description from merged query and mutation sets.
    ///
    /// ```
    /// use mosaic_core::{FieldSet, SchemaConfig};
    ///
    /// let config = SchemaConfig::from_field_sets(FieldSet::new().with("ping", ()), FieldSet::new());
    /// assert_eq!(config.query.unwrap().name, "Query");
    /// assert!(config.mutation.is_none());
    /// ```
    pub fn from_field_sets(query: FieldSet<F>, mutation: FieldSet<F>) -> Self {
        Self {
            query: (!query.is_empty()).then(|| ObjectConfig::new(QUERY_ROOT, query)),
            mutation: (!mutation.is_empty()).then(|| ObjectConfig::new(MUTATION_ROOT, mutation)),
        }
    }

    /// Total number of fields across both roots.
    pub fn field_count(&self) -> usize {
        self.query.as_ref().map_or(0, |o| o.fields.len())
            + self.mutation.as_ref().map_or(0, |o| o.fields.len())
    }
}
