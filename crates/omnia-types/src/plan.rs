use serde::{Deserialize, Serialize};

/// How many records a reference field points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    /// Resolves to one embedded record or `null`.
    Single,
    /// Resolves to a list of embedded records; unknown ids are dropped.
    Array,
}

/// Storage shape the source field is known to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegacyFormat {
    /// A JSON array of ids.
    Array,
    /// A comma-separated string of ids.
    Csv,
    /// Decide from the value's shape.
    #[default]
    Auto,
}

/// One hydration rule: read `source_field`, write the resolved record(s) into
/// `target_field`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceSpec {
    pub source_field: String,
    pub target_field: String,
    pub cardinality: Cardinality,
    /// Collections searched in order. More than one makes this a union search.
    pub source_collections: Vec<String>,
    #[serde(default)]
    pub legacy_format: LegacyFormat,
}

impl ReferenceSpec {
    pub fn single(
        source_field: impl Into<String>,
        target_field: impl Into<String>,
        collection: impl Into<String>,
    ) -> Self {
        Self::new(source_field, target_field, Cardinality::Single, collection)
    }

    pub fn array(
        source_field: impl Into<String>,
        target_field: impl Into<String>,
        collection: impl Into<String>,
    ) -> Self {
        Self::new(source_field, target_field, Cardinality::Array, collection)
    }

    fn new(
        source_field: impl Into<String>,
        target_field: impl Into<String>,
        cardinality: Cardinality,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            source_field: source_field.into(),
            target_field: target_field.into(),
            cardinality,
            source_collections: vec![collection.into()],
            legacy_format: LegacyFormat::Auto,
        }
    }

    /// Also search `collection`, after the ones already listed.
    pub fn or_from(mut self, collection: impl Into<String>) -> Self {
        let collection = collection.into();
        if !self.source_collections.contains(&collection) {
            self.source_collections.push(collection);
        }
        self
    }

    pub fn legacy(mut self, format: LegacyFormat) -> Self {
        self.legacy_format = format;
        self
    }

    pub fn is_multi_source(&self) -> bool {
        self.source_collections.len() > 1
    }
}

/// Remote action name for a collection: `actants` becomes `getActants`.
pub fn default_action(collection: &str) -> String {
    let mut chars = collection.chars();
    match chars.next() {
        Some(first) => format!("get{}{}", first.to_uppercase(), chars.as_str()),
        None => "get".to_owned(),
    }
}

/// Full declarative description of one collection's hydration needs.
///
/// Only [`FetchPlan::builder`] constructs plans, so the type and action
/// defaults always apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchPlan {
    name: String,
    item_type: String,
    action: String,
    references: Vec<ReferenceSpec>,
}

impl FetchPlan {
    pub fn builder(name: impl Into<String>) -> FetchPlanBuilder {
        FetchPlanBuilder {
            name: name.into(),
            item_type: None,
            action: None,
            references: Vec::new(),
        }
    }

    /// Collection name; doubles as the cache key.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Value stamped into each hydrated item's `type` field.
    pub fn item_type(&self) -> &str {
        &self.item_type
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn references(&self) -> &[ReferenceSpec] {
        &self.references
    }

    /// Every collection the references read from, first occurrence first.
    pub fn dependencies(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for spec in &self.references {
            for collection in &spec.source_collections {
                if !out.contains(&collection.as_str()) {
                    out.push(collection.as_str());
                }
            }
        }
        out
    }

    /// The main collection followed by its dependencies, without repeats.
    pub fn required_collections(&self) -> Vec<&str> {
        let mut out = vec![self.name.as_str()];
        for dependency in self.dependencies() {
            if dependency != self.name {
                out.push(dependency);
            }
        }
        out
    }
}

#[derive(Debug, Clone)]
pub struct FetchPlanBuilder {
    name: String,
    item_type: Option<String>,
    action: Option<String>,
    references: Vec<ReferenceSpec>,
}

impl FetchPlanBuilder {
    pub fn item_type(mut self, item_type: impl Into<String>) -> Self {
        self.item_type = Some(item_type.into());
        self
    }

    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn reference(mut self, spec: ReferenceSpec) -> Self {
        self.references.push(spec);
        self
    }

    pub fn build(self) -> FetchPlan {
        let action = self.action.unwrap_or_else(|| default_action(&self.name));
        let item_type = self.item_type.unwrap_or_else(|| self.name.clone());
        FetchPlan {
            name: self.name,
            item_type,
            action,
            references: self.references,
        }
    }
}
