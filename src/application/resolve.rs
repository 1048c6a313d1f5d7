//! Reference resolution.
//!
//! Turns the id-valued fields of a raw record into the records they name,
//! using one prebuilt index per dependency collection.

use std::collections::{HashMap, HashSet};

use omnia_types::{
    Cardinality, FetchPlan, HydratedItem, RawItem, ReferenceSpec, ResourceId, parse_id_list,
};
use serde_json::Value;
use tracing::trace;

/// Id → record map over one fetched collection.
#[derive(Debug, Clone, Default)]
pub struct LookupIndex {
    items: HashMap<ResourceId, RawItem>,
}

impl LookupIndex {
    /// Index `items` by normalized id. Records without an id are skipped; on a
    /// repeated id the first record wins.
    pub fn build(items: &[RawItem]) -> Self {
        let mut index = HashMap::with_capacity(items.len());
        for item in items {
            if let Some(id) = item.id() {
                index.entry(id).or_insert_with(|| item.clone());
            }
        }
        Self { items: index }
    }

    pub fn get(&self, id: &ResourceId) -> Option<&RawItem> {
        self.items.get(id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Lookup indices keyed by collection name.
pub type Indices = HashMap<String, LookupIndex>;

fn lookup<'a>(
    id: &ResourceId,
    spec: &ReferenceSpec,
    indices: &'a Indices,
) -> Option<&'a RawItem> {
    spec.source_collections
        .iter()
        .filter_map(|collection| indices.get(collection))
        .find_map(|index| index.get(id))
}

/// Resolve one reference field of `item`.
///
/// `Single` yields the matched record or `null`. `Array` yields the matched
/// records in id order; ids with no match are dropped. A multi-source reference
/// searches its collections in listed order and keeps one record per id.
pub fn resolve(item: &RawItem, spec: &ReferenceSpec, indices: &Indices) -> Value {
    let ids = item
        .get(&spec.source_field)
        .map(|raw| parse_id_list(raw, spec.legacy_format))
        .unwrap_or_default();

    match spec.cardinality {
        Cardinality::Single => ids
            .first()
            .and_then(|id| lookup(id, spec, indices))
            .map_or(Value::Null, RawItem::to_value),
        Cardinality::Array => {
            let mut seen = HashSet::new();
            let resolved = ids
                .iter()
                .filter(|id| !spec.is_multi_source() || seen.insert(*id))
                .filter_map(|id| {
                    let hit = lookup(id, spec, indices);
                    if hit.is_none() {
                        trace!(
                            field = %spec.source_field,
                            id = %id,
                            "Dropping unresolved reference"
                        );
                    }
                    hit
                })
                .map(RawItem::to_value)
                .collect();
            Value::Array(resolved)
        }
    }
}

/// Hydrate every record of the main collection according to `plan`.
pub fn hydrate_items(
    plan: &FetchPlan,
    items: &[RawItem],
    indices: &Indices,
) -> Vec<HydratedItem> {
    items
        .iter()
        .map(|item| {
            let resolved = plan
                .references()
                .iter()
                .map(|spec| (spec.target_field.clone(), resolve(item, spec, indices)));
            HydratedItem::assemble(item, resolved, plan.item_type())
        })
        .collect()
}
