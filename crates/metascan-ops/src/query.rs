//! Type-level queries over a scanned store.

use std::collections::BTreeSet;

use metascan_core::{Store, SUB_TYPES, TYPE_ANNOTATIONS};

/// Read-only query facade over the reference indexes of a [`Store`].
#[derive(Debug, Clone, Copy)]
pub struct MetadataIndex<'a> {
    store: &'a Store,
}

impl<'a> MetadataIndex<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &'a Store {
        self.store
    }

    /// Every type that extends or implements `type_name`, directly or transitively.
    pub fn subtypes_of(&self, type_name: &str) -> BTreeSet<String> {
        self.store.get_transitive_closure(SUB_TYPES, type_name)
    }

    /// Every recorded supertype of `type_name`, directly or transitively.
    pub fn supertypes_of(&self, type_name: &str) -> BTreeSet<String> {
        let mut found = BTreeSet::new();
        let mut pending = vec![type_name.to_string()];
        while let Some(current) = pending.pop() {
            for supertype in self.store.keys_for(SUB_TYPES, &current) {
                if found.insert(supertype.clone()) {
                    pending.push(supertype);
                }
            }
        }
        found
    }

    /// Types carrying `annotation`.
    ///
    /// With `honor_inherited` only directly annotated types are returned.
    /// Otherwise the transitive subtypes of every annotated type are added,
    /// as if the annotation were inherited along the whole hierarchy.
    pub fn types_annotated_with(&self, annotation: &str, honor_inherited: bool) -> BTreeSet<String> {
        let annotated = self.store.get(TYPE_ANNOTATIONS, annotation);
        if honor_inherited {
            return annotated;
        }
        let mut result = annotated.clone();
        for type_name in &annotated {
            result.extend(self.subtypes_of(type_name));
        }
        result
    }
}
