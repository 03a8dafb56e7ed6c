//! Turning virtual values into live values
//!
//! Virtual trees reference other nodes by identity. Before such a value can
//! be compared with, or written to, the live tree the identity is resolved
//! through the registry. Every other value kind passes through unchanged.

use crate::instance_map::InstanceMap;
use treesync_core::{variant_eq, LiveLookup, LiveTree, LiveTreeError, Ref, Variant};

/// Decode a virtual property value for the live tree
pub fn decode_value(
    property: &str,
    value: &Variant,
    instances: &InstanceMap,
) -> Result<Variant, LiveTreeError> {
    match value {
        Variant::Ref(Ref::Id(id)) => match instances.get_handle(id) {
            Some(handle) => Ok(Variant::Ref(Ref::Handle(handle))),
            None => Err(LiveTreeError::DecodeFailed {
                property: property.to_string(),
                reason: format!("reference to unknown id {}", id),
            }),
        },
        other => Ok(other.clone()),
    }
}

/// Read-only view of the live tree through the identity registry
pub struct LiveView<'a, T: LiveTree + ?Sized> {
    instances: &'a InstanceMap,
    tree: &'a T,
}

impl<'a, T: LiveTree + ?Sized> LiveView<'a, T> {
    pub fn new(instances: &'a InstanceMap, tree: &'a T) -> Self {
        Self { instances, tree }
    }
}

impl<T: LiveTree + ?Sized> LiveLookup for LiveView<'_, T> {
    fn tracks(&self, id: &str) -> bool {
        self.instances
            .get_handle(id)
            .is_some_and(|handle| self.tree.contains(handle))
    }

    fn name_matches(&self, id: &str, name: &str) -> bool {
        self.instances
            .get_handle(id)
            .and_then(|handle| self.tree.name(handle))
            .is_some_and(|current| current == name)
    }

    fn class_name_matches(&self, id: &str, class_name: &str) -> bool {
        self.instances
            .get_handle(id)
            .and_then(|handle| self.tree.class_name(handle))
            .is_some_and(|current| current == class_name)
    }

    fn property_matches(&self, id: &str, property: &str, value: &Variant) -> bool {
        let Some(handle) = self.instances.get_handle(id) else {
            return false;
        };
        let Ok(current) = self.tree.read_property(handle, property) else {
            return false;
        };
        let Ok(decoded) = decode_value(property, value, self.instances) else {
            return false;
        };
        variant_eq(current.as_ref(), Some(&decoded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use treesync_core::{LiveHandle, MemoryTree};

    #[test]
    fn test_identity_refs_resolve_through_registry() {
        let mut instances = InstanceMap::new();
        instances.insert("target", LiveHandle::new(7));

        let decoded =
            decode_value("PrimaryPart", &Variant::Ref(Ref::Id("target".into())), &instances);
        assert_eq!(decoded, Ok(Variant::Ref(Ref::Handle(LiveHandle::new(7)))));

        let unresolved =
            decode_value("PrimaryPart", &Variant::Ref(Ref::Id("nope".into())), &instances);
        assert!(matches!(unresolved, Err(LiveTreeError::DecodeFailed { .. })));

        let plain = decode_value("Size", &Variant::Float64(1.0), &instances);
        assert_eq!(plain, Ok(Variant::Float64(1.0)));
    }

    #[test]
    fn test_live_view_compares_with_fuzzy_equality() {
        let mut tree = MemoryTree::new("DataModel", "game");
        let root = tree.root();
        let part = tree.insert(
            root,
            "Part",
            "P",
            [("Transparency".to_string(), Variant::Float64(0.5))],
        );
        let mut instances = InstanceMap::new();
        instances.insert("p", part);

        let view = LiveView::new(&instances, &tree);
        assert!(view.tracks("p"));
        assert!(view.name_matches("p", "P"));
        assert!(view.class_name_matches("p", "Part"));
        assert!(view.property_matches("p", "Transparency", &Variant::Float64(0.50001)));
        assert!(!view.property_matches("p", "Transparency", &Variant::Float64(0.7)));
        assert!(!view.tracks("other"));
    }
}
