//! Property-based test generators using proptest.
//!
//! Provides strategies for generating manifests and names that the engine
//! accepts.

use crate::fixtures::{config_map_with, service};
use applyset_model::Resource;
use proptest::prelude::*;
use serde_json::json;

/// Strategy for generating valid batch base names.
pub fn base_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z0-9]{1,12}").expect("Invalid regex")
}

/// Strategy for generating strings that are not valid base names.
pub fn invalid_base_name_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        prop::string::string_regex("[A-Z][a-z0-9]{0,8}").expect("Invalid regex"),
        prop::string::string_regex("[a-z0-9]{1,6}[-_.][a-z0-9]{1,6}").expect("Invalid regex"),
    ]
}

/// Strategy for generating valid object names.
pub fn object_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9-]{0,14}[a-z0-9]").expect("Invalid regex")
}

/// Strategy for generating namespace names.
pub fn namespace_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["default", "prod", "staging", "kube-system"])
        .prop_map(str::to_string)
}

/// Strategy for generating a config map or a service.
pub fn resource_strategy() -> impl Strategy<Value = Resource> {
    (
        namespace_strategy(),
        object_name_strategy(),
        any::<bool>(),
        1u16..=65535,
    )
        .prop_map(|(namespace, name, is_service, port)| {
            if is_service {
                service(&namespace, &name, port)
            } else {
                config_map_with(&namespace, &name, json!({"port": port.to_string()}))
            }
        })
}

/// Strategy for generating resources with pairwise distinct identity keys.
pub fn distinct_resources_strategy(max: usize) -> impl Strategy<Value = Vec<Resource>> {
    prop::collection::vec(resource_strategy(), 1..=max.max(1)).prop_map(|resources| {
        let mut seen = std::collections::HashSet::new();
        resources
            .into_iter()
            .filter(|r| seen.insert(applyset_model::resource_key(r)))
            .collect()
    })
}
