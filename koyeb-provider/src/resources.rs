//! Resource type configurations for the Koyeb API
//!
//! This module defines:
//! - Resource type definitions (implementing ResourceType trait)
//! - Per-type attribute rules checked before anything is sent to the API

use koyeb_core::ResourceKind;
use koyeb_core::provider::ResourceType;

// =============================================================================
// Resource Type Definitions
// =============================================================================

macro_rules! define_resource_type {
    ($name:ident, $type_name:expr) => {
        define_resource_type!($name, $type_name, None);
    };
    ($name:ident, $type_name:expr, $kind:expr) => {
        pub struct $name;
        impl ResourceType for $name {
            fn name(&self) -> &'static str {
                $type_name
            }
            fn lookup_kind(&self) -> Option<ResourceKind> {
                $kind
            }
        }
    };
}

define_resource_type!(AppType, "app", Some(ResourceKind::App));
define_resource_type!(ServiceType, "service", Some(ResourceKind::Service));
define_resource_type!(DomainType, "domain", Some(ResourceKind::Domain));
define_resource_type!(SecretType, "secret", Some(ResourceKind::Secret));
define_resource_type!(VolumeType, "volume");

/// Returns all resource types supported by this provider
pub fn resource_types() -> Vec<Box<dyn ResourceType>> {
    vec![
        Box::new(AppType),
        Box::new(ServiceType),
        Box::new(DomainType),
        Box::new(SecretType),
        Box::new(VolumeType),
    ]
}

/// Kind used to resolve names for a resource type, if it has one
pub fn lookup_kind(resource_type: &str) -> Option<ResourceKind> {
    resource_types()
        .into_iter()
        .find(|t| t.name() == resource_type)
        .and_then(|t| t.lookup_kind())
}

// =============================================================================
// Resource Configuration
// =============================================================================

/// Attribute rule: (name, is_required_for_create)
pub type AttrRule = (&'static str, bool);

/// Resource type configuration
pub struct ResourceConfig {
    /// Attributes accepted in a resource block
    pub attributes: &'static [AttrRule],
    /// Inclusive bounds on the length of `name`
    pub name_length: Option<(usize, usize)>,
    /// Whether changes can be applied in place
    pub updatable: bool,
}

pub const APP_CONFIG: ResourceConfig = ResourceConfig {
    attributes: &[("name", true)],
    name_length: Some((3, 23)),
    updatable: false,
};

pub const SERVICE_CONFIG: ResourceConfig = ResourceConfig {
    attributes: &[("app_name", true), ("definition", true)],
    name_length: None,
    updatable: true,
};

pub const DOMAIN_CONFIG: ResourceConfig = ResourceConfig {
    attributes: &[("name", true), ("app_name", false)],
    name_length: None,
    updatable: true,
};

pub const SECRET_CONFIG: ResourceConfig = ResourceConfig {
    attributes: &[
        ("name", true),
        ("type", false),
        ("value", false),
        ("docker_hub_registry", false),
        ("github_registry", false),
        ("gitlab_registry", false),
        ("digital_ocean_container_registry", false),
        ("private_registry", false),
        ("azure_container_registry", false),
    ],
    name_length: Some((2, 64)),
    updatable: true,
};

pub const VOLUME_CONFIG: ResourceConfig = ResourceConfig {
    attributes: &[
        ("name", true),
        ("region", true),
        ("max_size", true),
        ("volume_type", false),
        ("read_only", false),
    ],
    name_length: Some((2, 64)),
    updatable: true,
};

// =============================================================================
// Config Lookup
// =============================================================================

/// Get resource configuration by type name
pub fn get_resource_config(resource_type: &str) -> Option<&'static ResourceConfig> {
    match resource_type {
        "app" => Some(&APP_CONFIG),
        "service" => Some(&SERVICE_CONFIG),
        "domain" => Some(&DOMAIN_CONFIG),
        "secret" => Some(&SECRET_CONFIG),
        "volume" => Some(&VOLUME_CONFIG),
        _ => None,
    }
}
