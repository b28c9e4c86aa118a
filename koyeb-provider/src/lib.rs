//! Koyeb Provider
//!
//! Provider implementation for the Koyeb serverless platform.
//!
//! ## Module Structure
//!
//! - `resources` - Resource type definitions and configurations
//! - `provider` - KoyebProvider implementation
//! - `utils` - Attribute validation and conversion helpers

pub mod provider;
pub mod resources;
pub mod utils;

// Re-export main types
pub use provider::{KoyebProvider, ProviderConfig};
pub use utils::AttributeError;

use koyeb_core::provider::{BoxFuture, Provider, ProviderResult, ResourceType};
use koyeb_core::resource::{Resource, ResourceId, State};

use resources::resource_types;

// =============================================================================
// Provider Trait Implementation
// =============================================================================

impl Provider for KoyebProvider {
    fn name(&self) -> &'static str {
        "koyeb"
    }

    fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
        resource_types()
    }

    fn read(
        &self,
        id: &ResourceId,
        identifier: Option<&str>,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.map(|s| s.to_string());
        Box::pin(async move { self.read_resource(&id, identifier.as_deref()).await })
    }

    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let resource = resource.clone();
        Box::pin(async move { self.create_resource(&resource).await })
    }

    fn update(
        &self,
        id: &ResourceId,
        identifier: &str,
        _from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        let to = to.clone();
        Box::pin(async move { self.update_resource(&id, &identifier, &to).await })
    }

    fn delete(&self, id: &ResourceId, identifier: &str) -> BoxFuture<'_, ProviderResult<()>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        Box::pin(async move { self.delete_resource(&id, &identifier).await })
    }

    fn import(&self, id: &ResourceId, reference: &str) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let reference = reference.to_string();
        Box::pin(async move { self.import_resource(&id, &reference).await })
    }
}
