//! Koyeb Provider implementation
//!
//! This module contains the main provider implementation that maps resource
//! blocks onto Koyeb API calls. Names are resolved through the ID mapper and
//! long-running operations are followed with the status waiter.

use std::time::Duration;

use koyeb_client::KoyebClient;
use koyeb_client::models::{
    CreateApp, CreateDomain, CreateService, CreateVolume, SecretBody, UpdateDomain,
    UpdateService, UpdateVolume,
};
use koyeb_core::api::{ApiError, App, Deployment, KoyebApi, REGISTRY_KINDS, Service};
use koyeb_core::idmapper::is_object_id;
use koyeb_core::provider::{ProviderError, ProviderResult};
use koyeb_core::resource::{Resource, ResourceId, State, Value};
use koyeb_core::waiter::{DEFAULT_POLL_INTERVAL, DEFAULT_WAIT_TIMEOUT};
use koyeb_core::{Mapper, MapperError, WaitError, WaitOptions, wait_for_status};
use log::{info, warn};
use tokio_util::sync::CancellationToken;

use crate::resources::{get_resource_config, lookup_kind};
use crate::utils::{
    AttributeError, DEFAULT_SECRET_TYPE, DEFAULT_VOLUME_TYPE, SECRET_TYPES, VOLUME_TYPES,
    app_attributes, domain_attributes, required_int, required_object, required_str,
    secret_attributes, service_attributes, validate_one_of, validate_resource,
    volume_attributes,
};

/// Deployment statuses after which a deployment no longer changes by itself
pub const DEPLOYMENT_FINAL_STATUSES: &[&str] = &[
    "HEALTHY",
    "DEGRADED",
    "UNHEALTHY",
    "CANCELED",
    "STOPPED",
    "ERROR",
    "STASHED",
];

/// Status of an app or service whose deletion has completed
const DELETED_STATUSES: &[&str] = &["DELETED"];

/// Settings for long-running operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Deadline for a deployment to settle or an object to disappear
    pub wait_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Koyeb Provider
pub struct KoyebProvider {
    client: KoyebClient,
    config: ProviderConfig,
    cancel: CancellationToken,
}

impl KoyebProvider {
    pub fn new(client: KoyebClient) -> Self {
        Self {
            client,
            config: ProviderConfig::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Create a provider from `KOYEB_*` environment variables
    pub fn from_env() -> ProviderResult<Self> {
        let client = KoyebClient::from_env()
            .map_err(|e| ProviderError::wrap("Failed to configure Koyeb client", e))?;
        Ok(Self::new(client))
    }

    pub fn with_config(mut self, config: ProviderConfig) -> Self {
        self.config = config;
        self
    }

    /// Waits stop as soon as `cancel` is triggered
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn mapper(&self) -> Mapper<'_> {
        Mapper::new(&self.client)
    }

    fn wait_options(&self, not_found_is_error: bool) -> WaitOptions {
        let options = if not_found_is_error {
            WaitOptions::until_ready(self.config.wait_timeout)
        } else {
            WaitOptions::until_gone(self.config.wait_timeout)
        };
        options.with_interval(self.config.poll_interval)
    }

    // =========================================================================
    // Resource Operations
    // =========================================================================

    /// Read a resource by ID
    ///
    /// Apps, services, domains and secrets also accept a name in place of the
    /// ID. A missing object yields `State::not_found`.
    pub async fn read_resource(
        &self,
        id: &ResourceId,
        identifier: Option<&str>,
    ) -> ProviderResult<State> {
        if get_resource_config(&id.resource_type).is_none() {
            return Err(unknown_type(id));
        }

        let identifier = match identifier.filter(|s| !s.is_empty()) {
            Some(identifier) => identifier,
            None => return Ok(State::not_found(id.clone())),
        };

        let object_id = match lookup_kind(&id.resource_type) {
            Some(kind) if !is_object_id(identifier) => self
                .mapper()
                .resolve(kind, identifier)
                .await
                .map_err(|e| {
                    ProviderError::wrap(format!("Error retrieving {}", id.resource_type), e)
                        .for_resource(id.clone())
                })?,
            _ => identifier.to_string(),
        };

        let result = match id.resource_type.as_str() {
            "app" => self.read_app(id, &object_id).await,
            "service" => self.read_service(id, &object_id).await,
            "domain" => self.read_domain(id, &object_id).await,
            "secret" => self.read_secret(id, &object_id).await,
            "volume" => self.read_volume(id, &object_id).await,
            _ => return Err(unknown_type(id)),
        };

        match result {
            Ok(state) => Ok(state),
            Err(e) if e.is_not_found() => {
                info!(
                    "koyeb_{}.{} ({}) no longer exists",
                    id.resource_type, id.name, object_id
                );
                Ok(State::not_found(id.clone()))
            }
            Err(e) => Err(ProviderError::wrap(
                format!("Error retrieving {}", id.resource_type),
                e,
            )
            .for_resource(id.clone())),
        }
    }

    /// Create a resource and return its state as read back from the API
    pub async fn create_resource(&self, resource: &Resource) -> ProviderResult<State> {
        let id = &resource.id;
        let config = get_resource_config(&id.resource_type).ok_or_else(|| unknown_type(id))?;
        validate_resource(resource, config).map_err(|e| invalid(id, e))?;

        let identifier = match id.resource_type.as_str() {
            "app" => self.create_app(resource).await?,
            "service" => self.create_service(resource).await?,
            "domain" => self.create_domain(resource).await?,
            "secret" => self.create_secret(resource).await?,
            "volume" => self.create_volume(resource).await?,
            _ => return Err(unknown_type(id)),
        };

        self.read_after_write(id, &identifier).await
    }

    /// Update a resource in place
    pub async fn update_resource(
        &self,
        id: &ResourceId,
        identifier: &str,
        to: &Resource,
    ) -> ProviderResult<State> {
        let config = get_resource_config(&id.resource_type).ok_or_else(|| unknown_type(id))?;

        if !config.updatable {
            return Err(ProviderError::new(format!(
                "Update not supported for {}, delete and recreate",
                id.resource_type
            ))
            .for_resource(id.clone()));
        }
        validate_resource(to, config).map_err(|e| invalid(id, e))?;

        match id.resource_type.as_str() {
            "service" => self.update_service(id, identifier, to).await?,
            "domain" => self.update_domain(id, identifier, to).await?,
            "secret" => self.update_secret(id, identifier, to).await?,
            "volume" => self.update_volume(id, identifier, to).await?,
            _ => return Err(unknown_type(id)),
        }

        self.read_after_write(id, identifier).await
    }

    /// Delete a resource
    ///
    /// Apps and services are deleted asynchronously by the platform; the call
    /// returns once they are gone.
    pub async fn delete_resource(&self, id: &ResourceId, identifier: &str) -> ProviderResult<()> {
        let context = format!("Error deleting {}", id.resource_type);
        let wrap = |e: ApiError| ProviderError::wrap(&context, e).for_resource(id.clone());

        match id.resource_type.as_str() {
            "app" => {
                self.client.delete_app(identifier).await.map_err(wrap)?;
                self.wait_until_gone(id, identifier).await?;
            }
            "service" => {
                self.client.delete_service(identifier).await.map_err(wrap)?;
                self.wait_until_gone(id, identifier).await?;
            }
            "domain" => self.client.delete_domain(identifier).await.map_err(wrap)?,
            "secret" => self.client.delete_secret(identifier).await.map_err(wrap)?,
            "volume" => self.client.delete_volume(identifier).await.map_err(wrap)?,
            _ => return Err(unknown_type(id)),
        }

        info!("Deleted {} {}", id.resource_type, identifier);
        Ok(())
    }

    /// Look up an existing object by name or ID and return its state
    ///
    /// Volumes can only be imported by ID.
    pub async fn import_resource(&self, id: &ResourceId, reference: &str) -> ProviderResult<State> {
        if get_resource_config(&id.resource_type).is_none() {
            return Err(unknown_type(id));
        }

        let object_id = match lookup_kind(&id.resource_type) {
            Some(kind) => self
                .mapper()
                .resolve(kind, reference)
                .await
                .map_err(|e| ProviderError::from(e).for_resource(id.clone()))?,
            None if is_object_id(reference) => reference.to_string(),
            None => {
                return Err(ProviderError::new(format!(
                    "{} \"{}\" can only be imported by ID",
                    id.resource_type, reference
                ))
                .for_resource(id.clone()));
            }
        };

        let state = self.read_resource(id, Some(&object_id)).await?;
        if !state.exists {
            return Err(ProviderError::new(format!(
                "{} \"{}\" not found",
                id.resource_type, reference
            ))
            .for_resource(id.clone()));
        }
        Ok(state)
    }

    async fn read_after_write(&self, id: &ResourceId, identifier: &str) -> ProviderResult<State> {
        let state = self.read_resource(id, Some(identifier)).await?;
        if !state.exists {
            return Err(ProviderError::new(format!(
                "{} {} disappeared right after it was written",
                id.resource_type, identifier
            ))
            .for_resource(id.clone()));
        }
        Ok(state)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    async fn read_app(&self, id: &ResourceId, app_id: &str) -> Result<State, ApiError> {
        let app = self.client.get_app(app_id).await?;
        Ok(State::existing(id.clone(), app_attributes(&app)).with_identifier(app.id))
    }

    async fn read_service(&self, id: &ResourceId, service_id: &str) -> Result<State, ApiError> {
        let service = self.client.get_service(service_id).await?;
        Ok(State::existing(id.clone(), service_attributes(&service)).with_identifier(service.id))
    }

    async fn read_domain(&self, id: &ResourceId, domain_id: &str) -> Result<State, ApiError> {
        let domain = self.client.get_domain(domain_id).await?;

        // A dangling app reference must not make the domain itself look gone
        let app_name = match domain.app_id.as_deref().filter(|s| !s.is_empty()) {
            Some(app_id) => match self.client.get_app(app_id).await {
                Ok(app) => Some(app.name),
                Err(e) if e.is_not_found() => {
                    warn!("App {} assigned to domain {} not found", app_id, domain.name);
                    None
                }
                Err(e) => return Err(e),
            },
            None => None,
        };

        Ok(
            State::existing(id.clone(), domain_attributes(&domain, app_name.as_deref()))
                .with_identifier(domain.id),
        )
    }

    async fn read_secret(&self, id: &ResourceId, secret_id: &str) -> Result<State, ApiError> {
        let secret = self.client.get_secret(secret_id).await?;
        let revealed = self.client.reveal_secret(secret_id).await?;
        Ok(
            State::existing(id.clone(), secret_attributes(&secret, &revealed))
                .with_identifier(secret.id),
        )
    }

    async fn read_volume(&self, id: &ResourceId, volume_id: &str) -> Result<State, ApiError> {
        let volume = self.client.get_volume(volume_id).await?;
        Ok(State::existing(id.clone(), volume_attributes(&volume)).with_identifier(volume.id))
    }

    // =========================================================================
    // Writes
    // =========================================================================

    async fn create_app(&self, resource: &Resource) -> ProviderResult<String> {
        let id = &resource.id;
        let body = CreateApp {
            name: required_str(resource, "name")
                .map_err(|e| invalid(id, e))?
                .to_string(),
        };

        let app = self
            .client
            .create_app(&body)
            .await
            .map_err(|e| ProviderError::wrap("Error creating app", e).for_resource(id.clone()))?;
        info!("Created app name: {}", app.name);
        Ok(app.id)
    }

    async fn create_service(&self, resource: &Resource) -> ProviderResult<String> {
        let id = &resource.id;
        let app_id = self.resolve_app_name(resource, "Error creating service").await?;
        let body = CreateService {
            app_id: app_id.unwrap_or_default(),
            definition: required_object(resource, "definition").map_err(|e| invalid(id, e))?,
        };

        let service = self.client.create_service(&body).await.map_err(|e| {
            ProviderError::wrap("Error creating service", e).for_resource(id.clone())
        })?;
        info!("Created service name: {}", service.name);

        self.wait_for_deployment(id, service.latest_deployment_id.as_deref())
            .await?;
        Ok(service.id)
    }

    async fn update_service(
        &self,
        id: &ResourceId,
        identifier: &str,
        to: &Resource,
    ) -> ProviderResult<()> {
        let body = UpdateService {
            definition: required_object(to, "definition").map_err(|e| invalid(id, e))?,
        };

        let service = self
            .client
            .update_service(identifier, &body)
            .await
            .map_err(|e| {
                ProviderError::wrap("Error updating service", e).for_resource(id.clone())
            })?;
        info!("Updated service name: {}", service.name);

        self.wait_for_deployment(id, service.latest_deployment_id.as_deref())
            .await
    }

    async fn create_domain(&self, resource: &Resource) -> ProviderResult<String> {
        let id = &resource.id;
        let app_id = self.resolve_app_name(resource, "Error creating domain").await?;
        let body = CreateDomain {
            name: required_str(resource, "name")
                .map_err(|e| invalid(id, e))?
                .to_string(),
            app_id,
            domain_type: "CUSTOM".to_string(),
        };

        let domain = self.client.create_domain(&body).await.map_err(|e| {
            ProviderError::wrap("Error creating domain", e).for_resource(id.clone())
        })?;
        info!("Created domain name: {}", domain.name);
        Ok(domain.id)
    }

    async fn update_domain(
        &self,
        id: &ResourceId,
        identifier: &str,
        to: &Resource,
    ) -> ProviderResult<()> {
        let app_id = self.resolve_app_name(to, "Error updating domain").await?;
        let body = UpdateDomain {
            app_id: app_id.unwrap_or_default(),
        };

        let domain = self
            .client
            .update_domain(identifier, &body)
            .await
            .map_err(|e| {
                ProviderError::wrap("Error updating domain", e).for_resource(id.clone())
            })?;
        info!("Updated domain name: {}", domain.name);
        Ok(())
    }

    async fn create_secret(&self, resource: &Resource) -> ProviderResult<String> {
        let body = secret_body(resource).map_err(|e| invalid(&resource.id, e))?;
        let secret = self.client.create_secret(&body).await.map_err(|e| {
            ProviderError::wrap("Error creating secret", e).for_resource(resource.id.clone())
        })?;
        info!("Created secret name: {}", secret.name);
        Ok(secret.id)
    }

    async fn update_secret(
        &self,
        id: &ResourceId,
        identifier: &str,
        to: &Resource,
    ) -> ProviderResult<()> {
        let body = secret_body(to).map_err(|e| invalid(id, e))?;
        let secret = self
            .client
            .update_secret(identifier, &body)
            .await
            .map_err(|e| {
                ProviderError::wrap("Error updating secret", e).for_resource(id.clone())
            })?;
        info!("Updated secret name: {}", secret.name);
        Ok(())
    }

    async fn create_volume(&self, resource: &Resource) -> ProviderResult<String> {
        let id = &resource.id;
        let volume_type = resource
            .get_str("volume_type")
            .unwrap_or(DEFAULT_VOLUME_TYPE);
        validate_one_of("volume_type", volume_type, VOLUME_TYPES).map_err(|e| invalid(id, e))?;

        let body = CreateVolume {
            name: required_str(resource, "name")
                .map_err(|e| invalid(id, e))?
                .to_string(),
            volume_type: volume_type.to_string(),
            max_size: required_int(resource, "max_size").map_err(|e| invalid(id, e))?,
            region: required_str(resource, "region")
                .map_err(|e| invalid(id, e))?
                .to_string(),
        };

        let volume = self.client.create_volume(&body).await.map_err(|e| {
            ProviderError::wrap("Error creating volume", e).for_resource(id.clone())
        })?;
        info!("Created volume name: {}", volume.name);
        Ok(volume.id)
    }

    async fn update_volume(
        &self,
        id: &ResourceId,
        identifier: &str,
        to: &Resource,
    ) -> ProviderResult<()> {
        let body = UpdateVolume {
            name: required_str(to, "name")
                .map_err(|e| invalid(id, e))?
                .to_string(),
            max_size: required_int(to, "max_size").map_err(|e| invalid(id, e))?,
        };

        let volume = self
            .client
            .update_volume(identifier, &body)
            .await
            .map_err(|e| {
                ProviderError::wrap("Error updating volume", e).for_resource(id.clone())
            })?;
        info!("Updated volume name: {}", volume.name);
        Ok(())
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Resolve the optional `app_name` attribute to an app ID
    async fn resolve_app_name(
        &self,
        resource: &Resource,
        context: &str,
    ) -> ProviderResult<Option<String>> {
        match resource.get_str("app_name") {
            Some(app_name) => self
                .mapper()
                .resolve_app(app_name)
                .await
                .map(Some)
                .map_err(|e: MapperError| {
                    ProviderError::wrap(context, e).for_resource(resource.id.clone())
                }),
            None => Ok(None),
        }
    }

    /// Follow a deployment until it settles; anything but HEALTHY is an error
    async fn wait_for_deployment(
        &self,
        id: &ResourceId,
        deployment_id: Option<&str>,
    ) -> ProviderResult<()> {
        let Some(deployment_id) = deployment_id.filter(|s| !s.is_empty()) else {
            warn!(
                "koyeb_{}.{} has no deployment to wait for",
                id.resource_type, id.name
            );
            return Ok(());
        };

        let label = format!("deployment {}", deployment_id);
        let deployment = wait_for_status(
            || self.client.get_deployment(deployment_id),
            |d: &Deployment| d.status.as_str(),
            &label,
            DEPLOYMENT_FINAL_STATUSES,
            self.wait_options(true),
            &self.cancel,
        )
        .await
        .map_err(|e| wait_failed(id, e))?;

        match deployment {
            Some(deployment) if deployment.status == "HEALTHY" => Ok(()),
            Some(deployment) => Err(ProviderError::new(format!(
                "Deployment {} finished with status {}: {}",
                deployment.id,
                deployment.status,
                deployment.messages.join(" ")
            ))
            .for_resource(id.clone())),
            None => Err(ProviderError::new(format!("{} not found", label)).for_resource(id.clone())),
        }
    }

    async fn wait_until_gone(&self, id: &ResourceId, identifier: &str) -> ProviderResult<()> {
        let label = format!("{} {}", id.resource_type, identifier);
        let options = self.wait_options(false);

        let result = match id.resource_type.as_str() {
            "app" => wait_for_status(
                || self.client.get_app(identifier),
                |app: &App| app.status.as_str(),
                &label,
                DELETED_STATUSES,
                options,
                &self.cancel,
            )
            .await
            .map(|_| ()),
            "service" => wait_for_status(
                || self.client.get_service(identifier),
                |service: &Service| service.status.as_str(),
                &label,
                DELETED_STATUSES,
                options,
                &self.cancel,
            )
            .await
            .map(|_| ()),
            _ => Ok(()),
        };

        result.map_err(|e| wait_failed(id, e))
    }
}

/// Build a secret request body, checking the type and the registry block
fn secret_body(resource: &Resource) -> Result<SecretBody, AttributeError> {
    let secret_type = resource.get_str("type").unwrap_or(DEFAULT_SECRET_TYPE);
    validate_one_of("type", secret_type, SECRET_TYPES)?;

    let mut registry = serde_json::Map::new();
    for kind in REGISTRY_KINDS {
        match resource.attributes.get(*kind) {
            Some(value @ Value::Map(_)) => {
                registry.insert(kind.to_string(), value.to_json());
            }
            Some(_) => {
                return Err(AttributeError::WrongType {
                    attribute: kind.to_string(),
                    expected: "a map",
                });
            }
            None => {}
        }
    }
    if registry.len() > 1 {
        return Err(AttributeError::NotAllowed {
            attribute: "registry".to_string(),
            value: registry.keys().cloned().collect::<Vec<_>>().join(", "),
            allowed: vec!["a single registry block".to_string()],
        });
    }

    Ok(SecretBody {
        name: required_str(resource, "name")?.to_string(),
        secret_type: secret_type.to_string(),
        value: resource.get_str("value").map(str::to_string),
        registry: (!registry.is_empty()).then_some(registry),
    })
}

fn unknown_type(id: &ResourceId) -> ProviderError {
    ProviderError::new(format!("Unknown resource type: {}", id.resource_type))
        .for_resource(id.clone())
}

fn invalid(id: &ResourceId, err: AttributeError) -> ProviderError {
    ProviderError::new(err.to_string())
        .with_cause(err)
        .for_resource(id.clone())
}

fn wait_failed(id: &ResourceId, err: WaitError) -> ProviderError {
    ProviderError::from(err).for_resource(id.clone())
}
