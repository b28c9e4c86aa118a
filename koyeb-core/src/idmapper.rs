//! ID Mapper - Resolve human-readable references to Koyeb object IDs
//!
//! Configuration refers to apps, domains and secrets by name, and to services
//! by an `<app>/<service>` slug. The API is keyed by opaque UUIDs. The mapper
//! turns the former into the latter:
//!
//! - a reference that already looks like an ID is returned unchanged, without
//!   any API call
//! - anything else is looked up by paging through the listing endpoint of the
//!   kind and keeping exact, case-sensitive name matches
//! - zero matches or more than one match is an error; the mapper never picks
//!   one of several objects sharing a name
//!
//! Nothing is cached: every call reflects the server state at that moment.

use std::fmt;
use std::str::FromStr;

use log::debug;
use thiserror::Error;
use uuid::Uuid;

use crate::api::{ApiError, ApiResult, KoyebApi, Listed, Page};

/// Number of items requested per listing call
pub const PAGE_SIZE: usize = 100;

/// Upper bound on listing calls for a single lookup
pub const MAX_PAGES: usize = 1000;

/// Kinds of objects that can be referenced by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    App,
    Service,
    Domain,
    Secret,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::App => "app",
            ResourceKind::Service => "service",
            ResourceKind::Domain => "domain",
            ResourceKind::Secret => "secret",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "app" => Ok(ResourceKind::App),
            "service" => Ok(ResourceKind::Service),
            "domain" => Ok(ResourceKind::Domain),
            "secret" => Ok(ResourceKind::Secret),
            other => Err(format!(
                "Unknown resource kind '{}', expected one of: app, service, domain, secret",
                other
            )),
        }
    }
}

/// Errors returned by [`Mapper::resolve`]
#[derive(Debug, Error)]
pub enum MapperError {
    /// No object of this kind carries the name
    #[error("{kind} \"{reference}\" not found")]
    NotFound {
        kind: ResourceKind,
        reference: String,
    },

    /// Several objects of this kind carry the name
    #[error(
        "{kind} \"{reference}\" is ambiguous: {count} objects share this name, use the ID instead"
    )]
    Ambiguous {
        kind: ResourceKind,
        reference: String,
        count: usize,
    },

    /// The reference is malformed for this kind
    #[error("Invalid {kind} reference \"{reference}\": {reason}")]
    InvalidReference {
        kind: ResourceKind,
        reference: String,
        reason: String,
    },

    /// The listing call failed
    #[error(transparent)]
    Upstream(#[from] ApiError),
}

impl MapperError {
    pub fn kind(&self) -> Option<ResourceKind> {
        match self {
            MapperError::NotFound { kind, .. }
            | MapperError::Ambiguous { kind, .. }
            | MapperError::InvalidReference { kind, .. } => Some(*kind),
            MapperError::Upstream(_) => None,
        }
    }
}

pub type MapperResult<T> = Result<T, MapperError>;

/// Returns true if `reference` has the shape of a Koyeb object ID
///
/// IDs are canonical hyphenated UUIDs (`8-4-4-4-12` hex digits). Names
/// chosen by users cannot collide with that shape for app, service and
/// secret names, which are limited to 64 characters of `[a-z0-9-]` and do
/// not form a valid UUID in practice.
pub fn is_object_id(reference: &str) -> bool {
    reference.len() == 36 && Uuid::try_parse(reference).is_ok()
}

/// Split an `<app>/<service>` slug into its two parts
pub fn split_service_slug(reference: &str) -> MapperResult<(&str, &str)> {
    let invalid = |reason: &str| MapperError::InvalidReference {
        kind: ResourceKind::Service,
        reference: reference.to_string(),
        reason: reason.to_string(),
    };

    let (app, service) = reference
        .split_once('/')
        .ok_or_else(|| invalid("expected <app>/<service>"))?;

    if app.is_empty() || service.is_empty() || service.contains('/') {
        return Err(invalid("expected <app>/<service>"));
    }
    Ok((app, service))
}

/// A listed object reduced to what matching needs
#[derive(Debug)]
struct Candidate {
    id: String,
    name: String,
    app_id: Option<String>,
}

fn into_candidates<T: Listed>(page: Page<T>, limit: usize) -> (Vec<Candidate>, bool) {
    let more = page.has_more(limit);
    let candidates = page
        .items
        .iter()
        .map(|item| Candidate {
            id: item.id().to_string(),
            name: item.name().to_string(),
            app_id: item.app_id().map(str::to_string),
        })
        .collect();
    (candidates, more)
}

/// Resolves references against a live API
///
/// The mapper only borrows the API client. It holds no state of its own and
/// can be created per operation.
pub struct Mapper<'a> {
    api: &'a dyn KoyebApi,
}

impl<'a> Mapper<'a> {
    pub fn new(api: &'a dyn KoyebApi) -> Self {
        Self { api }
    }

    /// Resolve a reference of the given kind to an object ID
    pub async fn resolve(&self, kind: ResourceKind, reference: &str) -> MapperResult<String> {
        if reference.is_empty() {
            return Err(MapperError::InvalidReference {
                kind,
                reference: String::new(),
                reason: "reference is empty".to_string(),
            });
        }

        if is_object_id(reference) {
            return Ok(reference.to_string());
        }

        match kind {
            ResourceKind::Service => {
                let (app_ref, service_name) = split_service_slug(reference)?;
                // The parent must be known before any service is considered
                let app_id = self.resolve_parent(app_ref).await?;
                self.find_unique(kind, reference, service_name, Some(&app_id))
                    .await
            }
            _ => self.find_unique(kind, reference, reference, None).await,
        }
    }

    /// Resolve the app part of a service slug, which may itself be an ID
    async fn resolve_parent(&self, app_ref: &str) -> MapperResult<String> {
        if is_object_id(app_ref) {
            return Ok(app_ref.to_string());
        }
        self.find_unique(ResourceKind::App, app_ref, app_ref, None)
            .await
    }

    pub async fn resolve_app(&self, reference: &str) -> MapperResult<String> {
        self.resolve(ResourceKind::App, reference).await
    }

    pub async fn resolve_service(&self, reference: &str) -> MapperResult<String> {
        self.resolve(ResourceKind::Service, reference).await
    }

    pub async fn resolve_domain(&self, reference: &str) -> MapperResult<String> {
        self.resolve(ResourceKind::Domain, reference).await
    }

    pub async fn resolve_secret(&self, reference: &str) -> MapperResult<String> {
        self.resolve(ResourceKind::Secret, reference).await
    }

    /// Page through the listing of `kind` and return the only match
    async fn find_unique(
        &self,
        kind: ResourceKind,
        reference: &str,
        name: &str,
        parent_id: Option<&str>,
    ) -> MapperResult<String> {
        let mut matches = Vec::new();
        let mut offset = 0;
        let mut previous_first: Option<String> = None;
        let mut pages = 0;

        loop {
            let (candidates, more) = self.list_page(kind, parent_id, offset).await?;
            debug!(
                "Listed {} {}(s) at offset {} (more: {})",
                candidates.len(),
                kind,
                offset,
                more
            );
            pages += 1;

            let first = candidates.first().map(|c| c.id.clone());
            if first.is_some() && first == previous_first {
                return Err(ApiError::Decode(format!(
                    "{} listing returned the same page again at offset {}",
                    kind, offset
                ))
                .into());
            }
            previous_first = first;
            offset += candidates.len();

            matches.extend(
                candidates
                    .into_iter()
                    .filter(|c| c.name == name)
                    .filter(|c| parent_id.is_none_or(|p| c.app_id.as_deref() == Some(p)))
                    .map(|c| c.id),
            );

            if !more {
                break;
            }
            if pages >= MAX_PAGES {
                return Err(ApiError::Decode(format!(
                    "{} listing still reports more items after {} pages",
                    kind, pages
                ))
                .into());
            }
        }

        match matches.len() {
            0 => Err(MapperError::NotFound {
                kind,
                reference: reference.to_string(),
            }),
            1 => {
                let id = matches.remove(0);
                debug!("Resolved {} \"{}\" to {}", kind, reference, id);
                Ok(id)
            }
            count => Err(MapperError::Ambiguous {
                kind,
                reference: reference.to_string(),
                count,
            }),
        }
    }

    async fn list_page(
        &self,
        kind: ResourceKind,
        parent_id: Option<&str>,
        offset: usize,
    ) -> ApiResult<(Vec<Candidate>, bool)> {
        let page = match kind {
            ResourceKind::App => {
                into_candidates(self.api.list_apps(offset, PAGE_SIZE).await?, PAGE_SIZE)
            }
            ResourceKind::Service => into_candidates(
                self.api.list_services(parent_id, offset, PAGE_SIZE).await?,
                PAGE_SIZE,
            ),
            ResourceKind::Domain => {
                into_candidates(self.api.list_domains(offset, PAGE_SIZE).await?, PAGE_SIZE)
            }
            ResourceKind::Secret => {
                into_candidates(self.api.list_secrets(offset, PAGE_SIZE).await?, PAGE_SIZE)
            }
        };
        Ok(page)
    }
}
