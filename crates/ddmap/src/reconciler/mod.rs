//! Reconciler: create, read, update and delete per kind.
//!
//! Every operation runs strictly as build → request → (read-back) →
//! flatten → state. Kinds sharing a server-side collection hold their lock
//! group for the whole mutation.

pub mod clock;
pub mod http;
pub mod locks;
pub mod plan;
pub mod secrets;

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::Method;
use serde_json::Value;
use tracing::Instrument;

use self::clock::{Clock, TokioClock};
use self::http::HttpClient;
use self::plan::Plan;
use self::secrets::preserve_secrets;
use crate::config_tree::{ConfigAccessor, ConfigTree};
use crate::error::{classify_status, EngineError, Result};
use crate::kinds::{CreateMode, DeleteMode, KindHandler, KindRegistry, ResourceKind, UpdateMethod};
use crate::mapping::codec::{Advisory, BuildContext};
use crate::mapping::schema::SchemaNode;
use crate::mapping::validation::{into_result, Diagnostic};
use crate::settings::EngineSettings;

/// Outcome of a create, update or adopt.
#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    /// Server id of the resource.
    pub id: String,
    /// Canonical state to persist.
    pub state: ConfigTree,
    pub advisories: Vec<Advisory>,
}

/// Outcome of a read.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadStatus {
    Present(ConfigTree),
    /// The server answered 404; the caller drops its id.
    Gone,
}

pub struct Reconciler {
    registry: KindRegistry,
    http: Arc<dyn HttpClient>,
    clock: Arc<dyn Clock>,
    settings: EngineSettings,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("registry", &self.registry)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    pub fn new(registry: KindRegistry, http: Arc<dyn HttpClient>, settings: EngineSettings) -> Self {
        Self {
            registry,
            http,
            clock: Arc::new(TokioClock),
            settings,
        }
    }

    /// Replaces the wall clock, e.g. with a [`clock::ManualClock`] in tests.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn registry(&self) -> &KindRegistry {
        &self.registry
    }

    // ------------------------------------------------------------------------
    // Offline operations
    // ------------------------------------------------------------------------

    /// Validates `cfg` without any I/O.
    pub fn validate(&self, kind: ResourceKind, cfg: &dyn ConfigAccessor) -> Result<Vec<Diagnostic>> {
        Ok(self.registry.get(kind)?.validate(cfg))
    }

    pub fn schema(&self, kind: ResourceKind) -> Result<Vec<SchemaNode>> {
        Ok(self.registry.get(kind)?.schema())
    }

    /// Compares configuration with the last recorded state.
    pub fn plan(&self, kind: ResourceKind, cfg: &dyn ConfigAccessor, state: &ConfigTree) -> Result<Plan> {
        let handler = self.registry.get(kind)?;
        plan::plan(handler.as_ref(), cfg, state, &self.settings.secret_mask)
    }

    // ------------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------------

    /// Creates the resource, waiting at most the configured create timeout
    /// for it to become visible.
    pub async fn create(&self, kind: ResourceKind, cfg: &dyn ConfigAccessor) -> Result<Applied> {
        self.create_with_timeout(kind, cfg, self.settings.create_timeout())
            .await
    }

    /// Creates the resource with an explicit read-back deadline.
    pub async fn create_with_timeout(
        &self,
        kind: ResourceKind,
        cfg: &dyn ConfigAccessor,
        timeout: Duration,
    ) -> Result<Applied> {
        let span = tracing::info_span!("create", kind = %kind);
        self.create_inner(kind, cfg, timeout).instrument(span).await
    }

    async fn create_inner(
        &self,
        kind: ResourceKind,
        cfg: &dyn ConfigAccessor,
        timeout: Duration,
    ) -> Result<Applied> {
        let handler = self.registry.get(kind)?;
        let handler = handler.as_ref();
        into_result(&handler.validate(cfg))?;
        let started = self.clock.now();
        let caps = handler.capabilities();
        let _guard = locks::acquire(caps.lock_group).await;

        match caps.create_mode {
            CreateMode::RequiresAdoption => {
                return Err(EngineError::Configuration(format!(
                    "{} cannot be created through the API; adopt an existing one by id",
                    kind
                )))
            }
            CreateMode::AdoptExisting => {
                let id = self.lookup_existing(handler, cfg).await?.ok_or_else(|| {
                    EngineError::NotFound {
                        kind: kind.to_string(),
                        id: String::new(),
                    }
                })?;
                log::info!("Adopting existing {} '{}'", kind, id);
                return self.update_locked(handler, &id, cfg).await;
            }
            CreateMode::Post => {}
        }

        let mut ctx = BuildContext::new();
        let body = handler.build(cfg, None, &mut ctx)?;
        let created = match self
            .call(handler, Method::POST, &handler.create_path(), Some(&body), "")
            .await
        {
            Ok(created) => created,
            Err(err @ EngineError::AlreadyExists { .. }) if caps.adopt_on_conflict => {
                let Some(id) = self.lookup_existing(handler, cfg).await? else {
                    return Err(err);
                };
                log::info!("{} '{}' already exists, adopting it", kind, id);
                let mut applied = self.update_locked(handler, &id, cfg).await?;
                ctx.advisories.append(&mut applied.advisories);
                applied.advisories = ctx.advisories;
                return Ok(applied);
            }
            Err(err) => return Err(err),
        };

        let id = handler
            .extract_id(&created)
            .or_else(|| handler.config_id(cfg))
            .ok_or_else(|| {
                EngineError::Serialization(format!("{} create response carried no id", kind))
            })?;
        log::info!("Created {} '{}'", kind, id);

        if let Some((path, extra)) = handler.after_create(cfg, &id) {
            if let Err(e) = self.call(handler, Method::POST, &path, Some(&extra), &id).await {
                log::warn!("Follow-up request for {} '{}' failed: {}", kind, id, e);
                ctx.advise("", format!("{} '{}' was created but {} failed: {}", kind, id, path, e));
            }
        }

        let observed = if caps.eventually_consistent {
            self.await_visible(handler, &id, started, started + timeout)
                .await?
        } else if caps.read_after_write || created.is_null() {
            self.call(handler, Method::GET, &handler.resource_path(&id), None, &id)
                .await?
        } else {
            created
        };

        Ok(Applied {
            state: self.state_from(handler, &observed, cfg)?,
            id,
            advisories: ctx.advisories,
        })
    }

    /// Polls until the resource reads back. 404 is retried with exponential
    /// backoff; a sleep that would cross `deadline` fails the create.
    async fn await_visible(
        &self,
        handler: &dyn KindHandler,
        id: &str,
        started: Instant,
        deadline: Instant,
    ) -> Result<Value> {
        let path = handler.resource_path(id);
        let mut attempt: u32 = 0;

        loop {
            match self.call(handler, Method::GET, &path, None, id).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_not_found() => {
                    let delay = self.visibility_delay(attempt);
                    let now = self.clock.now();
                    if now + delay > deadline {
                        let waited = now.saturating_duration_since(started);
                        log::warn!(
                            "{} '{}' still not visible after {}s, giving up",
                            handler.kind(),
                            id,
                            waited.as_secs()
                        );
                        return Err(EngineError::EventualConsistencyTimeout {
                            kind: handler.kind().to_string(),
                            id: id.to_string(),
                            waited_secs: waited.as_secs(),
                        });
                    }
                    log::info!(
                        "{} '{}' not visible yet (attempt {}), retrying in {}ms...",
                        handler.kind(),
                        id,
                        attempt + 1,
                        delay.as_millis()
                    );
                    self.clock.sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn visibility_delay(&self, attempt: u32) -> Duration {
        let base = self.settings.retry_base_delay();
        let ceiling = self.settings.retry_max_delay();
        base.checked_mul(1u32 << attempt.min(16))
            .unwrap_or(ceiling)
            .min(ceiling)
    }

    /// Id of an existing resource matching the configuration's business key.
    async fn lookup_existing(
        &self,
        handler: &dyn KindHandler,
        cfg: &dyn ConfigAccessor,
    ) -> Result<Option<String>> {
        let Some(path) = handler.adopt_lookup_path(cfg) else {
            return Ok(None);
        };
        match self.call(handler, Method::GET, &path, None, "").await {
            Ok(listing) => Ok(handler.adopt_match(cfg, &listing)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    // ------------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------------

    /// Reads the resource. `prior` is the last applied configuration, used for
    /// fields the server does not return.
    pub async fn read(&self, kind: ResourceKind, id: &str, prior: &dyn ConfigAccessor) -> Result<ReadStatus> {
        let span = tracing::info_span!("read", kind = %kind, id = %id);
        async {
            let handler = self.registry.get(kind)?;
            let handler = handler.as_ref();
            match self
                .call(handler, Method::GET, &handler.resource_path(id), None, id)
                .await
            {
                Ok(body) => {
                    handler.check_observed(id, &body)?;
                    Ok(ReadStatus::Present(self.state_from(handler, &body, prior)?))
                }
                Err(e) if e.is_not_found() => {
                    log::warn!("{} '{}' no longer exists, removing from state", kind, id);
                    Ok(ReadStatus::Gone)
                }
                Err(e) => Err(e),
            }
        }
        .instrument(span)
        .await
    }

    // ------------------------------------------------------------------------
    // Update / adopt
    // ------------------------------------------------------------------------

    pub async fn update(&self, kind: ResourceKind, id: &str, cfg: &dyn ConfigAccessor) -> Result<Applied> {
        let span = tracing::info_span!("update", kind = %kind, id = %id);
        async {
            let handler = self.registry.get(kind)?;
            let handler = handler.as_ref();
            into_result(&handler.validate(cfg))?;
            let _guard = locks::acquire(handler.capabilities().lock_group).await;
            self.update_locked(handler, id, cfg).await
        }
        .instrument(span)
        .await
    }

    /// Takes over an existing resource by id and applies `cfg` to it.
    pub async fn adopt(&self, kind: ResourceKind, id: &str, cfg: &dyn ConfigAccessor) -> Result<Applied> {
        let span = tracing::info_span!("adopt", kind = %kind, id = %id);
        async {
            let handler = self.registry.get(kind)?;
            let handler = handler.as_ref();
            into_result(&handler.validate(cfg))?;
            let _guard = locks::acquire(handler.capabilities().lock_group).await;
            let current = self
                .call(handler, Method::GET, &handler.resource_path(id), None, id)
                .await?;
            handler.check_observed(id, &current)?;
            log::info!("Adopting {} '{}'", kind, id);
            self.update_locked(handler, id, cfg).await
        }
        .instrument(span)
        .await
    }

    /// Caller holds the kind's lock group.
    async fn update_locked(
        &self,
        handler: &dyn KindHandler,
        id: &str,
        cfg: &dyn ConfigAccessor,
    ) -> Result<Applied> {
        let caps = handler.capabilities();
        let mut ctx = BuildContext::new();
        let body = handler.build(cfg, Some(id), &mut ctx)?;
        let method = match caps.update_method {
            UpdateMethod::Put => Method::PUT,
            UpdateMethod::Patch => Method::PATCH,
            UpdateMethod::Post => Method::POST,
        };
        let response = self
            .call(handler, method, &handler.update_path(id), Some(&body), id)
            .await?;

        let observed = if caps.read_after_write || response.is_null() {
            self.call(handler, Method::GET, &handler.resource_path(id), None, id)
                .await?
        } else {
            response
        };
        log::info!("Updated {} '{}'", handler.kind(), id);

        Ok(Applied {
            id: id.to_string(),
            state: self.state_from(handler, &observed, cfg)?,
            advisories: ctx.advisories,
        })
    }

    // ------------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------------

    /// Deletes the resource. A 404 counts as success.
    pub async fn delete(&self, kind: ResourceKind, id: &str) -> Result<Vec<Advisory>> {
        let span = tracing::info_span!("delete", kind = %kind, id = %id);
        async {
            let handler = self.registry.get(kind)?;
            let handler = handler.as_ref();
            match handler.capabilities().delete_mode {
                DeleteMode::Skip => {
                    log::info!("{} '{}' cannot be deleted through the API; forgetting it", kind, id);
                    Ok(Vec::new())
                }
                DeleteMode::SkipWithAdvisory(message) => {
                    log::warn!("{}", message);
                    Ok(vec![Advisory {
                        path: String::new(),
                        message: message.to_string(),
                    }])
                }
                DeleteMode::Api => {
                    let _guard = locks::acquire(handler.capabilities().lock_group).await;
                    match self
                        .call(handler, Method::DELETE, &handler.resource_path(id), None, id)
                        .await
                    {
                        Ok(_) => {
                            log::info!("Deleted {} '{}'", kind, id);
                            Ok(Vec::new())
                        }
                        Err(e) if e.is_not_found() => {
                            log::debug!("{} '{}' was already gone", kind, id);
                            Ok(Vec::new())
                        }
                        Err(e) => Err(e),
                    }
                }
            }
        }
        .instrument(span)
        .await
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    /// Sends a request and classifies non-2xx answers.
    async fn call(
        &self,
        handler: &dyn KindHandler,
        method: Method,
        path: &str,
        body: Option<&Value>,
        id: &str,
    ) -> Result<Value> {
        let kind = handler.kind();
        log::debug!("{} {}", method, path);
        let response = self
            .http
            .send(method, path, body)
            .await
            .map_err(|e| with_context(e, kind, id))?;
        if !response.is_success() {
            return Err(classify_status(kind.as_str(), id, response.status, &response.body));
        }
        response.json()
    }

    fn state_from(
        &self,
        handler: &dyn KindHandler,
        body: &Value,
        cfg: &dyn ConfigAccessor,
    ) -> Result<ConfigTree> {
        let mut state = handler.flatten(body, cfg)?;
        preserve_secrets(
            &mut state,
            &handler.secret_fields(cfg),
            cfg,
            &self.settings.secret_mask,
        );
        Ok(ConfigTree::from_map(state))
    }
}

/// Fills the kind and id into a transport error raised below the reconciler.
fn with_context(err: EngineError, kind: ResourceKind, id: &str) -> EngineError {
    match err {
        EngineError::Transport {
            kind: k,
            id: i,
            status,
            message,
        } => EngineError::Transport {
            kind: if k.is_empty() { kind.to_string() } else { k },
            id: if i.is_empty() { id.to_string() } else { i },
            status,
            message,
        },
        other => other,
    }
}
