//! Transport-agnostic table of message and query handlers.
//!
//! Modules publish handlers during the service-registration phase; an outer
//! transport (RPC server, CLI, tests) looks them up by route. Routes are
//! `"<module>/<name>"`.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::ConfigurationError;
use crate::types::StepCtx;

/// State-changing handler.
pub type MsgHandler =
    Arc<dyn Fn(&StepCtx, serde_json::Value) -> anyhow::Result<serde_json::Value> + Send + Sync>;

/// Read-only handler.
pub type QueryHandler =
    Arc<dyn Fn(serde_json::Value) -> anyhow::Result<serde_json::Value> + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error("no handler registered for route '{0}'")]
    NotFound(String),

    #[error("invalid request for route '{route}': {source}")]
    BadRequest {
        route: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("handler for route '{route}' failed: {source}")]
    Handler {
        route: String,
        #[source]
        source: anyhow::Error,
    },
}

#[derive(Default)]
pub struct ServiceRouter {
    msgs: BTreeMap<String, MsgHandler>,
    queries: BTreeMap<String, QueryHandler>,
}

impl fmt::Debug for ServiceRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRouter")
            .field("msgs", &self.msgs.keys().collect::<Vec<_>>())
            .field("queries", &self.queries.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ServiceRouter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registration view scoped to one module's route namespace.
    pub fn for_module(&mut self, module: &str) -> ModuleRouter<'_> {
        ModuleRouter {
            module: module.to_owned(),
            router: self,
        }
    }

    /// # Errors
    /// `RouterError::NotFound` or `RouterError::Handler`.
    pub fn dispatch_msg(
        &self,
        ctx: &StepCtx,
        route: &str,
        payload: serde_json::Value,
    ) -> Result<serde_json::Value, RouterError> {
        let handler = self
            .msgs
            .get(route)
            .ok_or_else(|| RouterError::NotFound(route.to_owned()))?;
        tracing::debug!(route, height = ctx.height, "Dispatching message");
        handler(ctx, payload).map_err(|source| classify(route, source))
    }

    /// # Errors
    /// `RouterError::NotFound` or `RouterError::Handler`.
    pub fn query(
        &self,
        route: &str,
        payload: serde_json::Value,
    ) -> Result<serde_json::Value, RouterError> {
        let handler = self
            .queries
            .get(route)
            .ok_or_else(|| RouterError::NotFound(route.to_owned()))?;
        handler(payload).map_err(|source| classify(route, source))
    }

    pub fn msg_routes(&self) -> impl Iterator<Item = &str> {
        self.msgs.keys().map(String::as_str)
    }

    pub fn query_routes(&self) -> impl Iterator<Item = &str> {
        self.queries.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.msgs.is_empty() && self.queries.is_empty()
    }
}

fn classify(route: &str, source: anyhow::Error) -> RouterError {
    match source.downcast::<serde_json::Error>() {
        Ok(source) => RouterError::BadRequest {
            route: route.to_owned(),
            source,
        },
        Err(source) => RouterError::Handler {
            route: route.to_owned(),
            source,
        },
    }
}

/// Handed to [`crate::contracts::ServiceModule::register_services`].
pub struct ModuleRouter<'a> {
    module: String,
    router: &'a mut ServiceRouter,
}

impl ModuleRouter<'_> {
    pub fn module(&self) -> &str {
        &self.module
    }

    fn route(&self, name: &str) -> String {
        format!("{}/{}", self.module, name)
    }

    /// # Errors
    /// `ConfigurationError::DuplicateRoute`.
    pub fn msg_raw(&mut self, name: &str, handler: MsgHandler) -> Result<(), ConfigurationError> {
        let route = self.route(name);
        if self.router.msgs.contains_key(&route) {
            return Err(ConfigurationError::DuplicateRoute(route));
        }
        tracing::debug!(route = %route, "Registered message handler");
        self.router.msgs.insert(route, handler);
        Ok(())
    }

    /// # Errors
    /// `ConfigurationError::DuplicateRoute`.
    pub fn query_raw(
        &mut self,
        name: &str,
        handler: QueryHandler,
    ) -> Result<(), ConfigurationError> {
        let route = self.route(name);
        if self.router.queries.contains_key(&route) {
            return Err(ConfigurationError::DuplicateRoute(route));
        }
        tracing::debug!(route = %route, "Registered query handler");
        self.router.queries.insert(route, handler);
        Ok(())
    }

    /// Registers a message handler with typed request/response bodies.
    ///
    /// # Errors
    /// `ConfigurationError::DuplicateRoute`.
    pub fn msg<Req, Resp, F>(&mut self, name: &str, handler: F) -> Result<(), ConfigurationError>
    where
        Req: DeserializeOwned,
        Resp: Serialize,
        F: Fn(&StepCtx, Req) -> anyhow::Result<Resp> + Send + Sync + 'static,
    {
        self.msg_raw(
            name,
            Arc::new(move |ctx, payload| {
                let req: Req = serde_json::from_value(payload)?;
                Ok(serde_json::to_value(handler(ctx, req)?)?)
            }),
        )
    }

    /// Registers a query handler with typed request/response bodies.
    ///
    /// # Errors
    /// `ConfigurationError::DuplicateRoute`.
    pub fn query<Req, Resp, F>(&mut self, name: &str, handler: F) -> Result<(), ConfigurationError>
    where
        Req: DeserializeOwned,
        Resp: Serialize,
        F: Fn(Req) -> anyhow::Result<Resp> + Send + Sync + 'static,
    {
        self.query_raw(
            name,
            Arc::new(move |payload| {
                let req: Req = serde_json::from_value(payload)?;
                Ok(serde_json::to_value(handler(req)?)?)
            }),
        )
    }
}
