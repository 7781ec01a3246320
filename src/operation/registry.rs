//! Registration of operation implementations by name.

use super::{BoundInstance, OperationOutcome};
use crate::edm::Operation;
use crate::error::ODataResult;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Everything an implementation sees about one call.
#[derive(Debug, Clone, Copy)]
pub struct InvocationContext<'a> {
    pub operation: &'a Operation,
    pub binding: Option<&'a BoundInstance>,
    /// Validated arguments by parameter name
    pub parameters: &'a Map<String, Value>,
    pub request_id: &'a str,
}

impl InvocationContext<'_> {
    /// Argument as `i64`, if present and integral.
    pub fn int(&self, name: &str) -> Option<i64> {
        self.parameters.get(name).and_then(Value::as_i64)
    }

    /// Argument as text, if present and a string.
    pub fn str(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).and_then(Value::as_str)
    }
}

/// Future produced by one invocation.
pub type OperationFuture<'a> =
    Pin<Box<dyn Future<Output = ODataResult<OperationOutcome>> + Send + 'a>>;

/// Behavior of one operation.
///
/// The returned future runs on the request's task. Blocking work belongs on
/// `tokio::task::spawn_blocking`.
pub trait OperationImplementation: Send + Sync {
    fn invoke<'a>(&'a self, context: InvocationContext<'a>) -> OperationFuture<'a>;
}

/// Closure computing its outcome without awaiting.
struct SyncImplementation<F>(F);

impl<F> OperationImplementation for SyncImplementation<F>
where
    F: Fn(&InvocationContext<'_>) -> ODataResult<OperationOutcome> + Send + Sync,
{
    fn invoke<'a>(&'a self, context: InvocationContext<'a>) -> OperationFuture<'a> {
        Box::pin(std::future::ready((self.0)(&context)))
    }
}

/// Closure returning a boxed future.
struct AsyncImplementation<F>(F);

impl<F> OperationImplementation for AsyncImplementation<F>
where
    F: for<'a> Fn(InvocationContext<'a>) -> OperationFuture<'a> + Send + Sync,
{
    fn invoke<'a>(&'a self, context: InvocationContext<'a>) -> OperationFuture<'a> {
        (self.0)(context)
    }
}

/// Operation implementations keyed by unqualified operation name.
///
/// Populated while the service is built and read-only afterwards. One
/// implementation serves every overload of a name; it can branch on
/// `context.operation`.
#[derive(Clone, Default)]
pub struct OperationRegistry {
    implementations: HashMap<String, Arc<dyn OperationImplementation>>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a synchronous closure, replacing any previous implementation for `name`.
    pub fn register<F>(&mut self, name: impl Into<String>, implementation: F) -> &mut Self
    where
        F: Fn(&InvocationContext<'_>) -> ODataResult<OperationOutcome> + Send + Sync + 'static,
    {
        self.register_implementation(name, SyncImplementation(implementation))
    }

    /// Register a closure returning a future, replacing any previous implementation for `name`.
    ///
    /// ```rust
    /// use odata_server::ODataResult;
    /// use odata_server::operation::{OperationOutcome, OperationRegistry};
    ///
    /// let mut registry = OperationRegistry::new();
    /// registry.register_async("Slow", |ctx| {
    ///     Box::pin(async move {
    ///         tokio::task::yield_now().await;
    ///         let outcome: ODataResult<_> = Ok(OperationOutcome::primitive(ctx.request_id));
    ///         outcome
    ///     })
    /// });
    /// assert!(registry.contains("Slow"));
    /// ```
    pub fn register_async<F>(&mut self, name: impl Into<String>, implementation: F) -> &mut Self
    where
        F: for<'a> Fn(InvocationContext<'a>) -> OperationFuture<'a> + Send + Sync + 'static,
    {
        self.register_implementation(name, AsyncImplementation(implementation))
    }

    /// Register any implementation, replacing any previous one for `name`.
    pub fn register_implementation(
        &mut self,
        name: impl Into<String>,
        implementation: impl OperationImplementation + 'static,
    ) -> &mut Self {
        self.implementations
            .insert(name.into(), Arc::new(implementation));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn OperationImplementation>> {
        self.implementations.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.implementations.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.implementations.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.implementations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.implementations.is_empty()
    }
}

impl fmt::Debug for OperationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("OperationRegistry")
            .field("operations", &names)
            .finish()
    }
}
