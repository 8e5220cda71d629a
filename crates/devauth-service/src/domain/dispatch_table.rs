//! # Call Dispatch Table
//!
//! Maps a method id to its handler. Filled once at start-up and read-only
//! afterwards.

use crate::domain::errors::DispatchError;
use devauth_types::{IpcError, ParamList, ParamWriter};
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Future returned by a method handler.
pub type HandlerFuture<'a> = BoxFuture<'a, Result<ParamWriter, IpcError>>;

/// A locally registered operation.
///
/// Implemented for any `fn(&C, &ParamList) -> HandlerFuture`.
pub trait MethodHandler<C>: Send + Sync {
    fn call<'a>(&'a self, ctx: &'a C, params: &'a ParamList<'a>) -> HandlerFuture<'a>;
}

impl<C, F> MethodHandler<C> for F
where
    F: for<'a> Fn(&'a C, &'a ParamList<'a>) -> HandlerFuture<'a> + Send + Sync,
{
    fn call<'a>(&'a self, ctx: &'a C, params: &'a ParamList<'a>) -> HandlerFuture<'a> {
        self(ctx, params)
    }
}

pub struct CallDispatchTable<C> {
    handlers: HashMap<i32, Arc<dyn MethodHandler<C>>>,
}

impl<C: 'static> CallDispatchTable<C> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Registers `handler` under `method_id`.
    ///
    /// Ids must be positive and unique.
    pub fn register<H>(&mut self, method_id: i32, handler: H) -> Result<(), DispatchError>
    where
        H: MethodHandler<C> + 'static,
    {
        if method_id <= 0 {
            return Err(DispatchError::InvalidMethodId(method_id));
        }
        if self.handlers.contains_key(&method_id) {
            return Err(DispatchError::DuplicateMethod(method_id));
        }
        self.handlers.insert(method_id, Arc::new(handler));
        Ok(())
    }

    pub fn lookup(&self, method_id: i32) -> Option<Arc<dyn MethodHandler<C>>> {
        self.handlers.get(&method_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl<C: 'static> Default for CallDispatchTable<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> fmt::Debug for CallDispatchTable<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<i32> = self.handlers.keys().copied().collect();
        ids.sort_unstable();
        f.debug_struct("CallDispatchTable").field("methods", &ids).finish()
    }
}
