//! Immutable, layered execution context.
//!
//! A [`Context`] is a chain of bindings. [`Context::with_value`] returns a
//! new context with one extra binding on top; the receiver is untouched, so
//! any context handed to a router stays valid for the life of the process.
//! Keys are types implementing [`ContextKey`], which keeps lookups typed and
//! makes every key unique to the module that declares it.

use hpcadmin_db::DbPool;
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// A key that can be bound in a [`Context`].
pub trait ContextKey: 'static {
    /// The type of value bound under this key.
    type Value: Send + Sync + 'static;

    /// Human-readable name used in [`ContextError::MissingDependency`].
    const NAME: &'static str;
}

/// Key for the process-wide database pool.
pub struct DbPoolKey;

impl ContextKey for DbPoolKey {
    type Value = DbPool;
    const NAME: &'static str = "database connection";
}

/// Errors returned by context lookups.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    /// Nothing was bound under the requested key.
    #[error("missing dependency: {0}")]
    MissingDependency(&'static str),
}

struct Layer {
    parent: Option<Arc<Layer>>,
    key: TypeId,
    name: &'static str,
    value: Arc<dyn Any + Send + Sync>,
}

/// A cheaply clonable, immutable chain of typed bindings.
#[derive(Clone, Default)]
pub struct Context {
    head: Option<Arc<Layer>>,
}

impl Context {
    /// The empty root context.
    pub fn background() -> Self {
        Self::default()
    }

    /// Returns a child context with `value` bound under `K`.
    ///
    /// A binding shadows any earlier binding for the same key in the child;
    /// `self` keeps seeing the old value.
    pub fn with_value<K: ContextKey>(&self, value: K::Value) -> Self {
        Self {
            head: Some(Arc::new(Layer {
                parent: self.head.clone(),
                key: TypeId::of::<K>(),
                name: K::NAME,
                value: Arc::new(value),
            })),
        }
    }

    /// Looks up the nearest binding for `K`.
    pub fn value<K: ContextKey>(&self) -> Option<&K::Value> {
        let wanted = TypeId::of::<K>();
        let mut layer = self.head.as_deref();
        while let Some(current) = layer {
            if current.key == wanted {
                return current.value.downcast_ref::<K::Value>();
            }
            layer = current.parent.as_deref();
        }
        None
    }

    /// Like [`Context::value`], but absence is an error.
    ///
    /// # Errors
    ///
    /// Returns `ContextError::MissingDependency` naming `K` if unbound.
    pub fn require<K: ContextKey>(&self) -> Result<&K::Value, ContextError> {
        self.value::<K>()
            .ok_or(ContextError::MissingDependency(K::NAME))
    }

    /// The database pool bound by [`with_db_pool`].
    pub fn db_pool(&self) -> Result<&DbPool, ContextError> {
        self.require::<DbPoolKey>()
    }

    /// Names of all bindings, innermost first.
    fn binding_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        let mut layer = self.head.as_deref();
        while let Some(current) = layer {
            names.push(current.name);
            layer = current.parent.as_deref();
        }
        names
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("bindings", &self.binding_names())
            .finish()
    }
}

/// Binds the database pool into `base`.
///
/// Called once at startup; every router built from the returned context can
/// reach the pool through [`Context::db_pool`].
pub fn with_db_pool(base: &Context, pool: DbPool) -> Context {
    base.with_value::<DbPoolKey>(pool)
}
