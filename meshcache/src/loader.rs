//! The loader capability: where values come from on a cache miss.

use std::pin::Pin;

/// Error type loaders may return.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Future returned by a [`Loader`].
pub type LoadFuture = Pin<Box<dyn Future<Output = Result<Vec<u8>, BoxError>> + Send>>;

/// Produces the bytes for a key that missed every cache.
///
/// The loader is user-supplied and may perform arbitrary I/O; its
/// deadline is the caller's. Errors are surfaced to the caller verbatim
/// and never cached.
pub trait Loader: Send + Sync + 'static {
    /// Load the value for `key`.
    fn load(&self, key: &str) -> LoadFuture;
}

impl<L: Loader + ?Sized> Loader for std::sync::Arc<L> {
    fn load(&self, key: &str) -> LoadFuture {
        (**self).load(key)
    }
}

/// Adapter turning an async closure into a [`Loader`].
pub struct LoaderFn<F>(F);

/// Build a [`Loader`] from a plain async function.
///
/// ```
/// use meshcache::loader_fn;
///
/// let loader = loader_fn(|key: String| async move {
///     Ok(format!("value-for-{key}").into_bytes())
/// });
/// ```
pub fn loader_fn<F, Fut>(f: F) -> LoaderFn<F>
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<u8>, BoxError>> + Send + 'static,
{
    LoaderFn(f)
}

impl<F, Fut> Loader for LoaderFn<F>
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<u8>, BoxError>> + Send + 'static,
{
    fn load(&self, key: &str) -> LoadFuture {
        Box::pin((self.0)(key.to_string()))
    }
}
