use std::future::Future;

use crate::{key::KeyArgs, table::MemoCache};

/// A synchronous function wrapped with an LRU memo table.
#[derive(Debug)]
pub struct Memoized<F, V> {
    compute: F,
    cache: MemoCache<V>,
}

impl<F, V: Clone> Memoized<F, V> {
    /// Wraps `compute`. `name` identifies the function inside every key.
    pub fn wrap(name: &'static str, capacity: usize, compute: F) -> Self {
        Self {
            compute,
            cache: MemoCache::new(name, capacity),
        }
    }

    pub fn call<A>(&self, args: A) -> V
    where
        A: KeyArgs,
        F: Fn(A) -> V,
    {
        let key = self.cache.key_for(&args);
        if let Some(value) = self.cache.get(&key) {
            return value;
        }
        let value = (self.compute)(args);
        self.cache.insert(key, value.clone());
        value
    }

    /// Drops the entry `args` would hit. Returns whether one existed.
    pub fn invalidate<A: KeyArgs + ?Sized>(&self, args: &A) -> bool {
        self.cache.remove(&self.cache.key_for(args))
    }

    pub fn invalidate_containing(&self, needle: &str) -> usize {
        self.cache.remove_containing(needle)
    }

    pub fn cache(&self) -> &MemoCache<V> {
        &self.cache
    }
}

/// An async function wrapped with an LRU memo table.
///
/// Lookups and stores are not one atomic step: two calls missing on the same
/// key before either finishes both run `compute`, and the later store wins.
/// Wrapped functions must therefore be safe to run redundantly. Nothing is
/// stored until `compute` resolves, so a dropped call leaves no trace.
#[derive(Debug)]
pub struct AsyncMemoized<F, V> {
    compute: F,
    cache: MemoCache<V>,
}

impl<F, V: Clone> AsyncMemoized<F, V> {
    pub fn wrap(name: &'static str, capacity: usize, compute: F) -> Self {
        Self {
            compute,
            cache: MemoCache::new(name, capacity),
        }
    }

    pub async fn call<A, Fut>(&self, args: A) -> V
    where
        A: KeyArgs,
        F: Fn(A) -> Fut,
        Fut: Future<Output = V>,
    {
        let key = self.cache.key_for(&args);
        if let Some(value) = self.cache.get(&key) {
            return value;
        }
        let value = (self.compute)(args).await;
        self.cache.insert(key, value.clone());
        value
    }

    /// Like [`AsyncMemoized::call`] for fallible functions. Errors are
    /// returned as produced and never stored.
    ///
    /// # Errors
    /// Returns whatever error `compute` resolves to.
    pub async fn try_call<A, Fut, E>(&self, args: A) -> Result<V, E>
    where
        A: KeyArgs,
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let key = self.cache.key_for(&args);
        if let Some(value) = self.cache.get(&key) {
            return Ok(value);
        }
        let value = (self.compute)(args).await?;
        self.cache.insert(key, value.clone());
        Ok(value)
    }

    pub fn invalidate<A: KeyArgs + ?Sized>(&self, args: &A) -> bool {
        self.cache.remove(&self.cache.key_for(args))
    }

    pub fn invalidate_containing(&self, needle: &str) -> usize {
        self.cache.remove_containing(needle)
    }

    pub fn cache(&self) -> &MemoCache<V> {
        &self.cache
    }
}
