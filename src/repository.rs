use std::sync::Arc;

use crate::adapter::{Adapter, GlobalAdapter, ProcessAdapter};

/// One environment view over an ordered set of adapters.
///
/// Reads consult the reader adapters in priority order; writes and deletes fan
/// out to every writer adapter.
#[derive(Debug, Clone, Default)]
pub struct Repository {
    readers: Vec<Arc<dyn Adapter>>,
    writers: Vec<Arc<dyn Adapter>>,
    immutable: bool,
}

impl Repository {
    pub fn builder() -> RepositoryBuilder {
        RepositoryBuilder::new()
    }

    pub fn is_immutable(&self) -> bool {
        self.immutable
    }

    pub fn readers(&self) -> &[Arc<dyn Adapter>] {
        &self.readers
    }

    pub fn writers(&self) -> &[Arc<dyn Adapter>] {
        &self.writers
    }

    /// Returns `true` if any reader defines `name`.
    pub fn has(&self, name: &str) -> bool {
        self.readers.iter().any(|reader| reader.has(name))
    }

    /// Value from the first reader that defines `name`.
    pub fn read(&self, name: &str) -> Option<String> {
        self.readers
            .iter()
            .find(|reader| reader.has(name))
            .and_then(|reader| reader.read(name))
    }

    /// Sets `name` in every writer.
    ///
    /// Succeeds only if there is at least one writer and every writer accepted
    /// the value. In immutable mode a name that is already defined is left
    /// untouched and `false` is returned.
    pub fn write(&self, name: &str, value: &str) -> bool {
        if self.immutable && self.has(name) {
            tracing::debug!(name, "immutable repository keeps existing value");
            return false;
        }

        self.fan_out(|writer| writer.write(name, value))
    }

    /// Removes `name` from every writer; succeeds only if all of them did.
    pub fn delete(&self, name: &str) -> bool {
        self.fan_out(|writer| writer.delete(name))
    }

    fn fan_out(&self, mut op: impl FnMut(&dyn Adapter) -> bool) -> bool {
        if self.writers.is_empty() {
            return false;
        }

        let mut all_succeeded = true;
        for writer in &self.writers {
            if !op(writer.as_ref()) {
                tracing::debug!(adapter = ?writer, "writer adapter refused operation");
                all_succeeded = false;
            }
        }
        all_succeeded
    }
}

/// Builder-style repository configuration.
///
/// Adapters are kept in insertion order; unsupported ones are dropped by
/// [`RepositoryBuilder::build`].
#[derive(Debug, Clone, Default)]
pub struct RepositoryBuilder {
    readers: Vec<Arc<dyn Adapter>>,
    writers: Vec<Arc<dyn Adapter>>,
    immutable: bool,
}

impl RepositoryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder preloaded with the process environment followed by the global
    /// mirror, as both readers and writers, in immutable mode.
    ///
    /// # Safety
    ///
    /// Same contract as [`ProcessAdapter::new`]: no other threads may read or
    /// write the process environment while the built repository mutates it.
    pub unsafe fn with_default_adapters() -> Self {
        // SAFETY: forwarded to the caller.
        let process = unsafe { ProcessAdapter::new() };
        Self::new()
            .adapter(process)
            .adapter(GlobalAdapter::new())
            .immutable(true)
    }

    pub fn reader(mut self, adapter: impl Adapter + 'static) -> Self {
        self.readers.push(Arc::new(adapter));
        self
    }

    pub fn writer(mut self, adapter: impl Adapter + 'static) -> Self {
        self.writers.push(Arc::new(adapter));
        self
    }

    /// Registers one adapter instance as both reader and writer.
    pub fn adapter(mut self, adapter: impl Adapter + 'static) -> Self {
        let shared: Arc<dyn Adapter> = Arc::new(adapter);
        self.readers.push(Arc::clone(&shared));
        self.writers.push(shared);
        self
    }

    pub fn shared_adapter(mut self, adapter: Arc<dyn Adapter>) -> Self {
        self.readers.push(Arc::clone(&adapter));
        self.writers.push(adapter);
        self
    }

    /// Refuse to overwrite names any reader already defines.
    pub fn immutable(mut self, immutable: bool) -> Self {
        self.immutable = immutable;
        self
    }

    pub fn build(self) -> Repository {
        Repository {
            readers: retain_supported(self.readers, "reader"),
            writers: retain_supported(self.writers, "writer"),
            immutable: self.immutable,
        }
    }
}

fn retain_supported(adapters: Vec<Arc<dyn Adapter>>, role: &str) -> Vec<Arc<dyn Adapter>> {
    adapters
        .into_iter()
        .filter(|adapter| {
            let supported = adapter.is_supported();
            if !supported {
                tracing::debug!(?adapter, role, "excluding unsupported adapter");
            }
            supported
        })
        .collect()
}
