use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

/// A single store of environment variables.
///
/// Implementations wrap exactly one underlying store and are shared behind a
/// [`Repository`](crate::Repository), which decides read priority and write
/// fan-out. Every method takes `&self`; stores that need mutation use interior
/// locking or are process-global by nature.
pub trait Adapter: Debug + Send + Sync {
    /// Whether the underlying store is usable in this process.
    ///
    /// The answer must not change for the lifetime of the process.
    fn is_supported(&self) -> bool;

    fn has(&self, name: &str) -> bool;

    /// Returns `None` whenever [`Adapter::has`] is `false`.
    fn read(&self, name: &str) -> Option<String>;

    fn write(&self, name: &str, value: &str) -> bool;

    fn delete(&self, name: &str) -> bool;
}

/// The current process environment.
///
/// Writes go through [`std::env::set_var`] and [`std::env::remove_var`], which
/// mutate global process state and are not thread-safe for concurrent
/// environment access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessAdapter {
    _private: (),
}

impl ProcessAdapter {
    /// Create a process-environment adapter.
    ///
    /// # Safety
    ///
    /// The caller must ensure no other threads concurrently read or write the
    /// process environment while any repository holding this adapter writes or
    /// deletes variables.
    pub unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl Adapter for ProcessAdapter {
    fn is_supported(&self) -> bool {
        true
    }

    fn has(&self, name: &str) -> bool {
        is_storable_name(name) && std::env::var_os(name).is_some()
    }

    fn read(&self, name: &str) -> Option<String> {
        if !is_storable_name(name) {
            return None;
        }
        std::env::var_os(name).map(|value| value.to_string_lossy().into_owned())
    }

    fn write(&self, name: &str, value: &str) -> bool {
        if !is_storable_name(name) || value.contains('\0') {
            return false;
        }
        // SAFETY: upheld by the contract of `ProcessAdapter::new`.
        unsafe { std::env::set_var(name, value) };
        true
    }

    fn delete(&self, name: &str) -> bool {
        if !is_storable_name(name) {
            return false;
        }
        // SAFETY: upheld by the contract of `ProcessAdapter::new`.
        unsafe { std::env::remove_var(name) };
        true
    }
}

/// `set_var` panics on these, so they are refused up front.
fn is_storable_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(['=', '\0'])
}

type Table = RwLock<BTreeMap<String, String>>;

/// A process-wide mirror of loaded variables kept apart from the OS
/// environment.
///
/// All `GlobalAdapter` values share one table, so code that only needs to read
/// configuration can use [`globals`] without touching `std::env`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GlobalAdapter;

impl GlobalAdapter {
    pub fn new() -> Self {
        Self
    }
}

fn global_table() -> &'static Table {
    static TABLE: OnceLock<Table> = OnceLock::new();
    TABLE.get_or_init(|| RwLock::new(BTreeMap::new()))
}

/// Snapshot of every variable currently held by [`GlobalAdapter`].
pub fn globals() -> BTreeMap<String, String> {
    global_table()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

impl Adapter for GlobalAdapter {
    fn is_supported(&self) -> bool {
        true
    }

    fn has(&self, name: &str) -> bool {
        table_has(global_table(), name)
    }

    fn read(&self, name: &str) -> Option<String> {
        table_read(global_table(), name)
    }

    fn write(&self, name: &str, value: &str) -> bool {
        table_write(global_table(), name, value)
    }

    fn delete(&self, name: &str) -> bool {
        table_delete(global_table(), name)
    }
}

/// An isolated in-memory map.
///
/// Clones share the same map, so a handle kept by the caller observes every
/// write made through a repository.
#[derive(Debug, Clone, Default)]
pub struct MemoryAdapter {
    table: Arc<Table>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(map: BTreeMap<String, String>) -> Self {
        Self {
            table: Arc::new(RwLock::new(map)),
        }
    }

    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.table
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn get(&self, name: &str) -> Option<String> {
        table_read(&self.table, name)
    }
}

impl<K, V> FromIterator<(K, V)> for MemoryAdapter
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_map(
            iter.into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        )
    }
}

impl Adapter for MemoryAdapter {
    fn is_supported(&self) -> bool {
        true
    }

    fn has(&self, name: &str) -> bool {
        table_has(&self.table, name)
    }

    fn read(&self, name: &str) -> Option<String> {
        table_read(&self.table, name)
    }

    fn write(&self, name: &str, value: &str) -> bool {
        table_write(&self.table, name, value)
    }

    fn delete(&self, name: &str) -> bool {
        table_delete(&self.table, name)
    }
}

fn table_has(table: &Table, name: &str) -> bool {
    table
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .contains_key(name)
}

fn table_read(table: &Table, name: &str) -> Option<String> {
    table
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(name)
        .cloned()
}

fn table_write(table: &Table, name: &str, value: &str) -> bool {
    table
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(name.to_owned(), value.to_owned());
    true
}

fn table_delete(table: &Table, name: &str) -> bool {
    table
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .remove(name);
    true
}

type Getter = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;
type Setter = Arc<dyn Fn(&str, &str) -> bool + Send + Sync>;

/// A store reached through an external getter/setter pair, such as the
/// subprocess environment of an embedding web server.
///
/// The adapter is supported only when both hooks are installed. The store has
/// no real unset: [`Adapter::delete`] writes an empty value, and an empty value
/// counts as undefined.
#[derive(Clone, Default)]
pub struct HookAdapter {
    getter: Option<Getter>,
    setter: Option<Setter>,
}

impl HookAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn getter<F>(mut self, getter: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.getter = Some(Arc::new(getter));
        self
    }

    pub fn setter<F>(mut self, setter: F) -> Self
    where
        F: Fn(&str, &str) -> bool + Send + Sync + 'static,
    {
        self.setter = Some(Arc::new(setter));
        self
    }
}

impl Debug for HookAdapter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookAdapter")
            .field("getter", &self.getter.is_some())
            .field("setter", &self.setter.is_some())
            .finish()
    }
}

impl Adapter for HookAdapter {
    fn is_supported(&self) -> bool {
        self.getter.is_some() && self.setter.is_some()
    }

    fn has(&self, name: &str) -> bool {
        self.read(name).is_some()
    }

    fn read(&self, name: &str) -> Option<String> {
        let getter = self.getter.as_ref()?;
        getter(name).filter(|value| !value.is_empty())
    }

    fn write(&self, name: &str, value: &str) -> bool {
        match &self.setter {
            Some(setter) => setter(name, value),
            None => false,
        }
    }

    fn delete(&self, name: &str) -> bool {
        self.write(name, "")
    }
}
