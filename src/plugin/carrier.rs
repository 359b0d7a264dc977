//! Content and Result Carriers
//!
//! Keyed collections that move content units between host and plugin. A
//! carrier may be unbounded, so the contract only requires the key set to be
//! enumerable; values are produced while streaming.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use rayon::iter::{ParallelBridge, ParallelIterator};

use crate::plugin::error::{PluginError, PluginResult};

/// Item stream produced by [`Carrier::iter`]
pub type CarrierIter<'a, T> = Box<dyn Iterator<Item = PluginResult<Arc<T>>> + Send + 'a>;

/// Keyed, streamable collection of content units.
///
/// Implementations must be safe for concurrent reads.
pub trait Carrier<T>: Send + Sync {
    /// Stream every entry. Loading an entry may fail.
    fn iter(&self) -> CarrierIter<'_, T>;

    /// Number of entries
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether an entry exists for `key`
    fn contains_key(&self, key: &str) -> bool;

    /// All keys, without loading values
    fn keys(&self) -> Vec<String>;

    /// Entry for `key`; `None` when absent
    fn get(&self, key: &str) -> PluginResult<Option<Arc<T>>>;
}

/// Fully resident carrier ordered by key
#[derive(Debug)]
pub struct MemoryCarrier<T> {
    entries: BTreeMap<String, Arc<T>>,
}

impl<T> MemoryCarrier<T> {
    pub fn new() -> Self {
        Self { entries: BTreeMap::new() }
    }

    /// Build from `(key, value)` pairs. Later duplicates replace earlier ones.
    pub fn from_entries<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, T)>,
        K: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(k, v)| (k.into(), Arc::new(v)))
                .collect(),
        }
    }

    pub fn insert<K: Into<String>>(&mut self, key: K, value: T) -> Option<Arc<T>> {
        self.entries.insert(key.into(), Arc::new(value))
    }
}

impl<T> Default for MemoryCarrier<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + Sync> Carrier<T> for MemoryCarrier<T> {
    fn iter(&self) -> CarrierIter<'_, T> {
        Box::new(self.entries.values().map(|v| Ok(Arc::clone(v))))
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    fn get(&self, key: &str) -> PluginResult<Option<Arc<T>>> {
        Ok(self.entries.get(key).cloned())
    }
}

/// Loads one entry of a [`LazyCarrier`] on demand
pub trait EntryLoader<T>: Send + Sync {
    /// Load the entry for `key`; `Ok(None)` when it no longer exists
    fn load(&self, key: &str) -> anyhow::Result<Option<T>>;
}

impl<T, F> EntryLoader<T> for F
where
    F: Fn(&str) -> anyhow::Result<Option<T>> + Send + Sync,
{
    fn load(&self, key: &str) -> anyhow::Result<Option<T>> {
        self(key)
    }
}

/// Carrier holding only keys; values are loaded while streaming.
///
/// Size and key queries answer from the declared keys. A declared key whose
/// loader finds no entry is a load failure: `get` and `iter` both report it as
/// `ExecutionFailed`, so `len()` always equals the number of streamed items.
pub struct LazyCarrier<T, L> {
    keys: BTreeSet<String>,
    loader: L,
    _entry: std::marker::PhantomData<fn() -> T>,
}

impl<T, L: EntryLoader<T>> LazyCarrier<T, L> {
    pub fn new<I, K>(keys: I, loader: L) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
            loader,
            _entry: std::marker::PhantomData,
        }
    }

    fn load(&self, key: &str) -> PluginResult<Arc<T>> {
        let reason = match self.loader.load(key) {
            Ok(Some(entry)) => return Ok(Arc::new(entry)),
            Ok(None) => "entry no longer exists".to_string(),
            Err(e) => e.to_string(),
        };
        Err(PluginError::execution_failed_chain([
            format!("failed to load entry '{}'", key),
            reason,
        ]))
    }
}

impl<T, L> Carrier<T> for LazyCarrier<T, L>
where
    T: Send + Sync,
    L: EntryLoader<T>,
{
    fn iter(&self) -> CarrierIter<'_, T> {
        Box::new(self.keys.iter().map(move |key| self.load(key)))
    }

    fn len(&self) -> usize {
        self.keys.len()
    }

    fn contains_key(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    fn keys(&self) -> Vec<String> {
        self.keys.iter().cloned().collect()
    }

    fn get(&self, key: &str) -> PluginResult<Option<Arc<T>>> {
        if !self.keys.contains(key) {
            return Ok(None);
        }
        self.load(key).map(Some)
    }
}

/// Stream a carrier across the rayon worker pool.
///
/// Stops at the first error, which may come from loading or from `f`.
pub fn par_for_each<T, C, F>(carrier: &C, f: F) -> anyhow::Result<()>
where
    T: Send + Sync,
    C: Carrier<T> + ?Sized,
    F: Fn(Arc<T>) -> anyhow::Result<()> + Send + Sync,
{
    carrier
        .iter()
        .par_bridge()
        .try_for_each(|entry| f(entry?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_memory_carrier_queries() {
        let carrier = MemoryCarrier::from_entries([("b", 2), ("a", 1), ("c", 3)]);

        assert_eq!(carrier.len(), 3);
        assert!(!carrier.is_empty());
        assert!(carrier.contains_key("a"));
        assert!(!carrier.contains_key("z"));
        assert_eq!(carrier.keys(), vec!["a", "b", "c"]);
        assert_eq!(carrier.get("b").unwrap().as_deref(), Some(&2));
        assert!(carrier.get("z").unwrap().is_none());

        let values: Vec<i32> = carrier.iter().map(|e| *e.unwrap()).collect();
        assert_eq!(values, vec![1, 2, 3]);
    }

    #[test]
    fn test_absent_distinct_from_present_none() {
        let carrier = MemoryCarrier::from_entries([("present", None::<String>)]);
        assert!(matches!(carrier.get("present"), Ok(Some(ref v)) if v.is_none()));
        assert!(matches!(carrier.get("absent"), Ok(None)));
    }

    #[test]
    fn test_lazy_carrier_loads_on_demand() {
        let loads = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&loads);
        let carrier = LazyCarrier::new(["k1", "k2", "k3"], move |key: &str| -> anyhow::Result<Option<String>> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Some(key.to_uppercase()))
        });

        // Size and key queries never touch the loader
        assert_eq!(carrier.len(), 3);
        assert!(carrier.contains_key("k2"));
        assert_eq!(carrier.keys().len(), 3);
        assert_eq!(loads.load(Ordering::SeqCst), 0);

        assert_eq!(carrier.get("k2").unwrap().as_deref().map(String::as_str), Some("K2"));
        assert!(carrier.get("k9").unwrap().is_none());
        assert_eq!(loads.load(Ordering::SeqCst), 1);

        let mut iter = carrier.iter();
        assert_eq!(iter.next().unwrap().unwrap().as_str(), "K1");
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_lazy_carrier_load_failure() {
        let carrier = LazyCarrier::new(["ok", "broken"], |key: &str| -> anyhow::Result<Option<usize>> {
            if key == "broken" {
                anyhow::bail!("disk read error")
            }
            Ok(Some(key.len()))
        });

        let err = carrier.get("broken").unwrap_err();
        assert!(matches!(err, PluginError::ExecutionFailed { .. }));
        assert!(err.to_string().contains("disk read error"));

        let results: Vec<_> = carrier.iter().collect();
        assert_eq!(results.len(), 2);
        assert!(results.iter().any(|r| r.is_err()));
    }

    #[test]
    fn test_lazy_carrier_vanished_entry_is_load_failure() {
        let carrier = LazyCarrier::new(["kept", "gone"], |key: &str| -> anyhow::Result<Option<String>> {
            Ok((key == "kept").then(|| key.to_string()))
        });

        assert!(carrier.contains_key("gone"));
        assert_eq!(carrier.len(), carrier.iter().count());

        let err = carrier.get("gone").unwrap_err();
        assert_eq!(
            err,
            PluginError::execution_failed_chain(["failed to load entry 'gone'", "entry no longer exists"])
        );

        let results: Vec<_> = carrier.iter().collect();
        assert_eq!(results[0], Err(err));
        assert_eq!(results[1].as_deref().map(String::as_str), Ok("kept"));
        assert!(carrier.get("never-declared").unwrap().is_none());
    }

    #[test]
    fn test_par_for_each_visits_every_entry() {
        let carrier = MemoryCarrier::from_entries((0..500).map(|i| (format!("key-{:04}", i), i)));
        let total = AtomicUsize::new(0);
        par_for_each(&carrier, |v| {
            total.fetch_add(*v, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();
        assert_eq!(total.load(Ordering::SeqCst), (0..500).sum::<usize>());
    }

    #[test]
    fn test_par_for_each_stops_on_error() {
        let carrier = MemoryCarrier::from_entries((0..50).map(|i| (i.to_string(), i)));
        let result = par_for_each(&carrier, |v| {
            if *v == 7 {
                anyhow::bail!("bad entry")
            }
            Ok(())
        });
        assert!(result.is_err());
    }
}
