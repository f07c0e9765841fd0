//! Compute-once registry of basis functions.
//!
//! Entries are keyed by value: two knot vectors with equal knots, domain and
//! closure share their basis functions. Each key has its own slot lock, so a
//! function is built at most once even when requested from several threads,
//! while unrelated keys build concurrently.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, trace};
use serde::{Deserialize, Serialize};
use spline_core::Result;
use spline_piecewise::{Closure, Piecewise};

use crate::Knotvector;

/// Family of a cached basis function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    Cardinal,
    NonUniform,
    Rational,
}

/// Identity of one basis function (or one of its derivatives).
///
/// Floats are stored as bit patterns with `-0.0` folded into `0.0`, so keys
/// hash and compare by value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub variant: Variant,
    knots: Vec<u64>,
    domain: [u64; 2],
    closure: Closure,
    weights: Vec<u64>,
    pub degree: usize,
    pub index: usize,
    pub derivative: usize,
}

fn bits(x: f64) -> u64 {
    if x == 0.0 {
        0.0f64.to_bits()
    } else {
        x.to_bits()
    }
}

impl CacheKey {
    pub fn cardinal(degree: usize, derivative: usize) -> Self {
        Self {
            variant: Variant::Cardinal,
            knots: Vec::new(),
            domain: [0, 0],
            closure: Closure::ClosedOpen,
            weights: Vec::new(),
            degree,
            index: 0,
            derivative,
        }
    }

    pub fn non_uniform(kv: &Knotvector, degree: usize, index: usize, derivative: usize) -> Self {
        let domain = kv.domain();
        Self {
            variant: Variant::NonUniform,
            knots: kv.knots().iter().copied().map(bits).collect(),
            domain: [bits(domain.lower), bits(domain.upper)],
            closure: kv.closure(),
            weights: Vec::new(),
            degree,
            index,
            derivative,
        }
    }

    pub fn rational(kv: &Knotvector, weights: &[f64], index: usize, derivative: usize) -> Self {
        Self {
            variant: Variant::Rational,
            weights: weights.iter().copied().map(bits).collect(),
            ..Self::non_uniform(kv, kv.degree(), index, derivative)
        }
    }

    pub fn knots(&self) -> Vec<f64> {
        self.knots.iter().copied().map(f64::from_bits).collect()
    }

    pub fn weights(&self) -> Vec<f64> {
        self.weights.iter().copied().map(f64::from_bits).collect()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.variant {
            Variant::Cardinal => write!(f, "B_{}", self.degree)?,
            Variant::NonUniform => write!(
                f,
                "N_{{{},{}}} over {} knots",
                self.index,
                self.degree,
                self.knots.len()
            )?,
            Variant::Rational => write!(
                f,
                "R_{{{},{}}} over {} knots",
                self.index,
                self.degree,
                self.knots.len()
            )?,
        }
        if self.derivative > 0 {
            write!(f, " (d^{})", self.derivative)?;
        }
        Ok(())
    }
}

type Slot = Arc<Mutex<Option<Arc<Piecewise>>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panic inside a builder leaves the slot empty, never half-written
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Snapshot of cache counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: usize,
    pub constructions: usize,
    pub hits: usize,
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} entries, {} constructions, {} hits",
            self.entries, self.constructions, self.hits
        )
    }
}

#[derive(Debug, Default)]
pub struct BasisCache {
    slots: Mutex<HashMap<CacheKey, Slot>>,
    constructions: AtomicUsize,
    hits: AtomicUsize,
}

impl BasisCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached function for `key`, building it with `build` on the
    /// first request. A failed build stores nothing.
    pub fn get_or_create<F>(&self, key: CacheKey, build: F) -> Result<Arc<Piecewise>>
    where
        F: FnOnce() -> Result<Piecewise>,
    {
        let slot = {
            let mut slots = lock(&self.slots);
            Arc::clone(slots.entry(key.clone()).or_default())
        };

        let mut entry = lock(&slot);
        if let Some(function) = entry.as_ref() {
            trace!("basis cache hit: {key}");
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Arc::clone(function));
        }

        debug!("constructing {key}");
        let function = match build() {
            Ok(function) => Arc::new(function),
            Err(e) => {
                drop(entry);
                self.release_empty(&key, &slot);
                return Err(e);
            }
        };
        self.constructions.fetch_add(1, Ordering::Relaxed);
        *entry = Some(Arc::clone(&function));
        Ok(function)
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<Piecewise>> {
        let slot = lock(&self.slots).get(key).cloned()?;
        let entry = lock(&slot);
        entry.clone()
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.get(key).is_some()
    }

    /// Number of built entries.
    pub fn len(&self) -> usize {
        self.filled_slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        lock(&self.slots).clear();
    }

    /// Total number of builder invocations that produced an entry.
    pub fn constructions(&self) -> usize {
        self.constructions.load(Ordering::Relaxed)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            constructions: self.constructions(),
            hits: self.hits(),
        }
    }

    /// Built entries, in no particular order.
    pub fn entries(&self) -> Vec<(CacheKey, Arc<Piecewise>)> {
        self.filled_slots()
    }

    /// Forget an unfilled slot nobody else is waiting on. New handles to a
    /// slot are only taken under the map lock, so the count cannot grow here.
    fn release_empty(&self, key: &CacheKey, slot: &Slot) {
        let mut slots = lock(&self.slots);
        let unused = slots
            .get(key)
            .is_some_and(|s| Arc::ptr_eq(s, slot) && Arc::strong_count(s) == 2);
        if unused && lock(slot).is_none() {
            slots.remove(key);
        }
    }

    #[cfg(test)]
    fn slot_count(&self) -> usize {
        lock(&self.slots).len()
    }

    fn filled_slots(&self) -> Vec<(CacheKey, Arc<Piecewise>)> {
        let slots: Vec<(CacheKey, Slot)> = lock(&self.slots)
            .iter()
            .map(|(k, s)| (k.clone(), Arc::clone(s)))
            .collect();
        slots
            .into_iter()
            .filter_map(|(k, s)| {
                let entry = lock(&s);
                entry.clone().map(|f| (k, f))
            })
            .collect()
    }
}

impl fmt::Display for BasisCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.stats())?;
        let mut entries = self.entries();
        entries.sort_by_key(|(k, _)| (k.variant as u8, k.degree, k.index, k.derivative));
        for (key, function) in entries {
            writeln!(f, "  {key}: {} branches", function.branch_count())?;
        }
        Ok(())
    }
}
