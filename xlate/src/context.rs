// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Translation context: the reference-counted owner of the local and remote rulesets.
//!
//! A context is created with one reference, in the form of a [`ContextRef`]. References are
//! acquired by cloning a [`ContextRef`] (or through a [`crate::DeviceTable`]) and released when
//! they are dropped. Releasing the last reference marks the context as freed and tears its
//! rulesets down; the memory itself goes away with the last [`Arc`] pointing to it.
//!
//! Every change to the reference count or to the signature of any context happens under a
//! process-wide lifecycle lock. Rules are protected by a per-context [`RwLock`], always taken
//! after the lifecycle lock when both are needed.

use crate::errors::XlateError;
use crate::rule::{RuleId, RulePair, RulesetKind};
use crate::ruleset::Ruleset;
use std::fmt::Debug;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::ops::Deref;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak,
};

#[allow(unused)]
use tracing::{debug, error, info, warn};

/// Signature of a live context
pub const VALID_SIGNATURE: u32 = 0x4e41_5434;
/// Signature of a context whose last reference was released
pub const FREED_SIGNATURE: u32 = 0xdead_4e46;

const INITIAL_RULES: usize = 16;

static LIFECYCLE_LOCK: Mutex<()> = Mutex::new(());

fn lifecycle_lock() -> MutexGuard<'static, ()> {
    LIFECYCLE_LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Reports a misuse of the reference counting. Fatal in debug builds.
macro_rules! violation {
    ($($arg:tt)+) => {{
        error!($($arg)+);
        if cfg!(debug_assertions) {
            panic!($($arg)+);
        }
    }};
}

/// The two rulesets of a translation context
#[derive(Debug)]
pub struct Rulesets {
    pub local: Ruleset,
    pub remote: Ruleset,
}

impl Rulesets {
    fn with_capacity(capacity: usize) -> Result<Self, XlateError> {
        Ok(Self {
            local: Ruleset::with_capacity(RulesetKind::Local, capacity)?,
            remote: Ruleset::with_capacity(RulesetKind::Remote, capacity)?,
        })
    }

    #[must_use]
    pub fn get(&self, kind: RulesetKind) -> &Ruleset {
        match kind {
            RulesetKind::Local => &self.local,
            RulesetKind::Remote => &self.remote,
        }
    }

    #[must_use]
    pub fn get_mut(&mut self, kind: RulesetKind) -> &mut Ruleset {
        match kind {
            RulesetKind::Local => &mut self.local,
            RulesetKind::Remote => &mut self.remote,
        }
    }
}

/// A translation context
pub struct XlateContext {
    sig: AtomicU32,
    refcount: AtomicU32,
    rules: RwLock<Rulesets>,
}

impl XlateContext {
    /// Creates a new translation context with empty rulesets, and returns the first reference
    /// to it.
    ///
    /// # Errors
    ///
    /// Returns [`XlateError::AllocationFailure`] if the rulesets can't be allocated.
    pub fn alloc() -> Result<ContextRef, XlateError> {
        let rules = Rulesets::with_capacity(INITIAL_RULES)?;
        let ctx = Arc::new(Self {
            sig: AtomicU32::new(VALID_SIGNATURE),
            refcount: AtomicU32::new(1),
            rules: RwLock::new(rules),
        });
        info!("Allocated translation context {:p}", Arc::as_ptr(&ctx));
        Ok(ContextRef { inner: ctx })
    }

    /// Acquires a new reference to the context.
    ///
    /// Returns `None` if the context has already been freed.
    #[must_use]
    pub fn acquire(self: &Arc<Self>) -> Option<ContextRef> {
        let _guard = lifecycle_lock();
        if !self.is_valid() {
            warn!(
                "Refusing to acquire freed translation context {:p}",
                Arc::as_ptr(self)
            );
            return None;
        }
        self.incref();
        Some(ContextRef {
            inner: Arc::clone(self),
        })
    }

    // The lifecycle lock must be held
    fn incref(&self) {
        let count = self.refcount.load(Ordering::Acquire);
        let Some(count) = count.checked_add(1) else {
            error!("Reference count overflow on translation context {self:p}");
            std::process::abort();
        };
        self.refcount.store(count, Ordering::Release);
        debug!("Acquired translation context {self:p}, refcount is now {count}");
    }

    fn release(&self) {
        let _guard = lifecycle_lock();
        if !self.is_valid() {
            violation!("Releasing freed translation context {self:p}");
            return;
        }
        let count = self.refcount.load(Ordering::Acquire);
        if count == 0 {
            violation!("Releasing translation context {self:p} which has no reference");
            return;
        }
        self.refcount.store(count - 1, Ordering::Release);
        debug!(
            "Released translation context {self:p}, refcount is now {}",
            count - 1
        );
        if count == 1 {
            self.sig.store(FREED_SIGNATURE, Ordering::Release);
            self.teardown();
        }
    }

    fn teardown(&self) {
        let mut rules = self.rules.write().unwrap_or_else(PoisonError::into_inner);
        let local = rules.local.drain();
        let remote = rules.remote.drain();
        info!("Freed translation context {self:p} ({local} local rules, {remote} remote rules)");
    }

    /// Tell if the context is live. A context is no longer valid after its last reference has
    /// been released.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.sig.load(Ordering::Acquire) == VALID_SIGNATURE
    }

    /// Current number of references to the context
    #[must_use]
    pub fn refcount(&self) -> u32 {
        self.refcount.load(Ordering::Acquire)
    }

    fn write_rules(&self) -> Result<RwLockWriteGuard<'_, Rulesets>, XlateError> {
        let rules = self.rules.write().unwrap_or_else(PoisonError::into_inner);
        if !self.is_valid() {
            warn!("Attempted to modify freed translation context {self:p}");
            return Err(XlateError::InvalidContext);
        }
        Ok(rules)
    }

    /// Read access to the rulesets, for batched lookups.
    ///
    /// # Errors
    ///
    /// Returns [`XlateError::InvalidContext`] if the context has been freed.
    pub fn rules(&self) -> Result<RwLockReadGuard<'_, Rulesets>, XlateError> {
        let rules = self.rules.read().unwrap_or_else(PoisonError::into_inner);
        if !self.is_valid() {
            warn!("Attempted to read freed translation context {self:p}");
            return Err(XlateError::InvalidContext);
        }
        Ok(rules)
    }

    /// Adds a rule to one of the rulesets of the context.
    ///
    /// # Errors
    ///
    /// Fails if the context has been freed, or if the ruleset refuses the rule.
    pub fn insert_rule(&self, kind: RulesetKind, rule: RulePair) -> Result<RuleId, XlateError> {
        self.write_rules()?.get_mut(kind).insert(rule)
    }

    /// Removes the entries for `addr4/len4` and `addr6/len6` from one of the rulesets of the
    /// context. See [`Ruleset::remove`].
    pub fn remove_rule(
        &self,
        kind: RulesetKind,
        addr4: Ipv4Addr,
        len4: u8,
        addr6: Ipv6Addr,
        len6: u8,
    ) -> bool {
        self.write_rules()
            .is_ok_and(|mut rules| rules.get_mut(kind).remove(addr4, len4, addr6, len6))
    }

    #[must_use]
    pub fn lookup_v4(&self, kind: RulesetKind, addr: &Ipv4Addr) -> Option<RulePair> {
        let rules = self.rules().ok()?;
        rules.get(kind).lookup_v4(addr).map(|(_, rule)| *rule)
    }

    #[must_use]
    pub fn lookup_v6(&self, kind: RulesetKind, addr: &Ipv6Addr) -> Option<RulePair> {
        let rules = self.rules().ok()?;
        rules.get(kind).lookup_v6(addr).map(|(_, rule)| *rule)
    }

    /// Number of rules in one of the rulesets. A freed context has none.
    #[must_use]
    pub fn rule_count(&self, kind: RulesetKind) -> usize {
        self.rules().map_or(0, |rules| rules.get(kind).len())
    }
}

impl Debug for XlateContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XlateContext")
            .field("sig", &format_args!("{:#x}", self.sig.load(Ordering::Acquire)))
            .field("refcount", &self.refcount())
            .finish_non_exhaustive()
    }
}

/// An owned reference to a [`XlateContext`]. Cloning acquires a new reference, dropping releases
/// it.
pub struct ContextRef {
    inner: Arc<XlateContext>,
}

impl ContextRef {
    /// Releases this reference. If it was the last one, the context is torn down.
    pub fn release(self) {
        drop(self);
    }

    /// Tell if two references point to the same context
    #[must_use]
    pub fn ptr_eq(&self, other: &ContextRef) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn downgrade(&self) -> Weak<XlateContext> {
        Arc::downgrade(&self.inner)
    }
}

impl Clone for ContextRef {
    fn clone(&self) -> Self {
        let _guard = lifecycle_lock();
        if self.is_valid() {
            self.inner.incref();
        } else {
            violation!("Cloning a reference to freed translation context {:p}", self.inner);
        }
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Drop for ContextRef {
    fn drop(&mut self) {
        self.inner.release();
    }
}

impl Deref for ContextRef {
    type Target = XlateContext;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl Debug for ContextRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ContextRef").field(&self.inner).finish()
    }
}
