// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Association of network devices to translation contexts

use crate::context::{ContextRef, XlateContext};
use crate::errors::XlateError;
use ahash::RandomState;
use std::collections::HashMap;
use std::sync::Weak;

#[allow(unused)]
use tracing::{debug, warn};

/// Table of the translation contexts associated to network devices, by device name.
///
/// The table does not hold references to the contexts: a context whose last reference is
/// released while a device is still attached to it can no longer be acquired through the table.
#[derive(Debug)]
pub struct DeviceTable {
    devices: HashMap<String, Weak<XlateContext>, RandomState>,
}

impl Default for DeviceTable {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceTable {
    #[must_use]
    pub fn new() -> Self {
        Self {
            devices: HashMap::with_hasher(RandomState::with_seed(0)),
        }
    }

    /// Associates device `name` to the context `ctx`. A stale association, to a context that has
    /// been freed, is replaced.
    ///
    /// # Errors
    ///
    /// Returns [`XlateError::DeviceExists`] if the device is associated to a live context.
    pub fn attach(&mut self, name: &str, ctx: &ContextRef) -> Result<(), XlateError> {
        if self
            .devices
            .get(name)
            .and_then(Weak::upgrade)
            .is_some_and(|current| current.is_valid())
        {
            warn!("Device {name} is already attached to a translation context");
            return Err(XlateError::DeviceExists(name.to_owned()));
        }
        self.devices.insert(name.to_owned(), ctx.downgrade());
        debug!("Attached device {name} to translation context {:p}", &**ctx);
        Ok(())
    }

    /// Removes the association of device `name`, if any.
    pub fn detach(&mut self, name: &str) -> bool {
        let found = self.devices.remove(name).is_some();
        if found {
            debug!("Detached device {name}");
        }
        found
    }

    /// Acquires a reference to the context associated to device `name`.
    ///
    /// Returns `None` if the device is unknown, or if its context has been freed.
    #[must_use]
    pub fn acquire(&self, name: &str) -> Option<ContextRef> {
        let Some(weak) = self.devices.get(name) else {
            warn!("No translation context for device {name}");
            return None;
        };
        let Some(ctx) = weak.upgrade() else {
            warn!("Translation context of device {name} is gone");
            return None;
        };
        ctx.acquire()
    }

    /// Number of attached devices
    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
