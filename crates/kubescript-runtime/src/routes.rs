//! Route table
//!
//! Built once from the finalised registrations and read-only afterwards. Keys
//! are the same identifiers the build phase wired into the gateway.

use kubescript_core::{Handler, Identifier, RegistrationSet};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct RouteTable {
    handlers: HashMap<Identifier, Arc<dyn Handler>>,
}

impl RouteTable {
    pub fn from_registrations(registrations: &RegistrationSet) -> Self {
        let handlers = registrations
            .iter()
            .map(|(identifier, registration)| (identifier.clone(), registration.handler().clone()))
            .collect();
        Self { handlers }
    }

    /// Handler for a raw identifier
    pub fn get(&self, identifier: &str) -> Option<&Arc<dyn Handler>> {
        self.handlers.get(identifier)
    }

    /// Stored identifier and handler for a raw identifier
    pub fn lookup(&self, identifier: &str) -> Option<(&Identifier, &Arc<dyn Handler>)> {
        self.handlers.get_key_value(identifier)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Identifiers served, sorted
    pub fn identifiers(&self) -> Vec<&Identifier> {
        let mut ids: Vec<&Identifier> = self.handlers.keys().collect();
        ids.sort();
        ids
    }
}

impl fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.identifiers()).finish()
    }
}
