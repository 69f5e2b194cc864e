//! Registration model
//!
//! [`App`] is the declarative surface: `on`, `get`, `post`, `put` and `delete`
//! each append one [`Registration`] during program startup. Nothing is
//! validated until [`App::registrations`] finalises the declarations into a
//! [`RegistrationSet`], which both phases consume.

use crate::addressing::{is_valid_event_name, HttpMethod, Identifier};
use crate::error::RegistrationError;
use crate::handler::Handler;
use serde::{Deserialize, Serialize};
use std::collections::btree_map::{self, BTreeMap};
use std::fmt;
use std::sync::Arc;

/// What a registration listens to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Trigger {
    /// HTTP route
    Http { method: HttpMethod, path: String },
    /// Named event
    Event { name: String },
}

impl Trigger {
    /// Canonical identifier for this trigger
    pub fn identifier(&self) -> Identifier {
        match self {
            Trigger::Http { method, path } => Identifier::http(*method, path),
            Trigger::Event { name } => Identifier::event(name),
        }
    }

    fn validate(&self) -> Result<(), RegistrationError> {
        match self {
            Trigger::Http { path, .. } if !path.starts_with('/') => {
                Err(RegistrationError::InvalidPath { path: path.clone() })
            }
            Trigger::Event { name } if !is_valid_event_name(name) => {
                Err(RegistrationError::InvalidEventName { name: name.clone() })
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Http { method, path } => write!(f, "{} {}", method, path),
            Trigger::Event { name } => write!(f, "event {}", name),
        }
    }
}

/// A trigger bound to a handler
#[derive(Clone)]
pub struct Registration {
    trigger: Trigger,
    handler: Arc<dyn Handler>,
}

impl Registration {
    pub fn new(trigger: Trigger, handler: Arc<dyn Handler>) -> Self {
        Self { trigger, handler }
    }

    pub fn trigger(&self) -> &Trigger {
        &self.trigger
    }

    pub fn handler(&self) -> &Arc<dyn Handler> {
        &self.handler
    }

    /// Canonical identifier, identical in both phases
    pub fn identifier(&self) -> Identifier {
        self.trigger.identifier()
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("trigger", &self.trigger)
            .finish_non_exhaustive()
    }
}

/// Declarative surface for routes and event handlers
#[derive(Default)]
pub struct App {
    declared: Vec<Registration>,
}

impl App {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle a named event
    pub fn on<H: Handler>(&mut self, event: &str, handler: H) -> &mut Self {
        self.push(
            Trigger::Event {
                name: event.to_string(),
            },
            handler,
        )
    }

    /// Handle `GET <path>`
    pub fn get<H: Handler>(&mut self, path: &str, handler: H) -> &mut Self {
        self.route(HttpMethod::Get, path, handler)
    }

    /// Handle `POST <path>`
    pub fn post<H: Handler>(&mut self, path: &str, handler: H) -> &mut Self {
        self.route(HttpMethod::Post, path, handler)
    }

    /// Handle `PUT <path>`
    pub fn put<H: Handler>(&mut self, path: &str, handler: H) -> &mut Self {
        self.route(HttpMethod::Put, path, handler)
    }

    /// Handle `DELETE <path>`
    pub fn delete<H: Handler>(&mut self, path: &str, handler: H) -> &mut Self {
        self.route(HttpMethod::Delete, path, handler)
    }

    /// Handle an HTTP route with an explicit method
    pub fn route<H: Handler>(&mut self, method: HttpMethod, path: &str, handler: H) -> &mut Self {
        self.push(
            Trigger::Http {
                method,
                path: path.to_string(),
            },
            handler,
        )
    }

    fn push<H: Handler>(&mut self, trigger: Trigger, handler: H) -> &mut Self {
        tracing::debug!(%trigger, "Registered handler");
        self.declared.push(Registration::new(trigger, Arc::new(handler)));
        self
    }

    /// Number of declarations so far
    pub fn len(&self) -> usize {
        self.declared.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declared.is_empty()
    }

    /// Finalise the declarations.
    ///
    /// Fails on the first invalid path, invalid event name or identifier
    /// collision, in declaration order.
    pub fn registrations(&self) -> Result<RegistrationSet, RegistrationError> {
        let mut entries: BTreeMap<Identifier, Registration> = BTreeMap::new();

        for registration in &self.declared {
            registration.trigger.validate()?;

            match entries.entry(registration.identifier()) {
                btree_map::Entry::Occupied(existing) => {
                    return Err(RegistrationError::DuplicateIdentifier {
                        identifier: existing.key().clone(),
                        first: existing.get().trigger.to_string(),
                        second: registration.trigger.to_string(),
                    });
                }
                btree_map::Entry::Vacant(slot) => {
                    slot.insert(registration.clone());
                }
            }
        }

        Ok(RegistrationSet { entries })
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.declared.iter().map(|r| &r.trigger))
            .finish()
    }
}

/// Finalised registrations keyed by identifier
///
/// Iteration order is the identifier order, so anything derived from the set
/// is independent of declaration order.
#[derive(Debug, Clone, Default)]
pub struct RegistrationSet {
    entries: BTreeMap<Identifier, Registration>,
}

impl RegistrationSet {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, identifier: &str) -> Option<&Registration> {
        self.entries.get(identifier)
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.entries.contains_key(identifier)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Identifier, &Registration)> {
        self.entries.iter()
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &Identifier> {
        self.entries.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{Context, HandlerError, Invocation, Reply};

    async fn ok(_inv: Invocation, _ctx: Context) -> Result<Reply, HandlerError> {
        Ok(Reply::empty())
    }

    #[test]
    fn test_registrations_keyed_by_identifier() {
        let mut app = App::new();
        app.get("/cart", ok)
            .post("/cart", ok)
            .put("/cart/items", ok)
            .delete("/cart", ok)
            .on("order.created", ok);

        let set = app.registrations().unwrap();
        let ids: Vec<_> = set.identifiers().map(Identifier::as_str).collect();
        assert_eq!(
            ids,
            vec!["DELETE-cart", "EVENT-order.created", "GET-cart", "POST-cart", "PUT-cart/items"]
        );
    }

    #[test]
    fn test_declaration_order_is_irrelevant() {
        let mut a = App::new();
        a.get("/a", ok).on("b", ok);
        let mut b = App::new();
        b.on("b", ok).get("/a", ok);

        let left: Vec<_> = a.registrations().unwrap().identifiers().cloned().collect();
        let right: Vec<_> = b.registrations().unwrap().identifiers().cloned().collect();
        assert_eq!(left, right);
    }

    #[test]
    fn test_duplicate_identifier_rejected() {
        let mut app = App::new();
        app.get("/x", ok).get("/x", ok);

        let err = app.registrations().unwrap_err();
        assert!(matches!(
            err,
            RegistrationError::DuplicateIdentifier { ref identifier, .. }
                if identifier.as_str() == "GET-x"
        ));
    }

    #[test]
    fn test_route_and_event_with_similar_names_do_not_collide() {
        let mut app = App::new();
        app.get("/x", ok).on("GET-x", ok);

        let set = app.registrations().unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.contains("GET-x"));
        assert!(set.contains("EVENT-GET-x"));
    }

    #[test]
    fn test_path_without_leading_slash_rejected() {
        let mut app = App::new();
        app.get("cart", ok);

        assert_eq!(
            app.registrations().unwrap_err(),
            RegistrationError::InvalidPath {
                path: "cart".to_string()
            }
        );
    }

    #[test]
    fn test_invalid_event_name_rejected() {
        let mut app = App::new();
        app.on("order created", ok);

        assert!(matches!(
            app.registrations().unwrap_err(),
            RegistrationError::InvalidEventName { .. }
        ));
    }

    #[test]
    fn test_empty_app() {
        let app = App::new();
        assert!(app.is_empty());
        assert!(app.registrations().unwrap().is_empty());
    }
}
