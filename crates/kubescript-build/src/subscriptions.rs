//! Subscription set derived from the registrations
//!
//! Each registration becomes one gateway function (id = identifier, URL =
//! in-cluster app service + `/<identifier>`) plus one subscription binding the
//! trigger to it. The set is always pushed whole.

use kubescript_core::{HttpMethod, Identifier, RegistrationSet, Trigger};
use serde::Serialize;

/// Event type every HTTP subscription listens to
pub const HTTP_EVENT_TYPE: &str = "http.request";

/// One gateway rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionRule {
    pub function_id: Identifier,
    pub function_url: String,
    pub trigger: Trigger,
}

impl SubscriptionRule {
    /// Event type the subscription listens to
    pub fn event_type(&self) -> &str {
        match &self.trigger {
            Trigger::Http { .. } => HTTP_EVENT_TYPE,
            Trigger::Event { name } => name.as_str(),
        }
    }

    /// Function registration body
    pub fn function(&self) -> FunctionSpec {
        FunctionSpec {
            function_id: self.function_id.to_string(),
            kind: "http",
            provider: Provider {
                url: self.function_url.clone(),
            },
        }
    }

    /// Subscription creation body
    pub fn subscription(&self) -> SubscriptionSpec {
        match &self.trigger {
            Trigger::Http { method, path } => SubscriptionSpec {
                kind: "sync",
                event_type: HTTP_EVENT_TYPE.to_string(),
                function_id: self.function_id.to_string(),
                method: Some(*method),
                path: path.clone(),
            },
            Trigger::Event { name } => SubscriptionSpec {
                kind: "async",
                event_type: name.clone(),
                function_id: self.function_id.to_string(),
                method: None,
                path: "/".to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionSpec {
    pub function_id: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub provider: Provider,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Provider {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionSpec {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub event_type: String,
    pub function_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<HttpMethod>,
    pub path: String,
}

/// All rules for one application space
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionSet {
    space: String,
    rules: Vec<SubscriptionRule>,
}

impl SubscriptionSet {
    /// Build the rules for `registrations`, routing each function to
    /// `service_url + "/" + identifier`.
    pub fn from_registrations(
        space: impl Into<String>,
        service_url: &str,
        registrations: &RegistrationSet,
    ) -> Self {
        let base = service_url.trim_end_matches('/');
        let rules = registrations
            .iter()
            .map(|(identifier, registration)| SubscriptionRule {
                function_id: identifier.clone(),
                function_url: format!("{}{}", base, identifier.endpoint()),
                trigger: registration.trigger().clone(),
            })
            .collect();

        Self {
            space: space.into(),
            rules,
        }
    }

    /// Gateway space the rules belong to
    pub fn space(&self) -> &str {
        &self.space
    }

    pub fn rules(&self) -> &[SubscriptionRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Distinct event types the rules need, sorted
    pub fn event_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.rules.iter().map(SubscriptionRule::event_type).collect();
        types.sort_unstable();
        types.dedup();
        types
    }

    /// Rule for an HTTP route, if one exists
    pub fn route(&self, method: HttpMethod, path: &str) -> Option<&SubscriptionRule> {
        self.rules.iter().find(|rule| {
            matches!(
                &rule.trigger,
                Trigger::Http { method: m, path: p } if *m == method && p == path
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kubescript_core::{App, Context, HandlerError, Invocation, Reply};

    async fn ok(_inv: Invocation, _ctx: Context) -> Result<Reply, HandlerError> {
        Ok(Reply::empty())
    }

    fn set() -> SubscriptionSet {
        let mut app = App::new();
        app.get("/cart", ok).post("/cart", ok).on("order.created", ok);
        let registrations = app.registrations().unwrap();
        SubscriptionSet::from_registrations("shop", "http://shop:3000", &registrations)
    }

    #[test]
    fn test_http_rule() {
        let set = set();
        let rule = set.route(HttpMethod::Get, "/cart").unwrap();
        assert_eq!(rule.function_id.as_str(), "GET-cart");
        assert_eq!(rule.function_url, "http://shop:3000/GET-cart");

        let body = serde_json::to_value(rule.subscription()).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "type": "sync",
                "eventType": "http.request",
                "functionId": "GET-cart",
                "method": "GET",
                "path": "/cart"
            })
        );
    }

    #[test]
    fn test_event_rule() {
        let set = set();
        let rule = set
            .rules()
            .iter()
            .find(|r| r.function_id.is_event())
            .unwrap();

        assert_eq!(rule.event_type(), "order.created");
        assert_eq!(
            serde_json::to_value(rule.subscription()).unwrap(),
            serde_json::json!({
                "type": "async",
                "eventType": "order.created",
                "functionId": "EVENT-order.created",
                "path": "/"
            })
        );
    }

    #[test]
    fn test_function_spec() {
        let set = set();
        let rule = set.route(HttpMethod::Post, "/cart").unwrap();
        assert_eq!(
            serde_json::to_value(rule.function()).unwrap(),
            serde_json::json!({
                "functionId": "POST-cart",
                "type": "http",
                "provider": { "url": "http://shop:3000/POST-cart" }
            })
        );
    }

    #[test]
    fn test_event_types_deduplicated() {
        let set = set();
        assert_eq!(set.space(), "shop");
        assert_eq!(set.len(), 3);
        assert_eq!(set.event_types(), vec!["http.request", "order.created"]);
    }
}
