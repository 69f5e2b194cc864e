//! Gateway wiring
//!
//! Two steps: find the gateway's external address by asking the cluster for
//! its load balancer ingress, then replace the application's space on the
//! gateway admin API with the current [`SubscriptionSet`].

use crate::error::{BuildError, Result};
use crate::process::{Command, ToolRunner};
use crate::subscriptions::SubscriptionSet;
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Default, Deserialize)]
struct ServiceDocument {
    #[serde(default)]
    status: ServiceStatus,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceStatus {
    #[serde(default)]
    load_balancer: LoadBalancerStatus,
}

#[derive(Debug, Default, Deserialize)]
struct LoadBalancerStatus {
    #[serde(default)]
    ingress: Vec<Ingress>,
}

#[derive(Debug, Default, Deserialize)]
struct Ingress {
    ip: Option<String>,
    hostname: Option<String>,
}

/// Extract `status.loadBalancer.ingress[0]` (ip, else hostname) from
/// `kubectl get svc -o json` output
pub fn parse_ingress_address(raw: &str) -> Result<Option<String>> {
    let doc: ServiceDocument = serde_json::from_str(raw)?;
    Ok(doc
        .status
        .load_balancer
        .ingress
        .into_iter()
        .next()
        .and_then(|ingress| ingress.ip.or(ingress.hostname))
        .filter(|address| !address.is_empty()))
}

/// Poll the cluster until `service` has an external address.
///
/// Gives up after `attempts` lookups spaced by `interval`. A failing
/// `kubectl` aborts immediately.
#[instrument(skip(runner))]
pub async fn resolve_address(
    runner: &dyn ToolRunner,
    service: &str,
    attempts: u32,
    interval: Duration,
) -> Result<String> {
    let query = Command::new("kubectl")
        .arg("get")
        .arg(format!("svc/{}", service))
        .args(["-o", "json"])
        .captured();

    let attempts = attempts.max(1);
    for attempt in 1..=attempts {
        let output = runner.run(&query).await?;
        if let Some(address) = parse_ingress_address(&output.stdout)? {
            info!(%address, attempt, "Gateway address resolved");
            return Ok(address);
        }

        debug!(attempt, attempts, "Gateway address not assigned yet");
        if attempt < attempts {
            tokio::time::sleep(interval).await;
        }
    }

    Err(BuildError::AddressResolution(format!(
        "service {} has no load balancer ingress after {} attempts",
        service, attempts
    )))
}

/// Applies a subscription set to a gateway
#[async_trait]
pub trait GatewayAdmin: Send + Sync {
    /// Replace every function and subscription in the set's space
    async fn push(&self, address: &str, set: &SubscriptionSet) -> Result<()>;
}

#[derive(Debug, Default, Deserialize)]
struct FunctionList {
    #[serde(default)]
    functions: Vec<FunctionEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FunctionEntry {
    function_id: String,
}

#[derive(Debug, Default, Deserialize)]
struct SubscriptionList {
    #[serde(default)]
    subscriptions: Vec<SubscriptionEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubscriptionEntry {
    subscription_id: String,
}

/// Event Gateway admin API client
#[derive(Debug, Clone)]
pub struct EventGatewayAdmin {
    client: Client,
    admin_port: u16,
}

impl EventGatewayAdmin {
    pub fn new(admin_port: u16) -> Self {
        Self {
            client: Client::new(),
            admin_port,
        }
    }

    fn url(&self, address: &str, segments: &[&str]) -> Result<Url> {
        let mut url =
            Url::parse(&format!("http://{}:{}/", address, self.admin_port)).map_err(|e| {
                BuildError::Gateway(format!("invalid gateway address {}: {}", address, e))
            })?;
        url.path_segments_mut()
            .map_err(|_| BuildError::Gateway(format!("invalid gateway address {}", address)))?
            .pop_if_empty()
            .push("v1")
            .push("spaces")
            .extend(segments);
        Ok(url)
    }

    async fn check(response: Response, action: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(BuildError::Gateway(format!(
            "{} returned {}: {}",
            action, status, body
        )))
    }

    async fn clear_subscriptions(&self, address: &str, space: &str) -> Result<()> {
        let url = self.url(address, &[space, "subscriptions"])?;
        let response = Self::check(self.client.get(url).send().await?, "list subscriptions").await?;
        let existing: SubscriptionList = response.json().await?;

        for entry in existing.subscriptions {
            debug!(subscription = %entry.subscription_id, "Deleting subscription");
            let url = self.url(address, &[space, "subscriptions", &entry.subscription_id])?;
            Self::check(self.client.delete(url).send().await?, "delete subscription").await?;
        }
        Ok(())
    }

    async fn clear_functions(&self, address: &str, space: &str) -> Result<()> {
        let url = self.url(address, &[space, "functions"])?;
        let response = Self::check(self.client.get(url).send().await?, "list functions").await?;
        let existing: FunctionList = response.json().await?;

        for entry in existing.functions {
            debug!(function = %entry.function_id, "Deleting function");
            let url = self.url(address, &[space, "functions", &entry.function_id])?;
            Self::check(self.client.delete(url).send().await?, "delete function").await?;
        }
        Ok(())
    }

    async fn ensure_event_type(&self, address: &str, space: &str, name: &str) -> Result<()> {
        let url = self.url(address, &[space, "eventtypes"])?;
        let response = self
            .client
            .post(url)
            .json(&serde_json::json!({ "name": name }))
            .send()
            .await?;

        if response.status() == StatusCode::CONFLICT {
            debug!(event_type = name, "Event type already registered");
            return Ok(());
        }
        Self::check(response, "create event type").await?;
        Ok(())
    }
}

#[async_trait]
impl GatewayAdmin for EventGatewayAdmin {
    #[instrument(skip(self, set), fields(space = set.space(), rules = set.len()))]
    async fn push(&self, address: &str, set: &SubscriptionSet) -> Result<()> {
        let space = set.space();

        self.clear_subscriptions(address, space).await?;
        self.clear_functions(address, space).await?;

        for event_type in set.event_types() {
            self.ensure_event_type(address, space, event_type).await?;
        }

        for rule in set.rules() {
            let url = self.url(address, &[space, "functions"])?;
            let response = self.client.post(url).json(&rule.function()).send().await?;
            Self::check(response, "register function").await?;
        }

        for rule in set.rules() {
            let url = self.url(address, &[space, "subscriptions"])?;
            let response = self.client.post(url).json(&rule.subscription()).send().await?;
            Self::check(response, "create subscription").await?;
        }

        if set.is_empty() {
            warn!("No registrations; gateway space left empty");
        }
        info!("Gateway wired");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingRunner;
    use axum::body::Bytes;
    use axum::extract::State;
    use axum::http::{Method, StatusCode as AxumStatus, Uri};
    use axum::response::IntoResponse;
    use axum::Router;
    use kubescript_core::{App, Context, HandlerError, Invocation, Reply};
    use std::sync::{Arc, Mutex};

    const PENDING: &str = r#"{"status":{"loadBalancer":{}}}"#;
    const READY: &str = r#"{"status":{"loadBalancer":{"ingress":[{"ip":"35.1.2.3"}]}}}"#;

    #[test]
    fn test_parse_ingress_address() {
        assert_eq!(parse_ingress_address(READY).unwrap().as_deref(), Some("35.1.2.3"));
        assert_eq!(parse_ingress_address(PENDING).unwrap(), None);
        assert_eq!(
            parse_ingress_address(
                r#"{"status":{"loadBalancer":{"ingress":[{"hostname":"gw.elb.amazonaws.com"}]}}}"#
            )
            .unwrap()
            .as_deref(),
            Some("gw.elb.amazonaws.com")
        );
        assert!(parse_ingress_address("not json").is_err());
    }

    #[tokio::test]
    async fn test_resolve_address_first_try() {
        let runner = RecordingRunner::new().respond("kubectl get svc/event-gateway", READY);
        let address = resolve_address(&runner, "event-gateway", 3, Duration::ZERO)
            .await
            .unwrap();

        assert_eq!(address, "35.1.2.3");
        assert_eq!(
            runner.command_lines(),
            vec!["kubectl get svc/event-gateway -o json"]
        );
    }

    #[tokio::test]
    async fn test_resolve_address_gives_up() {
        let runner = RecordingRunner::new().respond("kubectl get", PENDING);
        let err = resolve_address(&runner, "event-gateway", 3, Duration::ZERO)
            .await
            .unwrap_err();

        assert!(matches!(err, BuildError::AddressResolution(_)));
        assert_eq!(runner.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_resolve_address_tool_failure_aborts() {
        let runner = RecordingRunner::new().fail("kubectl get", 1);
        let err = resolve_address(&runner, "event-gateway", 5, Duration::ZERO)
            .await
            .unwrap_err();

        assert!(matches!(err, BuildError::Tool(_)));
        assert_eq!(runner.calls().len(), 1);
    }

    type Log = Arc<Mutex<Vec<(Method, String, serde_json::Value)>>>;

    async fn fake_admin(
        State(log): State<Log>,
        method: Method,
        uri: Uri,
        body: Bytes,
    ) -> impl IntoResponse {
        let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
        log.lock().unwrap().push((method.clone(), uri.path().to_string(), json.clone()));

        match (method, uri.path()) {
            (Method::GET, "/v1/spaces/shop/subscriptions") => (
                AxumStatus::OK,
                r#"{"subscriptions":[{"subscriptionId":"stale-sub"}]}"#.to_string(),
            ),
            (Method::GET, "/v1/spaces/shop/functions") => (
                AxumStatus::OK,
                r#"{"functions":[{"functionId":"GET-old"}]}"#.to_string(),
            ),
            (Method::POST, "/v1/spaces/shop/eventtypes") if json["name"] == "http.request" => {
                (AxumStatus::CONFLICT, "exists".to_string())
            }
            (Method::POST, _) => (AxumStatus::CREATED, "{}".to_string()),
            _ => (AxumStatus::NO_CONTENT, String::new()),
        }
    }

    async fn spawn_admin(log: Log) -> u16 {
        let app = Router::new().fallback(fake_admin).with_state(log);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        port
    }

    async fn ok(_inv: Invocation, _ctx: Context) -> std::result::Result<Reply, HandlerError> {
        Ok(Reply::empty())
    }

    #[tokio::test]
    async fn test_push_replaces_space() {
        let log: Log = Arc::default();
        let port = spawn_admin(log.clone()).await;

        let mut app = App::new();
        app.get("/cart", ok).on("order.created", ok);
        let set = SubscriptionSet::from_registrations(
            "shop",
            "http://shop:3000",
            &app.registrations().unwrap(),
        );

        EventGatewayAdmin::new(port).push("127.0.0.1", &set).await.unwrap();

        let calls: Vec<(Method, String)> = log
            .lock()
            .unwrap()
            .iter()
            .map(|(m, p, _)| (m.clone(), p.clone()))
            .collect();
        let expected = vec![
            (Method::GET, "/v1/spaces/shop/subscriptions"),
            (Method::DELETE, "/v1/spaces/shop/subscriptions/stale-sub"),
            (Method::GET, "/v1/spaces/shop/functions"),
            (Method::DELETE, "/v1/spaces/shop/functions/GET-old"),
            (Method::POST, "/v1/spaces/shop/eventtypes"),
            (Method::POST, "/v1/spaces/shop/eventtypes"),
            (Method::POST, "/v1/spaces/shop/functions"),
            (Method::POST, "/v1/spaces/shop/functions"),
            (Method::POST, "/v1/spaces/shop/subscriptions"),
            (Method::POST, "/v1/spaces/shop/subscriptions"),
        ];
        let expected: Vec<(Method, String)> =
            expected.into_iter().map(|(m, p)| (m, p.to_string())).collect();
        assert_eq!(calls, expected);

        let bodies: Vec<serde_json::Value> = log
            .lock()
            .unwrap()
            .iter()
            .map(|(_, _, b)| b.clone())
            .collect();
        assert_eq!(
            bodies[6],
            serde_json::json!({
                "functionId": "EVENT-order.created",
                "type": "http",
                "provider": { "url": "http://shop:3000/EVENT-order.created" }
            })
        );
        assert_eq!(bodies[9]["path"], "/cart");
        assert_eq!(bodies[9]["method"], "GET");
    }

    #[tokio::test]
    async fn test_push_unreachable_gateway() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let set =
            SubscriptionSet::from_registrations("shop", "http://shop:3000", &Default::default());
        let err = EventGatewayAdmin::new(port).push("127.0.0.1", &set).await.unwrap_err();
        assert!(matches!(err, BuildError::Gateway(_)));
    }
}
