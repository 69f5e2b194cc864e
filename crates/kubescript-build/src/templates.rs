//! Bundled manifest and Dockerfile templates

/// A template shipped inside the build crate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Template {
    /// Service mesh control plane
    Conduit,
    /// Coordination store backing the gateway
    Etcd,
    /// Event gateway deployment and load balancer
    EventGateway,
    /// Application deployment (patched)
    AppDeployment,
    /// Application service (patched)
    AppService,
    /// Container build recipe
    Dockerfile,
}

impl Template {
    /// Infrastructure templates, in apply order
    pub const INFRASTRUCTURE: [Template; 3] =
        [Template::Conduit, Template::Etcd, Template::EventGateway];

    /// Template contents
    pub fn source(self) -> &'static str {
        match self {
            Template::Conduit => include_str!("../templates/conduit.yaml"),
            Template::Etcd => include_str!("../templates/etcd.yaml"),
            Template::EventGateway => include_str!("../templates/event-gateway.yaml"),
            Template::AppDeployment => include_str!("../templates/base.yaml"),
            Template::AppService => include_str!("../templates/base.service.yaml"),
            Template::Dockerfile => include_str!("../templates/Dockerfile"),
        }
    }

    /// File name of the materialised artifact in the output directory
    pub fn artifact_name(self) -> &'static str {
        match self {
            Template::Conduit => "conduit.yaml",
            Template::Etcd => "etcd.yaml",
            Template::EventGateway => "event-gateway.yaml",
            Template::AppDeployment => "app.yaml",
            Template::AppService => "app.service.yaml",
            Template::Dockerfile => "Dockerfile",
        }
    }
}
