use clap::Parser;
use std::time::Duration;

use crate::client::ReceiverMockClient;
use crate::error::Result;
use crate::tunnel::{self, PortForward, PortForwardOptions, TunnelGuard};

/// Arguments describing how integration tests reach receiver-mock.
///
/// Either a URL of an already reachable receiver-mock is given, or a tunnel
/// into the cluster is opened with `kubectl port-forward`.
#[derive(Parser, Debug, Clone)]
pub struct ReceiverMockArgs {
    /// URL of a reachable receiver-mock. When set, no tunnel is opened.
    #[arg(long = "receiver-mock-url", default_value = None)]
    pub url: Option<String>,

    /// Namespace receiver-mock is deployed to.
    #[arg(long = "receiver-mock-namespace", default_value = tunnel::DEFAULT_NAMESPACE)]
    pub namespace: String,

    /// Name of the receiver-mock service.
    #[arg(long = "receiver-mock-service", default_value = tunnel::DEFAULT_SERVICE)]
    pub service: String,

    /// Port of the receiver-mock service.
    #[arg(long = "receiver-mock-port", default_value_t = tunnel::DEFAULT_REMOTE_PORT)]
    pub port: u16,

    /// Path to the kubeconfig used by `kubectl port-forward`.
    #[arg(long = "kubeconfig", default_value = None)]
    pub kubeconfig: Option<String>,

    /// Kubeconfig context used by `kubectl port-forward`.
    #[arg(long = "kube-context", default_value = None)]
    pub context: Option<String>,

    /// Seconds to wait for the tunnel to accept connections.
    #[arg(long = "tunnel-timeout-secs", default_value_t = 30)]
    pub tunnel_timeout_secs: u64,
}

impl Default for ReceiverMockArgs {
    fn default() -> Self {
        Self {
            url: None,
            namespace: tunnel::DEFAULT_NAMESPACE.to_string(),
            service: tunnel::DEFAULT_SERVICE.to_string(),
            port: tunnel::DEFAULT_REMOTE_PORT,
            kubeconfig: None,
            context: None,
            tunnel_timeout_secs: 30,
        }
    }
}

impl ReceiverMockArgs {
    pub fn port_forward_options(&self) -> PortForwardOptions {
        PortForwardOptions {
            namespace: self.namespace.clone(),
            service: self.service.clone(),
            remote_port: self.port,
            kubeconfig: self.kubeconfig.clone(),
            context: self.context.clone(),
            timeout: Duration::from_secs(self.tunnel_timeout_secs),
        }
    }

    /// Creates a client for receiver-mock, opening a tunnel when no URL was
    /// supplied. The returned guard, if any, must be kept alive while the
    /// client is in use.
    pub fn connect(&self) -> Result<(ReceiverMockClient, Option<TunnelGuard<PortForward>>)> {
        match &self.url {
            Some(url) => {
                log::debug!("Using supplied receiver-mock url {}", url);
                Ok((ReceiverMockClient::from_address(url)?, None))
            }
            None => {
                log::debug!(
                    "No receiver-mock url supplied, forwarding to service/{} in namespace {}",
                    self.service,
                    self.namespace
                );
                let forward = PortForward::open(&self.port_forward_options())?;
                let (client, guard) = ReceiverMockClient::with_tunnel(forward)?;
                Ok((client, Some(guard)))
            }
        }
    }
}
