//! Tunnels giving test code access to a receiver-mock running inside a
//! Kubernetes cluster.

use std::net::{SocketAddr, TcpListener, TcpStream};
use std::ops::Deref;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

pub const DEFAULT_NAMESPACE: &str = "receiver-mock";
pub const DEFAULT_SERVICE: &str = "receiver-mock";
pub const DEFAULT_REMOTE_PORT: u16 = 3000;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const CONNECT_TIMEOUT: Duration = Duration::from_millis(500);

/// A forwarded connection to a service.
pub trait Tunnel {
    /// The `host:port` the tunnel is reachable at.
    fn endpoint(&self) -> String;

    /// Tears the tunnel down. May be called more than once.
    fn close(&mut self);
}

/// Owns a [`Tunnel`] and closes it on drop.
#[derive(Debug)]
pub struct TunnelGuard<T: Tunnel> {
    tunnel: T,
    closed: bool,
}

impl<T: Tunnel> TunnelGuard<T> {
    pub fn new(tunnel: T) -> Self {
        Self {
            tunnel,
            closed: false,
        }
    }

    /// Closes the tunnel now instead of waiting for the guard to be dropped.
    pub fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.tunnel.close();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl<T: Tunnel> Deref for TunnelGuard<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.tunnel
    }
}

impl<T: Tunnel> Drop for TunnelGuard<T> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Where and how to open a [`PortForward`].
#[derive(Debug, Clone)]
pub struct PortForwardOptions {
    pub namespace: String,
    pub service: String,
    pub remote_port: u16,
    pub kubeconfig: Option<String>,
    pub context: Option<String>,
    /// How long to wait for the forward to accept connections.
    pub timeout: Duration,
}

impl Default for PortForwardOptions {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            service: DEFAULT_SERVICE.to_string(),
            remote_port: DEFAULT_REMOTE_PORT,
            kubeconfig: None,
            context: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl PortForwardOptions {
    fn kubectl_args(&self, local_port: u16) -> Vec<String> {
        let mut args = vec!["port-forward".to_string()];
        if let Some(kubeconfig) = &self.kubeconfig {
            args.push(format!("--kubeconfig={}", kubeconfig));
        }
        if let Some(context) = &self.context {
            args.push(format!("--context={}", context));
        }
        args.extend([
            "--namespace".to_string(),
            self.namespace.clone(),
            format!("service/{}", self.service),
            format!("{}:{}", local_port, self.remote_port),
        ]);
        args
    }
}

/// A `kubectl port-forward` to a service, listening on a free local port.
#[derive(Debug)]
pub struct PortForward {
    child: Option<Child>,
    local_port: u16,
}

impl PortForward {
    /// Starts `kubectl port-forward` and waits until the local end accepts
    /// connections.
    pub fn open(options: &PortForwardOptions) -> Result<Self> {
        let local_port = get_available_port()?;
        let args = options.kubectl_args(local_port);
        log::info!("Starting kubectl {}", args.join(" "));

        let child = Command::new("kubectl")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::Tunnel {
                message: "could not start kubectl".to_string(),
                source: Some(e),
            })?;

        // from here on dropping `forward` kills kubectl
        let mut forward = PortForward {
            child: Some(child),
            local_port,
        };
        forward.wait_until_ready(options.timeout)?;
        log::info!(
            "Forwarding 127.0.0.1:{} to service/{} in namespace {}",
            local_port,
            options.service,
            options.namespace
        );
        Ok(forward)
    }

    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    fn wait_until_ready(&mut self, timeout: Duration) -> Result<()> {
        let addr = SocketAddr::from(([127, 0, 0, 1], self.local_port));
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(child) = self.child.as_mut() {
                if let Some(status) = child.try_wait()? {
                    self.child = None;
                    return Err(Error::Tunnel {
                        message: format!("kubectl port-forward exited early with {}", status),
                        source: None,
                    });
                }
            }
            if TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT).is_ok() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                self.close();
                return Err(Error::Tunnel {
                    message: format!("port-forward on {} not ready after {:?}", addr, timeout),
                    source: None,
                });
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

impl Tunnel for PortForward {
    fn endpoint(&self) -> String {
        format!("127.0.0.1:{}", self.local_port)
    }

    fn close(&mut self) {
        if let Some(mut child) = self.child.take() {
            log::debug!("Stopping port-forward on 127.0.0.1:{}", self.local_port);
            if let Err(e) = child.kill() {
                log::warn!("Could not kill kubectl port-forward: {}", e);
            }
            if let Err(e) = child.wait() {
                log::warn!("Could not reap kubectl port-forward: {}", e);
            }
        }
    }
}

impl Drop for PortForward {
    fn drop(&mut self) {
        self.close();
    }
}

/// Get an available port on localhost.
pub(crate) fn get_available_port() -> Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}
