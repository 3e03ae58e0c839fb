// Client creation with custom user-agent support for kube 2.x
use crate::error::Result;
use hyper::http::{HeaderName, HeaderValue};
use kube::{Client, Config};

/// Default user agent - automatically uses the package version
pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Create a new k8s client to interact with the cluster hosting the OME operator
///
/// # Errors
///
/// Will return `Err` if no usable kubeconfig or in-cluster config can be inferred
pub async fn new(custom_user_agent: Option<&str>) -> Result<Client> {
    let mut config = Config::infer().await?;

    // Set custom user-agent header if provided. This helps identify
    // informer traffic in apiserver audit logs. An invalid header value
    // falls back to the default user-agent.
    if let Some(user_agent) = custom_user_agent {
        if let Ok(header_value) = HeaderValue::from_str(user_agent) {
            config
                .headers
                .push((HeaderName::from_static("user-agent"), header_value));
        }
    }

    let client = Client::try_from(config)?;

    Ok(client)
}
