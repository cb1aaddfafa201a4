//! MAAS REST API client.
//!
//! Talks to the MAAS 2.0 API with OAuth 1.0 PLAINTEXT signing. Operations
//! that MAAS exposes as `?op=` actions are sent as form-encoded POSTs.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;

use crate::core::split_api_key;

use super::client::{
    BackendError, BackendResult, MachineClient, NetworkClient, RaidClient, StorageClient,
    TagClient, VolumeGroupClient,
};
use super::types::{
    AllocateRequest, BlockDevice, DeployRequest, Fabric, Machine, MachineFilter, NewTag,
    PowerOffRequest, PowerState, Raid, ReleaseRequest, Subnet, SubnetFilter, Tag, VolumeGroup,
    Vlan,
};

const API_PREFIX: &str = "api/2.0";

/// OAuth credentials parsed from a `consumer:token:secret` API key.
#[derive(Clone)]
struct Credentials {
    consumer_key: String,
    token_key: String,
    token_secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("consumer_key", &self.consumer_key)
            .field("token_key", &"<redacted>")
            .field("token_secret", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    fn parse(api_key: &str) -> BackendResult<Self> {
        let (consumer, token, secret) = split_api_key(api_key).ok_or_else(|| {
            BackendError::Config("API key must have the form consumer:token:secret".to_string())
        })?;
        Ok(Self {
            consumer_key: consumer.to_string(),
            token_key: token.to_string(),
            token_secret: secret.to_string(),
        })
    }

    fn authorization_header(&self) -> String {
        let nonce = uuid::Uuid::new_v4().simple().to_string();
        let timestamp = chrono::Utc::now().timestamp();
        let signature = urlencoding::encode(&format!("&{}", self.token_secret)).into_owned();

        format!(
            "OAuth oauth_version=\"1.0\", oauth_signature_method=\"PLAINTEXT\", \
             oauth_consumer_key=\"{}\", oauth_token=\"{}\", oauth_signature=\"{}\", \
             oauth_nonce=\"{}\", oauth_timestamp=\"{}\"",
            self.consumer_key, self.token_key, signature, nonce, timestamp
        )
    }
}

/// MAAS API client.
#[derive(Debug, Clone)]
pub struct MaasClient {
    /// API root, always ending in `/api/2.0/`
    api_root: String,
    /// OAuth credentials
    credentials: Credentials,
    /// HTTP client
    client: Client,
}

impl MaasClient {
    /// Create a client for the MAAS server at `base_url`
    /// (e.g. `http://maas.local:5240/MAAS`).
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> BackendResult<Self> {
        let credentials = Credentials::parse(api_key)?;
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { api_root: api_root(base_url)?, credentials, client })
    }

    /// Build from the `[maas]` config section.
    pub fn from_config(config: &crate::core::MaasConfig) -> BackendResult<Self> {
        let url = config
            .api_url
            .as_deref()
            .ok_or_else(|| BackendError::Config("maas.api_url is not set".to_string()))?;
        let key = config
            .api_key
            .as_deref()
            .ok_or_else(|| BackendError::Config("maas.api_key is not set".to_string()))?;
        Self::new(url, key, Duration::from_secs(config.timeout_secs))
    }

    /// The resolved API root.
    pub fn api_root(&self) -> &str {
        &self.api_root
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.api_root, path.trim_start_matches('/'));
        tracing::debug!(%method, %url, "MAAS request");
        self.client
            .request(method, url)
            .header("Authorization", self.credentials.authorization_header())
            .header("Accept", "application/json")
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder, what: &str) -> BackendResult<T> {
        let response = builder.send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(BackendError::NotFound(what.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status { status: status.as_u16(), body });
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)], what: &str) -> BackendResult<T> {
        self.send(self.request(Method::GET, path).query(query), what).await
    }

    async fn op<T: DeserializeOwned>(
        &self,
        path: &str,
        op: &str,
        form: &[(&str, String)],
        what: &str,
    ) -> BackendResult<T> {
        let builder = self.request(Method::POST, path).query(&[("op", op)]).form(form);
        self.send(builder, what).await
    }

    async fn op_ignore_body(&self, path: &str, op: &str, form: &[(&str, String)], what: &str) -> BackendResult<()> {
        let _: serde_json::Value = self.op(path, op, form, what).await?;
        Ok(())
    }
}

/// Normalize a configured URL into the `/api/2.0/` root.
fn api_root(base_url: &str) -> BackendResult<String> {
    let trimmed = base_url.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(BackendError::Config(format!("unsupported MAAS URL: {base_url}")));
    }
    let root = trimmed.strip_suffix(API_PREFIX).map_or_else(
        || format!("{trimmed}/{API_PREFIX}/"),
        |stripped| format!("{stripped}{API_PREFIX}/"),
    );
    Ok(root)
}

// Caller-supplied identifiers are always encoded as a single path segment.
fn machine_path(system_id: &str) -> String {
    format!("machines/{}/", urlencoding::encode(system_id))
}

fn node_path(system_id: &str, collection: &str) -> String {
    format!("nodes/{}/{collection}/", urlencoding::encode(system_id))
}

fn tag_path(name: &str) -> String {
    format!("tags/{}/", urlencoding::encode(name))
}

fn push_opt(form: &mut Vec<(&'static str, String)>, key: &'static str, value: Option<&str>) {
    if let Some(value) = value {
        form.push((key, value.to_string()));
    }
}

#[async_trait]
impl MachineClient for MaasClient {
    async fn list_machines(&self, filter: &MachineFilter) -> BackendResult<Vec<Machine>> {
        let mut query = Vec::new();
        push_opt(&mut query, "hostname", filter.hostname.as_deref());
        push_opt(&mut query, "zone", filter.zone.as_deref());
        push_opt(&mut query, "pool", filter.pool.as_deref());
        for tag in &filter.tags {
            query.push(("tags", tag.clone()));
        }

        let machines: Vec<Machine> = self.get("machines/", &query, "machines").await?;
        Ok(filter.apply(machines))
    }

    async fn get_machine(&self, system_id: &str) -> BackendResult<Machine> {
        self.get(&machine_path(system_id), &[], &format!("machine {system_id}")).await
    }

    async fn allocate_machine(&self, request: &AllocateRequest) -> BackendResult<Machine> {
        let mut form = Vec::new();
        push_opt(&mut form, "name", request.name.as_deref());
        push_opt(&mut form, "zone", request.zone.as_deref());
        push_opt(&mut form, "pool", request.pool.as_deref());
        push_opt(&mut form, "arch", request.arch.as_deref());
        push_opt(&mut form, "comment", request.comment.as_deref());
        if let Some(cpus) = request.min_cpu_count {
            form.push(("cpu_count", cpus.to_string()));
        }
        if let Some(mem) = request.min_memory {
            form.push(("mem", mem.to_string()));
        }
        for tag in &request.tags {
            form.push(("tags", tag.clone()));
        }

        match self.op("machines/", "allocate", &form, "allocatable machine").await {
            // MAAS answers 409 when nothing matches the constraints
            Err(BackendError::Status { status: 409, body }) => {
                Err(BackendError::NotFound(format!("no machine matches the constraints: {body}")))
            }
            other => other,
        }
    }

    async fn deploy_machine(&self, system_id: &str, request: &DeployRequest) -> BackendResult<Machine> {
        let mut form = Vec::new();
        push_opt(&mut form, "distro_series", request.distro_series.as_deref());
        push_opt(&mut form, "hwe_kernel", request.hwe_kernel.as_deref());
        push_opt(&mut form, "user_data", request.user_data.as_deref());
        push_opt(&mut form, "comment", request.comment.as_deref());
        self.op(&machine_path(system_id), "deploy", &form, &format!("machine {system_id}"))
            .await
    }

    async fn release_machine(&self, system_id: &str, request: &ReleaseRequest) -> BackendResult<Machine> {
        let mut form = vec![("erase", request.erase.to_string())];
        if request.quick_erase {
            form.push(("quick_erase", "true".to_string()));
        }
        push_opt(&mut form, "comment", request.comment.as_deref());
        self.op(&machine_path(system_id), "release", &form, &format!("machine {system_id}"))
            .await
    }

    async fn power_state(&self, system_id: &str) -> BackendResult<PowerState> {
        let query = [("op", "query_power_state".to_string())];
        self.get(&machine_path(system_id), &query, &format!("machine {system_id}")).await
    }

    async fn power_on(&self, system_id: &str, comment: Option<&str>) -> BackendResult<Machine> {
        let mut form = Vec::new();
        push_opt(&mut form, "comment", comment);
        self.op(&machine_path(system_id), "power_on", &form, &format!("machine {system_id}"))
            .await
    }

    async fn power_off(&self, system_id: &str, request: &PowerOffRequest) -> BackendResult<Machine> {
        let mut form = Vec::new();
        push_opt(&mut form, "stop_mode", request.stop_mode.as_deref());
        push_opt(&mut form, "comment", request.comment.as_deref());
        self.op(&machine_path(system_id), "power_off", &form, &format!("machine {system_id}"))
            .await
    }
}

#[async_trait]
impl NetworkClient for MaasClient {
    async fn list_subnets(&self, filter: &SubnetFilter) -> BackendResult<Vec<Subnet>> {
        let subnets: Vec<Subnet> = self.get("subnets/", &[], "subnets").await?;
        Ok(subnets.into_iter().filter(|s| filter.matches(s)).collect())
    }

    async fn get_subnet(&self, id: i64) -> BackendResult<Subnet> {
        self.get(&format!("subnets/{id}/"), &[], &format!("subnet {id}")).await
    }

    async fn list_fabrics(&self) -> BackendResult<Vec<Fabric>> {
        self.get("fabrics/", &[], "fabrics").await
    }

    async fn list_vlans(&self, fabric_id: i64) -> BackendResult<Vec<Vlan>> {
        self.get(&format!("fabrics/{fabric_id}/vlans/"), &[], &format!("fabric {fabric_id}")).await
    }
}

#[async_trait]
impl TagClient for MaasClient {
    async fn list_tags(&self) -> BackendResult<Vec<Tag>> {
        self.get("tags/", &[], "tags").await
    }

    async fn get_tag(&self, name: &str) -> BackendResult<Tag> {
        self.get(&tag_path(name), &[], &format!("tag {name}")).await
    }

    async fn create_tag(&self, tag: &NewTag) -> BackendResult<Tag> {
        let mut form = vec![("name", tag.name.clone())];
        push_opt(&mut form, "comment", tag.comment.as_deref());
        push_opt(&mut form, "definition", tag.definition.as_deref());
        push_opt(&mut form, "kernel_opts", tag.kernel_opts.as_deref());

        let builder = self.request(Method::POST, "tags/").form(&form);
        match self.send(builder, "tags").await {
            Err(BackendError::Status { status: 400, body }) => Err(BackendError::InvalidRequest(body)),
            other => other,
        }
    }

    async fn add_tag_to_machines(&self, tag: &str, system_ids: &[String]) -> BackendResult<()> {
        let form: Vec<_> = system_ids.iter().map(|id| ("add", id.clone())).collect();
        let path = tag_path(tag);
        self.op_ignore_body(&path, "update_nodes", &form, &format!("tag {tag}")).await
    }

    async fn remove_tag_from_machines(&self, tag: &str, system_ids: &[String]) -> BackendResult<()> {
        let form: Vec<_> = system_ids.iter().map(|id| ("remove", id.clone())).collect();
        let path = tag_path(tag);
        self.op_ignore_body(&path, "update_nodes", &form, &format!("tag {tag}")).await
    }

    async fn tagged_machines(&self, tag: &str) -> BackendResult<Vec<Machine>> {
        let query = [("op", "machines".to_string())];
        self.get(&tag_path(tag), &query, &format!("tag {tag}")).await
    }
}

#[async_trait]
impl StorageClient for MaasClient {
    async fn list_block_devices(&self, system_id: &str) -> BackendResult<Vec<BlockDevice>> {
        self.get(&node_path(system_id, "blockdevices"), &[], &format!("machine {system_id}"))
            .await
    }
}

#[async_trait]
impl VolumeGroupClient for MaasClient {
    async fn list_volume_groups(&self, system_id: &str) -> BackendResult<Vec<VolumeGroup>> {
        self.get(&node_path(system_id, "volume-groups"), &[], &format!("machine {system_id}"))
            .await
    }
}

#[async_trait]
impl RaidClient for MaasClient {
    async fn list_raids(&self, system_id: &str) -> BackendResult<Vec<Raid>> {
        self.get(&node_path(system_id, "raids"), &[], &format!("machine {system_id}")).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_root_normalization() {
        assert_eq!(api_root("http://maas:5240/MAAS").unwrap(), "http://maas:5240/MAAS/api/2.0/");
        assert_eq!(api_root("http://maas:5240/MAAS/").unwrap(), "http://maas:5240/MAAS/api/2.0/");
        assert_eq!(
            api_root("https://maas/MAAS/api/2.0/").unwrap(),
            "https://maas/MAAS/api/2.0/"
        );
        assert!(api_root("maas:5240").is_err());
    }

    #[test]
    fn test_credentials_parse() {
        assert!(Credentials::parse("c:t:s").is_ok());
        assert!(Credentials::parse("c:t").is_err());
        assert!(Credentials::parse("c::s").is_err());

        let colon = Credentials::parse("c:t:s:x").unwrap();
        assert_eq!(colon.token_secret, "s:x");
    }

    #[test]
    fn test_identifiers_stay_inside_one_path_segment() {
        assert_eq!(machine_path("abc/../../users"), "machines/abc%2F..%2F..%2Fusers/");
        assert_eq!(machine_path("x?op=release"), "machines/x%3Fop%3Drelease/");
        assert_eq!(node_path("a/b", "raids"), "nodes/a%2Fb/raids/");
        assert_eq!(tag_path("gpu fast"), "tags/gpu%20fast/");
        assert_eq!(machine_path("4y3h7n"), "machines/4y3h7n/");
    }

    #[test]
    fn test_authorization_header() {
        let creds = Credentials::parse("consumer:token:se&cret").unwrap();
        let header = creds.authorization_header();

        assert!(header.starts_with("OAuth "));
        assert!(header.contains("oauth_signature_method=\"PLAINTEXT\""));
        assert!(header.contains("oauth_consumer_key=\"consumer\""));
        assert!(header.contains("oauth_token=\"token\""));
        assert!(header.contains("oauth_signature=\"%26se%26cret\""));
    }

    #[test]
    fn test_credentials_debug_redacts_secret() {
        let creds = Credentials::parse("consumer:token:secret").unwrap();
        let debug = format!("{:?}", creds);
        assert!(!debug.contains("secret\""));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_client_from_config() {
        let config = crate::core::MaasConfig {
            api_url: Some("http://maas.local:5240/MAAS".into()),
            api_key: Some("a:b:c".into()),
            ..Default::default()
        };
        let client = MaasClient::from_config(&config).unwrap();
        assert_eq!(client.api_root(), "http://maas.local:5240/MAAS/api/2.0/");

        let missing = crate::core::MaasConfig::default();
        assert!(matches!(MaasClient::from_config(&missing), Err(BackendError::Config(_))));
    }
}
