//! Kubernetes DNSEntry 存储实现
//! 通过 API 服务器的 REST 接口管理 `dns.gardener.cloud/v1alpha1` DNSEntry 资源

use crate::auth::{KubeClientConfig, SecureCredential};
use crate::dns::{
    check_location, DnsEntry, DnsEntryStore, DNS_ENTRY_GROUP, DNS_ENTRY_RESOURCE, DNS_ENTRY_VERSION,
};
use crate::error::{StoreError, StoreResult};
use crate::store_error;
use reqwest::{Client, Method, StatusCode};
use url::Url;

/// Kubernetes DNSEntry 存储
#[derive(Debug, Clone)]
pub struct KubernetesDnsEntryStore {
    /// HTTP 客户端
    client: Client,
    /// API 服务器基础地址
    base_url: Url,
    /// Bearer 令牌
    token: Option<SecureCredential>,
}

impl KubernetesDnsEntryStore {
    /// 根据客户端配置创建存储
    pub fn new(config: &KubeClientConfig) -> StoreResult<Self> {
        let url = Url::parse(&config.server)
            .map_err(|e| store_error!(InvalidEndpoint, "{}: {}", config.server, e))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(store_error!(InvalidEndpoint, "不支持的协议: {}", url.scheme()));
        }
        if url.cannot_be_a_base() || url.query().is_some() || url.fragment().is_some() {
            return Err(store_error!(InvalidEndpoint, "{}", config.server));
        }

        let mut builder = Client::builder().timeout(config.timeout);

        if let Some(pem) = &config.ca_cert {
            let certificate = reqwest::Certificate::from_pem(pem)
                .map_err(|e| store_error!(InvalidEndpoint, "CA 证书无效: {}", e))?;
            builder = builder.add_root_certificate(certificate);
        }

        if config.insecure_skip_tls_verify {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder
            .build()
            .map_err(|e| store_error!(Http, "无法创建 HTTP 客户端: {}", e))?;

        Ok(Self {
            client,
            base_url: url,
            token: config.token.clone(),
        })
    }

    /// 按路径段拼接资源地址，每一段都会被编码
    fn resource_url(&self, namespace: &str, name: Option<&str>) -> StoreResult<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| store_error!(InvalidEndpoint, "{}", self.base_url))?;
            segments.pop_if_empty().extend([
                "apis",
                DNS_ENTRY_GROUP,
                DNS_ENTRY_VERSION,
                "namespaces",
                namespace,
                DNS_ENTRY_RESOURCE,
            ]);
            if let Some(name) = name {
                segments.push(name);
            }
        }
        Ok(url)
    }

    /// 资源集合地址
    fn collection_url(&self, namespace: &str) -> StoreResult<Url> {
        self.resource_url(namespace, None)
    }

    /// 单个资源地址
    fn object_url(&self, namespace: &str, name: &str) -> StoreResult<Url> {
        self.resource_url(namespace, Some(name))
    }

    /// 发送 API 请求，返回状态码与响应体
    async fn send_request(
        &self,
        method: Method,
        url: Url,
        body: Option<&DnsEntry>,
    ) -> StoreResult<(StatusCode, String)> {
        let mut request = self
            .client
            .request(method, url)
            .header("Accept", "application/json");

        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose());
        }

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        Ok((status, text))
    }

    /// 以传入的命名空间为准构造请求体
    fn with_namespace(namespace: &str, entry: &DnsEntry) -> DnsEntry {
        let mut entry = entry.clone();
        entry.metadata.namespace = namespace.to_string();
        entry
    }
}

#[async_trait::async_trait]
impl DnsEntryStore for KubernetesDnsEntryStore {
    async fn create(&self, namespace: &str, entry: &DnsEntry) -> StoreResult<()> {
        check_location(namespace, entry.name())?;
        let mut body = Self::with_namespace(namespace, entry);
        body.metadata.resource_version = None;

        let url = self.collection_url(namespace)?;
        let (status, text) = self.send_request(Method::POST, url, Some(&body)).await?;

        if status.is_success() {
            Ok(())
        } else {
            Err(StoreError::from_response(status.as_u16(), &text, namespace, entry.name()))
        }
    }

    async fn update(&self, namespace: &str, entry: &DnsEntry) -> StoreResult<()> {
        check_location(namespace, entry.name())?;
        // 自定义资源不接受无版本号的整体替换，先读取当前版本
        let current = self
            .get(namespace, entry.name())
            .await?
            .ok_or_else(|| StoreError::NotFound {
                namespace: namespace.to_string(),
                name: entry.name().to_string(),
            })?;

        let mut body = Self::with_namespace(namespace, entry);
        body.metadata.resource_version = current.metadata.resource_version;

        let url = self.object_url(namespace, entry.name())?;
        let (status, text) = self.send_request(Method::PUT, url, Some(&body)).await?;

        if status.is_success() {
            Ok(())
        } else {
            Err(StoreError::from_response(status.as_u16(), &text, namespace, entry.name()))
        }
    }

    async fn delete(&self, namespace: &str, name: &str) -> StoreResult<()> {
        check_location(namespace, name)?;
        let url = self.object_url(namespace, name)?;
        let (status, text) = self.send_request(Method::DELETE, url, None).await?;

        if status.is_success() {
            Ok(())
        } else {
            Err(StoreError::from_response(status.as_u16(), &text, namespace, name))
        }
    }

    async fn get(&self, namespace: &str, name: &str) -> StoreResult<Option<DnsEntry>> {
        check_location(namespace, name)?;
        let url = self.object_url(namespace, name)?;
        let (status, text) = self.send_request(Method::GET, url, None).await?;

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(StoreError::from_response(status.as_u16(), &text, namespace, name));
        }

        Ok(Some(serde_json::from_str(&text)?))
    }

    fn store_name(&self) -> &str {
        "Kubernetes"
    }
}
