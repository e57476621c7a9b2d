//! 内存 DNSEntry 存储
//! 用于演练模式与测试，语义与 Kubernetes 存储一致：
//! 重复创建返回已存在，更新或删除缺失对象返回不存在

use crate::dns::{check_location, DnsEntry, DnsEntryStore};
use crate::error::{StoreError, StoreResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// 存储操作类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    Create,
    Update,
    Delete,
    Get,
}

/// 操作计数
#[derive(Debug, Default)]
struct OperationCounters {
    create: AtomicU64,
    update: AtomicU64,
    delete: AtomicU64,
    get: AtomicU64,
}

impl OperationCounters {
    fn counter(&self, operation: StoreOperation) -> &AtomicU64 {
        match operation {
            StoreOperation::Create => &self.create,
            StoreOperation::Update => &self.update,
            StoreOperation::Delete => &self.delete,
            StoreOperation::Get => &self.get,
        }
    }
}

/// 内存 DNSEntry 存储
#[derive(Debug, Default)]
pub struct MemoryDnsEntryStore {
    /// (命名空间, 名称) -> 对象
    entries: RwLock<HashMap<(String, String), DnsEntry>>,
    /// 注入的失败
    failures: RwLock<HashMap<StoreOperation, StoreError>>,
    counters: OperationCounters,
    /// 版本号生成器
    revision: AtomicU64,
}

impl MemoryDnsEntryStore {
    /// 创建空存储
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置对象（不计入操作次数）
    pub async fn with_entry(self, entry: DnsEntry) -> Self {
        let key = (entry.namespace().to_string(), entry.name().to_string());
        let entry = self.stamp(entry);
        self.entries.write().await.insert(key, entry);
        self
    }

    /// 让指定操作此后一直返回给定错误
    pub async fn fail_on(&self, operation: StoreOperation, error: StoreError) {
        self.failures.write().await.insert(operation, error);
    }

    /// 清除注入的失败
    pub async fn clear_failure(&self, operation: StoreOperation) {
        self.failures.write().await.remove(&operation);
    }

    /// 某个操作被调用的次数（包括失败的调用）
    pub fn calls(&self, operation: StoreOperation) -> u64 {
        self.counters.counter(operation).load(Ordering::SeqCst)
    }

    /// 所有操作的调用总次数
    pub fn total_calls(&self) -> u64 {
        [
            StoreOperation::Create,
            StoreOperation::Update,
            StoreOperation::Delete,
            StoreOperation::Get,
        ]
        .into_iter()
        .map(|op| self.calls(op))
        .sum()
    }

    /// 直接读取对象（不计入操作次数）
    pub async fn entry(&self, namespace: &str, name: &str) -> Option<DnsEntry> {
        self.entries
            .read()
            .await
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    /// 当前对象数量
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// 是否为空
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// 所有对象的快照
    pub async fn entries(&self) -> Vec<DnsEntry> {
        let mut entries: Vec<DnsEntry> = self.entries.read().await.values().cloned().collect();
        entries.sort_by(|a, b| (a.namespace(), a.name()).cmp(&(b.namespace(), b.name())));
        entries
    }

    /// 计数并检查注入的失败
    async fn begin(&self, operation: StoreOperation) -> StoreResult<()> {
        self.counters.counter(operation).fetch_add(1, Ordering::SeqCst);
        match self.failures.read().await.get(&operation) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn stamp(&self, mut entry: DnsEntry) -> DnsEntry {
        let revision = self.revision.fetch_add(1, Ordering::SeqCst) + 1;
        entry.metadata.resource_version = Some(revision.to_string());
        entry
    }
}

#[async_trait::async_trait]
impl DnsEntryStore for MemoryDnsEntryStore {
    async fn create(&self, namespace: &str, entry: &DnsEntry) -> StoreResult<()> {
        self.begin(StoreOperation::Create).await?;
        check_location(namespace, entry.name())?;

        let key = (namespace.to_string(), entry.name().to_string());
        let mut entries = self.entries.write().await;
        if entries.contains_key(&key) {
            return Err(StoreError::AlreadyExists {
                namespace: key.0,
                name: key.1,
            });
        }

        let mut entry = entry.clone();
        entry.metadata.namespace = namespace.to_string();
        entries.insert(key, self.stamp(entry));
        Ok(())
    }

    async fn update(&self, namespace: &str, entry: &DnsEntry) -> StoreResult<()> {
        self.begin(StoreOperation::Update).await?;
        check_location(namespace, entry.name())?;

        let key = (namespace.to_string(), entry.name().to_string());
        let mut entries = self.entries.write().await;
        if !entries.contains_key(&key) {
            return Err(StoreError::NotFound {
                namespace: key.0,
                name: key.1,
            });
        }

        let mut entry = entry.clone();
        entry.metadata.namespace = namespace.to_string();
        entries.insert(key, self.stamp(entry));
        Ok(())
    }

    async fn delete(&self, namespace: &str, name: &str) -> StoreResult<()> {
        self.begin(StoreOperation::Delete).await?;
        check_location(namespace, name)?;

        let key = (namespace.to_string(), name.to_string());
        match self.entries.write().await.remove(&key) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound {
                namespace: key.0,
                name: key.1,
            }),
        }
    }

    async fn get(&self, namespace: &str, name: &str) -> StoreResult<Option<DnsEntry>> {
        self.begin(StoreOperation::Get).await?;
        check_location(namespace, name)?;
        Ok(self.entry(namespace, name).await)
    }

    fn store_name(&self) -> &str {
        "Memory"
    }
}
