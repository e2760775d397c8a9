//! 日志广播器实现
//!
//! 有界环形缓冲区 + 动态订阅者集合。每条日志先写入缓冲区，再同步推送给
//! 所有在线订阅者；新订阅者在注册的同一临界区内拿到历史快照，保证
//! "先回放、后实时" 无缺口、无重复。

use crate::logs::entry::{LogEntry, LogLevel};
use futures::Stream;
use std::collections::{HashMap, VecDeque};
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use uuid::Uuid;

/// 默认缓冲区容量
pub const DEFAULT_LOG_CAPACITY: usize = 200;

/// 控制台日志的 tracing target
pub const CONSOLE_TARGET: &str = "keep_alive::console";

/// 广播器内部状态，始终在同一把锁下修改
#[derive(Debug)]
struct BroadcasterInner {
    /// 历史日志，按记录顺序排列
    buffer: VecDeque<LogEntry>,
    /// 在线订阅者
    subscribers: HashMap<Uuid, mpsc::UnboundedSender<LogEntry>>,
}

/// 日志广播器
#[derive(Debug)]
pub struct LogBroadcaster {
    /// 缓冲区容量
    capacity: usize,
    /// 共享状态
    inner: Mutex<BroadcasterInner>,
}

impl LogBroadcaster {
    /// 创建新的日志广播器
    ///
    /// # 参数
    /// * `capacity` - 缓冲区容量，至少为 1
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            inner: Mutex::new(BroadcasterInner {
                buffer: VecDeque::with_capacity(capacity),
                subscribers: HashMap::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BroadcasterInner> {
        // 临界区内没有可能 panic 的用户代码，中毒时直接沿用内部数据
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 记录一条日志
    ///
    /// 追加到缓冲区（满时淘汰最旧条目），并推送给所有订阅者。
    /// 已断开的订阅者在推送失败时被移除，不影响其他订阅者，也不向调用方报错。
    ///
    /// # 返回
    /// * `LogEntry` - 已记录的条目副本
    pub fn record(&self, level: LogLevel, message: impl Into<String>) -> LogEntry {
        let message = message.into();

        // 时间戳在临界区内生成，缓冲区顺序与 ts 顺序一致
        let entry = {
            let mut inner = self.lock();
            let entry = LogEntry::new(level, message);
            if inner.buffer.len() == self.capacity {
                inner.buffer.pop_front();
            }
            inner.buffer.push_back(entry.clone());
            inner
                .subscribers
                .retain(|_, sender| sender.send(entry.clone()).is_ok());
            entry
        };

        mirror_to_tracing(&entry);
        entry
    }

    /// 注册新订阅者
    ///
    /// 历史快照与注册在同一临界区内完成：快照包含注册前的全部条目，
    /// 订阅通道接收注册之后的全部条目。
    ///
    /// # 返回
    /// * `(Vec<LogEntry>, Subscription)` - 历史快照（旧到新）与实时订阅
    pub fn subscribe(self: &Arc<Self>) -> (Vec<LogEntry>, Subscription) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();

        let history = {
            let mut inner = self.lock();
            inner.subscribers.insert(id, sender);
            inner.buffer.iter().cloned().collect()
        };

        tracing::debug!("日志订阅者已连接: {}", id);

        let subscription = Subscription {
            id,
            receiver,
            broadcaster: Arc::downgrade(self),
        };
        (history, subscription)
    }

    /// 移除订阅者，可重复调用
    pub fn unsubscribe(&self, id: Uuid) {
        if self.lock().subscribers.remove(&id).is_some() {
            tracing::debug!("日志订阅者已断开: {}", id);
        }
    }

    /// 获取最近 `n` 条日志（旧到新）
    pub fn recent_snapshot(&self, n: usize) -> Vec<LogEntry> {
        let inner = self.lock();
        let skip = inner.buffer.len().saturating_sub(n);
        inner.buffer.iter().skip(skip).cloned().collect()
    }

    /// 当前缓冲条目数
    pub fn len(&self) -> usize {
        self.lock().buffer.len()
    }

    /// 缓冲区是否为空
    pub fn is_empty(&self) -> bool {
        self.lock().buffer.is_empty()
    }

    /// 缓冲区容量
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 在线订阅者数量
    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    /// 便捷方法
    pub fn info(&self, message: impl Into<String>) -> LogEntry {
        self.record(LogLevel::Info, message)
    }

    pub fn warn(&self, message: impl Into<String>) -> LogEntry {
        self.record(LogLevel::Warn, message)
    }

    pub fn error(&self, message: impl Into<String>) -> LogEntry {
        self.record(LogLevel::Error, message)
    }

    pub fn debug(&self, message: impl Into<String>) -> LogEntry {
        self.record(LogLevel::Debug, message)
    }
}

impl Default for LogBroadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

/// 将控制台日志同步输出到进程日志
fn mirror_to_tracing(entry: &LogEntry) {
    match entry.level {
        LogLevel::Trace => tracing::trace!(target: CONSOLE_TARGET, "{}", entry.msg),
        LogLevel::Debug => tracing::debug!(target: CONSOLE_TARGET, "{}", entry.msg),
        LogLevel::Info => tracing::info!(target: CONSOLE_TARGET, "{}", entry.msg),
        LogLevel::Warn => tracing::warn!(target: CONSOLE_TARGET, "{}", entry.msg),
        LogLevel::Error => tracing::error!(target: CONSOLE_TARGET, "{}", entry.msg),
    }
}

/// 实时日志订阅，drop 时自动退订
#[derive(Debug)]
pub struct Subscription {
    id: Uuid,
    receiver: mpsc::UnboundedReceiver<LogEntry>,
    broadcaster: Weak<LogBroadcaster>,
}

impl Subscription {
    /// 订阅者ID
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// 等待下一条日志；广播器已销毁时返回 None
    pub async fn recv(&mut self) -> Option<LogEntry> {
        self.receiver.recv().await
    }

    /// 非阻塞读取下一条日志
    pub fn try_recv(&mut self) -> Option<LogEntry> {
        self.receiver.try_recv().ok()
    }
}

impl Stream for Subscription {
    type Item = LogEntry;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(broadcaster) = self.broadcaster.upgrade() {
            broadcaster.unsubscribe(self.id);
        }
    }
}
