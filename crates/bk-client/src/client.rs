//! 客户端门面，也是连接状态机、完成表与响应路由器之间的胶水层。
//!
//! # 体系定位（Architecture）
//! 读取循环与写入路径都放在这里，因为两者都需要通过 `Arc<Core<Ctx>>`
//! 触达其余每一个组件。

use crate::completion::{AddCallback, CompletionTable, PendingOp, ReadCallback};
use crate::error::ClientError;
use crate::ordered_executor::TokioOrderedExecutor;
use crate::router;
use crate::state::{ConnectOutcome, ConnectionState};
use crate::sweeper;
use bk_proto::{
    ClientErrorKind, MetricsSink, NoopMetricsSink, OrderedExecutor, PeerAddress, PeerClientConfig,
    Transport, TransportFactory, TxnIdGenerator,
};
use bytes::{Bytes, BytesMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

pub(crate) struct Core<Ctx> {
    pub(crate) addr: PeerAddress,
    pub(crate) config: PeerClientConfig,
    factory: Arc<dyn TransportFactory>,
    pub(crate) executor: Arc<dyn OrderedExecutor>,
    pub(crate) metrics: Arc<dyn MetricsSink>,
    txn_gen: TxnIdGenerator,
    state: ConnectionState,
    pub(crate) completions: CompletionTable<Ctx>,
    closed: AtomicBool,
    sweeper_handle: AsyncMutex<Option<JoinHandle<()>>>,
}

impl<Ctx: Send + 'static> Core<Ctx> {
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_connected(self: &Arc<Self>, op: Box<dyn FnOnce(ConnectOutcome) + Send>) {
        if let Some(transport) = self.state.fast_path() {
            op(ConnectOutcome::Ready(transport));
            return;
        }
        if self.state.enqueue_and_should_connect(op) {
            let core = Arc::clone(self);
            tokio::spawn(async move {
                core.attempt_connect().await;
            });
        }
    }

    #[instrument(skip(self), fields(peer = %self.addr))]
    async fn attempt_connect(self: Arc<Self>) {
        match self.factory.connect(self.addr, &self.config).await {
            Ok(boxed) => {
                let transport: Arc<dyn Transport> = Arc::from(boxed);
                self.state.on_connect_success(Arc::clone(&transport));
                spawn_reader(Arc::clone(&self), transport);
            }
            Err(err) => {
                warn!(error = %err, "connect attempt failed");
                self.state.on_connect_failure();
            }
        }
    }

    pub(crate) fn fail_pending(
        self: &Arc<Self>,
        txn_id: bk_proto::TxnId,
        pending: PendingOp<Ctx>,
        kind: ClientErrorKind,
    ) {
        router::error_out(txn_id, pending, kind, self.addr, &self.executor, &self.metrics);
    }

    fn handle_disconnect(self: &Arc<Self>) {
        let (previous, deferred) = self.state.on_disconnect();
        if let Some(transport) = previous {
            tokio::spawn(async move {
                let _ = transport.shutdown().await;
            });
        }
        for op in deferred {
            op(ConnectOutcome::Failed);
        }
        for (txn_id, pending) in self.completions.drain() {
            self.fail_pending(txn_id, pending, ClientErrorKind::PeerUnavailable);
        }
    }

    /// 解码并路由一帧响应。负载损坏时返回 `Err`，这属于连接级致命
    /// 错误，读取循环会据此断开连接。
    fn on_frame(self: &Arc<Self>, payload: Bytes) -> Result<(), ()> {
        let (header, body) = bk_proto::decode_response(payload).map_err(|err| {
            warn!(error = %err, "corrupt response frame");
        })?;
        match self.completions.remove(header.txn_id) {
            Some(pending) => {
                router::complete_with_response(
                    pending,
                    body,
                    self.addr,
                    &self.executor,
                    &self.metrics,
                );
            }
            None => debug!(txn_id = header.txn_id, "response for unknown or already-resolved txn_id"),
        }
        Ok(())
    }

    fn submit_add(
        self: &Arc<Self>,
        transport: Arc<dyn Transport>,
        ledger_id: i64,
        entry_id: i64,
        master_key: Bytes,
        body: Bytes,
        recovery: bool,
        cb: AddCallback<Ctx>,
        ctx: Ctx,
    ) {
        let txn_id = self.txn_gen.next();
        let request = router::build_add_request(ledger_id, entry_id, master_key, body, recovery);
        let started_at = Instant::now();
        let deadline = started_at + self.config.request_timeout();
        let pending = PendingOp::Add {
            ledger_id,
            entry_id,
            cb,
            ctx,
            started_at,
            deadline,
        };
        if !self.completions.insert(txn_id, pending) {
            warn!(txn_id, "duplicate txn_id; dropping request");
            return;
        }
        let frame = bk_proto::encode_frame(&bk_proto::encode_request(txn_id, &request));
        let core = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(err) = transport.write_all(&frame).await {
                debug!(txn_id, error = %err, "write failed");
                if let Some(pending) = core.completions.remove(txn_id) {
                    router::error_out(
                        txn_id,
                        pending,
                        ClientErrorKind::PeerUnavailable,
                        core.addr,
                        &core.executor,
                        &core.metrics,
                    );
                }
            }
        });
    }

    #[allow(clippy::too_many_arguments)]
    fn submit_read(
        self: &Arc<Self>,
        transport: Arc<dyn Transport>,
        ledger_id: i64,
        entry_id: i64,
        master_key: Option<Bytes>,
        fence: bool,
        cb: ReadCallback<Ctx>,
        ctx: Ctx,
    ) {
        let txn_id = self.txn_gen.next();
        let request = match (fence, master_key) {
            (true, Some(key)) => router::build_fence_request(ledger_id, entry_id, key),
            _ => router::build_read_request(ledger_id, entry_id),
        };
        let started_at = Instant::now();
        let deadline = started_at + self.config.request_timeout();
        let pending = PendingOp::Read {
            ledger_id,
            entry_id,
            cb,
            ctx,
            started_at,
            deadline,
        };
        if !self.completions.insert(txn_id, pending) {
            warn!(txn_id, "duplicate txn_id; dropping request");
            return;
        }
        let frame = bk_proto::encode_frame(&bk_proto::encode_request(txn_id, &request));
        let core = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(err) = transport.write_all(&frame).await {
                debug!(txn_id, error = %err, "write failed");
                if let Some(pending) = core.completions.remove(txn_id) {
                    router::error_out(
                        txn_id,
                        pending,
                        ClientErrorKind::PeerUnavailable,
                        core.addr,
                        &core.executor,
                        &core.metrics,
                    );
                }
            }
        });
    }
}

fn spawn_reader<Ctx: Send + 'static>(core: Arc<Core<Ctx>>, transport: Arc<dyn Transport>) {
    tokio::spawn(async move {
        let mut buf = BytesMut::new();
        loop {
            let read = tokio::time::timeout(core.config.read_timeout(), transport.read(64 * 1024))
                .await;
            match read {
                Err(_elapsed) => {
                    // 整条连接级的读超时同步触发一次清扫，本身不拆除连接。
                    sweeper::sweep_once(&core);
                }
                Ok(Ok(chunk)) if chunk.is_empty() => {
                    debug!(peer = %core.addr, "peer closed connection");
                    core.handle_disconnect();
                    return;
                }
                Ok(Ok(chunk)) => {
                    buf.extend_from_slice(&chunk);
                    loop {
                        match bk_proto::try_decode_frame(&mut buf) {
                            Ok(Some(payload)) => {
                                if core.on_frame(payload).is_err() {
                                    core.handle_disconnect();
                                    return;
                                }
                            }
                            Ok(None) => break,
                            Err(err) => {
                                warn!(peer = %core.addr, error = %err, "frame decode failed");
                                core.handle_disconnect();
                                return;
                            }
                        }
                    }
                }
                Ok(Err(err)) => {
                    debug!(peer = %core.addr, error = %err, "transport read failed");
                    core.handle_disconnect();
                    return;
                }
            }
        }
    });
}

/// [`PeerClient`] 的构建器。传输工厂与配置是必须提供的协作方；执行器
/// 与指标汇聚端点分别默认为进程内 Tokio 执行器与一个空操作汇聚端点。
pub struct PeerClientBuilder<Ctx> {
    addr: PeerAddress,
    config: PeerClientConfig,
    factory: Arc<dyn TransportFactory>,
    executor: Arc<dyn OrderedExecutor>,
    metrics: Arc<dyn MetricsSink>,
    _ctx: std::marker::PhantomData<fn(Ctx)>,
}

impl<Ctx: Send + 'static> PeerClientBuilder<Ctx> {
    pub fn new(addr: PeerAddress, factory: Arc<dyn TransportFactory>) -> Self {
        Self {
            addr,
            config: PeerClientConfig::default(),
            factory,
            executor: Arc::new(TokioOrderedExecutor::new()),
            metrics: Arc::new(NoopMetricsSink),
            _ctx: std::marker::PhantomData,
        }
    }

    pub fn with_config(mut self, config: PeerClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_executor(mut self, executor: Arc<dyn OrderedExecutor>) -> Self {
        self.executor = executor;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn build(self) -> PeerClient<Ctx> {
        let core = Arc::new(Core {
            addr: self.addr,
            config: self.config,
            factory: self.factory,
            executor: self.executor,
            metrics: self.metrics,
            txn_gen: TxnIdGenerator::new(),
            state: ConnectionState::new(),
            completions: CompletionTable::new(),
            closed: AtomicBool::new(false),
            sweeper_handle: AsyncMutex::new(None),
        });
        let handle = sweeper::spawn(Arc::clone(&core));
        // 此处 `try_lock` 必定成功：构造尚未返回前，不可能有其他地方
        // 碰过 `sweeper_handle`。
        if let Ok(mut guard) = core.sweeper_handle.try_lock() {
            *guard = Some(handle);
        }
        PeerClient { core }
    }
}

/// 公开门面：`add_entry`、`read_entry`、`read_entry_and_fence`、
/// `close`。`Ctx` 是调用方提供的不透明上下文值，原样透传给对应的回调。
pub struct PeerClient<Ctx> {
    core: Arc<Core<Ctx>>,
}

// 手写而非 `#[derive(Clone)]`：派生会多出一个不必要的 `Ctx: Clone`
// 约束，而实际上只克隆了这个 `Arc`。
impl<Ctx> Clone for PeerClient<Ctx> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<Ctx: Send + 'static> PeerClient<Ctx> {
    pub fn builder(addr: PeerAddress, factory: Arc<dyn TransportFactory>) -> PeerClientBuilder<Ctx> {
        PeerClientBuilder::new(addr, factory)
    }

    /// 分配一个 txn_id，构造一条 `AddRequest`，等连接可用后写出去。
    /// 传入 `recovery` 以请求 `RECOVERY_ADD` 语义。
    pub fn add_entry(
        &self,
        ledger_id: i64,
        master_key: Bytes,
        entry_id: i64,
        payload: Bytes,
        recovery: bool,
        cb: AddCallback<Ctx>,
        ctx: Ctx,
    ) -> Result<(), ClientError> {
        if self.core.is_closed() {
            return Err(ClientError::Closed);
        }
        if master_key.is_empty() {
            return Err(ClientError::MissingMasterKey { op: "add_entry" });
        }
        let core = Arc::clone(&self.core);
        self.core.ensure_connected(Box::new(move |outcome| match outcome {
            ConnectOutcome::Ready(transport) => core.submit_add(
                transport, ledger_id, entry_id, master_key, payload, recovery, cb, ctx,
            ),
            ConnectOutcome::Failed => {
                let addr = core.addr;
                let ledger_key = ledger_id as u64;
                core.executor.submit_ordered(
                    ledger_key,
                    Box::new(move || cb(ClientErrorKind::PeerUnavailable, ledger_id, entry_id, addr, ctx)),
                );
            }
        }));
        Ok(())
    }

    pub fn read_entry(
        &self,
        ledger_id: i64,
        entry_id: i64,
        cb: ReadCallback<Ctx>,
        ctx: Ctx,
    ) -> Result<(), ClientError> {
        self.read_entry_internal(ledger_id, entry_id, None, false, cb, ctx)
    }

    pub fn read_entry_and_fence(
        &self,
        ledger_id: i64,
        master_key: Bytes,
        entry_id: i64,
        cb: ReadCallback<Ctx>,
        ctx: Ctx,
    ) -> Result<(), ClientError> {
        if master_key.is_empty() {
            return Err(ClientError::MissingMasterKey {
                op: "read_entry_and_fence",
            });
        }
        self.read_entry_internal(ledger_id, entry_id, Some(master_key), true, cb, ctx)
    }

    fn read_entry_internal(
        &self,
        ledger_id: i64,
        entry_id: i64,
        master_key: Option<Bytes>,
        fence: bool,
        cb: ReadCallback<Ctx>,
        ctx: Ctx,
    ) -> Result<(), ClientError> {
        if self.core.is_closed() {
            return Err(ClientError::Closed);
        }
        let core = Arc::clone(&self.core);
        self.core.ensure_connected(Box::new(move |outcome| match outcome {
            ConnectOutcome::Ready(transport) => {
                core.submit_read(transport, ledger_id, entry_id, master_key, fence, cb, ctx)
            }
            ConnectOutcome::Failed => {
                let ledger_key = ledger_id as u64;
                core.executor.submit_ordered(
                    ledger_key,
                    Box::new(move || cb(ClientErrorKind::PeerUnavailable, ledger_id, entry_id, None, ctx)),
                );
            }
        }));
        Ok(())
    }

    /// 幂等。拆除传输、停止清扫器，并以 `PeerUnavailable` 排空完成表。
    /// 此调用返回之后，每个公开方法都会同步地以 `ClientError::Closed`
    /// 失败。
    pub async fn close(&self) {
        if self.core.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.core.handle_disconnect();
        let handle = self.core.sweeper_handle.lock().await.take();
        if let Some(handle) = handle {
            handle.abort();
            let _ = handle.await;
        }
    }
}
