use crate::op::OpType;
use std::time::Duration;

/// 延迟采样汇聚端点。
///
/// 每个完成的操作都会上报一条成功或失败样本；具体落在哪个桶由响应
/// 路由器决定，不是本 trait 的职责。
pub trait MetricsSink: Send + Sync {
    fn register_successful_event(&self, op: OpType, latency: Duration);
    fn register_failed_event(&self, op: OpType, latency: Duration);
}

/// 未接入真实指标系统时使用的默认实现。
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopMetricsSink;

impl MetricsSink for NoopMetricsSink {
    fn register_successful_event(&self, _op: OpType, _latency: Duration) {}
    fn register_failed_event(&self, _op: OpType, _latency: Duration) {}
}
