/// 提交给有序执行器的、装箱的一次性回调任务。
///
/// 用 `FnOnce` 而非 future：具体在哪个运行时、以何种方式执行，完全交给
/// 执行器自己决定，调用方不必关心。
pub type OrderedTask = Box<dyn FnOnce() + Send + 'static>;

/// 同一个 key 下的任务严格串行，不同 key 的任务可以并行执行。
///
/// # 体系定位（Architecture）
/// 每个用户回调都以 `ledger_id` 作为 key 提交，于是“同一 ledger 上的
/// 回调严格按提交顺序触发”这条约束变成了执行器自身的性质，客户端内核
/// 不必再自己维护一套排序逻辑。
pub trait OrderedExecutor: Send + Sync {
    fn submit_ordered(&self, key: u64, task: OrderedTask);
}
