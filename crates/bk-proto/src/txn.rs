use std::sync::atomic::{AtomicU64, Ordering};

/// 分配给一次在途请求的事务标识，在共用同一个 [`TxnIdGenerator`] 的
/// 范围内唯一。
pub type TxnId = u64;

/// 单连接粒度的单调递增事务 id 源。
///
/// # 设计取舍（Trade-offs）
/// id 只需要在单条连接自己的完成表内唯一，因此一个朴素的单调计数器
/// 就足够了，不必跨对端共享。`next()` 永不返回 `0`，给需要“非事务”
/// 哨兵值的调用方预留了这个值。
#[derive(Debug, Default)]
pub struct TxnIdGenerator {
    counter: AtomicU64,
}

impl TxnIdGenerator {
    pub const fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
        }
    }

    pub fn next(&self) -> TxnId {
        self.counter.fetch_add(1, Ordering::Relaxed) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_monotonic_and_nonzero() {
        let generator = TxnIdGenerator::new();
        let a = generator.next();
        let b = generator.next();
        assert_ne!(a, 0);
        assert!(b > a);
    }
}
