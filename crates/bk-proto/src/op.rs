use core::fmt;

/// 请求/响应头部携带的操作类型。
///
/// 线缆上的每一帧都明确携带其中之一；响应路由器按这个标签分派，而不是
/// 反过来从负载的形状推导操作类型。
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[non_exhaustive]
pub enum OpType {
    AddEntry,
    ReadEntry,
}

impl fmt::Display for OpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpType::AddEntry => f.write_str("ADD_ENTRY"),
            OpType::ReadEntry => f.write_str("READ_ENTRY"),
        }
    }
}

/// 请求侧标志位。每种操作类型只有一个标志有意义，但用同一个位集携带
/// 两者，使得线缆头部在所有操作类型间保持统一形状。
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub struct RequestFlags {
    bits: u8,
}

const RECOVERY_ADD: u8 = 0b01;
const FENCE_LEDGER: u8 = 0b10;

impl RequestFlags {
    pub const NONE: RequestFlags = RequestFlags { bits: 0 };

    pub const fn recovery_add() -> Self {
        RequestFlags { bits: RECOVERY_ADD }
    }

    pub const fn fence_ledger() -> Self {
        RequestFlags { bits: FENCE_LEDGER }
    }

    pub const fn is_recovery_add(&self) -> bool {
        self.bits & RECOVERY_ADD != 0
    }

    pub const fn is_fence_ledger(&self) -> bool {
        self.bits & FENCE_LEDGER != 0
    }

    pub const fn bits(&self) -> u8 {
        self.bits
    }

    pub const fn from_bits(bits: u8) -> Self {
        RequestFlags { bits }
    }
}

/// Sentinel entry id requesting "the highest durably-replicated entry".
pub const LAST_ADD_CONFIRMED: i64 = -1;
