//! 短令牌分配
//!
//! 回调载荷有长度上限，订单号不能直接放进去，用会话内唯一的短令牌代替。
//! 计数器只增不减：订单消失后其令牌不会被再次分配。
//!
//! 新会话的计数器从进程级种子开始（启动时刻的毫秒数左移 20 位），
//! 每个新会话再占一段：重启前发出的旧令牌不会落到新会话的订单上。

use shared::util::now_millis;
use std::collections::HashMap;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicU64, Ordering};

/// 每个新会话可分配的令牌数
const SESSION_TOKEN_SPAN: u64 = 1 << 20;

static SESSION_BASE: LazyLock<AtomicU64> =
    LazyLock::new(|| AtomicU64::new(u64::try_from(now_millis()).unwrap_or(0) << 20));

/// Bidirectional order number ↔ token map with a monotonic counter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenAllocator {
    number_to_token: HashMap<String, String>,
    token_to_number: HashMap<String, String>,
    /// 下一个待分配的计数值
    next: u64,
}

impl TokenAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty allocator whose counter starts in a range no earlier session used
    pub fn seeded() -> Self {
        Self {
            next: SESSION_BASE.fetch_add(SESSION_TOKEN_SPAN, Ordering::Relaxed),
            ..Self::default()
        }
    }

    /// Build the next generation for `numbers`
    ///
    /// 仍然存在的订单沿用上一代令牌，新订单取计数器的下一个值。
    /// 新分配的值都 ≥ 上一代的 `next`，不会与沿用的令牌冲突。
    pub fn reallocate<'a>(&self, numbers: impl IntoIterator<Item = &'a str>) -> Self {
        let mut next = self.next;
        let mut number_to_token = HashMap::new();
        let mut token_to_number = HashMap::new();

        for number in numbers {
            if number_to_token.contains_key(number) {
                continue;
            }
            let token = match self.number_to_token.get(number) {
                Some(previous) if !token_to_number.contains_key(previous) => previous.clone(),
                _ => {
                    let minted = to_base36(next);
                    next += 1;
                    minted
                }
            };
            token_to_number.insert(token.clone(), number.to_string());
            number_to_token.insert(number.to_string(), token);
        }

        Self {
            number_to_token,
            token_to_number,
            next,
        }
    }

    pub fn token_for(&self, number: &str) -> Option<&str> {
        self.number_to_token.get(number).map(String::as_str)
    }

    pub fn number_for(&self, token: &str) -> Option<&str> {
        self.token_to_number.get(token).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.number_to_token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.number_to_token.is_empty()
    }

    pub fn next_counter(&self) -> u64 {
        self.next
    }

    /// 下一个新订单将得到的令牌
    #[cfg(test)]
    pub(crate) fn next_token(&self) -> String {
        to_base36(self.next)
    }

    #[cfg(test)]
    pub(crate) fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.number_to_token
            .iter()
            .map(|(n, t)| (n.as_str(), t.as_str()))
    }
}

const BASE36_DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(BASE36_DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    digits.iter().rev().map(|&d| d as char).collect()
}
