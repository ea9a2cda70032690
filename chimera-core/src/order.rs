//! 排序约定
//!
//! 数值越小优先级越高，与 Spring 的 Ordered 一致。

/// 最高优先级
pub const HIGHEST_PRECEDENCE: i32 = i32::MIN;

/// 最低优先级（默认值）
pub const LOWEST_PRECEDENCE: i32 = i32::MAX;

/// 可排序组件
pub trait Ordered {
    fn order(&self) -> i32 {
        LOWEST_PRECEDENCE
    }
}

/// 按 order 稳定排序，同 order 保持原有顺序
pub fn sort_by_order<T: Ordered>(items: &mut [T]) {
    items.sort_by_key(|item| item.order());
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Item(&'static str, i32);

    impl Ordered for Item {
        fn order(&self) -> i32 {
            self.1
        }
    }

    #[test]
    fn test_sort_is_stable() {
        let mut items = vec![Item("a", 5), Item("b", 1), Item("c", 5), Item("d", HIGHEST_PRECEDENCE)];
        sort_by_order(&mut items);
        let names: Vec<_> = items.iter().map(|i| i.0).collect();
        assert_eq!(names, vec!["d", "b", "a", "c"]);
    }
}
