//! 回滚规则
//!
//! 每条规则按异常类型（沿继承链精确匹配名称）或名称片段（子串匹配）
//! 计算出一个继承深度，深度最小的规则胜出，深度相同时先注册的胜出。

use std::fmt;

use chimera_aop::{ErrorType, Throwable};

#[derive(Debug, Clone, PartialEq, Eq)]
enum RuleTarget {
    /// 异常类型名称
    Type(String),
    /// 异常名称片段
    Pattern(String),
}

/// 回滚规则
///
/// `rollback == true` 表示匹配时回滚，否则表示匹配时提交
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollbackRule {
    target: RuleTarget,
    rollback: bool,
}

impl RollbackRule {
    /// 对指定类型及其子类型回滚
    pub fn rollback_for(error_type: &ErrorType) -> Self {
        Self {
            target: RuleTarget::Type(error_type.name().to_string()),
            rollback: true,
        }
    }

    /// 对名称包含片段的异常回滚
    pub fn rollback_for_name(pattern: impl Into<String>) -> Self {
        Self {
            target: RuleTarget::Pattern(pattern.into()),
            rollback: true,
        }
    }

    /// 对指定类型及其子类型不回滚
    pub fn no_rollback_for(error_type: &ErrorType) -> Self {
        Self {
            target: RuleTarget::Type(error_type.name().to_string()),
            rollback: false,
        }
    }

    /// 对名称包含片段的异常不回滚
    pub fn no_rollback_for_name(pattern: impl Into<String>) -> Self {
        Self {
            target: RuleTarget::Pattern(pattern.into()),
            rollback: false,
        }
    }

    /// 解析文本形式：`-Name` 回滚，`+Name` 提交
    pub fn parse(token: &str) -> Option<Self> {
        let token = token.trim();
        if let Some(name) = token.strip_prefix('-') {
            (!name.is_empty()).then(|| Self::rollback_for_name(name))
        } else if let Some(name) = token.strip_prefix('+') {
            (!name.is_empty()).then(|| Self::no_rollback_for_name(name))
        } else {
            None
        }
    }

    pub fn is_rollback(&self) -> bool {
        self.rollback
    }

    /// 规则匹配的名称或片段
    pub fn pattern(&self) -> &str {
        match &self.target {
            RuleTarget::Type(name) | RuleTarget::Pattern(name) => name,
        }
    }

    /// 从异常类型向上到匹配位置的距离，不匹配返回 None
    pub fn depth(&self, error_type: &ErrorType) -> Option<usize> {
        match &self.target {
            RuleTarget::Type(name) => error_type.depth_of(name),
            RuleTarget::Pattern(pattern) => error_type
                .ancestors()
                .position(|ancestor| ancestor.name().contains(pattern.as_str())),
        }
    }
}

impl fmt::Display for RollbackRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.rollback { '-' } else { '+' };
        write!(f, "{}{}", sign, self.pattern())
    }
}

/// 选出对异常生效的规则
pub fn winning_rule<'a>(rules: &'a [RollbackRule], error: &Throwable) -> Option<&'a RollbackRule> {
    let mut winner: Option<(usize, &RollbackRule)> = None;
    for rule in rules {
        if let Some(depth) = rule.depth(error.error_type()) {
            // 严格小于：深度相同保留先注册的规则
            if winner.map_or(true, |(deepest, _)| depth < deepest) {
                winner = Some((depth, rule));
            }
        }
    }
    winner.map(|(_, rule)| rule)
}

/// 没有规则匹配时的默认决策：只对 unchecked 异常回滚
pub fn default_rollback_on(error: &Throwable) -> bool {
    error.is_unchecked()
}

/// 按规则计算是否回滚
pub fn rollback_decision(rules: &[RollbackRule], error: &Throwable) -> bool {
    match winning_rule(rules, error) {
        Some(rule) => rule.is_rollback(),
        None => default_rollback_on(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn hierarchy() -> (ErrorType, ErrorType, ErrorType) {
        let base = ErrorType::new("PaymentException", &ErrorType::exception());
        let declined = ErrorType::new("CardDeclinedException", &base);
        let expired = ErrorType::new("CardExpiredException", &declined);
        (base, declined, expired)
    }

    #[test]
    fn test_depth_by_type_and_pattern() {
        let (base, _, expired) = hierarchy();
        assert_eq!(RollbackRule::rollback_for(&base).depth(&expired), Some(2));
        assert_eq!(RollbackRule::rollback_for_name("Declined").depth(&expired), Some(1));
        assert_eq!(RollbackRule::rollback_for_name("Exception").depth(&expired), Some(0));
        assert_eq!(RollbackRule::rollback_for(&ErrorType::runtime_exception()).depth(&expired), None);
    }

    #[test]
    fn test_closest_rule_wins() {
        let (base, declined, expired) = hierarchy();
        let rules = vec![
            RollbackRule::rollback_for(&base),
            RollbackRule::no_rollback_for(&declined),
        ];
        assert!(!rollback_decision(&rules, &Throwable::new(expired, "expired")));
        assert!(rollback_decision(&rules, &Throwable::new(base, "generic")));
    }

    #[test]
    fn test_ties_go_to_earlier_rule() {
        let (base, _, _) = hierarchy();
        let rules = vec![
            RollbackRule::no_rollback_for_name("Payment"),
            RollbackRule::rollback_for(&base),
        ];
        let winner = winning_rule(&rules, &Throwable::new(base, "x")).unwrap();
        assert!(!winner.is_rollback());
    }

    #[test]
    fn test_falls_back_to_unchecked_only() {
        assert!(rollback_decision(&[], &Throwable::runtime("boom")));
        assert!(rollback_decision(&[], &Throwable::new(ErrorType::error(), "fatal")));
        assert!(!rollback_decision(&[], &Throwable::checked("io")));
    }

    #[test]
    fn test_parse_textual_rules() {
        let rule = RollbackRule::parse("-Exception").unwrap();
        assert!(rule.is_rollback());
        assert_eq!(rule.to_string(), "-Exception");
        assert!(!RollbackRule::parse("+Foo").unwrap().is_rollback());
        assert!(RollbackRule::parse("Foo").is_none());
        assert!(RollbackRule::parse("-").is_none());
    }

    // 线性继承链 L0 <- L1 <- ... <- L7，规则随机指向某一层或一个不相关的类型
    fn chain() -> Vec<ErrorType> {
        let mut levels = vec![ErrorType::new("L0", &ErrorType::exception())];
        for i in 1..8 {
            let next = ErrorType::new(format!("L{}", i), &levels[i - 1]);
            levels.push(next);
        }
        levels
    }

    proptest! {
        #[test]
        fn prop_min_depth_then_earliest(
            raw in proptest::collection::vec((0usize..9, any::<bool>()), 0..12),
            thrown in 0usize..8,
        ) {
            let levels = chain();
            let unrelated = ErrorType::new("Unrelated", &ErrorType::runtime_exception());
            let rules: Vec<RollbackRule> = raw
                .iter()
                .map(|&(level, rollback)| {
                    let ty = if level < 8 { &levels[level] } else { &unrelated };
                    if rollback { RollbackRule::rollback_for(ty) } else { RollbackRule::no_rollback_for(ty) }
                })
                .collect();
            let error = Throwable::new(levels[thrown].clone(), "x");

            // 参照实现：只有 level <= thrown 的规则能匹配，深度为 thrown - level
            let expected = raw
                .iter()
                .enumerate()
                .filter(|(_, &(level, _))| level <= thrown)
                .min_by_key(|(index, &(level, _))| (thrown - level, *index))
                .map(|(_, &(_, rollback))| rollback)
                .unwrap_or(false);

            prop_assert_eq!(rollback_decision(&rules, &error), expected);
        }
    }
}
