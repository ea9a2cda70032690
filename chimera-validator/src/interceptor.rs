//! 方法验证拦截器与通知器
//!
//! 调用前验证参数，违反约束时不调用目标方法；调用成功后验证返回值，
//! 此时目标方法已经执行，只拒绝返回值。

use std::sync::Arc;

use chimera_aop::{
    Advice, Advisor, ClassFilter, Method, MethodInterceptor, MethodInvocation, MethodMatcher,
    Pointcut, PointcutAdvisor, Target, Throwable, TrueMethodMatcher, Value,
};
use chimera_core::constants::VALIDATION_ADVISOR_ORDER;

use crate::error::ValidationError;
use crate::groups::ValidatedGroups;
use crate::validator::ExecutableValidator;

const FACTORY_BEAN: &str = "FactoryBean";
const SMART_FACTORY_BEAN: &str = "SmartFactoryBean";
const GET_OBJECT: &str = "getObject";
const FACTORY_BEAN_METHODS: &[&str] = &["getObject", "getObjectType", "isSingleton"];
const SMART_FACTORY_BEAN_METHODS: &[&str] = &[
    "getObject",
    "getObjectType",
    "isSingleton",
    "isPrototype",
    "isEagerInit",
];

/// 方法验证拦截器
pub struct MethodValidationInterceptor {
    validator: Arc<dyn ExecutableValidator>,
    groups: Arc<ValidatedGroups>,
}

impl MethodValidationInterceptor {
    pub fn new(validator: Arc<dyn ExecutableValidator>, groups: ValidatedGroups) -> Self {
        Self {
            validator,
            groups: Arc::new(groups),
        }
    }

    pub fn groups(&self) -> &ValidatedGroups {
        &self.groups
    }

    /// 匹配声明了 `Validated` 的类型的所有方法
    pub fn into_advisor(self: Arc<Self>) -> Advisor {
        let pointcut: Arc<dyn Pointcut> = Arc::new(ValidatedTypePointcut {
            class_filter: ValidatedTypeFilter {
                groups: Arc::clone(&self.groups),
            },
        });
        PointcutAdvisor::new("methodValidationAdvisor", pointcut, Advice::Around(self))
            .with_order(VALIDATION_ADVISOR_ORDER)
            .into()
    }
}

/// FactoryBean 的元数据方法不做验证
fn is_factory_bean_metadata_method(method: &Method, target: &dyn Target) -> bool {
    let declaring_type = method.declaring_type();
    if declaring_type == FACTORY_BEAN || declaring_type == SMART_FACTORY_BEAN {
        return method.name() != GET_OBJECT;
    }

    let interfaces = target.interfaces();
    let factory_methods = if interfaces.iter().any(|i| i == SMART_FACTORY_BEAN) {
        SMART_FACTORY_BEAN_METHODS
    } else if interfaces.iter().any(|i| i == FACTORY_BEAN) {
        FACTORY_BEAN_METHODS
    } else {
        return false;
    };
    method.name() != GET_OBJECT && factory_methods.contains(&method.name())
}

/// 目标类型上实际执行的方法：签名相同的具体方法，或同名同参数个数的非桥接方法
fn find_bridged_method(method: &Method, target: &dyn Target) -> Method {
    let specific = target.most_specific_method(method);
    if specific != *method {
        return specific;
    }
    target
        .methods()
        .into_iter()
        .find(|candidate| {
            candidate.declaring_type() == target.type_name()
                && candidate.name() == method.name()
                && candidate.parameter_count() == method.parameter_count()
                && !candidate.is_bridge()
        })
        .unwrap_or(specific)
}

impl MethodInterceptor for MethodValidationInterceptor {
    fn invoke(&self, invocation: &mut MethodInvocation<'_>) -> Result<Value, Throwable> {
        let method = invocation.method();
        let target = invocation.target();
        if is_factory_bean_metadata_method(method, target) {
            return invocation.proceed();
        }

        let target_type = invocation.target_type();
        let groups = self.groups.determine(method, target_type);
        let mut method_to_validate = method.clone();

        let violations = match self.validator.validate_parameters(
            target_type,
            method,
            invocation.arguments(),
            &groups,
        ) {
            Err(ValidationError::SignatureMismatch { message, .. }) => {
                method_to_validate = find_bridged_method(method, target);
                tracing::trace!(
                    "Retrying parameter validation of '{}' against '{}': {}",
                    method,
                    method_to_validate,
                    message
                );
                self.validator.validate_parameters(
                    target_type,
                    &method_to_validate,
                    invocation.arguments(),
                    &groups,
                )?
            }
            other => other?,
        };
        if !violations.is_empty() {
            tracing::debug!("Parameter validation of '{}' failed with {} violation(s)", method, violations.len());
            return Err(ValidationError::ConstraintViolations(violations).into());
        }

        let return_value = invocation.proceed()?;

        let violations =
            self.validator
                .validate_return_value(target_type, &method_to_validate, &return_value, &groups)?;
        if !violations.is_empty() {
            tracing::debug!("Return value validation of '{}' failed with {} violation(s)", method, violations.len());
            return Err(ValidationError::ConstraintViolations(violations).into());
        }
        Ok(return_value)
    }
}

struct ValidatedTypeFilter {
    groups: Arc<ValidatedGroups>,
}

impl ClassFilter for ValidatedTypeFilter {
    fn matches(&self, target_type: &str) -> bool {
        self.groups.is_validated_type(target_type)
    }
}

struct ValidatedTypePointcut {
    class_filter: ValidatedTypeFilter,
}

impl Pointcut for ValidatedTypePointcut {
    fn class_filter(&self) -> &dyn ClassFilter {
        &self.class_filter
    }

    fn method_matcher(&self) -> &dyn MethodMatcher {
        &TrueMethodMatcher
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::{Constraint, ConstraintRule};
    use crate::validator::{DeclarativeValidator, MethodConstraints};
    use chimera_aop::{FnTarget, ProxyFactory};
    use chimera_core::order::Ordered;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn register() -> Method {
        Method::new("UserService", "register").with_params(["String"])
    }

    fn user_service(calls: Arc<AtomicUsize>) -> Arc<dyn Target> {
        Arc::new(
            FnTarget::new("UserService")
                .method(register(), move |args, _| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    match args[0].as_str() {
                        Some("nobody@example.com") => Ok(json!({"name": "nobody"})),
                        _ => Ok(json!({"id": 1, "email": args[0].clone()})),
                    }
                })
                .method(Method::new("UserService", "ping"), |_, _| Ok(json!("pong"))),
        )
    }

    fn validator() -> Arc<dyn ExecutableValidator> {
        Arc::new(
            DeclarativeValidator::new()
                .declare(
                    register(),
                    MethodConstraints::new()
                        .parameter(0, Constraint::email().unwrap())
                        .parameter(0, ConstraintRule::new(Constraint::length(None, Some(10))).groups(["Short"]))
                        .return_value(ConstraintRule::new(Constraint::NotNull).property("id")),
                )
                .unwrap(),
        )
    }

    fn proxy(calls: &Arc<AtomicUsize>, groups: ValidatedGroups) -> chimera_aop::Proxy {
        let interceptor = Arc::new(MethodValidationInterceptor::new(validator(), groups));
        let advisor = interceptor.into_advisor();
        assert_eq!(advisor.order(), VALIDATION_ADVISOR_ORDER);
        ProxyFactory::new(user_service(Arc::clone(calls)))
            .add_advisor(advisor)
            .get_proxy()
    }

    #[test]
    fn test_parameter_violation_skips_invocation() {
        let calls = Arc::new(AtomicUsize::new(0));
        let proxy = proxy(&calls, ValidatedGroups::new().validated_type("UserService", Vec::<String>::new()));

        let error = proxy.call(&register(), vec![json!("not-an-email")]).unwrap_err();
        assert_eq!(error.error_type().name(), "ConstraintViolationException");
        let violations = error.downcast_ref::<ValidationError>().unwrap().violations();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].path, "register.arg0");
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let user = proxy.call(&register(), vec![json!("ann@example.com")]).unwrap();
        assert_eq!(user["id"], json!(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_return_value_violation_after_invocation() {
        let calls = Arc::new(AtomicUsize::new(0));
        let proxy = proxy(&calls, ValidatedGroups::new().validated_type("UserService", Vec::<String>::new()));

        let error = proxy.call(&register(), vec![json!("nobody@example.com")]).unwrap_err();
        assert_eq!(error.error_type().name(), "ConstraintViolationException");
        assert!(error.message().contains("register.<return value>.id"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_method_groups_override_type_groups() {
        let calls = Arc::new(AtomicUsize::new(0));
        let groups = ValidatedGroups::new()
            .validated_type("UserService", Vec::<String>::new())
            .validated_method("UserService", "register", ["Short"]);
        let proxy = proxy(&calls, groups);

        // 只验证 Short 分组：不是邮箱也能通过，超长则失败
        proxy.call(&register(), vec![json!("ann")]).unwrap();
        let error = proxy
            .call(&register(), vec![json!("a-very-long-name")])
            .unwrap_err();
        assert!(error.message().contains("length must be at most 10"));
    }

    #[test]
    fn test_unvalidated_type_not_advised() {
        let calls = Arc::new(AtomicUsize::new(0));
        let proxy = proxy(&calls, ValidatedGroups::new());
        assert!(proxy.call(&register(), vec![json!("not-an-email")]).is_ok());
    }

    #[test]
    fn test_bridged_method_retry() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let generic = Method::new("Registry", "register").with_params(["T"]);
        let target: Arc<dyn Target> = Arc::new(
            FnTarget::new("UserService")
                .implements("Registry")
                .method(generic.redeclared_on("UserService").bridge(), |_, _| Ok(Value::Null))
                .method(register(), move |_, _| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(json!({"id": 1}))
                }),
        );
        let interceptor = Arc::new(MethodValidationInterceptor::new(
            validator(),
            ValidatedGroups::new().validated_type("UserService", Vec::<String>::new()),
        ));
        let proxy = ProxyFactory::new(target).add_advisor(interceptor.into_advisor()).get_proxy();

        let error = proxy.call(&generic, vec![json!("not-an-email")]).unwrap_err();
        assert_eq!(error.error_type().name(), "ConstraintViolationException");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_factory_bean_metadata_methods_exempt() {
        let target = FnTarget::new("UserFactory").implements("FactoryBean");
        assert!(is_factory_bean_metadata_method(&Method::new("UserFactory", "getObjectType"), &target));
        assert!(!is_factory_bean_metadata_method(&Method::new("UserFactory", "getObject"), &target));
        assert!(!is_factory_bean_metadata_method(&Method::new("UserFactory", "isPrototype"), &target));

        let smart = FnTarget::new("UserFactory").implements("SmartFactoryBean");
        assert!(is_factory_bean_metadata_method(&Method::new("UserFactory", "isEagerInit"), &smart));
        assert!(is_factory_bean_metadata_method(&Method::new("FactoryBean", "isSingleton"), &smart));
        assert!(!is_factory_bean_metadata_method(&Method::new("UserFactory", "register"), &FnTarget::new("UserFactory")));
    }
}
