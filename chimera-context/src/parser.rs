//! 配置类解析器
//!
//! 从显式注册的配置类出发，递归处理成员类、配置源、组件扫描、导入、
//! 导入资源、Bean 方法、接口默认方法和父类链，得到完整的配置类图。
//!
//! - 配置类按类名存放，重复发现时按导入/显式规则合并或替换
//! - 父类链由外层循环逐级处理，已处理过的父类不会重复处理
//! - 循环导入和超出深度限制作为问题报告，不中断兄弟节点的处理
//! - 延迟选择器在所有配置类处理完之后按分组执行

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chimera_core::order::Ordered;
use chimera_core::utils::class_names::{is_builtin_type_name, short_name};
use chimera_core::{DefaultListableBeanFactory, Environment};
use indexmap::map::Entry;
use indexmap::{IndexMap, IndexSet};

use crate::condition::{ConditionEvaluator, ConfigurationPhase};
use crate::configuration_class::{BeanMethod, ConfigurationClass};
use crate::error::ContextResult;
use crate::import::{
    DeferredImportGroup, DeferredImportSelector, ExclusionFilter, ImportCandidate,
    ImportCandidateRegistry,
};
use crate::import_stack::{ImportRegistry, ImportStack};
use crate::metadata::annotations::{
    is_framework_annotation, BEAN, COMPONENT_SCAN, IMPORT, IMPORT_RESOURCE, PROPERTY_SOURCE,
};
use crate::metadata::{AnnotatedMetadata, ClassMetadata, MethodMetadata, MetadataOrigin};
use crate::problem::{CollectingProblemReporter, Location, Problem, ProblemKind, ProblemReporter};
use crate::property_source::{PropertySourceLoader, PropertySourceProcessor, TomlPropertySourceLoader};
use crate::reader::MetadataReaderFactory;
use crate::scan::{ComponentScanner, PackageComponentScanner, ScannedCandidate};

/// 默认的导入嵌套深度上限
pub const DEFAULT_MAX_IMPORT_DEPTH: usize = 64;

/// `ImportResource` 未指定读取器时使用的读取器名称
pub const DEFAULT_RESOURCE_READER: &str = "toml";

/// 显式注册的配置类
#[derive(Debug, Clone)]
pub struct ConfigCandidate {
    pub bean_name: String,
    pub source: CandidateSource,
}

#[derive(Debug, Clone)]
pub enum CandidateSource {
    /// 调用方直接提供的元数据
    Metadata(ClassMetadata),
    /// 通过元数据读取器按类名查找
    ClassName(String),
}

impl ConfigCandidate {
    pub fn metadata(bean_name: impl Into<String>, metadata: ClassMetadata) -> Self {
        Self {
            bean_name: bean_name.into(),
            source: CandidateSource::Metadata(metadata),
        }
    }

    pub fn class_name(bean_name: impl Into<String>, class_name: impl Into<String>) -> Self {
        Self {
            bean_name: bean_name.into(),
            source: CandidateSource::ClassName(class_name.into()),
        }
    }
}

/// 一个配置类在注册阶段的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationRegistration {
    pub bean_name: String,
    pub class_name: String,
    pub bean_methods: Vec<String>,
}

struct DeferredImportHolder {
    metadata: Arc<ClassMetadata>,
    selector: Arc<dyn DeferredImportSelector>,
}

struct DeferredImportGrouping {
    group: Box<dyn DeferredImportGroup>,
    holders: Vec<DeferredImportHolder>,
}

impl DeferredImportGrouping {
    /// 成员选择器过滤器的并集
    fn candidate_filter(&self) -> ExclusionFilter {
        self.holders
            .iter()
            .filter_map(|holder| holder.selector.exclusion_filter())
            .fold(ExclusionFilter::builtin(), |merged, filter| merged.or(&filter))
    }
}

/// 配置类解析器
pub struct ConfigurationClassParser {
    reader: Arc<dyn MetadataReaderFactory>,
    environment: Arc<Environment>,
    conditions: Arc<ConditionEvaluator>,
    imports: ImportCandidateRegistry,
    scanner: Option<Arc<dyn ComponentScanner>>,
    property_sources: PropertySourceProcessor,
    reporter: Arc<dyn ProblemReporter>,
    collector: Option<Arc<CollectingProblemReporter>>,
    max_import_depth: usize,
    configuration_classes: IndexMap<String, ConfigurationClass>,
    known_superclasses: HashMap<String, String>,
    import_stack: ImportStack,
    deferred_imports: Option<Vec<DeferredImportHolder>>,
    scanned: Vec<ScannedCandidate>,
}

impl ConfigurationClassParser {
    pub fn new(reader: Arc<dyn MetadataReaderFactory>, environment: Arc<Environment>) -> Self {
        let conditions = Arc::new(ConditionEvaluator::new(Arc::clone(&environment)).with_registered_conditions());
        let collector = Arc::new(CollectingProblemReporter::new());
        let loader: Arc<dyn PropertySourceLoader> = Arc::new(TomlPropertySourceLoader::new());
        Self {
            reader,
            property_sources: PropertySourceProcessor::new(Arc::clone(&environment), loader),
            environment,
            conditions,
            imports: ImportCandidateRegistry::from_registry(),
            scanner: None,
            reporter: Arc::clone(&collector) as Arc<dyn ProblemReporter>,
            collector: Some(collector),
            max_import_depth: DEFAULT_MAX_IMPORT_DEPTH,
            configuration_classes: IndexMap::new(),
            known_superclasses: HashMap::new(),
            import_stack: ImportStack::new(),
            deferred_imports: None,
            scanned: Vec::new(),
        }
    }

    pub fn with_conditions(mut self, conditions: ConditionEvaluator) -> Self {
        self.conditions = Arc::new(conditions);
        self
    }

    pub fn with_import_candidates(mut self, imports: ImportCandidateRegistry) -> Self {
        self.imports = imports;
        self
    }

    pub fn with_scanner(mut self, scanner: Arc<dyn ComponentScanner>) -> Self {
        self.scanner = Some(scanner);
        self
    }

    pub fn with_property_source_loader(mut self, loader: Arc<dyn PropertySourceLoader>) -> Self {
        self.property_sources = PropertySourceProcessor::new(Arc::clone(&self.environment), loader);
        self
    }

    /// 替换问题报告器，此后 [`problems`](Self::problems) 不再收集
    pub fn with_problem_reporter(mut self, reporter: Arc<dyn ProblemReporter>) -> Self {
        self.reporter = reporter;
        self.collector = None;
        self
    }

    pub fn with_max_import_depth(mut self, max_import_depth: usize) -> Self {
        self.max_import_depth = max_import_depth;
        self
    }

    /// 解析显式注册的配置类，最后处理延迟导入
    pub fn parse(&mut self, candidates: Vec<ConfigCandidate>) -> ContextResult<()> {
        self.deferred_imports = Some(Vec::new());
        for candidate in candidates {
            let metadata = match candidate.source {
                CandidateSource::Metadata(metadata) => Arc::new(metadata),
                CandidateSource::ClassName(class_name) => self.reader.get_metadata(&class_name)?,
            };
            tracing::debug!("Parsing configuration class '{}'", metadata.class_name());
            self.process_configuration_class(
                ConfigurationClass::new(metadata, Some(candidate.bean_name)),
                &ExclusionFilter::builtin(),
            )?;
        }
        self.process_deferred_imports()?;
        tracing::info!(
            "Parsed {} configuration class(es) with {} problem(s)",
            self.configuration_classes.len(),
            self.problems().len()
        );
        Ok(())
    }

    /// 检查所有配置类，问题交给问题报告器
    pub fn validate(&self) -> ContextResult<()> {
        for config in self.configuration_classes.values() {
            config.validate(self.reporter.as_ref())?;
        }
        Ok(())
    }

    fn process_configuration_class(&mut self, mut config: ConfigurationClass, filter: &ExclusionFilter) -> ContextResult<()> {
        if self
            .conditions
            .should_skip_class(config.metadata(), Some(ConfigurationPhase::ParseConfiguration))?
        {
            tracing::debug!("Skipping configuration class '{}' due to its conditions", config.class_name());
            return Ok(());
        }

        let class_name = config.class_name().to_string();
        if let Some(existing) = self.configuration_classes.get_mut(&class_name) {
            if config.is_imported() {
                if existing.is_imported() {
                    existing.merge_imported_by(&config);
                }
                // 已有显式注册时忽略导入
                return Ok(());
            }
            tracing::debug!("Explicit registration of '{}' replaces the imported one", class_name);
            self.configuration_classes.shift_remove(&class_name);
            self.known_superclasses.retain(|_, owner| *owner != class_name);
        }

        let mut source = (!filter.matches(&class_name)).then(|| Arc::clone(config.metadata()));
        while let Some(current) = source {
            source = self.do_process_configuration_class(&mut config, current, filter)?;
        }
        self.configuration_classes.insert(class_name, config);
        Ok(())
    }

    /// 处理一级类，返回尚未处理过的父类
    fn do_process_configuration_class(
        &mut self,
        config: &mut ConfigurationClass,
        source: Arc<ClassMetadata>,
        filter: &ExclusionFilter,
    ) -> ContextResult<Option<Arc<ClassMetadata>>> {
        if config.metadata().is_component() {
            self.process_member_classes(config, &source, filter)?;
        }

        for annotation in source.annotations_of(PROPERTY_SOURCE) {
            self.property_sources.process(annotation)?;
        }

        self.process_component_scans(&source)?;

        let imports = self.collect_imports(&source);
        self.process_imports(config, &source, imports, filter, true)?;

        if let Some(resource) = source.annotation(IMPORT_RESOURCE) {
            let reader = resource.string("reader").unwrap_or(DEFAULT_RESOURCE_READER);
            for location in resource
                .strings("locations")
                .into_iter()
                .chain(resource.strings("value"))
            {
                let resolved = self.environment.resolve_required_placeholders(&location)?;
                config.add_imported_resource(resolved, reader);
            }
        }

        for method in self.retrieve_bean_methods(&source) {
            config.add_bean_method(BeanMethod {
                metadata: method,
                declaring_class: source.class_name().to_string(),
            });
        }

        self.process_interfaces(config, &source, &mut HashSet::new())?;

        if let Some(super_class) = source.super_class() {
            if !is_builtin_type_name(super_class) && !self.known_superclasses.contains_key(super_class) {
                self.known_superclasses
                    .insert(super_class.to_string(), config.class_name().to_string());
                tracing::trace!("Processing superclass '{}' of '{}'", super_class, config.class_name());
                return self.reader.get_metadata(super_class).map(Some);
            }
        }
        Ok(None)
    }

    /// 成员类中的配置类按 `Order` 排序后作为导入处理
    fn process_member_classes(
        &mut self,
        config: &ConfigurationClass,
        source: &ClassMetadata,
        filter: &ExclusionFilter,
    ) -> ContextResult<()> {
        let mut candidates = Vec::new();
        for member in source.member_classes() {
            match self.reader.get_metadata(member) {
                Ok(metadata) if metadata.is_configuration_candidate() && metadata.class_name() != config.class_name() => {
                    candidates.push(metadata);
                }
                Ok(_) => {}
                Err(e) => tracing::debug!("Failed to resolve member class '{}': {}", member, e),
            }
        }
        candidates.sort_by_key(|metadata| metadata.order());

        for candidate in candidates {
            if self.import_stack.contains(config.class_name()) {
                self.report_circular_import(candidate.class_name())?;
                continue;
            }
            self.import_stack.push(config.class_name());
            let result =
                self.process_configuration_class(ConfigurationClass::imported(candidate, config.class_name()), filter);
            self.import_stack.pop();
            result?;
        }
        Ok(())
    }

    fn process_component_scans(&mut self, source: &ClassMetadata) -> ContextResult<()> {
        let scans: Vec<_> = source.annotations_of(COMPONENT_SCAN).cloned().collect();
        if scans.is_empty()
            || self
                .conditions
                .should_skip_class(source, Some(ConfigurationPhase::RegisterBean))?
        {
            return Ok(());
        }

        let scanner = self.scanner();
        for scan in &scans {
            for candidate in scanner.scan(scan, source.class_name())? {
                let class_name = candidate.metadata.class_name();
                let registered = self
                    .configuration_classes
                    .get(class_name)
                    .is_some_and(|existing| !existing.is_imported());
                if registered {
                    tracing::trace!("Scanned class '{}' is already registered", class_name);
                    continue;
                }
                if candidate.metadata.is_configuration_candidate() {
                    self.process_configuration_class(
                        ConfigurationClass::new(Arc::clone(&candidate.metadata), Some(candidate.bean_name.clone())),
                        &ExclusionFilter::builtin(),
                    )?;
                }
                self.scanned.push(candidate);
            }
        }
        Ok(())
    }

    fn scanner(&self) -> Arc<dyn ComponentScanner> {
        match &self.scanner {
            Some(scanner) => Arc::clone(scanner),
            None => Arc::new(PackageComponentScanner::new(
                Arc::clone(&self.reader),
                Arc::clone(&self.conditions),
            )),
        }
    }

    /// 沿元注解收集 `Import` 的值，先处理元注解
    fn collect_imports(&self, source: &ClassMetadata) -> Vec<String> {
        let mut imports = IndexSet::new();
        let mut visited = HashSet::new();
        self.collect_imports_from(source, &mut imports, &mut visited);
        imports.into_iter().collect()
    }

    fn collect_imports_from(&self, metadata: &ClassMetadata, imports: &mut IndexSet<String>, visited: &mut HashSet<String>) {
        if !visited.insert(metadata.class_name().to_string()) {
            return;
        }
        for annotation in metadata.annotations() {
            let type_name = annotation.type_name();
            if is_framework_annotation(type_name) || is_builtin_type_name(type_name) {
                continue;
            }
            match self.reader.get_metadata(type_name) {
                Ok(annotation_type) => self.collect_imports_from(&annotation_type, imports, visited),
                Err(e) => tracing::trace!("Skipping meta-annotations of '{}': {}", type_name, e),
            }
        }
        for import in metadata.annotations_of(IMPORT) {
            imports.extend(import.strings("value"));
        }
    }

    fn process_imports(
        &mut self,
        config: &mut ConfigurationClass,
        current_source: &Arc<ClassMetadata>,
        candidates: Vec<String>,
        filter: &ExclusionFilter,
        check_for_circular_imports: bool,
    ) -> ContextResult<()> {
        if candidates.is_empty() {
            return Ok(());
        }
        if check_for_circular_imports && self.import_stack.is_chained_import_on_stack(config.class_name()) {
            return self.report_circular_import(config.class_name());
        }
        if self.import_stack.depth() >= self.max_import_depth {
            let problem = Problem::new(
                ProblemKind::ImportDepthExceeded,
                format!(
                    "Import depth limit of {} exceeded while processing '{}' with import stack {}",
                    self.max_import_depth,
                    config.class_name(),
                    self.import_stack
                ),
                Location::class(config.class_name()),
            );
            return self.reporter.error(problem);
        }

        self.import_stack.push(config.class_name());
        let result = self.process_import_candidates(config, current_source, candidates, filter);
        self.import_stack.pop();
        result
    }

    fn process_import_candidates(
        &mut self,
        config: &mut ConfigurationClass,
        current_source: &Arc<ClassMetadata>,
        candidates: Vec<String>,
        filter: &ExclusionFilter,
    ) -> ContextResult<()> {
        let mut filter = filter.clone();
        for candidate in candidates {
            if filter.matches(&candidate) {
                tracing::trace!("Import candidate '{}' excluded by filter", candidate);
                continue;
            }
            match self.imports.classify(&candidate) {
                ImportCandidate::Selector(selector) => {
                    if let Some(selector_filter) = selector.exclusion_filter() {
                        filter = filter.or(&selector_filter);
                    }
                    let selected = selector.select_imports(current_source);
                    tracing::trace!("Import selector '{}' selected {:?}", candidate, selected);
                    self.process_imports(config, current_source, selected, &filter, false)?;
                }
                ImportCandidate::DeferredSelector(selector) => {
                    if let Some(selector_filter) = selector.exclusion_filter() {
                        filter = filter.or(&selector_filter);
                    }
                    tracing::trace!("Deferring import selector '{}' of '{}'", candidate, config.class_name());
                    self.deferred_imports
                        .get_or_insert_with(Vec::new)
                        .push(DeferredImportHolder {
                            metadata: Arc::clone(config.metadata()),
                            selector,
                        });
                }
                ImportCandidate::Registrar(registrar) => {
                    config.add_registrar(registrar, Arc::clone(current_source));
                }
                ImportCandidate::Configuration => {
                    self.import_stack
                        .register_import(current_source.class_name(), &candidate);
                    let metadata = self.reader.get_metadata(&candidate)?;
                    self.process_configuration_class(
                        ConfigurationClass::imported(metadata, config.class_name()),
                        &filter,
                    )?;
                }
            }
        }
        Ok(())
    }

    /// 按轮次处理延迟导入，处理过程中新发现的延迟选择器进入下一轮
    fn process_deferred_imports(&mut self) -> ContextResult<()> {
        while let Some(mut holders) = self.deferred_imports.take().filter(|holders| !holders.is_empty()) {
            self.deferred_imports = Some(Vec::new());
            holders.sort_by_key(|holder| holder.selector.order());

            let mut groupings: IndexMap<String, DeferredImportGrouping> = IndexMap::new();
            for (index, holder) in holders.into_iter().enumerate() {
                let key = match holder.selector.import_group() {
                    Some(group) => format!("group:{}", group),
                    None => format!("selector:{}", index),
                };
                let grouping = match groupings.entry(key) {
                    Entry::Occupied(entry) => entry.into_mut(),
                    Entry::Vacant(entry) => entry.insert(DeferredImportGrouping {
                        group: self.imports.create_group(holder.selector.import_group())?,
                        holders: Vec::new(),
                    }),
                };
                grouping.holders.push(holder);
            }

            for (_, grouping) in groupings {
                self.process_grouping(grouping)?;
            }
        }
        Ok(())
    }

    fn process_grouping(&mut self, mut grouping: DeferredImportGrouping) -> ContextResult<()> {
        let filter = grouping.candidate_filter();
        for holder in &grouping.holders {
            grouping.group.process(&holder.metadata, holder.selector.as_ref());
        }

        for entry in grouping.group.select_imports() {
            let Some(mut config) = self.configuration_classes.get(&entry.importing_class).cloned() else {
                tracing::trace!("Importing class '{}' is no longer registered", entry.importing_class);
                continue;
            };
            let registrars_before = config.registrar_count();
            let source = Arc::clone(config.metadata());
            self.process_imports(&mut config, &source, vec![entry.import_class_name], &filter, false)?;
            if let Some(registered) = self.configuration_classes.get_mut(&entry.importing_class) {
                registered.append_registrars_from(&config, registrars_before);
            }
        }
        Ok(())
    }

    /// `Bean` 方法，自省得到的顺序按声明顺序重排
    ///
    /// 只有声明顺序中能找到全部方法时才重排，否则保持原顺序
    fn retrieve_bean_methods(&self, source: &ClassMetadata) -> Vec<MethodMetadata> {
        let methods: Vec<MethodMetadata> = source.annotated_methods(BEAN).into_iter().cloned().collect();
        if methods.len() <= 1 || source.origin() != MetadataOrigin::Introspected {
            return methods;
        }

        match self.reader.get_metadata(source.class_name()) {
            Ok(parsed) if parsed.origin() == MetadataOrigin::Parsed => {
                let declared = parsed.annotated_methods(BEAN);
                if declared.len() >= methods.len() {
                    let mut selected: Vec<MethodMetadata> = Vec::with_capacity(methods.len());
                    for declared_method in declared {
                        if let Some(found) = methods.iter().find(|m| m.name() == declared_method.name()) {
                            if !selected.contains(found) {
                                selected.push(found.clone());
                            }
                        }
                    }
                    if selected.len() == methods.len() {
                        return selected;
                    }
                }
            }
            Ok(_) => {}
            Err(e) => tracing::debug!(
                "Failed to read declaration order of '{}' - falling back to introspected order: {}",
                source.class_name(),
                e
            ),
        }
        methods
    }

    /// 接口上的非抽象 `Bean` 方法，递归处理父接口
    fn process_interfaces(
        &mut self,
        config: &mut ConfigurationClass,
        source: &ClassMetadata,
        visited: &mut HashSet<String>,
    ) -> ContextResult<()> {
        for interface in source.interfaces() {
            if is_builtin_type_name(interface) || !visited.insert(interface.clone()) {
                continue;
            }
            let metadata = self.reader.get_metadata(interface)?;
            for method in self.retrieve_bean_methods(&metadata) {
                if !method.is_abstract() {
                    config.add_bean_method(BeanMethod {
                        metadata: method,
                        declaring_class: interface.clone(),
                    });
                }
            }
            self.process_interfaces(config, &metadata, visited)?;
        }
        Ok(())
    }

    fn report_circular_import(&self, attempted_import: &str) -> ContextResult<()> {
        let importing = self.import_stack.peek().unwrap_or(attempted_import);
        let problem = Problem::new(
            ProblemKind::CircularImport,
            format!(
                "A circular import has been detected: illegal attempt by configuration class '{}' to import class '{}' as '{}' is already present in the current import stack {}",
                short_name(importing),
                short_name(attempted_import),
                short_name(attempted_import),
                self.import_stack
            ),
            Location::class(attempted_import),
        );
        self.reporter.error(problem)
    }

    /// 注册阶段是否跳过：导入类在所有导入方都被跳过时跳过
    pub fn should_skip_registration(&self, config: &ConfigurationClass) -> ContextResult<bool> {
        let mut visiting = HashSet::new();
        self.should_skip_tracked(config, &mut visiting)
    }

    fn should_skip_tracked(&self, config: &ConfigurationClass, visiting: &mut HashSet<String>) -> ContextResult<bool> {
        if !visiting.insert(config.class_name().to_string()) {
            return Ok(false);
        }
        if config.is_imported() {
            let mut all_skipped = true;
            for importer in config.imported_by() {
                let skipped = match self.configuration_classes.get(importer) {
                    Some(importing) => self.should_skip_tracked(importing, visiting)?,
                    None => false,
                };
                if !skipped {
                    all_skipped = false;
                    break;
                }
            }
            if all_skipped {
                return Ok(true);
            }
        }
        self.conditions
            .should_skip_class(config.metadata(), Some(ConfigurationPhase::RegisterBean))
    }

    /// 注册阶段：跳过不满足条件的配置类和 Bean 方法，并调用导入的注册器
    pub fn load_registrations(
        &mut self,
        registry: &DefaultListableBeanFactory,
    ) -> ContextResult<Vec<ConfigurationRegistration>> {
        let mut skipped = Vec::new();
        let mut registrations = Vec::new();
        for config in self.configuration_classes.values() {
            if self.should_skip_registration(config)? {
                tracing::debug!("Skipping registration of '{}' due to its conditions", config.class_name());
                skipped.push(config.class_name().to_string());
                continue;
            }
            let mut bean_methods = Vec::new();
            for bean_method in config.bean_methods() {
                if self
                    .conditions
                    .should_skip(&bean_method.metadata, ConfigurationPhase::RegisterBean)?
                {
                    tracing::trace!("Skipping bean method '{}' due to its conditions", bean_method.name());
                    continue;
                }
                bean_methods.push(bean_method.name().to_string());
            }
            config.load_registrars(registry)?;
            registrations.push(ConfigurationRegistration {
                bean_name: config.registration_name(),
                class_name: config.class_name().to_string(),
                bean_methods,
            });
        }
        for class_name in skipped {
            self.import_stack.remove_importing_class(&class_name);
        }
        Ok(registrations)
    }

    pub fn configuration_classes(&self) -> impl Iterator<Item = &ConfigurationClass> {
        self.configuration_classes.values()
    }

    pub fn configuration_class(&self, class_name: &str) -> Option<&ConfigurationClass> {
        self.configuration_classes.get(class_name)
    }

    pub fn import_registry(&self) -> &dyn ImportRegistry {
        &self.import_stack
    }

    /// 父类到首次处理它的配置类
    pub fn known_superclasses(&self) -> &HashMap<String, String> {
        &self.known_superclasses
    }

    pub fn scanned_components(&self) -> &[ScannedCandidate] {
        &self.scanned
    }

    pub fn property_source_names(&self) -> &[String] {
        self.property_sources.names()
    }

    /// 默认报告器收集到的问题
    pub fn problems(&self) -> Vec<Problem> {
        self.collector
            .as_ref()
            .map(|collector| collector.problems())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{Condition, ConditionContext};
    use crate::error::ContextError;
    use crate::import::{GroupEntry, ImportBeanDefinitionRegistrar, ImportSelector};
    use crate::metadata::annotations::{COMPONENT, CONDITIONAL, ORDER, PROFILE};
    use crate::metadata::AnnotationDescriptor;
    use crate::problem::FailFastProblemReporter;
    use crate::reader::SimpleMetadataReaderFactory;
    use chimera_core::error::ContainerResult;
    use chimera_core::{ConfigValue, MapPropertySource};

    fn bean_class(name: &str, bean: &str) -> ClassMetadata {
        ClassMetadata::configuration(name).method(MethodMetadata::bean(bean))
    }

    fn new_parser(reader: SimpleMetadataReaderFactory) -> ConfigurationClassParser {
        ConfigurationClassParser::new(Arc::new(reader), Arc::new(Environment::new()))
    }

    fn explicit(class_name: &str) -> ConfigCandidate {
        ConfigCandidate::class_name(chimera_core::utils::naming::default_bean_name(class_name), class_name)
    }

    fn class_names(parser: &ConfigurationClassParser) -> Vec<&str> {
        parser.configuration_classes().map(|c| c.class_name()).collect()
    }

    fn bean_methods<'a>(parser: &'a ConfigurationClassParser, class_name: &str) -> Vec<&'a str> {
        parser
            .configuration_class(class_name)
            .map(|c| c.bean_methods().iter().map(|m| m.name()).collect())
            .unwrap_or_default()
    }

    #[test]
    fn test_imported_twice_merges_importers() {
        let reader = SimpleMetadataReaderFactory::new()
            .with(ClassMetadata::configuration("app.A").imports(vec!["app.C"]))
            .with(ClassMetadata::configuration("app.B").imports(vec!["app.C"]))
            .with(bean_class("app.C", "shared"));
        let mut parser = new_parser(reader);
        parser.parse(vec![explicit("app.A"), explicit("app.B")]).unwrap();

        let c = parser.configuration_class("app.C").unwrap();
        assert_eq!(c.imported_by().iter().collect::<Vec<_>>(), vec!["app.A", "app.B"]);
        assert_eq!(bean_methods(&parser, "app.C"), vec!["shared"]);
        assert_eq!(class_names(&parser), vec!["app.C", "app.A", "app.B"]);
        assert_eq!(parser.import_registry().importing_class_for("app.C"), Some("app.B"));
    }

    #[test]
    fn test_explicit_replaces_imported() {
        let reader = SimpleMetadataReaderFactory::new()
            .with(ClassMetadata::configuration("app.A").imports(vec!["app.C"]))
            .with(bean_class("app.C", "shared").extends("app.BaseC"))
            .with(bean_class("app.BaseC", "base"));
        let mut parser = new_parser(reader);
        parser.parse(vec![explicit("app.A"), explicit("app.C")]).unwrap();

        let c = parser.configuration_class("app.C").unwrap();
        assert!(!c.is_imported());
        assert_eq!(c.bean_name(), Some("c"));
        assert_eq!(bean_methods(&parser, "app.C"), vec!["shared", "base"]);
        assert_eq!(class_names(&parser), vec!["app.A", "app.C"]);
        assert_eq!(parser.known_superclasses().get("app.BaseC").map(String::as_str), Some("app.C"));
    }

    #[test]
    fn test_explicit_wins_over_later_import() {
        let reader = SimpleMetadataReaderFactory::new()
            .with(bean_class("app.C", "shared"))
            .with(ClassMetadata::configuration("app.A").imports(vec!["app.C"]));
        let mut parser = new_parser(reader);
        parser.parse(vec![explicit("app.C"), explicit("app.A")]).unwrap();

        let c = parser.configuration_class("app.C").unwrap();
        assert!(!c.is_imported());
        assert_eq!(bean_methods(&parser, "app.C"), vec!["shared"]);
    }

    #[test]
    fn test_circular_import_reported_once() {
        let reader = SimpleMetadataReaderFactory::new()
            .with(ClassMetadata::configuration("app.A").imports(vec!["app.B"]))
            .with(ClassMetadata::configuration("app.B").imports(vec!["app.A"]));
        let mut parser = new_parser(reader);
        parser.parse(vec![explicit("app.A")]).unwrap();

        let problems = parser.problems();
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].kind, ProblemKind::CircularImport);
        assert!(problems[0].message.contains("[A->B]"));
        assert!(parser.configuration_class("app.A").is_some());
        assert!(parser.configuration_class("app.B").is_some());
    }

    #[test]
    fn test_circular_import_fail_fast() {
        let reader = SimpleMetadataReaderFactory::new()
            .with(ClassMetadata::configuration("app.A").imports(vec!["app.B"]))
            .with(ClassMetadata::configuration("app.B").imports(vec!["app.A"]));
        let mut parser = new_parser(reader).with_problem_reporter(Arc::new(FailFastProblemReporter));
        assert!(matches!(
            parser.parse(vec![explicit("app.A")]),
            Err(ContextError::Problem(problem)) if problem.kind == ProblemKind::CircularImport
        ));
    }

    #[test]
    fn test_import_depth_limit() {
        let reader = SimpleMetadataReaderFactory::new()
            .with(ClassMetadata::configuration("app.A").imports(vec!["app.B"]))
            .with(ClassMetadata::configuration("app.B").imports(vec!["app.C"]))
            .with(ClassMetadata::configuration("app.C").imports(vec!["app.D"]))
            .with(ClassMetadata::configuration("app.D").imports(vec!["app.E"]))
            .with(ClassMetadata::configuration("app.E"));
        let mut parser = new_parser(reader).with_max_import_depth(3);
        parser.parse(vec![explicit("app.A")]).unwrap();

        let problems = parser.problems();
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].kind, ProblemKind::ImportDepthExceeded);
        assert!(parser.configuration_class("app.D").is_some());
        assert!(parser.configuration_class("app.E").is_none());
    }

    #[test]
    fn test_superclass_processed_once() {
        let reader = SimpleMetadataReaderFactory::new()
            .with(bean_class("app.Left", "left").extends("app.Base"))
            .with(bean_class("app.Right", "right").extends("app.Base"))
            .with(bean_class("app.Base", "base").extends("std::any::Any"));
        let mut parser = new_parser(reader);
        parser.parse(vec![explicit("app.Left"), explicit("app.Right")]).unwrap();

        assert_eq!(bean_methods(&parser, "app.Left"), vec!["left", "base"]);
        assert_eq!(bean_methods(&parser, "app.Right"), vec!["right"]);
        assert_eq!(parser.known_superclasses().len(), 1);
        assert!(parser.configuration_class("app.Base").is_none());
    }

    #[test]
    fn test_missing_superclass_metadata() {
        let reader = SimpleMetadataReaderFactory::new().with(bean_class("app.Child", "child").extends("app.Unknown"));
        let mut parser = new_parser(reader);
        assert!(matches!(
            parser.parse(vec![explicit("app.Child")]),
            Err(ContextError::ClassNotFound(name)) if name == "app.Unknown"
        ));
    }

    #[test]
    fn test_imports_from_meta_annotations() {
        let reader = SimpleMetadataReaderFactory::new()
            .with(
                ClassMetadata::new("app.EnableCaching")
                    .annotation_type()
                    .annotated(AnnotationDescriptor::new("app.EnableFeature"))
                    .imports(vec!["app.CachingConfig"]),
            )
            .with(
                ClassMetadata::new("app.EnableFeature")
                    .annotation_type()
                    .annotated(AnnotationDescriptor::new("app.EnableCaching"))
                    .imports(vec!["app.FeatureConfig"]),
            )
            .with(bean_class("app.CachingConfig", "cacheManager"))
            .with(bean_class("app.FeatureConfig", "feature"))
            .with(bean_class("app.DirectConfig", "direct"))
            .with(
                ClassMetadata::configuration("app.AppConfig")
                    .annotated(AnnotationDescriptor::new("app.EnableCaching"))
                    .imports(vec!["app.DirectConfig", "app.CachingConfig"]),
            );
        let mut parser = new_parser(reader);
        parser.parse(vec![explicit("app.AppConfig")]).unwrap();

        assert_eq!(
            class_names(&parser),
            vec!["app.FeatureConfig", "app.CachingConfig", "app.DirectConfig", "app.AppConfig"]
        );
        assert!(parser.problems().is_empty());
    }

    struct FixedSelector {
        imports: Vec<&'static str>,
        order: i32,
        group: Option<&'static str>,
        excluded: Option<&'static str>,
    }

    impl FixedSelector {
        fn new(imports: Vec<&'static str>) -> Self {
            Self {
                imports,
                order: chimera_core::LOWEST_PRECEDENCE,
                group: None,
                excluded: None,
            }
        }
    }

    impl ImportSelector for FixedSelector {
        fn select_imports(&self, _importing: &ClassMetadata) -> Vec<String> {
            self.imports.iter().map(|s| s.to_string()).collect()
        }

        fn exclusion_filter(&self) -> Option<ExclusionFilter> {
            self.excluded
                .map(|excluded| ExclusionFilter::new(move |name| name == excluded))
        }
    }

    impl Ordered for FixedSelector {
        fn order(&self) -> i32 {
            self.order
        }
    }

    impl DeferredImportSelector for FixedSelector {
        fn import_group(&self) -> Option<&str> {
            self.group
        }
    }

    /// 去重并按类名排序
    #[derive(Default)]
    struct SortedGroup {
        entries: Vec<GroupEntry>,
    }

    impl DeferredImportGroup for SortedGroup {
        fn process(&mut self, importing: &ClassMetadata, selector: &dyn DeferredImportSelector) {
            for import_class_name in selector.select_imports(importing) {
                if !self.entries.iter().any(|e| e.import_class_name == import_class_name) {
                    self.entries.push(GroupEntry {
                        importing_class: importing.class_name().to_string(),
                        import_class_name,
                    });
                }
            }
        }

        fn select_imports(&mut self) -> Vec<GroupEntry> {
            let mut entries = std::mem::take(&mut self.entries);
            entries.sort_by(|a, b| a.import_class_name.cmp(&b.import_class_name));
            entries
        }
    }

    fn sorted_group() -> Box<dyn DeferredImportGroup> {
        Box::<SortedGroup>::default()
    }

    #[test]
    fn test_deferred_selector_runs_last_and_once() {
        let reader = SimpleMetadataReaderFactory::new()
            .with(ClassMetadata::configuration("app.X").imports(vec!["app.Sel", "app.Plain"]))
            .with(ClassMetadata::configuration("app.Z").imports(vec!["app.Sel"]))
            .with(bean_class("app.Plain", "plain"))
            .with(bean_class("app.Y", "y"));
        let imports = ImportCandidateRegistry::new().deferred_selector("app.Sel", Arc::new(FixedSelector::new(vec!["app.Y"])));
        let mut parser = new_parser(reader).with_import_candidates(imports);
        parser.parse(vec![explicit("app.X"), explicit("app.Z")]).unwrap();

        assert_eq!(class_names(&parser), vec!["app.Plain", "app.X", "app.Z", "app.Y"]);
        let y = parser.configuration_class("app.Y").unwrap();
        assert_eq!(y.imported_by().iter().collect::<Vec<_>>(), vec!["app.X", "app.Z"]);
        assert_eq!(bean_methods(&parser, "app.Y"), vec!["y"]);
    }

    #[test]
    fn test_deferred_groups_ordered_and_filtered() {
        let reader = SimpleMetadataReaderFactory::new()
            .with(ClassMetadata::configuration("app.X").imports(vec!["app.Late", "app.GroupA", "app.GroupB", "app.Early"]))
            .with(bean_class("app.First", "first"))
            .with(bean_class("app.Second", "second"))
            .with(bean_class("app.Third", "third"))
            .with(bean_class("app.Excluded", "excluded"));
        let early = FixedSelector {
            order: 1,
            ..FixedSelector::new(vec!["app.First"])
        };
        let late = FixedSelector {
            order: 10,
            ..FixedSelector::new(vec!["app.Third"])
        };
        let group_a = FixedSelector {
            order: 5,
            group: Some("sorted"),
            excluded: Some("app.Excluded"),
            ..FixedSelector::new(vec!["app.Second", "app.Excluded"])
        };
        let group_b = FixedSelector {
            order: 5,
            group: Some("sorted"),
            ..FixedSelector::new(vec!["app.Second"])
        };
        let imports = ImportCandidateRegistry::new()
            .deferred_selector("app.Early", Arc::new(early))
            .deferred_selector("app.Late", Arc::new(late))
            .deferred_selector("app.GroupA", Arc::new(group_a))
            .deferred_selector("app.GroupB", Arc::new(group_b))
            .group("sorted", sorted_group);
        let mut parser = new_parser(reader).with_import_candidates(imports);
        parser.parse(vec![explicit("app.X")]).unwrap();

        assert_eq!(class_names(&parser), vec!["app.X", "app.First", "app.Second", "app.Third"]);
    }

    #[test]
    fn test_unknown_import_group() {
        let reader = SimpleMetadataReaderFactory::new().with(ClassMetadata::configuration("app.X").imports(vec!["app.Sel"]));
        let selector = FixedSelector {
            group: Some("missing"),
            ..FixedSelector::new(vec![])
        };
        let imports = ImportCandidateRegistry::new().deferred_selector("app.Sel", Arc::new(selector));
        let mut parser = new_parser(reader).with_import_candidates(imports);
        assert!(matches!(
            parser.parse(vec![explicit("app.X")]),
            Err(ContextError::UnknownImportGroup(_))
        ));
    }

    #[test]
    fn test_selector_and_exclusion_filter() {
        let reader = SimpleMetadataReaderFactory::new()
            .with(ClassMetadata::configuration("app.X").imports(vec!["app.Sel", "app.Skipped"]))
            .with(bean_class("app.Selected", "selected"))
            .with(bean_class("app.Skipped", "skipped"));
        let selector = FixedSelector {
            excluded: Some("app.Skipped"),
            ..FixedSelector::new(vec!["app.Selected", "std::string::String"])
        };
        let imports = ImportCandidateRegistry::new().selector("app.Sel", Arc::new(selector));
        let mut parser = new_parser(reader).with_import_candidates(imports);
        parser.parse(vec![explicit("app.X")]).unwrap();

        assert_eq!(class_names(&parser), vec!["app.Selected", "app.X"]);
    }

    struct ImportingRegistrar;

    impl ImportBeanDefinitionRegistrar for ImportingRegistrar {
        fn register_bean_definitions(
            &self,
            importing: &ClassMetadata,
            registry: &DefaultListableBeanFactory,
        ) -> ContainerResult<()> {
            registry.register_singleton(format!("auditFor{}", short_name(importing.class_name())), 1u32)
        }
    }

    #[test]
    fn test_registrars_loaded_at_registration() {
        let reader = SimpleMetadataReaderFactory::new()
            .with(ClassMetadata::configuration("app.X").imports(vec!["app.Registrar", "app.DeferredSel"]))
            .with(ClassMetadata::configuration("app.Y").imports(vec!["app.Registrar"]));
        let imports = ImportCandidateRegistry::new()
            .registrar("app.Registrar", Arc::new(ImportingRegistrar))
            .deferred_selector("app.DeferredSel", Arc::new(FixedSelector::new(vec!["app.Registrar"])));
        let mut parser = new_parser(reader).with_import_candidates(imports);
        parser.parse(vec![explicit("app.X")]).unwrap();
        assert_eq!(parser.configuration_class("app.X").unwrap().registrar_count(), 2);

        let registry = DefaultListableBeanFactory::new();
        let error = parser.load_registrations(&registry).unwrap_err();
        assert!(matches!(error, ContextError::Container(_)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_bean_method_declaration_order() {
        let introspected = ClassMetadata::configuration("app.Beans")
            .method(MethodMetadata::bean("beta"))
            .method(MethodMetadata::bean("alpha"))
            .method(MethodMetadata::bean("gamma"))
            .introspected();
        let declared = ClassMetadata::configuration("app.Beans")
            .method(MethodMetadata::bean("alpha"))
            .method(MethodMetadata::new("helper"))
            .method(MethodMetadata::bean("beta"))
            .method(MethodMetadata::bean("gamma"));
        let mut parser = new_parser(SimpleMetadataReaderFactory::new().with(declared));
        parser
            .parse(vec![ConfigCandidate::metadata("beans", introspected.clone())])
            .unwrap();
        assert_eq!(bean_methods(&parser, "app.Beans"), vec!["alpha", "beta", "gamma"]);

        // 声明顺序缺少方法时保持原顺序
        let partial = ClassMetadata::configuration("app.Beans")
            .method(MethodMetadata::bean("alpha"))
            .method(MethodMetadata::bean("beta"));
        let mut parser = new_parser(SimpleMetadataReaderFactory::new().with(partial));
        parser
            .parse(vec![ConfigCandidate::metadata("beans", introspected)])
            .unwrap();
        assert_eq!(bean_methods(&parser, "app.Beans"), vec!["beta", "alpha", "gamma"]);
    }

    #[test]
    fn test_interface_default_bean_methods() {
        let reader = SimpleMetadataReaderFactory::new()
            .with(
                ClassMetadata::configuration("app.AppConfig")
                    .implements("app.Defaults")
                    .implements("std::fmt::Debug"),
            )
            .with(
                ClassMetadata::new("app.Defaults")
                    .interface()
                    .implements("app.BaseDefaults")
                    .method(MethodMetadata::bean("clock"))
                    .method(MethodMetadata::bean("required").abstract_method()),
            )
            .with(
                ClassMetadata::new("app.BaseDefaults")
                    .interface()
                    .method(MethodMetadata::bean("zone")),
            );
        let mut parser = new_parser(reader);
        parser.parse(vec![explicit("app.AppConfig")]).unwrap();

        let config = parser.configuration_class("app.AppConfig").unwrap();
        let declared: Vec<_> = config
            .bean_methods()
            .iter()
            .map(|m| (m.name(), m.declaring_class.as_str()))
            .collect();
        assert_eq!(declared, vec![("clock", "app.Defaults"), ("zone", "app.BaseDefaults")]);
    }

    #[test]
    fn test_member_classes_ordered() {
        let reader = SimpleMetadataReaderFactory::new()
            .with(
                ClassMetadata::configuration("app.Outer")
                    .member("app.Outer.Second")
                    .member("app.Outer.Helper")
                    .member("app.Outer.First"),
            )
            .with(bean_class("app.Outer.Second", "second").annotated(AnnotationDescriptor::new(ORDER).attr("value", 2i64)))
            .with(bean_class("app.Outer.First", "first").annotated(AnnotationDescriptor::new(ORDER).attr("value", 1i64)))
            .with(ClassMetadata::new("app.Outer.Helper"));
        let mut parser = new_parser(reader);
        parser.parse(vec![explicit("app.Outer")]).unwrap();

        assert_eq!(class_names(&parser), vec!["app.Outer.First", "app.Outer.Second", "app.Outer"]);
        let first = parser.configuration_class("app.Outer.First").unwrap();
        assert!(first.imported_by().contains("app.Outer"));
    }

    #[test]
    fn test_component_scan_registers_configuration_candidates() {
        let reader = SimpleMetadataReaderFactory::new()
            .with(
                ClassMetadata::configuration("app.AppConfig")
                    .annotated(AnnotationDescriptor::new(COMPONENT_SCAN).attr("basePackages", "app.scan")),
            )
            .with(bean_class("app.scan.ScannedConfig", "scanned"))
            .with(ClassMetadata::new("app.scan.OrderService").annotated(AnnotationDescriptor::new(COMPONENT)));
        let mut parser = new_parser(reader);
        parser.parse(vec![explicit("app.AppConfig")]).unwrap();

        // 只标注了 Component 的类也作为配置类处理
        assert_eq!(
            class_names(&parser),
            vec!["app.scan.ScannedConfig", "app.scan.OrderService", "app.AppConfig"]
        );
        assert!(!parser.configuration_class("app.scan.OrderService").unwrap().is_imported());
        let scanned: Vec<_> = parser.scanned_components().iter().map(|c| c.bean_name.as_str()).collect();
        assert_eq!(scanned, vec!["scannedConfig", "orderService"]);
        assert_eq!(
            parser.configuration_class("app.scan.ScannedConfig").unwrap().bean_name(),
            Some("scannedConfig")
        );
    }

    #[test]
    fn test_property_sources_and_import_resources() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("app.toml"), "[app]\nname = \"chimera\"\nresources = \"conf\"\n").unwrap();
        let reader = SimpleMetadataReaderFactory::new().with(
            ClassMetadata::configuration("app.AppConfig")
                .annotated(AnnotationDescriptor::new(PROPERTY_SOURCE).attr("value", "app.toml"))
                .annotated(
                    AnnotationDescriptor::new(PROPERTY_SOURCE)
                        .attr("value", "optional.toml")
                        .attr("ignoreResourceNotFound", true),
                )
                .annotated(AnnotationDescriptor::new(IMPORT_RESOURCE).attr("locations", vec!["${app.resources}/beans.toml"])),
        );
        let env = Arc::new(Environment::new());
        let mut parser = ConfigurationClassParser::new(Arc::new(reader), Arc::clone(&env))
            .with_property_source_loader(Arc::new(TomlPropertySourceLoader::new().with_base_dir(dir.path())));
        parser.parse(vec![explicit("app.AppConfig")]).unwrap();

        assert_eq!(env.get_string("app.name").as_deref(), Some("chimera"));
        assert_eq!(parser.property_source_names(), ["app.toml"]);
        let resources = parser.configuration_class("app.AppConfig").unwrap().imported_resources();
        assert_eq!(resources.get("conf/beans.toml").map(String::as_str), Some(DEFAULT_RESOURCE_READER));
    }

    struct RegisterPhaseFlag(&'static str);

    impl Condition for RegisterPhaseFlag {
        fn matches(&self, context: &ConditionContext<'_>, _metadata: &dyn AnnotatedMetadata) -> bool {
            context.environment.get_bool_or(self.0, false)
        }

        fn phase(&self) -> Option<ConfigurationPhase> {
            Some(ConfigurationPhase::RegisterBean)
        }
    }

    #[test]
    fn test_conditions_in_parse_and_register_phases() {
        let reader = SimpleMetadataReaderFactory::new()
            .with(
                bean_class("app.DevConfig", "devTools")
                    .annotated(AnnotationDescriptor::new(PROFILE).attr("value", "dev")),
            )
            .with(
                bean_class("app.Feature", "feature")
                    .annotated(AnnotationDescriptor::new(CONDITIONAL).attr("value", "featureOn"))
                    .imports(vec!["app.FeatureSupport"]),
            )
            .with(
                ClassMetadata::configuration("app.FeatureSupport")
                    .method(MethodMetadata::bean("support"))
                    .method(
                        MethodMetadata::bean("extra")
                            .annotated(AnnotationDescriptor::new(CONDITIONAL).attr("value", "extraOn")),
                    ),
            )
            .with(ClassMetadata::configuration("app.Other").imports(vec!["app.FeatureSupport"]));
        let env = Arc::new(Environment::new());
        env.add_last(Box::new(
            MapPropertySource::new("flags").with_property("feature.on", ConfigValue::Bool(false)),
        ));
        let conditions = ConditionEvaluator::new(Arc::clone(&env))
            .register("featureOn", Arc::new(RegisterPhaseFlag("feature.on")))
            .register("extraOn", Arc::new(RegisterPhaseFlag("extra.on")));
        let mut parser = ConfigurationClassParser::new(Arc::new(reader), env).with_conditions(conditions);
        parser.parse(vec![explicit("app.DevConfig"), explicit("app.Feature")]).unwrap();

        // profile 条件在解析阶段生效，注册阶段条件不影响解析
        assert_eq!(class_names(&parser), vec!["app.FeatureSupport", "app.Feature"]);

        let registry = DefaultListableBeanFactory::new();
        let registrations = parser.load_registrations(&registry).unwrap();
        assert!(registrations.is_empty());
        assert_eq!(parser.import_registry().importing_class_for("app.FeatureSupport"), None);

        parser.parse(vec![explicit("app.Other")]).unwrap();
        let registrations = parser.load_registrations(&registry).unwrap();
        let support = registrations
            .iter()
            .find(|r| r.class_name == "app.FeatureSupport")
            .unwrap();
        assert_eq!(support.bean_methods, vec!["support"]);
        assert_eq!(support.bean_name, "app.FeatureSupport");
    }

    #[test]
    fn test_validate_reports_problems() {
        let reader = SimpleMetadataReaderFactory::new().with(
            ClassMetadata::configuration("app.Sealed")
                .final_class()
                .method(MethodMetadata::bean("locked").private_method()),
        );
        let mut parser = new_parser(reader);
        parser.parse(vec![explicit("app.Sealed")]).unwrap();
        parser.validate().unwrap();

        let kinds: Vec<_> = parser.problems().iter().map(|p| p.kind).collect();
        assert_eq!(kinds, vec![ProblemKind::FinalConfiguration, ProblemKind::NonOverridableBeanMethod]);
        assert_eq!(parser.problems()[1].location.to_string(), "app.Sealed.locked");
    }
}
