//! 测试用事务管理器

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chimera_aop::{Throwable, Value};
use parking_lot::Mutex;

use crate::definition::TransactionDefinition;
use crate::error::{TransactionError, TransactionResult};
use crate::manager::{
    CallbackPreferringPlatformTransactionManager, PlatformTransactionManager,
    ReactiveTransactionManager, TransactionCallback,
};
use crate::status::{SimpleTransactionStatus, TransactionStatus};

/// 记录 begin / commit / rollback 事件的管理器
#[derive(Default)]
pub(crate) struct RecordingTransactionManager {
    events: Mutex<Vec<String>>,
    definitions: Mutex<Vec<TransactionDefinition>>,
    fail_commit: AtomicBool,
    fail_rollback: AtomicBool,
}

impl RecordingTransactionManager {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_commit(&self) {
        self.fail_commit.store(true, Ordering::SeqCst);
    }

    pub fn fail_rollback(&self) {
        self.fail_rollback.store(true, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    pub fn definitions(&self) -> Vec<TransactionDefinition> {
        self.definitions.lock().clone()
    }

    fn begin(&self, definition: &TransactionDefinition) -> Arc<dyn TransactionStatus> {
        self.events.lock().push("begin".into());
        self.definitions.lock().push(definition.clone());
        Arc::new(SimpleTransactionStatus::new(true))
    }

    fn do_commit(&self, status: &dyn TransactionStatus) -> TransactionResult<()> {
        if status.is_rollback_only() {
            return self.do_rollback();
        }
        if self.fail_commit.load(Ordering::SeqCst) {
            self.events.lock().push("commit-failed".into());
            return Err(TransactionError::system("Could not commit transaction"));
        }
        self.events.lock().push("commit".into());
        Ok(())
    }

    fn do_rollback(&self) -> TransactionResult<()> {
        if self.fail_rollback.load(Ordering::SeqCst) {
            self.events.lock().push("rollback-failed".into());
            return Err(TransactionError::system("Could not roll back transaction"));
        }
        self.events.lock().push("rollback".into());
        Ok(())
    }
}

impl PlatformTransactionManager for RecordingTransactionManager {
    fn get_transaction(
        &self,
        definition: &TransactionDefinition,
    ) -> TransactionResult<Arc<dyn TransactionStatus>> {
        Ok(self.begin(definition))
    }

    fn commit(&self, status: &dyn TransactionStatus) -> TransactionResult<()> {
        self.do_commit(status)
    }

    fn rollback(&self, _status: &dyn TransactionStatus) -> TransactionResult<()> {
        self.do_rollback()
    }
}

impl CallbackPreferringPlatformTransactionManager for RecordingTransactionManager {
    fn execute(
        &self,
        definition: &TransactionDefinition,
        callback: &mut TransactionCallback<'_>,
    ) -> Result<Value, Throwable> {
        let status = self.begin(definition);
        match callback(Arc::clone(&status)) {
            Ok(value) => {
                self.do_commit(status.as_ref())?;
                Ok(value)
            }
            Err(error) => {
                self.do_rollback()?;
                Err(error)
            }
        }
    }
}

#[async_trait]
impl ReactiveTransactionManager for RecordingTransactionManager {
    async fn get_reactive_transaction(
        &self,
        definition: &TransactionDefinition,
    ) -> TransactionResult<Arc<dyn TransactionStatus>> {
        Ok(self.begin(definition))
    }

    async fn commit(&self, status: Arc<dyn TransactionStatus>) -> TransactionResult<()> {
        self.do_commit(status.as_ref())
    }

    async fn rollback(&self, _status: Arc<dyn TransactionStatus>) -> TransactionResult<()> {
        self.do_rollback()
    }
}
