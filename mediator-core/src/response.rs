use crate::error::{MediatorError, MediatorResult};
use crate::model_state::ModelState;
use uuid::Uuid;

/// 分发的最终结果（Response）
///
/// 成功值或捕获的故障，始终关联到发起它的请求（嵌套时附带父请求 id），
/// 并携带该请求的模型状态。
#[derive(Debug)]
pub struct Response<T> {
    request_id: Uuid,
    parent_id: Option<Uuid>,
    command: &'static str,
    result: MediatorResult<T>,
    model_state: ModelState,
}

impl<T> Response<T> {
    pub(crate) fn new(
        request_id: Uuid,
        parent_id: Option<Uuid>,
        command: &'static str,
        result: MediatorResult<T>,
        model_state: ModelState,
    ) -> Self {
        Self {
            request_id,
            parent_id,
            command,
            result,
            model_state,
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn parent_id(&self) -> Option<Uuid> {
        self.parent_id
    }

    pub fn command(&self) -> &'static str {
        self.command
    }

    pub fn result(&self) -> &MediatorResult<T> {
        &self.result
    }

    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    pub fn value(&self) -> Option<&T> {
        self.result.as_ref().ok()
    }

    pub fn error(&self) -> Option<&MediatorError> {
        self.result.as_ref().err()
    }

    pub fn model_state(&self) -> &ModelState {
        &self.model_state
    }

    pub fn into_result(self) -> MediatorResult<T> {
        self.result
    }

    pub fn into_parts(self) -> (MediatorResult<T>, ModelState) {
        (self.result, self.model_state)
    }
}
