//! INTERACTIVE_VALIDATION blocks: checkpoint with the operator.

use super::BlockOutcome;
use crate::context::MigrationContext;
use crate::error::{MigrateError, Result};
use crate::plan::model::ValidationType;
use crate::prompt::{ask_yes_no, Answer, Prompter};
use serde_json::Value;
use std::sync::{Arc, Mutex};

pub async fn run(
    block_name: &str,
    message: &str,
    validation_type: ValidationType,
    required: bool,
    ctx: &MigrationContext,
    prompter: Arc<Mutex<dyn Prompter>>,
) -> Result<BlockOutcome> {
    let rendered = ctx.render_lenient(message);
    let question = match validation_type {
        ValidationType::ManualConfirm => format!("Confirm: {}", rendered),
        ValidationType::Review => format!("Review and accept: {}", rendered),
        ValidationType::Approval => format!("Approve: {}", rendered),
    };
    let block = block_name.to_string();

    // The prompt is a blocking read; the engine-imposed timeout wraps this
    // future, so the read runs off the async worker.
    let answer = tokio::task::spawn_blocking(move || {
        let mut prompter = prompter.lock().unwrap();
        ask_yes_no(&mut *prompter, &question)
    })
    .await
    .map_err(|e| MigrateError::Config(format!("prompt task failed: {}", e)))?;

    match answer {
        Answer::Yes | Answer::SkipAll => Ok(BlockOutcome::of(Value::String("accepted".into()))
            .with_message("operator accepted")),
        Answer::No if required => Err(MigrateError::BlockFailure {
            block,
            kind: "declined".into(),
            message: "operator declined a required validation".into(),
        }),
        Answer::No => Ok(BlockOutcome::of(Value::String("declined".into()))
            .with_message("operator declined (non-blocking)")),
    }
}
