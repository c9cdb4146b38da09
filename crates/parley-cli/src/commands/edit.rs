use super::{App, generate, report};
use anyhow::Result;
use parley_application::{EditAction, EditOutcome, EditResubmitController, MessageEdit};
use std::sync::Arc;

pub async fn run(
    app: &App,
    session_id: &str,
    message_id: &str,
    content: String,
    action: EditAction,
) -> Result<()> {
    let controller = EditResubmitController::new(Arc::clone(&app.orchestrator));
    let edit = MessageEdit::new(session_id, message_id, content);

    let outcome = app
        .interruptible(session_id, controller.apply(edit, action))
        .await?;
    match outcome {
        EditOutcome::Discarded => println!("Edit discarded"),
        EditOutcome::Saved => println!("Saved"),
        EditOutcome::Generated(outcome) => {
            report(&outcome);
            generate::print_reply(app, session_id, outcome.message_id()).await?;
        }
    }
    Ok(())
}
