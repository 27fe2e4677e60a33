//! Command sending.

use habdeck_core::{CommandValue, ConnectionManager};

use crate::cli::{GlobalOpts, SendArgs};
use crate::error::CliError;

pub async fn handle(
    connection: &ConnectionManager,
    args: SendArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let value = args.value.trim();
    if value.is_empty() {
        return Err(CliError::Validation {
            field: "value".into(),
            reason: "command value cannot be empty".into(),
        });
    }

    connection
        .post_command(&args.item, &CommandValue::from(value))
        .await?;
    if !global.quiet {
        eprintln!("✓ Sent {value} to {}", args.item);
    }
    Ok(())
}
