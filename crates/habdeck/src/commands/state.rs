//! Single-item state lookup.

use habdeck_core::ConnectionManager;

use crate::cli::{GlobalOpts, StateArgs};
use crate::error::CliError;
use crate::output;

pub async fn handle(
    connection: &ConnectionManager,
    args: StateArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let item = connection.fetch_item_state(&args.item).await?;

    let out = output::render_single(
        &global.output,
        &item,
        |i| {
            let mut lines = vec![format!("Name:   {}", i.name), format!("State:  {}", i.state)];
            if let Some(ref kind) = i.item_type {
                lines.push(format!("Type:   {kind}"));
            }
            if let Some(ref label) = i.label {
                lines.push(format!("Label:  {label}"));
            }
            lines.join("\n")
        },
        |i| i.state.clone(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
