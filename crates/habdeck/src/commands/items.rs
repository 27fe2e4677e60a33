//! Item listing.

use tabled::Tabled;

use habdeck_core::ConnectionManager;

use crate::cli::{GlobalOpts, ItemsArgs};
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct ItemRow {
    #[tabled(rename = "Item")]
    name: String,
}

pub async fn handle(
    connection: &ConnectionManager,
    args: ItemsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if args.refresh {
        connection.clear_item_cache().await;
    }
    let names = connection.fetch_items().await?;

    let out = output::render_list(
        &global.output,
        names.as_slice(),
        |name| ItemRow { name: name.clone() },
        Clone::clone,
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
