//! Property updates.

use praxis_core::Engine;

use crate::cli::{GlobalOpts, SetArgs};
use crate::error::CliError;
use crate::output;

use super::util;

pub async fn handle(engine: &Engine, args: SetArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let address = util::parse_address(&args.address)?;
    let value = util::parse_value(&args.value);

    if !args.force {
        let node = util::require_node(engine, &address)?;
        match node.property(&args.property) {
            Some(p) if p.read_only => {
                return Err(CliError::Validation {
                    field: args.property,
                    reason: format!("read-only on {address} (use --force to send anyway)"),
                });
            }
            Some(_) => {}
            None if node.control(&args.property).is_some() => {}
            None => {
                return Err(CliError::NotFound {
                    resource_type: "property".into(),
                    identifier: format!("{address}.{}", args.property),
                    list_command: format!("node {address}"),
                });
            }
        }
    }

    let accepted = engine.update_property(&address, &args.property, value.clone()).await?;
    if !accepted {
        return Err(CliError::Refused {
            operation: format!("update of {address}.{}", args.property),
        });
    }

    output::print_status(
        &format!("Sent {}={} to {address}", args.property, util::format_value(&value)),
        global.quiet,
    );
    Ok(())
}
