//! Interfaces command implementation.

use crate::device::discovery::list_interfaces;
use crate::error::CliError;
use crate::output::get_formatter;

/// Run the interfaces command
pub fn run_interfaces(json: bool) -> Result<(), CliError> {
    let formatter = get_formatter(json);
    let interfaces = list_interfaces()?;

    println!("{}", formatter.format_interfaces(&interfaces));

    Ok(())
}
