//! `cig ps`: list running containers.

use crate::output;

/// Executes the `ps` command.
///
/// # Errors
///
/// Returns an error if the cgroup hierarchy cannot be enumerated.
#[allow(clippy::print_stdout)]
pub fn execute() -> anyhow::Result<()> {
    let containers = cig_runtime::registry::Registry::new().list_running()?;
    let rows: Vec<Vec<String>> = containers
        .iter()
        .map(|c| {
            vec![
                c.id.to_string(),
                c.image.clone(),
                c.command.clone(),
                c.pid.to_string(),
            ]
        })
        .collect();
    println!(
        "{}",
        output::format_table(&["CONTAINER ID", "IMAGE", "COMMAND", "PID"], &rows)
    );
    Ok(())
}
