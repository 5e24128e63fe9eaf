//! health command - Check every candidate node and show tracker state

use ns_http::{HostStatus, StorageClient};

use super::report;
use crate::exit_code::ExitCode;
use crate::output::Formatter;

pub async fn execute(client: &StorageClient, formatter: &Formatter) -> ExitCode {
    let statuses = match client.check_hosts().await {
        Ok(statuses) => statuses,
        Err(e) => return report(formatter, "Host check failed", &e),
    };
    let code = exit_code(&statuses);

    if formatter.is_json() {
        formatter.json(&statuses);
        return code;
    }

    let mut table = formatter.table(&["HOST", "STATUS", "FAILURES", "COOLDOWN"]);
    for status in &statuses {
        let state = if status.usable { "up" } else { "down" };
        let cooldown = if status.cooldown_ms > 0 {
            format!("{}ms", status.cooldown_ms)
        } else {
            "-".to_string()
        };
        table.add_row(vec![
            formatter.style_url(&status.host),
            state.to_string(),
            status.failures.to_string(),
            cooldown,
        ]);
    }
    formatter.print_table(&table);

    for status in &statuses {
        if let Some(error) = &status.error {
            formatter.warning(&format!("{}: {error}", status.host));
        }
    }
    code
}

/// Success while at least one node answers
fn exit_code(statuses: &[HostStatus]) -> ExitCode {
    if statuses.iter().any(|s| s.usable) {
        ExitCode::Success
    } else {
        ExitCode::NetworkError
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(host: &str, usable: bool) -> HostStatus {
        HostStatus {
            host: host.to_string(),
            usable,
            failures: u32::from(!usable),
            cooldown_ms: if usable { 0 } else { 5_000 },
            error: None,
        }
    }

    #[test]
    fn test_exit_code_needs_one_usable_node() {
        assert_eq!(
            exit_code(&[status("a:1", false), status("b:1", true)]),
            ExitCode::Success
        );
        assert_eq!(exit_code(&[status("a:1", false)]), ExitCode::NetworkError);
    }
}
