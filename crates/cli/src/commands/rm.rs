//! rm command - Delete an object

use clap::Args;
use ns_http::StorageClient;

use super::report;
use crate::exit_code::ExitCode;
use crate::output::Formatter;

#[derive(Args, Debug)]
pub struct RmArgs {
    /// Object key
    pub key: String,
}

pub async fn execute(args: RmArgs, client: &StorageClient, formatter: &Formatter) -> ExitCode {
    match client.modifier().delete_file(&args.key).await {
        Ok(()) => {
            if formatter.is_json() {
                formatter.json(&serde_json::json!({ "deleted": args.key }));
            } else {
                formatter.success(&format!("Removed {}", args.key));
            }
            ExitCode::Success
        }
        Err(e) => report(formatter, "Delete failed", &e),
    }
}
