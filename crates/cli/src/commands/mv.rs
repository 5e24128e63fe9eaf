//! mv command - Rename an object within the bucket

use clap::Args;
use ns_http::StorageClient;

use super::report;
use crate::exit_code::ExitCode;
use crate::output::Formatter;

#[derive(Args, Debug)]
pub struct MvArgs {
    /// Current object key
    pub key: String,

    /// New object name
    pub new_name: String,
}

pub async fn execute(args: MvArgs, client: &StorageClient, formatter: &Formatter) -> ExitCode {
    if args.key == args.new_name {
        formatter.error("Source and destination are the same");
        return ExitCode::UsageError;
    }

    match client.modifier().rename_file(&args.key, &args.new_name).await {
        Ok(()) => {
            if formatter.is_json() {
                formatter.json(&serde_json::json!({
                    "from": args.key,
                    "to": args.new_name,
                }));
            } else {
                formatter.success(&format!("{} -> {}", args.key, args.new_name));
            }
            ExitCode::Success
        }
        Err(e) => report(formatter, "Rename failed", &e),
    }
}
