//! link command - Print a download URL on a selected node

use clap::Args;
use ns_http::StorageClient;

use super::report;
use crate::exit_code::ExitCode;
use crate::output::Formatter;

#[derive(Args, Debug)]
pub struct LinkArgs {
    /// Object key
    pub key: String,
}

pub async fn execute(args: LinkArgs, client: &StorageClient, formatter: &Formatter) -> ExitCode {
    match client.modifier().link(&args.key).await {
        Ok(url) => {
            if formatter.is_json() {
                formatter.json(&serde_json::json!({ "key": args.key, "url": url }));
            } else {
                formatter.println(&formatter.style_url(&url));
            }
            ExitCode::Success
        }
        Err(e) => report(formatter, "Cannot build link", &e),
    }
}
