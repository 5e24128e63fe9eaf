//! stat command - Show object metadata

use clap::Args;
use ns_http::StorageClient;
use serde::Serialize;

use super::report;
use crate::exit_code::ExitCode;
use crate::output::Formatter;

#[derive(Args, Debug)]
pub struct StatArgs {
    /// Object key
    pub key: String,
}

#[derive(Debug, Serialize)]
struct StatOutput {
    key: String,
    bucket: String,
    size_bytes: u64,
    size_human: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_modified: Option<String>,
    is_dir: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    url: String,
}

pub async fn execute(args: StatArgs, client: &StorageClient, formatter: &Formatter) -> ExitCode {
    let meta = match client.modifier().meta_info(&args.key).await {
        Ok(meta) => meta,
        Err(e) => return report(formatter, "Stat failed", &e),
    };

    let output = StatOutput {
        key: args.key,
        bucket: client.bucket().to_string(),
        size_bytes: meta.size,
        size_human: formatter.format_size(meta.size),
        last_modified: meta.modified().map(|t| t.to_string()),
        is_dir: meta.is_dir,
        url: meta.url.clone(),
    };

    if formatter.is_json() {
        formatter.json(&output);
        return ExitCode::Success;
    }

    let row = |key: &str, value: String| {
        formatter.println(&format!("{} {value}", formatter.style_key(&format!("{key:<10}"))));
    };
    row("Name:", output.key.clone());
    row("Bucket:", formatter.style_name(&output.bucket));
    row(
        "Size:",
        formatter.style_size(&format!("{} ({} bytes)", output.size_human, output.size_bytes)),
    );
    row(
        "Modified:",
        formatter.style_date(&formatter.format_time(meta.modified())),
    );
    row("Type:", if output.is_dir { "folder" } else { "file" }.to_string());
    if !output.url.is_empty() {
        row("URL:", formatter.style_url(&output.url));
    }
    ExitCode::Success
}
