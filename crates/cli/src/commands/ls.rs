//! ls command - List objects by prefix

use clap::Args;
use ns_http::{ObjectEntry, StorageClient};
use serde::Serialize;

use super::report;
use crate::exit_code::ExitCode;
use crate::output::Formatter;

#[derive(Args, Debug)]
pub struct LsArgs {
    /// Only list keys starting with this prefix
    #[arg(short, long, default_value = "")]
    pub prefix: String,

    /// Maximum number of entries to return
    #[arg(short = 'n', long, default_value = "1000")]
    pub limit: usize,
}

#[derive(Debug, Serialize)]
struct LsOutput {
    bucket: String,
    prefix: String,
    items: Vec<LsItem>,
    count: usize,
}

#[derive(Debug, Serialize)]
struct LsItem {
    key: String,
    size_bytes: u64,
    size_human: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_modified: Option<String>,
    is_dir: bool,
}

pub async fn execute(args: LsArgs, client: &StorageClient, formatter: &Formatter) -> ExitCode {
    if args.limit == 0 {
        formatter.error("--limit must be at least 1");
        return ExitCode::UsageError;
    }

    let page = match client.modifier().list_objects(&args.prefix, args.limit).await {
        Ok(page) => page,
        Err(e) => return report(formatter, "Listing failed", &e),
    };

    if formatter.is_json() {
        let items: Vec<LsItem> = page.data.iter().map(|e| item(formatter, e)).collect();
        formatter.json(&LsOutput {
            bucket: client.bucket().to_string(),
            prefix: args.prefix,
            count: items.len(),
            items,
        });
        return ExitCode::Success;
    }

    if page.data.is_empty() {
        formatter.println("No objects found.");
        return ExitCode::Success;
    }

    let mut table = formatter.table(&["SIZE", "MODIFIED", "KEY"]);
    for entry in &page.data {
        let name = if entry.is_dir {
            format!("{}/", entry.name.trim_end_matches('/'))
        } else {
            entry.name.clone()
        };
        table.add_row(vec![
            formatter.format_size(entry.size),
            formatter.format_time(entry.modified()),
            name,
        ]);
    }
    formatter.print_table(&table);
    if page.len > page.data.len() as u64 {
        formatter.warning(&format!(
            "Showing {} of {} objects, raise --limit for more",
            page.data.len(),
            page.len
        ));
    }
    ExitCode::Success
}

fn item(formatter: &Formatter, entry: &ObjectEntry) -> LsItem {
    LsItem {
        key: entry.name.clone(),
        size_bytes: entry.size,
        size_human: formatter.format_size(entry.size),
        last_modified: entry.modified().map(|t| t.to_string()),
        is_dir: entry.is_dir,
    }
}
