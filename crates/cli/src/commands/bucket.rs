//! Bucket commands - mb, rb and buckets

use clap::Args;
use ns_http::StorageClient;
use serde::Serialize;

use super::report;
use crate::exit_code::ExitCode;
use crate::output::Formatter;

#[derive(Args, Debug)]
pub struct MakeBucketArgs {
    /// Bucket name
    pub bucket: String,

    /// Succeed if the bucket already exists
    #[arg(short = 'p', long)]
    pub ignore_existing: bool,
}

#[derive(Args, Debug)]
pub struct RemoveBucketArgs {
    /// Bucket name
    pub bucket: String,
}

#[derive(Debug, Serialize)]
struct BucketOutput {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    created: Option<String>,
    size_limit: i64,
}

pub async fn execute_make(
    args: MakeBucketArgs,
    client: &StorageClient,
    formatter: &Formatter,
) -> ExitCode {
    let bucketer = client.bucketer();

    if args.ignore_existing {
        match bucketer.bucket_exists(&args.bucket).await {
            Ok(true) => {
                formatter.success(&format!(
                    "Bucket {} already exists",
                    formatter.style_name(&args.bucket)
                ));
                return ExitCode::Success;
            }
            Ok(false) => {}
            Err(e) => return report(formatter, "Bucket check failed", &e),
        }
    }

    match bucketer.make_bucket(&args.bucket).await {
        Ok(()) => {
            if formatter.is_json() {
                formatter.json(&serde_json::json!({ "created": args.bucket }));
            } else {
                formatter.success(&format!(
                    "Bucket {} created",
                    formatter.style_name(&args.bucket)
                ));
            }
            ExitCode::Success
        }
        Err(e) => report(formatter, "Failed to create bucket", &e),
    }
}

pub async fn execute_remove(
    args: RemoveBucketArgs,
    client: &StorageClient,
    formatter: &Formatter,
) -> ExitCode {
    match client.bucketer().delete_bucket(&args.bucket).await {
        Ok(()) => {
            if formatter.is_json() {
                formatter.json(&serde_json::json!({ "deleted": args.bucket }));
            } else {
                formatter.success(&format!(
                    "Bucket {} removed",
                    formatter.style_name(&args.bucket)
                ));
            }
            ExitCode::Success
        }
        Err(e) => report(formatter, "Failed to remove bucket", &e),
    }
}

pub async fn execute_list(client: &StorageClient, formatter: &Formatter) -> ExitCode {
    let buckets = match client.bucketer().list_buckets().await {
        Ok(buckets) => buckets,
        Err(e) => return report(formatter, "Failed to list buckets", &e),
    };

    if formatter.is_json() {
        let output: Vec<BucketOutput> = buckets
            .iter()
            .map(|b| BucketOutput {
                name: b.name.clone(),
                created: b.created().map(|t| t.to_string()),
                size_limit: b.size_limit,
            })
            .collect();
        formatter.json(&output);
        return ExitCode::Success;
    }

    if buckets.is_empty() {
        formatter.println("No buckets found.");
        return ExitCode::Success;
    }

    let mut table = formatter.table(&["CREATED", "LIMIT", "BUCKET"]);
    for bucket in &buckets {
        let limit = if bucket.size_limit > 0 {
            formatter.format_size(bucket.size_limit as u64)
        } else {
            "-".to_string()
        };
        table.add_row(vec![
            formatter.format_time(bucket.created()),
            limit,
            bucket.name.clone(),
        ]);
    }
    formatter.print_table(&table);
    ExitCode::Success
}
