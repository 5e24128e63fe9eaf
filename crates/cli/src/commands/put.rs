//! put command - Upload a local file

use std::path::PathBuf;

use clap::Args;
use ns_http::{StorageClient, UploadOptions};
use serde::Serialize;

use super::report;
use crate::exit_code::ExitCode;
use crate::output::Formatter;

#[derive(Args, Debug)]
pub struct PutArgs {
    /// Local file to upload
    pub file: PathBuf,

    /// Destination object key
    pub key: String,

    /// Replace an existing object
    #[arg(long)]
    pub overwrite: bool,

    /// Send the file's trailing bytes for the node to verify
    #[arg(long)]
    pub last_bytes: bool,
}

#[derive(Debug, Serialize)]
struct PutOutput {
    key: String,
    bucket: String,
    size_bytes: u64,
    size_human: String,
}

pub async fn execute(args: PutArgs, client: &StorageClient, formatter: &Formatter) -> ExitCode {
    if !args.file.is_file() {
        formatter.error(&format!("Not a file: {}", args.file.display()));
        return ExitCode::UsageError;
    }

    let options = UploadOptions {
        overwrite: args.overwrite,
        last_bytes: args.last_bytes,
    };
    let size = match client
        .uploader()
        .upload_file(&args.file, &args.key, options)
        .await
    {
        Ok(size) => size,
        Err(e) => return report(formatter, "Upload failed", &e),
    };

    if formatter.is_json() {
        formatter.json(&PutOutput {
            key: args.key,
            bucket: client.bucket().to_string(),
            size_bytes: size,
            size_human: formatter.format_size(size),
        });
    } else {
        formatter.success(&format!(
            "{} -> {}/{} ({})",
            args.file.display(),
            formatter.style_name(client.bucket()),
            args.key,
            formatter.style_size(&formatter.format_size(size))
        ));
    }
    ExitCode::Success
}
