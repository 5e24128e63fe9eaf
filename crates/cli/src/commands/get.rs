//! get command - Download an object
//!
//! Writes to stdout unless `--output` is given. File downloads resume from
//! whatever is already on disk.

use std::path::PathBuf;

use clap::Args;
use futures::StreamExt;
use ns_core::ByteRange;
use ns_http::StorageClient;
use serde::Serialize;
use tokio::io::AsyncWriteExt;

use super::report;
use crate::exit_code::ExitCode;
use crate::output::Formatter;

#[derive(Args, Debug)]
pub struct GetArgs {
    /// Object key
    pub key: String,

    /// Local file to write; partial files are resumed
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Byte range as `offset:length`; an offset of -1 takes the last bytes
    #[arg(short, long, allow_hyphen_values = true)]
    pub range: Option<String>,
}

#[derive(Debug, Serialize)]
struct GetOutput {
    key: String,
    path: String,
    size_bytes: u64,
    size_human: String,
}

pub async fn execute(args: GetArgs, client: &StorageClient, formatter: &Formatter) -> ExitCode {
    let range = match args.range.as_deref().map(parse_range).transpose() {
        Ok(range) => range,
        Err(e) => {
            formatter.error(&e);
            return ExitCode::UsageError;
        }
    };

    let downloader = client.downloader();
    let written = match (&args.output, range) {
        (Some(path), None) => downloader.download_file(&args.key, path).await,
        (target, Some(range)) => {
            let (total, mut stream) =
                match downloader.download_range_stream(&args.key, range).await {
                    Ok(found) => found,
                    Err(e) => return report(formatter, "Download failed", &e),
                };
            tracing::debug!(key = %args.key, total = total, "Streaming range");

            let mut sink: Box<dyn tokio::io::AsyncWrite + Unpin + Send> = match target {
                Some(path) => match tokio::fs::File::create(path).await {
                    Ok(file) => Box::new(file),
                    Err(e) => {
                        formatter.error(&format!("Cannot create {}: {e}", path.display()));
                        return ExitCode::GeneralError;
                    }
                },
                None => Box::new(tokio::io::stdout()),
            };

            let mut written = 0u64;
            while let Some(chunk) = stream.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => return report(formatter, "Download interrupted", &e),
                };
                if let Err(e) = sink.write_all(&chunk).await {
                    formatter.error(&format!("Write failed: {e}"));
                    return ExitCode::GeneralError;
                }
                written += chunk.len() as u64;
            }
            if let Err(e) = sink.flush().await {
                formatter.error(&format!("Write failed: {e}"));
                return ExitCode::GeneralError;
            }
            Ok(written)
        }
        (None, None) => match downloader.download_bytes(&args.key).await {
            Ok(body) => {
                let mut stdout = tokio::io::stdout();
                if let Err(e) = stdout.write_all(&body).await {
                    formatter.error(&format!("Write failed: {e}"));
                    return ExitCode::GeneralError;
                }
                let _ = stdout.flush().await;
                return ExitCode::Success;
            }
            Err(e) => Err(e),
        },
    };

    let size = match written {
        Ok(size) => size,
        Err(e) => return report(formatter, "Download failed", &e),
    };

    // Data on stdout leaves no room for a summary
    let Some(path) = args.output else {
        return ExitCode::Success;
    };

    if formatter.is_json() {
        formatter.json(&GetOutput {
            key: args.key,
            path: path.display().to_string(),
            size_bytes: size,
            size_human: formatter.format_size(size),
        });
    } else {
        formatter.success(&format!(
            "{} -> {} ({})",
            args.key,
            path.display(),
            formatter.style_size(&formatter.format_size(size))
        ));
    }
    ExitCode::Success
}

/// Parse `offset:length`
fn parse_range(value: &str) -> Result<ByteRange, String> {
    let (offset, length) = value
        .split_once(':')
        .ok_or_else(|| format!("Invalid range '{value}', expected offset:length"))?;
    let offset: i64 = offset
        .trim()
        .parse()
        .map_err(|_| format!("Invalid range offset: {offset}"))?;
    let length: u64 = length
        .trim()
        .parse()
        .map_err(|_| format!("Invalid range length: {length}"))?;
    ByteRange::new(offset, length).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_range() {
        assert_eq!(
            parse_range("100:50").unwrap(),
            ByteRange::Span {
                offset: 100,
                size: 50
            }
        );
        assert_eq!(parse_range("-1:32").unwrap(), ByteRange::Suffix(32));
        assert!(parse_range("100").is_err());
        assert!(parse_range("a:1").is_err());
        assert!(parse_range("-5:1").is_err());
    }
}
