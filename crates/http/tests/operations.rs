//! Operation clients against local storage nodes

mod common;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use common::{TestNode, client, dead_host};
use ns_core::{ByteRange, Error, FROM_END};
use ns_http::UploadOptions;

fn sample(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

#[tokio::test]
async fn test_download_fails_over_to_healthy_node() {
    let node = TestNode::start().await;
    node.state.insert("a.bin", b"hello");
    let dead = dead_host();
    let client = client(vec![dead.clone(), node.addr.clone()]);

    for _ in 0..4 {
        let body = client.downloader().download_bytes("a.bin").await.unwrap();
        assert_eq!(&body[..], b"hello");
    }

    // Round-robin reaches the dead node within two calls; after that it is
    // skipped while cooling down.
    assert!(!client.router().health().is_usable(&dead));
    assert!(client.router().health().is_usable(&node.addr));
    assert_eq!(node.state.requests(), 4);
}

#[tokio::test]
async fn test_missing_object_is_not_retried() {
    let node = TestNode::start().await;
    let client = client(vec![node.addr.clone()]);

    let err = client.downloader().download_bytes("missing").await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    assert_eq!(node.state.requests(), 1);
    assert!(client.router().health().is_usable(&node.addr));

    assert!(!client.downloader().exists("missing").await.unwrap());
}

#[tokio::test]
async fn test_all_nodes_down_returns_network_error() {
    let client = client(vec![dead_host(), dead_host()]);
    let err = client.downloader().download_bytes("a.bin").await.unwrap_err();
    assert!(matches!(err, Error::Network(_)), "unexpected error: {err:?}");
}

#[tokio::test]
async fn test_range_download() {
    let node = TestNode::start().await;
    let data = sample(100);
    node.state.insert("r.bin", &data);
    let downloader = client(vec![node.addr.clone()]).downloader();

    let (total, body) = downloader
        .download_range("r.bin", ByteRange::new(10, 20).unwrap())
        .await
        .unwrap();
    assert_eq!(total, 100);
    assert_eq!(&body[..], &data[10..30]);
    assert_eq!(node.state.last_headers()["range"], "bytes=10-30");

    let (total, body) = downloader
        .download_range("r.bin", ByteRange::new(FROM_END, 8).unwrap())
        .await
        .unwrap();
    assert_eq!(total, 100);
    assert_eq!(&body[..], &data[92..]);
}

#[tokio::test]
async fn test_range_stream_download() {
    use futures::TryStreamExt;

    let node = TestNode::start().await;
    let data = sample(64);
    node.state.insert("s.bin", &data);
    let downloader = client(vec![node.addr.clone()]).downloader();

    let (total, stream) = downloader
        .download_range_stream("s.bin", ByteRange::From(32))
        .await
        .unwrap();
    let chunks: Vec<Bytes> = stream.try_collect().await.unwrap();
    assert_eq!(total, 64);
    assert_eq!(chunks.concat(), data[32..]);
}

#[tokio::test]
async fn test_resumable_file_download() {
    let node = TestNode::start().await;
    let data = sample(100);
    node.state.insert("big.bin", &data);
    let downloader = client(vec![node.addr.clone()]).downloader();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("big.bin");
    std::fs::write(&path, &data[..40]).unwrap();

    let len = downloader.download_file("big.bin", &path).await.unwrap();
    assert_eq!(len, 100);
    assert_eq!(node.state.last_headers()["range"], "bytes=40-");
    assert_eq!(std::fs::read(&path).unwrap(), data);

    // Already complete: the node answers 416 and the file is left alone
    let len = downloader.download_file("big.bin", &path).await.unwrap();
    assert_eq!(len, 100);
    assert_eq!(std::fs::read(&path).unwrap(), data);
}

#[tokio::test]
async fn test_upload_bytes_headers() {
    let node = TestNode::start().await;
    let client = client(vec![node.addr.clone()]);
    let data = sample(100);

    client
        .uploader()
        .upload_bytes(
            "dir/u.bin",
            Bytes::from(data.clone()),
            UploadOptions::overwrite().with_last_bytes(),
        )
        .await
        .unwrap();

    assert_eq!(node.state.object("dir/u.bin").unwrap(), data);
    let headers = node.state.last_headers();
    assert_eq!(headers["overwrite"], "true");
    assert_eq!(headers["blocksize"], (4 * 1024 * 1024).to_string().as_str());
    assert_eq!(headers["lastbytes"], STANDARD.encode(&data[68..]).as_str());
}

#[tokio::test]
async fn test_upload_file() {
    let node = TestNode::start().await;
    let client = client(vec![node.addr.clone()]);
    let data = sample(300);

    let mut file = tempfile::NamedTempFile::new().unwrap();
    std::io::Write::write_all(&mut file, &data).unwrap();

    let size = client
        .uploader()
        .upload_file(file.path(), "f.bin", UploadOptions::default())
        .await
        .unwrap();
    assert_eq!(size, 300);
    assert_eq!(node.state.object("f.bin").unwrap(), data);
    let headers = node.state.last_headers();
    assert_eq!(headers["overwrite"], "false");
    assert!(headers.get("lastbytes").is_none());
}

#[tokio::test]
async fn test_stream_upload_runs_once() {
    let node = TestNode::start().await;
    node.state.fail_puts();
    let client = client(vec![node.addr.clone()]);

    let chunks: Vec<std::io::Result<Bytes>> = vec![
        Ok(Bytes::from_static(b"first ")),
        Ok(Bytes::from_static(b"second")),
    ];
    let err = client
        .uploader()
        .upload_stream(
            "s.bin",
            futures::stream::iter(chunks),
            12,
            UploadOptions::default(),
            None,
        )
        .await
        .unwrap_err();

    match err {
        Error::Status { code, message } => {
            assert_eq!(code, 500);
            assert_eq!(message, "disk full");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(node.state.requests(), 1);
}

#[tokio::test]
async fn test_stream_upload() {
    let node = TestNode::start().await;
    let client = client(vec![node.addr.clone()]);

    let chunks: Vec<std::io::Result<Bytes>> = vec![
        Ok(Bytes::from_static(b"first ")),
        Ok(Bytes::from_static(b"second")),
    ];
    client
        .uploader()
        .upload_stream(
            "s.bin",
            futures::stream::iter(chunks),
            12,
            UploadOptions::default().with_last_bytes(),
            Some(&b"second"[..]),
        )
        .await
        .unwrap();

    assert_eq!(node.state.object("s.bin").unwrap(), b"first second");
    assert_eq!(
        node.state.last_headers()["lastbytes"],
        STANDARD.encode(b"second").as_str()
    );
}

#[tokio::test]
async fn test_folder_marker() {
    let node = TestNode::start().await;
    let client = client(vec![node.addr.clone()]);

    client
        .uploader()
        .upload_folder("docs", Bytes::new(), false)
        .await
        .unwrap();
    assert_eq!(node.state.last_headers()["floder"], "docs");
    assert!(node.state.object("docs").is_some());
}

#[tokio::test]
async fn test_modify_operations() {
    let node = TestNode::start().await;
    node.state.insert("logs/a.txt", b"aaaa");
    node.state.insert("logs/b.txt", b"bb");
    node.state.insert("other.txt", b"o");
    let client = client(vec![node.addr.clone()]);
    let modifier = client.modifier();

    let meta = modifier.meta_info("logs/a.txt").await.unwrap();
    assert_eq!(meta.name, "logs/a.txt");
    assert_eq!(meta.size, 4);
    assert!(!meta.is_dir);
    assert_eq!(client.downloader().file_size("logs/b.txt").await.unwrap(), 2);

    let page = modifier.list_objects("logs/", 10).await.unwrap();
    assert_eq!(page.len, 2);
    assert_eq!(page.data[0].name, "logs/a.txt");
    assert_eq!(modifier.list_objects("logs/", 1).await.unwrap().len, 1);

    modifier.rename_file("logs/a.txt", "logs/c.txt").await.unwrap();
    assert!(node.state.object("logs/a.txt").is_none());
    assert_eq!(node.state.object("logs/c.txt").unwrap(), b"aaaa");

    modifier.delete_file("logs/c.txt").await.unwrap();
    assert!(node.state.object("logs/c.txt").is_none());
    assert!(matches!(
        modifier.delete_file("logs/c.txt").await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn test_link_does_no_io() {
    let client = client(vec!["node-1:9000".to_string()]);
    let link = client.modifier().link("/a b.txt").await.unwrap();
    assert_eq!(link, "http://node-1:9000/objects/getfile/photos/a%20b.txt");
}

#[tokio::test]
async fn test_bucket_operations() {
    let node = TestNode::start().await;
    let client = client(vec![node.addr.clone()]);
    let bucketer = client.bucketer();

    assert!(!bucketer.bucket_exists("videos").await.unwrap());
    bucketer.make_bucket("videos").await.unwrap();
    assert!(bucketer.bucket_exists("videos").await.unwrap());

    let buckets = bucketer.list_buckets().await.unwrap();
    assert_eq!(buckets.len(), 1);
    assert_eq!(buckets[0].name, "videos");

    let err = bucketer.make_bucket("videos").await.unwrap_err();
    assert!(matches!(err, Error::Status { code: 409, .. }));

    node.state.insert("v.bin", b"vv");
    let objects = bucketer.list_bucket_objects("photos").await.unwrap();
    assert_eq!(objects.len(), 1);
    assert_eq!(objects[0].name, "v.bin");
    assert_eq!(objects[0].size, 2);

    bucketer.delete_bucket("videos").await.unwrap();
    assert!(!bucketer.bucket_exists("videos").await.unwrap());
}

#[tokio::test]
async fn test_check_hosts_reports_each_node() {
    let node = TestNode::start().await;
    let dead = dead_host();
    let client = client(vec![node.addr.clone(), dead.clone()]);

    let statuses = client.check_hosts().await.unwrap();
    assert_eq!(statuses.len(), 2);

    assert_eq!(statuses[0].host, node.addr);
    assert!(statuses[0].usable);
    assert_eq!(statuses[0].failures, 0);
    assert!(statuses[0].error.is_none());

    assert_eq!(statuses[1].host, dead);
    assert!(!statuses[1].usable);
    assert_eq!(statuses[1].failures, 1);
    assert!(statuses[1].cooldown_ms > 0);
    assert!(statuses[1].error.is_some());

    // The check feeds the same tracker operations select from
    assert!(!client.router().health().is_usable(&dead));
}
