mod common;

use common::{mount_download, test_client};
use hitem3d::Hitem3dError;
use std::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_download_model_success() {
    let server = MockServer::start().await;
    mount_download(&server, "/files/model.bin", b"dummy model data").await;

    let client = test_client(&server);
    let dest_dir = tempfile::tempdir().unwrap();
    let output_dir = dest_dir.path().join("nested").join("output");

    let file_path = client
        .download_model(
            &format!("{}/files/model.bin", server.uri()),
            &output_dir,
            "1",
            "task_42",
        )
        .await
        .unwrap();

    assert_eq!(file_path, output_dir.join("result_task_42.obj"));
    assert_eq!(fs::read_to_string(&file_path).unwrap(), "dummy model data");
    // Only the finished artifact remains.
    assert_eq!(fs::read_dir(&output_dir).unwrap().count(), 1);
}

#[tokio::test]
async fn test_unknown_format_code_saves_as_glb() {
    let server = MockServer::start().await;
    mount_download(&server, "/files/model.bin", b"glb bytes").await;

    let client = test_client(&server);
    let dest_dir = tempfile::tempdir().unwrap();
    let url = format!("{}/files/model.bin", server.uri());

    for code in ["0", "6", "usdz", ""] {
        let file_path = client
            .download_model(&url, dest_dir.path(), code, "task_x")
            .await
            .unwrap();
        assert_eq!(file_path.file_name().unwrap(), "result_task_x.glb");
    }
}

#[tokio::test]
async fn test_refetch_overwrites_artifact() {
    let server = MockServer::start().await;
    mount_download(&server, "/v1.bin", b"first version").await;
    mount_download(&server, "/v2.bin", b"second").await;

    let client = test_client(&server);
    let dest_dir = tempfile::tempdir().unwrap();

    client
        .download_model(&format!("{}/v1.bin", server.uri()), dest_dir.path(), "2", "t")
        .await
        .unwrap();
    let file_path = client
        .download_model(&format!("{}/v2.bin", server.uri()), dest_dir.path(), "2", "t")
        .await
        .unwrap();

    assert_eq!(fs::read_to_string(file_path).unwrap(), "second");
}

#[tokio::test]
async fn test_error_status_is_download_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing.glb"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let dest_dir = tempfile::tempdir().unwrap();
    let err = client
        .download_model(&format!("{}/missing.glb", server.uri()), dest_dir.path(), "2", "t")
        .await
        .unwrap_err();

    assert!(matches!(err, Hitem3dError::Download { .. }));
    assert!(!dest_dir.path().join("result_t.glb").exists());
}

/// Serves one response that promises more bytes than it sends, then hangs up.
async fn truncating_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 4096];
        let _ = socket.read(&mut buf).await;
        let response = "HTTP/1.1 200 OK\r\nContent-Length: 1000\r\nContent-Type: application/octet-stream\r\n\r\npartial model";
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
    });
    format!("http://{}/model.glb", addr)
}

#[tokio::test]
async fn test_truncated_stream_leaves_no_artifact() {
    let server = MockServer::start().await;
    let client = test_client(&server);
    let dest_dir = tempfile::tempdir().unwrap();

    let url = truncating_server().await;
    let err = client
        .download_model(&url, dest_dir.path(), "2", "task_cut")
        .await
        .unwrap_err();

    assert!(matches!(err, Hitem3dError::Download { .. }));
    assert!(!dest_dir.path().join("result_task_cut.glb").exists());
    // The partial file is cleaned up as well.
    assert_eq!(fs::read_dir(dest_dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_unwritable_output_dir_is_download_error() {
    let server = MockServer::start().await;
    mount_download(&server, "/files/model.bin", b"model").await;

    let client = test_client(&server);
    let dest_dir = tempfile::tempdir().unwrap();
    // A regular file where the output directory should be.
    let blocked = dest_dir.path().join("output");
    fs::write(&blocked, b"not a directory").unwrap();

    let err = client
        .download_model(
            &format!("{}/files/model.bin", server.uri()),
            &blocked,
            "2",
            "task_io",
        )
        .await
        .unwrap_err();

    assert!(matches!(err, Hitem3dError::Download { .. }), "{err:?}");
    assert_eq!(fs::read(&blocked).unwrap(), b"not a directory");
}
