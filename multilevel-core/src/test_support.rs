//! Local HTTP stubs standing in for the remote providers.

use axum::Router;
use tokio::net::TcpListener;

/// Serves `router` on an ephemeral localhost port and returns its base URL.
pub(crate) async fn spawn_stub(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind stub listener");
    let addr = listener.local_addr().expect("stub listener address");

    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("stub server");
    });

    format!("http://{addr}")
}

/// Base URL of a localhost port nobody listens on.
pub(crate) async fn refused_base_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind probe listener");
    let addr = listener.local_addr().expect("probe listener address");
    drop(listener);

    format!("http://{addr}")
}
