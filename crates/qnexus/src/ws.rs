//! Websocket status channel.
//!
//! The server pushes one JSON status record per text frame on
//! `{ws_url}/api/jobs/v1beta/{id}/attributes/status/ws`. The access token is
//! sent as the `myqos_id` cookie on the upgrade request.

use async_trait::async_trait;
use futures::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::auth::TokenKind;
use crate::error::{NexusError, NexusResult};
use crate::http::NexusClient;
use crate::models::job_status::JobStatus;
use crate::wait::{StatusChannel, StatusSubscription};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// [`StatusChannel`] over the Nexus websocket endpoint.
#[derive(Debug, Clone)]
pub struct WebSocketChannel {
    websockets_url: String,
    client: NexusClient,
}

impl WebSocketChannel {
    pub fn new(websockets_url: impl Into<String>, client: NexusClient) -> Self {
        Self {
            websockets_url: websockets_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Websocket URL streaming `job_id`'s status.
    pub fn status_url(&self, job_id: Uuid) -> String {
        format!(
            "{}/api/jobs/v1beta/{job_id}/attributes/status/ws",
            self.websockets_url
        )
    }

    async fn open(&self, url: &str) -> NexusResult<Socket> {
        let mut request = url
            .into_client_request()
            .map_err(|e| NexusError::Configuration(format!("invalid websocket url {url}: {e}")))?;

        if let Some(token) = self.client.tokens().read(TokenKind::Access) {
            let cookie = HeaderValue::from_str(&format!(
                "{}={token}",
                TokenKind::Access.cookie_name()
            ))
            .map_err(|_| NexusError::Authentication("stored access token is malformed".into()))?;
            request.headers_mut().insert("Cookie", cookie);
        }

        let (socket, _response) = connect_async(request).await.map_err(handshake_error)?;
        Ok(socket)
    }
}

fn handshake_error(err: tungstenite::Error) -> NexusError {
    match err {
        tungstenite::Error::Http(response)
            if matches!(response.status().as_u16(), 401 | 403) =>
        {
            NexusError::Authentication(format!(
                "status channel rejected the session ({})",
                response.status()
            ))
        }
        tungstenite::Error::Url(e) => NexusError::Configuration(format!("invalid websocket url: {e}")),
        other => NexusError::ChannelClosed(other.to_string()),
    }
}

#[async_trait]
impl StatusChannel for WebSocketChannel {
    #[instrument(skip(self))]
    async fn connect(&self, job_id: Uuid) -> NexusResult<Box<dyn StatusSubscription>> {
        let url = self.status_url(job_id);
        debug!(%url, "Opening status channel");

        let socket = match self.open(&url).await {
            Err(e) if e.is_authentication() && self.client.tokens().is_logged_in() => {
                debug!("Status channel rejected access token, refreshing");
                self.client.refresh_access_token().await?;
                self.open(&url).await?
            }
            other => other?,
        };

        Ok(Box::new(WebSocketSubscription { socket }))
    }
}

struct WebSocketSubscription {
    socket: Socket,
}

#[async_trait]
impl StatusSubscription for WebSocketSubscription {
    async fn next_status(&mut self) -> Option<NexusResult<JobStatus>> {
        loop {
            match self.socket.next().await? {
                Ok(Message::Text(text)) => return Some(JobStatus::from_str_payload(&text)),
                Ok(Message::Binary(bytes)) => {
                    return Some(
                        std::str::from_utf8(&bytes)
                            .map_err(|e| NexusError::InvalidStatus(e.to_string()))
                            .and_then(JobStatus::from_str_payload),
                    );
                }
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "Status channel closed by server");
                    return None;
                }
                Ok(_) => continue,
                Err(e) => return Some(Err(NexusError::ChannelClosed(e.to_string()))),
            }
        }
    }

    async fn close(&mut self) -> NexusResult<()> {
        self.socket
            .close(Some(CloseFrame {
                code: CloseCode::Normal,
                reason: "Client closed connection".into(),
            }))
            .await
            .map_err(|e| NexusError::ChannelClosed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::SinkExt;
    use crate::auth::TokenStore;
    use crate::config::NexusConfig;
    use crate::models::job_status::JobStatusEnum;
    use std::sync::{Arc, Mutex};
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

    fn client_for(port: u16) -> NexusClient {
        let config = NexusConfig::default().with_urls(
            format!("http://127.0.0.1:{port}"),
            format!("ws://127.0.0.1:{port}"),
        );
        NexusClient::with_config_and_tokens(config, TokenStore::in_memory()).unwrap()
    }

    #[tokio::test]
    async fn test_streams_text_frames_with_cookie() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let seen = Arc::new(Mutex::new(None::<(String, String)>));
        let seen_server = seen.clone();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let callback = move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                let cookie = req
                    .headers()
                    .get("cookie")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                *seen_server.lock().unwrap() = Some((req.uri().path().to_string(), cookie));
                Ok(resp)
            };
            let mut ws = tokio_tungstenite::accept_hdr_async(stream, callback).await.unwrap();
            ws.send(Message::Text(r#"{"status": "RUNNING", "message": "running"}"#.into()))
                .await
                .unwrap();
            ws.send(Message::Text(r#"{"status": "COMPLETED", "message": "done"}"#.into()))
                .await
                .unwrap();
            ws.close(None).await.ok();
        });

        let client = client_for(port);
        client.tokens().write(TokenKind::Access, "tok123").unwrap();
        let job_id = Uuid::new_v4();

        let mut sub = client.status_channel().connect(job_id).await.unwrap();
        let first = sub.next_status().await.unwrap().unwrap();
        assert_eq!(first.status, JobStatusEnum::Running);
        let second = sub.next_status().await.unwrap().unwrap();
        assert_eq!(second.status, JobStatusEnum::Completed);
        assert!(sub.next_status().await.is_none());
        server.await.unwrap();

        let (path, cookie) = seen.lock().unwrap().clone().unwrap();
        assert_eq!(path, format!("/api/jobs/v1beta/{job_id}/attributes/status/ws"));
        assert_eq!(cookie, "myqos_id=tok123");
    }

    #[tokio::test]
    async fn test_rejected_handshake_is_authentication_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let reject = |_req: &Request, _resp: Response| -> Result<Response, ErrorResponse> {
                Err(tungstenite::http::Response::builder()
                    .status(401)
                    .body(None)
                    .unwrap())
            };
            tokio_tungstenite::accept_hdr_async(stream, reject).await.ok();
        });

        let client = client_for(port);
        let err = client
            .status_channel()
            .connect(Uuid::new_v4())
            .await
            .err()
            .unwrap();
        assert!(err.is_authentication());
    }

    #[tokio::test]
    async fn test_refused_connection_is_transient() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = client_for(port)
            .status_channel()
            .connect(Uuid::new_v4())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, NexusError::ChannelClosed(_)));
    }

    #[test]
    fn test_status_url() {
        let channel = client_for(9).status_channel();
        let id = Uuid::nil();
        assert_eq!(
            channel.status_url(id),
            "ws://127.0.0.1:9/api/jobs/v1beta/00000000-0000-0000-0000-000000000000/attributes/status/ws"
        );
    }
}
