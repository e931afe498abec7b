use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::{AUTHORIZATION, SEC_WEBSOCKET_PROTOCOL};
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace, warn};
use url::Url;

use crate::config::WS_SUBPROTOCOL;
use crate::error::{ClientError, ClientResult};

pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Open the subscribe socket with the BSATN subprotocol and optional bearer token.
pub(crate) async fn open(url: &Url, token: Option<&str>) -> ClientResult<WsStream> {
    let mut request = url.as_str().into_client_request()?;
    let headers = request.headers_mut();
    headers.insert(SEC_WEBSOCKET_PROTOCOL, HeaderValue::from_static(WS_SUBPROTOCOL));
    if let Some(token) = token {
        let value = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| {
            ClientError::Config("token contains characters not allowed in a header".to_string())
        })?;
        headers.insert(AUTHORIZATION, value);
    }

    debug!("Connecting to {}", url);
    let (ws, response) = connect_async(request).await?;
    debug!("WebSocket handshake complete ({})", response.status());
    Ok(ws)
}

/// Drain `rx` into the socket; closes the socket once every sender is gone.
pub(crate) async fn write_loop(
    mut sink: SplitSink<WsStream, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        if let Err(e) = sink.send(msg).await {
            warn!("WebSocket send failed: {}", e);
            return;
        }
    }
    let _ = sink.close().await;
}

/// Feed each binary frame to `on_frame` until the socket closes, and return
/// why it closed.
pub(crate) async fn read_loop<F>(mut stream: SplitStream<WsStream>, mut on_frame: F) -> ClientError
where
    F: FnMut(&[u8]),
{
    loop {
        match stream.next().await {
            Some(Ok(Message::Binary(data))) => {
                trace!("Received {} byte frame", data.len());
                on_frame(&data);
            }
            Some(Ok(Message::Text(text))) => {
                warn!("Ignoring unexpected text frame ({} bytes)", text.len());
            }
            Some(Ok(Message::Close(frame))) => {
                let reason = match frame {
                    Some(frame) => format!("{} {}", u16::from(frame.code), frame.reason.as_str()),
                    None => "no close frame".to_string(),
                };
                return ClientError::ConnectionClosed(reason);
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => return ClientError::WebSocket(e),
            None => return ClientError::ConnectionClosed("stream ended".to_string()),
        }
    }
}
