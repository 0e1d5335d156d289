//! WebSocket Transport
//!
//! `Connector` implementation on top of `tokio-tungstenite`. Session cookies
//! from the HTTP client's jar are forwarded on the upgrade request so the
//! server sees the same authenticated user on both channels.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future;
use futures_util::{SinkExt, StreamExt};
use reqwest::cookie::{CookieStore, Jar};
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder, Message};
use url::Url;

use crate::application::ports::{Connector, Frame, FrameSink, FrameStream, TransportError};

/// Connects over WebSocket (`ws://` or `wss://`).
#[derive(Clone, Default)]
pub struct TungsteniteConnector {
    cookies: Option<(Arc<Jar>, Url)>,
}

impl std::fmt::Debug for TungsteniteConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TungsteniteConnector")
            .field("cookie_origin", &self.cookies.as_ref().map(|(_, url)| url.as_str()))
            .finish()
    }
}

impl TungsteniteConnector {
    /// Connector without cookies.
    #[must_use]
    pub const fn new() -> Self {
        Self { cookies: None }
    }

    /// Forward cookies stored in `jar` for `origin` on every handshake.
    #[must_use]
    pub fn with_cookies(jar: Arc<Jar>, origin: Url) -> Self {
        Self {
            cookies: Some((jar, origin)),
        }
    }

    fn cookie_header(&self) -> Option<String> {
        let (jar, origin) = self.cookies.as_ref()?;
        let value = jar.cookies(origin)?;
        value.to_str().ok().map(ToString::to_string)
    }
}

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn connect(&self, url: &str) -> Result<(FrameSink, FrameStream), TransportError> {
        let uri: tungstenite::http::Uri = url
            .parse()
            .map_err(|e: tungstenite::http::uri::InvalidUri| TransportError::Connect(e.to_string()))?;

        let mut request = ClientRequestBuilder::new(uri);
        if let Some(cookie) = self.cookie_header() {
            request = request.with_header("Cookie", cookie);
        }

        let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        let (write, read) = ws_stream.split();

        let sink = write
            .sink_map_err(|e| TransportError::Send(e.to_string()))
            .with(|frame: Frame| future::ready(Ok::<_, TransportError>(to_message(frame))));

        let stream = read.filter_map(|message| {
            future::ready(match message {
                Ok(message) => from_message(message).map(Ok),
                Err(e) => Some(Err(TransportError::Closed(e.to_string()))),
            })
        });

        Ok((Box::pin(sink), Box::pin(stream)))
    }
}

fn to_message(frame: Frame) -> Message {
    match frame {
        Frame::Text(text) => Message::Text(text.into()),
        Frame::Ping(data) => Message::Ping(data.into()),
        Frame::Pong(data) => Message::Pong(data.into()),
        Frame::Close => Message::Close(None),
    }
}

fn from_message(message: Message) -> Option<Frame> {
    match message {
        Message::Text(text) => Some(Frame::Text(text.as_str().to_owned())),
        Message::Ping(data) => Some(Frame::Ping(data.to_vec())),
        Message::Pong(data) => Some(Frame::Pong(data.to_vec())),
        Message::Close(_) => Some(Frame::Close),
        Message::Binary(_) | Message::Frame(_) => {
            tracing::trace!("Ignoring binary frame");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_frames_map_both_ways() {
        let message = to_message(Frame::Text("hello".to_string()));
        assert_eq!(from_message(message), Some(Frame::Text("hello".to_string())));
    }

    #[test]
    fn control_frames_map_both_ways() {
        assert_eq!(
            from_message(to_message(Frame::Ping(vec![1, 2]))),
            Some(Frame::Ping(vec![1, 2]))
        );
        assert_eq!(from_message(to_message(Frame::Close)), Some(Frame::Close));
    }

    #[test]
    fn binary_frames_are_skipped() {
        assert_eq!(from_message(Message::Binary(vec![0u8; 4].into())), None);
    }

    #[test]
    fn cookie_header_comes_from_jar() {
        let origin = Url::parse("http://localhost:3000/api/v1").unwrap();
        let jar = Arc::new(Jar::default());
        jar.add_cookie_str("session=abc; Path=/", &origin);

        let connector = TungsteniteConnector::with_cookies(jar, origin);
        assert_eq!(connector.cookie_header().as_deref(), Some("session=abc"));
        assert!(TungsteniteConnector::new().cookie_header().is_none());
    }

    #[tokio::test]
    async fn invalid_url_fails_to_connect() {
        let result = TungsteniteConnector::new().connect("not a url").await;
        assert!(matches!(result, Err(TransportError::Connect(_))));
    }
}
