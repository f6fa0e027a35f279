//! Live feed
//!
//! One broker subscription per connected client, streamed as
//! `text/event-stream`. Each record becomes one `data:` event and is written
//! to the connection as its own body chunk. When the client goes away the
//! body stream is dropped, which drops the subscription and unsubscribes it.

use std::convert::Infallible;

use axum::body::Body;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use broker::Subscription;
use bytes::{BufMut, Bytes, BytesMut};
use contracts::Record;
use futures::stream::{self, Stream};
use tracing::{debug, info};

use crate::error::ApiError;
use crate::state::AppState;

const EVENT_PREFIX: &[u8] = b"data: ";
const EVENT_SUFFIX: &[u8] = b"\n\n";

pub async fn stream(State(state): State<AppState>) -> Result<Response, ApiError> {
    if !state.broker.is_running() {
        return Err(ApiError::BrokerStopped);
    }
    let subscription = state.broker.subscribe().await;
    info!(subscriber_id = %subscription.id(), "live client attached");

    Ok((
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
        ],
        Body::from_stream(events(subscription)),
    )
        .into_response())
}

/// `data: <payload>\n\n`
pub fn event_frame(record: &Record) -> Bytes {
    let mut frame = BytesMut::with_capacity(EVENT_PREFIX.len() + record.len() + EVENT_SUFFIX.len());
    frame.put_slice(EVENT_PREFIX);
    frame.put_slice(&record.payload);
    frame.put_slice(EVENT_SUFFIX);
    frame.freeze()
}

/// Event frames for as long as the subscription stays open
fn events(subscription: Subscription) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
    stream::unfold(subscription, |subscription| async move {
        match subscription.recv().await {
            Some(record) => Some((Ok::<_, Infallible>(event_frame(&record)), subscription)),
            None => {
                debug!(
                    subscriber_id = %subscription.id(),
                    dropped = subscription.dropped(),
                    "live feed closed"
                );
                None
            }
        }
    })
}
