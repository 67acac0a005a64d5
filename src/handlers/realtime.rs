//! Server-sent change feed for authenticated surfaces.

use actix_web::web::Bytes;
use actix_web::{web, HttpResponse};
use futures::stream;
use futures::StreamExt;
use tokio::sync::broadcast::error::RecvError;

use crate::feed::ChangeFeed;
use crate::handlers::identity::Identity;

/// GET /realtime/orders
///
/// One SSE subscription per surface. Every frame is a row-level mutation of
/// the caller's tenant, in upstream commit order for the lifetime of the
/// connection. There is no ordering guarantee against a snapshot fetched
/// concurrently; subscribers dedup inserts by id.
#[utoipa::path(
    get,
    path = "/realtime/orders",
    responses(
        (status = 200, description = "text/event-stream of insert/update/delete frames"),
        (status = 403, description = "Missing or malformed identity assertions"),
    ),
    tag = "realtime"
)]
pub async fn stream_orders(feed: web::Data<ChangeFeed>, identity: Identity) -> HttpResponse {
    let rx = feed.subscribe();
    let tenant = identity.restaurant_id;

    // An immediate comment frame lets clients observe the subscription is
    // live before the first real event.
    let hello = stream::once(async {
        Ok::<_, actix_web::Error>(Bytes::from_static(b": subscribed\n\n"))
    });

    let events = stream::unfold(rx, move |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event) if event.restaurant_id == tenant => {
                    let frame = Bytes::from(event.to_sse_frame());
                    return Some((Ok::<_, actix_web::Error>(frame), rx));
                }
                // Another tenant's row; keep waiting.
                Ok(_) => continue,
                Err(RecvError::Lagged(missed)) => {
                    log::warn!("feed subscriber lagged, {missed} events dropped");
                    continue;
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    HttpResponse::Ok()
        .insert_header(("content-type", "text/event-stream"))
        .insert_header(("cache-control", "no-cache"))
        .streaming(hello.chain(events))
}
