use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use std::convert::Infallible;
use tokio_stream::{Stream, StreamExt, wrappers::ReceiverStream};

use super::super::AppState;

/// Live log stream for one execution. Each published line becomes a `log`
/// event; when the executor closes the broker registration, a final `end`
/// event is sent and the stream terminates.
pub async fn stream_execution_logs(
    Path(execution_id): Path<i64>,
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = state.broker.subscribe(execution_id).await;
    let stream = ReceiverStream::new(receiver)
        .map(|line| Ok(Event::default().event("log").data(line)))
        .chain(tokio_stream::once(Ok(Event::default()
            .event("end")
            .data("Execution finished"))));

    Sse::new(stream).keep_alive(KeepAlive::default())
}
