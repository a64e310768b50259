use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::session::{NegotiationSession, PeerEvent, SessionState, Transport};

/// Run one session to completion.
///
/// Begins the session if it has not started, then waits on `events` until
/// it reaches a terminal state. A closed channel counts as the connection
/// being terminated.
pub async fn drive<T: Transport + ?Sized>(
    mut session: NegotiationSession,
    transport: &mut T,
    mut events: mpsc::Receiver<PeerEvent>,
) -> SessionState {
    if session.state() == &SessionState::Idle {
        session.begin(transport);
    }
    while !session.is_finished() {
        let event = events.recv().await.unwrap_or(PeerEvent::Terminated);
        debug!("Event for {}: {:?}", session.peer(), event);
        session.handle(event, transport);
    }
    session.state().clone()
}

/// Drive a session on its own task, handing the transport back when done.
pub fn spawn<T>(
    session: NegotiationSession,
    mut transport: T,
    events: mpsc::Receiver<PeerEvent>,
) -> JoinHandle<(SessionState, T)>
where
    T: Transport + Send + 'static,
{
    tokio::spawn(async move {
        let state = drive(session, &mut transport, events).await;
        (state, transport)
    })
}
