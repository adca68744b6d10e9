use std::sync::Weak;

use tokio::select;
use tokio::sync::{mpsc, watch};

use crate::Actor;
use crate::mailbox::{Envelope, Mailbox};

pub async fn run_actor<S: Send + 'static>(
    mailbox: Weak<Mailbox<S>>,
    mut state: S,
    mut msg_rx: mpsc::UnboundedReceiver<Box<dyn Envelope<S>>>,
    mut stop_rx: watch::Receiver<bool>,
) {
    debug!("started");
    loop {
        let msg = select! {
            biased;

            _ = stop_rx.changed() => {
                break;
            }
            msg = msg_rx.recv() => {
                let Some(msg) = msg else {
                    break;
                };
                msg
            }
        };
        trace!("received message: {msg:?}");

        let Some(mailbox) = mailbox.upgrade() else {
            warn!("all handles have been dropped, discard the message");
            break;
        };
        trace_span!("proc msg").in_scope(|| {
            msg.deliver(&mut state, &Actor::from_mailbox(mailbox));
        });
    }
    debug!("stopped");
}
