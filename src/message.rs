// message.rs — messages between sibling viewers and the per-session inbox
//
// Each session drains one ordered inbox on its own thread. Peers never share state; they
// post `ViewerMessage`s into each other's inbox instead.

use crate::event::ViewerEvent;
use crate::poi::Poi;
use log::{log_enabled, trace, warn, Level};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver, Sender};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViewerMessage {
    SetIndex { index: usize },
    SetFov { fov_deg: f64 },
    SetPoi { index: usize, poi: Poi },
    ClearPoi { index: usize },
    /// Ask the viewer to switch to another folder of images.
    OpenFolder { path: PathBuf },
    /// The viewer switched to a new image set of `count` images.
    Opened { count: usize },
    Close,
}

impl ViewerMessage {
    /// One JSON object per line, for carrying messages over a pipe.
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }

    pub fn from_json_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line.trim_end())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionInput {
    Event(ViewerEvent),
    Message(ViewerMessage),
}

/// Sending half of a session inbox.
#[derive(Debug, Clone)]
pub struct Outbox {
    tx: Sender<SessionInput>,
}

impl Outbox {
    /// Returns false once the receiving session has gone away.
    pub fn post(&self, message: ViewerMessage) -> bool {
        if log_enabled!(Level::Trace) {
            if let Ok(line) = message.to_json_line() {
                trace!("post {}", line.trim_end());
            }
        }
        self.send(SessionInput::Message(message))
    }

    pub fn post_event(&self, event: ViewerEvent) -> bool {
        self.send(SessionInput::Event(event))
    }

    fn send(&self, input: SessionInput) -> bool {
        match self.tx.send(input) {
            Ok(()) => true,
            Err(e) => {
                warn!("session inbox closed, dropping {:?}", e.0);
                false
            }
        }
    }
}

#[derive(Debug)]
pub struct Inbox {
    rx: Receiver<SessionInput>,
}

impl Inbox {
    /// Block until the next input arrives; `None` when every sender is gone.
    pub fn recv(&self) -> Option<SessionInput> {
        self.rx.recv().ok()
    }

    pub fn try_recv(&self) -> Option<SessionInput> {
        self.rx.try_recv().ok()
    }
}

pub fn mailbox() -> (Outbox, Inbox) {
    let (tx, rx) = channel();
    (Outbox { tx }, Inbox { rx })
}
