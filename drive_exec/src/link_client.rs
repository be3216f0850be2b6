//! # Link Client
//!
//! Runs the remote link on a background thread so that a slow or unreachable actuator never
//! stalls the control loop. Requests are queued to the worker over a channel, results come back
//! as [`LinkEvent`]s which the loop drains once per cycle.
//!
//! The worker owns both the transport and the telemetry sampler, so only one request is ever on
//! the wire. Of several queued set target commands only the most recent is sent, and a new poll
//! is not queued while the previous one is outstanding.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{channel, Receiver, Sender},
        Arc,
    },
    thread::{self, JoinHandle},
};

use log::{debug, warn};

use comms_if::{
    eqpt::drive::{DriveCmd, TelemetrySample},
    net::{LinkError, RemoteLink},
};

use crate::tm_sampler::{HistoryReader, PollError, TelemetrySampler};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Front end of the link worker.
pub struct LinkClient {
    req_tx: Sender<LinkRequest>,
    event_rx: Receiver<LinkEvent>,
    poll_in_flight: Arc<AtomicBool>,
    history: HistoryReader,
    bg_jh: Option<JoinHandle<()>>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Requests handled by the worker.
#[derive(Debug, Clone, Copy, PartialEq)]
enum LinkRequest {
    Cmd(DriveCmd),
    Poll,
    ClearHistory,
    Shutdown,
}

/// Results reported back by the worker.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    /// A command was sent, or failed to send.
    CmdDone {
        cmd: DriveCmd,
        result: Result<(), LinkError>,
    },

    /// A set target command was dropped because a newer one was queued behind it.
    CmdSuperseded(DriveCmd),

    /// A telemetry poll finished.
    Polled(Result<TelemetrySample, PollError>),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LinkClientError {
    #[error("The link worker has stopped")]
    WorkerStopped,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl LinkClient {
    /// Start the worker thread, handing it the link and the sampler.
    pub fn spawn(link: Box<dyn RemoteLink>, sampler: TelemetrySampler) -> Self {
        let (req_tx, req_rx) = channel();
        let (event_tx, event_rx) = channel();
        let poll_in_flight = Arc::new(AtomicBool::new(false));
        let history = sampler.reader();

        let poll_in_flight_clone = poll_in_flight.clone();
        let bg_jh = Some(thread::spawn(move || {
            bg_thread(link, sampler, req_rx, event_tx, poll_in_flight_clone)
        }));

        Self {
            req_tx,
            event_rx,
            poll_in_flight,
            history,
            bg_jh,
        }
    }

    /// Queue a set target command.
    pub fn set_target(&self, x: i32, y: i32) -> Result<(), LinkClientError> {
        self.send(LinkRequest::Cmd(DriveCmd::SetTarget { x, y }))
    }

    /// Queue a stop command.
    pub fn stop(&self) -> Result<(), LinkClientError> {
        self.send(LinkRequest::Cmd(DriveCmd::Stop))
    }

    /// Queue a telemetry poll.
    ///
    /// Returns `Ok(false)` without queueing anything if the previous poll has
    /// not finished yet.
    pub fn request_poll(&self) -> Result<bool, LinkClientError> {
        if self.poll_in_flight.swap(true, Ordering::AcqRel) {
            return Ok(false);
        }

        match self.send(LinkRequest::Poll) {
            Ok(()) => Ok(true),
            Err(e) => {
                self.poll_in_flight.store(false, Ordering::Release);
                Err(e)
            }
        }
    }

    /// True while a poll is queued or on the wire.
    pub fn poll_in_flight(&self) -> bool {
        self.poll_in_flight.load(Ordering::Acquire)
    }

    /// Collect all events reported since the last call, without blocking.
    pub fn drain_events(&self) -> Vec<LinkEvent> {
        self.event_rx.try_iter().collect()
    }

    /// Block until the next event arrives or the worker stops.
    pub fn wait_event(&self) -> Option<LinkEvent> {
        self.event_rx.recv().ok()
    }

    /// Queue clearing of the telemetry history.
    ///
    /// Runs on the worker after any poll already queued, so a sample from that
    /// poll is not left behind.
    pub fn clear_history(&self) -> Result<(), LinkClientError> {
        self.send(LinkRequest::ClearHistory)
    }

    /// Read-only handle onto the telemetry history.
    pub fn history(&self) -> HistoryReader {
        self.history.clone()
    }

    fn send(&self, req: LinkRequest) -> Result<(), LinkClientError> {
        self.req_tx.send(req).map_err(|_| LinkClientError::WorkerStopped)
    }
}

impl Drop for LinkClient {
    fn drop(&mut self) {
        self.req_tx.send(LinkRequest::Shutdown).ok();

        if let Some(jh) = self.bg_jh.take() {
            if jh.join().is_err() {
                warn!("Link worker panicked");
            }
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Background thread, serves requests until shutdown or the client is dropped.
fn bg_thread(
    mut link: Box<dyn RemoteLink>,
    sampler: TelemetrySampler,
    req_rx: Receiver<LinkRequest>,
    event_tx: Sender<LinkEvent>,
    poll_in_flight: Arc<AtomicBool>,
) {
    while let Ok(first) = req_rx.recv() {
        // Take everything already queued so stale targets can be skipped
        let mut batch = vec![first];
        batch.extend(req_rx.try_iter());

        let last_set_target = batch
            .iter()
            .rposition(|r| matches!(r, LinkRequest::Cmd(DriveCmd::SetTarget { .. })));

        for (i, req) in batch.into_iter().enumerate() {
            let event = match req {
                LinkRequest::Shutdown => return,
                LinkRequest::ClearHistory => {
                    sampler.clear();
                    continue;
                }
                LinkRequest::Cmd(cmd @ DriveCmd::SetTarget { .. })
                    if Some(i) != last_set_target =>
                {
                    debug!("Skipping superseded command {:?}", cmd);
                    LinkEvent::CmdSuperseded(cmd)
                }
                LinkRequest::Cmd(cmd) => LinkEvent::CmdDone {
                    cmd,
                    result: link.send_cmd(&cmd),
                },
                LinkRequest::Poll => {
                    let result = sampler.poll(link.as_mut());
                    poll_in_flight.store(false, Ordering::Release);
                    LinkEvent::Polled(result)
                }
            };

            // Client gone, nobody left to serve
            if event_tx.send(event).is_err() {
                return;
            }
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
