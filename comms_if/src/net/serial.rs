//! Serial transport to the actuator.
//!
//! The device is opened as a character file, so line settings (baud rate, raw mode) must be
//! configured on the host beforehand, for example with `stty -F /dev/ttyUSB0 115200 raw`.
//!
//! The actuator streams telemetry lines at its own pace. A background thread reads them as they
//! arrive and keeps only the most recent one, so fetching telemetry never waits on the device: if
//! no new line has arrived since the last fetch the fetch fails straight away with
//! [`LinkError::Unreachable`].

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    fs::{File, OpenOptions},
    io::{self, BufRead, BufReader, Write},
    sync::{Arc, Mutex, MutexGuard},
    thread,
};

use log::{debug, trace};

use super::{LinkError, RemoteLink};
use crate::eqpt::drive::{DriveCmd, PayloadFormat, RawTelemetryPayload};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Link to an actuator attached to a line based serial device.
pub struct SerialLink<W> {
    writer: W,
    rx: Arc<Mutex<RxState>>,
}

/// State shared between the link and its reader thread.
#[derive(Debug, Default)]
struct RxState {
    /// Most recent line not yet fetched. Invalid UTF-8 is kept as the error.
    latest: Option<Result<String, LinkError>>,

    /// Set once the reader has stopped, with the reason.
    closed: Option<LinkError>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SerialLink<File> {
    /// Open the serial device at the given path for reading and writing.
    pub fn open(device_path: &str) -> Result<Self, LinkError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(device_path)
            .map_err(|e| LinkError::Unreachable(format!("{}: {}", device_path, e)))?;

        let reader = file
            .try_clone()
            .map_err(|e| LinkError::Unreachable(format!("{}: {}", device_path, e)))?;

        Ok(Self::new(BufReader::new(reader), file))
    }
}

impl<W> SerialLink<W>
where
    W: Write + Send,
{
    /// Build a link from an existing reader and writer pair, starting the
    /// reader thread.
    ///
    /// The thread is detached. It exits when the reader reaches end of file
    /// or fails, a reader that never returns keeps it parked.
    pub fn new<R>(reader: R, writer: W) -> Self
    where
        R: BufRead + Send + 'static,
    {
        let rx = Arc::new(Mutex::new(RxState::default()));

        let rx_clone = rx.clone();
        thread::spawn(move || rx_thread(reader, rx_clone));

        Self { writer, rx }
    }

    fn write_cmd(&mut self, cmd: &DriveCmd) -> Result<(), LinkError> {
        let line = cmd.to_serial_line();

        trace!("Serial write {:?}", line);

        self.writer
            .write_all(line.as_bytes())
            .and_then(|_| self.writer.flush())
            .map_err(io_to_link_error)
    }
}

impl<W> RemoteLink for SerialLink<W>
where
    W: Write + Send,
{
    fn set_target(&mut self, x: i32, y: i32) -> Result<(), LinkError> {
        self.write_cmd(&DriveCmd::SetTarget { x, y })
    }

    fn stop(&mut self) -> Result<(), LinkError> {
        self.write_cmd(&DriveCmd::Stop)
    }

    /// Take the most recent line received from the device, without waiting.
    fn fetch_telemetry(&mut self) -> Result<RawTelemetryPayload, LinkError> {
        let mut rx = lock(&self.rx);

        match rx.latest.take() {
            Some(line) => line.map(|l| RawTelemetryPayload::new(PayloadFormat::CommaPair, l)),
            None => Err(rx.closed.clone().unwrap_or_else(|| {
                LinkError::Unreachable(String::from("no telemetry line received since last fetch"))
            })),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Reader thread, stores each non-empty line until the reader closes.
fn rx_thread<R: BufRead>(mut reader: R, rx: Arc<Mutex<RxState>>) {
    loop {
        let mut line = String::new();

        let result = match reader.read_line(&mut line) {
            Ok(0) => {
                lock(&rx).closed = Some(LinkError::Unreachable(String::from("serial device closed")));
                return;
            }
            Ok(_) => match line.trim() {
                "" => continue,
                l => Ok(l.to_string()),
            },
            Err(e) if e.kind() == io::ErrorKind::InvalidData => Err(io_to_link_error(e)),
            Err(e) => {
                debug!("Serial reader stopped: {}", e);
                lock(&rx).closed = Some(io_to_link_error(e));
                return;
            }
        };

        if let Some(Ok(skipped)) = lock(&rx).latest.replace(result) {
            trace!("Serial line {:?} replaced before it was fetched", skipped);
        }
    }
}

fn lock(rx: &Mutex<RxState>) -> MutexGuard<'_, RxState> {
    rx.lock().unwrap_or_else(|e| e.into_inner())
}

fn io_to_link_error(e: io::Error) -> LinkError {
    match e.kind() {
        io::ErrorKind::InvalidData => LinkError::Malformed(e.to_string()),
        _ => LinkError::Unreachable(e.to_string()),
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use std::{
        io::{Cursor, Read},
        sync::mpsc,
        time::Duration,
    };

    /// Reader fed chunk by chunk from a channel, end of file once the sender
    /// is dropped. Blocks while the sender is alive and silent.
    struct ChannelReader {
        chunks: mpsc::Receiver<Vec<u8>>,
        current: Cursor<Vec<u8>>,
    }

    impl Read for ChannelReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            loop {
                let n = self.current.read(buf)?;
                if n > 0 || buf.is_empty() {
                    return Ok(n);
                }

                match self.chunks.recv() {
                    Ok(chunk) => self.current = Cursor::new(chunk),
                    Err(_) => return Ok(0),
                }
            }
        }
    }

    fn channel_link() -> (mpsc::Sender<Vec<u8>>, SerialLink<Vec<u8>>) {
        let (tx, chunks) = mpsc::channel();
        let reader = ChannelReader {
            chunks,
            current: Cursor::new(Vec::new()),
        };

        (tx, SerialLink::new(BufReader::new(reader), Vec::new()))
    }

    /// Wait for the reader thread to reach end of file.
    fn wait_closed(link: &SerialLink<Vec<u8>>) {
        for _ in 0..500 {
            if lock(&link.rx).closed.is_some() {
                return;
            }
            thread::sleep(Duration::from_millis(2));
        }
        panic!("reader thread did not finish");
    }

    #[test]
    fn test_commands_are_lines() {
        let (_tx, mut link) = channel_link();

        link.set_target(10, -4).unwrap();
        link.stop().unwrap();

        assert_eq!(String::from_utf8(link.writer).unwrap(), "10,-4\nstop\n");
    }

    #[test]
    fn test_silent_device_does_not_block() {
        // Sender kept alive and silent, the reader thread stays blocked
        let (_tx, mut link) = channel_link();

        assert!(matches!(link.fetch_telemetry(), Err(LinkError::Unreachable(_))));

        link.stop().unwrap();
        assert_eq!(link.writer, b"stop\n".to_vec());
    }

    #[test]
    fn test_fetch_takes_latest_line() {
        let (tx, mut link) = channel_link();

        tx.send(b"\n  \n12,34\r\n".to_vec()).unwrap();
        tx.send(b"56,78\n".to_vec()).unwrap();
        drop(tx);
        wait_closed(&link);

        // Only the newest line is kept, and only fetched once
        let payload = link.fetch_telemetry().unwrap();
        assert_eq!(payload, RawTelemetryPayload::new(PayloadFormat::CommaPair, "56,78"));

        assert_eq!(
            link.fetch_telemetry(),
            Err(LinkError::Unreachable(String::from("serial device closed")))
        );
    }

    #[test]
    fn test_non_utf8_is_malformed() {
        let (tx, mut link) = channel_link();

        tx.send(vec![0xff, 0xfe, b'\n']).unwrap();
        drop(tx);
        wait_closed(&link);

        assert!(matches!(link.fetch_telemetry(), Err(LinkError::Malformed(_))));
    }
}
