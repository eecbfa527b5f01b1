//! Running a blocking engine on a worker thread with a deadline.
//!
//! [`ThreadedEngine`] forwards every call to a dedicated thread that owns the
//! wrapped engine and waits for the reply with a timeout. Requests carry a
//! sequence number; a reply that arrives after its request timed out is
//! recognized by its stale sequence number and discarded, so late output is
//! never attributed to a later frame.

use crate::engine::{DecodeEngine, DecodedOutput, EngineError};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use esframe_core::FrameDescriptor;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// How long `Drop` waits for the worker before detaching it.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

enum Op {
    Configure(Vec<u8>),
    Decode {
        frame: Vec<u8>,
        desc: FrameDescriptor,
    },
    Reset,
}

struct Request {
    seq: u64,
    op: Op,
}

enum Outcome {
    Configured,
    Decoded(Option<(DecodedOutput, Vec<u8>)>),
    Reset,
}

struct Reply {
    seq: u64,
    result: Result<Outcome, EngineError>,
}

/// A [`DecodeEngine`] running on its own thread.
pub struct ThreadedEngine {
    name: String,
    requests: Option<Sender<Request>>,
    replies: Receiver<Reply>,
    worker: Option<JoinHandle<()>>,
    timeout: Duration,
    next_seq: u64,
    timeouts: u64,
}

impl ThreadedEngine {
    /// Move `engine` onto a worker thread.
    pub fn spawn<E>(engine: E, timeout: Duration) -> Result<Self, EngineError>
    where
        E: DecodeEngine + 'static,
    {
        let name = engine.name().to_string();
        let (request_tx, request_rx) = unbounded::<Request>();
        let (reply_tx, reply_rx) = unbounded::<Reply>();

        let worker = thread::Builder::new()
            .name(format!("esframe-{name}"))
            .spawn(move || run_worker(engine, request_rx, reply_tx))
            .map_err(|e| EngineError::Resource(format!("cannot spawn engine thread: {e}")))?;

        debug!(engine = %name, timeout_ms = timeout.as_millis() as u64, "Engine worker started");
        Ok(Self {
            name,
            requests: Some(request_tx),
            replies: reply_rx,
            worker: Some(worker),
            timeout,
            next_seq: 0,
            timeouts: 0,
        })
    }

    /// Per-call timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Number of calls that timed out.
    pub fn timeouts(&self) -> u64 {
        self.timeouts
    }

    fn call(&mut self, op: Op) -> Result<Outcome, EngineError> {
        let requests = self
            .requests
            .as_ref()
            .ok_or_else(|| EngineError::Resource("engine worker stopped".into()))?;

        self.next_seq += 1;
        let seq = self.next_seq;
        requests
            .send(Request { seq, op })
            .map_err(|_| EngineError::Resource("engine worker exited".into()))?;

        let deadline = Instant::now() + self.timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.replies.recv_timeout(remaining) {
                Ok(reply) if reply.seq == seq => return reply.result,
                Ok(stale) => {
                    trace!(seq = stale.seq, current = seq, "Discarding late engine reply");
                }
                Err(RecvTimeoutError::Timeout) => {
                    self.timeouts += 1;
                    warn!(engine = %self.name, seq, timeout_ms = self.timeout.as_millis() as u64, "Engine call timed out");
                    return Err(EngineError::Timeout(self.timeout));
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(EngineError::Resource("engine worker exited".into()));
                }
            }
        }
    }
}

fn run_worker<E: DecodeEngine>(mut engine: E, requests: Receiver<Request>, replies: Sender<Reply>) {
    let mut out = Vec::new();
    for Request { seq, op } in requests {
        let result = match op {
            Op::Configure(config) => engine.configure(&config).map(|()| Outcome::Configured),
            Op::Decode { frame, desc } => {
                out.clear();
                engine
                    .decode(&frame, &desc, &mut out)
                    .map(|decoded| Outcome::Decoded(decoded.map(|o| (o, std::mem::take(&mut out)))))
            }
            Op::Reset => {
                engine.reset();
                Ok(Outcome::Reset)
            }
        };
        if replies.send(Reply { seq, result }).is_err() {
            break;
        }
    }
}

impl DecodeEngine for ThreadedEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn configure(&mut self, codec_config: &[u8]) -> Result<(), EngineError> {
        match self.call(Op::Configure(codec_config.to_vec()))? {
            Outcome::Configured => Ok(()),
            _ => Err(EngineError::Resource("mismatched engine reply".into())),
        }
    }

    fn decode(
        &mut self,
        frame: &[u8],
        desc: &FrameDescriptor,
        out: &mut Vec<u8>,
    ) -> Result<Option<DecodedOutput>, EngineError> {
        let op = Op::Decode {
            frame: frame.to_vec(),
            desc: *desc,
        };
        match self.call(op)? {
            Outcome::Decoded(Some((output, mut bytes))) => {
                out.append(&mut bytes);
                Ok(Some(output))
            }
            Outcome::Decoded(None) => Ok(None),
            _ => Err(EngineError::Resource("mismatched engine reply".into())),
        }
    }

    fn reset(&mut self) {
        if let Err(e) = self.call(Op::Reset) {
            warn!(engine = %self.name, error = %e, "Engine reset failed");
        }
    }
}

impl Drop for ThreadedEngine {
    fn drop(&mut self) {
        // Closing the request channel ends the worker loop.
        self.requests = None;
        let Some(worker) = self.worker.take() else {
            return;
        };

        let deadline = Instant::now() + SHUTDOWN_GRACE;
        while !worker.is_finished() {
            if Instant::now() >= deadline {
                warn!(engine = %self.name, "Engine worker still busy, detaching");
                return;
            }
            thread::sleep(Duration::from_millis(5));
        }
        if worker.join().is_err() {
            warn!(engine = %self.name, "Engine worker panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use esframe_core::{AudioCodec, FrameHeader, HeaderFields, SyncByteOrder};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn desc() -> FrameDescriptor {
        FrameDescriptor::new(
            0,
            SyncByteOrder::Native,
            FrameHeader {
                codec: AudioCodec::Ac3,
                length: 4,
                sample_rate: 48000,
                channels: 2,
                samples_per_frame: 1536,
                fields: HeaderFields::default(),
            },
        )
    }

    /// Echoes the frame; sleeps for as many milliseconds as the first byte says.
    struct SlowEcho {
        resets: Arc<AtomicUsize>,
    }

    impl DecodeEngine for SlowEcho {
        fn name(&self) -> &str {
            "slow-echo"
        }

        fn decode(
            &mut self,
            frame: &[u8],
            desc: &FrameDescriptor,
            out: &mut Vec<u8>,
        ) -> Result<Option<DecodedOutput>, EngineError> {
            if let Some(&ms) = frame.first() {
                thread::sleep(Duration::from_millis(u64::from(ms)));
            }
            if frame.len() < 2 {
                return Ok(None);
            }
            out.extend_from_slice(frame);
            Ok(Some(DecodedOutput {
                len: frame.len(),
                sample_rate: desc.sample_rate,
                channels: desc.channels,
                samples: desc.samples_per_frame,
            }))
        }

        fn reset(&mut self) {
            self.resets.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn spawn(timeout_ms: u64) -> (ThreadedEngine, Arc<AtomicUsize>) {
        let resets = Arc::new(AtomicUsize::new(0));
        let engine = ThreadedEngine::spawn(
            SlowEcho {
                resets: Arc::clone(&resets),
            },
            Duration::from_millis(timeout_ms),
        )
        .unwrap();
        (engine, resets)
    }

    #[test]
    fn test_decode_roundtrip() {
        let (mut engine, _) = spawn(1000);
        assert_eq!(engine.name(), "slow-echo");

        let mut out = vec![0xEE];
        let output = engine.decode(&[0, 1, 2, 3], &desc(), &mut out).unwrap().unwrap();
        assert_eq!(output.len, 4);
        assert_eq!(out, vec![0xEE, 0, 1, 2, 3]);

        assert_eq!(engine.decode(&[0], &desc(), &mut out).unwrap(), None);
        assert!(engine.configure(&[1, 2]).is_ok());
    }

    #[test]
    fn test_timeout_then_stale_reply_discarded() {
        let (mut engine, _) = spawn(20);
        let mut out = Vec::new();

        let err = engine.decode(&[120, 0xAA], &desc(), &mut out).unwrap_err();
        assert_eq!(err, EngineError::Timeout(Duration::from_millis(20)));
        assert!(!err.is_fatal());
        assert_eq!(engine.timeouts(), 1);

        // Give the late reply time to arrive before the next call.
        thread::sleep(Duration::from_millis(200));
        let output = engine.decode(&[0, 0xBB], &desc(), &mut out).unwrap().unwrap();
        assert_eq!(output.len, 2);
        assert_eq!(out, vec![0, 0xBB]);
    }

    #[test]
    fn test_reset_forwarded() {
        let (mut engine, resets) = spawn(1000);
        engine.reset();
        assert_eq!(resets.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_joins_worker() {
        let (engine, resets) = spawn(1000);
        drop(engine);
        // The worker owned the only other reference.
        assert_eq!(Arc::strong_count(&resets), 1);
    }
}
