use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, TryRecvError};

use crate::detection::domain::fish_detector::{DetectionError, FishDetector};
use crate::shared::bounding_box::BoundingBox;
use crate::shared::cancellation::CancellationToken;
use crate::shared::frame::Frame;

/// Outcome of one background request, paired with the frame it ran on so
/// callers can post-process against the same pixels.
pub struct BackgroundResult {
    pub frame: Frame,
    pub result: Result<Vec<BoundingBox>, DetectionError>,
    pub elapsed: Duration,
}

/// Runs a detector on a worker thread so slow backends never block the
/// caller's loop.
///
/// At most one request is in flight; `submit` refuses new frames until the
/// previous result has been collected with `poll`. Dropping it stops and
/// joins the worker.
pub struct BackgroundDetector {
    name: String,
    request_tx: Option<Sender<Frame>>,
    result_rx: Receiver<BackgroundResult>,
    handle: Option<JoinHandle<()>>,
    in_flight: bool,
}

impl BackgroundDetector {
    pub fn spawn(mut detector: Box<dyn FishDetector>, cancel: CancellationToken) -> Self {
        let name = detector.name().to_string();
        let (request_tx, request_rx) = crossbeam_channel::bounded::<Frame>(1);
        let (result_tx, result_rx) = crossbeam_channel::bounded::<BackgroundResult>(1);

        let handle = std::thread::spawn(move || {
            for frame in request_rx {
                if cancel.is_cancelled() {
                    break;
                }
                let start = std::time::Instant::now();
                let result = detector.detect(&frame);
                let msg = BackgroundResult {
                    frame,
                    result,
                    elapsed: start.elapsed(),
                };
                if result_tx.send(msg).is_err() {
                    break;
                }
            }
        });

        Self {
            name,
            request_tx: Some(request_tx),
            result_rx,
            handle: Some(handle),
            in_flight: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Hands `frame` to the worker. Returns `false` (dropping the frame)
    /// while a request is in flight or after the worker has exited.
    pub fn submit(&mut self, frame: Frame) -> bool {
        if self.in_flight {
            return false;
        }
        let Some(tx) = &self.request_tx else {
            return false;
        };
        match tx.try_send(frame) {
            Ok(()) => {
                self.in_flight = true;
                true
            }
            Err(_) => false,
        }
    }

    /// Non-blocking check for a finished request.
    pub fn poll(&mut self) -> Option<BackgroundResult> {
        match self.result_rx.try_recv() {
            Ok(result) => {
                self.in_flight = false;
                Some(result)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.in_flight = false;
                None
            }
        }
    }
}

impl Drop for BackgroundDetector {
    fn drop(&mut self) {
        // Closing the request channel ends the worker's receive loop.
        self.request_tx.take();
        // Unblock a worker stuck sending a result nobody will read.
        while self.result_rx.try_recv().is_ok() {}
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("{} detector thread panicked", self.name);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Instant;

    struct FakeDetector {
        calls: Arc<Mutex<Vec<usize>>>,
        delay: Duration,
    }

    impl FishDetector for FakeDetector {
        fn name(&self) -> &str {
            "fake"
        }

        fn detect(&mut self, frame: &Frame) -> Result<Vec<BoundingBox>, DetectionError> {
            std::thread::sleep(self.delay);
            self.calls.lock().unwrap().push(frame.index());
            Ok(vec![BoundingBox::new(frame.index() as i32, 0, 30, 30, 0.9)])
        }
    }

    fn frame(index: usize) -> Frame {
        Frame::new(vec![0u8; 12], 2, 2, index, 0)
    }

    fn spawn(delay: Duration) -> (BackgroundDetector, Arc<Mutex<Vec<usize>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let detector = FakeDetector {
            calls: calls.clone(),
            delay,
        };
        (
            BackgroundDetector::spawn(Box::new(detector), CancellationToken::new()),
            calls,
        )
    }

    fn poll_until(bg: &mut BackgroundDetector, timeout: Duration) -> Option<BackgroundResult> {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Some(result) = bg.poll() {
                return Some(result);
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        None
    }

    #[test]
    fn test_result_carries_its_frame() {
        let (mut bg, _) = spawn(Duration::ZERO);
        assert_eq!(bg.name(), "fake");
        assert!(bg.submit(frame(7)));
        let out = poll_until(&mut bg, Duration::from_secs(5)).unwrap();
        assert_eq!(out.frame.index(), 7);
        assert_eq!(out.result.unwrap()[0].x, 7);
        assert!(bg.submit(frame(8)), "collected result frees the slot");
    }

    #[test]
    fn test_only_one_request_in_flight() {
        let (mut bg, calls) = spawn(Duration::from_millis(50));
        assert!(bg.submit(frame(1)));
        assert!(!bg.submit(frame(2)));
        poll_until(&mut bg, Duration::from_secs(5)).unwrap();
        assert!(bg.submit(frame(3)));
        poll_until(&mut bg, Duration::from_secs(5)).unwrap();
        assert_eq!(*calls.lock().unwrap(), vec![1, 3]);
    }

    #[test]
    fn test_poll_is_non_blocking() {
        let (mut bg, _) = spawn(Duration::from_millis(200));
        assert!(bg.poll().is_none());
        assert!(bg.submit(frame(1)));
        let start = Instant::now();
        assert!(bg.poll().is_none());
        assert!(start.elapsed() < Duration::from_millis(100));
        assert!(!bg.submit(frame(2)));
    }

    #[test]
    fn test_cancelled_worker_stops() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let token = CancellationToken::new();
        token.cancel();
        let mut bg = BackgroundDetector::spawn(
            Box::new(FakeDetector {
                calls: calls.clone(),
                delay: Duration::ZERO,
            }),
            token,
        );
        bg.submit(frame(1));
        assert!(poll_until(&mut bg, Duration::from_millis(200)).is_none());
        drop(bg);
        assert!(calls.lock().unwrap().is_empty());
    }
}
