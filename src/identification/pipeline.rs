//! 帧处理流水线宿主
//!
//! 单个工作线程独占帧源：打开、读取、关闭都在该线程上完成。
//! 每轮循环：读取一帧 → 同步处理 → 覆盖写入最新结果槽（无队列，最多一帧在途）。

use log::{error, info, warn};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::core::error::PipelineError;
use crate::core::video::frame::Frame;
use crate::core::video::source::FrameSource;

/// 单帧处理步骤
pub trait FrameProcessor: Send + 'static {
    type Output: Send + Sync + 'static;

    fn process(&mut self, frame: Frame) -> Self::Output;
}

/// Cooperative shutdown flag, checked once per loop iteration.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// 最新处理结果的单槽（覆盖写，不排队）
#[derive(Debug)]
pub struct LatestFrame<T> {
    slot: Arc<Mutex<Option<Arc<T>>>>,
}

impl<T> LatestFrame<T> {
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
        }
    }

    pub fn publish(&self, value: T) {
        let value = Arc::new(value);
        *self.slot.lock() = Some(value);
    }

    pub fn get(&self) -> Option<Arc<T>> {
        self.slot.lock().clone()
    }
}

impl<T> Clone for LatestFrame<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> Default for LatestFrame<T> {
    fn default() -> Self {
        Self::new()
    }
}

struct WorkerExit<P> {
    source: Box<dyn FrameSource>,
    processor: P,
    result: Result<(), PipelineError>,
}

pub struct Pipeline<P: FrameProcessor> {
    idle: Option<(Box<dyn FrameSource>, P)>,
    worker: Option<JoinHandle<WorkerExit<P>>>,
    cancel: CancellationToken,
    latest: LatestFrame<P::Output>,
    processed_frames: Arc<AtomicU64>,
}

impl<P: FrameProcessor> Pipeline<P> {
    pub fn new(source: Box<dyn FrameSource>, processor: P) -> Self {
        Self {
            idle: Some((source, processor)),
            worker: None,
            cancel: CancellationToken::new(),
            latest: LatestFrame::new(),
            processed_frames: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Opens the source on a new worker thread and starts the loop.
    /// No-op while running; open failures are returned here, and so is the
    /// error of a worker that ended on its own since the last call.
    pub fn start(&mut self) -> Result<(), PipelineError> {
        if self.worker.as_ref().is_some_and(|handle| handle.is_finished()) {
            // 工作线程已自行退出：回收帧源并上报错误，正常退出则重新启动
            self.stop()?;
        }
        if self.worker.is_some() {
            return Ok(());
        }

        // 工作线程崩溃后帧源随之丢失
        let (source, processor) = self.idle.take().ok_or(PipelineError::WorkerPanicked)?;

        self.cancel = CancellationToken::new();
        let cancel = self.cancel.clone();
        let latest = self.latest.clone();
        let processed_frames = Arc::clone(&self.processed_frames);
        let (ready_tx, ready_rx) = mpsc::channel();

        let handle = thread::Builder::new()
            .name("blink-pipeline".into())
            .spawn(move || {
                run_worker(source, processor, cancel, latest, processed_frames, ready_tx)
            })?;

        // 打开失败时线程不发送就退出
        if ready_rx.recv().is_ok() {
            info!("▶️ Pipeline started");
            self.worker = Some(handle);
            return Ok(());
        }

        match handle.join() {
            Ok(exit) => {
                self.idle = Some((exit.source, exit.processor));
                exit.result.and(Err(PipelineError::NotOpen))
            }
            Err(_) => Err(PipelineError::WorkerPanicked),
        }
    }

    /// Signals shutdown and blocks until the worker has exited and closed the
    /// source. Returns the error that ended the worker, if any.
    pub fn stop(&mut self) -> Result<(), PipelineError> {
        let Some(handle) = self.worker.take() else {
            return Ok(());
        };

        self.cancel.cancel();
        match handle.join() {
            Ok(exit) => {
                self.idle = Some((exit.source, exit.processor));
                info!("⏹️ Pipeline stopped");
                exit.result
            }
            Err(_) => {
                error!("❌ Pipeline worker panicked");
                Err(PipelineError::WorkerPanicked)
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    pub fn latest(&self) -> Option<Arc<P::Output>> {
        self.latest.get()
    }

    /// Handle for reading the latest output from other threads.
    pub fn latest_handle(&self) -> LatestFrame<P::Output> {
        self.latest.clone()
    }

    pub fn processed_frames(&self) -> u64 {
        self.processed_frames.load(Ordering::Relaxed)
    }

    /// The processor, available only while no worker owns it.
    pub fn processor(&self) -> Option<&P> {
        self.idle.as_ref().map(|(_, processor)| processor)
    }
}

impl<P: FrameProcessor> Drop for Pipeline<P> {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("Pipeline stopped with error: {}", e);
        }
    }
}

fn run_worker<P: FrameProcessor>(
    mut source: Box<dyn FrameSource>,
    mut processor: P,
    cancel: CancellationToken,
    latest: LatestFrame<P::Output>,
    processed_frames: Arc<AtomicU64>,
    ready: mpsc::Sender<()>,
) -> WorkerExit<P> {
    if let Err(e) = source.open() {
        error!("❌ Failed to open frame source: {}", e);
        return WorkerExit {
            source,
            processor,
            result: Err(e),
        };
    }
    let _ = ready.send(());
    drop(ready);

    // 处理器 panic 时也要先关闭帧源
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        while !cancel.is_cancelled() {
            match source.read() {
                Ok(frame) => {
                    latest.publish(processor.process(frame));
                    processed_frames.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    error!("❌ Frame source failed: {}", e);
                    return Err(e);
                }
            }
        }
        Ok(())
    }));

    source.close();
    let result = match outcome {
        Ok(result) => result,
        Err(payload) => panic::resume_unwind(payload),
    };
    WorkerExit {
        source,
        processor,
        result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::{Duration, Instant};

    #[derive(Default, Clone)]
    struct Counters {
        opens: Arc<AtomicUsize>,
        reads: Arc<AtomicUsize>,
        closes: Arc<AtomicUsize>,
    }

    struct MockSource {
        counters: Counters,
        fail_open: bool,
        fail_after: Option<usize>,
        frame_number: u64,
    }

    impl MockSource {
        fn new(counters: &Counters) -> Self {
            Self {
                counters: counters.clone(),
                fail_open: false,
                fail_after: None,
                frame_number: 0,
            }
        }
    }

    impl FrameSource for MockSource {
        fn open(&mut self) -> Result<(), PipelineError> {
            self.counters.opens.fetch_add(1, Ordering::SeqCst);
            if self.fail_open {
                return Err(PipelineError::Source("device unavailable".into()));
            }
            Ok(())
        }

        fn read(&mut self) -> Result<Frame, PipelineError> {
            let reads = self.counters.reads.fetch_add(1, Ordering::SeqCst);
            if self.fail_after.is_some_and(|limit| reads >= limit) {
                return Err(PipelineError::Source("stream lost".into()));
            }
            thread::sleep(Duration::from_millis(1));
            self.frame_number += 1;
            Ok(Frame::new(1, 1, vec![0], self.frame_number, self.frame_number))
        }

        fn close(&mut self) {
            self.counters.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct FrameNumberProcessor;

    impl FrameProcessor for FrameNumberProcessor {
        type Output = u64;

        fn process(&mut self, frame: Frame) -> u64 {
            frame.frame_number
        }
    }

    fn wait_until(condition: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        false
    }

    #[test]
    fn test_start_twice_opens_once() {
        let counters = Counters::default();
        let mut pipeline = Pipeline::new(Box::new(MockSource::new(&counters)), FrameNumberProcessor);

        pipeline.start().unwrap();
        pipeline.start().unwrap();
        assert!(pipeline.is_running());
        assert_eq!(counters.opens.load(Ordering::SeqCst), 1);

        pipeline.stop().unwrap();
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
        assert!(!pipeline.is_running());
    }

    #[test]
    fn test_stop_before_start_is_noop() {
        let counters = Counters::default();
        let mut pipeline = Pipeline::new(Box::new(MockSource::new(&counters)), FrameNumberProcessor);

        assert!(pipeline.stop().is_ok());
        assert_eq!(counters.opens.load(Ordering::SeqCst), 0);
        assert_eq!(counters.closes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_publishes_latest_frame() {
        let counters = Counters::default();
        let mut pipeline = Pipeline::new(Box::new(MockSource::new(&counters)), FrameNumberProcessor);
        let latest = pipeline.latest_handle();
        assert!(latest.get().is_none());

        pipeline.start().unwrap();
        assert!(wait_until(|| latest.get().is_some_and(|n| *n >= 3)));
        pipeline.stop().unwrap();

        let last = *pipeline.latest().unwrap();
        assert_eq!(last, pipeline.processed_frames());
    }

    #[test]
    fn test_close_exactly_once_and_restart() {
        let counters = Counters::default();
        let mut pipeline = Pipeline::new(Box::new(MockSource::new(&counters)), FrameNumberProcessor);

        pipeline.start().unwrap();
        pipeline.stop().unwrap();
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
        pipeline.stop().unwrap();
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);

        pipeline.start().unwrap();
        pipeline.stop().unwrap();
        assert_eq!(counters.opens.load(Ordering::SeqCst), 2);
        assert_eq!(counters.closes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_open_failure_reported_by_start() {
        let counters = Counters::default();
        let mut source = MockSource::new(&counters);
        source.fail_open = true;
        let mut pipeline = Pipeline::new(Box::new(source), FrameNumberProcessor);

        assert!(matches!(pipeline.start(), Err(PipelineError::Source(_))));
        assert!(!pipeline.is_running());
        assert!(pipeline.processor().is_some());
        assert_eq!(counters.reads.load(Ordering::SeqCst), 0);

        // 帧源归还后可以重试
        assert!(pipeline.start().is_err());
        assert_eq!(counters.opens.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_read_failure_reported_by_stop() {
        let counters = Counters::default();
        let mut source = MockSource::new(&counters);
        source.fail_after = Some(3);
        let mut pipeline = Pipeline::new(Box::new(source), FrameNumberProcessor);

        pipeline.start().unwrap();
        assert!(wait_until(|| !pipeline.is_running()));
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);

        assert!(matches!(pipeline.stop(), Err(PipelineError::Source(_))));
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
        assert_eq!(pipeline.processed_frames(), 3);
    }

    #[test]
    fn test_start_after_read_failure_reports_error() {
        let counters = Counters::default();
        let mut source = MockSource::new(&counters);
        source.fail_after = Some(3);
        let mut pipeline = Pipeline::new(Box::new(source), FrameNumberProcessor);

        pipeline.start().unwrap();
        assert!(wait_until(|| !pipeline.is_running()));

        assert!(matches!(pipeline.start(), Err(PipelineError::Source(_))));
        assert_eq!(counters.opens.load(Ordering::SeqCst), 1);
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
        assert!(pipeline.processor().is_some());

        // 错误已上报，下一次启动重新打开帧源
        assert!(pipeline.start().is_ok());
        assert_eq!(counters.opens.load(Ordering::SeqCst), 2);
        let _ = pipeline.stop();
    }

    #[test]
    fn test_start_restarts_cleanly_exited_worker() {
        let counters = Counters::default();
        let mut pipeline = Pipeline::new(Box::new(MockSource::new(&counters)), FrameNumberProcessor);

        pipeline.start().unwrap();
        // 模拟工作线程自行结束
        pipeline.cancel.cancel();
        assert!(wait_until(|| !pipeline.is_running()));

        pipeline.start().unwrap();
        assert!(pipeline.is_running());
        assert_eq!(counters.opens.load(Ordering::SeqCst), 2);
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);

        pipeline.stop().unwrap();
        assert_eq!(counters.closes.load(Ordering::SeqCst), 2);
    }

    struct PanickingProcessor;

    impl FrameProcessor for PanickingProcessor {
        type Output = u64;

        fn process(&mut self, frame: Frame) -> u64 {
            if frame.frame_number >= 2 {
                panic!("processor failure");
            }
            frame.frame_number
        }
    }

    #[test]
    fn test_processor_panic_still_closes_source() {
        let counters = Counters::default();
        let mut pipeline = Pipeline::new(Box::new(MockSource::new(&counters)), PanickingProcessor);

        pipeline.start().unwrap();
        assert!(wait_until(|| !pipeline.is_running()));

        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
        assert!(matches!(pipeline.stop(), Err(PipelineError::WorkerPanicked)));
        assert!(matches!(pipeline.start(), Err(PipelineError::WorkerPanicked)));
    }

    #[test]
    fn test_drop_stops_worker() {
        let counters = Counters::default();
        {
            let mut pipeline =
                Pipeline::new(Box::new(MockSource::new(&counters)), FrameNumberProcessor);
            pipeline.start().unwrap();
        }
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cancellation_token() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
