//! Acquisition state machine and producer thread.
//!
//! One long-lived producer thread per camera parks between runs and is woken
//! by `start`. All shared state sits behind one mutex paired with one condition
//! variable, used both for control requests and for the producer's
//! acknowledgements. The lock is never held across a driver call.
//!
//! ```text
//!            prepare          start                    frame limit / host stop
//!  (unarmed) ───────▶ armed ─────────▶ Starting ─▶ Capturing ───────▶ Finishing ─┐
//!                                                     │ stop                     │
//!                                                     ▼                          │
//!                                                 Stopping ──────────────────────┤
//!                                                                                ▼
//!                                             Idle ◀────── release session ◀─────┘
//! ```
//!
//! The armed session (driver buffer plus running capture) is released by a
//! single routine, [`AcquisitionController::stop`], whichever path ends the run:
//! natural completion, external stop or teardown.

use chrono::Utc;
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::buffer::{FrameInfo, SharedBufferManager};
use crate::config::DriverConfig;
use crate::error::{CameraError, CameraResult};
use crate::hardware::{FrameDescriptor, TucamAdapter};
use crate::params::TriggerMode;
use crate::status::{CameraStatus, StatusModel};
use crate::timer::TriggerTimer;

/// What the next run should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AcquisitionRequest {
    /// Frames to acquire; 0 runs until stopped.
    pub nb_frames: u64,
    /// Pause between consecutive frames.
    pub latency: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Starting,
    Capturing,
    Stopping,
    Finishing,
    Quitting,
    Terminated,
}

struct Shared {
    phase: Phase,
    // Raised by the producer while it is inside the capture loop.
    capture_active: bool,
    releasing: bool,
    armed: Option<TriggerMode>,
    status: StatusModel,
    request: AcquisitionRequest,
    frame_nb: u64,
    fps: f64,
}

struct Inner {
    sdk: Arc<dyn TucamAdapter>,
    buffers: SharedBufferManager,
    timer: TriggerTimer,
    state: Mutex<Shared>,
    cond: Condvar,
    abort_retry: Duration,
}

/// Owner of the producer thread and of the armed capture session.
pub struct AcquisitionController {
    inner: Arc<Inner>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl AcquisitionController {
    /// Spawn the producer thread, parked until the first `start`.
    pub fn new(
        sdk: Arc<dyn TucamAdapter>,
        buffers: SharedBufferManager,
        config: &DriverConfig,
    ) -> CameraResult<Self> {
        let trigger_sdk = Arc::clone(&sdk);
        let timer = TriggerTimer::new(
            config.timer_period(),
            Arc::new(move || trigger_sdk.software_trigger()),
        );

        let inner = Arc::new(Inner {
            sdk,
            buffers,
            timer,
            state: Mutex::new(Shared {
                phase: Phase::Idle,
                capture_active: false,
                releasing: false,
                armed: None,
                status: StatusModel::new(),
                request: AcquisitionRequest::default(),
                frame_nb: 0,
                fps: 0.0,
            }),
            cond: Condvar::new(),
            abort_retry: config.abort_retry(),
        });

        let producer = Arc::clone(&inner);
        let handle = std::thread::Builder::new()
            .name("dhyana-acq".to_owned())
            .spawn(move || producer.run())
            .map_err(|e| {
                CameraError::Initialization(format!("Unable to start the acquisition thread: {e}"))
            })?;

        Ok(Self {
            inner,
            thread: Mutex::new(Some(handle)),
        })
    }

    /// Arm the capture session for `mode`.
    ///
    /// Allocates the driver buffer and starts capture unless a session is
    /// already armed, then starts the trigger timer in internal mode.
    pub fn prepare(&self, mode: TriggerMode) -> CameraResult<()> {
        let capture = mode.capture_mode()?;
        let inner = &*self.inner;
        let mut st = inner.state.lock();
        inner.wait_wind_down(&mut st);
        inner.ensure_alive(&st)?;

        let armed = match st.armed {
            Some(armed) => {
                if armed != mode {
                    tracing::warn!(
                        armed = ?armed,
                        requested = ?mode,
                        "Capture already armed, keeping the armed trigger mode"
                    );
                }
                armed
            }
            None => {
                let sdk = &inner.sdk;
                MutexGuard::unlocked(&mut st, || -> CameraResult<()> {
                    sdk.alloc_buffer()?;
                    if let Err(e) = sdk.start_capture(capture) {
                        if let Err(release) = sdk.release_buffer() {
                            tracing::warn!(error = %release, "Buffer release after failed capture start");
                        }
                        return Err(e);
                    }
                    Ok(())
                })?;
                st.armed = Some(mode);
                tracing::debug!(?mode, ?capture, "Capture session armed");
                mode
            }
        };

        if armed.is_internal() {
            MutexGuard::unlocked(&mut st, || inner.timer.start())?;
        }
        st.status.set(CameraStatus::Exposure, false);
        Ok(())
    }

    /// Start a run and block until the producer thread has picked it up.
    pub fn start(&self, request: AcquisitionRequest) -> CameraResult<()> {
        let inner = &*self.inner;
        let mut st = inner.state.lock();
        inner.wait_wind_down(&mut st);
        inner.ensure_alive(&st)?;

        if matches!(st.phase, Phase::Starting | Phase::Capturing) {
            return Err(CameraError::InvalidState(
                "Acquisition already running".to_owned(),
            ));
        }
        if st.armed.is_none() {
            return Err(CameraError::InvalidState(
                "Acquisition not prepared".to_owned(),
            ));
        }

        st.request = request;
        st.frame_nb = 0;
        st.fps = 0.0;
        let buffers = &inner.buffers;
        MutexGuard::unlocked(&mut st, || buffers.lock().set_start_timestamp(Utc::now()));

        st.status.set(CameraStatus::Exposure, false);
        st.phase = Phase::Starting;
        inner.cond.notify_all();
        while st.phase == Phase::Starting {
            inner.cond.wait(&mut st);
        }

        tracing::info!(
            nb_frames = request.nb_frames,
            latency_ms = request.latency.as_millis() as u64,
            "Acquisition started"
        );
        Ok(())
    }

    /// Stop the current run, if any, and release the armed session.
    ///
    /// Safe to call repeatedly or without a prior start. Always leaves the
    /// status at `Ready`, clearing a latched `Fault`.
    pub fn stop(&self) -> CameraResult<()> {
        self.inner.stop(true)
    }

    /// Stop everything and join the producer thread. Further lifecycle calls
    /// fail with `InvalidState`.
    pub fn destroy(&self) -> CameraResult<()> {
        let Some(handle) = self.thread.lock().take() else {
            return Ok(());
        };

        {
            let mut st = self.inner.state.lock();
            st.phase = Phase::Quitting;
            self.inner.cond.notify_all();
        }

        let result = self.inner.stop(true);
        if handle.join().is_err() {
            tracing::error!("Acquisition thread panicked");
        }
        tracing::debug!("Acquisition thread terminated");
        result
    }

    /// Current status.
    pub fn status(&self) -> CameraStatus {
        self.inner.state.lock().status.get()
    }

    /// Write the status, honouring the sticky `Fault` rule.
    pub fn set_status(&self, status: CameraStatus, force: bool) -> bool {
        self.inner.state.lock().status.set(status, force)
    }

    /// Whether the producer is inside a run.
    pub fn is_running(&self) -> bool {
        self.inner.state.lock().capture_active
    }

    /// Frames delivered since the last start.
    pub fn acquired_frames(&self) -> u64 {
        self.inner.state.lock().frame_nb
    }

    /// Frame rate of the current or last run.
    pub fn fps(&self) -> f64 {
        self.inner.state.lock().fps
    }

    /// Trigger mode of the armed session, if any.
    pub fn armed_mode(&self) -> Option<TriggerMode> {
        self.inner.state.lock().armed
    }
}

impl Drop for AcquisitionController {
    fn drop(&mut self) {
        if let Err(e) = self.destroy() {
            tracing::error!(error = %e, "Acquisition teardown failed");
        }
    }
}

impl Inner {
    fn wait_wind_down(&self, st: &mut MutexGuard<'_, Shared>) {
        while matches!(st.phase, Phase::Stopping | Phase::Finishing) || st.releasing {
            self.cond.wait(st);
        }
    }

    fn ensure_alive(&self, st: &Shared) -> CameraResult<()> {
        match st.phase {
            Phase::Quitting | Phase::Terminated => Err(CameraError::InvalidState(
                "Acquisition thread has been destroyed".to_owned(),
            )),
            _ => Ok(()),
        }
    }

    // `force_ready` is set on host requests only; a run ending on its own
    // leaves a latched `Fault` in place.
    fn stop(&self, force_ready: bool) -> CameraResult<()> {
        let mut st = self.state.lock();
        match st.phase {
            Phase::Starting => st.phase = Phase::Idle,
            Phase::Capturing => st.phase = Phase::Stopping,
            _ => {}
        }
        self.cond.notify_all();

        while st.releasing {
            self.cond.wait(&mut st);
        }

        let result = match st.armed.take() {
            Some(mode) => {
                st.releasing = true;
                if mode.is_internal() {
                    MutexGuard::unlocked(&mut st, || self.timer.stop());
                }

                // The abort may land just before the producer enters its wait,
                // so keep issuing it until the producer has left the loop.
                while st.capture_active {
                    let sdk = &self.sdk;
                    if let Err(e) = MutexGuard::unlocked(&mut st, || sdk.abort_wait()) {
                        tracing::warn!(error = %e, "Frame wait abort failed");
                    }
                    self.cond.wait_for(&mut st, self.abort_retry);
                }

                let result = MutexGuard::unlocked(&mut st, || self.release_session());
                st.releasing = false;
                tracing::info!(frames = st.frame_nb, "Acquisition stopped");
                result
            }
            None => Ok(()),
        };

        st.status.set(CameraStatus::Ready, force_ready);
        self.cond.notify_all();
        result
    }

    fn release_session(&self) -> CameraResult<()> {
        let stopped = self.sdk.stop_capture();
        let released = self.sdk.release_buffer();
        stopped.and(released)
    }

    fn run(&self) {
        let mut st = self.state.lock();
        loop {
            match st.phase {
                Phase::Quitting => {
                    st.phase = Phase::Terminated;
                    self.cond.notify_all();
                    return;
                }
                Phase::Starting => {
                    st.phase = Phase::Capturing;
                    st.capture_active = true;
                    let request = st.request;
                    self.cond.notify_all();

                    MutexGuard::unlocked(&mut st, || self.capture(request));

                    st.capture_active = false;
                    if matches!(st.phase, Phase::Capturing | Phase::Stopping) {
                        st.phase = Phase::Finishing;
                    }
                    self.cond.notify_all();

                    if let Err(e) = MutexGuard::unlocked(&mut st, || self.stop(false)) {
                        tracing::error!(error = %e, "Unable to release the capture session");
                    }

                    if st.phase == Phase::Finishing {
                        st.phase = Phase::Idle;
                    }
                    self.cond.notify_all();
                }
                _ => self.cond.wait(&mut st),
            }
        }
    }

    fn capture(&self, request: AcquisitionRequest) {
        let started = Instant::now();
        let mut host_wants_more = true;

        loop {
            {
                let mut st = self.state.lock();
                if st.phase != Phase::Capturing || !host_wants_more {
                    break;
                }
                if request.nb_frames != 0 && st.frame_nb >= request.nb_frames {
                    break;
                }
                st.status.set(CameraStatus::Exposure, false);
            }

            match self.sdk.wait_for_frame() {
                Ok(frame) => {
                    let acq_frame_nb = {
                        let mut st = self.state.lock();
                        st.status.set(CameraStatus::Readout, false);
                        st.frame_nb
                    };

                    match self.publish(acq_frame_nb, frame) {
                        Ok(more) => {
                            host_wants_more = more;
                            let acquired = {
                                let mut st = self.state.lock();
                                st.frame_nb += 1;
                                st.frame_nb
                            };
                            let last = request.nb_frames != 0 && acquired >= request.nb_frames;
                            if host_wants_more && !last && !request.latency.is_zero() {
                                self.pace(request.latency);
                            }
                        }
                        Err(e) => {
                            tracing::warn!(frame = acq_frame_nb, error = %e, "Unable to read frame");
                        }
                    }
                }
                Err(e) if e.is_abort() => tracing::debug!("Frame wait aborted"),
                Err(e) => tracing::warn!(error = %e, "Unable to get the frame from the camera"),
            }

            let elapsed = started.elapsed().as_secs_f64();
            if elapsed > 0.0 {
                let mut st = self.state.lock();
                st.fps = st.frame_nb as f64 / elapsed;
            }
        }

        if !host_wants_more {
            tracing::debug!("Host buffer manager requested the end of the acquisition");
        }
    }

    fn publish(&self, acq_frame_nb: u64, frame: FrameDescriptor) -> CameraResult<bool> {
        let mut buffers = self.buffers.lock();
        let size = self.sdk.read_frame(buffers.frame_buffer(acq_frame_nb))?;
        Ok(buffers.new_frame_ready(FrameInfo {
            acq_frame_nb,
            hw_index: frame.index,
            size,
        }))
    }

    // Latency wait, cut short by stop or destroy.
    fn pace(&self, latency: Duration) {
        let deadline = Instant::now() + latency;
        let mut st = self.state.lock();
        while st.phase == Phase::Capturing {
            if self.cond.wait_until(&mut st, deadline).timed_out() {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::Roi;
    use crate::hardware::mock::{MockFrameBuffer, MockTucamAdapter};
    use tracing_test::traced_test;

    fn controller() -> (AcquisitionController, Arc<MockTucamAdapter>, Arc<Mutex<MockFrameBuffer>>) {
        let sdk = Arc::new(MockTucamAdapter::with_roi(Roi::new(0, 0, 8, 8)));
        let host = Arc::new(Mutex::new(MockFrameBuffer::new(4, 8 * 8 * 2)));
        let buffers: SharedBufferManager = host.clone();
        let ctrl = AcquisitionController::new(sdk.clone(), buffers, &DriverConfig::default()).unwrap();
        (ctrl, sdk, host)
    }

    fn wait_until_idle(ctrl: &AcquisitionController) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while ctrl.is_running() || ctrl.armed_mode().is_some() {
            assert!(Instant::now() < deadline, "acquisition did not finish");
            std::thread::sleep(Duration::from_millis(2));
        }
        // Rendezvous with a release still in progress on the producer side.
        ctrl.stop().unwrap();
    }

    #[test]
    fn test_start_without_prepare_is_rejected() {
        let (ctrl, _sdk, _host) = controller();
        assert!(matches!(
            ctrl.start(AcquisitionRequest::default()),
            Err(CameraError::InvalidState(_))
        ));
    }

    #[test]
    fn test_prepare_is_idempotent() {
        let (ctrl, sdk, _host) = controller();
        ctrl.prepare(TriggerMode::ExtTrigMult).unwrap();
        ctrl.prepare(TriggerMode::ExtTrigMult).unwrap();
        assert_eq!(sdk.stats().allocations, 1);
        assert_eq!(sdk.stats().capture_starts, 1);
        ctrl.stop().unwrap();
        assert_eq!(sdk.stats().releases, 1);
    }

    #[test]
    #[traced_test]
    fn test_finite_run_self_stops() {
        let (ctrl, sdk, host) = controller();
        ctrl.prepare(TriggerMode::ExtTrigMult).unwrap();
        ctrl.start(AcquisitionRequest {
            nb_frames: 3,
            latency: Duration::ZERO,
        })
        .unwrap();
        wait_until_idle(&ctrl);

        assert_eq!(host.lock().frames().len(), 3);
        assert_eq!(ctrl.acquired_frames(), 3);
        assert_eq!(ctrl.status(), CameraStatus::Ready);
        assert_eq!(sdk.stats().releases, 1);
        assert!(logs_contain("Acquisition started"));
    }

    #[test]
    fn test_destroy_twice() {
        let (ctrl, _sdk, _host) = controller();
        ctrl.destroy().unwrap();
        ctrl.destroy().unwrap();
        assert!(ctrl.prepare(TriggerMode::IntTrig).is_err());
    }
}
