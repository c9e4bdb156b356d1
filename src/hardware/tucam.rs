//! TUCAM driver session (requires the `tucam_hardware` feature).
//!
//! Thin safe layer over `tucam-sys`. Every call checks the `TUCAMRET` code
//! and turns failures into [`CameraError::Hardware`] naming the call.
//!
//! The driver keeps a single frame descriptor per session: `TUCAM_Buf_Alloc`
//! fills it, `TUCAM_Buf_WaitForFrame` updates it and `read_frame` copies out of
//! the buffer it points to. It lives behind a mutex of its own so that
//! `abort_wait` is never blocked by an in-flight wait.

#![allow(unsafe_code)]

use parking_lot::Mutex;
use std::ffi::CStr;
use std::os::raw::c_char;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tucam_sys::*;

use super::{
    CapabilityId, FrameDescriptor, InfoId, InfoValue, PropertyId, PropertyRange, TucamAdapter,
};
use crate::config::DriverConfig;
use crate::detector::Roi;
use crate::error::{CameraError, CameraResult};
use crate::params::{
    check_output_port, CaptureMode, OutputSignal, OutputSignalConfig, SignalEdge, TriggerAttr,
};

/// The driver supports one API session per process.
static SESSION_OPEN: AtomicBool = AtomicBool::new(false);

const INFO_TEXT_LEN: usize = 64;
// Monochrome sensor: every property lives on channel 0.
const CHANNEL: i32 = 0;

fn check(ret: TUCAMRET, call: &str) -> CameraResult<()> {
    if ret == TUCAMRET_SUCCESS {
        Ok(())
    } else {
        Err(CameraError::hardware(format!("{call} failed (code {ret:#x})")))
    }
}

struct FrameSlot(TUCAM_FRAME);

// The frame descriptor points into driver memory that stays valid until
// TUCAM_Buf_Release; access is serialised by the surrounding mutex.
unsafe impl Send for FrameSlot {}

struct Handle(HDTUCAM);

// The driver handle is an opaque token accepted from any thread.
unsafe impl Send for Handle {}
unsafe impl Sync for Handle {}

/// Open session on a physical Dhyana camera.
pub struct TucamSdk {
    handle: Handle,
    frame: Mutex<FrameSlot>,
    wait_timeout_ms: i32,
}

impl TucamSdk {
    /// Initialise the driver and open camera `config.camera_index`.
    pub fn open(config: &DriverConfig) -> CameraResult<Self> {
        if SESSION_OPEN.swap(true, Ordering::SeqCst) {
            return Err(CameraError::Initialization(
                "A TUCAM session is already open in this process".to_owned(),
            ));
        }

        match Self::open_inner(config) {
            Ok(sdk) => Ok(sdk),
            Err(e) => {
                SESSION_OPEN.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    fn open_inner(config: &DriverConfig) -> CameraResult<Self> {
        let mut path = *b"./\0";
        let mut init = TUCAM_INIT {
            uiCamCount: 0,
            pstrConfigPath: path.as_mut_ptr().cast::<c_char>(),
        };

        unsafe {
            if TUCAM_Api_Init(&mut init) != TUCAMRET_SUCCESS {
                return Err(CameraError::Initialization(
                    "Unable to initialize TUCAM_Api".to_owned(),
                ));
            }
        }

        if init.uiCamCount == 0 || config.camera_index >= init.uiCamCount {
            unsafe {
                TUCAM_Api_Uninit();
            }
            return Err(CameraError::Initialization(format!(
                "No camera found at index {} ({} detected)",
                config.camera_index, init.uiCamCount
            )));
        }

        let mut open = TUCAM_OPEN {
            uiIdxOpen: config.camera_index,
            hIdxTUCam: std::ptr::null_mut(),
        };
        unsafe {
            if TUCAM_Dev_Open(&mut open) != TUCAMRET_SUCCESS || open.hIdxTUCam.is_null() {
                TUCAM_Api_Uninit();
                return Err(CameraError::Initialization(format!(
                    "Unable to open camera {}",
                    config.camera_index
                )));
            }
        }

        tracing::info!(
            camera_index = config.camera_index,
            cameras = init.uiCamCount,
            "TUCAM session opened"
        );

        // SAFETY: TUCAM_FRAME is a plain C struct; all-zero is its unallocated state.
        let mut frame: TUCAM_FRAME = unsafe { std::mem::zeroed() };
        frame.ucFormatGet = TUFRM_FMT_RAW as u8;
        frame.uiRsdSize = 1;

        Ok(Self {
            handle: Handle(open.hIdxTUCam),
            frame: Mutex::new(FrameSlot(frame)),
            wait_timeout_ms: i32::try_from(config.wait_timeout_ms).unwrap_or(i32::MAX),
        })
    }

    fn raw(&self) -> HDTUCAM {
        self.handle.0
    }

    fn property_code(id: PropertyId) -> i32 {
        (match id {
            PropertyId::ExposureTime => TUIDP_EXPOSURETM,
            PropertyId::Temperature => TUIDP_TEMPERATURE,
            PropertyId::GlobalGain => TUIDP_GLOBALGAIN,
        }) as i32
    }

    fn capability_code(id: CapabilityId) -> i32 {
        (match id {
            CapabilityId::FanGear => TUIDC_FAN_GEAR,
        }) as i32
    }

    fn info_code(id: InfoId) -> i32 {
        (match id {
            InfoId::CameraModel => TUIDI_CAMERA_MODEL,
            InfoId::ApiVersion => TUIDI_VERSION_API,
            InfoId::FirmwareVersion => TUIDI_VERSION_FRMW,
        }) as i32
    }
}

impl Drop for TucamSdk {
    fn drop(&mut self) {
        unsafe {
            TUCAM_Dev_Close(self.raw());
            TUCAM_Api_Uninit();
        }
        SESSION_OPEN.store(false, Ordering::SeqCst);
        tracing::info!("TUCAM session closed");
    }
}

impl TucamAdapter for TucamSdk {
    fn alloc_buffer(&self) -> CameraResult<()> {
        let mut frame = self.frame.lock();
        check(
            unsafe { TUCAM_Buf_Alloc(self.raw(), &mut frame.0) },
            "TUCAM_Buf_Alloc",
        )
    }

    fn release_buffer(&self) -> CameraResult<()> {
        check(unsafe { TUCAM_Buf_Release(self.raw()) }, "TUCAM_Buf_Release")
    }

    fn start_capture(&self, mode: CaptureMode) -> CameraResult<()> {
        check(
            unsafe { TUCAM_Cap_Start(self.raw(), mode.raw() as u32) },
            "TUCAM_Cap_Start",
        )
    }

    fn stop_capture(&self) -> CameraResult<()> {
        check(unsafe { TUCAM_Cap_Stop(self.raw()) }, "TUCAM_Cap_Stop")
    }

    fn wait_for_frame(&self) -> CameraResult<FrameDescriptor> {
        let mut frame = self.frame.lock();
        let ret = unsafe { TUCAM_Buf_WaitForFrame(self.raw(), &mut frame.0, self.wait_timeout_ms) };
        match ret {
            r if r == TUCAMRET_SUCCESS => Ok(FrameDescriptor {
                index: frame.0.uiIndex,
                width: u32::from(frame.0.usWidth),
                height: u32::from(frame.0.usHeight),
                size: frame.0.uiImgSize as usize,
            }),
            r if r == TUCAMRET_ABORT => Err(CameraError::WaitAborted),
            r => Err(CameraError::hardware(format!(
                "TUCAM_Buf_WaitForFrame failed (code {r:#x})"
            ))),
        }
    }

    fn read_frame(&self, dest: &mut [u8]) -> CameraResult<usize> {
        let frame = self.frame.lock();
        let size = frame.0.uiImgSize as usize;
        if frame.0.pBuffer.is_null() {
            return Err(CameraError::hardware("No frame available to read"));
        }
        if dest.len() < size {
            return Err(CameraError::hardware(format!(
                "Frame of {size} bytes does not fit a {} byte buffer",
                dest.len()
            )));
        }
        // SAFETY: pBuffer is valid for usOffset + uiImgSize bytes until the
        // next wait or Buf_Release, both excluded while we hold the lock.
        unsafe {
            let src = frame.0.pBuffer.add(usize::from(frame.0.usOffset));
            std::ptr::copy_nonoverlapping(src, dest.as_mut_ptr(), size);
        }
        Ok(size)
    }

    fn abort_wait(&self) -> CameraResult<()> {
        check(unsafe { TUCAM_Buf_AbortWait(self.raw()) }, "TUCAM_Buf_AbortWait")
    }

    fn software_trigger(&self) -> CameraResult<()> {
        check(
            unsafe { TUCAM_Cap_DoSoftwareTrigger(self.raw()) },
            "TUCAM_Cap_DoSoftwareTrigger",
        )
    }

    fn set_trigger(&self, attr: TriggerAttr) -> CameraResult<()> {
        let raw = TUCAM_TRIGGER_ATTR {
            nTgrMode: attr.capture.raw(),
            nExpMode: attr.exposure.raw(),
            nEdgeMode: attr.edge.raw(),
            nDelayTm: attr.delay.as_millis() as i32,
            nFrames: attr.frames as i32,
            nBufFrames: 0,
        };
        check(
            unsafe { TUCAM_Cap_SetTrigger(self.raw(), raw) },
            "TUCAM_Cap_SetTrigger",
        )
    }

    fn property(&self, id: PropertyId) -> CameraResult<f64> {
        let mut value = 0.0;
        check(
            unsafe {
                TUCAM_Prop_GetValue(self.raw(), Self::property_code(id), &mut value, CHANNEL)
            },
            "TUCAM_Prop_GetValue",
        )?;
        Ok(value)
    }

    fn set_property(&self, id: PropertyId, value: f64) -> CameraResult<()> {
        check(
            unsafe { TUCAM_Prop_SetValue(self.raw(), Self::property_code(id), value, CHANNEL) },
            "TUCAM_Prop_SetValue",
        )
    }

    fn property_range(&self, id: PropertyId) -> CameraResult<PropertyRange> {
        // SAFETY: plain C struct, zero is a valid request before filling the ids.
        let mut attr: TUCAM_PROP_ATTR = unsafe { std::mem::zeroed() };
        attr.idProp = Self::property_code(id);
        attr.nIdxChn = CHANNEL;
        check(
            unsafe { TUCAM_Prop_GetAttr(self.raw(), &mut attr) },
            "TUCAM_Prop_GetAttr",
        )?;
        Ok(PropertyRange {
            min: attr.dbValMin,
            max: attr.dbValMax,
            default: attr.dbValDft,
        })
    }

    fn capability(&self, id: CapabilityId) -> CameraResult<i32> {
        let mut value = 0;
        check(
            unsafe { TUCAM_Capa_GetValue(self.raw(), Self::capability_code(id), &mut value) },
            "TUCAM_Capa_GetValue",
        )?;
        Ok(value)
    }

    fn set_capability(&self, id: CapabilityId, value: i32) -> CameraResult<()> {
        check(
            unsafe { TUCAM_Capa_SetValue(self.raw(), Self::capability_code(id), value) },
            "TUCAM_Capa_SetValue",
        )
    }

    fn info(&self, id: InfoId) -> CameraResult<InfoValue> {
        let mut text = [0 as c_char; INFO_TEXT_LEN];
        let mut info = TUCAM_VALUE_INFO {
            nID: Self::info_code(id),
            nValue: 0,
            pText: text.as_mut_ptr(),
            nTextSize: INFO_TEXT_LEN as i32,
        };
        check(
            unsafe { TUCAM_Dev_GetInfo(self.raw(), &mut info) },
            "TUCAM_Dev_GetInfo",
        )?;
        // SAFETY: the driver writes a NUL-terminated string of at most nTextSize bytes.
        let text = unsafe { CStr::from_ptr(text.as_ptr()) }
            .to_string_lossy()
            .into_owned();
        Ok(InfoValue {
            value: info.nValue,
            text,
        })
    }

    fn roi(&self) -> CameraResult<Roi> {
        // SAFETY: plain C struct filled by the driver.
        let mut attr: TUCAM_ROI_ATTR = unsafe { std::mem::zeroed() };
        check(
            unsafe { TUCAM_Cap_GetROI(self.raw(), &mut attr) },
            "TUCAM_Cap_GetROI",
        )?;
        Ok(Roi::new(
            attr.nHOffset.max(0) as u32,
            attr.nVOffset.max(0) as u32,
            attr.nWidth.max(0) as u32,
            attr.nHeight.max(0) as u32,
        ))
    }

    fn set_roi(&self, roi: Roi) -> CameraResult<()> {
        let attr = TUCAM_ROI_ATTR {
            bEnable: 1,
            nHOffset: roi.x as i32,
            nVOffset: roi.y as i32,
            nWidth: roi.size.width as i32,
            nHeight: roi.size.height as i32,
        };
        check(unsafe { TUCAM_Cap_SetROI(self.raw(), attr) }, "TUCAM_Cap_SetROI")
    }

    fn trigger_out(&self, port: usize) -> CameraResult<OutputSignalConfig> {
        let port = check_output_port(port)?;
        // SAFETY: plain C struct, only the port is read by the driver.
        let mut attr: TUCAM_TRGOUT_ATTR = unsafe { std::mem::zeroed() };
        attr.nTgrOutPort = port as i32;
        check(
            unsafe { TUCAM_Cap_GetTriggerOut(self.raw(), &mut attr) },
            "TUCAM_Cap_GetTriggerOut",
        )?;
        Ok(OutputSignalConfig {
            signal: OutputSignal::from_raw(attr.nTgrOutMode)?,
            edge: SignalEdge::from_raw(attr.nEdgeMode)?,
            delay: Duration::from_micros(attr.nDelayTm.max(0) as u64),
            width: Duration::from_micros(attr.nWidth.max(0) as u64),
        })
    }

    fn set_trigger_out(&self, port: usize, config: OutputSignalConfig) -> CameraResult<()> {
        let port = check_output_port(port)?;
        let (delay, width) = config.micros()?;
        let attr = TUCAM_TRGOUT_ATTR {
            nTgrOutPort: port as i32,
            nTgrOutMode: config.signal.raw(),
            nEdgeMode: config.edge.raw(),
            nDelayTm: delay,
            nWidth: width,
        };
        check(
            unsafe { TUCAM_Cap_SetTriggerOut(self.raw(), attr) },
            "TUCAM_Cap_SetTriggerOut",
        )
    }
}

#[cfg(all(test, feature = "hardware_tests"))]
mod tests {
    use super::*;

    #[test]
    fn test_open_and_query_model() {
        let sdk = TucamSdk::open(&DriverConfig::default()).unwrap();
        let model = sdk.info(InfoId::CameraModel).unwrap();
        assert!(!model.text.is_empty());
        assert!(TucamSdk::open(&DriverConfig::default()).is_err());
    }
}
