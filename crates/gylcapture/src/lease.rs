//! Exclusive ownership of the camera and sensor.
//!
//! The hardware is held only while the capture view is visible. Acquire and
//! release may be called redundantly from lifecycle callbacks.

use tracing::{debug, info, warn};

use crate::error::DeviceError;
use crate::sources::{FrameGeometry, FrameSink, FrameSource, SensorSource};

pub struct HardwareLease {
    sensor: Box<dyn SensorSource>,
    camera: Box<dyn FrameSource>,
    geometry: Option<FrameGeometry>,
}

impl HardwareLease {
    pub fn new(sensor: Box<dyn SensorSource>, camera: Box<dyn FrameSource>) -> Self {
        Self {
            sensor,
            camera,
            geometry: None,
        }
    }

    pub fn is_held(&self) -> bool {
        self.geometry.is_some()
    }

    pub fn geometry(&self) -> Option<FrameGeometry> {
        self.geometry
    }

    /// Register the sensor, then open the camera into `sink`.
    ///
    /// A no-op while held. If the camera fails the sensor is unregistered
    /// again, so a failed acquire holds nothing.
    pub fn acquire(&mut self, sink: FrameSink) -> Result<FrameGeometry, DeviceError> {
        if let Some(geometry) = self.geometry {
            return Ok(geometry);
        }

        self.sensor.register()?;
        match self.camera.open(sink) {
            Ok(geometry) => {
                info!("camera open at {}x{}", geometry.width, geometry.height);
                self.geometry = Some(geometry);
                Ok(geometry)
            }
            Err(e) => {
                warn!("camera open failed: {}", e);
                self.sensor.unregister();
                Err(e)
            }
        }
    }

    /// Close the camera and unregister the sensor. A no-op when not held.
    pub fn release(&mut self) {
        if self.geometry.take().is_none() {
            return;
        }
        self.camera.close();
        self.sensor.unregister();
        debug!("capture hardware released");
    }

    pub fn sensor(&self) -> &dyn SensorSource {
        self.sensor.as_ref()
    }

    pub fn sensor_mut(&mut self) -> &mut dyn SensorSource {
        self.sensor.as_mut()
    }

    pub fn camera(&self) -> &dyn FrameSource {
        self.camera.as_ref()
    }

    pub fn camera_mut(&mut self) -> &mut dyn FrameSource {
        self.camera.as_mut()
    }
}

impl Drop for HardwareLease {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::sync::mpsc;

    #[derive(Default)]
    struct Calls {
        registered: u32,
        unregistered: u32,
        opened: u32,
        closed: u32,
    }

    struct Sensor(Arc<Mutex<Calls>>);

    impl SensorSource for Sensor {
        fn snapshot_line(&self) -> String {
            "0,0,0".to_string()
        }
        fn header_description(&self) -> String {
            "a,b,c".to_string()
        }
        fn register(&mut self) -> Result<(), DeviceError> {
            self.0.lock().unwrap().registered += 1;
            Ok(())
        }
        fn unregister(&mut self) {
            self.0.lock().unwrap().unregistered += 1;
        }
        fn reset(&mut self) {}
    }

    struct Camera {
        calls: Arc<Mutex<Calls>>,
        fail: bool,
    }

    impl FrameSource for Camera {
        fn open(&mut self, _sink: FrameSink) -> Result<FrameGeometry, DeviceError> {
            if self.fail {
                return Err(DeviceError::Busy("in use".to_string()));
            }
            self.calls.lock().unwrap().opened += 1;
            Ok(FrameGeometry {
                width: 4,
                height: 2,
            })
        }
        fn close(&mut self) {
            self.calls.lock().unwrap().closed += 1;
        }
        fn current_focal_length(&self) -> f32 {
            0.0
        }
        fn set_focal_length(&mut self, _value: f32) -> Result<(), DeviceError> {
            Ok(())
        }
    }

    fn lease(fail: bool) -> (HardwareLease, Arc<Mutex<Calls>>) {
        let calls = Arc::new(Mutex::new(Calls::default()));
        let lease = HardwareLease::new(
            Box::new(Sensor(Arc::clone(&calls))),
            Box::new(Camera {
                calls: Arc::clone(&calls),
                fail,
            }),
        );
        (lease, calls)
    }

    fn sink() -> (FrameSink, mpsc::Sender<crate::controller::ControlCommand>) {
        let (tx, _rx) = mpsc::channel(1);
        (FrameSink::new(tx.downgrade()), tx)
    }

    #[test]
    fn test_acquire_and_release_are_idempotent() {
        let (mut lease, calls) = lease(false);
        let (s, _tx) = sink();

        lease.acquire(s.clone()).unwrap();
        lease.acquire(s).unwrap();
        assert!(lease.is_held());

        lease.release();
        lease.release();
        assert!(!lease.is_held());

        let calls = calls.lock().unwrap();
        assert_eq!(calls.registered, 1);
        assert_eq!(calls.opened, 1);
        assert_eq!(calls.closed, 1);
        assert_eq!(calls.unregistered, 1);
    }

    #[test]
    fn test_failed_camera_unregisters_sensor() {
        let (mut lease, calls) = lease(true);
        let (s, _tx) = sink();

        let err = lease.acquire(s).unwrap_err();
        assert!(matches!(err, DeviceError::Busy(_)));
        assert!(!lease.is_held());

        let calls = calls.lock().unwrap();
        assert_eq!(calls.registered, 1);
        assert_eq!(calls.unregistered, 1);
        assert_eq!(calls.closed, 0);
    }

    #[test]
    fn test_drop_releases() {
        let (mut lease, calls) = lease(false);
        let (s, _tx) = sink();
        lease.acquire(s).unwrap();
        drop(lease);
        assert_eq!(calls.lock().unwrap().closed, 1);
    }
}
