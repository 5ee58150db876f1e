use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use hidapi::{HidApi, HidDevice};

use super::{choose_device, ConnectHint, DeviceDescriptor, DeviceLink};
use crate::coordinator::CoordinatorHandle;
use crate::input::parse_usage_id;
use crate::state::DeviceStatusUpdate;

const READ_TIMEOUT_MS: i32 = 100;
const REPORT_BUFFER: usize = 64;

struct Worker {
    stop: Arc<AtomicBool>,
    thread: thread::JoinHandle<()>,
}

impl Worker {
    /// Ask the thread to exit and hand back its handle.
    fn signal(self) -> thread::JoinHandle<()> {
        self.stop.store(true, Ordering::Relaxed);
        self.thread
    }

    /// Stop the thread. On a runtime the join moves to the blocking pool, since
    /// the thread can sit in a read for up to `READ_TIMEOUT_MS`.
    fn retire(self) -> Option<tokio::task::JoinHandle<()>> {
        let thread = self.signal();
        let join = move || {
            if let Err(err) = thread.join() {
                log::debug!("HID listener thread join failed: {:?}", err);
            }
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => Some(runtime.spawn_blocking(join)),
            Err(_) => {
                join();
                None
            }
        }
    }
}

/// In-process pedal listener on a dedicated thread, reading input reports
/// through hidapi and feeding usage codes to the coordinator.
pub struct HidListener {
    handle: CoordinatorHandle,
    worker: Mutex<Option<Worker>>,
}

impl HidListener {
    pub fn new(handle: CoordinatorHandle) -> Self {
        Self {
            handle,
            worker: Mutex::new(None),
        }
    }

    fn take_worker(&self) -> Option<Worker> {
        match self.worker.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }
}

fn open(hint: Option<&ConnectHint>) -> Result<(HidDevice, String), String> {
    let api = HidApi::new().map_err(|e| format!("hidapi init failed: {}", e))?;

    let infos: Vec<_> = api.device_list().collect();
    let descriptors: Vec<DeviceDescriptor> = infos
        .iter()
        .map(|info| DeviceDescriptor {
            vendor_id: info.vendor_id(),
            product_id: info.product_id(),
            product_name: info.product_string().map(str::to_string),
        })
        .collect();

    let chosen = choose_device(&descriptors, hint).ok_or("no HID devices attached")?;
    let index = descriptors
        .iter()
        .position(|d| d == chosen)
        .ok_or("chosen device vanished")?;

    let device = infos[index]
        .open_device(&api)
        .map_err(|e| format!("cannot open {:04x}:{:04x}: {}", chosen.vendor_id, chosen.product_id, e))?;

    let name = chosen
        .product_name
        .clone()
        .unwrap_or_else(|| format!("{:04x}:{:04x}", chosen.vendor_id, chosen.product_id));
    Ok((device, name))
}

fn read_reports(device: &HidDevice, handle: &CoordinatorHandle, stop: &AtomicBool) {
    let mut buf = [0u8; REPORT_BUFFER];
    while !stop.load(Ordering::Relaxed) {
        match device.read_timeout(&mut buf, READ_TIMEOUT_MS) {
            Ok(0) => {}
            Ok(n) => {
                let usage_id = parse_usage_id(&buf[..n]);
                log::trace!("HID report {:02X?} -> usage 0x{:04X}", &buf[..n], usage_id);
                if !handle.usage(usage_id) {
                    return;
                }
            }
            Err(e) => {
                log::warn!("HID read failed, device lost: {}", e);
                handle.device_status(DeviceStatusUpdate::disconnected());
                return;
            }
        }
    }
}

impl DeviceLink for HidListener {
    fn start(&self, hint: Option<ConnectHint>) {
        // The new thread waits for the old one to let go of the device.
        let previous = self.take_worker().map(Worker::signal);

        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();
        let handle = self.handle.clone();

        let thread = thread::spawn(move || {
            if let Some(previous) = previous {
                let _ = previous.join();
            }
            match open(hint.as_ref()) {
                Ok((device, name)) => {
                    log::info!("Listening to HID device '{}'", name);
                    handle.device_status(DeviceStatusUpdate::listening_on(name));
                    read_reports(&device, &handle, &stop_flag);
                }
                Err(e) => {
                    log::warn!("Cannot start HID listener: {}", e);
                    handle.device_status(DeviceStatusUpdate::disconnected());
                }
            }
        });

        match self.worker.lock() {
            Ok(mut guard) => *guard = Some(Worker { stop, thread }),
            Err(poisoned) => *poisoned.into_inner() = Some(Worker { stop, thread }),
        }
    }

    fn stop(&self) {
        if let Some(worker) = self.take_worker() {
            worker.retire();
            log::info!("HID listener stopped");
        }
        self.handle.device_status(DeviceStatusUpdate::disconnected());
    }
}

impl Drop for HidListener {
    fn drop(&mut self) {
        if let Some(worker) = self.take_worker() {
            worker.retire();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    /// A stand-in for the read loop: exits on the stop flag, then blocks
    /// until `gate` fires.
    fn gated_worker() -> (Worker, mpsc::Sender<()>) {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();
        let (gate, gate_rx) = mpsc::channel::<()>();
        let thread = thread::spawn(move || {
            while !stop_flag.load(Ordering::Relaxed) {
                thread::sleep(Duration::from_millis(1));
            }
            let _ = gate_rx.recv();
        });
        (Worker { stop, thread }, gate)
    }

    #[tokio::test]
    async fn test_retire_on_runtime_does_not_join_inline() {
        let (worker, gate) = gated_worker();

        // Joining inline would wait on a gate that only opens afterwards.
        let join = worker.retire().expect("join handed to the blocking pool");
        gate.send(()).unwrap();

        tokio::time::timeout(Duration::from_secs(5), join)
            .await
            .expect("thread exits once released")
            .unwrap();
    }

    #[test]
    fn test_retire_off_runtime_joins() {
        let (worker, gate) = gated_worker();
        gate.send(()).unwrap();

        assert!(worker.retire().is_none());
    }

    #[tokio::test]
    async fn test_stop_without_worker_reports_disconnected() {
        let (handle, inbox) = crate::coordinator::channel();
        let mut rx = inbox.into_receiver();
        let listener = HidListener::new(handle);

        listener.stop();

        match rx.recv().await {
            Some(crate::coordinator::CoordinatorEvent::DeviceStatusChanged(update)) => {
                assert_eq!(update, DeviceStatusUpdate::disconnected());
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
}
