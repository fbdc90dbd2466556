//! Blocking PulseAudio client used by the audio subsystem's worker threads.
//!
//! libpulse's threaded mainloop runs its own callback thread; every call
//! here follows the same discipline: take our mainloop mutex, take the
//! pa-level mainloop lock, issue the operation, release, then wait for the
//! callback's answer over a channel. The mainloop is `!Send`, which is why
//! the whole subsystem lives on dedicated OS threads rather than on the
//! async runtime.

use std::sync::mpsc::{self, SyncSender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use libpulse_binding as pulse;
use parking_lot::Mutex;
use pulse::callbacks::ListResult;
use pulse::context::subscribe::InterestMaskSet;
use pulse::context::{Context, FlagSet as ContextFlagSet, State as ContextState};
use pulse::mainloop::threaded::Mainloop;
use pulse::proplist::Proplist;
use pulse::volume::{ChannelVolumes, Volume};
use thiserror::Error;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const OP_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum PulseError {
    #[error("mainloop setup failed")]
    Mainloop,
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("server did not answer in time")]
    Timeout,
    #[error("no default sink")]
    NoSink,
}

/// A live connection to the audio daemon. Cheap to share between the update
/// and click threads; dropped wholesale on reinit.
pub struct PulseClient {
    mainloop: Arc<Mutex<Mainloop>>,
    context: Arc<Mutex<Context>>,
    // Kept so the update stream closes when the client is dropped.
    update_tx: Mutex<Option<SyncSender<()>>>,
}

// The libpulse threaded mainloop serializes all access through its own
// internal lock (taken via `ml.lock()`/`ml.unlock()` at every call site), so
// the `Rc` buried in `MainloopInner` is only ever touched under that lock.
// The client is therefore safe to share between the update and click threads,
// as the type's documentation states.
unsafe impl Send for PulseClient {}
unsafe impl Sync for PulseClient {}

impl PulseClient {
    /// Connects and waits for the context to become ready.
    pub fn connect() -> Result<Self, PulseError> {
        let mut proplist = Proplist::new().ok_or(PulseError::Mainloop)?;
        let _ = proplist.set_str(pulse::proplist::properties::APPLICATION_NAME, "barline");

        let mainloop = Mainloop::new().ok_or(PulseError::Mainloop)?;
        let context = Context::new_with_proplist(&mainloop, "barline-volume", &proplist)
            .ok_or(PulseError::Mainloop)?;

        let mainloop = Arc::new(Mutex::new(mainloop));
        let context = Arc::new(Mutex::new(context));

        {
            let mut ml = mainloop.lock();
            if ml.start().is_err() {
                return Err(PulseError::Mainloop);
            }
        }
        {
            let mut ml = mainloop.lock();
            ml.lock();
            let connected = context
                .lock()
                .connect(None, ContextFlagSet::NOFLAGS, None);
            ml.unlock();
            if let Err(err) = connected {
                return Err(PulseError::Connect(format!("{err}")));
            }
        }

        let deadline = Instant::now() + CONNECT_TIMEOUT;
        loop {
            let state = {
                let mut ml = mainloop.lock();
                ml.lock();
                let state = context.lock().get_state();
                ml.unlock();
                state
            };
            match state {
                ContextState::Ready => break,
                ContextState::Failed | ContextState::Terminated => {
                    return Err(PulseError::Connect("context failed".to_string()));
                }
                _ if Instant::now() >= deadline => return Err(PulseError::Timeout),
                _ => thread::sleep(Duration::from_millis(10)),
            }
        }

        Ok(PulseClient {
            mainloop,
            context,
            update_tx: Mutex::new(None),
        })
    }

    /// Whether the server connection is still up.
    pub fn is_alive(&self) -> bool {
        let mut ml = self.mainloop.lock();
        ml.lock();
        let state = self.context.lock().get_state();
        ml.unlock();
        matches!(state, ContextState::Ready)
    }

    /// Average volume of the default sink, in percent.
    pub fn volume_percent(&self) -> Result<u32, PulseError> {
        self.sink_status().map(|(percent, _)| percent)
    }

    /// Sets the default sink's volume on all of its channels.
    pub fn set_volume_percent(&self, percent: u32) -> Result<(), PulseError> {
        let sink = self.default_sink_name()?;
        let (_, channels) = self.sink_status()?;
        let value = Volume((Volume::NORMAL.0 as f64 * percent as f64 / 100.0) as u32);
        let mut volumes = ChannelVolumes::default();
        volumes.set(channels, value);

        let mut ml = self.mainloop.lock();
        ml.lock();
        {
            let context = self.context.lock();
            let mut introspect = context.introspect();
            introspect.set_sink_volume_by_name(&sink, &volumes, None);
        }
        ml.unlock();
        Ok(())
    }

    /// Subscribes to server-side change events. The returned channel gets a
    /// (coalesced) wake-up per change and closes when this client is
    /// dropped; a silent channel with `is_alive() == false` means the
    /// server went away.
    pub fn updates(&self) -> mpsc::Receiver<()> {
        let (tx, rx) = mpsc::sync_channel::<()>(1);
        *self.update_tx.lock() = Some(tx.clone());

        let mut ml = self.mainloop.lock();
        ml.lock();
        let mut context = self.context.lock();
        context.set_subscribe_callback(Some(Box::new(move |_facility, _operation, _index| {
            // Full buffer means a wake-up is already pending; drop it.
            let _ = tx.try_send(());
        })));
        context.subscribe(InterestMaskSet::SINK | InterestMaskSet::SERVER, |_success| {});
        ml.unlock();
        rx
    }

    fn default_sink_name(&self) -> Result<String, PulseError> {
        let (tx, rx) = mpsc::channel();
        {
            let mut ml = self.mainloop.lock();
            ml.lock();
            {
                let context = self.context.lock();
                let introspect = context.introspect();
                introspect.get_server_info(move |info| {
                    let _ =
                        tx.send(info.default_sink_name.as_ref().map(|name| name.to_string()));
                });
            }
            ml.unlock();
        }
        rx.recv_timeout(OP_TIMEOUT)
            .map_err(|_| PulseError::Timeout)?
            .ok_or(PulseError::NoSink)
    }

    /// Volume percent and channel count of the default sink in one query.
    fn sink_status(&self) -> Result<(u32, u8), PulseError> {
        let sink = self.default_sink_name()?;
        let (tx, rx) = mpsc::channel();
        {
            let mut ml = self.mainloop.lock();
            ml.lock();
            {
                let context = self.context.lock();
                let introspect = context.introspect();
                introspect.get_sink_info_by_name(&sink, move |result| {
                    if let ListResult::Item(info) = result {
                        let percent = ((info.volume.avg().0 as f64 / Volume::NORMAL.0 as f64)
                            * 100.0)
                            .round() as u32;
                        let _ = tx.send((percent, info.volume.len()));
                    }
                });
            }
            ml.unlock();
        }
        rx.recv_timeout(OP_TIMEOUT).map_err(|_| PulseError::Timeout)
    }
}

impl Drop for PulseClient {
    fn drop(&mut self) {
        *self.update_tx.lock() = None;
        let mut ml = self.mainloop.lock();
        ml.lock();
        self.context.lock().disconnect();
        ml.unlock();
        ml.stop();
    }
}
