//! Install/uninstall notifications.
//!
//! Every event goes to the observers registered on one pipeline first and
//! then to the process-wide broadcast channel, if it has been initialized.

use std::fmt;
use std::sync::{Mutex, PoisonError};

use log::debug;
use tokio::sync::broadcast;

use crate::package::PackageIdentity;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageEvent {
    Installing(PackageIdentity),
    Installed(PackageIdentity),
    Uninstalling(PackageIdentity),
    Uninstalled(PackageIdentity),
    ReferenceAdded {
        package: PackageIdentity,
        reference: String,
    },
    ReferenceRemoved {
        package: PackageIdentity,
        reference: String,
    },
    Warning {
        package: PackageIdentity,
        message: String,
    },
}

impl PackageEvent {
    pub fn package(&self) -> &PackageIdentity {
        match self {
            PackageEvent::Installing(p)
            | PackageEvent::Installed(p)
            | PackageEvent::Uninstalling(p)
            | PackageEvent::Uninstalled(p) => p,
            PackageEvent::ReferenceAdded { package, .. }
            | PackageEvent::ReferenceRemoved { package, .. }
            | PackageEvent::Warning { package, .. } => package,
        }
    }

    pub fn is_warning(&self) -> bool {
        matches!(self, PackageEvent::Warning { .. })
    }
}

impl fmt::Display for PackageEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageEvent::Installing(p) => write!(f, "Installing {}", p),
            PackageEvent::Installed(p) => write!(f, "Installed {}", p),
            PackageEvent::Uninstalling(p) => write!(f, "Uninstalling {}", p),
            PackageEvent::Uninstalled(p) => write!(f, "Uninstalled {}", p),
            PackageEvent::ReferenceAdded { package, reference } => {
                write!(f, "Added reference '{}' from {}", reference, package)
            }
            PackageEvent::ReferenceRemoved { package, reference } => {
                write!(f, "Removed reference '{}' of {}", reference, package)
            }
            PackageEvent::Warning { package, message } => write!(f, "{}: {}", package, message),
        }
    }
}

/// Receives the events of one pipeline.
#[cfg_attr(test, mockall::automock)]
pub trait PackageObserver: Send + Sync {
    fn notify(&self, event: &PackageEvent);
}

/// Observer that writes every event to the log.
pub struct LogObserver;

impl PackageObserver for LogObserver {
    fn notify(&self, event: &PackageEvent) {
        if event.is_warning() {
            log::warn!("{}", event);
        } else {
            log::info!("{}", event);
        }
    }
}

static CHANNEL: Mutex<Option<broadcast::Sender<PackageEvent>>> = Mutex::new(None);

const DEFAULT_CAPACITY: usize = 256;

/// Open the process-wide channel (if needed) and return a subscriber.
pub fn init() -> broadcast::Receiver<PackageEvent> {
    let mut channel = CHANNEL.lock().unwrap_or_else(PoisonError::into_inner);
    match channel.as_ref() {
        Some(sender) => sender.subscribe(),
        None => {
            let (sender, receiver) = broadcast::channel(DEFAULT_CAPACITY);
            *channel = Some(sender);
            receiver
        }
    }
}

/// Subscribe to the process-wide channel, `None` before [`init`].
pub fn subscribe() -> Option<broadcast::Receiver<PackageEvent>> {
    CHANNEL
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .as_ref()
        .map(broadcast::Sender::subscribe)
}

/// Close the process-wide channel; subscribers drain what is queued and then
/// see the channel closed.
pub fn shutdown() {
    CHANNEL.lock().unwrap_or_else(PoisonError::into_inner).take();
}

pub(crate) fn publish(event: &PackageEvent) {
    let channel = CHANNEL.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(sender) = channel.as_ref()
        && sender.send(event.clone()).is_err()
    {
        debug!("No subscribers for {}", event);
    }
}
