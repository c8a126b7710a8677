//! Scripted connector pool for testing the dispatch pipeline without network
//! access.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::{Connector, ConnectorPool};
use crate::errors::EngineFault;
use crate::probe::{ProbeDescriptor, ProbeOutcome};

/// What every connector handed out by a [`ScriptedPool`] does.
#[derive(Debug, Clone)]
pub enum Script {
    /// Report a fixed outcome; `round_trip` uses the raw sentinel encoding.
    Outcome {
        is_up: bool,
        round_trip: u16,
        status: String,
    },
    /// Fail in `acquire`.
    AcquireFault,
    /// Fail in `run`.
    RunFault,
    /// Panic in `run`.
    Panic,
    /// Never complete.
    Hang,
}

impl Script {
    pub fn outcome(is_up: bool, round_trip: u16, status: &str) -> Self {
        Script::Outcome {
            is_up,
            round_trip,
            status: status.to_string(),
        }
    }
}

pub struct ScriptedPool {
    script: Script,
    acquisitions: AtomicUsize,
    descriptors: Mutex<Vec<ProbeDescriptor>>,
}

impl ScriptedPool {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            acquisitions: AtomicUsize::new(0),
            descriptors: Mutex::new(Vec::new()),
        }
    }

    pub fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }

    /// Descriptors seen by `acquire`, in call order.
    pub fn descriptors(&self) -> Vec<ProbeDescriptor> {
        self.descriptors
            .lock()
            .map(|seen| seen.clone())
            .unwrap_or_default()
    }
}

impl ConnectorPool for ScriptedPool {
    fn acquire(&self, descriptor: &ProbeDescriptor) -> Result<Box<dyn Connector>, EngineFault> {
        self.acquisitions.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut seen) = self.descriptors.lock() {
            seen.push(descriptor.clone());
        }
        if matches!(self.script, Script::AcquireFault) {
            return Err(EngineFault::Resource("no connector available".to_string()));
        }
        Ok(Box::new(ScriptedConnector {
            script: self.script.clone(),
            timeout_ms: descriptor.timeout_ms,
        }))
    }
}

struct ScriptedConnector {
    script: Script,
    timeout_ms: u64,
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn run(self: Box<Self>) -> Result<ProbeOutcome, EngineFault> {
        match self.script {
            Script::Outcome {
                is_up,
                round_trip,
                status,
            } => Ok(ProbeOutcome::from_raw_round_trip(
                is_up,
                round_trip,
                status,
                self.timeout_ms,
            )),
            Script::AcquireFault => unreachable!("acquire already failed"),
            Script::RunFault => Err(EngineFault::Resource("socket exhausted".to_string())),
            Script::Panic => panic!("connector blew up"),
            Script::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }
}
