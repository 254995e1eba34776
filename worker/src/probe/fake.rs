use std::cell::RefCell;
use std::collections::VecDeque;
use std::future::{ready, Future};
use std::io;

use super::{MemInfo, Probe, ProbeError};

/// Scripted probe: `/proc/stat` readings are consumed in order, the rest
/// are fixed. `None` means the source is unavailable.
#[derive(Default)]
pub struct FakeProbe {
    pub stats: RefCell<VecDeque<String>>,
    pub memory: Option<MemInfo>,
    pub gpu: Option<String>,
    pub ps_cpu: Option<String>,
    pub ps_mem: Option<String>,
    pub host: Option<String>,
}

impl FakeProbe {
    pub fn with_stats(stats: &[String]) -> Self {
        Self {
            stats: RefCell::new(stats.iter().cloned().collect()),
            ..Default::default()
        }
    }
}

pub fn missing(path: &'static str) -> ProbeError {
    ProbeError::Read {
        path,
        source: io::Error::new(io::ErrorKind::NotFound, "gone"),
    }
}

impl Probe for FakeProbe {
    fn proc_stat(&self) -> Result<String, ProbeError> {
        self.stats
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| missing("/proc/stat"))
    }

    fn memory(&mut self) -> Result<MemInfo, ProbeError> {
        self.memory.ok_or(ProbeError::Memory)
    }

    fn command(
        &self,
        program: &str,
        args: &[&str],
    ) -> impl Future<Output = Result<String, ProbeError>> + Send {
        let out = match (program, args.last().copied()) {
            ("nvidia-smi", _) => self.gpu.clone(),
            ("ps", Some("--sort=-pcpu")) => self.ps_cpu.clone(),
            ("ps", Some("--sort=-pmem")) => self.ps_mem.clone(),
            _ => None,
        };
        ready(out.ok_or_else(|| ProbeError::Spawn {
            program: program.to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "not installed"),
        }))
    }

    fn hostname(&self) -> Result<String, ProbeError> {
        self.host.clone().ok_or(ProbeError::Hostname)
    }
}
