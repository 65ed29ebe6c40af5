//! Host capability discovery.
//!
//! [`CapabilityCollector`] builds the [`CapabilityReport`] a node sends at
//! registration and on every report tick: platform, CPU and RAM, NVIDIA
//! GPUs through NVML, and the sandbox the local executor provides.
//!
//! NVML is optional. Hosts without NVIDIA drivers report no GPU block.

use nvml_wrapper::Nvml;

use cynode_core::node_protocol::{
    CapabilityReport, Compute, GpuDevice, GpuInfo, NodeIdentity, Platform, SandboxSupport,
};
use cynode_core::PROTOCOL_VERSION;
use cynode_worker::config::{ExecutorConfig, SandboxMode};

const BYTES_PER_MB: u64 = 1024 * 1024;

pub struct CapabilityCollector {
    node_slug: String,
    node_name: String,
    executor: ExecutorConfig,
    /// `None` when NVML could not be initialised.
    nvml: Option<Nvml>,
}

impl CapabilityCollector {
    /// Create a collector, probing NVML once.
    pub fn new(node_slug: &str, node_name: &str, executor: ExecutorConfig) -> Self {
        let nvml = match Nvml::init() {
            Ok(nvml) => {
                tracing::info!("NVML initialised");
                Some(nvml)
            }
            Err(e) => {
                tracing::warn!(error = %e, "NVML unavailable, no GPUs will be reported");
                None
            }
        };
        Self::with_nvml(node_slug, node_name, executor, nvml)
    }

    /// Create a collector that never reports GPUs.
    pub fn without_gpu(node_slug: &str, node_name: &str, executor: ExecutorConfig) -> Self {
        Self::with_nvml(node_slug, node_name, executor, None)
    }

    fn with_nvml(
        node_slug: &str,
        node_name: &str,
        executor: ExecutorConfig,
        nvml: Option<Nvml>,
    ) -> Self {
        Self {
            node_slug: node_slug.to_string(),
            node_name: node_name.to_string(),
            executor,
            nvml,
        }
    }

    /// Snapshot the host.
    pub fn collect(&self) -> CapabilityReport {
        let devices = self.gpu_devices();
        CapabilityReport {
            version: PROTOCOL_VERSION,
            reported_at: Some(chrono::Utc::now()),
            node: NodeIdentity {
                node_slug: self.node_slug.clone(),
                name: Some(self.node_name.clone()),
            },
            platform: Platform {
                os: std::env::consts::OS.to_string(),
                arch: normalize_arch(std::env::consts::ARCH).to_string(),
                kernel_version: kernel_version(),
            },
            compute: Compute {
                cpu_cores: cpu_cores(),
                ram_mb: total_ram_mb(),
            },
            gpu: (!devices.is_empty()).then_some(GpuInfo { devices }),
            sandbox: Some(sandbox_support(&self.executor)),
        }
    }

    /// Devices NVML can describe. Per-device errors skip the device.
    fn gpu_devices(&self) -> Vec<GpuDevice> {
        let Some(nvml) = self.nvml.as_ref() else {
            return Vec::new();
        };
        let count = match nvml.device_count() {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to count GPUs");
                return Vec::new();
            }
        };

        (0..count)
            .filter_map(|index| {
                let device = match nvml.device_by_index(index) {
                    Ok(device) => device,
                    Err(e) => {
                        tracing::warn!(gpu = index, error = %e, "Skipping GPU");
                        return None;
                    }
                };
                let memory = match device.memory_info() {
                    Ok(memory) => memory,
                    Err(e) => {
                        tracing::warn!(gpu = index, error = %e, "Skipping GPU without memory info");
                        return None;
                    }
                };
                Some(GpuDevice {
                    index,
                    name: device.name().ok(),
                    vram_total_mb: memory.total / BYTES_PER_MB,
                })
            })
            .collect()
    }
}

impl std::fmt::Debug for CapabilityCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityCollector")
            .field("node_slug", &self.node_slug)
            .field("node_name", &self.node_name)
            .field("executor", &self.executor)
            .field("nvml", &self.nvml.is_some())
            .finish()
    }
}

/// Map Rust target arch names onto the names container registries use.
pub fn normalize_arch(arch: &str) -> &str {
    match arch {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        other => other,
    }
}

fn sandbox_support(executor: &ExecutorConfig) -> SandboxSupport {
    match executor.mode {
        SandboxMode::Container => SandboxSupport {
            supported: true,
            mode: Some("container".into()),
            runtime: Some(executor.runtime.clone()),
        },
        SandboxMode::Direct => SandboxSupport {
            supported: true,
            mode: Some("direct".into()),
            runtime: None,
        },
    }
}

fn cpu_cores() -> u32 {
    std::thread::available_parallelism()
        .map(|n| u32::try_from(n.get()).unwrap_or(u32::MAX))
        .unwrap_or(1)
}

fn kernel_version() -> Option<String> {
    std::fs::read_to_string("/proc/sys/kernel/osrelease")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(target_os = "linux")]
fn total_ram_mb() -> u64 {
    let mut info = std::mem::MaybeUninit::<libc::sysinfo>::uninit();
    // SAFETY: sysinfo only writes into the buffer we hand it.
    let ret = unsafe { libc::sysinfo(info.as_mut_ptr()) };
    if ret != 0 {
        return 0;
    }
    // SAFETY: sysinfo returned 0, so the struct is initialised.
    let info = unsafe { info.assume_init() };
    (info.totalram as u64).saturating_mul(u64::from(info.mem_unit)) / BYTES_PER_MB
}

#[cfg(not(target_os = "linux"))]
fn total_ram_mb() -> u64 {
    0
}
