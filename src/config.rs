//! Engine configuration

use std::env;
use std::path::PathBuf;

/// Default value stack size in slots
pub const DEFAULT_STACK_SIZE: usize = 1024;

/// Default maximum nesting of active call contexts
pub const DEFAULT_MAX_CALL_DEPTH: usize = 512;

/// Where JIT'd address ranges are published for external profilers
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PerfMapMode {
    #[default]
    Disabled,
    /// Append to `/tmp/perf-<pid>.map`
    Enabled,
    /// Append to an explicit path
    Path(PathBuf),
}

/// Native code path settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JitConfig {
    /// Whether `Engine::compile_unary_ops` generates code at all
    pub enabled: bool,
    pub perf_map: PerfMapMode,
    /// Also hand unwind info to the platform unwinder (`__register_frame`)
    pub native_unwind: bool,
}

impl Default for JitConfig {
    fn default() -> Self {
        JitConfig {
            enabled: cfg!(feature = "jit"),
            perf_map: PerfMapMode::Disabled,
            native_unwind: false,
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Value stack capacity in slots (arguments and locals of flat frames)
    pub stack_size: usize,
    /// Maximum number of nested call contexts before a RangeError
    pub max_call_depth: usize,
    pub jit: JitConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            stack_size: DEFAULT_STACK_SIZE,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            jit: JitConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn with_stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = stack_size;
        self
    }

    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    pub fn with_jit(mut self, jit: JitConfig) -> Self {
        self.jit = jit;
        self
    }

    pub fn with_perf_map(mut self, mode: PerfMapMode) -> Self {
        self.jit.perf_map = mode;
        self
    }

    /// Build a configuration from the environment
    ///
    /// `V4VM_PERF_MAP=1` enables the perf map, any other non-empty value is
    /// taken as the map path. `V4VM_JIT=0` disables code generation.
    pub fn from_env() -> Self {
        let mut config = EngineConfig::default();
        if let Ok(v) = env::var("V4VM_PERF_MAP") {
            config.jit.perf_map = parse_perf_map(&v);
        }
        if let Ok(v) = env::var("V4VM_JIT") {
            config.jit.enabled = !matches!(v.as_str(), "0" | "false" | "off");
        }
        config
    }
}

fn parse_perf_map(v: &str) -> PerfMapMode {
    match v {
        "" | "0" | "false" | "off" => PerfMapMode::Disabled,
        "1" | "true" | "on" => PerfMapMode::Enabled,
        path => PerfMapMode::Path(PathBuf::from(path)),
    }
}
