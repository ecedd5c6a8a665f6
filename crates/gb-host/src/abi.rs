//! The module's import and export surface
//!
//! Imports live in two namespaces:
//! - `env`: the functions the host actually implements
//! - `wasi_snapshot_preview1`: syscall-shaped functions the module's
//!   toolchain links against but never legitimately calls
//!
//! Every import resolves to one [`HostImport`]; all the syscall-shaped ones
//! share the single [`HostImport::Unsupported`] entry.

/// Namespace of the implemented host functions
pub const ENV: &str = "env";

/// Namespace of the syscall-shaped stubs
pub const WASI: &str = "wasi_snapshot_preview1";

/// Imports that must link but are fatal when called
pub const UNSUPPORTED_IMPORTS: [&str; 8] = [
    "args_sizes_get",
    "args_get",
    "proc_exit",
    "environ_sizes_get",
    "environ_get",
    "fd_close",
    "fd_write",
    "fd_seek",
];

/// One entry of the host function table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostImport {
    /// `renderCanvas(targetId, framebufferPtr)`
    RenderCanvas,
    /// `clock_gettime(clockId, timespecPtr) -> 0`
    ClockGettime,
    /// `notify_memory_growth(memoryIndex)`
    NotifyMemoryGrowth,
    /// `printAsciiBuffer(ptr)`
    PrintAsciiBuffer,
    /// Any syscall-shaped import; carries its name
    Unsupported(&'static str),
}

impl HostImport {
    /// Number of i32 parameters the entry takes, `None` if it accepts anything
    pub fn param_count(&self) -> Option<usize> {
        match self {
            HostImport::RenderCanvas | HostImport::ClockGettime => Some(2),
            HostImport::NotifyMemoryGrowth | HostImport::PrintAsciiBuffer => Some(1),
            HostImport::Unsupported(_) => None,
        }
    }

    /// Whether the entry returns an i32
    pub fn returns_i32(&self) -> bool {
        matches!(self, HostImport::ClockGettime)
    }
}

/// Every import the host provides, as `(namespace, name, entry)`
pub const IMPORTS: [(&str, &str, HostImport); 13] = [
    (ENV, "renderCanvas", HostImport::RenderCanvas),
    (ENV, "clock_gettime", HostImport::ClockGettime),
    (ENV, "notify_memory_growth", HostImport::NotifyMemoryGrowth),
    (ENV, "emscripten_notify_memory_growth", HostImport::NotifyMemoryGrowth),
    (ENV, "printAsciiBuffer", HostImport::PrintAsciiBuffer),
    (WASI, "args_sizes_get", HostImport::Unsupported("args_sizes_get")),
    (WASI, "args_get", HostImport::Unsupported("args_get")),
    (WASI, "proc_exit", HostImport::Unsupported("proc_exit")),
    (WASI, "environ_sizes_get", HostImport::Unsupported("environ_sizes_get")),
    (WASI, "environ_get", HostImport::Unsupported("environ_get")),
    (WASI, "fd_close", HostImport::Unsupported("fd_close")),
    (WASI, "fd_write", HostImport::Unsupported("fd_write")),
    (WASI, "fd_seek", HostImport::Unsupported("fd_seek")),
];

/// Look up the table entry for an import
pub fn resolve_import(namespace: &str, name: &str) -> Option<HostImport> {
    IMPORTS
        .iter()
        .find(|(ns, import, _)| *ns == namespace && *import == name)
        .map(|(_, _, entry)| *entry)
}

/// Names of the exports the host consumes
///
/// Function exports list candidates in order of preference; the first one the
/// module actually exports is used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportNames {
    pub memory: String,
    pub malloc: String,
    pub free: String,
    pub create_emulator: Vec<String>,
    pub run_frame: Vec<String>,
}

impl Default for ExportNames {
    fn default() -> Self {
        Self {
            memory: "memory".into(),
            malloc: "malloc".into(),
            free: "free".into(),
            create_emulator: vec!["createEmulator".into(), "createGameboy".into()],
            run_frame: vec!["runFrame".into(), "runGameboy".into()],
        }
    }
}

impl ExportNames {
    /// First candidate accepted by `exists`
    pub fn pick<'a>(candidates: &'a [String], mut exists: impl FnMut(&str) -> bool) -> Option<&'a str> {
        candidates
            .iter()
            .map(String::as_str)
            .find(|name| exists(name))
    }
}
