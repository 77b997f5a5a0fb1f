use crate::types::{MatchRecord, ScanSummary};

/// Operating systems a plugin declares support for (§6: "Plugins declare
/// supported operating systems; the loader refuses plugins that do not
/// list the current OS"). Kept as plain data rather than a dynamic
/// capability query (§9 redesign note).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupportedOs {
    Linux,
    MacOs,
    Windows,
}

impl SupportedOs {
    fn matches_current(self) -> bool {
        match self {
            SupportedOs::Linux => cfg!(target_os = "linux"),
            SupportedOs::MacOs => cfg!(target_os = "macos"),
            SupportedOs::Windows => cfg!(target_os = "windows"),
        }
    }
}

/// A synchronous side-effect hook invoked once per `MatchRecord`, inside
/// the worker, immediately after the record is queued on the
/// ResultChannel (§6, §4.3 step 4). A panicking or otherwise failing
/// callback must never prevent the record from reaching the output file
/// (§8 boundary property) — callers invoke callbacks strictly after the
/// send, never before or in place of it.
pub trait Callback: Send + Sync {
    fn supported_os(&self) -> &[SupportedOs];
    fn run(&self, record: &MatchRecord);
}

/// A batch hook invoked once after scanning, only when `match_count > 0`
/// (§6, §4.5 step 5 / Non-goals: the core does not implement *what* post
/// modules do, only the fixed hook described here).
pub trait PostModule: Send + Sync {
    fn supported_os(&self) -> &[SupportedOs];
    fn run(&self, summary: &ScanSummary);
}

/// Static, explicitly-constructed registry of plugins for one run, in
/// place of the dynamic class-hierarchy discovery the source used (§9).
/// Plugins whose declared OS set excludes the current platform are
/// dropped at construction time rather than at invocation time.
#[derive(Default)]
pub struct PluginRegistry {
    callbacks: Vec<Box<dyn Callback>>,
    post_modules: Vec<Box<dyn PostModule>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        PluginRegistry::default()
    }

    pub fn register_callback(&mut self, callback: Box<dyn Callback>) {
        if os_supported(callback.supported_os()) {
            self.callbacks.push(callback);
        } else {
            tracing::warn!("callback does not support the current OS, refusing to load it");
        }
    }

    pub fn register_post_module(&mut self, module: Box<dyn PostModule>) {
        if os_supported(module.supported_os()) {
            self.post_modules.push(module);
        } else {
            tracing::warn!("post module does not support the current OS, refusing to load it");
        }
    }

    pub fn invoke_callbacks(&self, record: &MatchRecord) {
        for callback in &self.callbacks {
            callback.run(record);
        }
    }

    /// Invoked once by the core after the Reader reports `match_count > 0`;
    /// skipped entirely when `match_count == 0` (§6).
    pub fn invoke_post_modules(&self, summary: &ScanSummary) {
        if summary.match_count == 0 {
            tracing::warn!("skipping post module invocation, no matches were found");
            return;
        }
        for module in &self.post_modules {
            module.run(summary);
        }
    }
}

fn os_supported(declared: &[SupportedOs]) -> bool {
    declared.iter().any(|os| os.matches_current())
}
