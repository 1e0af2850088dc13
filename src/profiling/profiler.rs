//! Chrome Trace ("flame style") profiling.
//!
//! Feature-gated with `--features profiling`.
//!
//! Usage:
//!   flowecs::profiling::profiler::init("profile/trace.json");
//!   {
//!     let _g = flowecs::profiling::profiler::span("Manager::apply");
//!     // schedule work...
//!   }
//!   flowecs::profiling::profiler::shutdown();

use std::path::Path;

#[cfg(feature = "profiling")]
mod enabled {
    use std::fs::File;
    use std::io::{BufWriter, Write};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::sync::{Mutex, OnceLock};
    use std::time::Instant;

    use super::*;

    /// A Chrome trace "complete event" (`ph:"X"`) or thread-name metadata
    /// event (`ph:"M"`).
    enum TraceEvent {
        Complete {
            name: &'static str,
            ts_us: u64,
            dur_us: u64,
            tid: u64,
        },
        ThreadName {
            ts_us: u64,
            tid: u64,
            name: String,
        },
    }

    struct ProfilerState {
        start: Instant,
        out_path: PathBuf,
        is_on: AtomicBool,
        events: Mutex<Vec<TraceEvent>>,
    }

    static STATE: OnceLock<ProfilerState> = OnceLock::new();
    static NEXT_TID: AtomicU64 = AtomicU64::new(1);

    thread_local! {
        static TID: u64 = NEXT_TID.fetch_add(1, Ordering::Relaxed);
    }

    fn now_us(state: &ProfilerState) -> u64 {
        state.start.elapsed().as_micros() as u64
    }

    fn tid() -> u64 {
        TID.with(|t| *t)
    }

    /// Initialize the profiler and set the output path.
    pub fn init<P: AsRef<Path>>(path: P) {
        let _ = STATE.set(ProfilerState {
            start: Instant::now(),
            out_path: path.as_ref().to_path_buf(),
            is_on: AtomicBool::new(true),
            events: Mutex::new(Vec::new()),
        });
    }

    /// Shut down the profiler and write the Chrome Trace JSON.
    pub fn shutdown() {
        if let Some(state) = STATE.get() {
            state.is_on.store(false, Ordering::Release);
            if let Err(e) = write_trace_file(state) {
                eprintln!("profiler::shutdown failed to write trace: {e}");
            }
        }
    }

    fn write_trace_file(state: &ProfilerState) -> std::io::Result<()> {
        let events = {
            let mut guard = state.events.lock().unwrap();
            std::mem::take(&mut *guard)
        };

        if let Some(parent) = state.out_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(&state.out_path)?;
        let mut w = BufWriter::new(file);

        write!(w, "{{\"traceEvents\":[")?;
        let mut first = true;
        for event in events {
            if !first {
                write!(w, ",")?;
            }
            first = false;
            match event {
                TraceEvent::Complete {
                    name,
                    ts_us,
                    dur_us,
                    tid,
                } => {
                    write!(w, "{{\"name\":")?;
                    write_json_string(&mut w, name)?;
                    write!(
                        w,
                        ",\"cat\":\"flow\",\"ph\":\"X\",\"ts\":{ts_us},\"dur\":{dur_us},\"pid\":1,\"tid\":{tid}}}"
                    )?;
                }
                TraceEvent::ThreadName { ts_us, tid, name } => {
                    write!(
                        w,
                        "{{\"name\":\"thread_name\",\"ph\":\"M\",\"ts\":{ts_us},\"pid\":1,\"tid\":{tid},\"args\":{{\"name\":"
                    )?;
                    write_json_string(&mut w, &name)?;
                    write!(w, "}}}}")?;
                }
            }
        }
        write!(w, "]}}")?;
        w.flush()
    }

    fn write_json_string<W: Write>(w: &mut W, s: &str) -> std::io::Result<()> {
        write!(w, "\"")?;
        for ch in s.chars() {
            match ch {
                '"' => write!(w, "\\\"")?,
                '\\' => write!(w, "\\\\")?,
                '\n' => write!(w, "\\n")?,
                '\r' => write!(w, "\\r")?,
                '\t' => write!(w, "\\t")?,
                c if c.is_control() => write!(w, "\\u{:04x}", c as u32)?,
                c => write!(w, "{c}")?,
            }
        }
        write!(w, "\"")
    }

    fn push_event(event: TraceEvent) {
        let state = match STATE.get() {
            Some(s) => s,
            None => return,
        };
        if !state.is_on.load(Ordering::Acquire) {
            return;
        }
        state.events.lock().unwrap().push(event);
    }

    /// Assign a human-friendly thread name (shown in Perfetto/Chrome tracing).
    pub fn thread_name(name: impl Into<String>) {
        let state = match STATE.get() {
            Some(s) => s,
            None => return,
        };
        push_event(TraceEvent::ThreadName {
            ts_us: now_us(state),
            tid: tid(),
            name: name.into(),
        });
    }

    /// Create a profiling span.
    pub fn span(name: &'static str) -> SpanGuard {
        let state = match STATE.get() {
            Some(s) => s,
            None => return SpanGuard::disabled(),
        };
        if !state.is_on.load(Ordering::Acquire) {
            return SpanGuard::disabled();
        }
        SpanGuard {
            name,
            ts0: now_us(state),
            tid: tid(),
            active: true,
        }
    }

    /// A RAII guard that records a Chrome Trace complete event on drop.
    pub struct SpanGuard {
        name: &'static str,
        ts0: u64,
        tid: u64,
        active: bool,
    }

    impl SpanGuard {
        fn disabled() -> Self {
            Self {
                name: "",
                ts0: 0,
                tid: 0,
                active: false,
            }
        }
    }

    impl Drop for SpanGuard {
        fn drop(&mut self) {
            if !self.active {
                return;
            }
            let state = match STATE.get() {
                Some(s) => s,
                None => return,
            };
            let ts1 = now_us(state);
            push_event(TraceEvent::Complete {
                name: self.name,
                ts_us: self.ts0,
                dur_us: ts1.saturating_sub(self.ts0),
                tid: self.tid,
            });
        }
    }
}

#[cfg(not(feature = "profiling"))]
mod disabled {
    use super::*;

    /// Initialize profiler (no-op when profiling is disabled).
    #[inline]
    pub fn init<P: AsRef<Path>>(_path: P) {}

    /// Shut down profiler (no-op).
    #[inline]
    pub fn shutdown() {}

    /// Set thread name (no-op).
    #[inline]
    pub fn thread_name(_name: impl Into<String>) {}

    /// Create profiling span (no-op).
    #[inline]
    pub fn span(_name: &'static str) -> SpanGuard {
        SpanGuard
    }

    /// No-op span guard.
    pub struct SpanGuard;
}

#[cfg(feature = "profiling")]
pub use enabled::{init, shutdown, span, thread_name, SpanGuard};

#[cfg(not(feature = "profiling"))]
pub use disabled::{init, shutdown, span, thread_name, SpanGuard};
