/// Chrome Trace (flame-style) execution profiler.
///
/// This module provides a **feature-gated, zero-overhead (when disabled)**
/// profiling API for the runtime. When enabled, it records structured
/// execution spans and emits a **Chrome Trace Event JSON** file that can be
/// inspected using:
///
/// - `chrome://tracing`
/// - <https://ui.perfetto.dev>
///
/// ## Feature flag
///
/// This module is only active when the `profiling` feature is enabled:
///
/// ```bash
/// cargo test --features profiling
/// ```
///
/// When the feature is disabled, all profiling calls compile to no-ops and
/// impose no runtime overhead.
///
/// ## Design notes
///
/// - Spans are recorded using RAII guards (`SpanGuard`)
/// - Events are timestamped using a monotonic clock
/// - Each OS thread is assigned a stable logical thread ID
/// - Output format follows the Chrome Trace `"X"` (complete event)
///   specification
///
/// The runtime instruments scheduling boundaries (apply submission,
/// structural updates, quiescence waits) and names its pool workers in the
/// trace.
pub mod profiler;
