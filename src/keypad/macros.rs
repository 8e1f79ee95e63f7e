/** Key-tracking trace, printed to stderr with no newline, flushed at
 * once so the output keeps pace with the poll loop.
 *
 * `KeyTracker` calls this once per key per poll:
 *
 * ```text
 *   _#3    key 3 went down
 *   =#3    key 3 still held
 *   ‾#3    key 3 came up
 * ```
 *
 * Only built with `--features debug_waveform_print`.
 */
#[cfg(feature = "debug_waveform_print")]
#[macro_export]
macro_rules! debug_waveform {
    ($( $args:expr ),*) => {{
        use std::io::Write;
        let mut stderr = std::io::stderr().lock();
        let _ = write!(stderr, $( $args ),*);
        let _ = stderr.flush();
    }};
}

/// Without `debug_waveform_print` the trace compiles to nothing.
#[macro_export]
#[cfg(not(feature = "debug_waveform_print"))]
macro_rules! debug_waveform {
    ($( $args:expr ),*) => {};
}
