//! Optional metrics collection.
//!
//! The macros in this module forward to the [`metrics`](https://docs.rs/metrics)
//! crate when the `metrics` feature is enabled and compile to nothing
//! otherwise, so call sites never need their own `cfg` guards.
//!
//! # Metric Names
//!
//! - `esframe.scan.frames` - frames delimited
//! - `esframe.scan.malformed` - malformed sync candidates skipped
//! - `esframe.cursor.desync_bytes` - bytes dropped on reassembly overflow
//! - `esframe.decode.errors` - non-fatal engine errors
//! - `esframe.decode.duration_ns` - time spent in the engine per frame
//! - `esframe.drain.works` - units of work handed back to the host

#[cfg(feature = "metrics")]
#[doc(hidden)]
pub use ::metrics as __metrics;

/// Record a counter metric (increments by given value).
///
/// ```ignore
/// record_counter!("esframe.scan.frames", 1);
/// record_counter!("esframe.scan.frames", 1, "codec" => "ac3");
/// ```
#[macro_export]
#[cfg(feature = "metrics")]
macro_rules! record_counter {
    ($name:expr, $value:expr) => {
        $crate::metrics::__metrics::counter!($name).increment($value)
    };
    ($name:expr, $value:expr, $($label_key:expr => $label_value:expr),+ $(,)?) => {
        $crate::metrics::__metrics::counter!($name, $($label_key => $label_value),+).increment($value)
    };
}

#[macro_export]
#[cfg(not(feature = "metrics"))]
macro_rules! record_counter {
    ($name:expr, $value:expr) => {
        let _ = ($name, $value);
    };
    ($name:expr, $value:expr, $($label_key:expr => $label_value:expr),+ $(,)?) => {
        let _ = ($name, $value, $($label_key, $label_value),+);
    };
}

/// Record a histogram/distribution metric.
#[macro_export]
#[cfg(feature = "metrics")]
macro_rules! record_histogram {
    ($name:expr, $value:expr) => {
        $crate::metrics::__metrics::histogram!($name).record($value)
    };
    ($name:expr, $value:expr, $($label_key:expr => $label_value:expr),+ $(,)?) => {
        $crate::metrics::__metrics::histogram!($name, $($label_key => $label_value),+).record($value)
    };
}

#[macro_export]
#[cfg(not(feature = "metrics"))]
macro_rules! record_histogram {
    ($name:expr, $value:expr) => {
        let _ = ($name, $value);
    };
    ($name:expr, $value:expr, $($label_key:expr => $label_value:expr),+ $(,)?) => {
        let _ = ($name, $value, $($label_key, $label_value),+);
    };
}

/// Record a gauge metric (absolute value).
#[macro_export]
#[cfg(feature = "metrics")]
macro_rules! record_gauge {
    ($name:expr, $value:expr) => {
        $crate::metrics::__metrics::gauge!($name).set($value)
    };
}

#[macro_export]
#[cfg(not(feature = "metrics"))]
macro_rules! record_gauge {
    ($name:expr, $value:expr) => {
        let _ = ($name, $value);
    };
}

pub use record_counter;
pub use record_gauge;
pub use record_histogram;

/// Run `f` and record its wall time under `metric_name`.
#[inline]
pub fn timed<F, R>(metric_name: &'static str, f: F) -> R
where
    F: FnOnce() -> R,
{
    #[cfg(feature = "metrics")]
    {
        let start = std::time::Instant::now();
        let result = f();
        record_histogram!(metric_name, start.elapsed().as_nanos() as f64);
        result
    }

    #[cfg(not(feature = "metrics"))]
    {
        let _ = metric_name;
        f()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_macros_compile() {
        record_counter!("test.counter", 1u64);
        record_counter!("test.counter.labeled", 5u64, "codec" => "ac3");
        record_histogram!("test.histogram", 42.0);
        record_gauge!("test.gauge", 10.0);
    }

    #[test]
    fn test_timed_helper() {
        let result = timed("test.timed", || 42);
        assert_eq!(result, 42);
    }
}
