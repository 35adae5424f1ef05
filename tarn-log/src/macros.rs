//! Per-level logging macros.
//!
//! Each macro captures the call site (`file!()`, `line!()`, enclosing
//! function) and forwards `format!`-style arguments to the global
//! logger. Records below the configured minimum level cost one atomic
//! load and no formatting.

/// Expands to the name of the enclosing function.
#[doc(hidden)]
#[macro_export]
macro_rules! __function_name {
    () => {{
        fn f() {}
        fn type_name_of<T>(_: T) -> &'static str {
            ::std::any::type_name::<T>()
        }
        let name = type_name_of(f);
        name.strip_suffix("::f").unwrap_or(name)
    }};
}

/// Logs at [`Trace`](crate::Level::Trace) level.
#[macro_export]
macro_rules! log_trace {
    ($($arg:tt)*) => {
        $crate::logger().write_fmt(
            $crate::Level::Trace,
            ::core::format_args!($($arg)*),
            ::core::file!(),
            $crate::__function_name!(),
            ::core::line!(),
        )
    };
}

/// Logs at [`Debug`](crate::Level::Debug) level.
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::logger().write_fmt(
            $crate::Level::Debug,
            ::core::format_args!($($arg)*),
            ::core::file!(),
            $crate::__function_name!(),
            ::core::line!(),
        )
    };
}

/// Logs at [`Info`](crate::Level::Info) level.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logger().write_fmt(
            $crate::Level::Info,
            ::core::format_args!($($arg)*),
            ::core::file!(),
            $crate::__function_name!(),
            ::core::line!(),
        )
    };
}

/// Logs at [`Warn`](crate::Level::Warn) level.
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::logger().write_fmt(
            $crate::Level::Warn,
            ::core::format_args!($($arg)*),
            ::core::file!(),
            $crate::__function_name!(),
            ::core::line!(),
        )
    };
}

/// Logs at [`Error`](crate::Level::Error) level.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::logger().write_fmt(
            $crate::Level::Error,
            ::core::format_args!($($arg)*),
            ::core::file!(),
            $crate::__function_name!(),
            ::core::line!(),
        )
    };
}

/// Logs at [`Fatal`](crate::Level::Fatal) level.
#[macro_export]
macro_rules! log_fatal {
    ($($arg:tt)*) => {
        $crate::logger().write_fmt(
            $crate::Level::Fatal,
            ::core::format_args!($($arg)*),
            ::core::file!(),
            $crate::__function_name!(),
            ::core::line!(),
        )
    };
}
