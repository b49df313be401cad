//! Level macros
//!
//! `log_error!`, `log_warn!`, `log_info!` and `log_debug!` prefix the
//! message with the level tag and the call site. `log_data!` writes the
//! message with only a `[DATA] ` tag.

#[doc(hidden)]
#[macro_export]
macro_rules! __log_at {
    ($logger:expr, $level:expr, $tag:literal, $($arg:tt)+) => {
        $crate::Logger::log(
            &$logger,
            $level,
            format_args!(
                concat!("[", $tag, "] <{} {} {}> {}"),
                file!(),
                line!(),
                module_path!(),
                format_args!($($arg)+)
            ),
        )
    };
}

/// Log raw data; always rendered with the plain formatter
#[macro_export]
macro_rules! log_data {
    ($logger:expr, $($arg:tt)+) => {
        $crate::Logger::log(
            &$logger,
            $crate::Level::Data,
            format_args!("[DATA] {}", format_args!($($arg)+)),
        )
    };
}

#[macro_export]
macro_rules! log_error {
    ($logger:expr, $($arg:tt)+) => {
        $crate::__log_at!($logger, $crate::Level::Error, "ERROR", $($arg)+)
    };
}

#[macro_export]
macro_rules! log_warn {
    ($logger:expr, $($arg:tt)+) => {
        $crate::__log_at!($logger, $crate::Level::Warn, "WARN", $($arg)+)
    };
}

#[macro_export]
macro_rules! log_info {
    ($logger:expr, $($arg:tt)+) => {
        $crate::__log_at!($logger, $crate::Level::Info, "INFO", $($arg)+)
    };
}

#[macro_export]
macro_rules! log_debug {
    ($logger:expr, $($arg:tt)+) => {
        $crate::__log_at!($logger, $crate::Level::Debug, "DEBUG", $($arg)+)
    };
}
