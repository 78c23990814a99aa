//! ---
//! sfo_section: "03-observability"
//! sfo_subsection: "module"
//! sfo_type: "source"
//! sfo_scope: "code"
//! sfo_description: "Structured logging helpers for failover events."
//! sfo_version: "v0.0.0-prealpha"
//! sfo_owner: "tbd"
//! ---
//! Logging macros that stamp every event with a [`LogContext`](crate::LogContext).
//!
//! Each macro accepts an optional `target: <const>` prefix followed by an optional
//! `context = <expr>` and then regular format arguments.

#[doc(hidden)]
#[macro_export]
macro_rules! __sfo_event {
    (target: $target:expr, $level:expr, $ctx:expr, $($arg:tt)+) => {{
        let ctx: &$crate::LogContext<'_> = $ctx;
        $crate::__tracing::event!(
            target: $target,
            $level,
            kind = ctx.kind.unwrap_or(""),
            resource = ctx.resource.unwrap_or(""),
            role = ctx.role.unwrap_or(""),
            attempt = ctx.attempt.unwrap_or_default(),
            message = %format_args!($($arg)+)
        );
    }};
    ($level:expr, $ctx:expr, $($arg:tt)+) => {{
        let ctx: &$crate::LogContext<'_> = $ctx;
        $crate::__tracing::event!(
            $level,
            kind = ctx.kind.unwrap_or(""),
            resource = ctx.resource.unwrap_or(""),
            role = ctx.role.unwrap_or(""),
            attempt = ctx.attempt.unwrap_or_default(),
            message = %format_args!($($arg)+)
        );
    }};
}

/// Emit an informational log enriched with failover context.
#[macro_export]
macro_rules! sfo_info {
    (target: $target:expr, context = $ctx:expr, $($arg:tt)+) => {
        $crate::__sfo_event!(target: $target, $crate::__tracing::Level::INFO, &$ctx, $($arg)+)
    };
    (target: $target:expr, $($arg:tt)+) => {
        $crate::__sfo_event!(target: $target, $crate::__tracing::Level::INFO, &$crate::LogContext::default(), $($arg)+)
    };
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__sfo_event!($crate::__tracing::Level::INFO, &$ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__sfo_event!($crate::__tracing::Level::INFO, &$crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a debug log enriched with failover context.
#[macro_export]
macro_rules! sfo_debug {
    (target: $target:expr, context = $ctx:expr, $($arg:tt)+) => {
        $crate::__sfo_event!(target: $target, $crate::__tracing::Level::DEBUG, &$ctx, $($arg)+)
    };
    (target: $target:expr, $($arg:tt)+) => {
        $crate::__sfo_event!(target: $target, $crate::__tracing::Level::DEBUG, &$crate::LogContext::default(), $($arg)+)
    };
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__sfo_event!($crate::__tracing::Level::DEBUG, &$ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__sfo_event!($crate::__tracing::Level::DEBUG, &$crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a warning enriched with failover context.
#[macro_export]
macro_rules! sfo_warn {
    (target: $target:expr, context = $ctx:expr, $($arg:tt)+) => {
        $crate::__sfo_event!(target: $target, $crate::__tracing::Level::WARN, &$ctx, $($arg)+)
    };
    (target: $target:expr, $($arg:tt)+) => {
        $crate::__sfo_event!(target: $target, $crate::__tracing::Level::WARN, &$crate::LogContext::default(), $($arg)+)
    };
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__sfo_event!($crate::__tracing::Level::WARN, &$ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__sfo_event!($crate::__tracing::Level::WARN, &$crate::LogContext::default(), $($arg)+)
    };
}

/// Emit an error log enriched with failover context.
#[macro_export]
macro_rules! sfo_error {
    (target: $target:expr, context = $ctx:expr, $($arg:tt)+) => {
        $crate::__sfo_event!(target: $target, $crate::__tracing::Level::ERROR, &$ctx, $($arg)+)
    };
    (target: $target:expr, $($arg:tt)+) => {
        $crate::__sfo_event!(target: $target, $crate::__tracing::Level::ERROR, &$crate::LogContext::default(), $($arg)+)
    };
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__sfo_event!($crate::__tracing::Level::ERROR, &$ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__sfo_event!($crate::__tracing::Level::ERROR, &$crate::LogContext::default(), $($arg)+)
    };
}
