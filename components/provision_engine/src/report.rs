// components/provision_engine/src/report.rs
//! Operator-facing notices
//!
//! The engine talks to the person at the terminal through a [`Reporter`].
//! Every notice is mirrored into `tracing` so `RUST_LOG` captures the same
//! story with timestamps and targets.

use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
}

impl NoticeLevel {
    pub fn tag(&self) -> &'static str {
        match self {
            NoticeLevel::Info => "[INFO]",
            NoticeLevel::Success => "[SUCCESS]",
            NoticeLevel::Warning => "[WARNING]",
        }
    }
}

pub trait Reporter: Send + Sync {
    fn notice(&self, level: NoticeLevel, message: &str);
}

pub type SharedReporter = Arc<dyn Reporter>;

impl<R: Reporter + ?Sized> Reporter for Arc<R> {
    fn notice(&self, level: NoticeLevel, message: &str) {
        (**self).notice(level, message)
    }
}

impl<R: Reporter + ?Sized> Reporter for &R {
    fn notice(&self, level: NoticeLevel, message: &str) {
        (**self).notice(level, message)
    }
}

/// Forward a notice to tracing and to the reporter
pub fn emit<R: Reporter + ?Sized>(reporter: &R, level: NoticeLevel, message: String) {
    match level {
        NoticeLevel::Warning => tracing::warn!("{}", message),
        NoticeLevel::Info | NoticeLevel::Success => tracing::info!("{}", message),
    }
    reporter.notice(level, &message);
}

/// Send a formatted notice to both tracing and the reporter
macro_rules! send_log {
    ($reporter:expr, $level:ident, $($arg:tt)*) => {{
        $crate::report::emit(
            &$reporter,
            $crate::report::NoticeLevel::$level,
            format!($($arg)*),
        );
    }};
}

pub(crate) use send_log;

#[cfg(test)]
pub mod stub {
    use super::*;
    use parking_lot::Mutex;

    /// Keeps every notice in memory for assertions
    #[derive(Default)]
    pub struct RecordingReporter {
        notices: Mutex<Vec<(NoticeLevel, String)>>,
    }

    impl RecordingReporter {
        pub fn shared() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub fn messages(&self, level: NoticeLevel) -> Vec<String> {
            self.notices
                .lock()
                .iter()
                .filter(|(l, _)| *l == level)
                .map(|(_, m)| m.clone())
                .collect()
        }
    }

    impl Reporter for RecordingReporter {
        fn notice(&self, level: NoticeLevel, message: &str) {
            self.notices.lock().push((level, message.to_string()));
        }
    }
}
