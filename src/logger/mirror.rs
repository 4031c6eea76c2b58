//! Console mirroring of accepted entries
//!
//! Mirrored entries are emitted as `tracing` events on the `logstore::mirror`
//! target, so whichever subscriber the application installed decides where
//! they end up. Nothing here touches the store.

use tracing::{Level, debug, error, info, warn};

use crate::entry::Entry;
use crate::severity::Severity;

pub const MIRROR_TARGET: &str = "logstore::mirror";

macro_rules! mirror_event {
    ($level:ident, $entry:ident, $metadata:ident) => {
        $level!(
            target: MIRROR_TARGET,
            severity = %$entry.severity,
            timestamp = %$entry.timestamp,
            metadata = $metadata,
            "{}",
            $entry.message
        )
    };
}

pub(crate) fn emit(entry: &Entry) {
    let metadata = render_metadata(entry);
    let metadata = metadata.as_str();

    let level = mirror_level(entry.severity);
    if level == Level::ERROR {
        mirror_event!(error, entry, metadata)
    } else if level == Level::WARN {
        mirror_event!(warn, entry, metadata)
    } else if level == Level::INFO {
        mirror_event!(info, entry, metadata)
    } else {
        mirror_event!(debug, entry, metadata)
    }
}

/// Tracing level an entry of `severity` is mirrored at
pub(crate) fn mirror_level(severity: Severity) -> Level {
    match severity {
        Severity::Emergency | Severity::Alert | Severity::Critical | Severity::Error => {
            Level::ERROR
        }
        Severity::Warning => Level::WARN,
        Severity::Notice | Severity::Info => Level::INFO,
        Severity::Debug => Level::DEBUG,
    }
}

/// Metadata as compact JSON, or empty when the entry has none
fn render_metadata(entry: &Entry) -> String {
    entry
        .metadata
        .as_ref()
        .and_then(|m| serde_json::to_string(m).ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn capture(entry: &Entry) -> String {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(Level::DEBUG)
            .finish();

        tracing::subscriber::with_default(subscriber, || emit(entry));

        let bytes = captured.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_level_mapping() {
        let expected = [
            (Severity::Emergency, Level::ERROR),
            (Severity::Alert, Level::ERROR),
            (Severity::Critical, Level::ERROR),
            (Severity::Error, Level::ERROR),
            (Severity::Warning, Level::WARN),
            (Severity::Notice, Level::INFO),
            (Severity::Info, Level::INFO),
            (Severity::Debug, Level::DEBUG),
        ];
        for (severity, level) in expected {
            assert_eq!(mirror_level(severity), level, "{severity}");
        }
    }

    #[test]
    fn test_metadata_rendering() {
        assert_eq!(render_metadata(&Entry::new(Severity::Info, "bare")), "");

        let entry = Entry::new(Severity::Info, "tagged")
            .with_field("user", "ada")
            .with_field("attempt", 2);
        assert_eq!(render_metadata(&entry), r#"{"attempt":2,"user":"ada"}"#);
    }

    #[test]
    fn test_emit_writes_event_on_mirror_target() {
        let entry = Entry::new(Severity::Critical, "disk failing").with_field("disk", "sda");
        let output = capture(&entry);

        assert!(output.contains("ERROR"), "{output}");
        assert!(output.contains(MIRROR_TARGET), "{output}");
        assert!(output.contains("disk failing"), "{output}");
        assert!(output.contains("severity=critical"), "{output}");
        assert!(output.contains("sda"), "{output}");
    }

    #[test]
    fn test_emit_uses_warn_for_warning() {
        let output = capture(&Entry::new(Severity::Warning, "slow query"));
        assert!(output.contains("WARN"), "{output}");
        assert!(!output.contains("ERROR"), "{output}");
    }
}
