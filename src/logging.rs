use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;

static INSTALLED: OnceCell<()> = OnceCell::new();

/// Installs the global `tracing` subscriber. Only the first call has an
/// effect. An unparsable filter falls back to `info`.
pub fn init(filter: &str) {
    INSTALLED.get_or_init(|| {
        let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false);

        // No wall clock for the fmt timer in the browser; the console stamps
        // lines itself.
        #[cfg(target_arch = "wasm32")]
        let builder = builder
            .without_time()
            .with_writer(console::ConsoleWriter::default);

        // Another subscriber may already be installed by the host.
        let _ = builder.try_init();
    });
}

#[cfg(target_arch = "wasm32")]
mod console {
    use std::io;

    /// Collects one formatted event and hands it to `console.log` on drop.
    #[derive(Default)]
    pub struct ConsoleWriter {
        buf: Vec<u8>,
    }

    impl io::Write for ConsoleWriter {
        fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
            self.buf.extend_from_slice(bytes);
            Ok(bytes.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Drop for ConsoleWriter {
        fn drop(&mut self) {
            if self.buf.is_empty() {
                return;
            }
            let line = String::from_utf8_lossy(&self.buf);
            web_sys::console::log_1(&line.trim_end().into());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_init_is_harmless() {
        init("matchtaker=debug");
        init("not a [valid filter");
        tracing::info!("still logging");
        assert!(INSTALLED.get().is_some());
    }
}
