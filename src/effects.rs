//! Side-effect ports for the request sender: console output and page navigation.
//!
//! The CLI implementations write to stdout/stderr; tests inject recorders.

use std::io::Write;

/// Console output (log / error), as seen by the user of the page.
pub trait Console: Send + Sync {
    fn log(&self, message: &str);
    fn error(&self, message: &str);
}

/// Page navigation. `replace` discards the current page state.
pub trait Navigator: Send + Sync {
    fn replace(&self, location: &str);
}

/// Console on the terminal: `log` to stdout, `error` to stderr. Both are also traced.
pub struct StdConsole;

impl Console for StdConsole {
    fn log(&self, message: &str) {
        tracing::debug!(%message, "console log");
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "{}", message);
        let _ = out.flush();
    }

    fn error(&self, message: &str) {
        tracing::debug!(%message, "console error");
        let mut err = std::io::stderr().lock();
        let _ = writeln!(err, "{}", message);
        let _ = err.flush();
    }
}

/// Navigation on the terminal: resolves the location against the base URL and prints it.
pub struct PrintNavigator {
    base_url: reqwest::Url,
}

impl PrintNavigator {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let base_url = reqwest::Url::parse(base_url)
            .map_err(|e| anyhow::anyhow!("invalid base url {:?}: {}", base_url, e))?;
        Ok(Self { base_url })
    }

    /// Absolute URL for a location; relative locations resolve against the base URL.
    pub fn resolve(&self, location: &str) -> String {
        self.base_url
            .join(location)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| location.to_string())
    }
}

impl Navigator for PrintNavigator {
    fn replace(&self, location: &str) {
        let target = self.resolve(location);
        tracing::info!(%target, "navigating");
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "Redirect: {}", target);
        let _ = out.flush();
    }
}

#[cfg(test)]
pub mod testing {
    //! Recording ports for tests.

    use super::{Console, Navigator};
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct RecordingConsole {
        pub logs: Mutex<Vec<String>>,
        pub errors: Mutex<Vec<String>>,
    }

    impl RecordingConsole {
        pub fn logs(&self) -> Vec<String> {
            self.logs.lock().unwrap().clone()
        }
        pub fn errors(&self) -> Vec<String> {
            self.errors.lock().unwrap().clone()
        }
    }

    impl Console for RecordingConsole {
        fn log(&self, message: &str) {
            self.logs.lock().unwrap().push(message.to_string());
        }
        fn error(&self, message: &str) {
            self.errors.lock().unwrap().push(message.to_string());
        }
    }

    #[derive(Default)]
    pub struct RecordingNavigator {
        pub locations: Mutex<Vec<String>>,
    }

    impl RecordingNavigator {
        pub fn locations(&self) -> Vec<String> {
            self.locations.lock().unwrap().clone()
        }
    }

    impl Navigator for RecordingNavigator {
        fn replace(&self, location: &str) {
            self.locations.lock().unwrap().push(location.to_string());
        }
    }
}
