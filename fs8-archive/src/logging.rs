//! Process-wide error-log callback
//!
//! Failures in the pack runtime are reported through a replaceable callback
//! so that host applications can route them into their own logging. The
//! default prints `FS8: <message>` to standard output.

use parking_lot::RwLock;

/// Signature of the error-log callback.
pub type ErrorLogCallback = fn(&str);

fn default_error_log(message: &str) {
    println!("FS8: {message}");
}

static ERROR_LOG: RwLock<ErrorLogCallback> = RwLock::new(default_error_log);

/// Replace the process-wide error-log callback.
///
/// The replacement may be installed at any time and must be callable from
/// multiple threads concurrently.
pub fn set_error_log_callback(callback: ErrorLogCallback) {
    *ERROR_LOG.write() = callback;
}

pub(crate) fn log_error(message: &str) {
    let callback = *ERROR_LOG.read();
    callback(message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    static CAPTURED: Mutex<Vec<String>> = Mutex::new(Vec::new());

    fn capture(message: &str) {
        CAPTURED.lock().push(message.to_string());
    }

    #[test]
    fn callback_replacement_routes_messages() {
        set_error_log_callback(capture);
        log_error("something went wrong");
        assert!(
            CAPTURED
                .lock()
                .iter()
                .any(|m| m == "something went wrong")
        );
        set_error_log_callback(|message| println!("FS8: {message}"));
    }
}
