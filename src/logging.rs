use std::sync::Mutex;
use std::time::Instant;

use env_logger::{Builder, Env, Target};

static LAST_LOG: Mutex<Option<Instant>> = Mutex::new(None);

fn builder() -> Builder {
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));
    builder.format(|buf, record| {
        use std::io::Write;

        let now = Instant::now();
        let delta = {
            let mut last = LAST_LOG.lock().unwrap_or_else(|e| e.into_inner());
            let delta = last.map(|t| now.duration_since(t).as_millis()).unwrap_or(0);
            *last = Some(now);
            delta
        };

        writeln!(
            buf,
            "{} [+{} ms] [{}] {} - {}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
            delta,
            record.level(),
            record.target(),
            record.args()
        )
    });
    builder
}

/// Install the process logger: wall-clock timestamp plus the delta since the
/// previous record. `RUST_LOG` overrides the default `info` level. Safe to
/// call more than once.
pub fn init() {
    if builder().target(Target::Stdout).try_init().is_err() {
        log::debug!("logger already installed");
    }
}
