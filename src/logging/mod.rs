//! Log sinks
//!
//! Builds the `tracing` dispatcher the binary runs everything under. The
//! console is always present: info and below go to stdout, warnings and
//! errors to stderr. Loggers from the configuration file are added next to
//! it, each with its own severity range. Nothing here installs a global
//! subscriber.

pub mod file;
pub mod web;

use std::thread::JoinHandle;

use tracing::{Dispatch, Level};
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

use crate::config::{LevelRange, LoggerConfig};
use crate::error::BackeeResult;

pub use file::RotatingFile;
pub use web::WebLayer;

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Console filter: `RUST_LOG` if set, otherwise debug or info
pub fn console_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose { "debug" } else { "info" })
    })
}

fn console_layer(verbose: bool) -> BoxedLayer {
    fmt::layer()
        .with_writer(std::io::stderr.with_max_level(Level::WARN).or_else(std::io::stdout))
        .with_filter(console_filter(verbose))
        .boxed()
}

fn severity_filter(levels: LevelRange) -> impl tracing_subscriber::layer::Filter<Registry> {
    filter_fn(move |meta| levels.accepts(meta.level()))
}

/// Dispatcher writing to the console only
pub fn console_dispatch(verbose: bool) -> Dispatch {
    Dispatch::new(tracing_subscriber::registry().with(console_layer(verbose)))
}

/// Console plus configured sinks
///
/// Dropping this waits for queued webhook messages to be delivered.
pub struct LogSinks {
    dispatch: Dispatch,
    workers: Vec<JoinHandle<()>>,
}

impl LogSinks {
    pub fn build(verbose: bool, loggers: &[LoggerConfig]) -> BackeeResult<Self> {
        let mut layers: Vec<BoxedLayer> = vec![console_layer(verbose)];
        let mut workers = Vec::new();

        for logger in loggers {
            match logger {
                LoggerConfig::File(config) => {
                    let writer = RotatingFile::open(&config.file, config.max_size, config.backup_count)?;
                    layers.push(
                        fmt::layer()
                            .with_ansi(false)
                            .with_writer(writer)
                            .with_filter(severity_filter(config.levels))
                            .boxed(),
                    );
                }
                LoggerConfig::Web(config) => {
                    let (layer, worker) = WebLayer::spawn(config.clone(), console_dispatch(verbose))?;
                    layers.push(layer.with_filter(severity_filter(config.levels)).boxed());
                    workers.push(worker);
                }
            }
        }

        Ok(Self {
            dispatch: Dispatch::new(tracing_subscriber::registry().with(layers)),
            workers,
        })
    }

    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }
}

impl Drop for LogSinks {
    fn drop(&mut self) {
        // Release the layers so the workers see their queues close
        self.dispatch = Dispatch::none();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}
