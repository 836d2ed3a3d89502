use crate::error::{Result, SinkError};
use crate::layer::SinkLayer;
use crate::level::Level;
use crate::sink::Sink;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Configuration of the `tracing` integration.
///
/// **Fields**
/// - `min_level`: events below this level are not forwarded to the sink.
/// - `include_caller`: attach file, line and module path to each record.
/// - `enable_stdout`: if `true`, a `tracing_subscriber::fmt::Layer` is
///   stacked next to [`SinkLayer`] so events also print to the console.
#[derive(Clone, Debug)]
pub struct LayerConfig {
    pub min_level: Level,
    pub include_caller: bool,
    pub enable_stdout: bool,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            min_level: Level::Info,
            include_caller: true,
            enable_stdout: false,
        }
    }
}

/// Install a [`Registry`] with a [`SinkLayer`] over `sink` as the global
/// default subscriber.
///
/// **Errors**
/// - [`SinkError::SubscriberInstalled`] if a global subscriber was
///   already set.
pub fn init_tracing_with_config(sink: Arc<dyn Sink>, config: LayerConfig) -> Result<()> {
    let layer = SinkLayer::new(sink, config.min_level).with_caller(config.include_caller);

    // The two stacks have different types, hence two install calls.
    let installed = if config.enable_stdout {
        let fmt_layer = tracing_subscriber::fmt::layer();
        let subscriber = Registry::default().with(layer).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber)
    } else {
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::set_global_default(subscriber)
    };
    installed.map_err(|_| SinkError::SubscriberInstalled)
}

/// [`init_tracing_with_config`] with [`LayerConfig::default`].
pub fn init_tracing(sink: Arc<dyn Sink>) -> Result<()> {
    init_tracing_with_config(sink, LayerConfig::default())
}
