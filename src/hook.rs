//! Host build integration.
//!
//! A host exposes its emit phase in one of two shapes: an async hook table
//! (`hooks.tap_async`) or a legacy `plugin("emit", callback)` registration
//! where the callback signals completion through a `done` channel. Both are
//! hidden behind [`EmitRegistrar`], so a handler only ever implements
//! [`EmitHandler`].

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::debug;

use crate::asset::AssetCollection;

/// What the host hands to emit handlers: its output collection and a place
/// for non-fatal build errors
#[derive(Debug, Default)]
pub struct Compilation {
    pub assets: AssetCollection,
    pub errors: Vec<anyhow::Error>,
}

impl Compilation {
    pub fn new(assets: AssetCollection) -> Self {
        Self {
            assets,
            errors: Vec::new(),
        }
    }
}

/// Work to run when the host emits its assets
#[async_trait]
pub trait EmitHandler: Send + Sync {
    async fn on_emit(&self, compilation: &mut Compilation);
}

/// Completion signal for legacy callbacks
pub type Done = oneshot::Sender<()>;

/// Legacy emit callback: must send on `done` once its work has finished
pub type LegacyCallback =
    Box<dyn for<'a> Fn(&'a mut Compilation, Done) -> BoxFuture<'a, ()> + Send + Sync>;

/// Box a closure as a [`LegacyCallback`]
pub fn legacy_callback<F>(callback: F) -> LegacyCallback
where
    F: for<'a> Fn(&'a mut Compilation, Done) -> BoxFuture<'a, ()> + Send + Sync + 'static,
{
    Box::new(callback)
}

/// Async hook table of a modern host
#[derive(Default)]
pub struct EmitHooks {
    taps: Vec<(String, Arc<dyn EmitHandler>)>,
}

impl EmitHooks {
    pub fn tap_async(&mut self, name: &str, handler: Arc<dyn EmitHandler>) {
        self.taps.push((name.to_string(), handler));
    }

    #[cfg(test)]
    fn tap_names(&self) -> Vec<&str> {
        self.taps.iter().map(|(name, _)| name.as_str()).collect()
    }
}

#[derive(Default)]
struct LegacyPlugins {
    callbacks: Vec<(String, LegacyCallback)>,
}

/// A build host with its emit extension point
pub struct Compiler {
    /// `None` for hosts that only support legacy plugin registration
    pub hooks: Option<EmitHooks>,
    plugins: LegacyPlugins,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler {
    /// A host with an async hook table
    pub fn new() -> Self {
        Self {
            hooks: Some(EmitHooks::default()),
            plugins: LegacyPlugins::default(),
        }
    }

    /// A host that only knows `plugin(event, callback)`
    pub fn legacy() -> Self {
        Self {
            hooks: None,
            plugins: LegacyPlugins::default(),
        }
    }

    pub fn plugin(&mut self, event: &str, callback: LegacyCallback) {
        self.plugins.callbacks.push((event.to_string(), callback));
    }

    /// Run every registered emit handler against `compilation`, in
    /// registration order
    pub async fn emit(&self, compilation: &mut Compilation) -> Result<()> {
        if let Some(hooks) = &self.hooks {
            for (name, handler) in &hooks.taps {
                debug!("Running emit hook {}", name);
                handler.on_emit(compilation).await;
            }
        }

        for (event, callback) in &self.plugins.callbacks {
            if event != "emit" {
                continue;
            }
            let (done, finished) = oneshot::channel();
            callback(&mut *compilation, done).await;
            finished
                .await
                .context("Emit plugin finished without signalling completion")?;
        }

        Ok(())
    }
}

/// Registers an emit-time handler with whatever shape the host supports
pub trait EmitRegistrar {
    fn register_emit(&mut self, name: &str, handler: Arc<dyn EmitHandler>);
}

pub struct AsyncTapRegistrar<'a> {
    hooks: &'a mut EmitHooks,
}

impl EmitRegistrar for AsyncTapRegistrar<'_> {
    fn register_emit(&mut self, name: &str, handler: Arc<dyn EmitHandler>) {
        self.hooks.tap_async(name, handler);
    }
}

pub struct LegacyPluginRegistrar<'a> {
    plugins: &'a mut LegacyPlugins,
}

impl EmitRegistrar for LegacyPluginRegistrar<'_> {
    fn register_emit(&mut self, name: &str, handler: Arc<dyn EmitHandler>) {
        debug!("Registering {} as legacy emit plugin", name);
        let callback = legacy_callback(move |compilation, done| {
            let handler = Arc::clone(&handler);
            async move {
                handler.on_emit(compilation).await;
                let _ = done.send(());
            }
            .boxed()
        });
        self.plugins.callbacks.push(("emit".to_string(), callback));
    }
}

/// Pick the registration style `compiler` supports
pub fn registrar(compiler: &mut Compiler) -> Box<dyn EmitRegistrar + '_> {
    let Compiler { hooks, plugins } = compiler;
    match hooks {
        Some(hooks) => Box::new(AsyncTapRegistrar { hooks }),
        None => Box::new(LegacyPluginRegistrar { plugins }),
    }
}
