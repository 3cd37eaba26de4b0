//! # Bot Module
//!
//! Gateway glue between serenity and the bot's features.
//!
//! The [`Bot`] struct implements Serenity's [`EventHandler`] trait and
//! forwards every event it cares about to each registered [`Feature`].
//! Features receive typed events (ready, message, component interaction)
//! and never see the raw dispatch.

use anyhow::Result;
use futures::future::join_all;
use serenity::{
    all::{ComponentInteraction, Context, EventHandler, Http, Interaction, Message, Ready},
    async_trait,
};
use std::sync::Arc;
use tracing::{error, info};

pub mod messages;
pub mod music;

pub use music::MusicFeature;

/// Dependencies handed to every feature at startup.
pub struct FeatureContext {
    pub http: Arc<Http>,
}

/// A self-contained piece of bot behaviour.
#[async_trait]
pub trait Feature: Send + Sync {
    fn name(&self) -> &'static str;

    /// Runs once before the gateway connects.
    async fn init(&self, _ctx: &FeatureContext) -> Result<()> {
        Ok(())
    }

    async fn on_ready(&self, _ctx: &Context, _ready: &Ready) {}

    async fn on_message(&self, _ctx: &Context, _message: &Message) {}

    async fn on_component(&self, _ctx: &Context, _interaction: &ComponentInteraction) {}
}

/// Serenity event handler that fans events out to the registered features.
pub struct Bot {
    features: Vec<Arc<dyn Feature>>,
}

impl Bot {
    /// Initializes every feature; one that fails to init is left out.
    pub async fn init(features: Vec<Arc<dyn Feature>>, ctx: &FeatureContext) -> Self {
        let mut ready = Vec::with_capacity(features.len());

        for feature in features {
            match feature.init(ctx).await {
                Ok(()) => {
                    info!("🧩 Feature `{}` inicializada", feature.name());
                    ready.push(feature);
                }
                Err(e) => error!("❌ Feature `{}` no pudo inicializarse: {:?}", feature.name(), e),
            }
        }

        Self { features: ready }
    }

    pub fn feature_names(&self) -> Vec<&'static str> {
        self.features.iter().map(|feature| feature.name()).collect()
    }
}

#[async_trait]
impl EventHandler for Bot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        join_all(self.features.iter().map(|feature| feature.on_ready(&ctx, &ready))).await;
    }

    async fn message(&self, ctx: Context, message: Message) {
        join_all(self.features.iter().map(|feature| feature.on_message(&ctx, &message))).await;
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Component(component) = interaction {
            join_all(
                self.features
                    .iter()
                    .map(|feature| feature.on_component(&ctx, &component)),
            )
            .await;
        }
    }
}
