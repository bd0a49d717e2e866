//! Discord Alerts
//!
//! Webhook embeds for terminal swap outcomes. Disabled when no webhook URL
//! is configured. Delivery failures are logged and otherwise ignored.
//!
//! Created: 2026-10-19

use crate::types::PipelineOutcome;
use serde::Serialize;
use tracing::{error, info, warn};

const COLOR_CONFIRMED: u32 = 0x00FF00;
const COLOR_FAILED: u32 = 0xFF0000;
const COLOR_DRY_RUN: u32 = 0x808080;

#[derive(Serialize)]
struct DiscordMessage {
    content: Option<String>,
    embeds: Vec<DiscordEmbed>,
}

#[derive(Serialize)]
struct DiscordEmbed {
    title: String,
    description: String,
    color: u32,
    fields: Vec<DiscordField>,
    footer: Option<DiscordFooter>,
    timestamp: Option<String>,
}

#[derive(Serialize)]
struct DiscordField {
    name: String,
    value: String,
    inline: bool,
}

#[derive(Serialize)]
struct DiscordFooter {
    text: String,
}

pub struct DiscordAlerter {
    webhook_url: Option<String>,
    client: reqwest::Client,
}

impl DiscordAlerter {
    pub fn new(webhook_url: Option<String>) -> Self {
        if webhook_url.is_some() {
            info!("Discord alerts enabled");
        } else {
            warn!("DISCORD_WEBHOOK not set - Discord alerts disabled");
        }
        Self {
            webhook_url,
            client: reqwest::Client::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.webhook_url.is_some()
    }

    /// Alert on outcomes worth a human's attention (trades and dry runs)
    pub async fn send_outcome(&self, outcome: &PipelineOutcome) {
        let Some(webhook_url) = &self.webhook_url else {
            return;
        };
        let Some(embed) = build_embed(outcome) else {
            return;
        };

        let message = DiscordMessage {
            content: None,
            embeds: vec![embed],
        };

        match self.client.post(webhook_url).json(&message).send().await {
            Ok(response) => {
                if !response.status().is_success() {
                    warn!("Discord webhook returned status: {}", response.status());
                }
            }
            Err(e) => error!("Failed to send Discord alert: {}", e),
        }
    }
}

fn field(name: &str, value: String, inline: bool) -> DiscordField {
    DiscordField {
        name: name.to_string(),
        value,
        inline,
    }
}

fn build_embed(outcome: &PipelineOutcome) -> Option<DiscordEmbed> {
    let (title, color, fields) = match outcome {
        PipelineOutcome::Confirmed {
            pool,
            tx_hash,
            block_number,
        } => (
            "Swap CONFIRMED".to_string(),
            COLOR_CONFIRMED,
            vec![
                field("Pool", format!("`{}`", pool), false),
                field("Tx", format!("`{}`", tx_hash), false),
                field(
                    "Block",
                    block_number.map_or_else(|| "unknown".to_string(), |b| b.to_string()),
                    true,
                ),
            ],
        ),
        PipelineOutcome::Failed {
            pool,
            reason,
            tx_hash,
            detail,
        } => (
            format!("Swap FAILED ({})", reason),
            COLOR_FAILED,
            vec![
                field("Pool", format!("`{}`", pool), false),
                field(
                    "Tx",
                    tx_hash.map_or_else(|| "not submitted".to_string(), |h| format!("`{}`", h)),
                    false,
                ),
                field("Detail", detail.clone(), false),
            ],
        ),
        PipelineOutcome::DryRun { pool, intent } => (
            "DRY RUN - would buy".to_string(),
            COLOR_DRY_RUN,
            vec![
                field("Pool", format!("`{}`", pool), false),
                field("Token", format!("`{}`", intent.to_token), false),
                field("Amount in (wei)", intent.amount_in.to_string(), true),
                field("Min out", intent.min_amount_out.to_string(), true),
            ],
        ),
        _ => return None,
    };

    Some(DiscordEmbed {
        title,
        description: format!("Stage: **{}**", outcome.stage()),
        color,
        fields,
        footer: Some(DiscordFooter {
            text: "pair-sniper".to_string(),
        }),
        timestamp: Some(chrono::Utc::now().to_rfc3339()),
    })
}
