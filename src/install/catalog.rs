//! What the installer publishes and patches.
//!
//! Everything here is data: stub entries, the rule lists for each target
//! file and the manifest edit. The orchestrator decides when each piece
//! runs; this module decides what it contains.

use crate::config::InstallerConfig;
use crate::install::choice::InstallChoice;
use crate::install::secrets::ReverbCredentials;
use crate::install::subsystem::Subsystem;
use crate::manifest::ManifestEdit;
use crate::patch::{Condition, Marker, PatchRule};
use crate::publish::{StubEntry, StubKind};
use serde_json::json;

pub const ENV_FILE: &str = ".env";
pub const ENV_EXAMPLE_FILE: &str = ".env.example";
pub const PROVIDERS_FILE: &str = "bootstrap/providers.php";
pub const ROUTES_FILE: &str = "routes/web.php";
pub const MANIFEST_FILE: &str = "composer.json";

/// Line that marks the guidelines document as already merged.
pub const GUIDELINES_MARKER: &str = "<!-- deploykit:guidelines -->";

/// Only a freshly generated skeleton gets its database settings replaced.
pub const FRESH_DATABASE_LINE: &str = "DB_CONNECTION=sqlite";

const PLATFORM_PROVIDER: &str = "App\\Providers\\PlatformServiceProvider";
const HEALTH_USE: &str = "use App\\Http\\Controllers\\HealthController;";
const HEALTH_ROUTE: &str = "Route::get('/health', HealthController::class)->name('health');";

/// Publish order. Gated worker configs follow the `.deploy` tree they live
/// in, so a forced directory publish cannot wipe them afterwards.
pub const STUBS: &[StubEntry] = &[
    StubEntry {
        source: "HealthController.php",
        destination: "app/Http/Controllers/HealthController.php",
        label: "health check controller",
        kind: StubKind::File,
        gate: None,
    },
    StubEntry {
        source: "PlatformServiceProvider.php",
        destination: "app/Providers/PlatformServiceProvider.php",
        label: "platform service provider",
        kind: StubKind::File,
        gate: None,
    },
    StubEntry {
        source: "pages/status.tsx",
        destination: "resources/js/pages/status.tsx",
        label: "status page",
        kind: StubKind::File,
        gate: None,
    },
    StubEntry {
        source: "deploy",
        destination: ".deploy",
        label: "deployment config",
        kind: StubKind::Directory,
        gate: None,
    },
    StubEntry {
        source: "workers/horizon.conf",
        destination: ".deploy/workers/horizon.conf",
        label: "horizon worker",
        kind: StubKind::File,
        gate: Some(Subsystem::Horizon),
    },
    StubEntry {
        source: "workers/reverb.conf",
        destination: ".deploy/workers/reverb.conf",
        label: "reverb worker",
        kind: StubKind::File,
        gate: Some(Subsystem::Reverb),
    },
    StubEntry {
        source: "AGENTS.md",
        destination: "AGENTS.md",
        label: "agent guidelines",
        kind: StubKind::PrependMerge {
            marker: GUIDELINES_MARKER,
        },
        gate: None,
    },
];

/// Stubs that apply to `choice`, in publish order.
pub fn stubs_for(choice: &InstallChoice) -> impl Iterator<Item = &'static StubEntry> + '_ {
    STUBS
        .iter()
        .filter(move |entry| entry.gate.map_or(true, |gate| choice.is_selected(gate)))
}

fn provider_rule(id: String, class: &str) -> PatchRule {
    let identifier = format!("{class}::class");
    let line = format!("{identifier},");
    PatchRule::insert_before_closing(id, "return [", "];", identifier, line)
}

pub fn provider_rules(choice: &InstallChoice) -> Vec<PatchRule> {
    let mut rules = vec![provider_rule("provider-platform".to_string(), PLATFORM_PROVIDER)];
    for subsystem in choice.selected() {
        if let Some(class) = subsystem.provider() {
            rules.push(provider_rule(format!("provider-{subsystem}"), class));
        }
    }
    rules
}

pub fn route_rules() -> Vec<PatchRule> {
    vec![
        PatchRule::insert_after_line("route-health-import", "<?php", HEALTH_USE),
        PatchRule::append_block(
            "route-health",
            Marker::Substring("HealthController::class".to_string()),
            HEALTH_ROUTE,
        ),
    ]
}

pub fn manifest_edit(choice: &InstallChoice) -> ManifestEdit {
    let mut edit = ManifestEdit::default().script(
        "deploy",
        json!(["@php artisan migrate --force", "@php artisan optimize"]),
    );
    for subsystem in choice.selected() {
        if let Some(package) = subsystem.dont_discover() {
            edit = edit.dont_discover(package);
        }
    }
    edit
}

/// Rules for `.env` (`example == false`) or `.env.example`.
///
/// The example file gets the same keys, but never real websocket secrets.
pub fn env_rules(
    choice: &InstallChoice,
    config: &InstallerConfig,
    reverb: &ReverbCredentials,
    example: bool,
) -> Vec<PatchRule> {
    let fresh = Condition::LineEquals(FRESH_DATABASE_LINE.to_string());
    let db = &config.database;
    let mut rules: Vec<PatchRule> = [
        ("db-connection", "DB_CONNECTION", db.connection.as_str()),
        ("db-host", "DB_HOST", db.host.as_str()),
        ("db-port", "DB_PORT", db.port.as_str()),
        ("db-database", "DB_DATABASE", choice.project_name.as_str()),
        ("db-username", "DB_USERNAME", db.username.as_str()),
        ("db-password", "DB_PASSWORD", db.password.as_str()),
    ]
    .into_iter()
    .map(|(id, key, value)| PatchRule::replace_key(id, key, value).when(fresh.clone()))
    .collect();

    if choice.selected().any(Subsystem::uses_redis) {
        rules.push(PatchRule::replace_key_if_different(
            "redis-client",
            "REDIS_CLIENT",
            config.redis.client.as_str(),
        ));
    }
    for subsystem in choice.selected() {
        for (key, value) in subsystem.env_settings() {
            let id = key.to_ascii_lowercase().replace('_', "-");
            rules.push(PatchRule::replace_key_if_different(id, *key, *value));
        }
    }
    if choice.is_selected(Subsystem::Reverb) {
        rules.push(PatchRule::append_block(
            "reverb-credentials",
            Marker::Key("REVERB_APP_ID".to_string()),
            reverb_block(reverb, example),
        ));
    }

    rules
}

fn reverb_block(creds: &ReverbCredentials, example: bool) -> String {
    let (key, secret) = if example {
        ("", "")
    } else {
        (creds.app_key.as_str(), creds.app_secret.as_str())
    };
    format!(
        "REVERB_APP_ID={}\n\
         REVERB_APP_KEY={key}\n\
         REVERB_APP_SECRET={secret}\n\
         REVERB_HOST=\"localhost\"\n\
         REVERB_PORT=8080\n\
         REVERB_SCHEME=http\n\
         \n\
         VITE_REVERB_APP_KEY=\"${{REVERB_APP_KEY}}\"\n\
         VITE_REVERB_HOST=\"${{REVERB_HOST}}\"\n\
         VITE_REVERB_PORT=\"${{REVERB_PORT}}\"\n\
         VITE_REVERB_SCHEME=\"${{REVERB_SCHEME}}\"\n",
        creds.app_id
    )
}
