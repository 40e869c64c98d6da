use std::fmt;

/// Optional feature sets the installer can add to a project.
///
/// Everything the installer needs to know about a subsystem is data on this
/// enum; the orchestrator and publisher iterate [`Subsystem::ALL`] instead of
/// branching per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Subsystem {
    /// Queue dashboard and supervisor.
    Horizon,
    /// Websocket server.
    Reverb,
    /// Debugging assistant.
    Telescope,
}

/// Composer package pulled in for every run.
pub const ALWAYS_ON_PACKAGE: &str = "league/flysystem-aws-s3-v3";

impl Subsystem {
    pub const ALL: [Subsystem; 3] = [Subsystem::Horizon, Subsystem::Reverb, Subsystem::Telescope];

    /// CLI flag and prompt key.
    pub fn name(self) -> &'static str {
        match self {
            Subsystem::Horizon => "horizon",
            Subsystem::Reverb => "reverb",
            Subsystem::Telescope => "telescope",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Subsystem::Horizon => "Horizon (queue dashboard)",
            Subsystem::Reverb => "Reverb (websocket server)",
            Subsystem::Telescope => "Telescope (debugging tool)",
        }
    }

    pub fn package(self) -> &'static str {
        match self {
            Subsystem::Horizon => "laravel/horizon",
            Subsystem::Reverb => "laravel/reverb",
            Subsystem::Telescope => "laravel/telescope",
        }
    }

    /// Installed with `composer require --dev`.
    pub fn dev_only(self) -> bool {
        matches!(self, Subsystem::Telescope)
    }

    /// `php artisan` subcommand run after the package is required.
    pub fn install_command(self) -> &'static [&'static str] {
        match self {
            Subsystem::Horizon => &["horizon:install"],
            Subsystem::Reverb => &["reverb:install", "--no-interaction"],
            Subsystem::Telescope => &["telescope:install"],
        }
    }

    /// Service provider the subsystem's installer generates and that must
    /// be listed in `bootstrap/providers.php`.
    pub fn provider(self) -> Option<&'static str> {
        match self {
            Subsystem::Horizon => Some("App\\Providers\\HorizonServiceProvider"),
            Subsystem::Reverb => None,
            Subsystem::Telescope => Some("App\\Providers\\TelescopeServiceProvider"),
        }
    }

    /// Needs `REDIS_CLIENT` set to the configured client.
    pub fn uses_redis(self) -> bool {
        matches!(self, Subsystem::Horizon | Subsystem::Reverb)
    }

    /// Environment keys the subsystem needs, set only when different.
    pub fn env_settings(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Subsystem::Horizon => &[("QUEUE_CONNECTION", "redis")],
            Subsystem::Reverb => &[("BROADCAST_CONNECTION", "reverb")],
            Subsystem::Telescope => &[],
        }
    }

    /// Package that should be excluded from auto-discovery.
    pub fn dont_discover(self) -> Option<&'static str> {
        match self {
            Subsystem::Telescope => Some("laravel/telescope"),
            _ => None,
        }
    }

    pub fn from_name(name: &str) -> Option<Subsystem> {
        Subsystem::ALL.into_iter().find(|s| s.name() == name)
    }
}

impl fmt::Display for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
