//! The `openAppSettings` capability.
//!
//! Primary: open this application's settings page. Fallback: open the general
//! application-management page. How a surface is opened is up to the host's
//! [`SurfaceLauncher`].

use std::process::Stdio;
use std::sync::Arc;

use tokio::process::Command;
use tracing::debug;

use pushbridge_core::config::SettingsConfig;

use super::{ActionError, CapabilityGatewayBuilder, GatewayError};

/// Capability name exposed to the consumer.
pub const OPEN_APP_SETTINGS: &str = "openAppSettings";

/// Host settings pages the bridge knows how to ask for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsSurface {
    /// Settings page of one application.
    ApplicationDetails { app_id: String },
    /// List of all installed applications.
    ManageApplications,
}

/// Opens a settings surface on the host.
pub trait SurfaceLauncher: Send + Sync {
    fn open(&self, surface: &SettingsSurface) -> Result<(), ActionError>;
}

/// Launcher that spawns a configured command per surface.
///
/// `{app_id}` in any argument is replaced with the application id. The call
/// returns once the command has been spawned; the child is left to tokio's
/// orphan reaper. Must be called from within a tokio runtime.
#[derive(Debug, Clone, Default)]
pub struct CommandLauncher {
    app_details: Vec<String>,
    manage_apps: Vec<String>,
}

impl CommandLauncher {
    pub fn from_config(config: &SettingsConfig) -> Self {
        Self {
            app_details: config.app_details_command.clone(),
            manage_apps: config.manage_apps_command.clone(),
        }
    }

    fn argv(&self, surface: &SettingsSurface) -> Result<Vec<String>, ActionError> {
        let (template, label, app_id) = match surface {
            SettingsSurface::ApplicationDetails { app_id } => {
                (&self.app_details, "application details settings", app_id.as_str())
            }
            SettingsSurface::ManageApplications => {
                (&self.manage_apps, "application management settings", "")
            }
        };
        if template.is_empty() {
            return Err(ActionError::Unavailable(label.to_string()));
        }
        Ok(template
            .iter()
            .map(|arg| arg.replace("{app_id}", app_id))
            .collect())
    }
}

impl SurfaceLauncher for CommandLauncher {
    fn open(&self, surface: &SettingsSurface) -> Result<(), ActionError> {
        let argv = self.argv(surface)?;
        let Some((program, args)) = argv.split_first() else {
            return Err(ActionError::Failed("empty command".into()));
        };

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| ActionError::Launch {
                program: program.clone(),
                source,
            })?;

        debug!(?surface, pid = ?child.id(), "Settings surface launched");
        // Dropping the handle detaches the opener; its exit status is not
        // reported.
        drop(child);
        Ok(())
    }
}

/// Register `openAppSettings` on `builder`, opening the details page for
/// `app_id` with a fallback to the management page.
pub fn register_open_app_settings(
    builder: CapabilityGatewayBuilder,
    launcher: Arc<dyn SurfaceLauncher>,
    app_id: &str,
) -> Result<CapabilityGatewayBuilder, GatewayError> {
    let details = SettingsSurface::ApplicationDetails {
        app_id: app_id.to_string(),
    };
    let primary_launcher = Arc::clone(&launcher);
    let primary = move || primary_launcher.open(&details);
    let fallback = move || launcher.open(&SettingsSurface::ManageApplications);

    builder.register(OPEN_APP_SETTINGS, primary, Some(Box::new(fallback)))
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use parking_lot::Mutex;

    use super::*;
    use crate::gateway::CapabilityGateway;

    /// Records every requested surface and fails the ones listed.
    #[derive(Default)]
    struct FakeLauncher {
        opened: Mutex<Vec<SettingsSurface>>,
        fail_details: bool,
        fail_manage: bool,
    }

    impl SurfaceLauncher for FakeLauncher {
        fn open(&self, surface: &SettingsSurface) -> Result<(), ActionError> {
            self.opened.lock().push(surface.clone());
            let fail = match surface {
                SettingsSurface::ApplicationDetails { .. } => self.fail_details,
                SettingsSurface::ManageApplications => self.fail_manage,
            };
            if fail {
                Err(ActionError::Failed("refused".into()))
            } else {
                Ok(())
            }
        }
    }

    fn gateway_with(launcher: &Arc<FakeLauncher>) -> CapabilityGateway {
        let dyn_launcher: Arc<dyn SurfaceLauncher> = Arc::clone(launcher) as _;
        register_open_app_settings(CapabilityGateway::builder(), dyn_launcher, "com.example.app")
            .unwrap()
            .build()
    }

    #[test]
    fn opens_application_details_first() {
        let launcher = Arc::new(FakeLauncher::default());
        gateway_with(&launcher).invoke(OPEN_APP_SETTINGS);

        assert_eq!(
            *launcher.opened.lock(),
            vec![SettingsSurface::ApplicationDetails {
                app_id: "com.example.app".to_string()
            }]
        );
    }

    #[test]
    fn falls_back_to_manage_applications() {
        let launcher = Arc::new(FakeLauncher {
            fail_details: true,
            ..Default::default()
        });
        gateway_with(&launcher).invoke(OPEN_APP_SETTINGS);

        let opened = launcher.opened.lock();
        assert_eq!(opened.len(), 2);
        assert_eq!(opened[1], SettingsSurface::ManageApplications);
    }

    #[test]
    fn both_surfaces_failing_returns_normally() {
        let launcher = Arc::new(FakeLauncher {
            fail_details: true,
            fail_manage: true,
            ..Default::default()
        });
        gateway_with(&launcher).invoke(OPEN_APP_SETTINGS);
        assert_eq!(launcher.opened.lock().len(), 2);
    }

    #[test]
    fn command_launcher_substitutes_app_id() {
        let launcher = CommandLauncher::from_config(&SettingsConfig {
            app_details_command: vec!["open".into(), "settings://apps/{app_id}".into()],
            manage_apps_command: vec!["open".into(), "settings://apps".into()],
        });

        let argv = launcher
            .argv(&SettingsSurface::ApplicationDetails {
                app_id: "com.example.app".into(),
            })
            .unwrap();
        assert_eq!(argv, vec!["open", "settings://apps/com.example.app"]);
        assert_eq!(
            launcher.argv(&SettingsSurface::ManageApplications).unwrap(),
            vec!["open", "settings://apps"]
        );
    }

    #[test]
    fn unconfigured_surface_is_unavailable() {
        let launcher = CommandLauncher::default();
        let err = launcher.open(&SettingsSurface::ManageApplications).unwrap_err();
        assert!(matches!(err, ActionError::Unavailable(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn configured_command_is_spawned() {
        let launcher = CommandLauncher::from_config(&SettingsConfig {
            app_details_command: vec!["true".into(), "{app_id}".into()],
            manage_apps_command: Vec::new(),
        });
        launcher
            .open(&SettingsSurface::ApplicationDetails {
                app_id: "com.example.app".into(),
            })
            .unwrap();
    }

    #[tokio::test]
    async fn missing_program_is_a_launch_error() {
        let launcher = CommandLauncher::from_config(&SettingsConfig {
            app_details_command: vec!["/nonexistent/pushbridge-settings-opener".into()],
            manage_apps_command: Vec::new(),
        });
        let err = launcher
            .open(&SettingsSurface::ApplicationDetails {
                app_id: "x".into(),
            })
            .unwrap_err();
        assert!(matches!(err, ActionError::Launch { .. }));
    }
}
