// NetworkManager client
//
// Wraps `nmcli` in terse mode (`-t`). Every method maps to exactly one
// nmcli invocation (plus an optional rescan) so callers can reason about
// what touched the radio.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, warn};

use crate::error::Error;
use crate::models::{AccessPointProfile, ActiveConnectionEntry, DeviceStatus, WifiListEntry};
use crate::runner::CommandRunner;

pub const DEFAULT_NMCLI: &str = "/usr/bin/nmcli";

/// Raw `nmcli` client.
#[derive(Debug, Clone)]
pub struct Nmcli {
    runner: CommandRunner,
}

impl Nmcli {
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            runner: CommandRunner::new(binary, timeout),
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// `nmcli -t -f DEVICE,STATE,CONNECTION device status`
    pub async fn device_status(&self) -> Result<Vec<DeviceStatus>, Error> {
        let out = self
            .runner
            .run_checked(["-t", "-f", "DEVICE,STATE,CONNECTION", "device", "status"])
            .await?;
        Ok(parse_device_status(&out.stdout))
    }

    /// `nmcli -t -f NAME,TYPE,DEVICE connection show --active`
    pub async fn active_connections(&self) -> Result<Vec<ActiveConnectionEntry>, Error> {
        let out = self
            .runner
            .run_checked(["-t", "-f", "NAME,TYPE,DEVICE", "connection", "show", "--active"])
            .await?;
        Ok(parse_active_connections(&out.stdout))
    }

    /// Names of all stored connection profiles.
    pub async fn connection_names(&self) -> Result<Vec<String>, Error> {
        let out = self
            .runner
            .run_checked(["-t", "-f", "NAME", "connection", "show"])
            .await?;
        Ok(out
            .stdout
            .lines()
            .filter_map(|l| split_terse(l).into_iter().next())
            .filter(|n| !n.is_empty())
            .collect())
    }

    /// Rescan, then list visible networks on `interface`.
    ///
    /// A failed rescan is not fatal; the cached list is still returned.
    pub async fn wifi_list(&self, interface: &str) -> Result<Vec<WifiListEntry>, Error> {
        if let Err(e) = self
            .runner
            .run_checked(["device", "wifi", "rescan", "ifname", interface])
            .await
        {
            debug!(error = %e, "wifi rescan failed, using cached scan results");
        }

        let out = self
            .runner
            .run_checked([
                "-t",
                "-f",
                "SSID,SIGNAL,SECURITY,IN-USE",
                "device",
                "wifi",
                "list",
                "ifname",
                interface,
            ])
            .await?;
        Ok(parse_wifi_list(&out.stdout))
    }

    // ── Mutations ────────────────────────────────────────────────────

    /// `nmcli connection up id <name>`
    pub async fn connection_up(&self, name: &str) -> Result<(), Error> {
        self.runner
            .run_checked(["connection", "up", "id", name])
            .await
            .map(|_| ())
    }

    /// `nmcli connection down id <name>`.
    ///
    /// Returns `Ok(false)` when the profile was not active to begin with.
    pub async fn connection_down(&self, name: &str) -> Result<bool, Error> {
        match self.runner.run_checked(["connection", "down", "id", name]).await {
            Ok(_) => Ok(true),
            Err(Error::NonZeroExit { ref stderr, .. }) if is_not_active(stderr) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// `nmcli connection delete id <name>`
    pub async fn connection_delete(&self, name: &str) -> Result<(), Error> {
        self.runner
            .run_checked(["connection", "delete", "id", name])
            .await
            .map(|_| ())
    }

    /// Create a shared-IPv4 WPA-PSK access-point profile bound to one interface.
    pub async fn add_access_point(&self, profile: &AccessPointProfile<'_>) -> Result<(), Error> {
        self.runner
            .run_checked([
                "connection",
                "add",
                "type",
                "wifi",
                "ifname",
                profile.interface,
                "con-name",
                profile.name,
                "autoconnect",
                "no",
                "ssid",
                profile.ssid,
                "802-11-wireless.mode",
                "ap",
                "802-11-wireless.band",
                "bg",
                "ipv4.method",
                "shared",
                "wifi-sec.key-mgmt",
                "wpa-psk",
                "wifi-sec.psk",
                profile.passphrase.expose_secret(),
            ])
            .await
            .map(|_| ())
    }

    /// `nmcli device wifi connect <ssid> [password <pw>] ifname <iface>`
    ///
    /// The deadline is supplied by the caller since a join routinely takes
    /// longer than the default per-command timeout.
    pub async fn wifi_connect(
        &self,
        interface: &str,
        ssid: &str,
        password: Option<&SecretString>,
        timeout: Duration,
    ) -> Result<(), Error> {
        let mut args: Vec<&str> = vec!["device", "wifi", "connect", ssid];
        if let Some(pw) = password {
            args.extend(["password", pw.expose_secret()]);
        }
        args.extend(["ifname", interface]);

        self.runner
            .with_timeout(timeout)
            .run_checked(args)
            .await
            .map(|_| ())
    }

    /// `nmcli device disconnect <iface>`
    pub async fn device_disconnect(&self, interface: &str) -> Result<(), Error> {
        match self
            .runner
            .run_checked(["device", "disconnect", interface])
            .await
        {
            Ok(_) => Ok(()),
            Err(Error::NonZeroExit { ref stderr, .. }) if is_not_active(stderr) => {
                warn!(interface, "device was not connected");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

// ── Terse-output parsing ─────────────────────────────────────────────

/// Split one terse line on unescaped `:`; nmcli escapes `:` and `\` with `\`.
pub(crate) fn split_terse(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            ':' => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

fn dashes_to_none(s: String) -> Option<String> {
    if s.is_empty() || s == "--" { None } else { Some(s) }
}

fn is_not_active(stderr: &str) -> bool {
    let lower = stderr.to_ascii_lowercase();
    lower.contains("not an active connection")
        || lower.contains("not active")
        || lower.contains("is not connected")
}

pub(crate) fn parse_device_status(stdout: &str) -> Vec<DeviceStatus> {
    stdout
        .lines()
        .filter_map(|line| {
            let mut parts = split_terse(line).into_iter();
            let device = parts.next().filter(|d| !d.is_empty())?;
            let state = parts.next()?;
            let connection = parts.next().and_then(dashes_to_none);
            Some(DeviceStatus {
                device,
                state,
                connection,
            })
        })
        .collect()
}

pub(crate) fn parse_active_connections(stdout: &str) -> Vec<ActiveConnectionEntry> {
    stdout
        .lines()
        .filter_map(|line| {
            let mut parts = split_terse(line).into_iter();
            let name = parts.next().filter(|n| !n.is_empty())?;
            let conn_type = parts.next()?;
            let device = parts.next().and_then(dashes_to_none);
            Some(ActiveConnectionEntry {
                name,
                conn_type,
                device,
            })
        })
        .collect()
}

/// Empty SSIDs and duplicates are dropped; result is sorted by signal, strongest first.
pub(crate) fn parse_wifi_list(stdout: &str) -> Vec<WifiListEntry> {
    let mut seen = HashSet::new();
    let mut networks: Vec<WifiListEntry> = stdout
        .lines()
        .filter_map(|line| {
            let parts = split_terse(line);
            let [ssid, signal, security, in_use] = parts.as_slice() else {
                return None;
            };
            let ssid = ssid.trim();
            if ssid.is_empty() || !seen.insert(ssid.to_owned()) {
                return None;
            }
            let security = security.trim();
            Some(WifiListEntry {
                ssid: ssid.to_owned(),
                signal: signal.trim().parse().unwrap_or(0),
                security: if security.is_empty() || security == "--" {
                    "Open".into()
                } else {
                    security.to_owned()
                },
                in_use: in_use.trim() == "*",
            })
        })
        .collect();
    networks.sort_by(|a, b| b.signal.cmp(&a.signal));
    networks
}
