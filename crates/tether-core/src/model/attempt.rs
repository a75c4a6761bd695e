use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::Serialize;
use strum::Display;

/// Lifecycle of a join request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AttemptOutcome {
    Pending,
    Succeeded,
    Failed,
}

/// One request to join an upstream WiFi network.
///
/// The password is write-once: it is held for the join and never
/// serialized, logged or handed back out of the crate.
#[derive(Clone, Serialize)]
pub struct ConnectionAttempt {
    pub id: u64,
    pub ssid: String,
    #[serde(skip)]
    pub(crate) password: Option<SecretString>,
    pub requested_at: DateTime<Utc>,
    pub outcome: AttemptOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl ConnectionAttempt {
    pub(crate) fn pending(id: u64, ssid: String, password: Option<SecretString>) -> Self {
        Self {
            id,
            ssid,
            password,
            requested_at: Utc::now(),
            outcome: AttemptOutcome::Pending,
            failure_reason: None,
            finished_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.outcome == AttemptOutcome::Pending
    }

    pub fn has_password(&self) -> bool {
        self.password.is_some()
    }

    /// Copy of this attempt with a terminal outcome. The password is dropped.
    pub(crate) fn finished(&self, outcome: AttemptOutcome, reason: Option<String>) -> Self {
        Self {
            id: self.id,
            ssid: self.ssid.clone(),
            password: None,
            requested_at: self.requested_at,
            outcome,
            failure_reason: reason,
            finished_at: Some(Utc::now()),
        }
    }
}

impl std::fmt::Debug for ConnectionAttempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionAttempt")
            .field("id", &self.id)
            .field("ssid", &self.ssid)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("outcome", &self.outcome)
            .field("failure_reason", &self.failure_reason)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_never_serialized_or_debugged() {
        let attempt =
            ConnectionAttempt::pending(1, "HomeNet".into(), Some(SecretString::from("hunter22")));
        let json = serde_json::to_string(&attempt).unwrap_or_default();
        assert!(!json.contains("hunter22"));
        assert!(!json.contains("password"));
        assert!(!format!("{attempt:?}").contains("hunter22"));
        assert!(attempt.has_password());
    }

    #[test]
    fn finishing_drops_password() {
        let attempt =
            ConnectionAttempt::pending(7, "HomeNet".into(), Some(SecretString::from("hunter22")));
        let done = attempt.finished(AttemptOutcome::Failed, Some("bad psk".into()));
        assert!(!done.has_password());
        assert!(!done.is_pending());
        assert_eq!(done.id, 7);
        assert_eq!(done.failure_reason.as_deref(), Some("bad psk"));
    }
}
