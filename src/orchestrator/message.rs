use serde::{Deserialize, Serialize};

use crate::check::{CheckContext, CheckResult, CheckState};

/// Request published once per run to start the dispatched checks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerMessage {
    pub uuid: String,
    #[serde(rename = "responseToARN")]
    pub response_to_arn: String,
    pub repo_slug: String,
    pub version: String,
    pub vcs_revision: String,
    pub artifactory_build_number: u64,
    pub branch_name: String,
}

impl TriggerMessage {
    pub fn new(
        correlation_id: impl Into<String>,
        response_to: impl Into<String>,
        context: &CheckContext,
        build_number: u64,
    ) -> Self {
        Self {
            uuid: correlation_id.into(),
            response_to_arn: response_to.into(),
            repo_slug: context.repo_slug(),
            version: context.version.clone(),
            vcs_revision: context.commit.clone(),
            artifactory_build_number: build_number,
            branch_name: context.branch.clone(),
        }
    }
}

const ACK_TYPE: &str = "ACK";

/// Value of the `type` field of a result message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ResultKind {
    /// A worker acknowledged the trigger; never a check outcome
    Ack,
    State(CheckState),
}

impl From<String> for ResultKind {
    fn from(value: String) -> Self {
        if value == ACK_TYPE {
            ResultKind::Ack
        } else {
            ResultKind::State(CheckState::from_wire(&value))
        }
    }
}

impl From<ResultKind> for String {
    fn from(kind: ResultKind) -> Self {
        match kind {
            ResultKind::Ack => ACK_TYPE.to_string(),
            ResultKind::State(state) => state.as_str().to_string(),
        }
    }
}

/// Response from a remote worker, correlated by `requestUUID`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultMessage {
    #[serde(rename = "requestUUID")]
    pub request_uuid: String,
    #[serde(rename = "checkName")]
    pub check_name: String,
    #[serde(rename = "type")]
    pub kind: ResultKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ResultMessage {
    pub fn is_ack(&self) -> bool {
        self.kind == ResultKind::Ack
    }

    pub fn into_check_result(self) -> Option<CheckResult> {
        match self.kind {
            ResultKind::Ack => None,
            ResultKind::State(state) => Some(CheckResult::new(self.check_name, state, self.message)),
        }
    }
}

#[derive(Deserialize)]
struct NotificationEnvelope {
    #[serde(rename = "Message")]
    message: String,
}

/// Decode a queue body, unwrapping a topic notification envelope when present
pub fn decode_result_body(body: &str) -> serde_json::Result<ResultMessage> {
    match serde_json::from_str::<NotificationEnvelope>(body) {
        Ok(envelope) => serde_json::from_str(&envelope.message),
        Err(_) => serde_json::from_str(body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_message_field_names() {
        let context = CheckContext::new("sonar", "sonar-dummy", "master", "1.0.0.123", "abc123");
        let message = TriggerMessage::new("corr-1", "ReleasabilityResultTopic", &context, 123);
        let value = serde_json::to_value(&message).unwrap();

        assert_eq!(value["uuid"], "corr-1");
        assert_eq!(value["responseToARN"], "ReleasabilityResultTopic");
        assert_eq!(value["repoSlug"], "sonar/sonar-dummy");
        assert_eq!(value["version"], "1.0.0.123");
        assert_eq!(value["vcsRevision"], "abc123");
        assert_eq!(value["artifactoryBuildNumber"], 123);
        assert_eq!(value["branchName"], "master");
        assert_eq!(value.as_object().unwrap().len(), 7);
    }

    #[test]
    fn test_decode_plain_and_enveloped_bodies() {
        let plain = r#"{"requestUUID":"u1","checkName":"QA","type":"PASSED","message":"ok"}"#;
        let message = decode_result_body(plain).unwrap();
        assert_eq!(message.check_name, "QA");
        assert_eq!(message.kind, ResultKind::State(CheckState::Passed));
        assert_eq!(message.message.as_deref(), Some("ok"));

        let enveloped = serde_json::json!({ "Type": "Notification", "Message": plain }).to_string();
        assert_eq!(decode_result_body(&enveloped).unwrap(), message);
    }

    #[test]
    fn test_decode_ack_and_unknown_type() {
        let ack = decode_result_body(r#"{"requestUUID":"u1","checkName":"QA","type":"ACK"}"#).unwrap();
        assert!(ack.is_ack());
        assert!(ack.into_check_result().is_none());

        let odd = decode_result_body(r#"{"requestUUID":"u1","checkName":"QA","type":"SKIPPED"}"#).unwrap();
        let result = odd.into_check_result().unwrap();
        assert_eq!(result.state(), CheckState::Unknown);
        assert!(!result.passed());
    }

    #[test]
    fn test_decode_malformed_body() {
        assert!(decode_result_body("not json").is_err());
        assert!(decode_result_body(r#"{"checkName":"QA"}"#).is_err());
        assert!(decode_result_body(r#"{"Message":"still not json"}"#).is_err());
    }
}
