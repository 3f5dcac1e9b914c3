// src/network/message.rs

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide envelope sequence. Shared by every node and service in the process.
static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Next envelope correlation id for `src`: `"{src}:{seq}"`.
pub fn next_envelope_id(src: &str) -> String {
    let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed) + 1;
    format!("{}:{}", src, seq)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    Handshake,
    #[default]
    Data,
    Heartbeat,
    ChildrenRequest,
    ChildrenReply,
    ChildJoined,
    ChildLeft,
    Bye,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceType {
    Messaging,
    Repo,
    #[default]
    Control,
}

/// Distinguishes "no value" from an empty-but-present payload on replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayloadType {
    #[default]
    String,
    Nil,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    #[default]
    Ok,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RepoCommand {
    Claim,
    Store,
    Lookup,
}

/// The wire unit. One JSON object per line.
///
/// Every field is written on encode and defaulted on decode, so control
/// frames can be as small as `{"type":"HEARTBEAT","src":"..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub msg_type: MessageType,
    pub src: String,
    pub dst: String,
    pub id: String,
    pub service_type: ServiceType,
    pub service_name: String,
    pub payload: String,
    pub payload_type: PayloadType,
    pub status: Status,
    pub repo_id: String,
    pub repo_cmd: Option<RepoCommand>,
    pub repo_key: String,
    pub repo_value: String,
    /// Repo store signature; on a claim it carries the owner's public key PEM.
    pub signature: String,
}

impl Envelope {
    fn control(msg_type: MessageType, src: &str, dst: &str, payload: String) -> Self {
        Self {
            msg_type,
            src: src.to_string(),
            dst: dst.to_string(),
            id: next_envelope_id(src),
            service_type: ServiceType::Control,
            payload,
            ..Default::default()
        }
    }

    pub fn handshake(src: &str) -> Self {
        Self::control(MessageType::Handshake, src, "", String::new())
    }

    pub fn heartbeat(src: &str, dst: &str) -> Self {
        Self::control(MessageType::Heartbeat, src, dst, String::new())
    }

    pub fn bye(src: &str, dst: &str) -> Self {
        Self::control(MessageType::Bye, src, dst, String::new())
    }

    pub fn children_request(src: &str, dst: &str) -> Self {
        Self::control(MessageType::ChildrenRequest, src, dst, String::new())
    }

    /// `children_json` is a JSON array of node id strings.
    pub fn children_reply(src: &str, dst: &str, children_json: String) -> Self {
        Self::control(MessageType::ChildrenReply, src, dst, children_json)
    }

    pub fn child_joined(src: &str, child: &str) -> Self {
        Self::control(MessageType::ChildJoined, src, "", child.to_string())
    }

    pub fn child_left(src: &str, child: &str) -> Self {
        Self::control(MessageType::ChildLeft, src, "", child.to_string())
    }

    /// Message service data frame. `payload` is expected to be ciphertext already.
    pub fn data(src: &str, dst: &str, service_name: &str, payload: String) -> Self {
        Self {
            msg_type: MessageType::Data,
            src: src.to_string(),
            dst: dst.to_string(),
            id: next_envelope_id(src),
            service_type: ServiceType::Messaging,
            service_name: service_name.to_string(),
            payload,
            ..Default::default()
        }
    }

    fn repo(src: &str, repo_id: &str, cmd: RepoCommand) -> Self {
        Self {
            msg_type: MessageType::Data,
            src: src.to_string(),
            id: next_envelope_id(src),
            service_type: ServiceType::Repo,
            service_name: repo_id.to_string(),
            repo_id: repo_id.to_string(),
            repo_cmd: Some(cmd),
            ..Default::default()
        }
    }

    /// `dst` is filled in by the edge node with its uplink id.
    pub fn repo_claim(src: &str, repo_id: &str, public_key_pem: &str) -> Self {
        let mut env = Self::repo(src, repo_id, RepoCommand::Claim);
        env.signature = public_key_pem.to_string();
        env
    }

    pub fn repo_store(
        src: &str,
        repo_id: &str,
        enc_key: &str,
        enc_value: &str,
        signature: &str,
    ) -> Self {
        let mut env = Self::repo(src, repo_id, RepoCommand::Store);
        env.repo_key = enc_key.to_string();
        env.repo_value = enc_value.to_string();
        env.signature = signature.to_string();
        env
    }

    pub fn repo_lookup(src: &str, repo_id: &str, enc_key: &str) -> Self {
        let mut env = Self::repo(src, repo_id, RepoCommand::Lookup);
        env.repo_key = enc_key.to_string();
        env
    }

    /// Reply frame to `original`: same id and service, addressed back to its sender.
    pub fn reply_to(original: &Envelope, src: &str, payload: String) -> Self {
        Self {
            msg_type: MessageType::Data,
            src: src.to_string(),
            dst: original.src.clone(),
            id: original.id.clone(),
            service_type: original.service_type,
            service_name: original.service_name.clone(),
            payload,
            ..Default::default()
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }

    pub fn as_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".into())
    }

    pub fn from_json(json: &str) -> Option<Self> {
        serde_json::from_str(json.trim()).ok()
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.msg_type {
            MessageType::Data => write!(
                f,
                "msg[type:data id:{} to:{} from:{} service:{} kind:{:?} status:{:?}]",
                self.id, self.dst, self.src, self.service_name, self.service_type, self.status
            ),
            other => write!(
                f,
                "msg[type:{:?} to:{} from:{} payload:{}]",
                other, self.dst, self.src, self.payload
            ),
        }
    }
}
