// src/node/repository.rs

use std::collections::HashMap;

use crate::error::RepoError;
use crate::events::dispatcher::{emit, meta};
use crate::events::model::{LogEvent, LogLevel, RepoEvent};
use crate::network::message::{Envelope, PayloadType, RepoCommand, Status};
use crate::security::keys::public_key_from_pem;
use crate::security::signature::{store_signing_input, verify};

/// Host side of the repository protocol, kept by the super node.
///
/// A repo id is unclaimed until its first claim and stays claimed by that
/// key for the life of the process. Values are partitioned per repository.
#[derive(Debug, Default)]
pub struct RepositoryHost {
    owners: HashMap<String, String>,
    values: HashMap<(String, String), String>,
}

impl RepositoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_claimed(&self, repo_id: &str) -> bool {
        self.owners.contains_key(repo_id)
    }

    /// Reclaiming with the same key is a no-op success.
    pub fn claim(&mut self, repo_id: &str, public_key_pem: &str) -> Result<(), RepoError> {
        match self.owners.get(repo_id) {
            Some(existing) if existing == public_key_pem => Ok(()),
            Some(_) => Err(RepoError::AlreadyClaimed),
            None => {
                self.owners
                    .insert(repo_id.to_string(), public_key_pem.to_string());
                Ok(())
            }
        }
    }

    /// Verify and upsert. Returns the previous ciphertext for `enc_key`, if any.
    pub fn store(
        &mut self,
        repo_id: &str,
        enc_key: &str,
        enc_value: &str,
        signature: &str,
    ) -> Result<Option<String>, RepoError> {
        let owner_pem = self
            .owners
            .get(repo_id)
            .ok_or_else(|| RepoError::NoSuchRepo(repo_id.to_string()))?;
        let owner = public_key_from_pem(owner_pem)
            .map_err(|_| RepoError::InvalidPublicKey(repo_id.to_string()))?;
        verify(&owner, &store_signing_input(enc_key, enc_value), signature)
            .map_err(|_| RepoError::SignatureVerification(repo_id.to_string()))?;
        Ok(self.values.insert(
            (repo_id.to_string(), enc_key.to_string()),
            enc_value.to_string(),
        ))
    }

    pub fn lookup(&self, repo_id: &str, enc_key: &str) -> Result<Option<String>, RepoError> {
        if !self.is_claimed(repo_id) {
            return Err(RepoError::NoSuchRepo(repo_id.to_string()));
        }
        Ok(self
            .values
            .get(&(repo_id.to_string(), enc_key.to_string()))
            .cloned())
    }

    /// Execute a REPO request and build its reply: same id, addressed back to
    /// the requester, sent from `host_id`.
    pub fn handle(&mut self, request: &Envelope, host_id: &str) -> Envelope {
        let outcome = match request.repo_cmd {
            Some(RepoCommand::Claim) => self
                .claim(&request.repo_id, &request.signature)
                .map(|_| Some(String::new())),
            Some(RepoCommand::Store) => self.store(
                &request.repo_id,
                &request.repo_key,
                &request.repo_value,
                &request.signature,
            ),
            Some(RepoCommand::Lookup) => self.lookup(&request.repo_id, &request.repo_key),
            None => Err(RepoError::Malformed("missing repo_cmd")),
        };

        let mut reply = request.clone();
        reply.dst = request.src.clone();
        reply.src = host_id.to_string();
        match &outcome {
            Ok(Some(value)) => {
                reply.status = Status::Ok;
                reply.payload_type = PayloadType::String;
                reply.payload = value.clone();
            }
            Ok(None) => {
                reply.status = Status::Ok;
                reply.payload_type = PayloadType::Nil;
                reply.payload = String::new();
            }
            Err(e) => {
                reply.status = Status::Error;
                reply.payload_type = PayloadType::String;
                reply.payload = e.to_string();
            }
        }

        let (level, result) = match &outcome {
            Ok(Some(_)) => (LogLevel::Info, "ok".to_string()),
            Ok(None) => (LogLevel::Info, "ok nil".to_string()),
            Err(e) => (LogLevel::Warn, format!("error: {}", e)),
        };
        emit(LogEvent::Repo(RepoEvent {
            meta: meta("repository", level),
            repo_id: request.repo_id.clone(),
            command: request
                .repo_cmd
                .map(|c| format!("{:?}", c).to_lowercase())
                .unwrap_or_else(|| "none".into()),
            src: request.src.clone(),
            outcome: result,
        }));
        reply
    }
}
