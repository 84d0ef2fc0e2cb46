use russh::keys::{PublicKey, PublicKeyBase64};
use tracing::*;

use super::known_hosts::{validate, KnownHostValidationResult, PinnedHostKey};

pub struct ClientHandler {
    pub host: String,
    pub port: u16,
    pub pinned_key: Option<PinnedHostKey>,
}

impl russh::client::Handler for ClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        let algorithm = server_public_key.algorithm();
        match validate(
            self.pinned_key.as_ref(),
            algorithm.as_str(),
            &server_public_key.public_key_base64(),
        ) {
            KnownHostValidationResult::Valid => Ok(true),
            KnownHostValidationResult::Invalid => {
                error!(host = %self.host, port = self.port, "Host key does not match the pinned key");
                Ok(false)
            }
            KnownHostValidationResult::Unknown => {
                warn!(
                    host = %self.host,
                    port = self.port,
                    key_type = %algorithm.as_str(),
                    "No host key pinned, accepting the server key"
                );
                Ok(true)
            }
        }
    }
}

impl Drop for ClientHandler {
    fn drop(&mut self) {
        debug!(host = %self.host, "Dropped");
    }
}
